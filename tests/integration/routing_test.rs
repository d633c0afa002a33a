// tests/integration/routing_test.rs

//! Private routing and recipient-not-found handling

use super::test_helpers::TestServer;
use relaychat::client::parse_line;
use relaychat::core::Envelope;

#[tokio::test]
async fn test_private_reaches_only_recipient() {
    let server = TestServer::start().await;
    let (mut a, _) = server.join("A").await;
    let (mut bob, _) = server.join("bob").await;
    a.recv().await; // JOIN bob
    let (mut carol, _) = server.join("carol").await;
    a.recv().await;
    bob.recv().await;

    let envelope = parse_line("@bob hello").unwrap().into_envelope("A");
    a.send(&envelope).await;

    assert_eq!(
        bob.recv().await,
        Envelope::Private {
            sender: "A".into(),
            text: "hello".into(),
            recipient: None,
        }
    );
    carol.expect_silence().await;
    a.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_private_to_absent_name_errors_to_sender_only() {
    let server = TestServer::start().await;
    let (mut a, _) = server.join("A").await;
    let (mut carol, _) = server.join("carol").await;
    a.recv().await;

    a.send(&parse_line("@bob hello").unwrap().into_envelope("A"))
        .await;
    assert_eq!(
        a.recv().await,
        Envelope::Error {
            message: "Recipient bob not found".into()
        }
    );
    a.expect_silence().await;
    carol.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_private_to_self_is_delivered() {
    let server = TestServer::start().await;
    let (mut a, _) = server.join("A").await;
    a.send(&parse_line("@A note to self").unwrap().into_envelope("A"))
        .await;
    assert_eq!(
        a.recv().await,
        Envelope::Private {
            sender: "A".into(),
            text: "note to self".into(),
            recipient: None,
        }
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_private_after_recipient_left() {
    let server = TestServer::start().await;
    let (mut a, _) = server.join("A").await;
    let (mut bob, _) = server.join("bob").await;
    a.recv().await;

    bob.send(&Envelope::Exit { name: "bob".into() }).await;
    assert_eq!(a.recv().await, Envelope::Leave { name: "bob".into() });
    bob.expect_closed().await;

    a.send(&parse_line("@bob still there?").unwrap().into_envelope("A"))
        .await;
    assert_eq!(
        a.recv().await,
        Envelope::Error {
            message: "Recipient bob not found".into()
        }
    );
    server.shutdown().await;
}
