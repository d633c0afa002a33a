// tests/integration/chat_flow_test.rs

//! Join, chat, and leave flows between real connections

use super::fixtures::unique_names_config;
use super::test_helpers::{TestServer, sorted};
use relaychat::core::Envelope;

#[tokio::test]
async fn test_start_announces_join_and_returns_user_list() {
    let server = TestServer::start().await;
    let (mut bob, names) = server.join("bob").await;
    assert_eq!(names, vec!["bob"]);

    let (_alice, names) = server.join("alice").await;
    assert_eq!(sorted(names), vec!["alice", "bob"]);
    assert_eq!(bob.recv().await, Envelope::Join { name: "alice".into() });

    server.shutdown().await;
}

#[tokio::test]
async fn test_joiner_does_not_receive_own_join() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;
    alice.expect_silence().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_but_sender() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;
    let (mut bob, _) = server.join("bob").await;
    alice.recv().await; // JOIN bob
    let (mut carol, _) = server.join("carol").await;
    alice.recv().await; // JOIN carol
    bob.recv().await; // JOIN carol

    alice
        .send(&Envelope::Broadcast {
            sender: "alice".into(),
            text: "hi all".into(),
        })
        .await;

    let expected = Envelope::Broadcast {
        sender: "alice".into(),
        text: "hi all".into(),
    };
    assert_eq!(bob.recv().await, expected);
    assert_eq!(carol.recv().await, expected);
    alice.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_sender_field_is_taken_from_session() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;
    let (mut bob, _) = server.join("bob").await;
    alice.recv().await;

    bob.send(&Envelope::Broadcast {
        sender: "mallory".into(),
        text: "trust me".into(),
    })
    .await;
    assert_eq!(
        alice.recv().await,
        Envelope::Broadcast {
            sender: "bob".into(),
            text: "trust me".into(),
        }
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_exit_broadcasts_leave_and_unregisters() {
    let server = TestServer::start().await;
    let (mut bob, _) = server.join("bob").await;
    let (mut alice, _) = server.join("alice").await;
    bob.recv().await; // JOIN alice

    alice.send(&Envelope::Exit { name: "alice".into() }).await;
    assert_eq!(bob.recv().await, Envelope::Leave { name: "alice".into() });
    alice.expect_closed().await;
    server.wait_for_members(&["bob"]).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_abrupt_disconnect_broadcasts_leave() {
    let server = TestServer::start().await;
    let (mut bob, _) = server.join("bob").await;
    let (alice, _) = server.join("alice").await;
    bob.recv().await;

    drop(alice);
    assert_eq!(bob.recv().await, Envelope::Leave { name: "alice".into() });
    server.wait_for_members(&["bob"]).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_name_is_rejected() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    client.send(&Envelope::Start { name: "".into() }).await;
    assert_eq!(
        client.recv().await,
        Envelope::Error {
            message: "Screen name cannot be empty".into()
        }
    );
    assert!(server.state.registry.is_empty());

    // Still anonymous; a valid START works afterwards.
    client.send(&Envelope::Start { name: "alice".into() }).await;
    assert_eq!(
        client.recv().await,
        Envelope::UserList {
            names: vec!["alice".into()]
        }
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_chatting_before_start_is_refused() {
    let server = TestServer::start().await;
    let (mut bob, _) = server.join("bob").await;
    let mut anon = server.connect().await;
    anon.send(&Envelope::Broadcast {
        sender: "ghost".into(),
        text: "boo".into(),
    })
    .await;
    assert!(matches!(anon.recv().await, Envelope::Error { .. }));
    bob.expect_silence().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_second_start_is_refused() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;
    alice.send(&Envelope::Start { name: "alicia".into() }).await;
    assert_eq!(
        alice.recv().await,
        Envelope::Error {
            message: "Already joined as alice".into()
        }
    );
    server.wait_for_members(&["alice"]).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_name_overwrites_by_default() {
    let server = TestServer::start().await;
    let (mut first, _) = server.join("alice").await;
    let (mut second, names) = server.join("alice").await;
    assert_eq!(names, vec!["alice"]);
    // The earlier session is no longer reachable by name.
    first.expect_silence().await;

    let (_bob, _) = server.join("bob").await;
    second.recv().await; // JOIN bob

    // The displaced session leaving must not remove the new owner.
    drop(first);
    second.expect_silence().await;
    server.wait_for_members(&["alice", "bob"]).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_name_rejected_when_configured() {
    let server = TestServer::with_config(unique_names_config()).await;
    let (_first, _) = server.join("alice").await;
    let mut second = server.connect().await;
    second.send(&Envelope::Start { name: "alice".into() }).await;
    assert_eq!(
        second.recv().await,
        Envelope::Error {
            message: "Screen name alice is already in use".into()
        }
    );
    assert_eq!(server.state.registry.len(), 1);
    server.shutdown().await;
}
