// tests/integration/robustness_test.rs

//! Malformed input, fragmented frames, concurrency, and shutdown

use super::fixtures::{malformed_payloads, test_config};
use super::test_helpers::{TestServer, sorted};
use relaychat::core::Envelope;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn test_malformed_frames_do_not_end_session() {
    let server = TestServer::start().await;
    let (mut bob, _) = server.join("bob").await;
    let (mut alice, _) = server.join("alice").await;
    bob.recv().await;

    for payload in malformed_payloads() {
        alice.send_payload(payload).await;
    }
    alice
        .send(&Envelope::Broadcast {
            sender: "alice".into(),
            text: "still here".into(),
        })
        .await;

    assert_eq!(
        bob.recv().await,
        Envelope::Broadcast {
            sender: "alice".into(),
            text: "still here".into(),
        }
    );
    server.wait_for_members(&["alice", "bob"]).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_frame_split_across_many_writes() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;

    let frame = Envelope::Start { name: "alice".into() }
        .encode_to_frame()
        .unwrap();
    for byte in frame.iter() {
        alice.stream.write_all(&[*byte]).await.unwrap();
        alice.stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(
        alice.recv().await,
        Envelope::UserList {
            names: vec!["alice".into()]
        }
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let config = relaychat::config::Config {
        max_frame_size: 64,
        ..test_config()
    };
    let server = TestServer::with_config(config).await;
    let (mut bob, _) = server.join("bob").await;
    let (mut alice, _) = server.join("alice").await;
    bob.recv().await;

    alice.send_payload(&[b'x'; 65]).await;
    alice.expect_closed().await;
    assert_eq!(bob.recv().await, Envelope::Leave { name: "alice".into() });
    server.shutdown().await;
}

#[tokio::test]
async fn test_truncated_frame_then_disconnect() {
    let server = TestServer::start().await;
    let (mut bob, _) = server.join("bob").await;
    let (mut alice, _) = server.join("alice").await;
    bob.recv().await;

    // Prefix promises 100 bytes; only 3 arrive before the peer goes away.
    alice.stream.write_all(&100u32.to_be_bytes()).await.unwrap();
    alice.stream.write_all(b"[\"B").await.unwrap();
    drop(alice);

    assert_eq!(bob.recv().await, Envelope::Leave { name: "alice".into() });
    server.wait_for_members(&["bob"]).await;
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_all_registered() {
    let server = TestServer::start().await;
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..32 {
        let mut client = server.connect().await;
        tasks.spawn(async move {
            client
                .send(&Envelope::Start { name: format!("user-{i}") })
                .await;
            client
        });
    }
    let mut clients = Vec::new();
    while let Some(res) = tasks.join_next().await {
        clients.push(res.unwrap());
    }

    let expected: Vec<String> = (0..32).map(|i| format!("user-{i}")).collect();
    let expected_refs: Vec<&str> = expected.iter().map(String::as_str).collect();
    server.wait_for_members(&expected_refs).await;
    assert_eq!(sorted(server.state.registry.snapshot()), sorted(expected));

    drop(clients);
    server.wait_for_members(&[]).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_open_sessions() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;
    let state = server.state.clone();
    server.shutdown().await;
    alice.expect_closed().await;
    assert!(state.registry.is_empty());
    assert!(state.stats.get_total_connections() >= 1);
}

#[tokio::test]
async fn test_stats_count_envelopes() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;
    let (mut bob, _) = server.join("bob").await;
    alice.recv().await; // JOIN bob

    alice
        .send(&Envelope::Broadcast {
            sender: "alice".into(),
            text: "counted".into(),
        })
        .await;
    bob.recv().await;

    let state = server.state.clone();
    server.shutdown().await;
    assert_eq!(state.stats.get_total_connections(), 2);
    assert_eq!(state.stats.get_envelopes_received(), 3);
    // Two USER_LISTs, one JOIN, one BROADCAST, plus any LEAVE sent during shutdown.
    assert!(state.stats.get_envelopes_delivered() >= 4);
}
