// tests/property/registry_test.rs

//! Property-based tests for the registry
//! The registered key set always matches the names that joined and have not left.

use proptest::prelude::*;
use relaychat::core::Registry;
use relaychat::core::state::ClientHandle;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
enum Op {
    /// Connection `conn` sends START with one of a few names.
    Start { conn: u64, name: u8 },
    /// Connection `conn` exits or drops.
    Leave { conn: u64 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..6, 0u8..4).prop_map(|(conn, name)| Op::Start { conn, name }),
        (0u64..6).prop_map(|conn| Op::Leave { conn }),
    ]
}

fn handle(session_id: u64) -> Arc<ClientHandle> {
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let (kill_tx, _) = broadcast::channel(1);
    Arc::new(ClientHandle::new(
        session_id,
        addr,
        Box::pin(tokio::io::sink()),
        kill_tx,
    ))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_registry_tracks_active_names(ops in proptest::collection::vec(arb_op(), 0..64)) {
        let registry = Registry::new();
        // Model: name -> owning connection, and connection -> bound name.
        let mut owners: BTreeMap<String, u64> = BTreeMap::new();
        let mut bound: BTreeMap<u64, String> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Start { conn, name } => {
                    if bound.contains_key(&conn) {
                        continue;
                    }
                    let name = format!("user-{name}");
                    registry.register(&name, handle(conn));
                    owners.insert(name.clone(), conn);
                    bound.insert(conn, name);
                }
                Op::Leave { conn } => {
                    if let Some(name) = bound.remove(&conn) {
                        let removed = registry.remove_if_owner(&name, conn).is_some();
                        let owned = owners.get(&name) == Some(&conn);
                        prop_assert_eq!(removed, owned);
                        if owned {
                            owners.remove(&name);
                        }
                    }
                }
            }
            let mut actual = registry.snapshot();
            actual.sort();
            let expected: Vec<String> = owners.keys().cloned().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
