// tests/integration/fixtures.rs

//! Shared configurations and payloads for integration tests

use relaychat::config::Config;

/// A configuration bound to an ephemeral localhost port.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        send_timeout_ms: 1000,
        ..Config::default()
    }
}

/// Same as `test_config`, but a second START for a taken name is rejected.
pub fn unique_names_config() -> Config {
    Config {
        reject_duplicate_names: true,
        ..test_config()
    }
}

/// Payloads that frame correctly but do not decode to an envelope.
pub fn malformed_payloads() -> Vec<&'static [u8]> {
    vec![
        &b"not json"[..],
        b"{\"kind\":\"BROADCAST\"}",
        b"[]",
        b"[42,\"x\"]",
        b"[\"SHOUT\",\"x\"]",
        b"[\"BROADCAST\",\"only-one-field\"]",
        b"[\"START\",7]",
        b"\xff\xfe",
    ]
}
