// tests/property/codec_test.rs

//! Property-based tests for the wire codec
//! Every envelope survives encode/decode, however the bytes are chunked.

use bytes::BytesMut;
use proptest::prelude::*;
use relaychat::core::Envelope;
use relaychat::core::protocol::{DEFAULT_MAX_FRAME_SIZE, FrameCodec, read_envelope};
use tokio_util::codec::Decoder;

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![".{0,64}", "[a-zA-Z0-9 ]{0,16}", Just(String::new())]
}

fn arb_envelope() -> impl Strategy<Value = Envelope> {
    prop_oneof![
        arb_text().prop_map(|name| Envelope::Start { name }),
        (arb_text(), arb_text()).prop_map(|(sender, text)| Envelope::Broadcast { sender, text }),
        (arb_text(), arb_text(), proptest::option::of(arb_text())).prop_map(
            |(sender, text, recipient)| Envelope::Private {
                sender,
                text,
                recipient
            }
        ),
        arb_text().prop_map(|name| Envelope::Exit { name }),
        arb_text().prop_map(|name| Envelope::Join { name }),
        arb_text().prop_map(|name| Envelope::Leave { name }),
        proptest::collection::vec(arb_text(), 0..8).prop_map(|names| Envelope::UserList { names }),
        arb_text().prop_map(|message| Envelope::Error { message }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_payload_roundtrip(envelope in arb_envelope()) {
        let payload = envelope.to_payload().unwrap();
        prop_assert_eq!(Envelope::from_payload(&payload).unwrap(), envelope);
    }

    #[test]
    fn test_decoder_handles_arbitrary_chunking(
        envelopes in proptest::collection::vec(arb_envelope(), 1..6),
        chunk in 1usize..17,
    ) {
        let mut wire = Vec::new();
        for envelope in &envelopes {
            wire.extend_from_slice(&envelope.encode_to_frame().unwrap());
        }

        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(payload) = codec.decode(&mut buf).unwrap() {
                decoded.push(Envelope::from_payload(&payload).unwrap());
            }
        }
        prop_assert!(buf.is_empty());
        prop_assert_eq!(decoded, envelopes);
    }

    #[test]
    fn test_reader_handles_short_reads(envelope in arb_envelope(), chunk in 1usize..9) {
        let frame = envelope.encode_to_frame().unwrap();
        let mut builder = tokio_test::io::Builder::new();
        for piece in frame.chunks(chunk) {
            builder.read(piece);
        }
        let mut reader = builder.build();

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let read = rt.block_on(read_envelope(&mut reader, DEFAULT_MAX_FRAME_SIZE)).unwrap();
        prop_assert_eq!(read, Some(envelope));
    }

    #[test]
    fn test_garbage_payload_never_panics(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = Envelope::from_payload(&payload);
    }
}
