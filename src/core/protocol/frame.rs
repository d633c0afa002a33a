// src/core/protocol/frame.rs

//! Implements the length-prefixed framing: a 4-byte big-endian length `N`
//! followed by exactly `N` bytes of payload.
//!
//! Two readers are provided. `FrameCodec` is a `tokio_util::codec` decoder for
//! use with `FramedRead`; `read_frame` pulls a single frame straight off any
//! `AsyncRead` with read-exactly semantics.

use super::envelope::Envelope;
use crate::core::RelayError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound on a single payload. A peer announcing more is cut off.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Most the decoder reserves for a frame before its bytes arrive.
const MAX_EARLY_RESERVE: usize = 8 * 1024;

/// A `tokio_util::codec` implementation that yields raw frame payloads and
/// encodes `Envelope`s into frames.
///
/// Decoding stops at the frame boundary. Payload validation is
/// left to `Envelope::from_payload`, so a bad payload never terminates the
/// framed stream.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Encoder<Envelope> for FrameCodec {
    type Error = RelayError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.to_payload()?;
        if payload.len() > self.max_frame_size {
            return Err(RelayError::Framing(format!(
                "outgoing frame of {} bytes exceeds the {} byte limit",
                payload.len(),
                self.max_frame_size
            )));
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| RelayError::Framing("frame length does not fit in 32 bits".into()))?;
        dst.reserve(LENGTH_PREFIX_LEN + payload.len());
        dst.put_u32(len);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;
        if len > self.max_frame_size {
            return Err(RelayError::Framing(format!(
                "incoming frame of {len} bytes exceeds the {} byte limit",
                self.max_frame_size
            )));
        }

        if src.len() < LENGTH_PREFIX_LEN + len {
            // The declared length is untrusted; grow with the data, not ahead of it.
            let missing = LENGTH_PREFIX_LEN + len - src.len();
            src.reserve(missing.min(MAX_EARLY_RESERVE));
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(RelayError::Framing(format!(
                "stream closed with {} bytes of an unfinished frame",
                buf.len()
            ))),
        }
    }
}

/// Reads one frame payload from `reader`.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary. A
/// stream that ends partway through the prefix or the payload is a
/// `RelayError::Framing`. Short reads are retried until the full prefix and
/// payload have arrived.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Bytes>, RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RelayError::Framing(format!(
                "stream closed after {filled} of {LENGTH_PREFIX_LEN} length prefix bytes"
            )));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_frame_size {
        return Err(RelayError::Framing(format!(
            "incoming frame of {len} bytes exceeds the {max_frame_size} byte limit"
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            RelayError::Framing(format!("stream closed before {len} byte payload was complete"))
        } else {
            RelayError::from(e)
        }
    })?;
    Ok(Some(Bytes::from(payload)))
}

/// Reads and validates one envelope. `Ok(None)` means a clean end of stream.
pub async fn read_envelope<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Envelope>, RelayError>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader, max_frame_size).await? {
        Some(payload) => Envelope::from_payload(&payload).map(Some),
        None => Ok(None),
    }
}
