//! Transport framing.
//!
//! Each frame is a 4-byte big-endian length prefix followed by the codec
//! payload. Framing is independent of the payload codec on purpose: the
//! read loop extracts complete frames and hands the payload bytes to the
//! [`crate::wire::FrameCodec`].

use bytes::{Buf, Bytes, BytesMut};
use log::trace;

pub const FRAME_LENGTH_SIZE: usize = 4;
pub const FRAME_MAX_SIZE: usize = 1 << 24;

/// Encodes a payload into a length-prefixed frame.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
    let payload_len = payload.len();

    if payload_len >= FRAME_MAX_SIZE {
        return Err(anyhow::anyhow!(
            "Frame is too large (max: {}, got: {})",
            FRAME_MAX_SIZE,
            payload_len
        ));
    }

    let mut data = Vec::with_capacity(FRAME_LENGTH_SIZE + payload_len);
    data.extend_from_slice(&(payload_len as u32).to_be_bytes());
    data.extend_from_slice(payload);
    Ok(data)
}

/// A frame decoder that buffers incoming data and extracts complete frames.
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds raw data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame from the buffer.
    /// Returns Some(frame_payload) if a complete frame is available, None otherwise.
    pub fn decode_frame(&mut self) -> Option<Bytes> {
        if self.buffer.len() < FRAME_LENGTH_SIZE {
            return None;
        }

        let frame_len = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]) as usize;

        if self.buffer.len() >= FRAME_LENGTH_SIZE + frame_len {
            self.buffer.advance(FRAME_LENGTH_SIZE);
            let frame_data = self.buffer.split_to(frame_len).freeze();
            trace!("<-- Decoded frame: {} bytes", frame_data.len());
            Some(frame_data)
        } else {
            None
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame() {
        let payload = vec![1, 2, 3, 4, 5];
        let encoded = encode_frame(&payload).unwrap();

        assert_eq!(&encoded[..4], &[0, 0, 0, 5]);
        assert_eq!(&encoded[4..], &payload[..]);
    }

    #[test]
    fn test_frame_decoder_partial_input() {
        let mut decoder = FrameDecoder::new();

        decoder.feed(&[0, 0, 0, 5, 1, 2]);
        assert!(decoder.decode_frame().is_none());

        decoder.feed(&[3, 4, 5]);
        let frame = decoder.decode_frame().unwrap();
        assert_eq!(&frame[..], &[1, 2, 3, 4, 5]);

        assert!(decoder.decode_frame().is_none());
    }

    #[test]
    fn test_frame_decoder_multiple_frames() {
        let mut decoder = FrameDecoder::new();

        decoder.feed(&[0, 0, 0, 2, 0xAA, 0xBB, 0, 0, 0, 3, 0xCC, 0xDD, 0xEE]);

        let frame1 = decoder.decode_frame().unwrap();
        assert_eq!(&frame1[..], &[0xAA, 0xBB]);

        let frame2 = decoder.decode_frame().unwrap();
        assert_eq!(&frame2[..], &[0xCC, 0xDD, 0xEE]);

        assert!(decoder.decode_frame().is_none());
    }

    #[test]
    fn test_encode_frame_too_large() {
        let large_payload = vec![0u8; FRAME_MAX_SIZE];
        let result = encode_frame(&large_payload);
        assert!(result.is_err());
    }
}
