//! Length-delimited framing for [`FramePacket`]s.
//!
//! ## Frame layout
//!
//! ```text
//! magic:     [u8; 4]  "FCD0"
//! kind:      u8
//! checksum:  u32      first four bytes of the payload's blake3 hash, LE
//! length:    u64      payload length
//! payload:   [u8]     see packet module
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::TransmitConfig;
use crate::error::{FramecastError, WireError};

use super::packet::FramePacket;

/// Frame magic.
pub const MAGIC: [u8; 4] = *b"FCD0";

/// Size of the frame header in front of every payload.
pub const FRAME_HEADER_SIZE: usize = 17;

/// Default upper bound for one frame: 256 MiB.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 256 * 1024 * 1024;

/// Checksum carried in the frame header.
pub fn checksum(payload: &[u8]) -> u32 {
    let hash = blake3::hash(payload);
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// `tokio_util` codec for frame packets.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_packet_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    /// Codec with the packet size limit from `config`.
    pub fn from_config(config: &TransmitConfig) -> Self {
        Self::new(config.max_packet_size)
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Decoder for FrameCodec {
    type Item = FramePacket;
    type Error = FramecastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        if src[..4] != MAGIC {
            return Err(WireError::InvalidMagic.into());
        }

        let kind = src[4];
        let expected = u32::from_le_bytes([src[5], src[6], src[7], src[8]]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&src[9..FRAME_HEADER_SIZE]);
        let length = u64::from_le_bytes(len_bytes);

        let length = match usize::try_from(length) {
            Ok(length) if length <= self.max_packet_size => length,
            _ => {
                return Err(WireError::FrameTooLarge {
                    size: usize::try_from(length).unwrap_or(usize::MAX),
                    max: self.max_packet_size,
                }
                .into());
            }
        };

        if src.len() < FRAME_HEADER_SIZE + length {
            src.reserve(FRAME_HEADER_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_SIZE);
        let payload = src.split_to(length).freeze();
        if checksum(&payload) != expected {
            return Err(FramecastError::ChecksumMismatch);
        }

        Ok(Some(FramePacket::decode_payload(kind, payload)?))
    }
}

impl Encoder<FramePacket> for FrameCodec {
    type Error = FramecastError;

    fn encode(&mut self, item: FramePacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut payload = BytesMut::new();
        item.encode_payload(&mut payload);
        if payload.len() > self.max_packet_size {
            return Err(WireError::FrameTooLarge {
                size: payload.len(),
                max: self.max_packet_size,
            }
            .into());
        }

        dst.reserve(FRAME_HEADER_SIZE + payload.len());
        dst.extend_from_slice(&MAGIC);
        dst.put_u8(item.kind());
        dst.put_u32_le(checksum(&payload));
        dst.put_u64_le(payload.len() as u64);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
