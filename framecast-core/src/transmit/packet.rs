//! Packets exchanged between the producing and consuming node.
//!
//! ## Payload layouts (little-endian)
//!
//! **Transmit** (37 byte header + image data):
//! ```text
//! frame_version:  u64
//! viewport:       x:i32 y:i32 w:i32 h:i32
//! zoom:           x:f32 y:f32
//! buffers:        u32
//! use_alpha:      u8
//! data:           one encoded buffer per flag, color first
//! ```
//!
//! **Ready** (61 bytes):
//! ```text
//! frame_version:  u64
//! viewport:       x:i32 y:i32 w:i32 h:i32
//! frame_type:     u8   (0 = memory, 1 = texture)
//! buffers:        u32
//! period:         u32
//! phase:          u32
//! pixel:          x:i32 y:i32 w:i32 h:i32
//! zoom:           x:f32 y:f32
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FramecastError, WireError};
use crate::flags::Buffers;
use crate::frame_data::{FrameData, FrameSnapshot};
use crate::geometry::{PixelDecomposition, PixelViewport, Zoom};
use crate::image::{CompressorChoice, Image, StorageType};
use crate::wire;

/// Packet kind byte for [`TransmitPacket`].
pub const KIND_TRANSMIT: u8 = 0x01;
/// Packet kind byte for [`ReadyPacket`].
pub const KIND_READY: u8 = 0x02;

// ── TransmitPacket ───────────────────────────────────────────────

/// One image of a frame version.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitPacket {
    pub frame_version: u64,
    pub pvp: PixelViewport,
    pub zoom: Zoom,
    pub buffers: Buffers,
    pub use_alpha: bool,
    /// Encoded buffers, see [`wire`](crate::wire).
    pub data: Bytes,
}

impl TransmitPacket {
    pub const HEADER_SIZE: usize = 37;

    /// Serialise `image` for `frame_version`.
    ///
    /// A buffer is compressed when its compressor is `Zstd`, or `Auto` with
    /// `compress` set.
    pub fn from_image(
        frame_version: u64,
        image: &Image,
        compress: bool,
        level: i32,
        chunk_size: usize,
    ) -> Result<Self, FramecastError> {
        let buffers = image.buffers();
        let mut data = BytesMut::new();

        for buffer in Buffers::WIRE_ORDER {
            if !buffers.contains(buffer) {
                continue;
            }
            let use_zstd = match image.compressor(buffer) {
                CompressorChoice::Zstd => true,
                CompressorChoice::Auto => compress,
                CompressorChoice::None => false,
            };
            let pixels = if use_zstd {
                image.compress_pixel_data(buffer, level, chunk_size)?
            } else {
                image.pixel_data(buffer).cloned()
            };
            if let Some(pixels) = pixels {
                wire::encode_buffer(&pixels, &mut data);
            }
        }

        Ok(Self {
            frame_version,
            pvp: image.pixel_viewport(),
            zoom: image.zoom(),
            buffers,
            use_alpha: image.alpha_usage(),
            data: data.freeze(),
        })
    }

    pub(crate) fn encode_payload(&self, dst: &mut BytesMut) {
        dst.reserve(Self::HEADER_SIZE + self.data.len());
        dst.put_u64_le(self.frame_version);
        put_viewport(dst, &self.pvp);
        put_zoom(dst, self.zoom);
        dst.put_u32_le(self.buffers.bits());
        dst.put_u8(u8::from(self.use_alpha));
        dst.extend_from_slice(&self.data);
    }

    pub(crate) fn decode_payload(mut src: Bytes) -> Result<Self, WireError> {
        ensure(&src, Self::HEADER_SIZE, "transmit header")?;
        Ok(Self {
            frame_version: src.get_u64_le(),
            pvp: get_viewport(&mut src),
            zoom: get_zoom(&mut src),
            buffers: Buffers::from_bits_truncate(src.get_u32_le()),
            use_alpha: src.get_u8() != 0,
            data: src,
        })
    }
}

// ── ReadyPacket ──────────────────────────────────────────────────

/// Commit of a frame version with its description.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyPacket {
    pub frame_version: u64,
    pub snapshot: FrameSnapshot,
}

impl ReadyPacket {
    pub const SIZE: usize = 61;

    /// Ready packet for the frame's current version and description.
    pub fn from_frame(frame: &FrameData) -> Self {
        Self {
            frame_version: frame.version(),
            snapshot: frame.snapshot(),
        }
    }

    pub(crate) fn encode_payload(&self, dst: &mut BytesMut) {
        let s = &self.snapshot;
        dst.reserve(Self::SIZE);
        dst.put_u64_le(self.frame_version);
        put_viewport(dst, &s.pvp);
        dst.put_u8(match s.frame_type {
            StorageType::Memory => 0,
            StorageType::Texture => 1,
        });
        dst.put_u32_le(s.buffers.bits());
        dst.put_u32_le(s.period);
        dst.put_u32_le(s.phase);
        dst.put_i32_le(s.pixel.x);
        dst.put_i32_le(s.pixel.y);
        dst.put_i32_le(s.pixel.w);
        dst.put_i32_le(s.pixel.h);
        put_zoom(dst, s.zoom);
    }

    pub(crate) fn decode_payload(mut src: Bytes) -> Result<Self, WireError> {
        ensure(&src, Self::SIZE, "ready packet")?;
        if src.len() > Self::SIZE {
            return Err(WireError::TrailingBytes(src.len() - Self::SIZE));
        }

        let frame_version = src.get_u64_le();
        let pvp = get_viewport(&mut src);
        let frame_type = match src.get_u8() {
            0 => StorageType::Memory,
            1 => StorageType::Texture,
            other => {
                return Err(WireError::InvalidField {
                    what: "frame type",
                    value: u32::from(other),
                });
            }
        };
        let buffers = Buffers::from_bits_truncate(src.get_u32_le());
        let period = src.get_u32_le();
        let phase = src.get_u32_le();
        let pixel = PixelDecomposition {
            x: src.get_i32_le(),
            y: src.get_i32_le(),
            w: src.get_i32_le(),
            h: src.get_i32_le(),
        };
        let zoom = get_zoom(&mut src);

        Ok(Self {
            frame_version,
            snapshot: FrameSnapshot {
                pvp,
                frame_type,
                buffers,
                period,
                phase,
                pixel,
                zoom,
            },
        })
    }
}

// ── FramePacket ──────────────────────────────────────────────────

/// Everything the frame codec carries.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePacket {
    Transmit(TransmitPacket),
    Ready(ReadyPacket),
}

impl FramePacket {
    pub fn kind(&self) -> u8 {
        match self {
            FramePacket::Transmit(_) => KIND_TRANSMIT,
            FramePacket::Ready(_) => KIND_READY,
        }
    }

    pub fn frame_version(&self) -> u64 {
        match self {
            FramePacket::Transmit(p) => p.frame_version,
            FramePacket::Ready(p) => p.frame_version,
        }
    }

    pub(crate) fn encode_payload(&self, dst: &mut BytesMut) {
        match self {
            FramePacket::Transmit(p) => p.encode_payload(dst),
            FramePacket::Ready(p) => p.encode_payload(dst),
        }
    }

    pub(crate) fn decode_payload(kind: u8, payload: Bytes) -> Result<Self, WireError> {
        match kind {
            KIND_TRANSMIT => TransmitPacket::decode_payload(payload).map(FramePacket::Transmit),
            KIND_READY => ReadyPacket::decode_payload(payload).map(FramePacket::Ready),
            other => Err(WireError::UnknownPacket(other)),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn put_viewport(dst: &mut BytesMut, pvp: &PixelViewport) {
    dst.put_i32_le(pvp.x);
    dst.put_i32_le(pvp.y);
    dst.put_i32_le(pvp.w);
    dst.put_i32_le(pvp.h);
}

fn get_viewport(src: &mut Bytes) -> PixelViewport {
    PixelViewport::new(
        src.get_i32_le(),
        src.get_i32_le(),
        src.get_i32_le(),
        src.get_i32_le(),
    )
}

fn put_zoom(dst: &mut BytesMut, zoom: Zoom) {
    dst.put_f32_le(zoom.x);
    dst.put_f32_le(zoom.y);
}

fn get_zoom(src: &mut Bytes) -> Zoom {
    Zoom::new(src.get_f32_le(), src.get_f32_le())
}

fn ensure(src: &Bytes, need: usize, what: &'static str) -> Result<(), WireError> {
    if src.len() < need {
        return Err(WireError::Truncated {
            what,
            need,
            have: src.len(),
        });
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ReadbackBackend, ReadbackPixels};
    use crate::image::{PixelPayload, format};

    struct Gradient;

    impl ReadbackBackend for Gradient {
        fn read_pixels(
            &mut self,
            _buffer: Buffers,
            pvp: &PixelViewport,
            _zoom: Zoom,
            _storage: StorageType,
            internal_format: u32,
        ) -> Option<ReadbackPixels> {
            let pixel_size = format::pixel_size(internal_format);
            let len = pvp.area() as usize * pixel_size as usize;
            Some(ReadbackPixels {
                external_format: 0x80E1,
                pixel_size,
                data: (0..len).map(|i| (i / 64) as u8).collect::<Vec<_>>().into(),
            })
        }
    }

    fn image() -> Image {
        let mut image = Image::new();
        image.start_readback(
            Buffers::COLOR | Buffers::DEPTH,
            PixelViewport::new(16, 32, 32, 32),
            Zoom::NONE,
            &mut Gradient,
        );
        image
    }

    #[test]
    fn transmit_packet_carries_image_buffers() {
        let image = image();
        let packet = TransmitPacket::from_image(7, &image, false, 1, 1024).unwrap();
        assert_eq!(packet.buffers, Buffers::COLOR | Buffers::DEPTH);
        assert_eq!(packet.pvp, PixelViewport::new(16, 32, 32, 32));

        let mut data = packet.data.clone();
        let color = wire::decode_buffer(&mut data).unwrap();
        let depth = wire::decode_buffer(&mut data).unwrap();
        assert!(data.is_empty());
        assert!(!color.is_compressed());
        assert_eq!(depth.internal_format, format::DEPTH);

        let mut buf = BytesMut::new();
        packet.encode_payload(&mut buf);
        assert_eq!(buf.len(), TransmitPacket::HEADER_SIZE + packet.data.len());
        assert_eq!(TransmitPacket::decode_payload(buf.freeze()).unwrap(), packet);
    }

    #[test]
    fn compressor_choice_per_buffer() {
        let mut image = image();
        image.use_compressor(Buffers::DEPTH, CompressorChoice::None);
        let packet = TransmitPacket::from_image(1, &image, true, 1, 1024).unwrap();

        let mut data = packet.data.clone();
        let color = wire::decode_buffer(&mut data).unwrap();
        let depth = wire::decode_buffer(&mut data).unwrap();
        assert!(color.is_compressed());
        assert!(matches!(color.payload, PixelPayload::Compressed(ref c) if c.len() == 4));
        assert!(!depth.is_compressed());
    }

    #[test]
    fn ready_packet_layout() {
        let packet = ReadyPacket {
            frame_version: 12,
            snapshot: FrameSnapshot {
                pvp: PixelViewport::new(1, 2, 3, 4),
                frame_type: StorageType::Texture,
                buffers: Buffers::DEPTH,
                period: 2,
                phase: 1,
                pixel: PixelDecomposition {
                    x: 1,
                    y: 0,
                    w: 2,
                    h: 1,
                },
                zoom: Zoom::new(0.5, 0.5),
            },
        };
        let mut buf = BytesMut::new();
        packet.encode_payload(&mut buf);
        assert_eq!(buf.len(), ReadyPacket::SIZE);
        assert_eq!(ReadyPacket::decode_payload(buf.clone().freeze()).unwrap(), packet);

        buf[24] = 9;
        assert_eq!(
            ReadyPacket::decode_payload(buf.freeze()),
            Err(WireError::InvalidField {
                what: "frame type",
                value: 9
            })
        );
    }

    #[test]
    fn unknown_kind_rejected() {
        assert_eq!(
            FramePacket::decode_payload(0x7F, Bytes::new()),
            Err(WireError::UnknownPacket(0x7F))
        );
    }
}
