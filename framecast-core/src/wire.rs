//! Per-buffer image wire format.
//!
//! Each buffer carried by an image (color first, then depth) is encoded as a
//! fixed little-endian header followed by its payload:
//!
//! ```text
//! internal_format:  u32
//! external_format:  u32
//! pixel_size:       u32
//! viewport:         x:i32 y:i32 w:i32 h:i32
//! compressor_name:  u32
//! compressor_flags: u32
//! chunk_count:      u32
//! ```
//!
//! Uncompressed buffers follow with one `{size:u64, bytes}` block whose size
//! must equal `viewport.area() * pixel_size`. Compressed buffers
//! (`compressor_name > COMPRESSOR_NONE`) follow with `chunk_count` such
//! blocks.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::WireError;
use crate::geometry::PixelViewport;
use crate::image::{COMPRESSOR_NONE, PixelData, PixelPayload};

/// Encoded size of the per-buffer header.
pub const IMAGE_HEADER_SIZE: usize = 40;

/// Size of the length prefix in front of every payload block.
const BLOCK_PREFIX_SIZE: usize = 8;

/// Bytes `data` occupies on the wire.
pub fn encoded_len(data: &PixelData) -> usize {
    let blocks = match &data.payload {
        PixelPayload::Raw(raw) => BLOCK_PREFIX_SIZE + raw.len(),
        PixelPayload::Compressed(chunks) => {
            chunks.iter().map(|c| BLOCK_PREFIX_SIZE + c.len()).sum()
        }
    };
    IMAGE_HEADER_SIZE + blocks
}

/// Append one buffer's header and payload to `dst`.
pub fn encode_buffer(data: &PixelData, dst: &mut BytesMut) {
    dst.reserve(encoded_len(data));

    let chunk_count = match &data.payload {
        PixelPayload::Raw(_) => 1,
        PixelPayload::Compressed(chunks) => chunks.len() as u32,
    };
    let compressor_name = match &data.payload {
        PixelPayload::Raw(_) => COMPRESSOR_NONE,
        PixelPayload::Compressed(_) => data.compressor_name,
    };

    dst.put_u32_le(data.internal_format);
    dst.put_u32_le(data.external_format);
    dst.put_u32_le(data.pixel_size);
    dst.put_i32_le(data.pvp.x);
    dst.put_i32_le(data.pvp.y);
    dst.put_i32_le(data.pvp.w);
    dst.put_i32_le(data.pvp.h);
    dst.put_u32_le(compressor_name);
    dst.put_u32_le(data.compressor_flags);
    dst.put_u32_le(chunk_count);

    match &data.payload {
        PixelPayload::Raw(raw) => put_block(dst, raw),
        PixelPayload::Compressed(chunks) => {
            for chunk in chunks {
                put_block(dst, chunk);
            }
        }
    }
}

/// Parse one buffer from the front of `src`, advancing it.
///
/// Payload blocks are zero-copy slices of `src`.
pub fn decode_buffer(src: &mut Bytes) -> Result<PixelData, WireError> {
    ensure(src, IMAGE_HEADER_SIZE, "image header")?;

    let internal_format = src.get_u32_le();
    let external_format = src.get_u32_le();
    let pixel_size = src.get_u32_le();
    let pvp = PixelViewport::new(
        src.get_i32_le(),
        src.get_i32_le(),
        src.get_i32_le(),
        src.get_i32_le(),
    );
    let compressor_name = src.get_u32_le();
    let compressor_flags = src.get_u32_le();
    let chunk_count = src.get_u32_le();

    let payload = if compressor_name > COMPRESSOR_NONE {
        if chunk_count as usize * BLOCK_PREFIX_SIZE > src.remaining() {
            return Err(WireError::TooManyChunks(chunk_count));
        }
        let chunks = (0..chunk_count)
            .map(|_| take_block(src))
            .collect::<Result<Vec<_>, _>>()?;
        PixelPayload::Compressed(chunks)
    } else {
        if !pvp.is_valid() {
            return Err(WireError::InvalidField {
                what: "viewport extent",
                value: pvp.w.min(pvp.h) as u32,
            });
        }
        let expected = (pvp.area() as u64)
            .checked_mul(u64::from(pixel_size))
            .ok_or(WireError::InvalidField {
                what: "pixel size",
                value: pixel_size,
            })?;
        let raw = take_block(src)?;
        if raw.len() as u64 != expected {
            return Err(WireError::SizeMismatch {
                expected,
                actual: raw.len() as u64,
            });
        }
        PixelPayload::Raw(raw)
    };

    Ok(PixelData {
        internal_format,
        external_format,
        pixel_size,
        pvp,
        compressor_name,
        compressor_flags,
        payload,
    })
}

// ── Internal ─────────────────────────────────────────────────────

fn put_block(dst: &mut BytesMut, block: &Bytes) {
    dst.put_u64_le(block.len() as u64);
    dst.extend_from_slice(block);
}

fn take_block(src: &mut Bytes) -> Result<Bytes, WireError> {
    ensure(src, BLOCK_PREFIX_SIZE, "block size")?;
    let size = src.get_u64_le();
    let size = usize::try_from(size).map_err(|_| WireError::Truncated {
        what: "block payload",
        need: usize::MAX,
        have: src.remaining(),
    })?;
    ensure(src, size, "block payload")?;
    Ok(src.split_to(size))
}

fn ensure(src: &Bytes, need: usize, what: &'static str) -> Result<(), WireError> {
    if src.remaining() < need {
        return Err(WireError::Truncated {
            what,
            need,
            have: src.remaining(),
        });
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
