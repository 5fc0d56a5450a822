//! Images: per-buffer pixel data plus the configuration used to produce it.
//!
//! An [`Image`] is exclusively owned by [`FrameData`](crate::FrameData). It
//! moves between the frame's pool, pending and visible lists and is reset
//! rather than reallocated when recycled.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::backend::ReadbackBackend;
use crate::error::FramecastError;
use crate::flags::Buffers;
use crate::geometry::{PixelViewport, Zoom};

// ── Formats ──────────────────────────────────────────────────────

/// Internal pixel formats an image buffer can be configured with.
pub mod format {
    pub const RGBA: u32 = 0x0001;
    pub const RGB10_A2: u32 = 0x0002;
    pub const RGBA16F: u32 = 0x0003;
    pub const RGBA32F: u32 = 0x0004;
    pub const DEPTH: u32 = 0x0010;

    /// Bytes per pixel for a known internal format.
    pub const fn pixel_size(internal_format: u32) -> u32 {
        match internal_format {
            RGBA16F => 8,
            RGBA32F => 16,
            _ => 4,
        }
    }
}

// ── Compressors ──────────────────────────────────────────────────

pub const COMPRESSOR_INVALID: u32 = 0x0;
/// Reserved "no compression" sentinel. Names above it denote compressed data.
pub const COMPRESSOR_NONE: u32 = 0x1;
pub const COMPRESSOR_AUTO: u32 = 0x2;
pub const COMPRESSOR_ZSTD: u32 = 0x100;

/// Upper bound for the buffer reserved up front when decompressing.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Compressor selection for one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressorChoice {
    /// Pick per transfer, depending on the link.
    #[default]
    Auto,
    /// Always ship raw pixels.
    None,
    /// Always compress with zstd.
    Zstd,
}

impl CompressorChoice {
    pub const fn name(self) -> u32 {
        match self {
            CompressorChoice::Auto => COMPRESSOR_AUTO,
            CompressorChoice::None => COMPRESSOR_NONE,
            CompressorChoice::Zstd => COMPRESSOR_ZSTD,
        }
    }
}

// ── StorageType / DrawableConfig ─────────────────────────────────

/// Where a frame's pixels live after readback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Main memory; read back per region.
    #[default]
    Memory,
    /// GPU texture; always read back as one whole viewport.
    Texture,
}

/// Bit depths of the drawable a frame is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawableConfig {
    pub color_bits: u32,
    pub alpha_bits: u32,
    pub stencil_bits: u32,
}

impl Default for DrawableConfig {
    fn default() -> Self {
        Self {
            color_bits: 8,
            alpha_bits: 8,
            stencil_bits: 0,
        }
    }
}

impl DrawableConfig {
    /// Internal color format matching the drawable's color depth.
    pub const fn color_format(&self) -> u32 {
        match self.color_bits {
            10 => format::RGB10_A2,
            16 => format::RGBA16F,
            32 => format::RGBA32F,
            _ => format::RGBA,
        }
    }
}

// ── PixelData ────────────────────────────────────────────────────

/// Pixel bytes of one buffer, either raw or as compressed chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelPayload {
    Raw(Bytes),
    Compressed(Vec<Bytes>),
}

/// The unit shipped on the wire for one buffer of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelData {
    pub internal_format: u32,
    pub external_format: u32,
    pub pixel_size: u32,
    /// Viewport covered by the pixels.
    pub pvp: PixelViewport,
    pub compressor_name: u32,
    pub compressor_flags: u32,
    pub payload: PixelPayload,
}

impl PixelData {
    pub fn is_compressed(&self) -> bool {
        self.compressor_name > COMPRESSOR_NONE
    }

    /// Size of the uncompressed pixels, `None` if it does not fit a `u64`.
    pub fn checked_raw_size(&self) -> Option<u64> {
        (self.pvp.area() as u64).checked_mul(u64::from(self.pixel_size))
    }

    /// Size of the uncompressed pixels, saturating.
    pub fn raw_size(&self) -> u64 {
        self.checked_raw_size().unwrap_or(u64::MAX)
    }

    /// Size of the payload as shipped.
    pub fn payload_size(&self) -> u64 {
        match &self.payload {
            PixelPayload::Raw(b) => b.len() as u64,
            PixelPayload::Compressed(chunks) => chunks.iter().map(|c| c.len() as u64).sum(),
        }
    }
}

// ── BufferSlot ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct BufferSlot {
    internal_format: u32,
    quality: f32,
    compressor: CompressorChoice,
    pixels: Option<PixelData>,
}

impl BufferSlot {
    fn new(internal_format: u32) -> Self {
        Self {
            internal_format,
            quality: 1.0,
            compressor: CompressorChoice::Auto,
            pixels: None,
        }
    }
}

// ── Image ────────────────────────────────────────────────────────

/// A color and/or depth image of one frame region.
#[derive(Debug, Clone)]
pub struct Image {
    storage: StorageType,
    pvp: PixelViewport,
    offset: (i32, i32),
    zoom: Zoom,
    use_alpha: bool,
    color: BufferSlot,
    depth: BufferSlot,
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

impl Image {
    pub fn new() -> Self {
        Self {
            storage: StorageType::Memory,
            pvp: PixelViewport::default(),
            offset: (0, 0),
            zoom: Zoom::NONE,
            use_alpha: true,
            color: BufferSlot::new(format::RGBA),
            depth: BufferSlot::new(format::DEPTH),
        }
    }

    /// Return to the freshly constructed state for reuse from the pool.
    pub fn reset(&mut self) {
        self.storage = StorageType::Memory;
        self.pvp = PixelViewport::default();
        self.offset = (0, 0);
        self.zoom = Zoom::NONE;
        self.use_alpha = true;
        self.color = BufferSlot::new(format::RGBA);
        self.depth = BufferSlot::new(format::DEPTH);
    }

    /// Release all pixel storage. Returns the number of payload bytes freed.
    pub fn flush(&mut self) -> u64 {
        let freed = [&self.color, &self.depth]
            .iter()
            .filter_map(|slot| slot.pixels.as_ref())
            .map(PixelData::payload_size)
            .sum();
        self.color.pixels = None;
        self.depth.pixels = None;
        freed
    }

    // ── Configuration ────────────────────────────────────────────

    pub fn storage_type(&self) -> StorageType {
        self.storage
    }

    pub fn set_storage_type(&mut self, storage: StorageType) {
        self.storage = storage;
    }

    pub fn pixel_viewport(&self) -> PixelViewport {
        self.pvp
    }

    pub fn set_pixel_viewport(&mut self, pvp: PixelViewport) {
        self.pvp = pvp;
    }

    /// Position of this image relative to the frame's own viewport.
    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y);
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: Zoom) {
        self.zoom = zoom;
    }

    pub fn alpha_usage(&self) -> bool {
        self.use_alpha
    }

    pub fn set_alpha_usage(&mut self, use_alpha: bool) {
        self.use_alpha = use_alpha;
    }

    pub fn quality(&self, buffer: Buffers) -> f32 {
        self.slot(buffer).quality
    }

    pub fn set_quality(&mut self, buffer: Buffers, quality: f32) {
        self.slot_mut(buffer).quality = quality;
    }

    pub fn internal_format(&self, buffer: Buffers) -> u32 {
        self.slot(buffer).internal_format
    }

    pub fn set_internal_format(&mut self, buffer: Buffers, internal_format: u32) {
        self.slot_mut(buffer).internal_format = internal_format;
    }

    pub fn compressor(&self, buffer: Buffers) -> CompressorChoice {
        self.slot(buffer).compressor
    }

    pub fn use_compressor(&mut self, buffer: Buffers, choice: CompressorChoice) {
        self.slot_mut(buffer).compressor = choice;
    }

    // ── Pixel data ───────────────────────────────────────────────

    pub fn has_pixel_data(&self, buffer: Buffers) -> bool {
        self.slot(buffer).pixels.is_some()
    }

    pub fn pixel_data(&self, buffer: Buffers) -> Option<&PixelData> {
        self.slot(buffer).pixels.as_ref()
    }

    pub fn set_pixel_data(&mut self, buffer: Buffers, data: PixelData) {
        self.slot_mut(buffer).pixels = Some(data);
    }

    /// Buffers that currently hold pixel data.
    pub fn buffers(&self) -> Buffers {
        let mut buffers = Buffers::empty();
        for buffer in Buffers::WIRE_ORDER {
            if self.has_pixel_data(buffer) {
                buffers |= buffer;
            }
        }
        buffers
    }

    /// Uncompressed size of `buffer`, `0` without data.
    pub fn pixel_data_size(&self, buffer: Buffers) -> u64 {
        self.pixel_data(buffer).map_or(0, PixelData::raw_size)
    }

    /// Read `buffers` inside `pvp` from the backend.
    ///
    /// Returns `true` if at least one buffer produced data.
    pub fn start_readback(
        &mut self,
        buffers: Buffers,
        pvp: PixelViewport,
        zoom: Zoom,
        backend: &mut dyn ReadbackBackend,
    ) -> bool {
        self.pvp = pvp;
        self.zoom = zoom;
        let storage = self.storage;
        let data_pvp = pvp.apply_zoom(zoom);
        let mut produced = false;

        for buffer in Buffers::WIRE_ORDER {
            if !buffers.contains(buffer) {
                continue;
            }
            let slot = self.slot_mut(buffer);
            let internal_format = slot.internal_format;
            slot.pixels = backend
                .read_pixels(buffer, &pvp, zoom, storage, internal_format)
                .map(|read| PixelData {
                    internal_format,
                    external_format: read.external_format,
                    pixel_size: read.pixel_size,
                    pvp: data_pvp,
                    compressor_name: COMPRESSOR_NONE,
                    compressor_flags: 0,
                    payload: PixelPayload::Raw(read.data),
                });
            produced |= slot.pixels.is_some();
        }
        produced
    }

    /// Compress `buffer` into zstd chunks of at most `chunk_size` raw bytes.
    ///
    /// Already-compressed data is returned as is.
    pub fn compress_pixel_data(
        &self,
        buffer: Buffers,
        level: i32,
        chunk_size: usize,
    ) -> Result<Option<PixelData>, FramecastError> {
        let Some(data) = self.pixel_data(buffer) else {
            return Ok(None);
        };
        let raw = match &data.payload {
            PixelPayload::Compressed(_) => return Ok(Some(data.clone())),
            PixelPayload::Raw(raw) => raw,
        };

        let chunk_size = chunk_size.max(1);
        let chunks = raw
            .chunks(chunk_size)
            .map(|chunk| {
                zstd::encode_all(chunk, level)
                    .map(Bytes::from)
                    .map_err(|e| FramecastError::Compression(format!("zstd encode failed: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PixelData {
            compressor_name: COMPRESSOR_ZSTD,
            compressor_flags: 0,
            payload: PixelPayload::Compressed(chunks),
            ..data.clone()
        }))
    }

    /// Raw pixel bytes of `buffer`, decompressing if needed.
    pub fn decompressed(&self, buffer: Buffers) -> Result<Option<Bytes>, FramecastError> {
        let Some(data) = self.pixel_data(buffer) else {
            return Ok(None);
        };
        let chunks = match &data.payload {
            PixelPayload::Raw(raw) => return Ok(Some(raw.clone())),
            PixelPayload::Compressed(chunks) => chunks,
        };
        if data.compressor_name != COMPRESSOR_ZSTD {
            return Err(FramecastError::Compression(format!(
                "unknown compressor {:#x}",
                data.compressor_name
            )));
        }

        let expected = data.checked_raw_size().ok_or_else(|| {
            FramecastError::Compression(format!("pixel data of {} is too large", data.pvp))
        })?;
        let capacity = usize::try_from(expected).map_or(MAX_PREALLOC, |n| n.min(MAX_PREALLOC));
        let mut out = BytesMut::with_capacity(capacity);
        for chunk in chunks {
            let decoded = zstd::decode_all(chunk.as_ref())
                .map_err(|e| FramecastError::Compression(format!("zstd decode failed: {e}")))?;
            out.extend_from_slice(&decoded);
            if out.len() as u64 > expected {
                break;
            }
        }
        if out.len() as u64 != expected {
            return Err(FramecastError::Compression(format!(
                "decompressed {} bytes, expected {expected}",
                out.len()
            )));
        }
        Ok(Some(out.freeze()))
    }

    // ── Internal ─────────────────────────────────────────────────

    fn slot(&self, buffer: Buffers) -> &BufferSlot {
        if buffer == Buffers::DEPTH {
            &self.depth
        } else {
            debug_assert_eq!(buffer, Buffers::COLOR);
            &self.color
        }
    }

    fn slot_mut(&mut self, buffer: Buffers) -> &mut BufferSlot {
        if buffer == Buffers::DEPTH {
            &mut self.depth
        } else {
            debug_assert_eq!(buffer, Buffers::COLOR);
            &mut self.color
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
