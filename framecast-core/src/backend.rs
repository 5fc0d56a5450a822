//! Collaborator traits implemented by the rendering layer.
//!
//! The core never owns a graphics context. Readback and per-block
//! statistics are borrowed from the caller for the duration of a single
//! call.

use bytes::Bytes;

use crate::flags::Buffers;
use crate::geometry::{PixelViewport, Zoom};
use crate::image::StorageType;

/// Pixels produced by a backend readback of one buffer.
#[derive(Debug, Clone)]
pub struct ReadbackPixels {
    /// Format the pixels are delivered in (e.g. `GL_BGRA`).
    pub external_format: u32,
    /// Bytes per pixel of `data`.
    pub pixel_size: u32,
    /// Tightly packed rows covering the requested viewport.
    pub data: Bytes,
}

/// Pixel readback from the rendering context.
pub trait ReadbackBackend {
    /// Read `buffer` inside `pvp` into `storage`.
    ///
    /// `internal_format` is the format the image was configured with.
    /// Returns `None` when the buffer cannot be read, which leaves the image
    /// without data for that buffer.
    fn read_pixels(
        &mut self,
        buffer: Buffers,
        pvp: &PixelViewport,
        zoom: Zoom,
        storage: StorageType,
        internal_format: u32,
    ) -> Option<ReadbackPixels>;
}

/// Cheap per-block occupancy statistics for the region finder.
pub trait BlockStatistics {
    /// Sample `bounds` at one value per `block_size × block_size` cell.
    ///
    /// The result is row-major with `ceil(w / block_size)` columns and
    /// `ceil(h / block_size)` rows. A value of `1.0` means the block is
    /// entirely background; anything below marks written content. Returns
    /// `None` when no depth information is available.
    fn sample_blocks(&mut self, bounds: &PixelViewport, block_size: u32) -> Option<Vec<f32>>;
}
