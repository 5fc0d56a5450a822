//! # framecast-core
//!
//! Frame delivery core for cluster rendering.
//!
//! This crate contains:
//! - **Frame data**: `FrameData`, a versioned frame with readiness
//!   monitoring, listeners, and an image pool
//! - **Images**: `Image`, `PixelData`, per-buffer formats and zstd compression
//! - **Wire**: the per-buffer image header format
//! - **ROI**: `RoiFinder`, `EmptySpaceFinder`, `RoiTracker` for reading back
//!   only the regions that hold content
//! - **Transmit**: `FrameCodec` framing, `FrameSender` / `FrameReceiver`,
//!   `LinkEstimator` for the compression decision
//! - **Config**: `FramecastConfig`, loadable from TOML
//! - **Error**: `FramecastError`, a typed `thiserror` hierarchy

pub mod backend;
pub mod config;
pub mod error;
pub mod flags;
pub mod frame_data;
pub mod geometry;
pub mod image;
pub mod monitor;
pub mod roi;
pub mod transmit;
pub mod wire;

// ── Re-exports ───────────────────────────────────────────────────

pub use backend::{BlockStatistics, ReadbackBackend, ReadbackPixels};
pub use config::{FrameConfig, FramecastConfig, RoiConfig, TrackerConfig, TransmitConfig};
pub use error::{FramecastError, TrackerError, WireError};
pub use flags::Buffers;
pub use frame_data::{FrameData, FrameSnapshot, FrameTarget, Listener};
pub use geometry::{PixelDecomposition, PixelViewport, Zoom};
pub use image::{CompressorChoice, DrawableConfig, Image, PixelData, PixelPayload, StorageType};
pub use monitor::Monitor;
pub use roi::{EmptySpaceFinder, RoiFinder, RoiTracker, Ticket};
pub use transmit::{
    FrameCodec, FramePacket, FrameReceiver, FrameSender, LinkEstimator, ReadyPacket,
    TransmitPacket,
};
