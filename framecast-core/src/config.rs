//! Configuration for frame delivery and region-of-interest readback.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FramecastError;
use crate::image::CompressorChoice;

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramecastConfig {
    /// Region-of-interest search.
    pub roi: RoiConfig,
    /// Adaptive run/skip control of the region search.
    pub tracker: TrackerConfig,
    /// Image defaults for new frame data.
    pub frame: FrameConfig,
    /// Outgoing image transfer.
    pub transmit: TransmitConfig,
}

/// Region-of-interest search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    /// Run the region search at all.
    pub enabled: bool,
    /// Edge length of a statistics block in pixels.
    pub block_size: u32,
    /// Holes smaller than this many blocks are not worth a split.
    pub min_hole_blocks: u32,
    /// Holes smaller than this fraction of the searched area are ignored.
    pub min_hole_ratio: f32,
    /// Consult the effectiveness tracker before each search.
    pub use_tracker: bool,
}

/// Run/skip control for the region search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum overlap, as a fraction of the new viewport, for a previous
    /// region to count as the same region.
    pub match_ratio: f32,
    /// Minimum area reduction for a search to count as useful.
    pub min_reduction: f32,
    /// Upper bound of the skip streak.
    pub max_skip: u32,
}

/// Image defaults applied to freshly allocated images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub use_alpha: bool,
    pub color_quality: f32,
    pub depth_quality: f32,
    pub color_compressor: CompressorChoice,
    pub depth_compressor: CompressorChoice,
}

/// Outgoing image transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    /// Links at or below this bandwidth (bytes/second) get compressed images.
    pub compression_bandwidth_limit: u64,
    /// zstd level for pixel payloads.
    pub zstd_level: i32,
    /// Raw bytes per compressed chunk.
    pub chunk_size: usize,
    /// Largest framed packet accepted by the codec.
    pub max_packet_size: usize,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_size: 16,
            min_hole_blocks: 200,
            min_hole_ratio: 0.002,
            use_tracker: true,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_ratio: 2.0 / 3.0,
            min_reduction: 0.2,
            max_skip: 64,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            use_alpha: true,
            color_quality: 1.0,
            depth_quality: 1.0,
            color_compressor: CompressorChoice::Auto,
            depth_compressor: CompressorChoice::Auto,
        }
    }
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            // 2 GBit/s
            compression_bandwidth_limit: 262_144 * 1024,
            zstd_level: 1,
            chunk_size: 1024 * 1024,
            max_packet_size: 256 * 1024 * 1024,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl FramecastConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, FramecastError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, FramecastError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = FramecastConfig::default().to_toml_string().unwrap();
        assert!(text.contains("block_size"));
        assert!(text.contains("max_skip"));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg = FramecastConfig::from_toml_str(
            r#"
            [roi]
            block_size = 32

            [frame]
            color_compressor = "zstd"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.roi.block_size, 32);
        assert_eq!(cfg.roi.min_hole_blocks, 200);
        assert_eq!(cfg.frame.color_compressor, CompressorChoice::Zstd);
        assert_eq!(cfg.tracker.max_skip, 64);
    }

    #[test]
    fn invalid_document_is_an_error() {
        let err = FramecastConfig::from_toml_str("[roi]\nblock_size = \"big\"").unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = FramecastConfig::load(Path::new("/nonexistent/framecast.toml"));
        assert_eq!(cfg, FramecastConfig::default());
    }
}
