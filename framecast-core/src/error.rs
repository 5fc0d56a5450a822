//! Domain-specific error types for frame delivery.
//!
//! Protocol ordering violations and malformed wire input are typed and
//! returned to the caller. Geometric search never fails: the region finder
//! degrades to the unmodified viewport instead of raising.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the framecast core.
#[derive(Debug, Error)]
pub enum FramecastError {
    // ── Synchronisation ──────────────────────────────────────────
    /// `wait_ready` exceeded its deadline.
    #[error("frame not ready after {0:?}")]
    Timeout(Duration),

    /// A version did not follow the expected sequence.
    #[error("out-of-order version: expected {expected}, got {got}")]
    OutOfOrderVersion { expected: u64, got: u64 },

    // ── Wire ─────────────────────────────────────────────────────
    /// Image payload or packet framing could not be parsed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The packet payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    // ── Pixel data ───────────────────────────────────────────────
    /// Compression or decompression of pixel data failed.
    #[error("compression error: {0}")]
    Compression(String),

    // ── Configuration / I/O ──────────────────────────────────────
    /// A configuration document could not be parsed or written.
    #[error("config error: {0}")]
    Config(String),

    /// The transport layer reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// ── WireError ─────────────────────────────────────────────────────

/// Parse failures for the per-buffer image wire format and packet framing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes remain than the layout requires.
    #[error("truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    /// An uncompressed block does not match `viewport.area() * pixel_size`.
    #[error("raw payload size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The header announced more chunks than the payload can hold.
    #[error("chunk count {0} exceeds payload")]
    TooManyChunks(u32),

    /// Bytes were left over after all requested buffers were parsed.
    #[error("{0} trailing bytes after image payload")]
    TrailingBytes(usize),

    /// The packet kind byte is not known.
    #[error("unknown packet kind: {0:#x}")]
    UnknownPacket(u8),

    /// A header field holds a value outside its domain.
    #[error("invalid {what}: {value}")]
    InvalidField { what: &'static str, value: u32 },

    /// Framed packet did not start with the expected magic.
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// Frame size exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

// ── TrackerError ──────────────────────────────────────────────────

/// Ticket discipline violations on the ROI tracker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// `update_delay` was called while no run request was outstanding.
    #[error("no outstanding ROI ticket")]
    NoOutstandingTicket,

    /// The ticket does not belong to the outstanding run request.
    #[error("stale ROI ticket {got} (outstanding {outstanding})")]
    StaleTicket { got: u64, outstanding: u64 },
}

impl From<toml::de::Error> for FramecastError {
    fn from(e: toml::de::Error) -> Self {
        FramecastError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for FramecastError {
    fn from(e: toml::ser::Error) -> Self {
        FramecastError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = FramecastError::OutOfOrderVersion {
            expected: 4,
            got: 7,
        };
        assert!(e.to_string().contains('4'));
        assert!(e.to_string().contains('7'));

        let e = FramecastError::Timeout(Duration::from_millis(250));
        assert!(e.to_string().contains("250ms"));
    }

    #[test]
    fn from_wire() {
        let e: FramecastError = WireError::TooManyChunks(9).into();
        assert!(matches!(e, FramecastError::Wire(WireError::TooManyChunks(9))));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: FramecastError = io_err.into();
        assert!(matches!(e, FramecastError::Io(_)));
    }
}
