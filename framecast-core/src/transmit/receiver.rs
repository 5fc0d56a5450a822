//! Consumer side: apply received packets onto a [`FrameData`].

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, info};

use crate::error::FramecastError;
use crate::frame_data::FrameData;

use super::codec::FrameCodec;
use super::packet::FramePacket;

/// Applies decoded packets to one frame.
#[derive(Debug)]
pub struct FrameReceiver {
    frame: Arc<FrameData>,
    images: u64,
    dropped: u64,
    versions: u64,
}

impl FrameReceiver {
    pub fn new(frame: Arc<FrameData>) -> Self {
        Self {
            frame,
            images: 0,
            dropped: 0,
            versions: 0,
        }
    }

    pub fn frame(&self) -> &Arc<FrameData> {
        &self.frame
    }

    /// Images queued so far.
    pub fn images_applied(&self) -> u64 {
        self.images
    }

    /// Images rejected as stale or malformed.
    pub fn images_dropped(&self) -> u64 {
        self.dropped
    }

    /// Versions made ready so far.
    pub fn versions_applied(&self) -> u64 {
        self.versions
    }

    /// Apply one packet.
    ///
    /// Rejected images are counted and skipped. A ready packet that breaks
    /// the version sequence is an error.
    pub fn apply(&mut self, packet: FramePacket) -> Result<(), FramecastError> {
        match packet {
            FramePacket::Transmit(p) => {
                let accepted = self.frame.add_image(
                    p.frame_version,
                    p.pvp,
                    p.zoom,
                    p.buffers,
                    p.use_alpha,
                    p.data,
                );
                if accepted {
                    self.images += 1;
                } else {
                    self.dropped += 1;
                }
            }
            FramePacket::Ready(p) => {
                // The producer's target version travels with the commit. It is
                // only adopted for a commit that will be accepted.
                self.frame.check_next_ready(p.frame_version)?;
                if self.frame.version() < p.frame_version {
                    self.frame.set_version(p.frame_version)?;
                }
                self.frame.set_ready(p.frame_version, p.snapshot)?;
                self.versions += 1;
            }
        }
        Ok(())
    }

    /// Read and apply packets from `reader` until it closes.
    pub async fn run<R>(&mut self, reader: R, codec: FrameCodec) -> Result<(), FramecastError>
    where
        R: AsyncRead + Unpin,
    {
        let mut framed = FramedRead::new(reader, codec);
        while let Some(packet) = framed.next().await {
            let packet = packet?;
            debug!(
                kind = packet.kind(),
                version = packet.frame_version(),
                "received frame packet"
            );
            self.apply(packet)?;
        }
        info!(
            images = self.images,
            dropped = self.dropped,
            versions = self.versions,
            "frame stream closed"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
