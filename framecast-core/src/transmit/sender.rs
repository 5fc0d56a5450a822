//! Producer side: ship read-back images and the ready commit.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::debug;

use crate::config::TransmitConfig;
use crate::error::FramecastError;
use crate::frame_data::FrameData;

use super::codec::FrameCodec;
use super::link::LinkEstimator;
use super::packet::{FramePacket, ReadyPacket, TransmitPacket};

/// Serialises frame images onto a framed writer.
#[derive(Debug)]
pub struct FrameSender {
    config: TransmitConfig,
    link: LinkEstimator,
}

impl FrameSender {
    pub fn new(config: TransmitConfig) -> Self {
        let link = LinkEstimator::new(&config);
        Self { config, link }
    }

    pub fn link(&self) -> &LinkEstimator {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut LinkEstimator {
        &mut self.link
    }

    /// Build the packets for the visible images at `indices` and the ready
    /// commit of the frame's current version.
    pub fn packets(
        &self,
        frame: &FrameData,
        indices: &[usize],
    ) -> Result<Vec<FramePacket>, FramecastError> {
        let version = frame.version();
        let compress = self.link.use_compression();
        let images = frame.images();

        let mut packets = Vec::with_capacity(indices.len() + 1);
        for &index in indices {
            let Some(image) = images.get(index) else {
                debug!(index, "skipping vanished image");
                continue;
            };
            packets.push(FramePacket::Transmit(TransmitPacket::from_image(
                version,
                image,
                compress,
                self.config.zstd_level,
                self.config.chunk_size,
            )?));
        }
        packets.push(FramePacket::Ready(ReadyPacket::from_frame(frame)));
        Ok(packets)
    }

    /// Send the images at `indices` followed by the ready commit.
    ///
    /// Returns the number of payload bytes written.
    pub async fn send<W>(
        &mut self,
        sink: &mut FramedWrite<W, FrameCodec>,
        frame: &FrameData,
        indices: &[usize],
    ) -> Result<u64, FramecastError>
    where
        W: AsyncWrite + Unpin,
    {
        let packets = self.packets(frame, indices)?;
        let mut sent = 0u64;
        for packet in packets {
            let size = match &packet {
                FramePacket::Transmit(p) => (TransmitPacket::HEADER_SIZE + p.data.len()) as u64,
                FramePacket::Ready(_) => ReadyPacket::SIZE as u64,
            };
            sink.feed(packet).await?;
            sent += size;
        }
        sink.flush().await?;
        self.link.record(sent);

        debug!(
            version = frame.version(),
            images = indices.len(),
            bytes = sent,
            "sent frame"
        );
        Ok(sent)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Buffers;
    use crate::geometry::PixelViewport;
    use crate::image::{DrawableConfig, StorageType};

    #[test]
    fn packets_end_with_ready_commit() {
        let frame = FrameData::new();
        frame.set_version(4).unwrap();
        frame.update_snapshot(|s| {
            s.pvp = PixelViewport::new(0, 0, 8, 8);
            s.buffers = Buffers::COLOR;
        });
        let index = frame.new_image(StorageType::Memory, &DrawableConfig::default());

        let sender = FrameSender::new(TransmitConfig::default());
        let packets = sender.packets(&frame, &[index, 42]).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(matches!(&packets[0], FramePacket::Transmit(p) if p.frame_version == 4));
        match &packets[1] {
            FramePacket::Ready(p) => {
                assert_eq!(p.frame_version, 4);
                assert_eq!(p.snapshot.pvp, PixelViewport::new(0, 0, 8, 8));
            }
            other => panic!("expected ready packet, got {other:?}"),
        }
        frame.flush();
    }
}
