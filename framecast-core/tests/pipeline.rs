//! End-to-end tests: region search, readback, transfer over an in-memory
//! stream, and readiness on the consuming side.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use framecast_core::{
    BlockStatistics, Buffers, DrawableConfig, FrameCodec, FrameData, FrameReceiver, FrameSender,
    FrameTarget, FramecastConfig, Monitor, PixelViewport, ReadbackBackend, ReadbackPixels,
    StorageType, TransmitConfig, Zoom, image::format,
};
use tokio_util::codec::FramedWrite;

// ── Helpers ──────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A synthetic framebuffer: background everywhere except `content`.
struct Scene {
    content: Vec<PixelViewport>,
}

impl BlockStatistics for Scene {
    fn sample_blocks(&mut self, bounds: &PixelViewport, block_size: u32) -> Option<Vec<f32>> {
        let bs = block_size as i32;
        let cols = (bounds.w + bs - 1) / bs;
        let rows = (bounds.h + bs - 1) / bs;
        let mut samples = Vec::new();
        for by in 0..rows {
            for bx in 0..cols {
                let block = PixelViewport::new(bounds.x + bx * bs, bounds.y + by * bs, bs, bs);
                let hit = self
                    .content
                    .iter()
                    .any(|c| c.intersect(&block).intersect(bounds).has_area());
                samples.push(if hit { 0.25 } else { 1.0 });
            }
        }
        Some(samples)
    }
}

impl ReadbackBackend for Scene {
    fn read_pixels(
        &mut self,
        buffer: Buffers,
        pvp: &PixelViewport,
        _zoom: Zoom,
        _storage: StorageType,
        internal_format: u32,
    ) -> Option<ReadbackPixels> {
        let pixel_size = format::pixel_size(internal_format);
        let fill = if buffer == Buffers::DEPTH { 0x10 } else { 0xAB };
        Some(ReadbackPixels {
            external_format: 0x80E1,
            pixel_size,
            data: Bytes::from(vec![fill; pvp.area() as usize * pixel_size as usize]),
        })
    }
}

fn producer(pvp: PixelViewport) -> FrameData {
    let frame = FrameData::new();
    frame.update_snapshot(|s| {
        s.pvp = pvp;
        s.buffers = Buffers::COLOR | Buffers::DEPTH;
        s.frame_type = StorageType::Memory;
    });
    frame
}

// ── Pipeline ─────────────────────────────────────────────────────

#[tokio::test]
async fn regions_travel_to_the_consumer() {
    init_tracing();

    let screen = PixelViewport::new(0, 0, 1024, 1024);
    let mut scene = Scene {
        content: vec![
            PixelViewport::new(412, 412, 200, 200),
            PixelViewport::new(0, 900, 100, 100),
        ],
    };

    let source = producer(screen);
    source.set_version(1).unwrap();
    let target = FrameTarget::default();

    let regions = source.readback_regions(&target, &mut scene, 0, 1);
    assert!(regions.len() >= 2);
    let covered: i64 = regions.iter().map(PixelViewport::area).sum();
    assert!(covered < screen.area() / 4);

    let indices = source.start_readback(&target, &mut scene, &DrawableConfig::default(), &regions);
    assert_eq!(indices.len(), regions.len());
    source.mark_ready();

    // Consumer side, with a listener registered up front.
    let sink = Arc::new(FrameData::new());
    let listener = Arc::new(Monitor::new(0u32));
    sink.add_listener(Arc::clone(&listener));

    let config = TransmitConfig::default();
    let (writer, reader) = tokio::io::duplex(64 * 1024);
    let receive = tokio::spawn({
        let sink = Arc::clone(&sink);
        let codec = FrameCodec::from_config(&config);
        async move {
            let mut receiver = FrameReceiver::new(sink);
            receiver.run(reader, codec).await.map(|_| receiver)
        }
    });

    let mut framed = FramedWrite::new(writer, FrameCodec::from_config(&config));
    let mut sender = FrameSender::new(config);
    let sent = sender.send(&mut framed, &source, &indices).await.unwrap();
    assert!(sent > 0);
    drop(framed);

    let receiver = tokio::time::timeout(Duration::from_secs(5), receive)
        .await
        .expect("receive timed out")
        .expect("receive task panicked")
        .expect("receive failed");
    assert_eq!(receiver.images_applied(), indices.len() as u64);
    assert_eq!(receiver.versions_applied(), 1);

    sink.wait_ready(Duration::from_secs(1)).unwrap();
    assert_eq!(listener.get(), 1);
    assert_eq!(sink.snapshot().pvp, screen);

    {
        let images = sink.images();
        assert_eq!(images.len(), regions.len());
        for image in images.iter() {
            assert!(regions.contains(&image.pixel_viewport()));
            let color = image.decompressed(Buffers::COLOR).unwrap().unwrap();
            assert!(color.iter().all(|&b| b == 0xAB));
            let depth = image.decompressed(Buffers::DEPTH).unwrap().unwrap();
            assert!(depth.iter().all(|&b| b == 0x10));
        }
    }

    source.flush();
    sink.flush();
}

#[tokio::test]
async fn consumer_thread_blocks_until_ready() {
    init_tracing();

    let pvp = PixelViewport::new(0, 0, 64, 64);
    let mut scene = Scene {
        content: vec![pvp],
    };
    let source = producer(pvp);
    source.set_version(1).unwrap();
    let indices = source.readback(&FrameTarget::default(), &mut scene, &DrawableConfig::default());
    assert_eq!(indices, vec![0]);

    let sink = Arc::new(FrameData::new());
    sink.set_version(1).unwrap();
    let waiter = {
        let sink = Arc::clone(&sink);
        thread::spawn(move || sink.wait_ready(Duration::from_secs(5)))
    };

    let config = TransmitConfig::default();
    let (writer, reader) = tokio::io::duplex(16 * 1024);
    let receive = tokio::spawn({
        let sink = Arc::clone(&sink);
        let codec = FrameCodec::from_config(&config);
        async move { FrameReceiver::new(sink).run(reader, codec).await }
    });

    let mut framed = FramedWrite::new(writer, FrameCodec::from_config(&config));
    let mut sender = FrameSender::new(config);
    sender.link_mut().set_link_bandwidth(Some(10 * 1024 * 1024 * 1024));
    sender.send(&mut framed, &source, &indices).await.unwrap();
    drop(framed);

    receive.await.unwrap().unwrap();
    tokio::task::spawn_blocking(move || waiter.join())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let images = sink.images();
    assert_eq!(images.len(), 1);
    // Fast link: shipped raw.
    let color = images[0].pixel_data(Buffers::COLOR).unwrap();
    assert!(!color.is_compressed());
    drop(images);

    source.flush();
    sink.flush();
}

#[test]
fn config_drives_the_region_search() {
    let config = FramecastConfig::from_toml_str(
        r#"
        [roi]
        enabled = false

        [transmit]
        max_packet_size = 4096
        "#,
    )
    .unwrap();
    assert_eq!(FrameCodec::from_config(&config.transmit).max_packet_size(), 4096);

    let frame = FrameData::with_config(&config);
    frame.update_snapshot(|s| {
        s.pvp = PixelViewport::new(0, 0, 512, 512);
        s.buffers = Buffers::COLOR | Buffers::DEPTH;
    });
    let mut scene = Scene {
        content: vec![PixelViewport::new(0, 0, 16, 16)],
    };
    let regions = frame.readback_regions(&FrameTarget::default(), &mut scene, 0, 1);
    assert_eq!(regions, vec![PixelViewport::new(0, 0, 512, 512)]);
}
