//! Versioned frame data shared between producer and consumer threads.
//!
//! A [`FrameData`] carries a target version and a monitored ready version.
//! Producers read pixels into images owned by the frame; consumers apply
//! received images to a pending list and make them visible with
//! [`FrameData::set_ready`], which wakes [`FrameData::wait_ready`] and bumps
//! every registered listener.
//!
//! Images cycle between three lists, each behind its own lock:
//!
//! - the pool of retired images, locked only for push/pop
//! - the visible images of the ready version
//! - the pending images received for the next version
//!
//! Visible and pending lists are only ever swapped or drained as a whole.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::backend::{BlockStatistics, ReadbackBackend};
use crate::config::FramecastConfig;
use crate::error::{FramecastError, WireError};
use crate::flags::Buffers;
use crate::geometry::{PixelDecomposition, PixelViewport, Zoom};
use crate::image::{CompressorChoice, DrawableConfig, Image, StorageType, format};
use crate::monitor::Monitor;
use crate::roi::RoiFinder;
use crate::wire;

/// A listener is a counter bumped once per version threshold.
pub type Listener = Arc<Monitor<u32>>;

// ── FrameSnapshot ────────────────────────────────────────────────

/// Per-version description of the frame, replaced wholesale on `set_ready`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSnapshot {
    /// Viewport of the frame relative to its source channel.
    pub pvp: PixelViewport,
    pub frame_type: StorageType,
    pub buffers: Buffers,
    pub period: u32,
    pub phase: u32,
    pub pixel: PixelDecomposition,
    pub zoom: Zoom,
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self {
            pvp: PixelViewport::default(),
            frame_type: StorageType::Memory,
            buffers: Buffers::empty(),
            period: 1,
            phase: 0,
            pixel: PixelDecomposition::ALL,
            zoom: Zoom::NONE,
        }
    }
}

/// Placement of the output frame a readback is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTarget {
    /// Offset of the frame's viewport in the drawable.
    pub offset: (i32, i32),
    pub zoom: Zoom,
}

/// Quality and compression settings stamped onto new images.
#[derive(Debug, Clone, Copy)]
struct ImageSettings {
    use_alpha: bool,
    color_quality: f32,
    depth_quality: f32,
    color_compressor: CompressorChoice,
    depth_compressor: CompressorChoice,
}

// ── FrameData ────────────────────────────────────────────────────

/// Versioned frame buffer with an image pool and readiness listeners.
pub struct FrameData {
    version: AtomicU64,
    ready_version: Monitor<u64>,
    snapshot: Mutex<FrameSnapshot>,
    settings: Mutex<ImageSettings>,
    images: Mutex<Vec<Image>>,
    pending: Mutex<Vec<Image>>,
    pool: Mutex<Vec<Image>>,
    listeners: Mutex<Vec<Listener>>,
    roi_finder: Mutex<RoiFinder>,
}

impl Default for FrameData {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameData {
    pub fn new() -> Self {
        Self::with_config(&FramecastConfig::default())
    }

    pub fn with_config(config: &FramecastConfig) -> Self {
        let frame = &config.frame;
        Self {
            version: AtomicU64::new(0),
            ready_version: Monitor::new(0),
            snapshot: Mutex::new(FrameSnapshot::default()),
            settings: Mutex::new(ImageSettings {
                use_alpha: frame.use_alpha,
                color_quality: frame.color_quality,
                depth_quality: frame.depth_quality,
                color_compressor: frame.color_compressor,
                depth_compressor: frame.depth_compressor,
            }),
            images: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            pool: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            roi_finder: Mutex::new(RoiFinder::with_config(
                config.roi.clone(),
                config.tracker.clone(),
            )),
        }
    }

    // ── Versioning ───────────────────────────────────────────────

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn ready_version(&self) -> u64 {
        self.ready_version.get()
    }

    /// Set the target version. Versions never go backwards.
    pub fn set_version(&self, version: u64) -> Result<(), FramecastError> {
        let current = self.version();
        if version < current {
            return Err(FramecastError::OutOfOrderVersion {
                expected: current,
                got: version,
            });
        }
        self.version.store(version, Ordering::Release);
        trace!(version, "new frame data version");
        Ok(())
    }

    /// The ready version has caught up with the target version.
    pub fn is_ready(&self) -> bool {
        self.ready_version() >= self.version()
    }

    /// Block until the frame is ready or `timeout` elapses.
    pub fn wait_ready(&self, timeout: Duration) -> Result<(), FramecastError> {
        if self
            .ready_version
            .timed_wait_ge(self.version(), timeout)
        {
            Ok(())
        } else {
            Err(FramecastError::Timeout(timeout))
        }
    }

    /// Producer-side commit: make the current version ready.
    pub fn mark_ready(&self) {
        self.publish(self.version());
    }

    /// Consumer-side commit of `version`.
    ///
    /// The version must directly follow the ready version (any version is
    /// accepted as the first one) and may not pass the target version.
    /// Pending images become visible and `snapshot` replaces the frame
    /// description.
    pub fn set_ready(&self, version: u64, snapshot: FrameSnapshot) -> Result<(), FramecastError> {
        self.check_next_ready(version)?;
        let target = self.version();
        if version > target {
            return Err(FramecastError::OutOfOrderVersion {
                expected: target,
                got: version,
            });
        }

        self.clear();
        {
            let mut pending = lock(&self.pending);
            let mut images = lock(&self.images);
            mem::swap(&mut *images, &mut *pending);
        }
        *lock(&self.snapshot) = snapshot;
        self.publish(version);

        debug!(version, "applied frame data");
        Ok(())
    }

    /// `version` is the next one `set_ready` accepts, ignoring the target.
    pub fn check_next_ready(&self, version: u64) -> Result<(), FramecastError> {
        let ready = self.ready_version();
        if version <= ready || (ready != 0 && ready + 1 != version) {
            return Err(FramecastError::OutOfOrderVersion {
                expected: ready + 1,
                got: version,
            });
        }
        Ok(())
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Register `listener`. It is bumped right away if the frame is already
    /// ready.
    pub fn add_listener(&self, listener: Listener) {
        let mut listeners = lock(&self.listeners);
        if self.is_ready() {
            listener.increment();
        }
        listeners.push(listener);
    }

    /// Unregister `listener`. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Listener) -> bool {
        let mut listeners = lock(&self.listeners);
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => {
                warn!("removing unknown frame data listener");
                false
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    // ── Snapshot / settings ──────────────────────────────────────

    pub fn snapshot(&self) -> FrameSnapshot {
        *lock(&self.snapshot)
    }

    /// Edit the frame description in place (producer side).
    pub fn update_snapshot(&self, f: impl FnOnce(&mut FrameSnapshot)) {
        f(&mut *lock(&self.snapshot));
    }

    pub fn pixel_viewport(&self) -> PixelViewport {
        self.snapshot().pvp
    }

    pub fn buffers(&self) -> Buffers {
        self.snapshot().buffers
    }

    pub fn frame_type(&self) -> StorageType {
        self.snapshot().frame_type
    }

    /// Stop reading back `buffer`.
    pub fn disable_buffer(&self, buffer: Buffers) {
        self.update_snapshot(|s| s.buffers.remove(buffer));
    }

    // Settings apply to images allocated after the call.

    pub fn set_alpha_usage(&self, use_alpha: bool) {
        lock(&self.settings).use_alpha = use_alpha;
    }

    pub fn set_quality(&self, buffer: Buffers, quality: f32) {
        let mut settings = lock(&self.settings);
        if buffer == Buffers::DEPTH {
            settings.depth_quality = quality;
        } else {
            debug_assert_eq!(buffer, Buffers::COLOR);
            settings.color_quality = quality;
        }
    }

    pub fn use_compressor(&self, buffer: Buffers, choice: CompressorChoice) {
        let mut settings = lock(&self.settings);
        if buffer == Buffers::DEPTH {
            settings.depth_compressor = choice;
        } else {
            debug_assert_eq!(buffer, Buffers::COLOR);
            settings.color_compressor = choice;
        }
    }

    // ── Images ───────────────────────────────────────────────────

    /// The visible images.
    pub fn images(&self) -> MutexGuard<'_, Vec<Image>> {
        lock(&self.images)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn pool_len(&self) -> usize {
        lock(&self.pool).len()
    }

    /// Retire all visible images to the pool.
    pub fn clear(&self) {
        let visible = mem::take(&mut *lock(&self.images));
        if !visible.is_empty() {
            lock(&self.pool).extend(visible);
        }
    }

    /// Retire the visible images and release every pooled image.
    pub fn flush(&self) {
        self.clear();
        let pooled = mem::take(&mut *lock(&self.pool));
        let count = pooled.len();
        let freed: u64 = pooled.into_iter().map(|mut image| image.flush()).sum();
        debug!(images = count, bytes = freed, "flushed frame data");
    }

    /// Allocate a visible image. Returns its index in [`images`](Self::images).
    pub fn new_image(&self, storage: StorageType, config: &DrawableConfig) -> usize {
        let image = self.alloc_image(storage, config, true);
        self.push_visible(image)
    }

    // ── Readback ─────────────────────────────────────────────────

    /// Regions of the frame worth reading back, relative to the frame.
    ///
    /// Runs the region finder when depth is read back at identity zoom and
    /// returns the whole frame viewport otherwise.
    pub fn readback_regions(
        &self,
        target: &FrameTarget,
        stats: &mut dyn BlockStatistics,
        stage: u32,
        frame_id: u32,
    ) -> Vec<PixelViewport> {
        let snapshot = self.snapshot();
        let (dx, dy) = target.offset;
        let abs = snapshot.pvp.translated(dx, dy);

        if !snapshot.buffers.contains(Buffers::DEPTH) || !target.zoom.is_identity() {
            return vec![snapshot.pvp];
        }

        lock(&self.roi_finder)
            .find_regions(snapshot.buffers, abs, target.zoom, stage, frame_id, stats)
            .into_iter()
            .map(|region| region.translated(-dx, -dy))
            .collect()
    }

    /// Read back the whole frame. See [`start_readback`](Self::start_readback).
    pub fn readback(
        &self,
        target: &FrameTarget,
        backend: &mut dyn ReadbackBackend,
        config: &DrawableConfig,
    ) -> Vec<usize> {
        let pvp = self.pixel_viewport();
        self.start_readback(target, backend, config, &[pvp])
    }

    /// Read `regions` of the frame into new visible images.
    ///
    /// Texture frames are read as one image covering the whole frame. Memory
    /// frames get one image per region that overlaps the frame, positioned
    /// relative to the frame's viewport. Returns the indices of the images
    /// that received data.
    pub fn start_readback(
        &self,
        target: &FrameTarget,
        backend: &mut dyn ReadbackBackend,
        config: &DrawableConfig,
        regions: &[PixelViewport],
    ) -> Vec<usize> {
        let snapshot = self.snapshot();
        let mut produced = Vec::new();

        if snapshot.buffers.is_empty() {
            return produced;
        }
        let (dx, dy) = target.offset;
        let frame_pvp = snapshot.pvp;
        let abs = frame_pvp.translated(dx, dy);
        if !abs.has_area() {
            return produced;
        }
        if !target.zoom.is_valid() {
            warn!(zoom = ?target.zoom, "invalid zoom factor, skipping frame");
            return produced;
        }

        if snapshot.frame_type == StorageType::Texture {
            let mut image = self.alloc_image(StorageType::Texture, config, true);
            let ok = image.start_readback(snapshot.buffers, abs, target.zoom, backend);
            image.set_offset(0, 0);
            let index = self.push_visible(image);
            if ok {
                produced.push(index);
            }
            return produced;
        }

        let pixel = snapshot.pixel;
        for region in regions {
            let pvp = region.translated(dx, dy).intersect(&abs);
            if !pvp.has_area() {
                continue;
            }

            let mut image = self.alloc_image(StorageType::Memory, config, true);
            let ok = image.start_readback(snapshot.buffers, pvp, target.zoom, backend);
            let local = pvp.translated(-dx, -dy);
            image.set_offset(
                (local.x - frame_pvp.x) * pixel.w,
                (local.y - frame_pvp.y) * pixel.h,
            );
            let index = self.push_visible(image);
            if ok {
                produced.push(index);
            }
        }

        trace!(regions = regions.len(), images = produced.len(), "started readback");
        produced
    }

    // ── Wire ─────────────────────────────────────────────────────

    /// Apply a received image for `version` to the pending list.
    ///
    /// `data` holds one encoded buffer per flag in `buffers`, color first.
    /// Returns `false` when the version is already ready or the payload is
    /// malformed; nothing is queued in that case.
    pub fn add_image(
        &self,
        version: u64,
        pvp: PixelViewport,
        zoom: Zoom,
        buffers: Buffers,
        use_alpha: bool,
        data: Bytes,
    ) -> bool {
        let ready = self.ready_version();
        if version <= ready {
            debug!(version, ready, "dropping image for a ready version");
            return false;
        }

        let mut image = self.alloc_image(StorageType::Memory, &DrawableConfig::default(), false);
        image.set_pixel_viewport(pvp);
        image.set_alpha_usage(use_alpha);
        image.set_zoom(zoom);

        match decode_into(&mut image, buffers, data) {
            Ok(()) => {
                lock(&self.pending).push(image);
                trace!(version, %pvp, "queued image");
                true
            }
            Err(e) => {
                warn!(version, %pvp, "dropping malformed image: {e}");
                lock(&self.pool).push(image);
                false
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Take an image from the pool, or a fresh one, and configure it.
    ///
    /// The pool lock is held for the pop only.
    fn alloc_image(&self, storage: StorageType, config: &DrawableConfig, set_quality: bool) -> Image {
        let pooled = lock(&self.pool).pop();
        let mut image = match pooled {
            Some(mut image) => {
                image.reset();
                image
            }
            None => Image::new(),
        };

        let settings = *lock(&self.settings);
        image.set_alpha_usage(settings.use_alpha);
        image.set_storage_type(storage);
        if set_quality {
            image.set_quality(Buffers::COLOR, settings.color_quality);
            image.set_quality(Buffers::DEPTH, settings.depth_quality);
        }
        image.use_compressor(Buffers::COLOR, settings.color_compressor);
        image.use_compressor(Buffers::DEPTH, settings.depth_compressor);
        image.set_internal_format(Buffers::DEPTH, format::DEPTH);
        image.set_internal_format(Buffers::COLOR, config.color_format());
        image
    }

    fn push_visible(&self, image: Image) -> usize {
        let mut images = lock(&self.images);
        images.push(image);
        images.len() - 1
    }

    /// Advance the ready version and bump listeners, under the listener lock.
    fn publish(&self, version: u64) {
        let listeners = lock(&self.listeners);
        if self.ready_version() >= version {
            return;
        }
        self.ready_version.set(version);
        for listener in listeners.iter() {
            listener.increment();
        }
        trace!(version, listeners = listeners.len(), "frame data ready");
    }
}

impl fmt::Display for FrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame data v{} {} images, ready {}",
            self.version(),
            self.images().len(),
            if self.is_ready() { 'y' } else { 'n' }
        )
    }
}

impl fmt::Debug for FrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameData")
            .field("version", &self.version())
            .field("ready_version", &self.ready_version())
            .field("images", &self.images().len())
            .field("pending", &self.pending_count())
            .field("pool", &self.pool_len())
            .finish()
    }
}

impl Drop for FrameData {
    fn drop(&mut self) {
        self.clear();
        let pool = self.pool.get_mut().unwrap_or_else(PoisonError::into_inner);
        for _ in pool.drain(..) {
            warn!("unflushed image in frame data teardown");
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parse one wire buffer per flag in `buffers` into `image`.
fn decode_into(image: &mut Image, buffers: Buffers, mut data: Bytes) -> Result<(), WireError> {
    for buffer in Buffers::WIRE_ORDER {
        if !buffers.contains(buffer) {
            continue;
        }
        let pixels = wire::decode_buffer(&mut data)?;
        image.set_internal_format(buffer, pixels.internal_format);
        image.set_pixel_data(buffer, pixels);
    }
    if !data.is_empty() {
        return Err(WireError::TrailingBytes(data.len()));
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
