//! Region-of-interest search.
//!
//! [`RoiFinder::find_regions`] turns per-block occupancy samples into a small
//! set of rectangles that together cover all written content of a viewport.
//! The search works on the block grid: tighten to the content bounding box,
//! cut out the largest empty hole, choose the partition of the remainder
//! that eliminates the most empty space, and repeat on each piece until no
//! hole worth cutting is left.

use tracing::{debug, trace, warn};

use crate::backend::BlockStatistics;
use crate::config::{RoiConfig, TrackerConfig};
use crate::flags::Buffers;
use crate::geometry::{PixelViewport, Zoom};

use super::empty_space::EmptySpaceFinder;
use super::split::{HolePlacement, SUB_AREA_COUNT, sub_areas};
use super::tracker::RoiTracker;

/// A candidate region on the block grid and the hole found inside it.
#[derive(Debug, Clone, Copy, Default)]
struct Area {
    pvp: PixelViewport,
    hole: PixelViewport,
    /// Empty cells removed by choosing this area: the trimmed margin plus
    /// its own hole.
    empty_size: i64,
}

/// Computes minimal covering regions from block occupancy samples.
#[derive(Debug)]
pub struct RoiFinder {
    config: RoiConfig,
    tracker: RoiTracker,
    empty_space: EmptySpaceFinder,
    mask: Vec<bool>,
}

impl Default for RoiFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl RoiFinder {
    pub fn new() -> Self {
        Self::with_config(RoiConfig::default(), TrackerConfig::default())
    }

    pub fn with_config(config: RoiConfig, tracker: TrackerConfig) -> Self {
        Self {
            config,
            tracker: RoiTracker::new(tracker),
            empty_space: EmptySpaceFinder::new(),
            mask: Vec::new(),
        }
    }

    pub fn config(&self) -> &RoiConfig {
        &self.config
    }

    pub fn tracker(&self) -> &RoiTracker {
        &self.tracker
    }

    /// Regions of `pvp` that contain written content.
    ///
    /// Falls back to `[pvp]` whenever the search cannot run or would not
    /// reduce the readback. An entirely empty viewport yields no regions.
    pub fn find_regions(
        &mut self,
        buffers: Buffers,
        pvp: PixelViewport,
        zoom: Zoom,
        stage: u32,
        frame_id: u32,
        stats: &mut dyn BlockStatistics,
    ) -> Vec<PixelViewport> {
        if !self.config.enabled || !pvp.has_area() {
            return vec![pvp];
        }
        if !zoom.is_identity() {
            debug!(%pvp, "ROI search needs identity zoom, using full viewport");
            return vec![pvp];
        }
        if !buffers.contains(Buffers::DEPTH) {
            debug!(%pvp, "ROI search needs depth, using full viewport");
            return vec![pvp];
        }

        let ticket = if self.config.use_tracker {
            match self.tracker.use_roi_finder(&pvp, stage, frame_id) {
                Some(ticket) => Some(ticket),
                None => return vec![pvp],
            }
        } else {
            None
        };

        let regions = self.search(pvp, stats).unwrap_or_else(|| vec![pvp]);

        if let Some(ticket) = ticket {
            if let Err(e) = self.tracker.update_delay(&regions, ticket) {
                warn!(stage, "ROI tracker rejected its ticket: {e}");
            }
        }
        regions
    }

    // ── Search ───────────────────────────────────────────────────

    fn search(
        &mut self,
        pvp: PixelViewport,
        stats: &mut dyn BlockStatistics,
    ) -> Option<Vec<PixelViewport>> {
        let block_size = self.config.block_size.max(1);
        let grid_w = block_count(pvp.w, block_size);
        let grid_h = block_count(pvp.h, block_size);

        let samples = stats.sample_blocks(&pvp, block_size)?;
        if samples.len() != grid_w as usize * grid_h as usize {
            warn!(
                expected = grid_w as usize * grid_h as usize,
                got = samples.len(),
                "block statistics have the wrong shape, using full viewport"
            );
            return None;
        }

        self.mask.clear();
        self.mask.extend(samples.iter().map(|&coverage| coverage < 1.0));
        self.empty_space.update(&self.mask, grid_w, grid_h);
        self.empty_space
            .set_limits(self.config.min_hole_blocks, self.config.min_hole_ratio);

        let bounds = self.tightened(&PixelViewport::new(0, 0, grid_w, grid_h));
        if !bounds.has_area() {
            debug!(%pvp, "no content in viewport");
            return Some(Vec::new());
        }

        let blocks = self.split(bounds);
        let regions: Vec<PixelViewport> = blocks
            .iter()
            .map(|b| {
                b.scaled(block_size as i32)
                    .translated(pvp.x, pvp.y)
                    .intersect(&pvp)
            })
            .filter(PixelViewport::has_area)
            .collect();

        let covered: i64 = regions.iter().map(PixelViewport::area).sum();
        trace!(
            %pvp,
            regions = regions.len(),
            covered,
            total = pvp.area(),
            "ROI search finished"
        );
        if covered >= pvp.area() {
            return None;
        }
        Some(regions)
    }

    /// Split `bounds` until every remaining area is free of cuttable holes.
    fn split(&self, bounds: PixelViewport) -> Vec<PixelViewport> {
        let mut terminal = Vec::new();
        let mut work = vec![self.area(bounds)];

        while let Some(area) = work.pop() {
            if !area.hole.has_area() {
                terminal.push(area.pvp);
                continue;
            }
            work.extend(
                self.best_partition(&area)
                    .into_iter()
                    .filter(|a| a.pvp.has_area()),
            );
        }
        terminal
    }

    /// The partition of `area` minus its hole that removes the most empty
    /// cells. Ties go to the first candidate.
    fn best_partition(&self, area: &Area) -> Vec<Area> {
        let subs = sub_areas(&area.pvp, &area.hole);
        let placement = HolePlacement::classify(&area.pvp, &area.hole);

        let mut evaluated: [Option<Area>; SUB_AREA_COUNT] = [None; SUB_AREA_COUNT];
        let mut best: &[usize] = placement.partitions()[0];
        let mut best_sum = 0;

        for &partition in placement.partitions() {
            let sum: i64 = partition
                .iter()
                .map(|&i| {
                    evaluated[i]
                        .get_or_insert_with(|| self.area(subs[i]))
                        .empty_size
                })
                .sum();
            if sum > best_sum {
                best_sum = sum;
                best = partition;
            }
        }

        best.iter()
            .map(|&i| evaluated[i].unwrap_or_else(|| self.area(subs[i])))
            .collect()
    }

    fn area(&self, candidate: PixelViewport) -> Area {
        let pvp = self.tightened(&candidate);
        let hole = self.empty_space.get_largest_empty_area(&pvp);
        Area {
            pvp,
            hole,
            empty_size: candidate.area() - pvp.area() + hole.area(),
        }
    }

    /// Bounding box of the occupied blocks inside `pvp`, found from row and
    /// column projections.
    fn tightened(&self, pvp: &PixelViewport) -> PixelViewport {
        let empty = PixelViewport::new(pvp.x, pvp.y, 0, 0);
        if !pvp.has_area() || self.empty_space.get_area_pvp(pvp) == 0 {
            return empty;
        }

        let es = &self.empty_space;
        let row = |y: i32| es.get_area(pvp.x, y, pvp.w, 1) > 0;
        let col = |x: i32| es.get_area(x, pvp.y, 1, pvp.h) > 0;

        let (Some(y0), Some(y1), Some(x0), Some(x1)) = (
            (pvp.y..pvp.end_y()).find(|&y| row(y)),
            (pvp.y..pvp.end_y()).rev().find(|&y| row(y)),
            (pvp.x..pvp.end_x()).find(|&x| col(x)),
            (pvp.x..pvp.end_x()).rev().find(|&x| col(x)),
        ) else {
            return empty;
        };
        PixelViewport::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
    }
}

/// Blocks needed to cover `extent` pixels.
fn block_count(extent: i32, block_size: u32) -> i32 {
    (extent as u32).div_ceil(block_size) as i32
}

// ── Tests ────────────────────────────────────────────────────────
