//! Adaptive run/skip control for the region finder.
//!
//! The tracker remembers, per compositing stage, the viewports searched in
//! the current and previous frame together with a skip countdown. A region
//! whose searches keep failing to shrink the readback is searched less and
//! less often: each unproductive run doubles its skip streak (plus one), up
//! to a configured cap. One productive run resets the streak.

use std::collections::HashMap;
use std::mem;

use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::geometry::PixelViewport;

/// Permission to run the region finder once.
///
/// Returned by [`RoiTracker::use_roi_finder`] and consumed by
/// [`RoiTracker::update_delay`]. Not `Clone`: a ticket settles exactly one
/// run.
#[derive(Debug)]
pub struct Ticket {
    serial: u64,
    stage: u32,
    index: usize,
}

impl Ticket {
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn stage(&self) -> u32 {
        self.stage
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackedArea {
    pvp: PixelViewport,
    /// Length of the current skip streak.
    last_skip: u32,
    /// Frames still to skip before the next run.
    skip: u32,
}

/// Per-stage history of region searches over the last two frames.
#[derive(Debug)]
pub struct RoiTracker {
    config: TrackerConfig,
    frame_id: Option<u32>,
    current: HashMap<u32, Vec<TrackedArea>>,
    previous: HashMap<u32, Vec<TrackedArea>>,
    outstanding: Option<u64>,
    next_serial: u64,
}

impl Default for RoiTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl RoiTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            frame_id: None,
            current: HashMap::new(),
            previous: HashMap::new(),
            outstanding: None,
            next_serial: 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Whether a ticket is waiting for [`update_delay`](Self::update_delay).
    pub fn has_outstanding_ticket(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Decide whether to search `pvp` for regions in this frame.
    ///
    /// Returns a ticket when the finder should run, `None` when the region
    /// is still in its skip streak and the full viewport should be used.
    pub fn use_roi_finder(
        &mut self,
        pvp: &PixelViewport,
        stage: u32,
        frame_id: u32,
    ) -> Option<Ticket> {
        if let Some(serial) = self.outstanding.take() {
            warn!(serial, stage, "discarding unsettled ROI ticket");
        }

        if self.frame_id != Some(frame_id) {
            self.frame_id = Some(frame_id);
            mem::swap(&mut self.current, &mut self.previous);
            self.current.clear();
        }

        let (last_skip, skip) = self.find_match(pvp, stage).unwrap_or((0, 0));
        let areas = self.current.entry(stage).or_default();

        if skip > 0 {
            areas.push(TrackedArea {
                pvp: *pvp,
                last_skip,
                skip: skip - 1,
            });
            debug!(stage, frame_id, skip, "skipping ROI search");
            return None;
        }

        areas.push(TrackedArea {
            pvp: *pvp,
            last_skip,
            skip: 0,
        });
        let serial = self.next_serial;
        self.next_serial += 1;
        self.outstanding = Some(serial);

        Some(Ticket {
            serial,
            stage,
            index: areas.len() - 1,
        })
    }

    /// Settle a run with the regions it produced.
    ///
    /// Enough reduction resets the region's skip streak; too little grows
    /// it. A ticket that is not the outstanding one is rejected and leaves
    /// the history untouched.
    pub fn update_delay(
        &mut self,
        regions: &[PixelViewport],
        ticket: Ticket,
    ) -> Result<(), TrackerError> {
        let outstanding = self.outstanding.ok_or(TrackerError::NoOutstandingTicket)?;
        if ticket.serial != outstanding {
            return Err(TrackerError::StaleTicket {
                got: ticket.serial,
                outstanding,
            });
        }
        self.outstanding = None;

        // Rotation only happens in use_roi_finder, which drops any
        // outstanding ticket first, so the entry is still in place.
        let Some(area) = self
            .current
            .get_mut(&ticket.stage)
            .and_then(|areas| areas.get_mut(ticket.index))
        else {
            debug_assert!(false, "ticket {} lost its history entry", ticket.serial);
            return Err(TrackerError::NoOutstandingTicket);
        };

        let original = area.pvp.area() as f64;
        let total: i64 = regions.iter().map(PixelViewport::area).sum();

        if total as f64 <= original * (1.0 - f64::from(self.config.min_reduction)) {
            area.last_skip = 0;
        } else {
            area.last_skip = area
                .last_skip
                .saturating_mul(2)
                .saturating_add(1)
                .min(self.config.max_skip);
            area.skip = area.last_skip;
            debug!(
                stage = ticket.stage,
                skip = area.skip,
                "ROI search not worth it, backing off"
            );
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Skip state of the previous frame's best overlapping area, if the
    /// overlap is large enough to count as the same region.
    fn find_match(&self, pvp: &PixelViewport, stage: u32) -> Option<(u32, u32)> {
        let area = pvp.area();
        if area == 0 {
            return None;
        }

        let (best, overlap) = self
            .previous
            .get(&stage)?
            .iter()
            .map(|tracked| (tracked, tracked.pvp.intersect(pvp).area()))
            .max_by_key(|(_, overlap)| *overlap)?;

        if (overlap as f64) < area as f64 * f64::from(self.config.match_ratio) {
            return None;
        }
        Some((best.last_skip, best.skip))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PVP: PixelViewport = PixelViewport::new(0, 0, 100, 100);

    /// Run one frame; settle with a useless result when the finder runs.
    fn frame_without_gain(tracker: &mut RoiTracker, frame_id: u32) -> bool {
        match tracker.use_roi_finder(&PVP, 0, frame_id) {
            Some(ticket) => {
                tracker.update_delay(&[PVP], ticket).unwrap();
                true
            }
            None => false,
        }
    }

    #[test]
    fn unproductive_stage_backs_off_exponentially() {
        let mut tracker = RoiTracker::default();
        let runs: Vec<bool> = (1..=16).map(|f| frame_without_gain(&mut tracker, f)).collect();
        assert_eq!(
            runs,
            vec![
                true, false, // skip 1
                true, false, false, false, // skip 3
                true, false, false, false, false, false, false, false, // skip 7
                true, false,
            ]
        );
    }

    #[test]
    fn skip_streak_is_capped() {
        let mut tracker = RoiTracker::new(TrackerConfig {
            max_skip: 2,
            ..TrackerConfig::default()
        });
        let runs: Vec<bool> = (1..=10).map(|f| frame_without_gain(&mut tracker, f)).collect();
        assert_eq!(
            runs,
            vec![true, false, true, false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn productive_run_resets_streak() {
        let mut tracker = RoiTracker::default();
        assert!(frame_without_gain(&mut tracker, 1));
        assert!(!frame_without_gain(&mut tracker, 2));

        let ticket = tracker.use_roi_finder(&PVP, 0, 3).unwrap();
        tracker
            .update_delay(&[PixelViewport::new(0, 0, 50, 50)], ticket)
            .unwrap();

        // Trust restored: every following frame runs.
        for frame_id in 4..8 {
            let ticket = tracker.use_roi_finder(&PVP, 0, frame_id).unwrap();
            tracker
                .update_delay(&[PixelViewport::new(0, 0, 10, 10)], ticket)
                .unwrap();
        }
    }

    #[test]
    fn stages_and_moved_regions_are_tracked_separately() {
        let mut tracker = RoiTracker::default();
        assert!(frame_without_gain(&mut tracker, 1));

        // Another stage in the next frame has no history.
        let ticket = tracker.use_roi_finder(&PVP, 1, 2).unwrap();
        tracker.update_delay(&[PVP], ticket).unwrap();

        // A region that moved by more than a third is new.
        let moved = PVP.translated(50, 0);
        assert!(tracker.use_roi_finder(&moved, 0, 2).is_some());
    }

    #[test]
    fn ticket_misuse_is_reported() {
        let mut tracker = RoiTracker::default();
        let first = tracker.use_roi_finder(&PVP, 0, 1).unwrap();
        let second = tracker
            .use_roi_finder(&PixelViewport::new(200, 0, 10, 10), 0, 1)
            .unwrap();
        assert_ne!(first.serial(), second.serial());

        assert_eq!(
            tracker.update_delay(&[PVP], first),
            Err(TrackerError::StaleTicket {
                got: 1,
                outstanding: 2
            })
        );
        assert!(tracker.has_outstanding_ticket());
        tracker.update_delay(&[], second).unwrap();

        let third = tracker.use_roi_finder(&PVP, 0, 1).unwrap();
        tracker.update_delay(&[], third).unwrap();
        let fake = Ticket {
            serial: 99,
            stage: 0,
            index: 0,
        };
        assert_eq!(
            tracker.update_delay(&[], fake),
            Err(TrackerError::NoOutstandingTicket)
        );
    }
}
