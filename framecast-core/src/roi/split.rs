//! Hole classification and partition tables for region splitting.
//!
//! A hole cuts its region into at most nine cells (three columns by three
//! rows). The sixteen candidate sub-areas below are unions of those cells
//! that exclude the hole; every partition lists sub-areas that tile the
//! region minus the hole without overlap.
//!
//! Columns are `x1 = region.x`, `x2 = hole.x`, `x3 = hole.end_x()` with widths
//! `w1 = x2 - x1`, `w2 = hole.w`, `w3 = region.end_x() - x3`; rows follow the
//! same pattern. Combined extents: `w4 = w1 + w2`, `w5 = w2 + w3`,
//! `w6 = w1 + w2 + w3`.

use crate::geometry::PixelViewport;

/// Where a hole sits inside its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolePlacement {
    /// Touches the low-x and low-y edges.
    CornerLowXLowY,
    /// Touches the low-x and high-y edges.
    CornerLowXHighY,
    /// Touches only the low-x edge.
    EdgeLowX,
    /// Touches the high-x and low-y edges.
    CornerHighXLowY,
    /// Touches only the low-y edge.
    EdgeLowY,
    /// Touches the high-x and high-y edges.
    CornerHighXHighY,
    /// Touches only the high-x edge.
    EdgeHighX,
    /// Touches only the high-y edge.
    EdgeHighY,
    /// Spans the full height of the region.
    SpansY,
    /// Spans the full width of the region.
    SpansX,
    /// Touches no edge.
    Interior,
}

impl HolePlacement {
    pub fn classify(region: &PixelViewport, hole: &PixelViewport) -> Self {
        if region.h == hole.h {
            return HolePlacement::SpansY;
        }
        if region.w == hole.w {
            return HolePlacement::SpansX;
        }

        let low_x = region.x == hole.x;
        let low_y = region.y == hole.y;
        let high_x = region.end_x() == hole.end_x();
        let high_y = region.end_y() == hole.end_y();

        match (low_x, low_y, high_x, high_y) {
            (true, true, _, _) => HolePlacement::CornerLowXLowY,
            (true, _, _, true) => HolePlacement::CornerLowXHighY,
            (true, _, _, _) => HolePlacement::EdgeLowX,
            (_, true, true, _) => HolePlacement::CornerHighXLowY,
            (_, true, _, _) => HolePlacement::EdgeLowY,
            (_, _, true, true) => HolePlacement::CornerHighXHighY,
            (_, _, true, _) => HolePlacement::EdgeHighX,
            (_, _, _, true) => HolePlacement::EdgeHighY,
            _ => HolePlacement::Interior,
        }
    }

    /// Candidate partitions, as indices into [`sub_areas`].
    pub fn partitions(self) -> &'static [&'static [usize]] {
        match self {
            HolePlacement::CornerLowXLowY => &[&[2, 7], &[3, 10]],
            HolePlacement::CornerLowXHighY => &[&[3, 8], &[4, 11]],
            HolePlacement::EdgeLowX => &[&[2, 4, 14], &[4, 10, 11], &[3, 8, 10], &[2, 7, 8]],
            HolePlacement::CornerHighXLowY => &[&[1, 6], &[2, 9]],
            HolePlacement::EdgeLowY => &[&[1, 3, 15], &[3, 9, 10], &[2, 7, 9], &[1, 6, 7]],
            HolePlacement::CornerHighXHighY => &[&[1, 12], &[4, 5]],
            HolePlacement::EdgeHighX => &[&[2, 4, 13], &[4, 5, 6], &[1, 6, 12], &[2, 9, 12]],
            HolePlacement::EdgeHighY => &[&[1, 3, 16], &[1, 11, 12], &[5, 4, 11], &[3, 5, 8]],
            HolePlacement::SpansY => &[&[1, 3]],
            HolePlacement::SpansX => &[&[2, 4]],
            HolePlacement::Interior => INTERIOR_PARTITIONS,
        }
    }
}

/// An interior hole leaves a ring. Each partition either runs one full
/// strip along a side and splits the remaining U-shape like an edge hole, or
/// winds four pieces around the hole.
const INTERIOR_PARTITIONS: &[&[usize]] = &[
    &[13, 2, 4, 14],
    &[13, 4, 10, 11],
    &[13, 3, 8, 10],
    &[13, 2, 7, 8],
    &[16, 1, 3, 15],
    &[16, 3, 9, 10],
    &[16, 2, 7, 9],
    &[16, 1, 6, 7],
    &[14, 2, 4, 13],
    &[14, 4, 5, 6],
    &[14, 1, 6, 12],
    &[14, 2, 9, 12],
    &[15, 1, 3, 16],
    &[15, 1, 11, 12],
    &[15, 5, 4, 11],
    &[15, 3, 5, 8],
    &[5, 6, 7, 8],
    &[9, 10, 11, 12],
];

/// Number of entries in the [`sub_areas`] table. Index `0` is unused.
pub const SUB_AREA_COUNT: usize = 17;

/// The sixteen candidate sub-areas of `region` around `hole`, 1-based.
pub fn sub_areas(region: &PixelViewport, hole: &PixelViewport) -> [PixelViewport; SUB_AREA_COUNT] {
    let (x1, x2, x3) = (region.x, hole.x, hole.end_x());
    let (w1, w2, w3) = (x2 - x1, hole.w, region.end_x() - x3);
    let (w4, w5, w6) = (w1 + w2, w2 + w3, w1 + w2 + w3);

    let (y1, y2, y3) = (region.y, hole.y, hole.end_y());
    let (h1, h2, h3) = (y2 - y1, hole.h, region.end_y() - y3);
    let (h4, h5, h6) = (h1 + h2, h2 + h3, h1 + h2 + h3);

    let pvp = PixelViewport::new;
    [
        PixelViewport::default(),
        // single cells beside the hole
        pvp(x1, y2, w1, h2),
        pvp(x2, y3, w2, h3),
        pvp(x3, y2, w3, h2),
        pvp(x2, y1, w2, h1),
        // two-cell strips
        pvp(x1, y1, w1, h4),
        pvp(x1, y3, w4, h3),
        pvp(x3, y2, w3, h5),
        pvp(x2, y1, w5, h1),
        pvp(x1, y2, w1, h5),
        pvp(x2, y3, w5, h3),
        pvp(x3, y1, w3, h4),
        pvp(x1, y1, w4, h1),
        // full strips along each side
        pvp(x1, y1, w1, h6),
        pvp(x3, y1, w3, h6),
        pvp(x1, y3, w6, h3),
        pvp(x1, y1, w6, h1),
    ]
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: PixelViewport = PixelViewport::new(0, 0, 10, 10);

    fn covered_cells(areas: &[PixelViewport]) -> Vec<(i32, i32)> {
        let mut cells: Vec<_> = areas
            .iter()
            .flat_map(|a| (a.y..a.end_y()).flat_map(move |y| (a.x..a.end_x()).map(move |x| (x, y))))
            .collect();
        cells.sort_unstable();
        cells
    }

    #[test]
    fn classification_by_touched_edges() {
        let cases = [
            (PixelViewport::new(0, 0, 3, 3), HolePlacement::CornerLowXLowY),
            (PixelViewport::new(0, 7, 3, 3), HolePlacement::CornerLowXHighY),
            (PixelViewport::new(0, 4, 3, 3), HolePlacement::EdgeLowX),
            (PixelViewport::new(7, 0, 3, 3), HolePlacement::CornerHighXLowY),
            (PixelViewport::new(4, 0, 3, 3), HolePlacement::EdgeLowY),
            (PixelViewport::new(7, 7, 3, 3), HolePlacement::CornerHighXHighY),
            (PixelViewport::new(7, 4, 3, 3), HolePlacement::EdgeHighX),
            (PixelViewport::new(4, 7, 3, 3), HolePlacement::EdgeHighY),
            (PixelViewport::new(4, 0, 3, 10), HolePlacement::SpansY),
            (PixelViewport::new(0, 4, 10, 3), HolePlacement::SpansX),
            (PixelViewport::new(4, 4, 3, 3), HolePlacement::Interior),
        ];
        for (hole, expected) in cases {
            assert_eq!(HolePlacement::classify(&REGION, &hole), expected, "{hole}");
        }
    }

    #[test]
    fn every_partition_tiles_region_minus_hole() {
        let holes = [
            PixelViewport::new(0, 0, 3, 3),
            PixelViewport::new(0, 7, 3, 3),
            PixelViewport::new(0, 4, 3, 3),
            PixelViewport::new(7, 0, 3, 3),
            PixelViewport::new(4, 0, 3, 3),
            PixelViewport::new(7, 7, 3, 3),
            PixelViewport::new(7, 4, 3, 3),
            PixelViewport::new(4, 7, 3, 3),
            PixelViewport::new(4, 0, 3, 10),
            PixelViewport::new(0, 4, 10, 3),
            PixelViewport::new(4, 4, 3, 3),
        ];
        for hole in holes {
            let subs = sub_areas(&REGION, &hole);
            let placement = HolePlacement::classify(&REGION, &hole);
            let want: Vec<_> = covered_cells(&[REGION])
                .into_iter()
                .filter(|(x, y)| !hole.contains(&PixelViewport::new(*x, *y, 1, 1)))
                .collect();

            for partition in placement.partitions() {
                let pieces: Vec<_> = partition.iter().map(|&i| subs[i]).collect();
                assert!(pieces.iter().all(PixelViewport::is_valid));
                assert_eq!(
                    covered_cells(&pieces),
                    want,
                    "{placement:?} partition {partition:?}"
                );
            }
        }
    }
}
