//! Largest empty rectangle search over a block occupancy grid.
//!
//! [`EmptySpaceFinder::update`] builds a suffix-sum table in which every
//! cell holds the number of occupied cells in the rectangle reaching from it
//! to the bottom-right corner of the grid. Any sub-rectangle's occupancy is
//! then four lookups away, which keeps the anchor scan of
//! [`get_largest_empty_area`](EmptySpaceFinder::get_largest_empty_area)
//! cheap enough to run every frame.

use crate::geometry::PixelViewport;

/// Summed-area table over a boolean occupancy mask.
#[derive(Debug, Default)]
pub struct EmptySpaceFinder {
    width: i32,
    height: i32,
    /// `(width + 1) * (height + 1)` suffix counts; the extra row and column
    /// are zero.
    table: Vec<u32>,
    min_area: i64,
    min_ratio: f32,
}

impl EmptySpaceFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Holes below `min_area` cells, or below `min_ratio` of the searched
    /// region, are not reported.
    pub fn set_limits(&mut self, min_area: u32, min_ratio: f32) {
        self.min_area = i64::from(min_area);
        self.min_ratio = min_ratio.max(0.0);
    }

    /// Rebuild the table from a row-major mask (`true` = occupied).
    pub fn update(&mut self, mask: &[bool], width: i32, height: i32) {
        debug_assert!(width >= 0 && height >= 0);
        debug_assert_eq!(mask.len(), width as usize * height as usize);

        self.width = width;
        self.height = height;
        let stride = width as usize + 1;
        self.table.clear();
        self.table.resize(stride * (height as usize + 1), 0);

        for y in (0..height as usize).rev() {
            for x in (0..width as usize).rev() {
                let here = u32::from(mask[y * width as usize + x]);
                self.table[y * stride + x] = here + self.table[(y + 1) * stride + x]
                    + self.table[y * stride + x + 1]
                    - self.table[(y + 1) * stride + x + 1];
            }
        }
    }

    /// Occupied cells inside `(x, y, w, h)`.
    pub fn get_area(&self, x: i32, y: i32, w: i32, h: i32) -> u32 {
        debug_assert!(x >= 0 && y >= 0 && w >= 0 && h >= 0);
        debug_assert!(x + w <= self.width && y + h <= self.height);

        let stride = self.width as usize + 1;
        let at = |cx: i32, cy: i32| self.table[cy as usize * stride + cx as usize];
        at(x, y) + at(x + w, y + h) - at(x + w, y) - at(x, y + h)
    }

    pub fn get_area_pvp(&self, pvp: &PixelViewport) -> u32 {
        self.get_area(pvp.x, pvp.y, pvp.w, pvp.h)
    }

    /// Largest fully empty rectangle inside `pvp`.
    ///
    /// Returns a zero-extent viewport at `pvp`'s origin when `pvp` is fully
    /// occupied or no hole reaches the configured limits, and `pvp` itself
    /// when it is entirely empty.
    pub fn get_largest_empty_area(&self, pvp: &PixelViewport) -> PixelViewport {
        let none = PixelViewport::new(pvp.x, pvp.y, 0, 0);
        if !pvp.has_area() {
            return none;
        }
        debug_assert!(pvp.x >= 0 && pvp.y >= 0);
        debug_assert!(pvp.end_x() <= self.width && pvp.end_y() <= self.height);

        let total = pvp.area();
        let occupied = i64::from(self.get_area_pvp(pvp));
        if occupied == total {
            return none;
        }

        let relative = (self.min_ratio as f64 * total as f64).ceil() as i64;
        let min_area = self.min_area.max(relative).max(1);
        if total < min_area {
            return none;
        }
        if occupied == 0 {
            return *pvp;
        }

        let mut best = none;
        let mut best_area = min_area - 1;

        for y in pvp.y..pvp.end_y() {
            let rows_left = pvp.end_y() - y;
            if i64::from(pvp.w) * i64::from(rows_left) <= best_area {
                break;
            }

            for x in pvp.x..pvp.end_x() {
                let cols_left = pvp.end_x() - x;
                if i64::from(cols_left) * i64::from(rows_left) <= best_area {
                    break;
                }
                if self.get_area(x, y, 1, 1) != 0 {
                    continue;
                }

                let candidate = self.largest_from_anchor(x, y, cols_left, rows_left, best_area);
                if candidate.area() > best_area {
                    best_area = candidate.area();
                    best = candidate;
                }
            }
        }

        best
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Largest empty rectangle with its top-left corner at `(x, y)`, or a
    /// zero-extent viewport if none beats `floor`.
    fn largest_from_anchor(
        &self,
        x: i32,
        y: i32,
        cols_left: i32,
        rows_left: i32,
        mut floor: i64,
    ) -> PixelViewport {
        let mut best = PixelViewport::new(x, y, 0, 0);

        // Grow the largest empty square, then stretch it along each axis.
        let max_side = cols_left.min(rows_left);
        let mut side = 1;
        while side < max_side && self.get_area(x, y, side + 1, side + 1) == 0 {
            side += 1;
        }
        let mut wide = side;
        while wide < cols_left && self.get_area(x, y, wide + 1, side) == 0 {
            wide += 1;
        }
        let mut tall = side;
        while tall < rows_left && self.get_area(x, y, side, tall + 1) == 0 {
            tall += 1;
        }
        for candidate in [
            PixelViewport::new(x, y, wide, side),
            PixelViewport::new(x, y, side, tall),
        ] {
            if candidate.area() > floor {
                floor = candidate.area();
                best = candidate;
            }
        }

        // The stretched square can miss wide-and-short or narrow-and-tall
        // shapes. Walk the staircase of maximal widths per height; widths
        // only shrink as the height grows.
        let mut width = cols_left;
        for h in 1..=rows_left {
            while width > 0 && self.get_area(x, y, width, h) != 0 {
                width -= 1;
            }
            if width == 0 || i64::from(width) * i64::from(rows_left) <= floor {
                break;
            }
            let area = i64::from(width) * i64::from(h);
            if area > floor {
                floor = area;
                best = PixelViewport::new(x, y, width, h);
            }
        }

        best
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }
    }

    fn finder(mask: &[bool], w: i32, h: i32) -> EmptySpaceFinder {
        let mut f = EmptySpaceFinder::new();
        f.update(mask, w, h);
        f.set_limits(0, 0.0);
        f
    }

    fn brute_force_best(mask: &[bool], w: i32, pvp: &PixelViewport) -> i64 {
        let mut best = 0;
        for y0 in pvp.y..pvp.end_y() {
            for x0 in pvp.x..pvp.end_x() {
                for y1 in y0..pvp.end_y() {
                    for x1 in x0..pvp.end_x() {
                        let empty = (y0..=y1)
                            .all(|y| (x0..=x1).all(|x| !mask[(y * w + x) as usize]));
                        if empty {
                            best = best.max(i64::from(x1 - x0 + 1) * i64::from(y1 - y0 + 1));
                        }
                    }
                }
            }
        }
        best
    }

    #[test]
    fn area_queries_count_occupied_cells() {
        let mut mask = vec![false; 4 * 3];
        mask[0] = true; // (0,0)
        mask[5] = true; // (1,1)
        mask[11] = true; // (3,2)
        let f = finder(&mask, 4, 3);
        assert_eq!(f.get_area(0, 0, 4, 3), 3);
        assert_eq!(f.get_area(1, 1, 3, 2), 2);
        assert_eq!(f.get_area(2, 0, 2, 2), 0);
        assert_eq!(f.get_area(0, 0, 0, 0), 0);
    }

    #[test]
    fn full_and_empty_regions() {
        let f = finder(&[true; 9], 3, 3);
        let pvp = PixelViewport::new(0, 0, 3, 3);
        assert!(!f.get_largest_empty_area(&pvp).has_area());

        let f = finder(&[false; 9], 3, 3);
        assert_eq!(f.get_largest_empty_area(&pvp), pvp);
    }

    #[test]
    fn limits_suppress_small_holes() {
        let mut mask = vec![true; 8 * 8];
        for y in 2..4 {
            for x in 2..4 {
                mask[y * 8 + x] = false;
            }
        }
        let mut f = finder(&mask, 8, 8);
        let pvp = PixelViewport::new(0, 0, 8, 8);
        assert_eq!(f.get_largest_empty_area(&pvp), PixelViewport::new(2, 2, 2, 2));

        f.set_limits(5, 0.0);
        assert!(!f.get_largest_empty_area(&pvp).has_area());

        f.set_limits(0, 0.1);
        assert!(!f.get_largest_empty_area(&pvp).has_area());
    }

    #[test]
    fn wide_short_hole_beats_square() {
        // A 2x2 empty square at the anchor, but a 6x1 strip is larger.
        let w = 6;
        let mut mask = vec![true; 6 * 3];
        for x in 0..6 {
            mask[x] = false;
        }
        mask[6] = false;
        mask[7] = false;
        let f = finder(&mask, w, 3);
        let hole = f.get_largest_empty_area(&PixelViewport::new(0, 0, 6, 3));
        assert_eq!(hole, PixelViewport::new(0, 0, 6, 1));
    }

    #[test]
    fn matches_brute_force_on_random_grids() {
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        for round in 0..40 {
            let w = 3 + (rng.next() % 10) as i32;
            let h = 3 + (rng.next() % 10) as i32;
            let density = 2 + rng.next() % 5;
            let mask: Vec<bool> = (0..w * h).map(|_| rng.next() % 10 < density).collect();
            let f = finder(&mask, w, h);

            let sub = PixelViewport::new(
                (round % 2) as i32,
                (round % 3) as i32,
                w - (round % 2) as i32,
                h - (round % 3) as i32,
            );
            let hole = f.get_largest_empty_area(&sub);

            assert!(sub.contains(&hole) || !hole.has_area(), "round {round}");
            if hole.has_area() {
                assert_eq!(f.get_area_pvp(&hole), 0, "hole not empty in round {round}");
            }
            assert_eq!(
                hole.area(),
                brute_force_best(&mask, w, &sub),
                "round {round}: {w}x{h} sub {sub}"
            );
        }
    }
}
