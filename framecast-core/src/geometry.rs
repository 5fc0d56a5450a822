//! Integer pixel geometry shared by the frame and ROI pipelines.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── PixelViewport ────────────────────────────────────────────────

/// An axis-aligned rectangle in integer pixel (or block) coordinates.
///
/// A viewport with negative extent is invalid; one with zero extent is
/// valid but has no area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelViewport {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelViewport {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Non-negative extent.
    pub const fn is_valid(&self) -> bool {
        self.w >= 0 && self.h >= 0
    }

    /// Strictly positive extent.
    pub const fn has_area(&self) -> bool {
        self.w > 0 && self.h > 0
    }

    /// Covered cell count, `0` for degenerate viewports.
    pub const fn area(&self) -> i64 {
        if self.has_area() {
            self.w as i64 * self.h as i64
        } else {
            0
        }
    }

    /// One past the right-most column.
    pub const fn end_x(&self) -> i32 {
        self.x + self.w
    }

    /// One past the bottom-most row.
    pub const fn end_y(&self) -> i32 {
        self.y + self.h
    }

    /// The overlap of `self` and `other`.
    ///
    /// Disjoint inputs yield a zero-extent viewport anchored at the clamped
    /// origin.
    pub fn intersect(&self, other: &PixelViewport) -> PixelViewport {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let end_x = self.end_x().min(other.end_x());
        let end_y = self.end_y().min(other.end_y());
        PixelViewport {
            x,
            y,
            w: (end_x - x).max(0),
            h: (end_y - y).max(0),
        }
    }

    /// Smallest viewport containing both inputs. Degenerate inputs are
    /// ignored.
    pub fn union_bounds(&self, other: &PixelViewport) -> PixelViewport {
        if !other.has_area() {
            return *self;
        }
        if !self.has_area() {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PixelViewport {
            x,
            y,
            w: self.end_x().max(other.end_x()) - x,
            h: self.end_y().max(other.end_y()) - y,
        }
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &PixelViewport) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.end_x() <= self.end_x()
            && other.end_y() <= self.end_y()
    }

    pub const fn translated(&self, dx: i32, dy: i32) -> PixelViewport {
        PixelViewport {
            x: self.x + dx,
            y: self.y + dy,
            w: self.w,
            h: self.h,
        }
    }

    /// Multiply origin and extent by an integer factor (block grid -> pixels).
    pub const fn scaled(&self, factor: i32) -> PixelViewport {
        PixelViewport {
            x: self.x * factor,
            y: self.y * factor,
            w: self.w * factor,
            h: self.h * factor,
        }
    }

    /// Apply a zoom factor to origin and extent.
    pub fn apply_zoom(&self, zoom: Zoom) -> PixelViewport {
        if zoom.is_identity() {
            return *self;
        }
        PixelViewport {
            x: (self.x as f32 * zoom.x) as i32,
            y: (self.y as f32 * zoom.y) as i32,
            w: (self.w as f32 * zoom.x) as i32,
            h: (self.h as f32 * zoom.y) as i32,
        }
    }
}

impl fmt::Display for PixelViewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ {} {} {} {} ]", self.x, self.y, self.w, self.h)
    }
}

// ── Zoom ─────────────────────────────────────────────────────────

/// Per-axis scale factor applied during readback and assembly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zoom {
    pub x: f32,
    pub y: f32,
}

impl Zoom {
    /// Identity zoom.
    pub const NONE: Zoom = Zoom { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Finite and strictly positive on both axes.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x > 0.0 && self.y > 0.0
    }

    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self::NONE
    }
}

// ── PixelDecomposition ───────────────────────────────────────────

/// Pixel-interleaved decomposition of a source channel.
///
/// A frame rendered with `w = 2` holds every second column of the
/// destination, so image offsets are stretched by `w` and `h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelDecomposition {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelDecomposition {
    /// No decomposition.
    pub const ALL: PixelDecomposition = PixelDecomposition {
        x: 0,
        y: 0,
        w: 1,
        h: 1,
    };
}

impl Default for PixelDecomposition {
    fn default() -> Self {
        Self::ALL
    }
}
