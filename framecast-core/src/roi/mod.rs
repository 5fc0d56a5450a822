//! Region-of-interest engine.
//!
//! Reduces a readback viewport to the rectangles that actually hold
//! content, using cheap per-block statistics instead of full-resolution
//! pixels:
//!
//! - [`EmptySpaceFinder`]: largest empty rectangle over an occupancy grid
//! - [`RoiFinder`]: bounding-box tightening and recursive hole splitting
//! - [`RoiTracker`]: per-stage run/skip control that backs off when the
//!   search does not pay for itself

pub mod empty_space;
pub mod finder;
pub mod split;
pub mod tracker;

pub use empty_space::EmptySpaceFinder;
pub use finder::RoiFinder;
pub use split::HolePlacement;
pub use tracker::{RoiTracker, Ticket};
