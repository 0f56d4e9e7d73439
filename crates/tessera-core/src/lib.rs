#![forbid(unsafe_code)]

//! Core primitives shared by the Tessera crates.
//!
//! # Role in Tessera
//! `tessera-core` holds the pieces with no layout policy of their own:
//! cell-space rectangles, the resize-edge flag set used by interactive
//! resize gestures, and the clock abstraction that drives deferred work.
//! `tessera-layout` builds the grid engine on top of these.

pub mod clock;
pub mod edges;
pub mod geometry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use edges::{ResizeEdges, SizeLimits};
pub use geometry::GridRect;
