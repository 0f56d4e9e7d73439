#![forbid(unsafe_code)]

//! Geometric primitives.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in grid-cell coordinates.
///
/// Origin at top-left; rows grow downward without bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridRect {
    /// Left column (inclusive).
    pub x: u16,
    /// Top row (inclusive).
    pub y: u16,
    /// Width in columns.
    pub w: u16,
    /// Height in rows.
    pub h: u16,
}

impl GridRect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    /// Create a rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(w: u16, h: u16) -> Self {
        Self::new(0, 0, w, h)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u32 {
        self.x as u32 + self.w as u32
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u32 {
        self.y as u32 + self.h as u32
    }

    /// Area in cells.
    #[inline]
    pub const fn area(&self) -> u32 {
        self.w as u32 * self.h as u32
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Whether the two rectangles share at least one cell.
    ///
    /// Rectangles that only touch along an edge do not overlap.
    #[inline]
    pub const fn overlaps(&self, other: &GridRect) -> bool {
        (self.x as u32) < other.right()
            && self.right() > other.x as u32
            && (self.y as u32) < other.bottom()
            && self.bottom() > other.y as u32
    }

    /// Whether the rectangle lies entirely within `columns` columns.
    #[inline]
    pub const fn fits_columns(&self, columns: u16) -> bool {
        self.right() <= columns as u32
    }

    /// Same size, different origin.
    #[inline]
    #[must_use]
    pub const fn with_origin(self, x: u16, y: u16) -> Self {
        Self::new(x, y, self.w, self.h)
    }

    /// Same origin, different size.
    #[inline]
    #[must_use]
    pub const fn with_size(self, w: u16, h: u16) -> Self {
        Self::new(self.x, self.y, w, h)
    }
}

impl std::fmt::Display for GridRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@({},{})", self.w, self.h, self.x, self.y)
    }
}
