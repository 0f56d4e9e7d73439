#![forbid(unsafe_code)]

//! Resize edges and size limits.
//!
//! A resize gesture grabs one or two edges of a tile. [`ResizeEdges`] is the
//! flag set naming them; [`ResizeEdges::resize`] turns a cell delta into a
//! new rectangle, keeping the opposite edge anchored and honoring
//! [`SizeLimits`].
//!
//! # Invariants
//!
//! 1. The returned rectangle always satisfies the limits (after the limits
//!    themselves are normalized so that `min <= max`).
//! 2. A west or north resize never moves the origin below zero; the size is
//!    capped at the distance to the anchored edge instead.
//! 3. An axis with both opposing edges set (or neither) is left unchanged.

use bitflags::bitflags;

use crate::geometry::GridRect;

bitflags! {
    /// Edges of a tile affected by a resize gesture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct ResizeEdges: u8 {
        /// Top edge: moves the origin row.
        const NORTH = 0b0001;
        /// Bottom edge.
        const SOUTH = 0b0010;
        /// Right edge.
        const EAST  = 0b0100;
        /// Left edge: moves the origin column.
        const WEST  = 0b1000;

        /// Bottom-right corner handle.
        const SOUTH_EAST = Self::SOUTH.bits() | Self::EAST.bits();
        /// Bottom-left corner handle.
        const SOUTH_WEST = Self::SOUTH.bits() | Self::WEST.bits();
        /// Top-right corner handle.
        const NORTH_EAST = Self::NORTH.bits() | Self::EAST.bits();
        /// Top-left corner handle.
        const NORTH_WEST = Self::NORTH.bits() | Self::WEST.bits();
    }
}

impl Default for ResizeEdges {
    fn default() -> Self {
        Self::SOUTH_EAST
    }
}

/// Resolved size bounds for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub min_w: u16,
    pub min_h: u16,
    pub max_w: u16,
    pub max_h: u16,
}

impl SizeLimits {
    /// Create limits, normalizing so every bound is at least 1 and `min <= max`.
    #[must_use]
    pub fn new(min_w: u16, min_h: u16, max_w: u16, max_h: u16) -> Self {
        let max_w = max_w.max(1);
        let max_h = max_h.max(1);
        Self {
            min_w: min_w.clamp(1, max_w),
            min_h: min_h.clamp(1, max_h),
            max_w,
            max_h,
        }
    }

    /// Clamp a proposed width.
    #[inline]
    #[must_use]
    pub fn clamp_w(&self, w: u16) -> u16 {
        w.clamp(self.min_w, self.max_w)
    }

    /// Clamp a proposed height.
    #[inline]
    #[must_use]
    pub fn clamp_h(&self, h: u16) -> u16 {
        h.clamp(self.min_h, self.max_h)
    }

    /// Whether `(w, h)` already lies within the limits.
    #[inline]
    #[must_use]
    pub fn admits(&self, w: u16, h: u16) -> bool {
        (self.min_w..=self.max_w).contains(&w) && (self.min_h..=self.max_h).contains(&h)
    }
}

impl ResizeEdges {
    /// Whether this set moves the horizontal extent.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        self.contains(Self::EAST) != self.contains(Self::WEST)
    }

    /// Whether this set moves the vertical extent.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        self.contains(Self::NORTH) != self.contains(Self::SOUTH)
    }

    /// Apply a cell delta (relative to the gesture origin) to `origin`.
    ///
    /// `dx`/`dy` are measured from where the gesture started, not from the
    /// previous update, so repeated calls are idempotent for the same delta.
    #[must_use]
    pub fn resize(self, origin: GridRect, dx: i32, dy: i32, limits: SizeLimits) -> GridRect {
        let (x, w) = resize_axis(
            origin.x,
            origin.w,
            dx,
            self.contains(Self::WEST),
            self.contains(Self::EAST),
            limits.min_w,
            limits.max_w,
        );
        let (y, h) = resize_axis(
            origin.y,
            origin.h,
            dy,
            self.contains(Self::NORTH),
            self.contains(Self::SOUTH),
            limits.min_h,
            limits.max_h,
        );
        GridRect::new(x, y, w, h)
    }
}

fn resize_axis(
    start: u16,
    len: u16,
    delta: i32,
    leading: bool,
    trailing: bool,
    min: u16,
    max: u16,
) -> (u16, u16) {
    let start_i = i32::from(start);
    let len_i = i32::from(len);
    match (leading, trailing) {
        (false, true) => {
            let max = i32::from(max);
            let min = i32::from(min).min(max);
            let next = len_i.saturating_add(delta).clamp(min, max);
            (start, to_u16(next, len))
        }
        (true, false) => {
            let end = start_i + len_i;
            let max = i32::from(max).min(end);
            let min = i32::from(min).min(max);
            let next = len_i.saturating_sub(delta).clamp(min, max);
            (to_u16(end - next, start), to_u16(next, len))
        }
        _ => (start, len),
    }
}

fn to_u16(value: i32, fallback: u16) -> u16 {
    u16::try_from(value).unwrap_or(fallback)
}
