#![forbid(unsafe_code)]

//! Validity checks and auto-placement.
//!
//! [`Placement`] is a read-only view over a slice of items at a given column
//! count. It answers two questions:
//!
//! - *Can this rectangle go here?* ([`Placement::is_valid_position`]):
//!   inside the columns and overlapping nothing except, optionally, the item
//!   being moved.
//! - *Where does a new `w × h` tile go?* ([`Placement::next_position`]):
//!   the first free cell in reading order (row by row, left to right).
//!
//! [`audit`] checks a whole list against every layout invariant and reports
//! each violation instead of stopping at the first one.
//!
//! # Invariants
//!
//! 1. `next_position` is a pure function of the items, columns, scan limit
//!    and requested size.
//! 2. When `w <= columns`, the returned position is always valid: at
//!    `y = max_bottom` every column is free, so the scan finds it before
//!    the fallback.

use std::fmt;

use rustc_hash::FxHashSet;
use tessera_core::{GridRect, SizeLimits};

use crate::item::{GridItem, ItemId};

/// Default number of rows scanned by [`Placement::next_position`].
pub const DEFAULT_SCAN_ROW_LIMIT: u16 = 1000;

/// Read-only placement view.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    items: &'a [GridItem],
    columns: u16,
    scan_rows: u16,
}

impl<'a> Placement<'a> {
    /// Create a view over `items` on a grid of `columns` columns.
    #[must_use]
    pub fn new(items: &'a [GridItem], columns: u16) -> Self {
        Self {
            items,
            columns,
            scan_rows: DEFAULT_SCAN_ROW_LIMIT,
        }
    }

    /// Override the row ceiling used by [`next_position`](Self::next_position).
    #[must_use]
    pub fn with_scan_limit(mut self, rows: u16) -> Self {
        self.scan_rows = rows;
        self
    }

    /// Column count of this view.
    #[must_use]
    pub const fn columns(&self) -> u16 {
        self.columns
    }

    /// Whether `rect` is inside the grid and overlaps no item other than
    /// `exclude`.
    #[must_use]
    pub fn is_valid_position(&self, rect: GridRect, exclude: Option<&str>) -> bool {
        if rect.is_empty() || !rect.fits_columns(self.columns) {
            return false;
        }
        !self
            .items
            .iter()
            .any(|item| Some(item.id.as_str()) != exclude && item.rect().overlaps(&rect))
    }

    /// Ids of the items `rect` would overlap, in list order.
    pub fn collisions(
        &self,
        rect: GridRect,
        exclude: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ItemId> + 'a {
        self.items
            .iter()
            .filter(move |item| Some(item.id.as_str()) != exclude && item.rect().overlaps(&rect))
            .map(|item| &item.id)
    }

    /// Lowest occupied row boundary: `max(y + h)` over all items, `0` when empty.
    #[must_use]
    pub fn max_bottom(&self) -> u16 {
        let bottom = self.items.iter().map(|item| item.rect().bottom()).max();
        bottom.map_or(0, |b| u16::try_from(b).unwrap_or(u16::MAX))
    }

    /// First free `(x, y)` for a `w × h` tile in reading order.
    ///
    /// Falls back to `(0, max_bottom)` when nothing fits within the scan
    /// limit or the tile is wider than the grid.
    #[must_use]
    pub fn next_position(&self, w: u16, h: u16) -> (u16, u16) {
        if w > 0 && h > 0 && w <= self.columns {
            for y in 0..self.scan_rows {
                for x in 0..=(self.columns - w) {
                    if self.is_valid_position(GridRect::new(x, y, w, h), None) {
                        return (x, y);
                    }
                }
            }
        }
        (0, self.max_bottom())
    }
}

/// One invariant violation found by [`audit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutIssue {
    DuplicateId {
        id: ItemId,
    },
    EmptySize {
        id: ItemId,
    },
    OutOfBounds {
        id: ItemId,
        rect: GridRect,
        columns: u16,
    },
    Overlap {
        first: ItemId,
        second: ItemId,
    },
    SizeOutsideLimits {
        id: ItemId,
        rect: GridRect,
        limits: SizeLimits,
    },
}

impl fmt::Display for LayoutIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "duplicate item id `{id}`"),
            Self::EmptySize { id } => write!(f, "item `{id}` has zero width or height"),
            Self::OutOfBounds { id, rect, columns } => {
                write!(f, "item `{id}` at {rect} exceeds {columns} columns")
            }
            Self::Overlap { first, second } => {
                write!(f, "items `{first}` and `{second}` overlap")
            }
            Self::SizeOutsideLimits { id, rect, limits } => write!(
                f,
                "item `{id}` size {}x{} outside limits {}..={} x {}..={}",
                rect.w, rect.h, limits.min_w, limits.max_w, limits.min_h, limits.max_h
            ),
        }
    }
}

/// Result of [`audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutReport {
    pub issues: Vec<LayoutIssue>,
}

impl LayoutReport {
    /// No invariant is violated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every layout invariant over `cells`.
///
/// Each cell is `(id, rect, limits)`; this is shared by the canonical item
/// audit and the per-breakpoint projection audit.
pub fn audit_cells<'a>(
    cells: impl IntoIterator<Item = (&'a ItemId, GridRect, SizeLimits)>,
    columns: u16,
) -> LayoutReport {
    let cells: Vec<_> = cells.into_iter().collect();
    let mut issues = Vec::new();
    let mut seen = FxHashSet::default();

    for &(id, rect, limits) in &cells {
        if !seen.insert(id.as_str()) {
            issues.push(LayoutIssue::DuplicateId { id: id.clone() });
        }
        if rect.is_empty() {
            issues.push(LayoutIssue::EmptySize { id: id.clone() });
            continue;
        }
        if !rect.fits_columns(columns) {
            issues.push(LayoutIssue::OutOfBounds {
                id: id.clone(),
                rect,
                columns,
            });
        }
        if !limits.admits(rect.w, rect.h) {
            issues.push(LayoutIssue::SizeOutsideLimits {
                id: id.clone(),
                rect,
                limits,
            });
        }
    }

    for (i, &(first, a, _)) in cells.iter().enumerate() {
        for &(second, b, _) in &cells[i + 1..] {
            if a.overlaps(&b) {
                issues.push(LayoutIssue::Overlap {
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }
    }

    LayoutReport { issues }
}

/// Check canonical items against the invariants at `columns`.
pub fn audit(items: &[GridItem], columns: u16, default_max_h: u16) -> LayoutReport {
    audit_cells(
        items
            .iter()
            .map(|item| (&item.id, item.rect(), item.limits(columns, default_max_h))),
        columns,
    )
}
