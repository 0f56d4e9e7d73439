#![forbid(unsafe_code)]

//! Responsive breakpoints and per-breakpoint layout projection.
//!
//! The canonical item list is edited at the active breakpoint's column count.
//! Each [`Breakpoint`] re-projects it onto its own column count as a list of
//! [`LayoutEntry`] values; edits made while viewing a breakpoint come back
//! through [`from_layout`].
//!
//! # Projection rules
//!
//! For every breakpoint, each item becomes one entry with
//! `w = min(item.w, columns)` (then clamped to the item's size limits),
//! `max_w`/`max_h` defaulting to the column count and the height cap, and
//! `bounded = true`. The projector clamps `x` to `columns - w` itself and,
//! when that clamp makes two tiles collide, pushes the later one (reading
//! order) down below its blockers. A breakpoint wide enough for every item
//! therefore projects the canonical list unchanged.
//!
//! # Selection
//!
//! Breakpoints are tried from the largest `min_width` down; the first one
//! with `min_width <= viewport` wins. A viewport narrower than every
//! threshold selects the breakpoint with the fewest columns.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tessera_core::{GridRect, SizeLimits};

use crate::item::{GridItem, ItemId};
use crate::placement::{LayoutReport, audit_cells};

/// Per-breakpoint projections keyed by breakpoint name.
pub type Layouts = BTreeMap<String, Vec<LayoutEntry>>;

/// A named viewport-width tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub name: String,
    /// Viewport width in pixels at which this tier becomes active.
    pub min_width: u32,
    pub columns: u16,
    /// Height cap for items without an explicit `max_h`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_h: Option<u16>,
}

impl Breakpoint {
    /// Create a tier without a specific height cap.
    pub fn new(name: impl Into<String>, min_width: u32, columns: u16) -> Self {
        Self {
            name: name.into(),
            min_width,
            columns,
            max_h: None,
        }
    }

    /// Set a tier-specific height cap.
    #[must_use]
    pub fn with_max_h(mut self, max_h: u16) -> Self {
        self.max_h = Some(max_h);
        self
    }
}

/// The five-tier table used when no configuration overrides it.
#[must_use]
pub fn standard_breakpoints() -> Vec<Breakpoint> {
    vec![
        Breakpoint::new("lg", 1200, 12),
        Breakpoint::new("md", 996, 10),
        Breakpoint::new("sm", 768, 6),
        Breakpoint::new("xs", 480, 4),
        Breakpoint::new("xxs", 0, 2),
    ]
}

/// Breakpoints ordered from the largest threshold down. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointTable {
    tiers: Vec<Breakpoint>,
}

impl BreakpointTable {
    /// Build a table. An empty list yields a single `default` tier of
    /// `fallback_columns` columns.
    #[must_use]
    pub fn new(mut tiers: Vec<Breakpoint>, fallback_columns: u16) -> Self {
        if tiers.is_empty() {
            tiers.push(Breakpoint::new("default", 0, fallback_columns.max(1)));
        }
        tiers.sort_by(|a, b| b.min_width.cmp(&a.min_width));
        Self { tiers }
    }

    /// All tiers, largest threshold first.
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.tiers.iter()
    }

    /// Number of tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Whether the table has no tiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Look up a tier by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Breakpoint> {
        self.tiers.iter().find(|bp| bp.name == name)
    }

    /// Tier with the fewest columns (ties: smallest threshold).
    #[must_use]
    pub fn smallest(&self) -> &Breakpoint {
        self.tiers
            .iter()
            .min_by_key(|bp| (bp.columns, bp.min_width))
            .unwrap_or(&self.tiers[0])
    }

    /// Widest column count across all tiers.
    #[must_use]
    pub fn max_columns(&self) -> u16 {
        self.tiers.iter().map(|bp| bp.columns).max().unwrap_or(1)
    }

    /// Active tier for a viewport width.
    #[must_use]
    pub fn select(&self, viewport_width: u32) -> &Breakpoint {
        self.tiers
            .iter()
            .find(|bp| bp.min_width <= viewport_width)
            .unwrap_or_else(|| self.smallest())
    }
}

/// One item as seen at one breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub item_id: ItemId,
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
    pub min_w: u16,
    pub min_h: u16,
    pub max_w: u16,
    pub max_h: u16,
    /// Always `true`: renderers must clamp to the breakpoint's columns too.
    pub bounded: bool,
}

impl LayoutEntry {
    /// The entry's rectangle.
    #[must_use]
    pub fn rect(&self) -> GridRect {
        GridRect::new(self.x, self.y, self.w, self.h)
    }

    /// The entry's size limits.
    #[must_use]
    pub fn limits(&self) -> SizeLimits {
        SizeLimits::new(self.min_w, self.min_h, self.max_w, self.max_h)
    }
}

/// Project `items` onto one breakpoint.
#[must_use]
pub fn project(items: &[GridItem], breakpoint: &Breakpoint, default_max_h: u16) -> Vec<LayoutEntry> {
    let columns = breakpoint.columns.max(1);
    let cap = breakpoint.max_h.unwrap_or(default_max_h);

    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&i| (items[i].y, items[i].x));

    let mut slots: Vec<Option<LayoutEntry>> = vec![None; items.len()];
    let mut placed: Vec<GridRect> = Vec::with_capacity(items.len());

    for i in order {
        let item = &items[i];
        let limits = item.limits(columns, cap);
        let w = limits.clamp_w(item.w.min(columns));
        let h = limits.clamp_h(item.h);
        let mut rect = GridRect::new(item.x.min(columns - w), item.y, w, h);

        loop {
            let blocker_bottom = placed
                .iter()
                .filter(|other| other.overlaps(&rect))
                .map(GridRect::bottom)
                .max();
            match blocker_bottom {
                Some(bottom) => rect.y = u16::try_from(bottom).unwrap_or(u16::MAX),
                None => break,
            }
            if rect.y == u16::MAX {
                break;
            }
        }

        placed.push(rect);
        slots[i] = Some(LayoutEntry {
            item_id: item.id.clone(),
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            min_w: limits.min_w,
            min_h: limits.min_h,
            max_w: limits.max_w,
            max_h: limits.max_h,
            bounded: true,
        });
    }

    slots.into_iter().flatten().collect()
}

/// Project `items` onto every breakpoint in `table`.
#[must_use]
pub fn to_layouts(items: &[GridItem], table: &BreakpointTable, default_max_h: u16) -> Layouts {
    let _span = tracing::debug_span!(
        "grid.project",
        items = items.len(),
        breakpoints = table.len()
    )
    .entered();

    table
        .iter()
        .map(|bp| (bp.name.clone(), project(items, bp, default_max_h)))
        .collect()
}

/// Fold an edited layout back into the canonical list.
///
/// Items with an entry take the entry's `x, y, w, h`; items without one are
/// returned unchanged. Entries naming unknown items are ignored.
#[must_use]
pub fn from_layout(items: &[GridItem], entries: &[LayoutEntry]) -> Vec<GridItem> {
    let by_id: FxHashMap<&str, &LayoutEntry> = entries
        .iter()
        .map(|entry| (entry.item_id.as_str(), entry))
        .collect();

    items
        .iter()
        .map(|item| {
            let mut next = item.clone();
            if let Some(entry) = by_id.get(item.id.as_str()) {
                next.set_rect(entry.rect());
            }
            next
        })
        .collect()
}

/// Check a projected layout against every invariant at `columns`.
pub fn audit_entries(entries: &[LayoutEntry], columns: u16) -> LayoutReport {
    audit_cells(
        entries
            .iter()
            .map(|entry| (&entry.item_id, entry.rect(), entry.limits())),
        columns,
    )
}
