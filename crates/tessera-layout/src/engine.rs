#![forbid(unsafe_code)]

//! The grid mutation engine.
//!
//! [`GridEngine`] owns the canonical item list and is the only thing that
//! changes it. Every entry point runs to completion synchronously; the one
//! piece of deferred work is vertical compaction, which is debounced through
//! a [`DeferredTask`] and fired by the host calling [`GridEngine::tick`].
//!
//! # Gesture state machine
//!
//! ```text
//!            begin_drag(id)                 begin_resize(id)
//!   ┌──────┐ ─────────────► ┌──────────┐    ┌──────────┐
//!   │ Idle │                │ Dragging │    │ Resizing │
//!   └──────┘ ◄───────────── └──────────┘    └──────────┘
//!       ▲      end_drag / cancel_gesture          │
//!       └─────────────────────────────────────────┘
//!                 end_resize / cancel_gesture
//! ```
//!
//! Updates are sticky: a proposal that would overlap another tile or leave
//! the grid is dropped and the tile keeps its last valid geometry. Each
//! update reports whether it was applied.
//!
//! # Invariants
//!
//! After every public call the canonical list satisfies, at the working
//! column count ([`GridEngine::columns`]: the active breakpoint's, never more
//! than the configured count):
//!
//! 1. every tile is inside the columns;
//! 2. no two tiles overlap;
//! 3. every tile's size is within its limits;
//! 4. ids are unique.
//!
//! Per-breakpoint projections (see [`crate::breakpoint`]) uphold 1–3 for
//! their own column counts. When the active breakpoint changes, or an undo
//! restores a list authored at another one, the canonical list is re-projected
//! onto the new working columns if it no longer fits them.
//!
//! # Undo
//!
//! A before-image of the whole list is pushed before `add`, `remove`,
//! `begin_drag`, `begin_resize`, `reset_layout` and `auto_arrange`.
//! [`GridEngine::undo`] restores the newest one and cancels any pending
//! compaction.
//!
//! # Deferred compaction
//!
//! [`GridEngine::tick`] leaves the deadline pending while a drag or resize is
//! in progress, so compaction never moves tiles under the pointer. It fires
//! on the first tick after the gesture ends. [`GridEngine::flush`] runs it
//! regardless.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tessera_core::{Clock, GridRect, ResizeEdges, SizeLimits, SystemClock};

use crate::breakpoint::{
    Breakpoint, BreakpointTable, LayoutEntry, Layouts, audit_entries, from_layout, project,
    to_layouts,
};
use crate::compaction::compact_in_place;
use crate::config::EngineConfig;
use crate::item::{GridItem, ItemId, Payload};
use crate::placement::{LayoutReport, Placement, audit};
use crate::registry::{StaticRegistry, WidgetRegistry};
use crate::schedule::DeferredTask;
use crate::store::{LayoutStore, MemoryStore};
use crate::undo::UndoStack;

/// Active pointer gesture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Dragging {
        id: ItemId,
        /// Geometry when the drag began.
        origin: GridRect,
    },
    Resizing {
        id: ItemId,
        edges: ResizeEdges,
        /// Geometry when the resize began; deltas are relative to it.
        origin: GridRect,
    },
}

impl Gesture {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Item under the gesture, if any.
    #[must_use]
    pub fn item(&self) -> Option<&ItemId> {
        match self {
            Self::Idle => None,
            Self::Dragging { id, .. } | Self::Resizing { id, .. } => Some(id),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dragging { .. } => "dragging",
            Self::Resizing { .. } => "resizing",
        }
    }
}

/// Notification sent to subscribers after the canonical list changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum LayoutChange {
    Added { id: ItemId },
    Removed { id: ItemId },
    Moved { id: ItemId, rect: GridRect },
    Resized { id: ItemId, rect: GridRect },
    Compacted { moved: usize },
    Reset,
    Arranged,
    Restored,
    LayoutCommitted { breakpoint: String },
    /// The canonical list was re-projected onto a new working column count.
    Reflowed { breakpoint: String },
    PayloadUpdated { id: ItemId },
}

type Listener = Box<dyn FnMut(&LayoutChange)>;

/// Builder for [`GridEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Box<dyn LayoutStore>>,
    registry: Option<Box<dyn WidgetRegistry>>,
    clock: Option<Box<dyn Clock>>,
    defaults: Vec<GridItem>,
    viewport_width: Option<u32>,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("defaults", &self.defaults.len())
            .field("viewport_width", &self.viewport_width)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Persistence gateway. Defaults to an empty [`MemoryStore`].
    #[must_use]
    pub fn store(mut self, store: impl LayoutStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Widget registry. Defaults to an empty [`StaticRegistry`].
    #[must_use]
    pub fn registry(mut self, registry: impl WidgetRegistry + 'static) -> Self {
        self.registry = Some(Box::new(registry));
        self
    }

    /// Time source for deferred compaction. Defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Layout used when nothing valid is persisted.
    #[must_use]
    pub fn defaults(mut self, items: Vec<GridItem>) -> Self {
        self.defaults = items;
        self
    }

    /// Initial viewport width in pixels.
    #[must_use]
    pub fn viewport_width(mut self, width: u32) -> Self {
        self.viewport_width = Some(width);
        self
    }

    /// Load the persisted layout (or the defaults) and build the engine.
    #[must_use]
    pub fn build(self) -> GridEngine {
        let problems = self.config.validate();
        let config = if problems.is_empty() {
            self.config
        } else {
            tracing::warn!(
                target: "tessera.engine",
                problems = %problems.join("; "),
                "invalid engine config, restoring defaults for rejected fields"
            );
            self.config.sanitize()
        };

        let store = self.store.unwrap_or_else(|| Box::new(MemoryStore::new()));
        let table = config.breakpoint_table();
        let working = working_breakpoint(&table, &config, self.viewport_width);
        let mut items = load_items(store.as_ref(), &config, self.defaults);
        if let Some(fitted) = fit_to(&items, &working, config.default_max_h) {
            tracing::debug!(
                target: "tessera.engine",
                breakpoint = %working.name,
                columns = working.columns,
                "initial layout reflowed"
            );
            items = fitted;
        }

        tracing::debug!(
            target: "tessera.engine",
            items = items.len(),
            columns = working.columns,
            key = %config.storage_key,
            "grid engine ready"
        );

        GridEngine {
            table,
            undo: UndoStack::new(config.undo_capacity),
            compaction: DeferredTask::new(config.compaction_delay()),
            config,
            viewport_width: self.viewport_width,
            items,
            gesture: Gesture::Idle,
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock::new())),
            store,
            registry: self
                .registry
                .unwrap_or_else(|| Box::new(StaticRegistry::new())),
            listeners: Vec::new(),
            revision: 0,
            layout_cache: None,
            next_seq: 0,
        }
    }
}

/// Owner of the canonical item list.
pub struct GridEngine {
    config: EngineConfig,
    table: BreakpointTable,
    viewport_width: Option<u32>,
    items: Vec<GridItem>,
    gesture: Gesture,
    undo: UndoStack<Vec<GridItem>>,
    compaction: DeferredTask,
    clock: Box<dyn Clock>,
    store: Box<dyn LayoutStore>,
    registry: Box<dyn WidgetRegistry>,
    listeners: Vec<Listener>,
    /// Bumped on every canonical change; keys the projection cache.
    revision: u64,
    layout_cache: Option<(u64, Layouts)>,
    next_seq: u64,
}

impl fmt::Debug for GridEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridEngine")
            .field("items", &self.items.len())
            .field("columns", &self.columns())
            .field("active", &self.active_breakpoint().name)
            .field("gesture", &self.gesture.label())
            .field("undo", &self.undo)
            .field("compaction", &self.compaction)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl GridEngine {
    /// Start building an engine with `config`.
    #[must_use]
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            store: None,
            registry: None,
            clock: None,
            defaults: Vec::new(),
            viewport_width: None,
        }
    }

    // ----- read accessors ------------------------------------------------

    /// The canonical item list, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[GridItem] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&GridItem> {
        self.items.iter().find(|item| item.id.as_str() == id)
    }

    #[must_use]
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.table
    }

    /// Column count the canonical list is edited and validated at: the
    /// active breakpoint's, capped at the configured count.
    #[must_use]
    pub fn columns(&self) -> u16 {
        self.active_columns().min(self.config.columns)
    }

    /// Height cap for items without an explicit `max_h` at the active
    /// breakpoint.
    #[must_use]
    pub fn height_cap(&self) -> u16 {
        self.active_breakpoint()
            .max_h
            .unwrap_or(self.config.default_max_h)
    }

    #[must_use]
    pub fn viewport_width(&self) -> Option<u32> {
        self.viewport_width
    }

    /// Breakpoint selected by the current viewport; the widest tier until a
    /// viewport is set.
    #[must_use]
    pub fn active_breakpoint(&self) -> &Breakpoint {
        self.table.select(self.viewport_width.unwrap_or(u32::MAX))
    }

    /// Column count of the active breakpoint.
    #[must_use]
    pub fn active_columns(&self) -> u16 {
        self.active_breakpoint().columns
    }

    /// Number of undo snapshots held.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Whether a compaction is scheduled but has not run yet.
    #[must_use]
    pub fn pending_compaction(&self) -> bool {
        self.compaction.is_pending()
    }

    /// Time left before the pending compaction, if any.
    #[must_use]
    pub fn compaction_remaining(&self) -> Option<std::time::Duration> {
        self.compaction.remaining(self.clock.now())
    }

    /// Monotonic change counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Check the canonical list against every invariant.
    #[must_use]
    pub fn audit(&self) -> LayoutReport {
        audit(&self.items, self.columns(), self.height_cap())
    }

    /// Projections for every breakpoint, recomputed only after a change.
    pub fn layouts(&mut self) -> &Layouts {
        let revision = self.revision;
        if self
            .layout_cache
            .as_ref()
            .is_some_and(|(cached, _)| *cached != revision)
        {
            self.layout_cache = None;
        }
        let (_, layouts) = self.layout_cache.get_or_insert_with(|| {
            (
                revision,
                to_layouts(&self.items, &self.table, self.config.default_max_h),
            )
        });
        layouts
    }

    /// Projection for one breakpoint by name.
    pub fn layout_for(&mut self, breakpoint: &str) -> Option<&[LayoutEntry]> {
        self.layouts().get(breakpoint).map(Vec::as_slice)
    }

    /// Projection for the active breakpoint.
    pub fn active_layout(&mut self) -> &[LayoutEntry] {
        let name = self.active_breakpoint().name.clone();
        self.layouts().get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    // ----- notification --------------------------------------------------

    /// Register a callback invoked after every canonical change.
    pub fn subscribe(&mut self, listener: impl FnMut(&LayoutChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ----- add / remove --------------------------------------------------

    /// Add a tile of `kind` at the first free position.
    ///
    /// Returns `None` (and changes nothing) when the registry does not know
    /// `kind`.
    pub fn add(&mut self, kind: &str) -> Option<ItemId> {
        let Some(defaults) = self.registry.lookup(kind) else {
            tracing::debug!(target: "tessera.engine", kind = %kind, "unknown widget kind ignored");
            return None;
        };

        let columns = self.columns();
        let limits = defaults.size.limits(columns, self.height_cap());
        let w = limits.clamp_w(defaults.size.w.min(columns));
        let h = limits.clamp_h(defaults.size.h);

        self.snapshot();
        let (x, y) = self.placement().next_position(w, h);
        let id = self.fresh_id(kind);

        let mut item = GridItem::new(id.clone(), kind, GridRect::new(x, y, w, h))
            .with_payload(defaults.props);
        item.min_w = defaults.size.min_w;
        item.min_h = defaults.size.min_h;
        item.max_w = defaults.size.max_w;
        item.max_h = defaults.size.max_h;
        self.items.push(item);

        tracing::debug!(target: "tessera.engine", id = %id, x, y, w, h, "item added");
        self.changed(LayoutChange::Added { id: id.clone() });
        self.schedule_compaction();
        Some(id)
    }

    /// Remove a tile. Unknown ids change nothing.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.snapshot();
        if self.gesture.item().is_some_and(|active| active.as_str() == id) {
            self.gesture = Gesture::Idle;
        }
        let removed = self.items.remove(index);

        tracing::debug!(target: "tessera.engine", id = %removed.id, "item removed");
        self.changed(LayoutChange::Removed { id: removed.id });
        self.schedule_compaction();
        true
    }

    // ----- drag ----------------------------------------------------------

    /// Start dragging `id`. Abandons any gesture already in progress.
    pub fn begin_drag(&mut self, id: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.abandon_gesture();
        self.snapshot();
        let item = &self.items[index];
        self.gesture = Gesture::Dragging {
            id: item.id.clone(),
            origin: item.rect(),
        };
        tracing::debug!(target: "tessera.engine", id = %id, "drag started");
        true
    }

    /// Propose a new origin for the dragged tile.
    ///
    /// Applied only when the tile would stay inside the grid without
    /// overlapping anything; otherwise the last valid position is kept.
    pub fn update_position(&mut self, id: &str, x: i32, y: i32) -> bool {
        if !matches!(&self.gesture, Gesture::Dragging { id: active, .. } if active.as_str() == id) {
            tracing::trace!(target: "tessera.engine", id = %id, gesture = self.gesture.label(), "move outside drag ignored");
            return false;
        }
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let (Ok(x), Ok(y)) = (u16::try_from(x), u16::try_from(y)) else {
            tracing::trace!(target: "tessera.engine", id = %id, x, y, "negative position rejected");
            return false;
        };
        let rect = self.items[index].rect().with_origin(x, y);
        self.apply_rect(index, rect, false)
    }

    /// Finish dragging `id`.
    pub fn end_drag(&mut self, id: &str) -> bool {
        if !matches!(&self.gesture, Gesture::Dragging { id: active, .. } if active.as_str() == id) {
            return false;
        }
        self.gesture = Gesture::Idle;
        tracing::debug!(target: "tessera.engine", id = %id, "drag ended");
        self.schedule_compaction();
        true
    }

    // ----- resize --------------------------------------------------------

    /// Start resizing `id` from its bottom-right corner.
    pub fn begin_resize(&mut self, id: &str) -> bool {
        self.begin_resize_from(id, ResizeEdges::SOUTH_EAST)
    }

    /// Start resizing `id` by the given edges.
    pub fn begin_resize_from(&mut self, id: &str, edges: ResizeEdges) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.abandon_gesture();
        self.snapshot();
        let item = &self.items[index];
        self.gesture = Gesture::Resizing {
            id: item.id.clone(),
            edges,
            origin: item.rect(),
        };
        tracing::debug!(target: "tessera.engine", id = %id, edges = ?edges, "resize started");
        true
    }

    /// Propose an absolute size for the resized tile.
    ///
    /// The size is clamped to the tile's limits first; the origin stays put.
    pub fn update_size(&mut self, id: &str, w: u16, h: u16) -> bool {
        if self.resize_target(id).is_none() {
            tracing::trace!(target: "tessera.engine", id = %id, gesture = self.gesture.label(), "resize outside gesture ignored");
            return false;
        }
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let limits = self.limits_at(index);
        let rect = self.items[index]
            .rect()
            .with_size(limits.clamp_w(w), limits.clamp_h(h));
        self.apply_rect(index, rect, true)
    }

    /// Propose a resize as a cell delta from the gesture's starting
    /// geometry, applied to the grabbed edges.
    pub fn update_resize_delta(&mut self, id: &str, dx: i32, dy: i32) -> bool {
        let Some((edges, origin)) = self.resize_target(id) else {
            tracing::trace!(target: "tessera.engine", id = %id, gesture = self.gesture.label(), "resize outside gesture ignored");
            return false;
        };
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let rect = edges.resize(origin, dx, dy, self.limits_at(index));
        self.apply_rect(index, rect, true)
    }

    /// Finish resizing `id`.
    pub fn end_resize(&mut self, id: &str) -> bool {
        if self.resize_target(id).is_none() {
            return false;
        }
        self.gesture = Gesture::Idle;
        tracing::debug!(target: "tessera.engine", id = %id, "resize ended");
        self.schedule_compaction();
        true
    }

    /// Abandon the current gesture. The tile keeps its last valid geometry.
    pub fn cancel_gesture(&mut self) -> bool {
        if self.gesture.is_idle() {
            return false;
        }
        self.abandon_gesture();
        self.schedule_compaction();
        true
    }

    // ----- whole-layout operations ---------------------------------------

    /// Send every tile back to the origin and repack them in list order.
    pub fn reset_layout(&mut self) {
        self.snapshot();
        self.gesture = Gesture::Idle;
        for item in &mut self.items {
            item.x = 0;
            item.y = 0;
        }
        self.items = repack(
            std::mem::take(&mut self.items),
            self.columns(),
            self.config.scan_row_limit,
        );
        self.layout_cache = None;
        tracing::debug!(target: "tessera.engine", items = self.items.len(), "layout reset");
        self.changed(LayoutChange::Reset);
        self.schedule_compaction();
    }

    /// Reflow every tile left to right, top to bottom, in list order, within
    /// the working column count.
    pub fn auto_arrange(&mut self) {
        self.snapshot();
        self.gesture = Gesture::Idle;
        self.items = repack(
            std::mem::take(&mut self.items),
            self.columns(),
            self.config.scan_row_limit,
        );
        tracing::debug!(target: "tessera.engine", items = self.items.len(), "layout arranged");
        self.changed(LayoutChange::Arranged);
        self.schedule_compaction();
    }

    /// Restore the list as it was before the most recent snapshotting
    /// operation. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo.pop() else {
            return false;
        };
        self.items = previous;
        self.gesture = Gesture::Idle;
        self.compaction.cancel();
        self.layout_cache = None;
        tracing::debug!(
            target: "tessera.engine",
            items = self.items.len(),
            depth = self.undo.len(),
            "undo applied"
        );
        self.changed(LayoutChange::Restored);
        self.refit();
        true
    }

    /// Fold an edited per-breakpoint layout back into the canonical list.
    ///
    /// The entries must be valid at their breakpoint's column count, and the
    /// merged list (sizes clamped to limits) must be valid at the working
    /// column count; otherwise nothing changes and `false` is returned.
    pub fn commit_layout(&mut self, breakpoint: &str, entries: &[LayoutEntry]) -> bool {
        let Some(bp) = self.table.get(breakpoint) else {
            tracing::debug!(target: "tessera.engine", breakpoint = %breakpoint, "commit for unknown breakpoint ignored");
            return false;
        };
        let entry_report = audit_entries(entries, bp.columns);
        if !entry_report.is_valid() {
            tracing::debug!(
                target: "tessera.engine",
                breakpoint = %breakpoint,
                issues = entry_report.issues.len(),
                "layout commit rejected"
            );
            return false;
        }

        let columns = self.columns();
        let cap = self.height_cap();
        let mut merged = from_layout(&self.items, entries);
        for item in &mut merged {
            let limits = item.limits(columns, cap);
            item.w = limits.clamp_w(item.w);
            item.h = limits.clamp_h(item.h);
        }
        let report = audit(&merged, columns, cap);
        if !report.is_valid() {
            tracing::debug!(
                target: "tessera.engine",
                breakpoint = %breakpoint,
                issues = report.issues.len(),
                "merged layout rejected"
            );
            return false;
        }

        if merged != self.items {
            self.items = merged;
            self.changed(LayoutChange::LayoutCommitted {
                breakpoint: breakpoint.to_owned(),
            });
            self.schedule_compaction();
        }
        true
    }

    /// Replace a tile's property bag. Geometry and undo history are untouched.
    pub fn update_payload(&mut self, id: &str, payload: Payload) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.items[index].payload = payload;
        let id = self.items[index].id.clone();
        self.changed(LayoutChange::PayloadUpdated { id });
        true
    }

    /// Select the active breakpoint for a viewport width.
    ///
    /// Returns whether the active breakpoint changed. On a change the
    /// canonical list is reflowed onto the new working columns when it no
    /// longer fits them.
    pub fn set_viewport_width(&mut self, width: u32) -> bool {
        let before = self.active_breakpoint().name.clone();
        self.viewport_width = Some(width);
        let after = &self.active_breakpoint().name;
        let switched = *after != before;
        if switched {
            tracing::debug!(
                target: "tessera.engine",
                width,
                from = %before,
                to = %after,
                "active breakpoint changed"
            );
            self.refit();
        }
        switched
    }

    // ----- deferred compaction -------------------------------------------

    /// Run the pending compaction if its deadline has passed and no gesture
    /// is in progress.
    ///
    /// Returns whether a compaction ran.
    pub fn tick(&mut self) -> bool {
        if !self.gesture.is_idle() {
            return false;
        }
        let now = self.clock.now();
        if self.compaction.poll(now) {
            self.run_compaction();
            true
        } else {
            false
        }
    }

    /// Run the pending compaction now, ignoring its deadline and any gesture.
    pub fn flush(&mut self) -> bool {
        if self.compaction.take() {
            self.run_compaction();
            true
        } else {
            false
        }
    }

    // ----- internals -----------------------------------------------------

    fn placement(&self) -> Placement<'_> {
        Placement::new(&self.items, self.columns()).with_scan_limit(self.config.scan_row_limit)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id.as_str() == id)
    }

    fn limits_at(&self, index: usize) -> SizeLimits {
        self.items[index].limits(self.columns(), self.height_cap())
    }

    fn resize_target(&self, id: &str) -> Option<(ResizeEdges, GridRect)> {
        match &self.gesture {
            Gesture::Resizing { id: active, edges, origin } if active.as_str() == id => {
                Some((*edges, *origin))
            }
            _ => None,
        }
    }

    fn fresh_id(&mut self, kind: &str) -> ItemId {
        loop {
            self.next_seq += 1;
            let candidate = format!("{kind}-{}", self.next_seq);
            if self.index_of(&candidate).is_none() {
                return ItemId::new(candidate);
            }
        }
    }

    fn snapshot(&mut self) {
        self.undo.push(self.items.clone());
    }

    fn abandon_gesture(&mut self) {
        if let Some(id) = self.gesture.item() {
            tracing::debug!(
                target: "tessera.engine",
                id = %id,
                gesture = self.gesture.label(),
                "gesture abandoned"
            );
        }
        self.gesture = Gesture::Idle;
    }

    /// Apply `rect` to the tile at `index` if it is a valid position.
    fn apply_rect(&mut self, index: usize, rect: GridRect, resize: bool) -> bool {
        let item = &self.items[index];
        if item.rect() == rect {
            return true;
        }
        let placement = self.placement();
        if !placement.is_valid_position(rect, Some(item.id.as_str())) {
            let blockers: Vec<&str> = placement
                .collisions(rect, Some(item.id.as_str()))
                .map(ItemId::as_str)
                .collect();
            tracing::trace!(
                target: "tessera.engine",
                id = %item.id,
                rect = %rect,
                blockers = ?blockers,
                "invalid geometry rejected"
            );
            return false;
        }

        self.items[index].set_rect(rect);
        let id = self.items[index].id.clone();
        tracing::debug!(target: "tessera.engine", id = %id, rect = %rect, resize, "geometry applied");
        let change = if resize {
            LayoutChange::Resized { id, rect }
        } else {
            LayoutChange::Moved { id, rect }
        };
        self.changed(change);
        self.schedule_compaction();
        true
    }

    fn schedule_compaction(&mut self) {
        let now = self.clock.now();
        self.compaction.schedule(now);
    }

    fn run_compaction(&mut self) -> usize {
        let span = tracing::debug_span!(
            "grid.compact",
            items = self.items.len(),
            moved = tracing::field::Empty,
        )
        .entered();
        let columns = self.columns();
        let moved = compact_in_place(&mut self.items, columns);
        span.record("moved", moved as u64);
        drop(span);

        if moved > 0 {
            self.changed(LayoutChange::Compacted { moved });
        }
        moved
    }

    /// Re-project the canonical list onto the working columns if it does not
    /// fit them. Takes no undo snapshot.
    fn refit(&mut self) {
        let working = working_breakpoint(&self.table, &self.config, self.viewport_width);
        let Some(fitted) = fit_to(&self.items, &working, self.config.default_max_h) else {
            return;
        };
        self.items = fitted;
        self.layout_cache = None;
        tracing::debug!(
            target: "tessera.engine",
            breakpoint = %working.name,
            columns = working.columns,
            items = self.items.len(),
            "layout reflowed"
        );
        self.changed(LayoutChange::Reflowed {
            breakpoint: working.name,
        });
        self.schedule_compaction();
    }

    /// Bookkeeping after any canonical change: bump the revision, persist,
    /// notify.
    fn changed(&mut self, change: LayoutChange) {
        self.revision += 1;
        self.persist();
        for listener in &mut self.listeners {
            listener(&change);
        }
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.config.storage_key, &self.items) {
            tracing::warn!(
                target: "tessera.engine",
                key = %self.config.storage_key,
                error = %err,
                "failed to persist layout"
            );
        }
    }
}

/// The active breakpoint for `viewport` with its columns capped at the
/// configured count.
fn working_breakpoint(table: &BreakpointTable, config: &EngineConfig, viewport: Option<u32>) -> Breakpoint {
    let active = table.select(viewport.unwrap_or(u32::MAX));
    Breakpoint {
        columns: active.columns.min(config.columns),
        ..active.clone()
    }
}

/// `items` projected onto `working`, or `None` when they already fit it.
fn fit_to(items: &[GridItem], working: &Breakpoint, default_max_h: u16) -> Option<Vec<GridItem>> {
    let cap = working.max_h.unwrap_or(default_max_h);
    if audit(items, working.columns, cap).is_valid() {
        return None;
    }
    Some(from_layout(items, &project(items, working, cap)))
}

/// Place `items` one after another at the first free position, in order.
fn repack(items: Vec<GridItem>, columns: u16, scan_rows: u16) -> Vec<GridItem> {
    let mut placed: Vec<GridItem> = Vec::with_capacity(items.len());
    for mut item in items {
        let (x, y) = Placement::new(&placed, columns)
            .with_scan_limit(scan_rows)
            .next_position(item.w, item.h);
        item.x = x;
        item.y = y;
        placed.push(item);
    }
    placed
}

fn load_items(store: &dyn LayoutStore, config: &EngineConfig, defaults: Vec<GridItem>) -> Vec<GridItem> {
    let key = config.storage_key.as_str();
    match store.load(key) {
        Ok(Some(items)) => {
            let report = audit(&items, config.columns, config.default_max_h);
            if report.is_valid() {
                tracing::debug!(target: "tessera.engine", key = %key, items = items.len(), "persisted layout loaded");
                return items;
            }
            let issues: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
            tracing::warn!(
                target: "tessera.engine",
                key = %key,
                issues = %issues.join("; "),
                "persisted layout violates grid invariants, using defaults"
            );
        }
        Ok(None) => {
            tracing::debug!(target: "tessera.engine", key = %key, "no persisted layout, using defaults");
        }
        Err(err) => {
            tracing::warn!(
                target: "tessera.engine",
                key = %key,
                error = %err,
                "failed to load persisted layout, using defaults"
            );
        }
    }
    normalize_defaults(defaults, config)
}

/// Make caller-supplied defaults satisfy the invariants: drop duplicate ids,
/// clamp sizes, and repack when anything still collides or overflows.
fn normalize_defaults(mut items: Vec<GridItem>, config: &EngineConfig) -> Vec<GridItem> {
    let columns = config.columns;
    let cap = config.default_max_h;

    let before = items.len();
    let mut seen = FxHashSet::default();
    items.retain(|item| seen.insert(item.id.clone()));
    if items.len() != before {
        tracing::warn!(
            target: "tessera.engine",
            dropped = before - items.len(),
            "default layout has duplicate ids"
        );
    }

    for item in &mut items {
        let limits = item.limits(columns, cap);
        item.w = limits.clamp_w(item.w);
        item.h = limits.clamp_h(item.h);
    }

    if audit(&items, columns, cap).is_valid() {
        items
    } else {
        tracing::warn!(target: "tessera.engine", items = items.len(), "default layout invalid, repacking");
        repack(items, columns, config.scan_row_limit)
    }
}
