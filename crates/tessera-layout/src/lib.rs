#![forbid(unsafe_code)]

//! Dashboard grid layout engine.
//!
//! # Role in Tessera
//! `tessera-layout` places, resizes, collision-checks, compacts and
//! responsively re-projects widget tiles on a bounded integer grid, with
//! undo. Rendering, pixel-to-cell translation and widget content belong to
//! the host; storage and the widget catalogue are reached through the
//! [`LayoutStore`] and [`WidgetRegistry`] traits.
//!
//! # Layers
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`item`] | Canonical tile model |
//! | [`placement`] | Validity checks, auto-placement, invariant audit |
//! | [`compaction`] | Vertical gravity |
//! | [`breakpoint`] | Responsive tiers and per-tier projection |
//! | [`undo`] | Bounded before-image stack |
//! | [`schedule`] | Debounced deferred task |
//! | [`store`] | Persistence gateway |
//! | [`registry`] | Widget defaults lookup |
//! | [`config`] | Engine tunables |
//! | [`engine`] | The mutation engine tying it all together |
//!
//! # Example
//!
//! ```
//! use tessera_layout::{DefaultSize, EngineConfig, GridEngine, StaticRegistry, WidgetDefaults};
//!
//! let registry = StaticRegistry::new()
//!     .with("clock", WidgetDefaults::new(DefaultSize::new(3, 2)));
//! let mut engine = GridEngine::builder(EngineConfig::default())
//!     .registry(registry)
//!     .build();
//!
//! let id = engine.add("clock").unwrap();
//! assert!(engine.begin_drag(id.as_str()));
//! assert!(engine.update_position(id.as_str(), 4, 0));
//! assert!(engine.end_drag(id.as_str()));
//! engine.flush();
//! assert_eq!(engine.item(id.as_str()).unwrap().x, 4);
//! ```

pub mod breakpoint;
pub mod compaction;
pub mod config;
pub mod engine;
pub mod item;
pub mod placement;
pub mod registry;
pub mod schedule;
pub mod store;
pub mod undo;

pub use breakpoint::{
    Breakpoint, BreakpointTable, LayoutEntry, Layouts, audit_entries, from_layout, project,
    standard_breakpoints, to_layouts,
};
pub use compaction::{compact, compact_in_place};
pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineBuilder, Gesture, GridEngine, LayoutChange};
pub use item::{GridItem, ItemId, Payload};
pub use placement::{DEFAULT_SCAN_ROW_LIMIT, LayoutIssue, LayoutReport, Placement, audit};
pub use registry::{DefaultSize, StaticRegistry, WidgetDefaults, WidgetRegistry};
pub use schedule::DeferredTask;
pub use store::{FileStore, LayoutStore, MemoryStore, STORE_FORMAT_VERSION, StoreError, StoredLayout};
pub use undo::{DEFAULT_UNDO_CAPACITY, UndoStack};

pub use tessera_core::{Clock, GridRect, ManualClock, ResizeEdges, SizeLimits, SystemClock};
