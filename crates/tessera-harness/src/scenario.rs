#![forbid(unsafe_code)]

//! Scripted scenarios replayed against a headless engine.
//!
//! A scenario is a JSON document naming a widget registry, an optional
//! default layout, and a list of operations. Replay drives a [`GridEngine`]
//! with a [`ManualClock`], so debounced compaction fires exactly when an
//! `advance` op says it should, and the resulting layout checksum is
//! reproducible across runs and machines.
//!
//! ```json
//! {
//!   "name": "drag-and-compact",
//!   "registry": { "clock": { "size": { "w": 3, "h": 2 } } },
//!   "ops": [
//!     { "op": "add", "kind": "clock" },
//!     { "op": "begin_drag", "id": "clock-1" },
//!     { "op": "move", "id": "clock-1", "x": 6, "y": 4 },
//!     { "op": "end_drag", "id": "clock-1" },
//!     { "op": "advance", "ms": 60 },
//!     { "op": "tick" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_layout::{
    EngineConfig, FileStore, GridEngine, GridItem, LayoutEntry, Layouts, ManualClock, MemoryStore,
    Payload, ResizeEdges, StaticRegistry,
};

use crate::error::{HarnessError, Result};
use crate::golden::layout_checksum;

/// A scripted session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub registry: StaticRegistry,
    /// Layout used when the store holds nothing valid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<GridItem>,
    /// Initial viewport width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<u32>,
    #[serde(default)]
    pub ops: Vec<Op>,
    /// Checksum the final layout must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,
}

impl Scenario {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(s)?;
        if scenario.name.trim().is_empty() {
            return Err(HarnessError::invalid_scenario("scenario name is empty"));
        }
        Ok(scenario)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Add {
        kind: String,
    },
    Remove {
        id: String,
    },
    BeginDrag {
        id: String,
    },
    Move {
        id: String,
        x: i32,
        y: i32,
    },
    EndDrag {
        id: String,
    },
    BeginResize {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        edges: Option<ResizeEdges>,
    },
    Resize {
        id: String,
        w: u16,
        h: u16,
    },
    ResizeDelta {
        id: String,
        dx: i32,
        dy: i32,
    },
    EndResize {
        id: String,
    },
    Cancel,
    Reset,
    Arrange,
    Undo,
    Viewport {
        width: u32,
    },
    /// Move the virtual clock forward.
    Advance {
        ms: u64,
    },
    Tick,
    Flush,
    Commit {
        breakpoint: String,
        entries: Vec<LayoutEntry>,
    },
    Payload {
        id: String,
        payload: Payload,
    },
}

impl Op {
    /// Short name used in step records and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::BeginDrag { .. } => "begin_drag",
            Self::Move { .. } => "move",
            Self::EndDrag { .. } => "end_drag",
            Self::BeginResize { .. } => "begin_resize",
            Self::Resize { .. } => "resize",
            Self::ResizeDelta { .. } => "resize_delta",
            Self::EndResize { .. } => "end_resize",
            Self::Cancel => "cancel",
            Self::Reset => "reset",
            Self::Arrange => "arrange",
            Self::Undo => "undo",
            Self::Viewport { .. } => "viewport",
            Self::Advance { .. } => "advance",
            Self::Tick => "tick",
            Self::Flush => "flush",
            Self::Commit { .. } => "commit",
            Self::Payload { .. } => "payload",
        }
    }
}

/// Apply `op` to `engine`. Returns whether the engine accepted it.
///
/// `add` is accepted when the kind is registered; `viewport` when the active
/// breakpoint changed; `tick` and `flush` when a compaction ran. Clock and
/// whole-layout operations always report `true`.
pub fn apply(engine: &mut GridEngine, clock: &ManualClock, op: &Op) -> bool {
    match op {
        Op::Add { kind } => engine.add(kind).is_some(),
        Op::Remove { id } => engine.remove(id),
        Op::BeginDrag { id } => engine.begin_drag(id),
        Op::Move { id, x, y } => engine.update_position(id, *x, *y),
        Op::EndDrag { id } => engine.end_drag(id),
        Op::BeginResize { id, edges } => match edges {
            Some(edges) => engine.begin_resize_from(id, *edges),
            None => engine.begin_resize(id),
        },
        Op::Resize { id, w, h } => engine.update_size(id, *w, *h),
        Op::ResizeDelta { id, dx, dy } => engine.update_resize_delta(id, *dx, *dy),
        Op::EndResize { id } => engine.end_resize(id),
        Op::Cancel => engine.cancel_gesture(),
        Op::Reset => {
            engine.reset_layout();
            true
        }
        Op::Arrange => {
            engine.auto_arrange();
            true
        }
        Op::Undo => engine.undo(),
        Op::Viewport { width } => engine.set_viewport_width(*width),
        Op::Advance { ms } => {
            clock.advance_ms(*ms);
            true
        }
        Op::Tick => engine.tick(),
        Op::Flush => engine.flush(),
        Op::Commit { breakpoint, entries } => engine.commit_layout(breakpoint, entries),
        Op::Payload { id, payload } => engine.update_payload(id, payload.clone()),
    }
}

/// Knobs for [`replay`] that do not belong in the scenario file.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub config: EngineConfig,
    /// Overrides the scenario's viewport.
    pub viewport: Option<u32>,
    /// Persist to this directory instead of memory.
    pub store_dir: Option<PathBuf>,
}

/// Outcome of one replayed op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub op: &'static str,
    pub applied: bool,
}

/// Final state after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub name: String,
    pub steps: Vec<StepRecord>,
    pub revision: u64,
    pub active_breakpoint: String,
    pub active_columns: u16,
    pub items: Vec<GridItem>,
    pub layouts: Layouts,
    pub checksum: String,
}

impl ReplayReport {
    /// Number of ops the engine accepted.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.steps.iter().filter(|step| step.applied).count()
    }

    /// Entries for the active breakpoint.
    #[must_use]
    pub fn active_layout(&self) -> &[LayoutEntry] {
        self.layouts
            .get(&self.active_breakpoint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Build an engine for `scenario` on a fresh virtual clock.
pub fn build_engine(scenario: &Scenario, options: &ReplayOptions, clock: &ManualClock) -> GridEngine {
    let mut builder = GridEngine::builder(options.config.clone())
        .registry(scenario.registry.clone())
        .clock(clock.clone())
        .defaults(scenario.items.clone());
    if let Some(width) = options.viewport.or(scenario.viewport) {
        builder = builder.viewport_width(width);
    }
    match &options.store_dir {
        Some(dir) => builder.store(FileStore::new(dir.clone())).build(),
        None => builder.store(MemoryStore::new()).build(),
    }
}

/// Run every op of `scenario`, settle pending compaction, and checksum the
/// result.
pub fn replay(scenario: &Scenario, options: &ReplayOptions) -> Result<ReplayReport> {
    let _span = tracing::info_span!(
        "harness.replay",
        scenario = %scenario.name,
        ops = scenario.ops.len()
    )
    .entered();

    let clock = ManualClock::new();
    let mut engine = build_engine(scenario, options, &clock);

    let mut steps = Vec::with_capacity(scenario.ops.len());
    for (index, op) in scenario.ops.iter().enumerate() {
        let applied = apply(&mut engine, &clock, op);
        tracing::debug!(target: "tessera.harness", index, op = op.label(), applied, "step");
        steps.push(StepRecord {
            index,
            op: op.label(),
            applied,
        });
    }
    engine.flush();

    let items = engine.items().to_vec();
    let layouts = engine.layouts().clone();
    let checksum = layout_checksum(&items, &layouts)?;
    let active = engine.active_breakpoint();

    let report = ReplayReport {
        name: scenario.name.clone(),
        active_breakpoint: active.name.clone(),
        active_columns: active.columns,
        steps,
        revision: engine.revision(),
        items,
        layouts,
        checksum,
    };
    tracing::info!(
        target: "tessera.harness",
        scenario = %report.name,
        applied = report.applied(),
        checksum = %report.checksum,
        "replay finished"
    );
    Ok(report)
}

/// Fail with [`HarnessError::ChecksumMismatch`] unless `report` matches.
pub fn verify(report: &ReplayReport, expected: &str) -> Result<()> {
    if report.checksum == expected {
        Ok(())
    } else {
        Err(HarnessError::ChecksumMismatch {
            expected: expected.to_owned(),
            actual: report.checksum.clone(),
        })
    }
}
