#![forbid(unsafe_code)]

//! Seeded random op storms with invariant checks after every step.
//!
//! The generator only knows about ids the engine currently holds, so most
//! ops target live tiles; a small share name ids that do not exist to make
//! sure those are rejected without side effects. Any violation is reported
//! with the seed and step so the run can be replayed from a dumped scenario.

use tessera_layout::{
    DefaultSize, EngineConfig, Gesture, GridEngine, ManualClock, MemoryStore, ResizeEdges,
    StaticRegistry, WidgetDefaults, audit_entries, from_layout,
};

use crate::error::{HarnessError, Result};
use crate::golden::layout_checksum;
use crate::scenario::{Op, Scenario, apply};

/// Deterministic LCG; the same seed always yields the same storm.
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        self.0
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform-ish value in `0..n`; `0` when `n == 0`.
    pub fn below(&mut self, n: u32) -> u32 {
        if n == 0 { 0 } else { self.next_u32() % n }
    }

    /// Value in `lo..=hi`.
    pub fn range_i32(&mut self, lo: i32, hi: i32) -> i32 {
        let span = u32::try_from(hi - lo + 1).unwrap_or(1);
        lo + i32::try_from(self.below(span)).unwrap_or(0)
    }

    pub fn chance(&mut self, percent: u32) -> bool {
        self.below(100) < percent
    }
}

/// Widget kinds the storm adds: a mix of free, bounded and wide tiles.
#[must_use]
pub fn storm_registry() -> StaticRegistry {
    StaticRegistry::new()
        .with("clock", WidgetDefaults::new(DefaultSize::new(2, 2)))
        .with("note", WidgetDefaults::new(DefaultSize::new(3, 1).with_min(2, 1)))
        .with(
            "chart",
            WidgetDefaults::new(DefaultSize::new(6, 3).with_min(4, 2).with_max(8, 5)),
        )
        .with("banner", WidgetDefaults::new(DefaultSize::new(12, 1)))
        .with(
            "gauge",
            WidgetDefaults::new(DefaultSize::new(2, 3).with_min(1, 2).with_max(3, 4)),
        )
}

const VIEWPORTS: [u32; 6] = [320, 500, 800, 1000, 1280, 1920];
const EDGES: [ResizeEdges; 6] = [
    ResizeEdges::SOUTH_EAST,
    ResizeEdges::SOUTH_WEST,
    ResizeEdges::NORTH_EAST,
    ResizeEdges::NORTH_WEST,
    ResizeEdges::EAST,
    ResizeEdges::SOUTH,
];

/// Pick the next op given the engine's current state.
pub fn random_op(rng: &mut Lcg, engine: &GridEngine, kinds: &[String]) -> Op {
    let ids: Vec<String> = engine
        .items()
        .iter()
        .map(|item| item.id.as_str().to_owned())
        .collect();
    let pick_id = |rng: &mut Lcg| -> String {
        if ids.is_empty() || rng.chance(5) {
            "ghost-0".to_owned()
        } else {
            ids[rng.below(ids.len() as u32) as usize].clone()
        }
    };
    // Continue the active gesture most of the time.
    let active = engine.gesture().item().map(|id| id.as_str().to_owned());
    if let Some(id) = active.filter(|_| rng.chance(70)) {
        let dragging = matches!(engine.gesture(), Gesture::Dragging { .. });
        return match (dragging, rng.below(4)) {
            (true, 0) => Op::EndDrag { id },
            (true, _) => Op::Move {
                id,
                x: rng.range_i32(-2, 14),
                y: rng.range_i32(-2, 20),
            },
            (false, 0) => Op::EndResize { id },
            (false, 1) => Op::Resize {
                id,
                w: rng.range_i32(0, 13) as u16,
                h: rng.range_i32(0, 11) as u16,
            },
            (false, _) => Op::ResizeDelta {
                id,
                dx: rng.range_i32(-4, 4),
                dy: rng.range_i32(-4, 4),
            },
        };
    }

    match rng.below(100) {
        0..=19 => Op::Add {
            kind: if kinds.is_empty() || rng.chance(5) {
                "unknown".to_owned()
            } else {
                kinds[rng.below(kinds.len() as u32) as usize].clone()
            },
        },
        20..=27 => Op::Remove { id: pick_id(rng) },
        28..=44 => Op::BeginDrag { id: pick_id(rng) },
        45..=59 => Op::BeginResize {
            id: pick_id(rng),
            edges: Some(EDGES[rng.below(EDGES.len() as u32) as usize]),
        },
        60..=65 => Op::Cancel,
        66..=73 => Op::Undo,
        74..=76 => Op::Reset,
        77..=79 => Op::Arrange,
        80..=84 => Op::Viewport {
            width: VIEWPORTS[rng.below(VIEWPORTS.len() as u32) as usize],
        },
        85..=92 => Op::Advance {
            ms: u64::from(rng.below(80)),
        },
        93..=97 => Op::Tick,
        _ => Op::Flush,
    }
}

/// Check the canonical list at the working columns, its agreement with the
/// active projection, and every breakpoint projection.
pub fn check_invariants(engine: &mut GridEngine) -> std::result::Result<(), String> {
    let report = engine.audit();
    if let Some(issue) = report.issues.first() {
        return Err(format!("canonical: {issue}"));
    }
    let items = engine.items().to_vec();
    let active = engine.active_breakpoint().name.clone();
    if from_layout(&items, engine.active_layout()) != items {
        return Err(format!("{active}: projection differs from the canonical list"));
    }
    let tiers: Vec<(String, u16)> = engine
        .breakpoints()
        .iter()
        .map(|bp| (bp.name.clone(), bp.columns))
        .collect();
    let item_count = engine.items().len();
    for (name, columns) in tiers {
        let entries = engine.layout_for(&name).unwrap_or(&[]);
        if entries.len() != item_count {
            return Err(format!(
                "{name}: projection has {} entries for {item_count} items",
                entries.len()
            ));
        }
        if let Some(issue) = audit_entries(entries, columns).issues.first() {
            return Err(format!("{name}: {issue}"));
        }
    }
    Ok(())
}

/// Summary of a storm run.
#[derive(Debug, Clone)]
pub struct StormReport {
    pub seed: u64,
    pub steps: usize,
    pub applied: usize,
    pub items: usize,
    pub checksum: String,
    /// The generated ops, replayable as a scenario.
    pub ops: Vec<Op>,
}

impl StormReport {
    /// The run as a replayable scenario.
    #[must_use]
    pub fn to_scenario(&self) -> Scenario {
        Scenario {
            name: format!("storm-{}", self.seed),
            registry: storm_registry(),
            ops: self.ops.clone(),
            expect: Some(self.checksum.clone()),
            ..Scenario::default()
        }
    }
}

/// Run `steps` random ops from `seed`, checking invariants after each one.
pub fn run_storm(seed: u64, steps: usize, config: &EngineConfig) -> Result<StormReport> {
    let _span = tracing::info_span!("harness.storm", seed, steps).entered();

    let registry = storm_registry();
    let kinds: Vec<String> = registry.kinds().map(str::to_owned).collect();
    let clock = ManualClock::new();
    let mut engine = GridEngine::builder(config.clone())
        .registry(registry)
        .clock(clock.clone())
        .store(MemoryStore::new())
        .build();

    let mut rng = Lcg::new(seed);
    let mut ops = Vec::with_capacity(steps);
    let mut applied = 0;
    for step in 0..steps {
        let op = random_op(&mut rng, &engine, &kinds);
        if apply(&mut engine, &clock, &op) {
            applied += 1;
        }
        ops.push(op);
        if let Err(detail) = check_invariants(&mut engine) {
            tracing::error!(target: "tessera.harness", seed, step, detail = %detail, "invariant violated");
            return Err(HarnessError::InvariantViolation { seed, step, detail });
        }
    }
    engine.flush();
    if let Err(detail) = check_invariants(&mut engine) {
        return Err(HarnessError::InvariantViolation {
            seed,
            step: steps,
            detail,
        });
    }

    let items = engine.items().to_vec();
    let checksum = layout_checksum(&items, engine.layouts())?;
    tracing::info!(target: "tessera.harness", seed, steps, applied, items = items.len(), "storm finished");
    Ok(StormReport {
        seed,
        steps,
        applied,
        items: items.len(),
        checksum,
        ops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{ReplayOptions, replay};

    #[test]
    fn lcg_is_deterministic() {
        let mut a = Lcg::new(42);
        let mut b = Lcg::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_ne!(Lcg::new(1).next_u64(), Lcg::new(2).next_u64());
    }

    #[test]
    fn range_stays_inside_bounds() {
        let mut rng = Lcg::new(7);
        for _ in 0..1000 {
            let v = rng.range_i32(-2, 14);
            assert!((-2..=14).contains(&v));
        }
        assert_eq!(rng.below(0), 0);
    }

    #[test]
    fn storm_holds_invariants_for_seed_corpus() {
        let config = EngineConfig::default();
        for seed in [0, 1, 7, 42, 1234, 0xDEAD_BEEF] {
            let report = run_storm(seed, 300, &config).unwrap();
            assert_eq!(report.ops.len(), 300);
            assert!(report.applied > 0);
        }
    }

    #[test]
    fn same_seed_same_checksum() {
        let config = EngineConfig::default();
        let a = run_storm(99, 200, &config).unwrap();
        let b = run_storm(99, 200, &config).unwrap();
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.ops, b.ops);
    }

    #[test]
    fn dumped_storm_replays_to_the_same_checksum() {
        let report = run_storm(5, 250, &EngineConfig::default()).unwrap();
        let scenario = report.to_scenario();
        let replayed = replay(&scenario, &ReplayOptions::default()).unwrap();
        assert_eq!(Some(replayed.checksum), scenario.expect);
    }
}
