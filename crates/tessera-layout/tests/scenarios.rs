//! End-to-end engine scenarios: placement, compaction, resize clamping,
//! undo, debounced compaction, persistence fallback and instrumentation.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tessera_layout::{
    Breakpoint, DefaultSize, EngineConfig, FileStore, GridEngine, GridItem, GridRect, LayoutChange,
    LayoutStore, ManualClock, MemoryStore, StaticRegistry, WidgetDefaults, from_layout,
};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

fn registry() -> StaticRegistry {
    StaticRegistry::new()
        .with("tile", WidgetDefaults::new(DefaultSize::new(3, 1)))
        .with(
            "chart",
            WidgetDefaults::new(DefaultSize::new(2, 2).with_max(4, 6)),
        )
}

fn item(id: &str, x: u16, y: u16, w: u16, h: u16) -> GridItem {
    GridItem::new(id, "tile", GridRect::new(x, y, w, h))
}

fn engine_with(defaults: Vec<GridItem>, clock: &ManualClock) -> GridEngine {
    GridEngine::builder(EngineConfig::default())
        .registry(registry())
        .clock(clock.clone())
        .defaults(defaults)
        .build()
}

fn rect_of(engine: &GridEngine, id: &str) -> GridRect {
    engine.item(id).expect("item exists").rect()
}

// ---------------------------------------------------------------------------
// Placement and compaction
// ---------------------------------------------------------------------------

#[test]
fn add_to_empty_grid_places_at_origin() {
    let clock = ManualClock::new();
    let mut engine = engine_with(Vec::new(), &clock);
    let id = engine.add("tile").unwrap();
    assert_eq!(rect_of(&engine, id.as_str()), GridRect::new(0, 0, 3, 1));
}

#[test]
fn add_uses_next_free_column() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 3, 1)], &clock);
    let id = engine.add("tile").unwrap();
    assert_eq!(rect_of(&engine, id.as_str()), GridRect::new(3, 0, 3, 1));
}

#[test]
fn add_wraps_when_row_is_full() {
    let clock = ManualClock::new();
    let mut engine = engine_with(
        vec![
            item("a", 0, 0, 3, 1),
            item("b", 3, 0, 3, 1),
            item("c", 6, 0, 3, 1),
            item("d", 9, 0, 3, 1),
        ],
        &clock,
    );
    let id = engine.add("tile").unwrap();
    assert_eq!(rect_of(&engine, id.as_str()), GridRect::new(0, 1, 3, 1));
}

#[test]
fn deferred_compaction_lifts_floating_item() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 2, 2, 1)], &clock);

    assert!(engine.begin_drag("a"));
    assert!(engine.end_drag("a"));
    assert_eq!(rect_of(&engine, "a"), GridRect::new(0, 2, 2, 1));

    clock.advance_ms(50);
    assert!(engine.tick());
    assert_eq!(rect_of(&engine, "a"), GridRect::new(0, 0, 2, 1));
}

// ---------------------------------------------------------------------------
// Resize
// ---------------------------------------------------------------------------

#[test]
fn resize_beyond_max_width_is_clamped() {
    let clock = ManualClock::new();
    let mut engine = engine_with(Vec::new(), &clock);
    let id = engine.add("chart").unwrap();

    assert!(engine.begin_resize(id.as_str()));
    assert!(engine.update_size(id.as_str(), 6, 2));
    assert!(engine.end_resize(id.as_str()));
    assert_eq!(engine.item(id.as_str()).unwrap().w, 4);
}

#[test]
fn colliding_resize_keeps_last_valid_size() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 2, 1), item("b", 4, 0, 2, 1)], &clock);

    engine.begin_resize("a");
    assert!(engine.update_size("a", 4, 1));
    assert!(!engine.update_size("a", 6, 1));
    engine.end_resize("a");
    assert_eq!(rect_of(&engine, "a"), GridRect::new(0, 0, 4, 1));
}

// ---------------------------------------------------------------------------
// Drag
// ---------------------------------------------------------------------------

#[test]
fn invalid_drag_updates_are_sticky() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 3, 1), item("b", 6, 0, 3, 1)], &clock);

    engine.begin_drag("a");
    assert!(engine.update_position("a", 2, 0));
    assert!(!engine.update_position("a", 5, 0));
    assert!(!engine.update_position("a", 10, 0));
    assert_eq!(rect_of(&engine, "a"), GridRect::new(2, 0, 3, 1));
    assert!(engine.update_position("a", 9, 0));
    engine.end_drag("a");
    assert_eq!(rect_of(&engine, "a"), GridRect::new(9, 0, 3, 1));
}

// ---------------------------------------------------------------------------
// Undo
// ---------------------------------------------------------------------------

#[test]
fn undo_on_empty_stack_is_noop() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 3, 1)], &clock);
    let before = engine.items().to_vec();
    assert!(!engine.undo());
    assert_eq!(engine.items(), before.as_slice());
}

#[test]
fn undo_after_drag_restores_pre_drag_list() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 3, 1), item("b", 3, 0, 3, 1)], &clock);
    let before = engine.items().to_vec();

    engine.begin_drag("a");
    engine.update_position("a", 0, 3);
    engine.update_position("a", 6, 1);
    engine.update_position("a", 8, 4);
    engine.end_drag("a");

    assert!(engine.undo());
    assert_eq!(engine.items(), before.as_slice());
}

#[test]
fn undo_cancels_pending_compaction() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 3, 1)], &clock);
    engine.begin_drag("a");
    engine.update_position("a", 0, 4);
    engine.end_drag("a");
    assert!(engine.pending_compaction());

    assert!(engine.undo());
    assert!(!engine.pending_compaction());
    clock.advance_ms(100);
    assert!(!engine.tick());
}

#[test]
fn reset_and_arrange_are_undoable() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 6, 3, 3, 1), item("b", 0, 5, 3, 1)], &clock);
    let before = engine.items().to_vec();

    engine.reset_layout();
    assert_eq!(rect_of(&engine, "a"), GridRect::new(0, 0, 3, 1));
    assert_eq!(rect_of(&engine, "b"), GridRect::new(3, 0, 3, 1));
    assert!(engine.undo());
    assert_eq!(engine.items(), before.as_slice());

    engine.auto_arrange();
    assert_eq!(rect_of(&engine, "a"), GridRect::new(0, 0, 3, 1));
    assert!(engine.undo());
    assert_eq!(engine.items(), before.as_slice());
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

#[test]
fn burst_of_mutations_compacts_once() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 6, 2, 1), item("b", 8, 8, 2, 1)], &clock);
    let compactions = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&compactions);
    engine.subscribe(move |change| {
        if matches!(change, LayoutChange::Compacted { .. }) {
            *sink.borrow_mut() += 1;
        }
    });

    engine.begin_drag("a");
    for x in 0..5 {
        engine.update_position("a", x, 6);
        clock.advance_ms(20);
        assert!(!engine.tick(), "compaction fired mid-burst at x={x}");
    }
    engine.end_drag("a");
    clock.advance_ms(49);
    assert!(!engine.tick());
    clock.advance(Duration::from_millis(1));
    assert!(engine.tick());
    assert!(!engine.tick());

    assert_eq!(*compactions.borrow(), 1);
    assert_eq!(rect_of(&engine, "a").y, 0);
    assert_eq!(rect_of(&engine, "b").y, 0);
}

#[test]
fn flush_runs_pending_compaction_immediately() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 3, 2, 1)], &clock);
    engine.begin_drag("a");
    engine.end_drag("a");
    assert!(engine.flush());
    assert_eq!(rect_of(&engine, "a").y, 0);
    assert!(!engine.flush());
}

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

#[test]
fn authoring_breakpoint_round_trips() {
    let clock = ManualClock::new();
    let mut engine = engine_with(
        vec![item("a", 0, 0, 3, 1), item("b", 3, 0, 9, 2), item("c", 0, 2, 6, 3)],
        &clock,
    );
    let items = engine.items().to_vec();
    let lg = engine.layout_for("lg").unwrap().to_vec();
    assert_eq!(from_layout(&items, &lg), items);
}

#[test]
fn narrow_breakpoint_projection_is_bounded() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 6, 1), item("b", 6, 0, 6, 1)], &clock);
    assert!(engine.set_viewport_width(500));
    let entries = engine.active_layout().to_vec();
    assert_eq!(entries[0].rect(), GridRect::new(0, 0, 4, 1));
    assert_eq!(entries[1].rect(), GridRect::new(0, 1, 4, 1));
    assert!(entries.iter().all(|e| e.bounded && e.x + e.w <= 4));
}

fn assert_fits_active(engine: &GridEngine, context: &str) {
    let columns = engine.active_columns();
    for item in engine.items() {
        assert!(item.x + item.w <= columns, "{context}: {} exceeds {columns} columns", item.id);
    }
    let report = engine.audit();
    assert!(report.is_valid(), "{context}: {:?}", report.issues);
}

fn narrow_engine(defaults: Vec<GridItem>, clock: &ManualClock) -> GridEngine {
    GridEngine::builder(EngineConfig::default())
        .registry(registry())
        .clock(clock.clone())
        .viewport_width(500)
        .defaults(defaults)
        .build()
}

#[test]
fn mutations_at_narrow_breakpoint_stay_within_its_columns() {
    let clock = ManualClock::new();
    let mut engine = narrow_engine(Vec::new(), &clock);
    assert_eq!(engine.active_breakpoint().name, "xs");

    let a = engine.add("tile").unwrap();
    let b = engine.add("tile").unwrap();
    assert_eq!(rect_of(&engine, a.as_str()), GridRect::new(0, 0, 3, 1));
    assert_eq!(rect_of(&engine, b.as_str()), GridRect::new(0, 1, 3, 1));
    assert_fits_active(&engine, "add");

    engine.begin_drag(b.as_str());
    assert!(!engine.update_position(b.as_str(), 8, 1));
    assert!(engine.update_position(b.as_str(), 1, 1));
    engine.end_drag(b.as_str());
    assert_fits_active(&engine, "drag");

    engine.begin_resize(a.as_str());
    assert!(engine.update_size(a.as_str(), 9, 1));
    assert_eq!(rect_of(&engine, a.as_str()).w, 4);
    engine.end_resize(a.as_str());
    assert_fits_active(&engine, "resize");

    engine.auto_arrange();
    assert_eq!(rect_of(&engine, a.as_str()), GridRect::new(0, 0, 4, 1));
    assert_eq!(rect_of(&engine, b.as_str()), GridRect::new(0, 1, 3, 1));
    assert_fits_active(&engine, "arrange");

    engine.reset_layout();
    assert_fits_active(&engine, "reset");
}

#[test]
fn viewport_switch_reflows_canonical_list() {
    let clock = ManualClock::new();
    let mut engine = engine_with(
        vec![item("a", 0, 0, 3, 1), item("b", 3, 0, 3, 1), item("c", 9, 0, 3, 1)],
        &clock,
    );
    let lg = engine.items().to_vec();
    engine.begin_drag("a");
    engine.end_drag("a");

    assert!(engine.set_viewport_width(500));
    assert_fits_active(&engine, "xs");
    assert_eq!(rect_of(&engine, "c"), GridRect::new(1, 2, 3, 1));
    let xs = engine.active_layout().to_vec();
    assert_eq!(from_layout(engine.items(), &xs), engine.items());

    assert!(engine.set_viewport_width(300));
    assert_eq!(engine.active_columns(), 2);
    assert_fits_active(&engine, "xxs");

    // The snapshot was taken at lg; restoring it refits it to two columns.
    assert!(engine.undo());
    assert_fits_active(&engine, "undo");
    assert_ne!(engine.items(), lg.as_slice());
}

#[test]
fn paused_drag_holds_compaction() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 3, 1)], &clock);

    engine.begin_drag("a");
    assert!(engine.update_position("a", 0, 5));
    clock.advance_ms(60);
    assert!(!engine.tick());
    assert_eq!(rect_of(&engine, "a"), GridRect::new(0, 5, 3, 1));
    assert!(engine.pending_compaction());

    engine.end_drag("a");
    clock.advance_ms(60);
    assert!(engine.tick());
    assert_eq!(rect_of(&engine, "a"), GridRect::new(0, 0, 3, 1));
}

#[test]
fn commit_layout_accepts_valid_edit_and_rejects_overlap() {
    let clock = ManualClock::new();
    let mut engine = engine_with(vec![item("a", 0, 0, 3, 1), item("b", 3, 0, 3, 1)], &clock);

    let mut entries = engine.layout_for("sm").unwrap().to_vec();
    entries[1].x = 0;
    entries[1].y = 1;
    assert!(engine.commit_layout("sm", &entries));
    assert_eq!(rect_of(&engine, "b"), GridRect::new(0, 1, 3, 1));

    let mut clash = engine.layout_for("sm").unwrap().to_vec();
    clash[1].y = 0;
    assert!(!engine.commit_layout("sm", &clash));
    assert_eq!(rect_of(&engine, "b"), GridRect::new(0, 1, 3, 1));

    assert!(!engine.commit_layout("nope", &entries));
}

#[test]
fn custom_breakpoint_table_falls_back_to_fewest_columns() {
    let config = EngineConfig {
        breakpoints: vec![Breakpoint::new("desk", 1024, 12), Breakpoint::new("tab", 600, 6)],
        ..EngineConfig::default()
    };
    let mut engine = GridEngine::builder(config).build();
    engine.set_viewport_width(300);
    assert_eq!(engine.active_breakpoint().name, "tab");
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn mutations_are_persisted_and_reloaded() {
    let store = MemoryStore::new();
    let clock = ManualClock::new();
    let mut engine = GridEngine::builder(EngineConfig::default())
        .registry(registry())
        .store(store.clone())
        .clock(clock.clone())
        .build();
    let id = engine.add("tile").unwrap();
    engine.add("chart");

    let reloaded = GridEngine::builder(EngineConfig::default())
        .store(store.clone())
        .build();
    assert_eq!(reloaded.items(), engine.items());
    assert_eq!(reloaded.item(id.as_str()).unwrap().kind, "tile");
}

#[test]
fn corrupt_persisted_state_falls_back_to_defaults() {
    let store = MemoryStore::new();
    store.insert_raw("dashboard-layout", "{ definitely not json");
    let defaults = vec![item("a", 0, 0, 3, 1)];
    let engine = GridEngine::builder(EngineConfig::default())
        .store(store)
        .defaults(defaults.clone())
        .build();
    assert_eq!(engine.items(), defaults.as_slice());
}

#[test]
fn overlapping_persisted_state_falls_back_to_defaults() {
    let mut store = MemoryStore::new();
    store
        .save("dashboard-layout", &[item("a", 0, 0, 3, 2), item("b", 1, 1, 3, 1)])
        .unwrap();
    let defaults = vec![item("z", 0, 0, 2, 2)];
    let engine = GridEngine::builder(EngineConfig::default())
        .store(store)
        .defaults(defaults.clone())
        .build();
    assert_eq!(engine.items(), defaults.as_slice());
}

#[test]
fn file_store_survives_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    {
        let mut engine = GridEngine::builder(EngineConfig::default())
            .registry(registry())
            .store(FileStore::new(dir.path()))
            .clock(clock.clone())
            .build();
        engine.add("tile");
        engine.add("tile");
        engine.flush();
    }
    let engine = GridEngine::builder(EngineConfig::default())
        .store(FileStore::new(dir.path()))
        .build();
    assert_eq!(engine.items().len(), 2);
}

#[test]
fn payload_updates_persist_without_undo_snapshot() {
    let store = MemoryStore::new();
    let mut engine = GridEngine::builder(EngineConfig::default())
        .store(store.clone())
        .defaults(vec![item("a", 0, 0, 3, 1)])
        .build();
    let mut payload = tessera_layout::Payload::new();
    payload.insert("title".into(), serde_json::json!("Inbox"));

    assert!(engine.update_payload("a", payload));
    assert_eq!(engine.undo_depth(), 0);
    assert!(store.raw("dashboard-layout").unwrap().contains("Inbox"));
    assert!(!engine.update_payload("ghost", tessera_layout::Payload::new()));
}

// ---------------------------------------------------------------------------
// Instrumentation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EngineTraceState {
    compact_spans: usize,
    moved: Vec<u64>,
    messages: Vec<String>,
}

struct EngineTraceCapture {
    state: Arc<Mutex<EngineTraceState>>,
}

struct MessageVisitor(Option<String>);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

struct MovedVisitor(Option<u64>);

impl tracing::field::Visit for MovedVisitor {
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        if field.name() == "moved" {
            self.0 = Some(value);
        }
    }

    fn record_debug(&mut self, _field: &tracing::field::Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> Layer<S> for EngineTraceCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::Id,
        _ctx: Context<'_, S>,
    ) {
        if attrs.metadata().name() == "grid.compact" {
            self.state.lock().expect("trace state lock").compact_spans += 1;
        }
    }

    fn on_record(
        &self,
        _id: &tracing::Id,
        values: &tracing::span::Record<'_>,
        _ctx: Context<'_, S>,
    ) {
        let mut visitor = MovedVisitor(None);
        values.record(&mut visitor);
        if let Some(moved) = visitor.0 {
            self.state.lock().expect("trace state lock").moved.push(moved);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != "tessera.engine" {
            return;
        }
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.state.lock().expect("trace state lock").messages.push(message);
        }
    }
}

#[test]
fn engine_emits_compaction_span_and_events() {
    let state = Arc::new(Mutex::new(EngineTraceState::default()));
    let subscriber = tracing_subscriber::registry().with(EngineTraceCapture {
        state: Arc::clone(&state),
    });

    tracing::subscriber::with_default(subscriber, || {
        let clock = ManualClock::new();
        let mut engine = engine_with(vec![item("a", 0, 3, 2, 1)], &clock);
        engine.begin_drag("a");
        engine.update_position("a", 5, 3);
        engine.end_drag("a");
        engine.flush();
    });

    let state = state.lock().expect("trace state lock");
    assert_eq!(state.compact_spans, 1);
    assert_eq!(state.moved, vec![1]);
    assert!(state.messages.iter().any(|m| m == "drag started"));
    assert!(state.messages.iter().any(|m| m == "geometry applied"));
}

#[test]
fn persistence_failures_are_logged_not_raised() {
    struct FailingStore;

    impl LayoutStore for FailingStore {
        fn load(&self, _key: &str) -> Result<Option<Vec<GridItem>>, tessera_layout::StoreError> {
            Ok(None)
        }

        fn save(&mut self, key: &str, _items: &[GridItem]) -> Result<(), tessera_layout::StoreError> {
            Err(tessera_layout::StoreError::InvalidKey(key.to_owned()))
        }
    }

    let state = Arc::new(Mutex::new(EngineTraceState::default()));
    let subscriber = tracing_subscriber::registry().with(EngineTraceCapture {
        state: Arc::clone(&state),
    });

    tracing::subscriber::with_default(subscriber, || {
        let mut engine = GridEngine::builder(EngineConfig::default())
            .registry(registry())
            .store(FailingStore)
            .build();
        assert!(engine.add("tile").is_some());
        assert_eq!(engine.items().len(), 1);
    });

    let state = state.lock().expect("trace state lock");
    assert!(state.messages.iter().any(|m| m == "failed to persist layout"));
}
