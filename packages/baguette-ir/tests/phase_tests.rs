//! Phase events, finalizer rounds and event propagation

mod common;

use baguette_ir::pipeline::{BuildContext, BuildingPhase, PipelineError, BUILDING_PHASE};
use baguette_ir::shared::events::{Event, EventBus, EventClass, EVENT};
use baguette_ir::shared::models::{EdgeKind, KeyData, VertexData, VertexKind};
use baguette_ir::{BuildConfig, Builder, Toolchain};
use common::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_finalizers_run_in_reservation_order_and_see_previous_rounds() {
    let toolchain = Toolchain::new();
    let seen: Arc<Mutex<Vec<(&'static str, usize)>>> = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    let first = toolchain.add_finalizer("first", move |ctx: &mut BuildContext| {
        let keys = ctx.members(VertexKind::Key).len();
        log.lock().push(("first", keys));
        let host = ctx.host()?;
        let key = ctx.add(VertexData::Key(KeyData {
            path: "HKEY_USERS".into(),
            folded: "hkey_users".into(),
        }))?;
        ctx.link(EdgeKind::HasHive, host, key)?;
        Ok(())
    });
    let log = Arc::clone(&seen);
    let second = toolchain.add_finalizer("second", move |ctx: &mut BuildContext| {
        log.lock().push(("second", ctx.members(VertexKind::Key).len()));
        Ok(())
    });
    assert_eq!((first, second), (0, 1));

    Builder::new(Arc::new(toolchain), BuildConfig::default())
        .build(&file_open_close_trace())
        .unwrap();
    assert_eq!(*seen.lock(), vec![("first", 0), ("second", 1)]);
}

#[test]
fn test_phases_are_announced_in_order() {
    let toolchain = Toolchain::new();
    let phases: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&phases);
    toolchain.bus().add_callback(&BUILDING_PHASE, move |_, event| {
        if let Some(phase) = event.downcast_ref::<BuildingPhase>() {
            log.lock().push(format!("{}:{}", phase.major, phase.minor));
        }
        Ok(())
    });
    toolchain.add_finalizer("noop", |_| Ok(()));

    Builder::new(Arc::new(toolchain), BuildConfig::default())
        .build(&file_open_close_trace())
        .unwrap();
    assert_eq!(
        *phases.lock(),
        vec![
            "Initialization:0",
            "Network Discovery:0",
            "Input Parsing:0",
            "Graph Building:0",
            "Call Ordering:0",
            "Call Interpretation:0",
            "Process Attribution:0",
            "Call Skip-Linking:0",
            "Finalizer:0",
        ]
    );
}

#[test]
fn test_failing_finalizer_aborts_build() {
    let toolchain = Toolchain::new();
    toolchain.add_finalizer("broken", |_| {
        Err(PipelineError::structural("Finalizer", "tree is inconsistent"))
    });
    let err = Builder::new(Arc::new(toolchain), BuildConfig::default())
        .build(&file_open_close_trace())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Callbacks(_)));
    assert!(err.to_string().contains("tree is inconsistent"));
}

#[test]
fn test_concurrent_builds_are_isolated() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let baguette = Builder::standard().build(&behavior_trace()).unwrap();
                (baguette.build_id, baguette.stats().unwrap().total_vertices)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let ids: std::collections::HashSet<_> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids.len(), 4);
    assert!(results.windows(2).all(|w| w[0].1 == w[1].1));
}

// ============================================================
// Event propagation
// ============================================================

static SIGNAL: EventClass = EventClass::derive("Signal", &EVENT);
static ALARM: EventClass = EventClass::derive("Alarm", &SIGNAL);
static NOTICE: EventClass = EventClass::derive("Notice", &SIGNAL);

#[derive(Debug)]
struct Alarm;

impl Event for Alarm {
    fn class(&self) -> &'static EventClass {
        &ALARM
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn park_until_waiting(bus: &EventBus, class: &'static EventClass, count: usize) {
    for _ in 0..500 {
        if bus.waiter_count(class) == count {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("waiters never parked on {}", class.name());
}

#[test]
fn test_subclass_wakes_superclass_waiters_only() {
    let bus: Arc<EventBus> = Arc::new(EventBus::new());

    let waiter = |class: &'static EventClass| {
        let bus = Arc::clone(&bus);
        thread::spawn(move || bus.wait_timeout(class, Duration::from_secs(5)).is_some())
    };
    let on_event = waiter(&EVENT);
    let on_signal = waiter(&SIGNAL);
    let on_alarm = waiter(&ALARM);
    park_until_waiting(&bus, &EVENT, 1);
    park_until_waiting(&bus, &SIGNAL, 1);
    park_until_waiting(&bus, &ALARM, 1);

    let bus_for_notice = Arc::clone(&bus);
    let on_notice = thread::spawn(move || {
        bus_for_notice
            .wait_timeout(&NOTICE, Duration::from_millis(200))
            .is_some()
    });
    park_until_waiting(&bus, &NOTICE, 1);

    assert!(bus.throw_event(&mut (), Alarm).unwrap());
    assert!(on_event.join().unwrap());
    assert!(on_signal.join().unwrap());
    assert!(on_alarm.join().unwrap());
    assert!(!on_notice.join().unwrap());
}
