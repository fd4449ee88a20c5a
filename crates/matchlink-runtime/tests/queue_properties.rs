//! Property tests for task-queue liveness
//!
//! Whatever order platform operations complete in, and however tick deltas
//! are sliced, every issued operation reports exactly once: either with its
//! platform result or as an orphan once the elapsed ceiling is crossed.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;

use matchlink_core::{CompletionCode, EventKind, MatchType, OnlineEvent};
use matchlink_harness::ScriptedPlatform;
use matchlink_runtime::{CoordinatorConfig, OnlineCoordinator};

const TICK: Duration = Duration::from_millis(16);

fn searching_coordinator(
    count: usize,
) -> (
    OnlineCoordinator<ScriptedPlatform>,
    Rc<RefCell<Vec<OnlineEvent>>>,
) {
    let mut coordinator =
        OnlineCoordinator::new(ScriptedPlatform::new(), CoordinatorConfig::testing()).unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    coordinator.register_callback(EventKind::SearchComplete, move |event| {
        sink.borrow_mut().push(event.clone());
    });
    for _ in 0..count {
        coordinator.find_sessions(MatchType::Standard, 8).unwrap();
    }
    (coordinator, events)
}

proptest! {
    /// Completing tasks in any order yields exactly one event per task
    #[test]
    fn every_task_fires_exactly_once(
        count in 1usize..12,
        order in prop::collection::vec(0usize..64, 0..24),
        failures in prop::collection::vec(any::<bool>(), 0..24),
    ) {
        let (mut coordinator, events) = searching_coordinator(count);

        // Release tasks in a data-driven order, one per tick
        for (pick, fail) in order.iter().zip(failures.iter().chain(std::iter::repeat(&false))) {
            let handles = coordinator.platform_mut().unresolved_handles();
            if handles.is_empty() {
                break;
            }
            let handle = handles[pick % handles.len()];
            let code = if *fail {
                CompletionCode::ServiceError(1)
            } else {
                CompletionCode::Success
            };
            coordinator.platform_mut().complete(handle, code, None);
            coordinator.tick(TICK);
        }
        // Release anything left, then settle
        coordinator.platform_mut().complete_all(CompletionCode::Success);
        coordinator.tick(TICK);

        prop_assert_eq!(coordinator.pending_tasks(), 0);
        prop_assert_eq!(events.borrow().len(), count);
    }

    /// However the elapsed time is sliced into ticks, a task that never
    /// completes fires exactly one failure once past the ceiling
    #[test]
    fn orphan_fires_once_regardless_of_tick_slicing(
        slices in prop::collection::vec(1u64..400, 1..40),
    ) {
        let (mut coordinator, events) = searching_coordinator(1);

        let mut total = Duration::ZERO;
        for millis in slices {
            let delta = Duration::from_millis(millis);
            total += delta;
            coordinator.tick(delta);
        }
        // Drive past the one-second testing ceiling if the slices fell short
        while total <= Duration::from_secs(1) {
            coordinator.tick(Duration::from_millis(200));
            total += Duration::from_millis(200);
        }

        prop_assert_eq!(coordinator.pending_tasks(), 0);
        prop_assert_eq!(events.borrow().len(), 1);
        prop_assert!(!events.borrow()[0].is_success());
    }

    /// A queue with no orphan ceiling keeps pending tasks alive indefinitely
    #[test]
    fn unexpired_pending_tasks_survive(ticks in 1usize..64) {
        let mut config = CoordinatorConfig::testing();
        config.max_task_time = None;
        let mut coordinator =
            OnlineCoordinator::new(ScriptedPlatform::new(), config).unwrap();
        coordinator.find_sessions(MatchType::Standard, 8).unwrap();

        for _ in 0..ticks {
            coordinator.tick(Duration::from_secs(10));
        }

        prop_assert_eq!(coordinator.pending_tasks(), 1);
    }
}
