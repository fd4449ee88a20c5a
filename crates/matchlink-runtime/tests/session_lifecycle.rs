//! Integration tests for session lifecycle coordination
//!
//! Drives the public coordinator API against the scripted platform and
//! asserts the registry invariants: one session per name, guarded state
//! transitions, synchronous destroy, and exactly-once completion events.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use matchlink_core::{
    CompletionCode, EventKind, MatchType, OnlineError, OnlineEvent, PlatformError, PlayerId,
    RequestKind, RosterEntry, SessionError, SessionName, SessionSettings,
};
use matchlink_harness::{Behavior, ScriptedPlatform};
use matchlink_runtime::{
    CoordinatorConfig, OnlineCoordinator, OpDisposition, SessionState,
};

const TICK: Duration = Duration::from_millis(16);

fn coordinator() -> OnlineCoordinator<ScriptedPlatform> {
    OnlineCoordinator::new(ScriptedPlatform::new(), CoordinatorConfig::testing()).unwrap()
}

/// Records every event of one kind, for exactly-once assertions
fn record_events(
    coordinator: &mut OnlineCoordinator<ScriptedPlatform>,
    kind: EventKind,
) -> Rc<RefCell<Vec<OnlineEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    coordinator.register_callback(kind, move |event| {
        sink.borrow_mut().push(event.clone());
    });
    events
}

fn complete_next(coordinator: &mut OnlineCoordinator<ScriptedPlatform>, code: CompletionCode) {
    coordinator.platform_mut().complete_next(code);
    coordinator.tick(TICK);
}

#[test]
fn duplicate_create_returns_already_exists_with_one_record() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::SessionCreateComplete);

    assert_eq!(
        coordinator
            .create_session("Game", SessionSettings::default())
            .unwrap(),
        OpDisposition::Issued
    );
    // Second create before the first completes
    let second = coordinator.create_session("Game", SessionSettings::default());
    assert!(matches!(
        second,
        Err(OnlineError::Session(SessionError::AlreadyExists { .. }))
    ));
    assert_eq!(coordinator.registry().len(), 1);

    // The duplicate fired its failure event immediately; the original
    // still completes with its own event
    assert_eq!(events.borrow().len(), 1);
    assert!(!events.borrow()[0].is_success());

    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(events.borrow().len(), 2);
    assert!(events.borrow()[1].is_success());
    assert_eq!(
        coordinator.platform().request_count(RequestKind::SessionCreate),
        1
    );
}

#[test]
fn full_lifecycle_runs_to_ended_and_back() {
    let mut coordinator = coordinator();
    let name = SessionName::from("Game");

    coordinator
        .create_session("Game", SessionSettings::default())
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(coordinator.session_state(&name), Some(SessionState::Pending));

    coordinator
        .register_player(&name, PlayerId::new(10))
        .unwrap();
    coordinator
        .register_player(&name, PlayerId::new(20))
        .unwrap();

    coordinator.start_session("Game").unwrap();
    assert_eq!(
        coordinator.session_state(&name),
        Some(SessionState::Starting)
    );
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(
        coordinator.session_state(&name),
        Some(SessionState::InProgress)
    );

    coordinator.end_session("Game").unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(coordinator.session_state(&name), Some(SessionState::Ended));

    // An ended session may be started again without re-creating
    coordinator.start_session("Game").unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(
        coordinator.session_state(&name),
        Some(SessionState::InProgress)
    );
}

#[test]
fn start_while_in_progress_fails_without_state_change() {
    let mut coordinator = coordinator();
    let name = SessionName::from("Game");

    coordinator
        .create_session("Game", SessionSettings::default())
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    coordinator.start_session("Game").unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    let requests_before = coordinator.platform().request_count(RequestKind::SessionStart);
    let result = coordinator.start_session("Game");
    assert!(matches!(
        result,
        Err(OnlineError::Session(SessionError::WrongState {
            actual: "InProgress",
            ..
        }))
    ));
    assert_eq!(
        coordinator.session_state(&name),
        Some(SessionState::InProgress)
    );
    // No platform call was made for the rejected start
    assert_eq!(
        coordinator.platform().request_count(RequestKind::SessionStart),
        requests_before
    );
}

#[test]
fn failed_async_create_removes_the_record() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::SessionCreateComplete);

    coordinator
        .create_session("Game", SessionSettings::default())
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::ServiceError(3));

    assert_eq!(events.borrow().len(), 1);
    assert!(!events.borrow()[0].is_success());
    assert!(coordinator
        .session(&SessionName::from("Game"))
        .is_none());
}

#[test]
fn destroy_frees_the_name_synchronously() {
    let mut coordinator = coordinator();
    let name = SessionName::from("Game");

    coordinator
        .create_session("Game", SessionSettings::default())
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    coordinator.start_session("Game").unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(
        coordinator.session_state(&name),
        Some(SessionState::InProgress)
    );

    // Destroy from InProgress; the record is gone before the platform
    // teardown completes
    coordinator.destroy_session("Game").unwrap();
    assert!(coordinator.session(&name).is_none());
    assert!(coordinator.pending_tasks() > 0);

    // The name is immediately reusable
    assert_eq!(
        coordinator
            .create_session("Game", SessionSettings::default())
            .unwrap(),
        OpDisposition::Issued
    );
    assert_eq!(coordinator.registry().len(), 1);
}

#[test]
fn destroy_of_unknown_session_reports_not_found() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::SessionDestroyComplete);

    let result = coordinator.destroy_session("Nowhere");
    assert!(matches!(
        result,
        Err(OnlineError::Session(SessionError::NotFound { .. }))
    ));
    assert_eq!(events.borrow().len(), 1);
    assert!(!events.borrow()[0].is_success());
}

#[test]
fn modify_reverts_settings_when_platform_fails() {
    let mut coordinator = coordinator();
    let name = SessionName::from("Game");
    let original = SessionSettings::default();

    coordinator.create_session("Game", original.clone()).unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    let shrunk = SessionSettings {
        public_slots: 2,
        ..original.clone()
    };
    coordinator.modify_session("Game", shrunk.clone()).unwrap();
    // Optimistically applied while the round trip is in flight
    assert_eq!(coordinator.session(&name).unwrap().settings, shrunk);

    complete_next(&mut coordinator, CompletionCode::ServiceError(9));
    // Reconciled back to the pre-modify settings
    assert_eq!(coordinator.session(&name).unwrap().settings, original);
}

#[test]
fn arbitration_adopts_roster_and_shrinks_slots() {
    let mut coordinator = coordinator();
    let name = SessionName::from("Ranked");
    coordinator.platform_mut().canned_mut().roster = vec![
        RosterEntry {
            machine_id: 1,
            player: PlayerId::new(10),
            trust_factor: 0.9,
        },
        RosterEntry {
            machine_id: 2,
            player: PlayerId::new(20),
            trust_factor: 0.8,
        },
        RosterEntry {
            machine_id: 3,
            player: PlayerId::new(30),
            trust_factor: 0.5,
        },
    ];

    let settings = SessionSettings {
        public_slots: 8,
        uses_arbitration: true,
        match_type: MatchType::Ranked,
        ..SessionSettings::default()
    };
    coordinator.create_session("Ranked", settings).unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    coordinator.register_arbitration("Ranked").unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    let session = coordinator.session(&name).unwrap();
    assert_eq!(session.arbitration_registrants().len(), 3);
    assert_eq!(session.settings.public_slots, 3);
    assert_eq!(session.registrants().len(), 3);
}

#[test]
fn arbitration_requires_the_session_flag() {
    let mut coordinator = coordinator();
    coordinator
        .create_session("Casual", SessionSettings::default())
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    let result = coordinator.register_arbitration("Casual");
    assert!(matches!(
        result,
        Err(OnlineError::Session(
            SessionError::ArbitrationNotEnabled { .. }
        ))
    ));
}

#[test]
fn orphaned_create_fires_failure_and_removes_record() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::SessionCreateComplete);

    coordinator
        .create_session("Game", SessionSettings::default())
        .unwrap();
    // The testing ceiling is one second; never complete the platform op
    for _ in 0..12 {
        coordinator.tick(Duration::from_millis(100));
    }

    assert_eq!(events.borrow().len(), 1);
    match &events.borrow()[0] {
        OnlineEvent::SessionCreateComplete(outcome) => {
            assert!(!outcome.success);
            assert!(matches!(
                outcome.error,
                Some(OnlineError::Platform(PlatformError::Orphaned { .. }))
            ));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(coordinator
        .session(&SessionName::from("Game"))
        .is_none());
    assert_eq!(coordinator.pending_tasks(), 0);
}

#[test]
fn immediate_platform_completion_is_handled_at_issue_time() {
    let mut platform = ScriptedPlatform::new();
    platform.set_behavior(
        RequestKind::SessionCreate,
        Behavior::Immediate(CompletionCode::Success),
    );
    let mut coordinator =
        OnlineCoordinator::new(platform, CoordinatorConfig::testing()).unwrap();
    let events = record_events(&mut coordinator, EventKind::SessionCreateComplete);

    assert_eq!(
        coordinator
            .create_session("Game", SessionSettings::default())
            .unwrap(),
        OpDisposition::CompletedImmediately
    );
    assert_eq!(events.borrow().len(), 1);
    assert!(events.borrow()[0].is_success());
    assert_eq!(coordinator.pending_tasks(), 0);
}

#[test]
fn join_adopts_the_remote_descriptor_settings() {
    let mut coordinator = coordinator();
    let name = SessionName::from("Game");
    let descriptor = matchlink_core::SessionDescriptor {
        host: PlayerId::new(77),
        settings: SessionSettings {
            public_slots: 4,
            ..SessionSettings::default()
        },
        open_public_slots: 3,
        open_private_slots: 0,
    };

    coordinator.join_session("Game", descriptor.clone()).unwrap();
    // The local record carries the host's settings while the join is in
    // flight, and joining the same name again is a collision
    assert_eq!(
        coordinator.session(&name).unwrap().settings.public_slots,
        4
    );
    assert!(matches!(
        coordinator.join_session("Game", descriptor),
        Err(OnlineError::Session(SessionError::AlreadyExists { .. }))
    ));

    complete_next(&mut coordinator, CompletionCode::Success);
    let session = coordinator.session(&name).unwrap();
    assert_eq!(session.state(), SessionState::Pending);
    assert!(session.platform_ref.is_some());
}

#[test]
fn failed_join_leaves_no_record_behind() {
    let mut coordinator = coordinator();
    let descriptor = matchlink_core::SessionDescriptor {
        host: PlayerId::new(77),
        settings: SessionSettings::default(),
        open_public_slots: 1,
        open_private_slots: 0,
    };

    coordinator.join_session("Game", descriptor).unwrap();
    complete_next(&mut coordinator, CompletionCode::NotFound);

    assert!(coordinator
        .session(&SessionName::from("Game"))
        .is_none());
}

#[test]
fn successful_modify_keeps_the_new_settings() {
    let mut coordinator = coordinator();
    let name = SessionName::from("Game");
    let events = record_events(&mut coordinator, EventKind::SessionModifyComplete);

    coordinator
        .create_session("Game", SessionSettings::default())
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    let resized = SessionSettings {
        public_slots: 12,
        ..SessionSettings::default()
    };
    coordinator.modify_session("Game", resized.clone()).unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    assert_eq!(events.borrow().len(), 1);
    assert!(events.borrow()[0].is_success());
    assert_eq!(coordinator.session(&name).unwrap().settings, resized);
}

#[test]
fn search_reports_results_through_its_event() {
    let mut coordinator = coordinator();
    coordinator.platform_mut().canned_mut().search_results = vec![
        matchlink_core::SessionDescriptor {
            host: PlayerId::new(99),
            settings: SessionSettings::default(),
            open_public_slots: 4,
            open_private_slots: 0,
        },
    ];
    let events = record_events(&mut coordinator, EventKind::SearchComplete);

    coordinator
        .find_sessions(MatchType::Standard, 10)
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    assert_eq!(events.borrow().len(), 1);
    match &events.borrow()[0] {
        OnlineEvent::SearchComplete(outcome) => {
            assert!(outcome.success);
            assert_eq!(outcome.results.len(), 1);
            assert_eq!(outcome.results[0].host, PlayerId::new(99));
        }
        other => panic!("unexpected event {other:?}"),
    };
}
