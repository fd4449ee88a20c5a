//! Integration tests for the read-through player-data cache
//!
//! Covers the serialization-per-key guarantees, version-mismatch fallback,
//! sign-out invalidation, the two-scope profile read, and paged content
//! enumeration.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use matchlink_core::player_data::{
    setting_ids, ContentItem, ProfileSetting, SettingValue, StorageBlob, STORAGE_DATA_VERSION,
};
use matchlink_core::{
    CacheStatus, CompletionCode, EntityKind, EntityPayload, EventKind, OnlineError, OnlineEvent,
    PlatformError, PlatformRequest, PlayerStats, ProfileScope, ProfileSettings, RequestKind,
    StatValue, UserIndex,
};
use matchlink_harness::ScriptedPlatform;
use matchlink_runtime::{CoordinatorConfig, OnlineCoordinator, OpDisposition};

const TICK: Duration = Duration::from_millis(16);
const USER: UserIndex = UserIndex::new(0);

fn coordinator() -> OnlineCoordinator<ScriptedPlatform> {
    OnlineCoordinator::new(ScriptedPlatform::new(), CoordinatorConfig::testing()).unwrap()
}

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
fn duplicate_read_issues_a_single_platform_request() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::StorageReadComplete);

    assert_eq!(
        coordinator.read_storage(USER).unwrap(),
        OpDisposition::Issued
    );
    // Second read while the first is in flight
    assert_eq!(
        coordinator.read_storage(USER).unwrap(),
        OpDisposition::AlreadyInProgress
    );
    assert_eq!(
        coordinator.platform().request_count(RequestKind::StorageRead),
        1
    );

    complete_next(&mut coordinator, CompletionCode::Success);
    // One in-flight operation, one completion event
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(coordinator.cache_status(USER, EntityKind::Storage), CacheStatus::Done);
}

#[test]
fn done_entry_is_served_without_a_round_trip() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::StorageReadComplete);

    coordinator.read_storage(USER).unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(events.borrow().len(), 1);

    // Cached read completes immediately with its own event and no request
    assert_eq!(
        coordinator.read_storage(USER).unwrap(),
        OpDisposition::CompletedImmediately
    );
    assert_eq!(events.borrow().len(), 2);
    assert_eq!(
        coordinator.platform().request_count(RequestKind::StorageRead),
        1
    );
}

#[test]
fn version_mismatch_resets_to_defaults_and_serves_from_cache() {
    let mut coordinator = coordinator();
    // Platform holds a blob written by an older layout
    coordinator.platform_mut().canned_mut().storage = Some(StorageBlob {
        version: STORAGE_DATA_VERSION + 1,
        data: vec![1, 2, 3],
    });
    let events = record_events(&mut coordinator, EventKind::StorageReadComplete);

    coordinator.read_storage(USER).unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    // Incompatible data was discarded, defaults accepted as Done
    assert_eq!(events.borrow().len(), 1);
    assert!(events.borrow()[0].is_success());
    assert_eq!(coordinator.cache_status(USER, EntityKind::Storage), CacheStatus::Done);
    assert_eq!(
        coordinator.cached_payload(USER, EntityKind::Storage),
        Some(&EntityPayload::Storage(StorageBlob::empty()))
    );

    // A later read is a cache hit, not a refetch
    coordinator.read_storage(USER).unwrap();
    assert_eq!(
        coordinator.platform().request_count(RequestKind::StorageRead),
        1
    );
}

#[test]
fn sign_out_invalidation_forces_a_refetch() {
    let mut coordinator = coordinator();

    coordinator.read_storage(USER).unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(coordinator.cache_status(USER, EntityKind::Storage), CacheStatus::Done);

    coordinator.notify_sign_in_changed(USER, None);
    assert_eq!(
        coordinator.cache_status(USER, EntityKind::Storage),
        CacheStatus::NotStarted
    );

    // Next read goes to the platform again
    assert_eq!(
        coordinator.read_storage(USER).unwrap(),
        OpDisposition::Issued
    );
    assert_eq!(
        coordinator.platform().request_count(RequestKind::StorageRead),
        2
    );
}

#[test]
fn profile_read_falls_through_to_platform_for_uncovered_ids() {
    let mut coordinator = coordinator();

    // The title defaults blob covers vibration only; the platform store
    // has the preferred color
    let mut title = ProfileSettings::empty();
    title.upsert(ProfileSetting {
        id: setting_ids::CONTROLLER_VIBRATION,
        value: SettingValue::Int32(0),
    });
    let mut remaining = ProfileSettings::empty();
    remaining.upsert(ProfileSetting {
        id: setting_ids::PREFERRED_COLOR,
        value: SettingValue::Int32(5),
    });
    coordinator.platform_mut().canned_mut().title_profile_blob =
        Some(title.to_blob().unwrap());
    coordinator.platform_mut().canned_mut().platform_profile_blob =
        Some(remaining.to_blob().unwrap());

    let events = record_events(&mut coordinator, EventKind::ProfileReadComplete);
    coordinator
        .read_profile(
            USER,
            vec![setting_ids::CONTROLLER_VIBRATION, setting_ids::PREFERRED_COLOR],
        )
        .unwrap();

    // First round trip: title defaults
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(events.borrow().len(), 0);
    // Second round trip: remaining ids from the platform store
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(events.borrow().len(), 1);
    assert!(events.borrow()[0].is_success());

    let scopes: Vec<ProfileScope> = coordinator
        .platform()
        .issued_requests()
        .iter()
        .filter_map(|request| match request {
            PlatformRequest::ProfileRead { scope, .. } => Some(*scope),
            _ => None,
        })
        .collect();
    assert_eq!(
        scopes,
        vec![ProfileScope::TitleDefaults, ProfileScope::Remaining]
    );

    match coordinator.cached_payload(USER, EntityKind::Profile) {
        Some(EntityPayload::Profile(profile)) => {
            assert_eq!(
                profile.get(setting_ids::CONTROLLER_VIBRATION),
                Some(&SettingValue::Int32(0))
            );
            assert_eq!(
                profile.get(setting_ids::PREFERRED_COLOR),
                Some(&SettingValue::Int32(5))
            );
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn profile_read_skips_second_step_when_defaults_cover_everything() {
    let mut coordinator = coordinator();
    coordinator.platform_mut().canned_mut().title_profile_blob =
        Some(ProfileSettings::defaults().to_blob().unwrap());

    coordinator
        .read_profile(USER, vec![setting_ids::CONTROLLER_VIBRATION])
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    assert_eq!(
        coordinator.platform().request_count(RequestKind::ProfileRead),
        1
    );
    assert_eq!(coordinator.cache_status(USER, EntityKind::Profile), CacheStatus::Done);
}

#[test]
fn failed_profile_read_leaves_usable_defaults() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::ProfileReadComplete);

    coordinator
        .read_profile(USER, vec![setting_ids::CONTROLLER_VIBRATION])
        .unwrap();
    complete_next(&mut coordinator, CompletionCode::ServiceError(2));

    assert_eq!(events.borrow().len(), 1);
    assert!(!events.borrow()[0].is_success());
    // The cache still holds a usable payload
    assert_eq!(
        coordinator.cache_status(USER, EntityKind::Profile),
        CacheStatus::Failed
    );
    assert!(matches!(
        coordinator.cached_payload(USER, EntityKind::Profile),
        Some(EntityPayload::Profile(_))
    ));

    // A failed entry refetches on the next read
    assert_eq!(
        coordinator
            .read_profile(USER, vec![setting_ids::CONTROLLER_VIBRATION])
            .unwrap(),
        OpDisposition::Issued
    );
}

#[test]
fn content_enumeration_walks_every_page() {
    let mut coordinator = coordinator();
    coordinator.platform_mut().canned_mut().content_pages = vec![
        vec![ContentItem {
            id: 1,
            name: "map pack 1".into(),
            size_bytes: 1024,
        }],
        vec![ContentItem {
            id: 2,
            name: "map pack 2".into(),
            size_bytes: 2048,
        }],
        vec![ContentItem {
            id: 3,
            name: "skin pack".into(),
            size_bytes: 512,
        }],
    ];
    let events = record_events(&mut coordinator, EventKind::ContentListComplete);

    coordinator.enumerate_content(USER).unwrap();
    // One completion per page; the task re-arms itself between pages
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(events.borrow().len(), 0);
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(events.borrow().len(), 0);
    complete_next(&mut coordinator, CompletionCode::Success);
    assert_eq!(events.borrow().len(), 1);

    assert_eq!(
        coordinator
            .platform()
            .request_count(RequestKind::ContentEnumerate),
        3
    );
    match coordinator.cached_payload(USER, EntityKind::ContentList) {
        Some(EntityPayload::Content(items)) => {
            assert_eq!(items.len(), 3);
            assert_eq!(items[2].name, "skin pack");
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn write_while_read_in_flight_is_rejected() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::ProfileWriteComplete);

    coordinator
        .read_profile(USER, vec![setting_ids::CONTROLLER_VIBRATION])
        .unwrap();
    let result = coordinator.write_profile(USER, ProfileSettings::defaults());

    assert!(matches!(
        result,
        Err(OnlineError::Cache(matchlink_core::CacheError::ReadInFlight { .. }))
    ));
    assert_eq!(events.borrow().len(), 1);
    assert!(!events.borrow()[0].is_success());
    // Only the read reached the platform
    assert_eq!(
        coordinator.platform().request_count(RequestKind::ProfileWrite),
        0
    );
}

#[test]
fn successful_write_updates_the_cached_copy() {
    let mut coordinator = coordinator();
    let stats = PlayerStats {
        view_id: 2,
        values: vec![StatValue {
            column_id: 1,
            value: 9000,
        }],
    };

    coordinator.write_stats(USER, stats.clone()).unwrap();
    assert_eq!(coordinator.cache_status(USER, EntityKind::Stats), CacheStatus::Writing);
    complete_next(&mut coordinator, CompletionCode::Success);

    assert_eq!(coordinator.cache_status(USER, EntityKind::Stats), CacheStatus::Done);
    assert_eq!(
        coordinator.cached_payload(USER, EntityKind::Stats),
        Some(&EntityPayload::Stats(stats))
    );
    // A read after the write is a cache hit
    assert_eq!(
        coordinator.read_stats(USER, 2).unwrap(),
        OpDisposition::CompletedImmediately
    );
    assert_eq!(coordinator.platform().request_count(RequestKind::StatsRead), 0);
}

#[test]
fn orphaned_read_fires_failure_with_defaults() {
    let mut coordinator = coordinator();
    let events = record_events(&mut coordinator, EventKind::ProfileReadComplete);

    coordinator
        .read_profile(USER, vec![setting_ids::CONTROLLER_VIBRATION])
        .unwrap();
    // Never complete; push elapsed time past the one-second testing ceiling
    for _ in 0..12 {
        coordinator.tick(Duration::from_millis(100));
    }

    assert_eq!(events.borrow().len(), 1);
    match &events.borrow()[0] {
        OnlineEvent::ProfileReadComplete(outcome) => {
            assert!(!outcome.success);
            assert!(matches!(
                outcome.error,
                Some(OnlineError::Platform(PlatformError::Orphaned { .. }))
            ));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        coordinator.cache_status(USER, EntityKind::Profile),
        CacheStatus::Failed
    );
}

#[test]
fn achievements_read_caches_the_list() {
    let mut coordinator = coordinator();
    coordinator.platform_mut().canned_mut().achievements = vec![matchlink_core::Achievement {
        id: 1,
        title: "First Blood".into(),
        unlocked: true,
    }];

    coordinator.read_achievements(USER).unwrap();
    complete_next(&mut coordinator, CompletionCode::Success);

    match coordinator.cached_payload(USER, EntityKind::Achievements) {
        Some(EntityPayload::Achievements(list)) => {
            assert_eq!(list.len(), 1);
            assert!(list[0].unlocked);
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn drain_finishes_outstanding_writes() {
    let platform = ScriptedPlatform::auto(3);
    let mut coordinator =
        OnlineCoordinator::new(platform, CoordinatorConfig::testing()).unwrap();
    let events = record_events(&mut coordinator, EventKind::ProfileWriteComplete);

    coordinator
        .write_profile(USER, ProfileSettings::defaults())
        .unwrap();
    assert_eq!(coordinator.pending_tasks(), 1);

    coordinator.drain_and_shutdown();

    assert_eq!(coordinator.pending_tasks(), 0);
    assert_eq!(events.borrow().len(), 1);
    assert!(events.borrow()[0].is_success());
    assert_eq!(coordinator.cache_status(USER, EntityKind::Profile), CacheStatus::Done);
}
