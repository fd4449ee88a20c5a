//! The online coordinator
//!
//! [`OnlineCoordinator`] is the single owner of the task queue, the session
//! registry, and the player-data cache. Gameplay code calls a public
//! operation; the coordinator validates preconditions, issues the platform
//! request, and tracks the pending work in the queue. The host drives
//! everything with one [`tick`](OnlineCoordinator::tick) per frame.
//!
//! Every fallible operation reports through exactly one completion event -
//! synchronous precondition failures, immediate platform rejections, and
//! async completions all use the same observer path, so callers never
//! special-case how an operation failed.
//!
//! All mutation happens on the thread that calls `tick`; there is no
//! concurrency inside the coordinator and no locking.

use core::time::Duration;

use tracing::{debug, info};

use matchlink_core::player_data::{
    ContentItem, SettingId, StorageBlob, PROFILE_DATA_VERSION, STORAGE_DATA_VERSION,
};
use matchlink_core::{
    CacheStatus, CompletionCode, EntityKind, EntityPayload, EventDispatcher, EventKind,
    IssueOutcome, MatchType, OnlineError, OnlineEvent, OnlineResult, PlatformRequest,
    PlatformResponse, PlatformService, PlayerId, PlayerStats, ProfileScope, ProfileSettings,
    SearchOutcome, SessionDescriptor, SessionName, SessionOutcome, SessionSettings, UserOutcome,
    UserIndex,
};

use crate::cache::{PlayerDataCache, ReadDisposition};
use crate::config::CoordinatorConfig;
use crate::queue::{FinishedTask, TaskQueue, TaskVerdict};
use crate::sessions::{Session, SessionRegistry, SessionState};
use crate::task::{ProfileReadStep, TaskKind};

// ----------------------------------------------------------------------------
// Operation Dispositions
// ----------------------------------------------------------------------------

/// How a public operation left the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpDisposition {
    /// A task is in flight; the completion event fires from a later tick
    Issued,
    /// The platform finished synchronously; the event has already fired
    CompletedImmediately,
    /// An equivalent operation was already in flight; its single completion
    /// event serves this caller too
    AlreadyInProgress,
}

// ----------------------------------------------------------------------------
// Task Outcomes
// ----------------------------------------------------------------------------

/// Terminal outcome of one platform operation
enum TaskOutcome {
    Completed {
        code: CompletionCode,
        response: Option<PlatformResponse>,
        /// Whether the platform rejected the request at issue time
        immediate: bool,
    },
    Orphaned {
        elapsed: Duration,
    },
}

impl TaskOutcome {
    fn is_end_of_list(&self) -> bool {
        matches!(
            self,
            TaskOutcome::Completed {
                code: CompletionCode::EndOfList,
                ..
            }
        )
    }

    /// Success yields the response; failure yields the mapped error
    fn into_result(self) -> Result<Option<PlatformResponse>, OnlineError> {
        match self {
            TaskOutcome::Completed { code, response, .. } if code.is_success() => Ok(response),
            TaskOutcome::Completed {
                code,
                immediate: true,
                ..
            } => Err(OnlineError::rejected(code)),
            TaskOutcome::Completed { code, .. } => Err(OnlineError::failed_async(code)),
            TaskOutcome::Orphaned { elapsed } => Err(OnlineError::orphaned(elapsed)),
        }
    }
}

/// Result of applying one task outcome: finished, or re-armed with a
/// follow-on request (multi-step operations)
enum Step {
    Done,
    Continue {
        kind: TaskKind,
        request: PlatformRequest,
    },
}

// ----------------------------------------------------------------------------
// Online Coordinator
// ----------------------------------------------------------------------------

/// Single-threaded coordinator for asynchronous platform operations
pub struct OnlineCoordinator<P: PlatformService> {
    platform: P,
    config: CoordinatorConfig,
    queue: TaskQueue,
    registry: SessionRegistry,
    cache: PlayerDataCache,
    dispatcher: EventDispatcher,
}

impl<P: PlatformService> OnlineCoordinator<P> {
    /// Create a coordinator over a platform service
    pub fn new(platform: P, config: CoordinatorConfig) -> OnlineResult<Self> {
        config
            .validate()
            .map_err(|reason| OnlineError::config_error(reason))?;
        Ok(Self {
            queue: TaskQueue::new(config.max_task_time),
            platform,
            config,
            registry: SessionRegistry::new(),
            cache: PlayerDataCache::new(),
            dispatcher: EventDispatcher::new(),
        })
    }

    // ------------------------------------------------------------------
    // Observers and accessors
    // ------------------------------------------------------------------

    /// Register an observer for an event kind
    pub fn register_callback(
        &mut self,
        kind: EventKind,
        callback: impl FnMut(&OnlineEvent) + 'static,
    ) {
        self.dispatcher.register(kind, callback);
    }

    /// The session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Look up a session by name
    pub fn session(&self, name: &SessionName) -> Option<&Session> {
        self.registry.get(name)
    }

    /// Lifecycle state of a session, if registered
    pub fn session_state(&self, name: &SessionName) -> Option<SessionState> {
        self.registry.get(name).map(|session| session.state())
    }

    /// Cache status for a user's entity
    pub fn cache_status(&self, user: UserIndex, kind: EntityKind) -> CacheStatus {
        self.cache.status(user, kind)
    }

    /// Cached payload for a user's entity, if any data is held
    pub fn cached_payload(&self, user: UserIndex, kind: EntityKind) -> Option<&EntityPayload> {
        self.cache.payload(user, kind)
    }

    /// Number of tasks currently in flight
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    /// The platform service (primarily for tests and diagnostics)
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable access to the platform service
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    // ------------------------------------------------------------------
    // Session operations
    // ------------------------------------------------------------------

    /// Create a new named session. Fails if the name is taken; a failed
    /// platform create removes the record so no half-created session
    /// persists.
    pub fn create_session(
        &mut self,
        name: impl Into<SessionName>,
        settings: SessionSettings,
    ) -> OnlineResult<OpDisposition> {
        let name = name.into();
        if let Err(reason) = settings.validate() {
            let error = OnlineError::config_error(reason);
            self.fire_session(OnlineEvent::SessionCreateComplete, name, Err(error.clone()));
            return Err(error);
        }
        if let Err(error) = self.registry.insert_pending(name.clone(), settings.clone()) {
            self.fire_session(OnlineEvent::SessionCreateComplete, name, Err(error.clone()));
            return Err(error);
        }
        self.issue(
            PlatformRequest::SessionCreate {
                session: name.clone(),
                settings,
            },
            TaskKind::SessionCreate { session: name },
        )
    }

    /// Join a remote session described by a search result
    pub fn join_session(
        &mut self,
        name: impl Into<SessionName>,
        descriptor: SessionDescriptor,
    ) -> OnlineResult<OpDisposition> {
        let name = name.into();
        if let Err(error) = self
            .registry
            .insert_pending(name.clone(), descriptor.settings.clone())
        {
            self.fire_session(OnlineEvent::SessionJoinComplete, name, Err(error.clone()));
            return Err(error);
        }
        self.issue(
            PlatformRequest::SessionJoin {
                session: name.clone(),
                descriptor,
            },
            TaskKind::SessionJoin { session: name },
        )
    }

    /// Start gameplay for a session in `Pending` or `Ended` state
    pub fn start_session(&mut self, name: impl Into<SessionName>) -> OnlineResult<OpDisposition> {
        let name = name.into();
        let begin = self
            .registry
            .require_mut(&name)
            .and_then(|session| session.begin_start());
        if let Err(error) = begin {
            self.fire_session(OnlineEvent::SessionStartComplete, name, Err(error.clone()));
            return Err(error);
        }
        self.issue(
            PlatformRequest::SessionStart {
                session: name.clone(),
            },
            TaskKind::SessionStart { session: name },
        )
    }

    /// End gameplay for an `InProgress` session
    pub fn end_session(&mut self, name: impl Into<SessionName>) -> OnlineResult<OpDisposition> {
        let name = name.into();
        let begin = self
            .registry
            .require_mut(&name)
            .and_then(|session| session.begin_end());
        if let Err(error) = begin {
            self.fire_session(OnlineEvent::SessionEndComplete, name, Err(error.clone()));
            return Err(error);
        }
        self.issue(
            PlatformRequest::SessionEnd {
                session: name.clone(),
            },
            TaskKind::SessionEnd { session: name },
        )
    }

    /// Tear down a session. The local record is removed synchronously
    /// regardless of state, so the name is immediately reusable; the
    /// platform-side teardown completes (or fails) asynchronously.
    pub fn destroy_session(&mut self, name: impl Into<SessionName>) -> OnlineResult<OpDisposition> {
        let name = name.into();
        if self.registry.remove(&name).is_none() {
            let error = OnlineError::session_not_found(name.clone());
            self.fire_session(
                OnlineEvent::SessionDestroyComplete,
                name,
                Err(error.clone()),
            );
            return Err(error);
        }
        self.issue(
            PlatformRequest::SessionDelete {
                session: name.clone(),
            },
            TaskKind::SessionDestroy { session: name },
        )
    }

    /// Change a session's capacity or advertising flags. Settings are
    /// applied optimistically and restored if the platform round trip fails.
    pub fn modify_session(
        &mut self,
        name: impl Into<SessionName>,
        settings: SessionSettings,
    ) -> OnlineResult<OpDisposition> {
        let name = name.into();
        if let Err(reason) = settings.validate() {
            let error = OnlineError::config_error(reason);
            self.fire_session(OnlineEvent::SessionModifyComplete, name, Err(error.clone()));
            return Err(error);
        }
        let previous = match self.registry.require_mut(&name) {
            Ok(session) => {
                let previous = session.settings.clone();
                session.settings = settings.clone();
                previous
            }
            Err(error) => {
                self.fire_session(OnlineEvent::SessionModifyComplete, name, Err(error.clone()));
                return Err(error);
            }
        };
        self.issue(
            PlatformRequest::SessionModify {
                session: name.clone(),
                settings,
            },
            TaskKind::SessionModify {
                session: name,
                previous,
            },
        )
    }

    /// Run consensus registration for an arbitrated session. On completion
    /// the arbitration roster is adopted and, when configured, public slots
    /// shrink to the final registrant count.
    pub fn register_arbitration(
        &mut self,
        name: impl Into<SessionName>,
    ) -> OnlineResult<OpDisposition> {
        let name = name.into();
        let check = self.registry.require_mut(&name).and_then(|session| {
            if session.settings.uses_arbitration {
                Ok(())
            } else {
                Err(matchlink_core::SessionError::ArbitrationNotEnabled {
                    name: session.name().clone(),
                }
                .into())
            }
        });
        if let Err(error) = check {
            self.fire_session(OnlineEvent::ArbitrationComplete, name, Err(error.clone()));
            return Err(error);
        }
        self.issue(
            PlatformRequest::ArbitrationRegister {
                session: name.clone(),
            },
            TaskKind::ArbitrationRegister { session: name },
        )
    }

    /// Register a player identity with a session's local roster
    pub fn register_player(
        &mut self,
        name: &SessionName,
        player: PlayerId,
    ) -> OnlineResult<()> {
        self.registry
            .require_mut(name)
            .and_then(|session| session.register_player(player))
    }

    /// Remove a player identity from a session's local roster
    pub fn unregister_player(
        &mut self,
        name: &SessionName,
        player: PlayerId,
    ) -> OnlineResult<()> {
        self.registry
            .require_mut(name)
            .and_then(|session| session.unregister_player(player))
    }

    /// Search for advertised sessions
    pub fn find_sessions(
        &mut self,
        match_type: MatchType,
        max_results: u32,
    ) -> OnlineResult<OpDisposition> {
        self.issue(
            PlatformRequest::SessionSearch {
                match_type,
                max_results,
            },
            TaskKind::Search,
        )
    }

    // ------------------------------------------------------------------
    // Player-data operations
    // ------------------------------------------------------------------

    /// Read a user's profile settings. The title-authored defaults blob is
    /// consulted first; ids it does not cover are fetched from the platform
    /// store, and anything still missing falls back to built-in defaults.
    pub fn read_profile(
        &mut self,
        user: UserIndex,
        ids: Vec<SettingId>,
    ) -> OnlineResult<OpDisposition> {
        self.cached_read(
            user,
            EntityKind::Profile,
            OnlineEvent::ProfileReadComplete,
            PlatformRequest::ProfileRead {
                user,
                scope: ProfileScope::TitleDefaults,
                ids: ids.clone(),
            },
            TaskKind::ProfileRead {
                user,
                step: ProfileReadStep::TitleDefaults,
                requested: ids,
                partial: ProfileSettings::empty(),
            },
        )
    }

    /// Write a user's profile settings
    pub fn write_profile(
        &mut self,
        user: UserIndex,
        settings: ProfileSettings,
    ) -> OnlineResult<OpDisposition> {
        let blob = match settings.to_blob() {
            Ok(blob) => blob,
            Err(error) => {
                self.fire_user(OnlineEvent::ProfileWriteComplete, user, Err(error.clone()));
                return Err(error);
            }
        };
        self.cached_write(
            user,
            EntityKind::Profile,
            OnlineEvent::ProfileWriteComplete,
            PlatformRequest::ProfileWrite { user, blob },
            TaskKind::ProfileWrite {
                user,
                pending: settings,
            },
        )
    }

    /// Read a user's stats rows for one view
    pub fn read_stats(&mut self, user: UserIndex, view_id: u32) -> OnlineResult<OpDisposition> {
        self.cached_read(
            user,
            EntityKind::Stats,
            OnlineEvent::StatsReadComplete,
            PlatformRequest::StatsRead { user, view_id },
            TaskKind::StatsRead { user, view_id },
        )
    }

    /// Write a user's stats rows
    pub fn write_stats(
        &mut self,
        user: UserIndex,
        stats: PlayerStats,
    ) -> OnlineResult<OpDisposition> {
        self.cached_write(
            user,
            EntityKind::Stats,
            OnlineEvent::StatsWriteComplete,
            PlatformRequest::StatsWrite {
                user,
                stats: stats.clone(),
            },
            TaskKind::StatsWrite {
                user,
                pending: stats,
            },
        )
    }

    /// Read a user's storage blob, discarding incompatible versions
    pub fn read_storage(&mut self, user: UserIndex) -> OnlineResult<OpDisposition> {
        self.cached_read(
            user,
            EntityKind::Storage,
            OnlineEvent::StorageReadComplete,
            PlatformRequest::StorageRead { user },
            TaskKind::StorageRead { user },
        )
    }

    /// Write a user's storage blob
    pub fn write_storage(
        &mut self,
        user: UserIndex,
        blob: StorageBlob,
    ) -> OnlineResult<OpDisposition> {
        if let Err(reason) = blob.validate() {
            let error = OnlineError::config_error(reason);
            self.fire_user(OnlineEvent::StorageWriteComplete, user, Err(error.clone()));
            return Err(error);
        }
        self.cached_write(
            user,
            EntityKind::Storage,
            OnlineEvent::StorageWriteComplete,
            PlatformRequest::StorageWrite {
                user,
                blob: blob.clone(),
            },
            TaskKind::StorageWrite {
                user,
                pending: blob,
            },
        )
    }

    /// Enumerate a user's content packages, page by page until exhausted
    pub fn enumerate_content(&mut self, user: UserIndex) -> OnlineResult<OpDisposition> {
        self.cached_read(
            user,
            EntityKind::ContentList,
            OnlineEvent::ContentListComplete,
            PlatformRequest::ContentEnumerate { user, page: 0 },
            TaskKind::ContentEnumerate {
                user,
                next_page: 1,
                items: Vec::new(),
            },
        )
    }

    /// Read a user's achievement list
    pub fn read_achievements(&mut self, user: UserIndex) -> OnlineResult<OpDisposition> {
        self.cached_read(
            user,
            EntityKind::Achievements,
            OnlineEvent::AchievementsReadComplete,
            PlatformRequest::AchievementsRead { user },
            TaskKind::AchievementsRead { user },
        )
    }

    /// A user signed out or changed sign-in: every cached entity for the
    /// slot is dropped so the next access re-reads
    pub fn notify_sign_in_changed(&mut self, user: UserIndex, player: Option<PlayerId>) {
        info!(%user, "sign-in change, invalidating cached data");
        self.cache.invalidate_user(user);
        self.dispatcher
            .fire(&OnlineEvent::SignInChanged { user, player });
    }

    // ------------------------------------------------------------------
    // Ticking and teardown
    // ------------------------------------------------------------------

    /// Advance every in-flight task. Completed tasks are collected before
    /// any result is processed, so processing may enqueue follow-on work
    /// without disturbing the sweep.
    pub fn tick(&mut self, delta: Duration) {
        let finished = self.queue.tick(delta, &mut self.platform);
        for FinishedTask { task, verdict } in finished {
            let kind = task.into_kind();
            let outcome = match verdict {
                TaskVerdict::Completed { code, response } => TaskOutcome::Completed {
                    code,
                    response,
                    immediate: false,
                },
                TaskVerdict::Orphaned { elapsed } => TaskOutcome::Orphaned { elapsed },
            };
            self.resolve(kind, outcome);
        }
    }

    /// Block until every in-flight task finishes, ticking with a fixed
    /// small delta and sleeping between rounds. Called once at process
    /// teardown so in-flight writes are not abandoned. The orphan ceiling
    /// bounds how long a wedged task can hold this loop open.
    pub fn drain_and_shutdown(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        info!(
            in_flight = self.queue.len(),
            "draining outstanding tasks before shutdown"
        );
        loop {
            self.tick(self.config.drain_tick_delta);
            if self.queue.is_empty() {
                break;
            }
            std::thread::sleep(self.config.drain_sleep);
        }
        info!("task queue drained");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Issue a request and either enqueue the pending task or resolve the
    /// synchronous completion on the spot
    fn issue(&mut self, request: PlatformRequest, kind: TaskKind) -> OnlineResult<OpDisposition> {
        match self.platform.issue(request) {
            IssueOutcome::Pending(handle) => {
                self.queue.enqueue(handle, kind);
                Ok(OpDisposition::Issued)
            }
            IssueOutcome::Completed { code, response } => {
                let end_of_enumeration = code == CompletionCode::EndOfList
                    && matches!(kind, TaskKind::ContentEnumerate { .. });
                let rejected = !code.is_success() && !end_of_enumeration;
                debug!(op = kind.op_name(), %code, "request completed at issue time");
                self.resolve(
                    kind,
                    TaskOutcome::Completed {
                        code,
                        response,
                        immediate: true,
                    },
                );
                if rejected {
                    Err(OnlineError::rejected(code))
                } else {
                    Ok(OpDisposition::CompletedImmediately)
                }
            }
        }
    }

    /// Drive one task outcome to quiescence, issuing follow-on requests for
    /// multi-step operations until one goes pending or the chain finishes
    fn resolve(&mut self, kind: TaskKind, outcome: TaskOutcome) {
        let mut current = Some((kind, outcome));
        while let Some((kind, outcome)) = current.take() {
            match self.apply(kind, outcome) {
                Step::Done => {}
                Step::Continue { kind, request } => match self.platform.issue(request) {
                    IssueOutcome::Pending(handle) => {
                        self.queue.enqueue(handle, kind);
                    }
                    IssueOutcome::Completed { code, response } => {
                        current = Some((
                            kind,
                            TaskOutcome::Completed {
                                code,
                                response,
                                immediate: false,
                            },
                        ));
                    }
                },
            }
        }
    }

    /// Apply one terminal outcome: update the registry/cache, fire the
    /// completion event, or re-arm a multi-step operation
    fn apply(&mut self, kind: TaskKind, outcome: TaskOutcome) -> Step {
        match kind {
            TaskKind::SessionCreate { session } => {
                match outcome.into_result() {
                    Ok(response) => {
                        if let Some(PlatformResponse::SessionRef { nonce }) = response {
                            if let Some(record) = self.registry.get_mut(&session) {
                                record.platform_ref = Some(nonce);
                            }
                        }
                        self.fire_session(OnlineEvent::SessionCreateComplete, session, Ok(()));
                    }
                    Err(error) => {
                        // No half-created session survives a failed create
                        self.registry.remove(&session);
                        self.fire_session(OnlineEvent::SessionCreateComplete, session, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::SessionJoin { session } => {
                match outcome.into_result() {
                    Ok(response) => {
                        if let Some(PlatformResponse::SessionRef { nonce }) = response {
                            if let Some(record) = self.registry.get_mut(&session) {
                                record.platform_ref = Some(nonce);
                            }
                        }
                        self.fire_session(OnlineEvent::SessionJoinComplete, session, Ok(()));
                    }
                    Err(error) => {
                        self.registry.remove(&session);
                        self.fire_session(OnlineEvent::SessionJoinComplete, session, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::SessionStart { session } => {
                let result = outcome.into_result().map(|_| ());
                if let Some(record) = self.registry.get_mut(&session) {
                    record.complete_start(result.is_ok());
                }
                self.fire_session(OnlineEvent::SessionStartComplete, session, result);
                Step::Done
            }

            TaskKind::SessionEnd { session } => {
                let result = outcome.into_result().map(|_| ());
                if let Some(record) = self.registry.get_mut(&session) {
                    record.complete_end(result.is_ok());
                }
                self.fire_session(OnlineEvent::SessionEndComplete, session, result);
                Step::Done
            }

            TaskKind::SessionDestroy { session } => {
                // The record was removed when the operation was requested;
                // this only reports how the platform-side teardown went
                let result = outcome.into_result().map(|_| ());
                self.fire_session(OnlineEvent::SessionDestroyComplete, session, result);
                Step::Done
            }

            TaskKind::SessionModify { session, previous } => {
                match outcome.into_result() {
                    Ok(_) => {
                        self.fire_session(OnlineEvent::SessionModifyComplete, session, Ok(()));
                    }
                    Err(error) => {
                        // Reconcile the optimistic update
                        if let Some(record) = self.registry.get_mut(&session) {
                            record.settings = previous;
                        }
                        self.fire_session(OnlineEvent::SessionModifyComplete, session, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::ArbitrationRegister { session } => {
                match outcome.into_result() {
                    Ok(response) => {
                        let roster = match response {
                            Some(PlatformResponse::ArbitrationRoster(roster)) => roster,
                            _ => Vec::new(),
                        };
                        let shrink = self.config.shrink_arbitrated_sessions;
                        if let Some(record) = self.registry.get_mut(&session) {
                            record.apply_arbitration(roster, shrink);
                        }
                        self.fire_session(OnlineEvent::ArbitrationComplete, session, Ok(()));
                    }
                    Err(error) => {
                        self.fire_session(OnlineEvent::ArbitrationComplete, session, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::Search => {
                let event = match outcome.into_result() {
                    Ok(response) => {
                        let results = match response {
                            Some(PlatformResponse::SearchResults(results)) => results,
                            _ => Vec::new(),
                        };
                        OnlineEvent::SearchComplete(SearchOutcome {
                            success: true,
                            results,
                            error: None,
                        })
                    }
                    Err(error) => OnlineEvent::SearchComplete(SearchOutcome {
                        success: false,
                        results: Vec::new(),
                        error: Some(error),
                    }),
                };
                self.dispatcher.fire(&event);
                Step::Done
            }

            TaskKind::ProfileRead {
                user,
                step,
                requested,
                mut partial,
            } => {
                let response = match outcome.into_result() {
                    Ok(response) => response,
                    Err(error) => {
                        self.cache.finish_read_failed(user, EntityKind::Profile);
                        self.fire_user(OnlineEvent::ProfileReadComplete, user, Err(error));
                        return Step::Done;
                    }
                };

                if let Some(PlatformResponse::ProfileBlob(blob)) = response {
                    match ProfileSettings::from_blob(&blob) {
                        Ok(decoded) if decoded.version != PROFILE_DATA_VERSION => {
                            // Incompatible layout: discard, accept defaults
                            self.cache
                                .finish_read_version_mismatch(user, EntityKind::Profile);
                            self.fire_user(OnlineEvent::ProfileReadComplete, user, Ok(()));
                            return Step::Done;
                        }
                        Ok(decoded) => partial.merge_missing(decoded),
                        Err(error) => {
                            self.cache.finish_read_failed(user, EntityKind::Profile);
                            self.fire_user(OnlineEvent::ProfileReadComplete, user, Err(error));
                            return Step::Done;
                        }
                    }
                }

                let missing = partial.missing_from(&requested);
                if step == ProfileReadStep::TitleDefaults && !missing.is_empty() {
                    // The defaults blob did not cover everything; fetch the
                    // rest from the platform store
                    return Step::Continue {
                        kind: TaskKind::ProfileRead {
                            user,
                            step: ProfileReadStep::Remaining,
                            requested,
                            partial,
                        },
                        request: PlatformRequest::ProfileRead {
                            user,
                            scope: ProfileScope::Remaining,
                            ids: missing,
                        },
                    };
                }

                // Ids neither source provided fall back to built-in defaults
                if !missing.is_empty() {
                    partial.merge_missing(ProfileSettings::defaults());
                }
                self.cache.finish_read_success(
                    user,
                    EntityKind::Profile,
                    EntityPayload::Profile(partial),
                    PROFILE_DATA_VERSION,
                );
                self.fire_user(OnlineEvent::ProfileReadComplete, user, Ok(()));
                Step::Done
            }

            TaskKind::ProfileWrite { user, pending } => {
                match outcome.into_result() {
                    Ok(_) => {
                        self.cache.finish_write_success(
                            user,
                            EntityKind::Profile,
                            EntityPayload::Profile(pending),
                            PROFILE_DATA_VERSION,
                        );
                        self.fire_user(OnlineEvent::ProfileWriteComplete, user, Ok(()));
                    }
                    Err(error) => {
                        self.cache.finish_write_failed(user, EntityKind::Profile);
                        self.fire_user(OnlineEvent::ProfileWriteComplete, user, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::StatsRead { user, view_id } => {
                match outcome.into_result() {
                    Ok(response) => {
                        let stats = match response {
                            Some(PlatformResponse::StatsRows(stats)) => stats,
                            _ => PlayerStats::empty(view_id),
                        };
                        self.cache.finish_read_success(
                            user,
                            EntityKind::Stats,
                            EntityPayload::Stats(stats),
                            0,
                        );
                        self.fire_user(OnlineEvent::StatsReadComplete, user, Ok(()));
                    }
                    Err(error) => {
                        self.cache.finish_read_failed(user, EntityKind::Stats);
                        self.fire_user(OnlineEvent::StatsReadComplete, user, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::StatsWrite { user, pending } => {
                match outcome.into_result() {
                    Ok(_) => {
                        self.cache.finish_write_success(
                            user,
                            EntityKind::Stats,
                            EntityPayload::Stats(pending),
                            0,
                        );
                        self.fire_user(OnlineEvent::StatsWriteComplete, user, Ok(()));
                    }
                    Err(error) => {
                        self.cache.finish_write_failed(user, EntityKind::Stats);
                        self.fire_user(OnlineEvent::StatsWriteComplete, user, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::StorageRead { user } => {
                match outcome.into_result() {
                    Ok(response) => {
                        let blob = match response {
                            Some(PlatformResponse::StorageData(blob)) => blob,
                            _ => StorageBlob::empty(),
                        };
                        if blob.version != STORAGE_DATA_VERSION {
                            // Stale save data is discarded, never merged
                            self.cache
                                .finish_read_version_mismatch(user, EntityKind::Storage);
                        } else {
                            let version = blob.version;
                            self.cache.finish_read_success(
                                user,
                                EntityKind::Storage,
                                EntityPayload::Storage(blob),
                                version,
                            );
                        }
                        self.fire_user(OnlineEvent::StorageReadComplete, user, Ok(()));
                    }
                    Err(error) => {
                        self.cache.finish_read_failed(user, EntityKind::Storage);
                        self.fire_user(OnlineEvent::StorageReadComplete, user, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::StorageWrite { user, pending } => {
                match outcome.into_result() {
                    Ok(_) => {
                        let version = pending.version;
                        self.cache.finish_write_success(
                            user,
                            EntityKind::Storage,
                            EntityPayload::Storage(pending),
                            version,
                        );
                        self.fire_user(OnlineEvent::StorageWriteComplete, user, Ok(()));
                    }
                    Err(error) => {
                        self.cache.finish_write_failed(user, EntityKind::Storage);
                        self.fire_user(OnlineEvent::StorageWriteComplete, user, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::ContentEnumerate {
                user,
                next_page,
                mut items,
            } => {
                if outcome.is_end_of_list() {
                    self.finish_content(user, items);
                    return Step::Done;
                }
                match outcome.into_result() {
                    Ok(Some(PlatformResponse::ContentPage {
                        items: page_items,
                        more,
                    })) => {
                        items.extend(page_items);
                        if more {
                            return Step::Continue {
                                kind: TaskKind::ContentEnumerate {
                                    user,
                                    next_page: next_page + 1,
                                    items,
                                },
                                request: PlatformRequest::ContentEnumerate {
                                    user,
                                    page: next_page,
                                },
                            };
                        }
                        self.finish_content(user, items);
                    }
                    Ok(_) => {
                        self.finish_content(user, items);
                    }
                    Err(error) => {
                        self.cache.finish_read_failed(user, EntityKind::ContentList);
                        self.fire_user(OnlineEvent::ContentListComplete, user, Err(error));
                    }
                }
                Step::Done
            }

            TaskKind::AchievementsRead { user } => {
                match outcome.into_result() {
                    Ok(response) => {
                        let achievements = match response {
                            Some(PlatformResponse::AchievementList(list)) => list,
                            _ => Vec::new(),
                        };
                        self.cache.finish_read_success(
                            user,
                            EntityKind::Achievements,
                            EntityPayload::Achievements(achievements),
                            0,
                        );
                        self.fire_user(OnlineEvent::AchievementsReadComplete, user, Ok(()));
                    }
                    Err(error) => {
                        self.cache
                            .finish_read_failed(user, EntityKind::Achievements);
                        self.fire_user(OnlineEvent::AchievementsReadComplete, user, Err(error));
                    }
                }
                Step::Done
            }
        }
    }

    /// Finalize a content enumeration with the accumulated items
    fn finish_content(&mut self, user: UserIndex, items: Vec<ContentItem>) {
        self.cache.finish_read_success(
            user,
            EntityKind::ContentList,
            EntityPayload::Content(items),
            0,
        );
        self.fire_user(OnlineEvent::ContentListComplete, user, Ok(()));
    }

    /// Reject user indices outside the local player range before any cache
    /// or platform work happens
    fn require_local_user(
        &mut self,
        user: UserIndex,
        make: fn(UserOutcome) -> OnlineEvent,
    ) -> OnlineResult<()> {
        if user.is_local() {
            return Ok(());
        }
        let error = OnlineError::config_error(format!("{user} is outside the local player range"));
        self.fire_user(make, user, Err(error.clone()));
        Err(error)
    }

    /// Shared read-through entry: serve from cache, piggyback on an
    /// in-flight read, or issue a fresh fetch
    fn cached_read(
        &mut self,
        user: UserIndex,
        kind: EntityKind,
        make: fn(UserOutcome) -> OnlineEvent,
        request: PlatformRequest,
        task: TaskKind,
    ) -> OnlineResult<OpDisposition> {
        self.require_local_user(user, make)?;
        match self.cache.begin_read(user, kind) {
            Ok(ReadDisposition::Cached) => {
                debug!(%user, %kind, "read served from cache");
                self.fire_user(make, user, Ok(()));
                Ok(OpDisposition::CompletedImmediately)
            }
            Ok(ReadDisposition::AlreadyInFlight) => Ok(OpDisposition::AlreadyInProgress),
            Ok(ReadDisposition::Fetch) => self.issue(request, task),
            Err(error) => {
                self.fire_user(make, user, Err(error.clone()));
                Err(error)
            }
        }
    }

    /// Shared write entry: reject when any operation is in flight for the
    /// key, otherwise issue the platform write
    fn cached_write(
        &mut self,
        user: UserIndex,
        kind: EntityKind,
        make: fn(UserOutcome) -> OnlineEvent,
        request: PlatformRequest,
        task: TaskKind,
    ) -> OnlineResult<OpDisposition> {
        self.require_local_user(user, make)?;
        if let Err(error) = self.cache.begin_write(user, kind) {
            self.fire_user(make, user, Err(error.clone()));
            return Err(error);
        }
        self.issue(request, task)
    }

    fn fire_session(
        &mut self,
        make: fn(SessionOutcome) -> OnlineEvent,
        session: SessionName,
        result: Result<(), OnlineError>,
    ) {
        let outcome = match result {
            Ok(()) => SessionOutcome::ok(session),
            Err(error) => SessionOutcome::failed(session, error),
        };
        self.dispatcher.fire(&make(outcome));
    }

    fn fire_user(
        &mut self,
        make: fn(UserOutcome) -> OnlineEvent,
        user: UserIndex,
        result: Result<(), OnlineError>,
    ) {
        let outcome = match result {
            Ok(()) => UserOutcome::ok(user),
            Err(error) => UserOutcome::failed(user, error),
        };
        self.dispatcher.fire(&make(outcome));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
