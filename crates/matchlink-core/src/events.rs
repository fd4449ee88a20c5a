//! Typed completion events and the observer-list dispatcher
//!
//! Every public coordinator operation reports its outcome through exactly one
//! [`OnlineEvent`], whether it failed synchronously or completed after
//! polling. Observers register against an [`EventKind`] and receive a small
//! immutable result record; there is no wide shared parameter struct.

use core::fmt;
use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::debug;

use crate::errors::OnlineError;
use crate::settings::SessionDescriptor;
use crate::types::{PlayerId, SessionName, UserIndex};

// ----------------------------------------------------------------------------
// Event Kinds
// ----------------------------------------------------------------------------

/// Key an observer registers against; one variant per operation completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionCreateComplete,
    SessionJoinComplete,
    SessionStartComplete,
    SessionEndComplete,
    SessionDestroyComplete,
    SessionModifyComplete,
    ArbitrationComplete,
    SearchComplete,
    ProfileReadComplete,
    ProfileWriteComplete,
    StatsReadComplete,
    StatsWriteComplete,
    StorageReadComplete,
    StorageWriteComplete,
    ContentListComplete,
    AchievementsReadComplete,
    SignInChanged,
}

// ----------------------------------------------------------------------------
// Outcome Records
// ----------------------------------------------------------------------------

/// Result record for a session-scoped operation
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// The session the operation targeted
    pub session: SessionName,
    /// Whether the operation succeeded
    pub success: bool,
    /// The failure, when `success` is false
    pub error: Option<OnlineError>,
}

impl SessionOutcome {
    /// A successful outcome for a session
    pub fn ok(session: SessionName) -> Self {
        Self {
            session,
            success: true,
            error: None,
        }
    }

    /// A failed outcome for a session
    pub fn failed(session: SessionName, error: OnlineError) -> Self {
        Self {
            session,
            success: false,
            error: Some(error),
        }
    }
}

/// Result record for a per-user operation
#[derive(Debug, Clone)]
pub struct UserOutcome {
    /// The local user the operation targeted
    pub user: UserIndex,
    /// Whether the operation succeeded
    pub success: bool,
    /// The failure, when `success` is false
    pub error: Option<OnlineError>,
}

impl UserOutcome {
    /// A successful outcome for a user
    pub fn ok(user: UserIndex) -> Self {
        Self {
            user,
            success: true,
            error: None,
        }
    }

    /// A failed outcome for a user
    pub fn failed(user: UserIndex, error: OnlineError) -> Self {
        Self {
            user,
            success: false,
            error: Some(error),
        }
    }
}

/// Result record for a matchmaking search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Whether the search completed successfully
    pub success: bool,
    /// Matching sessions; empty on failure
    pub results: Vec<SessionDescriptor>,
    /// The failure, when `success` is false
    pub error: Option<OnlineError>,
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// A completion event fired by the coordinator
#[derive(Debug, Clone)]
pub enum OnlineEvent {
    SessionCreateComplete(SessionOutcome),
    SessionJoinComplete(SessionOutcome),
    SessionStartComplete(SessionOutcome),
    SessionEndComplete(SessionOutcome),
    SessionDestroyComplete(SessionOutcome),
    SessionModifyComplete(SessionOutcome),
    ArbitrationComplete(SessionOutcome),
    SearchComplete(SearchOutcome),
    ProfileReadComplete(UserOutcome),
    ProfileWriteComplete(UserOutcome),
    StatsReadComplete(UserOutcome),
    StatsWriteComplete(UserOutcome),
    StorageReadComplete(UserOutcome),
    StorageWriteComplete(UserOutcome),
    ContentListComplete(UserOutcome),
    AchievementsReadComplete(UserOutcome),
    SignInChanged {
        user: UserIndex,
        player: Option<PlayerId>,
    },
}

impl OnlineEvent {
    /// The kind observers key on
    pub fn kind(&self) -> EventKind {
        match self {
            OnlineEvent::SessionCreateComplete(_) => EventKind::SessionCreateComplete,
            OnlineEvent::SessionJoinComplete(_) => EventKind::SessionJoinComplete,
            OnlineEvent::SessionStartComplete(_) => EventKind::SessionStartComplete,
            OnlineEvent::SessionEndComplete(_) => EventKind::SessionEndComplete,
            OnlineEvent::SessionDestroyComplete(_) => EventKind::SessionDestroyComplete,
            OnlineEvent::SessionModifyComplete(_) => EventKind::SessionModifyComplete,
            OnlineEvent::ArbitrationComplete(_) => EventKind::ArbitrationComplete,
            OnlineEvent::SearchComplete(_) => EventKind::SearchComplete,
            OnlineEvent::ProfileReadComplete(_) => EventKind::ProfileReadComplete,
            OnlineEvent::ProfileWriteComplete(_) => EventKind::ProfileWriteComplete,
            OnlineEvent::StatsReadComplete(_) => EventKind::StatsReadComplete,
            OnlineEvent::StatsWriteComplete(_) => EventKind::StatsWriteComplete,
            OnlineEvent::StorageReadComplete(_) => EventKind::StorageReadComplete,
            OnlineEvent::StorageWriteComplete(_) => EventKind::StorageWriteComplete,
            OnlineEvent::ContentListComplete(_) => EventKind::ContentListComplete,
            OnlineEvent::AchievementsReadComplete(_) => EventKind::AchievementsReadComplete,
            OnlineEvent::SignInChanged { .. } => EventKind::SignInChanged,
        }
    }

    /// Whether the event reports a successful operation
    pub fn is_success(&self) -> bool {
        match self {
            OnlineEvent::SessionCreateComplete(outcome)
            | OnlineEvent::SessionJoinComplete(outcome)
            | OnlineEvent::SessionStartComplete(outcome)
            | OnlineEvent::SessionEndComplete(outcome)
            | OnlineEvent::SessionDestroyComplete(outcome)
            | OnlineEvent::SessionModifyComplete(outcome)
            | OnlineEvent::ArbitrationComplete(outcome) => outcome.success,
            OnlineEvent::SearchComplete(outcome) => outcome.success,
            OnlineEvent::ProfileReadComplete(outcome)
            | OnlineEvent::ProfileWriteComplete(outcome)
            | OnlineEvent::StatsReadComplete(outcome)
            | OnlineEvent::StatsWriteComplete(outcome)
            | OnlineEvent::StorageReadComplete(outcome)
            | OnlineEvent::StorageWriteComplete(outcome)
            | OnlineEvent::ContentListComplete(outcome)
            | OnlineEvent::AchievementsReadComplete(outcome) => outcome.success,
            OnlineEvent::SignInChanged { .. } => true,
        }
    }
}

// ----------------------------------------------------------------------------
// Event Dispatcher
// ----------------------------------------------------------------------------

/// Boxed observer callback
pub type EventCallback = Box<dyn FnMut(&OnlineEvent)>;

/// Observer lists keyed by event kind
#[derive(Default)]
pub struct EventDispatcher {
    observers: HashMap<EventKind, SmallVec<[EventCallback; 2]>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for an event kind
    pub fn register(&mut self, kind: EventKind, callback: impl FnMut(&OnlineEvent) + 'static) {
        self.observers
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
    }

    /// Number of observers registered for a kind
    pub fn observer_count(&self, kind: EventKind) -> usize {
        self.observers.get(&kind).map_or(0, |list| list.len())
    }

    /// Invoke every observer registered for the event's kind, once each
    pub fn fire(&mut self, event: &OnlineEvent) {
        match self.observers.get_mut(&event.kind()) {
            Some(list) if !list.is_empty() => {
                for callback in list.iter_mut() {
                    callback(event);
                }
            }
            _ => debug!(kind = ?event.kind(), "event fired with no observers"),
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(EventKind, usize)> = self
            .observers
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        counts.sort_by_key(|(kind, _)| format!("{kind:?}"));
        f.debug_struct("EventDispatcher")
            .field("observers", &counts)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fire_invokes_each_observer_once() {
        let mut dispatcher = EventDispatcher::new();
        let hits = Rc::new(RefCell::new(0u32));

        for _ in 0..2 {
            let hits = Rc::clone(&hits);
            dispatcher.register(EventKind::SessionCreateComplete, move |_| {
                *hits.borrow_mut() += 1;
            });
        }

        let event =
            OnlineEvent::SessionCreateComplete(SessionOutcome::ok(SessionName::from("Game")));
        dispatcher.fire(&event);

        assert_eq!(*hits.borrow(), 2);
        assert_eq!(
            dispatcher.observer_count(EventKind::SessionCreateComplete),
            2
        );
    }

    #[test]
    fn test_fire_only_reaches_matching_kind() {
        let mut dispatcher = EventDispatcher::new();
        let hits = Rc::new(RefCell::new(0u32));

        let observed = Rc::clone(&hits);
        dispatcher.register(EventKind::SessionEndComplete, move |_| {
            *observed.borrow_mut() += 1;
        });

        let event =
            OnlineEvent::SessionStartComplete(SessionOutcome::ok(SessionName::from("Game")));
        dispatcher.fire(&event);

        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_event_success_flag() {
        let ok = OnlineEvent::ProfileReadComplete(UserOutcome::ok(UserIndex::new(0)));
        assert!(ok.is_success());

        let failed = OnlineEvent::ProfileReadComplete(UserOutcome::failed(
            UserIndex::new(0),
            OnlineError::codec_error("bad blob"),
        ));
        assert!(!failed.is_success());
        assert_eq!(failed.kind(), EventKind::ProfileReadComplete);
    }
}
