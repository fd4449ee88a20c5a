//! Session registry and lifecycle state machine
//!
//! The registry enforces single-session-per-name semantics and tracks each
//! session through `Pending -> Starting -> InProgress -> Ending -> Ended`.
//! A torn-down session is removed outright; restarting an ended match
//! requires creating a new session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use matchlink_core::{
    OnlineResult, PlayerId, RosterEntry, SessionError, SessionName, SessionSettings,
};

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Lifecycle state of a registered session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created or joined; gameplay has not started
    Pending,
    /// A platform start call is in flight
    Starting,
    /// The match is running
    InProgress,
    /// A platform end call is in flight
    Ending,
    /// The match finished; stats are committed
    Ended,
}

impl SessionState {
    /// Current state name for logging and errors
    pub fn state_name(&self) -> &'static str {
        match self {
            SessionState::Pending => "Pending",
            SessionState::Starting => "Starting",
            SessionState::InProgress => "InProgress",
            SessionState::Ending => "Ending",
            SessionState::Ended => "Ended",
        }
    }
}

// ----------------------------------------------------------------------------
// Arbitration
// ----------------------------------------------------------------------------

/// A machine/player pair registered through consensus arbitration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRegistrant {
    pub machine_id: u64,
    pub player: PlayerId,
    pub trust_factor: f32,
}

impl From<RosterEntry> for ArbitrationRegistrant {
    fn from(entry: RosterEntry) -> Self {
        Self {
            machine_id: entry.machine_id,
            player: entry.player,
            trust_factor: entry.trust_factor,
        }
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// One registered session: settings, lifecycle state, and rosters
#[derive(Debug, Clone)]
pub struct Session {
    name: SessionName,
    /// Current settings; updated optimistically by modify and reconciled on
    /// completion
    pub settings: SessionSettings,
    state: SessionState,
    /// Platform-side reference, populated when create/join completes
    pub platform_ref: Option<u64>,
    registrants: Vec<PlayerId>,
    arbitration: Vec<ArbitrationRegistrant>,
}

impl Session {
    fn new(name: SessionName, settings: SessionSettings) -> Self {
        Self {
            name,
            settings,
            state: SessionState::Pending,
            platform_ref: None,
            registrants: Vec::new(),
            arbitration: Vec::new(),
        }
    }

    /// The registry key
    pub fn name(&self) -> &SessionName {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registered player identities
    pub fn registrants(&self) -> &[PlayerId] {
        &self.registrants
    }

    /// Arbitration roster, populated once consensus registration completes
    pub fn arbitration_registrants(&self) -> &[ArbitrationRegistrant] {
        &self.arbitration
    }

    // ------------------------------------------------------------------
    // Lifecycle transitions
    // ------------------------------------------------------------------

    /// Move to `Starting`. Valid from `Pending` or `Ended`.
    pub fn begin_start(&mut self) -> OnlineResult<()> {
        match self.state {
            SessionState::Pending | SessionState::Ended => {
                self.state = SessionState::Starting;
                Ok(())
            }
            other => Err(SessionError::WrongState {
                name: self.name.clone(),
                expected: "Pending or Ended",
                actual: other.state_name(),
            }
            .into()),
        }
    }

    /// Resolve a start: `InProgress` on success, back to `Pending` on
    /// failure so the caller can retry
    pub fn complete_start(&mut self, success: bool) {
        if self.state == SessionState::Starting {
            self.state = if success {
                SessionState::InProgress
            } else {
                SessionState::Pending
            };
        }
    }

    /// Move to `Ending`. Valid from `InProgress` only.
    pub fn begin_end(&mut self) -> OnlineResult<()> {
        match self.state {
            SessionState::InProgress => {
                self.state = SessionState::Ending;
                Ok(())
            }
            other => Err(SessionError::WrongState {
                name: self.name.clone(),
                expected: "InProgress",
                actual: other.state_name(),
            }
            .into()),
        }
    }

    /// Resolve an end: `Ended` on success, back to `InProgress` on failure
    pub fn complete_end(&mut self, success: bool) {
        if self.state == SessionState::Ending {
            self.state = if success {
                SessionState::Ended
            } else {
                SessionState::InProgress
            };
        }
    }

    // ------------------------------------------------------------------
    // Rosters
    // ------------------------------------------------------------------

    /// Register a player; duplicate identities are rejected
    pub fn register_player(&mut self, player: PlayerId) -> OnlineResult<()> {
        if self.registrants.contains(&player) {
            return Err(SessionError::DuplicateRegistrant {
                name: self.name.clone(),
                player,
            }
            .into());
        }
        self.registrants.push(player);
        Ok(())
    }

    /// Remove a registered player
    pub fn unregister_player(&mut self, player: PlayerId) -> OnlineResult<()> {
        match self.registrants.iter().position(|existing| *existing == player) {
            Some(position) => {
                self.registrants.remove(position);
                Ok(())
            }
            None => Err(SessionError::UnknownRegistrant {
                name: self.name.clone(),
                player,
            }
            .into()),
        }
    }

    /// Adopt the arbitration roster reported by the platform. When `shrink`
    /// is set, public capacity drops to the final registrant count so no
    /// unarbitrated player can fill a seat later.
    pub fn apply_arbitration(&mut self, roster: Vec<RosterEntry>, shrink: bool) {
        self.arbitration = roster.into_iter().map(ArbitrationRegistrant::from).collect();
        for registrant in &self.arbitration {
            if !self.registrants.contains(&registrant.player) {
                self.registrants.push(registrant.player);
            }
        }
        if shrink {
            let count = self.arbitration.len() as u32;
            if count < self.settings.public_slots {
                debug!(
                    session = %self.name,
                    from = self.settings.public_slots,
                    to = count,
                    "shrinking public slots to arbitration roster"
                );
                self.settings.public_slots = count;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Session Registry
// ----------------------------------------------------------------------------

/// Sessions keyed by name; at most one session per name
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionName, Session>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session in `Pending` state. Fails if the name is
    /// already taken.
    pub fn insert_pending(
        &mut self,
        name: SessionName,
        settings: SessionSettings,
    ) -> OnlineResult<()> {
        if self.sessions.contains_key(&name) {
            return Err(SessionError::AlreadyExists { name }.into());
        }
        debug!(session = %name, "session registered");
        self.sessions
            .insert(name.clone(), Session::new(name, settings));
        Ok(())
    }

    /// Get a session by name
    pub fn get(&self, name: &SessionName) -> Option<&Session> {
        self.sessions.get(name)
    }

    /// Get a mutable session by name
    pub fn get_mut(&mut self, name: &SessionName) -> Option<&mut Session> {
        self.sessions.get_mut(name)
    }

    /// Get a mutable session or a `NotFound` error
    pub fn require_mut(&mut self, name: &SessionName) -> OnlineResult<&mut Session> {
        self.sessions
            .get_mut(name)
            .ok_or_else(|| SessionError::NotFound { name: name.clone() }.into())
    }

    /// Remove a session record. Always succeeds locally; returns the record
    /// if one existed.
    pub fn remove(&mut self, name: &SessionName) -> Option<Session> {
        let removed = self.sessions.remove(name);
        if removed.is_some() {
            debug!(session = %name, "session removed");
        }
        removed
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterate all sessions
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
