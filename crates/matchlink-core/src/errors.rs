//! Error types for the matchlink coordinator
//!
//! Per-domain error enums (session, cache, platform) unified into the
//! top-level [`OnlineError`]. Errors are cloneable so completion events can
//! carry them to observers.

use core::time::Duration;

use crate::platform::CompletionCode;
use crate::player_data::EntityKind;
use crate::types::{PlayerId, SessionName, UserIndex};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Session registry and lifecycle errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("session '{name}' already exists")]
    AlreadyExists { name: SessionName },
    #[error("session '{name}' not found")]
    NotFound { name: SessionName },
    #[error("session '{name}' is {actual}, operation requires {expected}")]
    WrongState {
        name: SessionName,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("player {player} is already registered in session '{name}'")]
    DuplicateRegistrant { name: SessionName, player: PlayerId },
    #[error("player {player} is not registered in session '{name}'")]
    UnknownRegistrant { name: SessionName, player: PlayerId },
    #[error("session '{name}' does not use arbitration")]
    ArbitrationNotEnabled { name: SessionName },
}

/// Read-through cache serialization errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("a read is already in flight for {user} {kind}")]
    ReadInFlight { user: UserIndex, kind: EntityKind },
    #[error("a write is already in flight for {user} {kind}")]
    WriteInFlight { user: UserIndex, kind: EntityKind },
}

/// Errors originating from the platform service
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlatformError {
    #[error("platform rejected the request: {code}")]
    Rejected { code: CompletionCode },
    #[error("platform operation failed: {code}")]
    FailedAsync { code: CompletionCode },
    #[error("task orphaned after {elapsed:?} without completing")]
    Orphaned { elapsed: Duration },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Top-level error type for the matchlink coordinator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OnlineError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Invalid settings or configuration detected before issuing a request
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// Payload serialization / deserialization failure
    #[error("codec error: {reason}")]
    Codec { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl OnlineError {
    /// Create a not-found error for a session name
    pub fn session_not_found(name: impl Into<SessionName>) -> Self {
        OnlineError::Session(SessionError::NotFound { name: name.into() })
    }

    /// Create an immediate-rejection error from a platform code
    pub fn rejected(code: CompletionCode) -> Self {
        OnlineError::Platform(PlatformError::Rejected { code })
    }

    /// Create an async-failure error from a platform code
    pub fn failed_async(code: CompletionCode) -> Self {
        OnlineError::Platform(PlatformError::FailedAsync { code })
    }

    /// Create an orphaned-task error
    pub fn orphaned(elapsed: Duration) -> Self {
        OnlineError::Platform(PlatformError::Orphaned { elapsed })
    }

    /// Create a configuration error with a reason
    pub fn config_error(reason: impl Into<String>) -> Self {
        OnlineError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a codec error with a reason
    pub fn codec_error(reason: impl Into<String>) -> Self {
        OnlineError::Codec {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type OnlineResult<T> = core::result::Result<T, OnlineError>;
