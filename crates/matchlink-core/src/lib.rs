//! Matchlink Core
//!
//! This crate provides the foundational types for the matchlink online-services
//! coordinator: identifiers, session settings, the per-player data model, the
//! Platform Service contract, typed completion events, and the error taxonomy.
//!
//! The coordinator engine itself lives in `matchlink-runtime` - this crate is
//! the stable API surface shared by the runtime, the test harness, and
//! applications.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod errors;
pub mod events;
pub mod platform;
pub mod player_data;
pub mod settings;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use errors::{CacheError, OnlineError, OnlineResult, PlatformError, SessionError};
pub use events::{
    EventDispatcher, EventKind, OnlineEvent, SearchOutcome, SessionOutcome, UserOutcome,
};
pub use platform::{
    CompletionCode, IssueOutcome, PlatformHandle, PlatformRequest, PlatformResponse,
    PlatformService, PollStatus, ProfileScope, RequestKind, RosterEntry,
};
pub use player_data::{
    Achievement, CacheStatus, ContentItem, EntityKind, EntityPayload, PlayerStats,
    ProfileSetting, ProfileSettings, SettingId, SettingValue, StatValue, StorageBlob,
};
pub use settings::{MatchType, SessionDescriptor, SessionSettings};
pub use types::{PlayerId, SessionName, TaskId, UserIndex, MAX_LOCAL_USERS};
