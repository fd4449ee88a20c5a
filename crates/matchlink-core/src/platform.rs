//! The Platform Service contract
//!
//! The coordinator never talks to a vendor SDK directly; it issues
//! [`PlatformRequest`]s through this trait and polls the returned handles to
//! completion once per tick. Implementations may complete a request
//! immediately or return a pending handle - every call site handles both.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::player_data::{Achievement, ContentItem, PlayerStats, SettingId, StorageBlob};
use crate::settings::{MatchType, SessionDescriptor, SessionSettings};
use crate::types::{PlayerId, SessionName, UserIndex};

// ----------------------------------------------------------------------------
// Handles and Completion Codes
// ----------------------------------------------------------------------------

/// Opaque token for a pending platform operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformHandle(pub u64);

impl fmt::Display for PlatformHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Terminal status of a platform operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionCode {
    /// The operation succeeded
    Success,
    /// An enumeration ran past its last item; terminal for paged reads
    EndOfList,
    /// The referenced resource does not exist on the platform
    NotFound,
    /// The caller is not allowed to perform the operation
    AccessDenied,
    /// Any other platform-reported failure
    ServiceError(u32),
}

impl CompletionCode {
    /// Whether this code reports success. `EndOfList` is not a success by
    /// itself; enumeration processing treats it as end-of-data.
    pub fn is_success(&self) -> bool {
        matches!(self, CompletionCode::Success)
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionCode::Success => f.write_str("success"),
            CompletionCode::EndOfList => f.write_str("end of list"),
            CompletionCode::NotFound => f.write_str("not found"),
            CompletionCode::AccessDenied => f.write_str("access denied"),
            CompletionCode::ServiceError(code) => write!(f, "service error {code}"),
        }
    }
}

// ----------------------------------------------------------------------------
// Requests
// ----------------------------------------------------------------------------

/// Which source a profile read targets; reads try the title-authored
/// defaults blob first and fall back to the platform store for ids the
/// blob does not cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileScope {
    /// The title-authored defaults blob
    TitleDefaults,
    /// The platform's per-player setting store
    Remaining,
}

/// A request issued to the platform service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlatformRequest {
    SessionCreate {
        session: SessionName,
        settings: SessionSettings,
    },
    SessionJoin {
        session: SessionName,
        descriptor: SessionDescriptor,
    },
    SessionStart {
        session: SessionName,
    },
    SessionEnd {
        session: SessionName,
    },
    SessionDelete {
        session: SessionName,
    },
    SessionModify {
        session: SessionName,
        settings: SessionSettings,
    },
    ArbitrationRegister {
        session: SessionName,
    },
    SessionSearch {
        match_type: MatchType,
        max_results: u32,
    },
    ProfileRead {
        user: UserIndex,
        scope: ProfileScope,
        ids: Vec<SettingId>,
    },
    ProfileWrite {
        user: UserIndex,
        blob: Vec<u8>,
    },
    StatsRead {
        user: UserIndex,
        view_id: u32,
    },
    StatsWrite {
        user: UserIndex,
        stats: PlayerStats,
    },
    StorageRead {
        user: UserIndex,
    },
    StorageWrite {
        user: UserIndex,
        blob: StorageBlob,
    },
    ContentEnumerate {
        user: UserIndex,
        page: u32,
    },
    AchievementsRead {
        user: UserIndex,
    },
}

/// Discriminant of a [`PlatformRequest`], used for scripting and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    SessionCreate,
    SessionJoin,
    SessionStart,
    SessionEnd,
    SessionDelete,
    SessionModify,
    ArbitrationRegister,
    SessionSearch,
    ProfileRead,
    ProfileWrite,
    StatsRead,
    StatsWrite,
    StorageRead,
    StorageWrite,
    ContentEnumerate,
    AchievementsRead,
}

impl PlatformRequest {
    /// The discriminant of this request
    pub fn kind(&self) -> RequestKind {
        match self {
            PlatformRequest::SessionCreate { .. } => RequestKind::SessionCreate,
            PlatformRequest::SessionJoin { .. } => RequestKind::SessionJoin,
            PlatformRequest::SessionStart { .. } => RequestKind::SessionStart,
            PlatformRequest::SessionEnd { .. } => RequestKind::SessionEnd,
            PlatformRequest::SessionDelete { .. } => RequestKind::SessionDelete,
            PlatformRequest::SessionModify { .. } => RequestKind::SessionModify,
            PlatformRequest::ArbitrationRegister { .. } => RequestKind::ArbitrationRegister,
            PlatformRequest::SessionSearch { .. } => RequestKind::SessionSearch,
            PlatformRequest::ProfileRead { .. } => RequestKind::ProfileRead,
            PlatformRequest::ProfileWrite { .. } => RequestKind::ProfileWrite,
            PlatformRequest::StatsRead { .. } => RequestKind::StatsRead,
            PlatformRequest::StatsWrite { .. } => RequestKind::StatsWrite,
            PlatformRequest::StorageRead { .. } => RequestKind::StorageRead,
            PlatformRequest::StorageWrite { .. } => RequestKind::StorageWrite,
            PlatformRequest::ContentEnumerate { .. } => RequestKind::ContentEnumerate,
            PlatformRequest::AchievementsRead { .. } => RequestKind::AchievementsRead,
        }
    }
}

// ----------------------------------------------------------------------------
// Responses
// ----------------------------------------------------------------------------

/// An arbitration roster entry reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// The registering machine
    pub machine_id: u64,
    /// The registering player
    pub player: PlayerId,
    /// Platform trust score for the machine
    pub trust_factor: f32,
}

/// Data returned by a completed platform operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlatformResponse {
    /// Platform-side reference for a created/joined session
    SessionRef { nonce: u64 },
    /// Sessions matching a search
    SearchResults(Vec<SessionDescriptor>),
    /// Serialized profile settings
    ProfileBlob(Vec<u8>),
    /// Stats rows for the requested view
    StatsRows(PlayerStats),
    /// Player storage contents
    StorageData(StorageBlob),
    /// One page of a content enumeration
    ContentPage {
        items: Vec<ContentItem>,
        more: bool,
    },
    /// The player's achievement list
    AchievementList(Vec<Achievement>),
    /// Arbitration registrants after consensus registration
    ArbitrationRoster(Vec<RosterEntry>),
}

// ----------------------------------------------------------------------------
// Service Contract
// ----------------------------------------------------------------------------

/// Result of issuing a request: done on the spot, or pending a later poll
#[derive(Debug, Clone, PartialEq)]
pub enum IssueOutcome {
    /// The platform finished the request synchronously
    Completed {
        code: CompletionCode,
        response: Option<PlatformResponse>,
    },
    /// The request is in flight; poll the handle each tick
    Pending(PlatformHandle),
}

/// Result of polling a pending handle
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// Still in flight
    Pending,
    /// Finished; the handle is dead after this is observed
    Completed {
        code: CompletionCode,
        response: Option<PlatformResponse>,
    },
}

/// The surface the coordinator drives. Implementations must never block:
/// `issue` either finishes synchronously or returns a handle, and `poll`
/// reports current status without waiting.
pub trait PlatformService {
    /// Issue a request to the platform
    fn issue(&mut self, request: PlatformRequest) -> IssueOutcome;

    /// Poll a pending operation for completion
    fn poll(&mut self, handle: PlatformHandle) -> PollStatus;
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_list_is_not_plain_success() {
        assert!(CompletionCode::Success.is_success());
        assert!(!CompletionCode::EndOfList.is_success());
        assert!(!CompletionCode::ServiceError(13).is_success());
    }

    #[test]
    fn test_request_kind_discriminants() {
        let request = PlatformRequest::SessionStart {
            session: SessionName::from("Game"),
        };
        assert_eq!(request.kind(), RequestKind::SessionStart);

        let request = PlatformRequest::ContentEnumerate {
            user: UserIndex::new(0),
            page: 2,
        };
        assert_eq!(request.kind(), RequestKind::ContentEnumerate);
    }
}
