//! In-flight asynchronous tasks
//!
//! An [`AsyncTask`] tracks one outstanding platform operation from issue to
//! completion: accumulated elapsed time, the pending handle, and a
//! [`TaskKind`] payload owning any request-specific state. Multi-step
//! operations (the two-scope profile read, paged content enumeration) keep
//! their intermediate state inside the payload and are re-armed with a fresh
//! handle between steps.

use core::time::Duration;

use matchlink_core::{
    CompletionCode, PlatformHandle, PlatformResponse, PlatformService, PollStatus,
    ProfileSettings, SessionName, SessionSettings, TaskId, UserIndex,
};
use matchlink_core::player_data::{ContentItem, SettingId, StorageBlob};

// ----------------------------------------------------------------------------
// Task Kinds
// ----------------------------------------------------------------------------

/// Step of a two-scope profile read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileReadStep {
    /// Reading the title-authored defaults blob
    TitleDefaults,
    /// Reading the ids the defaults blob did not cover
    Remaining,
}

/// Per-operation payload carried by a task. Everything a completion needs is
/// owned here, so no state outlives the task or is shared between calls.
#[derive(Debug, Clone)]
pub enum TaskKind {
    SessionCreate {
        session: SessionName,
    },
    SessionJoin {
        session: SessionName,
    },
    SessionStart {
        session: SessionName,
    },
    SessionEnd {
        session: SessionName,
    },
    SessionDestroy {
        session: SessionName,
    },
    SessionModify {
        session: SessionName,
        /// Settings to restore if the platform round trip fails
        previous: SessionSettings,
    },
    ArbitrationRegister {
        session: SessionName,
    },
    Search,
    ProfileRead {
        user: UserIndex,
        step: ProfileReadStep,
        requested: Vec<SettingId>,
        /// Settings accumulated so far across steps
        partial: ProfileSettings,
    },
    ProfileWrite {
        user: UserIndex,
        /// The settings being written, cached on success
        pending: ProfileSettings,
    },
    StatsRead {
        user: UserIndex,
        view_id: u32,
    },
    StatsWrite {
        user: UserIndex,
        /// The stats being written, cached on success
        pending: matchlink_core::PlayerStats,
    },
    StorageRead {
        user: UserIndex,
    },
    StorageWrite {
        user: UserIndex,
        /// The blob being written, cached on success
        pending: StorageBlob,
    },
    ContentEnumerate {
        user: UserIndex,
        /// Next page to request if the current one reports more data
        next_page: u32,
        /// Items accumulated across pages
        items: Vec<ContentItem>,
    },
    AchievementsRead {
        user: UserIndex,
    },
}

impl TaskKind {
    /// Human-readable operation name for diagnostics
    pub fn op_name(&self) -> &'static str {
        match self {
            TaskKind::SessionCreate { .. } => "session-create",
            TaskKind::SessionJoin { .. } => "session-join",
            TaskKind::SessionStart { .. } => "session-start",
            TaskKind::SessionEnd { .. } => "session-end",
            TaskKind::SessionDestroy { .. } => "session-destroy",
            TaskKind::SessionModify { .. } => "session-modify",
            TaskKind::ArbitrationRegister { .. } => "arbitration-register",
            TaskKind::Search => "session-search",
            TaskKind::ProfileRead { .. } => "profile-read",
            TaskKind::ProfileWrite { .. } => "profile-write",
            TaskKind::StatsRead { .. } => "stats-read",
            TaskKind::StatsWrite { .. } => "stats-write",
            TaskKind::StorageRead { .. } => "storage-read",
            TaskKind::StorageWrite { .. } => "storage-write",
            TaskKind::ContentEnumerate { .. } => "content-enumerate",
            TaskKind::AchievementsRead { .. } => "achievements-read",
        }
    }
}

// ----------------------------------------------------------------------------
// Async Task
// ----------------------------------------------------------------------------

/// One outstanding platform operation, owned by the task queue
#[derive(Debug)]
pub struct AsyncTask {
    id: TaskId,
    elapsed: Duration,
    handle: PlatformHandle,
    kind: TaskKind,
}

impl AsyncTask {
    /// Create a task for a pending platform operation
    pub fn new(id: TaskId, handle: PlatformHandle, kind: TaskKind) -> Self {
        Self {
            id,
            elapsed: Duration::ZERO,
            handle,
            kind,
        }
    }

    /// The queue-assigned task id
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Diagnostic name of the operation
    pub fn op_name(&self) -> &'static str {
        self.kind.op_name()
    }

    /// Total time this task has been in flight
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The operation payload
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Consume the task, yielding its payload
    pub fn into_kind(self) -> TaskKind {
        self.kind
    }

    /// Accumulate elapsed time; never fails
    pub fn update_elapsed(&mut self, delta: Duration) {
        self.elapsed += delta;
    }

    /// Poll the platform for completion. Returns the terminal code and
    /// response once the handle stops reporting pending.
    pub fn poll<P: PlatformService>(
        &self,
        platform: &mut P,
    ) -> Option<(CompletionCode, Option<PlatformResponse>)> {
        match platform.poll(self.handle) {
            PollStatus::Pending => None,
            PollStatus::Completed { code, response } => Some((code, response)),
        }
    }

    /// Whether this task has exceeded the orphan ceiling
    pub fn is_orphaned(&self, ceiling: Option<Duration>) -> bool {
        match ceiling {
            Some(ceiling) => self.elapsed > ceiling,
            None => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
