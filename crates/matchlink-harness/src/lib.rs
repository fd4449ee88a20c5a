//! Scripted in-memory platform service
//!
//! [`ScriptedPlatform`] implements the `PlatformService` contract with fully
//! deterministic behavior: tests decide per request kind whether operations
//! complete synchronously, after a fixed number of polls, or only when
//! released by hand. Every issued request is recorded so tests can assert
//! how many round trips actually happened.

use std::collections::HashMap;

use tracing::warn;

use matchlink_core::{
    Achievement, CompletionCode, ContentItem, IssueOutcome, PlatformHandle, PlatformRequest,
    PlatformResponse, PlatformService, PlayerStats, PollStatus, ProfileScope, RequestKind,
    RosterEntry, SessionDescriptor, StorageBlob,
};

// ----------------------------------------------------------------------------
// Scripted Behavior
// ----------------------------------------------------------------------------

/// How the platform services a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Stay pending until released with `complete` / `complete_next`
    Manual,
    /// Complete synchronously at issue time with the given code
    Immediate(CompletionCode),
    /// Complete with the given code on the Nth poll of the handle
    AfterPolls(u32, CompletionCode),
}

struct PendingOp {
    request: PlatformRequest,
    /// Remaining polls before auto-completion; `None` for manual ops
    polls_remaining: Option<u32>,
    code_when_due: CompletionCode,
    resolved: Option<(CompletionCode, Option<PlatformResponse>)>,
}

// ----------------------------------------------------------------------------
// Canned Response Data
// ----------------------------------------------------------------------------

/// Data the platform hands back for successful reads
#[derive(Debug, Clone, Default)]
pub struct CannedData {
    /// Blob served for title-defaults profile reads
    pub title_profile_blob: Option<Vec<u8>>,
    /// Blob served for platform-store profile reads
    pub platform_profile_blob: Option<Vec<u8>>,
    /// Stats rows served for stats reads
    pub stats: Option<PlayerStats>,
    /// Storage contents served for storage reads
    pub storage: Option<StorageBlob>,
    /// Content pages, one entry per page
    pub content_pages: Vec<Vec<ContentItem>>,
    /// Achievement list
    pub achievements: Vec<Achievement>,
    /// Matchmaking search results
    pub search_results: Vec<SessionDescriptor>,
    /// Arbitration roster
    pub roster: Vec<RosterEntry>,
}

// ----------------------------------------------------------------------------
// Scripted Platform
// ----------------------------------------------------------------------------

/// Deterministic `PlatformService` implementation for tests and demos
pub struct ScriptedPlatform {
    next_handle: u64,
    next_nonce: u64,
    default_behavior: Behavior,
    behaviors: HashMap<RequestKind, Behavior>,
    /// Insertion-ordered so `complete_next` releases the oldest op first
    pending: Vec<(PlatformHandle, PendingOp)>,
    issued: Vec<PlatformRequest>,
    canned: CannedData,
}

impl ScriptedPlatform {
    /// Create a platform where every request stays pending until released
    pub fn new() -> Self {
        Self::with_default_behavior(Behavior::Manual)
    }

    /// Create a platform where every request completes successfully after
    /// being polled `polls` times
    pub fn auto(polls: u32) -> Self {
        Self::with_default_behavior(Behavior::AfterPolls(polls, CompletionCode::Success))
    }

    fn with_default_behavior(default_behavior: Behavior) -> Self {
        Self {
            next_handle: 1,
            next_nonce: 1000,
            default_behavior,
            behaviors: HashMap::new(),
            pending: Vec::new(),
            issued: Vec::new(),
            canned: CannedData::default(),
        }
    }

    /// Override the behavior for one request kind
    pub fn set_behavior(&mut self, kind: RequestKind, behavior: Behavior) {
        self.behaviors.insert(kind, behavior);
    }

    /// Mutable access to the canned response data
    pub fn canned_mut(&mut self) -> &mut CannedData {
        &mut self.canned
    }

    // ------------------------------------------------------------------
    // Manual completion
    // ------------------------------------------------------------------

    /// Resolve a pending operation. When `response` is `None` and the code
    /// is a success, the canned response for the request is substituted.
    /// Returns false if the handle is unknown or already resolved.
    pub fn complete(
        &mut self,
        handle: PlatformHandle,
        code: CompletionCode,
        response: Option<PlatformResponse>,
    ) -> bool {
        let next_nonce = &mut self.next_nonce;
        let canned = &self.canned;
        match self
            .pending
            .iter_mut()
            .find(|(pending_handle, op)| *pending_handle == handle && op.resolved.is_none())
        {
            Some((_, op)) => {
                let resolution = match response {
                    Some(explicit) => (code, Some(explicit)),
                    None => resolve(canned, next_nonce, &op.request, code),
                };
                op.resolved = Some(resolution);
                true
            }
            None => false,
        }
    }

    /// Resolve the oldest unresolved operation with the given code
    pub fn complete_next(&mut self, code: CompletionCode) -> Option<PlatformHandle> {
        let handle = self
            .pending
            .iter()
            .find(|(_, op)| op.resolved.is_none())
            .map(|(handle, _)| *handle)?;
        self.complete(handle, code, None);
        Some(handle)
    }

    /// Resolve every unresolved operation with the given code
    pub fn complete_all(&mut self, code: CompletionCode) {
        let handles: Vec<PlatformHandle> = self
            .pending
            .iter()
            .filter(|(_, op)| op.resolved.is_none())
            .map(|(handle, _)| *handle)
            .collect();
        for handle in handles {
            self.complete(handle, code, None);
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Number of operations still awaiting resolution
    pub fn unresolved_count(&self) -> usize {
        self.pending
            .iter()
            .filter(|(_, op)| op.resolved.is_none())
            .count()
    }

    /// Handles of operations still awaiting resolution, in issue order
    pub fn unresolved_handles(&self) -> Vec<PlatformHandle> {
        self.pending
            .iter()
            .filter(|(_, op)| op.resolved.is_none())
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Every request issued since construction, in order
    pub fn issued_requests(&self) -> &[PlatformRequest] {
        &self.issued
    }

    /// How many requests of one kind have been issued
    pub fn request_count(&self, kind: RequestKind) -> usize {
        self.issued
            .iter()
            .filter(|request| request.kind() == kind)
            .count()
    }
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Response Resolution
// ----------------------------------------------------------------------------

/// Build the (code, response) pair for a request. Content enumeration past
/// the last page turns a success into `EndOfList`; failures carry no data.
fn resolve(
    canned: &CannedData,
    next_nonce: &mut u64,
    request: &PlatformRequest,
    code: CompletionCode,
) -> (CompletionCode, Option<PlatformResponse>) {
    if !code.is_success() {
        return (code, None);
    }
    match request {
        PlatformRequest::SessionCreate { .. } | PlatformRequest::SessionJoin { .. } => {
            *next_nonce += 1;
            (
                code,
                Some(PlatformResponse::SessionRef { nonce: *next_nonce }),
            )
        }
        PlatformRequest::SessionSearch { max_results, .. } => {
            let mut results = canned.search_results.clone();
            results.truncate(*max_results as usize);
            (code, Some(PlatformResponse::SearchResults(results)))
        }
        PlatformRequest::ProfileRead { scope, .. } => {
            let blob = match scope {
                ProfileScope::TitleDefaults => canned.title_profile_blob.clone(),
                ProfileScope::Remaining => canned.platform_profile_blob.clone(),
            };
            (code, blob.map(PlatformResponse::ProfileBlob))
        }
        PlatformRequest::StatsRead { view_id, .. } => {
            let stats = canned
                .stats
                .clone()
                .unwrap_or_else(|| PlayerStats::empty(*view_id));
            (code, Some(PlatformResponse::StatsRows(stats)))
        }
        PlatformRequest::StorageRead { .. } => {
            let blob = canned.storage.clone().unwrap_or_else(StorageBlob::empty);
            (code, Some(PlatformResponse::StorageData(blob)))
        }
        PlatformRequest::ContentEnumerate { page, .. } => {
            let page = *page as usize;
            match canned.content_pages.get(page) {
                Some(items) => (
                    code,
                    Some(PlatformResponse::ContentPage {
                        items: items.clone(),
                        more: page + 1 < canned.content_pages.len(),
                    }),
                ),
                None => (CompletionCode::EndOfList, None),
            }
        }
        PlatformRequest::AchievementsRead { .. } => (
            code,
            Some(PlatformResponse::AchievementList(
                canned.achievements.clone(),
            )),
        ),
        PlatformRequest::ArbitrationRegister { .. } => (
            code,
            Some(PlatformResponse::ArbitrationRoster(canned.roster.clone())),
        ),
        // Writes and lifecycle transitions carry no response data
        PlatformRequest::SessionStart { .. }
        | PlatformRequest::SessionEnd { .. }
        | PlatformRequest::SessionDelete { .. }
        | PlatformRequest::SessionModify { .. }
        | PlatformRequest::ProfileWrite { .. }
        | PlatformRequest::StatsWrite { .. }
        | PlatformRequest::StorageWrite { .. } => (code, None),
    }
}

// ----------------------------------------------------------------------------
// PlatformService Implementation
// ----------------------------------------------------------------------------

impl PlatformService for ScriptedPlatform {
    fn issue(&mut self, request: PlatformRequest) -> IssueOutcome {
        self.issued.push(request.clone());
        let behavior = self
            .behaviors
            .get(&request.kind())
            .copied()
            .unwrap_or(self.default_behavior);

        match behavior {
            Behavior::Immediate(code) => {
                let (code, response) =
                    resolve(&self.canned, &mut self.next_nonce, &request, code);
                IssueOutcome::Completed { code, response }
            }
            Behavior::Manual => {
                let handle = PlatformHandle(self.next_handle);
                self.next_handle += 1;
                self.pending.push((
                    handle,
                    PendingOp {
                        request,
                        polls_remaining: None,
                        code_when_due: CompletionCode::Success,
                        resolved: None,
                    },
                ));
                IssueOutcome::Pending(handle)
            }
            Behavior::AfterPolls(polls, code) => {
                let handle = PlatformHandle(self.next_handle);
                self.next_handle += 1;
                self.pending.push((
                    handle,
                    PendingOp {
                        request,
                        polls_remaining: Some(polls),
                        code_when_due: code,
                        resolved: None,
                    },
                ));
                IssueOutcome::Pending(handle)
            }
        }
    }

    fn poll(&mut self, handle: PlatformHandle) -> PollStatus {
        let position = match self
            .pending
            .iter()
            .position(|(pending_handle, _)| *pending_handle == handle)
        {
            Some(position) => position,
            None => {
                warn!(%handle, "poll on unknown handle");
                return PollStatus::Completed {
                    code: CompletionCode::NotFound,
                    response: None,
                };
            }
        };

        if let Some((code, response)) = self.pending[position].1.resolved.clone() {
            self.pending.remove(position);
            return PollStatus::Completed { code, response };
        }

        let due = match self.pending[position].1.polls_remaining.as_mut() {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };

        if due {
            let (_, op) = self.pending.remove(position);
            let (code, response) =
                resolve(&self.canned, &mut self.next_nonce, &op.request, op.code_when_due);
            return PollStatus::Completed { code, response };
        }

        PollStatus::Pending
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
