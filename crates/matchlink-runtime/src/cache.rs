//! Read-through cache for per-player data
//!
//! One entry per `(user, entity kind)` pair, each with a tri-state async
//! status. The cache serializes access per key: at most one read or write is
//! in flight at a time, a completed read is served from memory until
//! invalidated, and failed or incompatible reads fall back to built-in
//! defaults so callers always end up with a usable payload.

use std::collections::HashMap;

use tracing::debug;

use matchlink_core::player_data::{PROFILE_DATA_VERSION, STORAGE_DATA_VERSION};
use matchlink_core::{
    CacheError, CacheStatus, EntityKind, EntityPayload, OnlineResult, UserIndex,
};

// ----------------------------------------------------------------------------
// Cached Entries
// ----------------------------------------------------------------------------

/// One cached entity and its async status
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub status: CacheStatus,
    pub payload: EntityPayload,
    /// Layout version of the payload, for staleness detection
    pub version: u32,
}

impl CachedEntry {
    fn fresh() -> Self {
        Self {
            status: CacheStatus::NotStarted,
            payload: EntityPayload::Empty,
            version: 0,
        }
    }
}

/// What a read request should do, decided against the current entry state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDisposition {
    /// A usable payload is cached; serve it without a platform round trip
    Cached,
    /// A read is already in flight; its completion will serve this caller
    AlreadyInFlight,
    /// No usable data; the entry is now `Reading` and a fetch must be issued
    Fetch,
}

/// The expected layout version for a kind's payload
fn current_version(kind: EntityKind) -> u32 {
    match kind {
        EntityKind::Profile => PROFILE_DATA_VERSION,
        EntityKind::Storage => STORAGE_DATA_VERSION,
        EntityKind::Stats | EntityKind::ContentList | EntityKind::Achievements => 0,
    }
}

// ----------------------------------------------------------------------------
// Player Data Cache
// ----------------------------------------------------------------------------

/// Per-player cached entities keyed by `(user, kind)`
#[derive(Debug, Default)]
pub struct PlayerDataCache {
    entries: HashMap<(UserIndex, EntityKind), CachedEntry>,
}

impl PlayerDataCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status for a key; absent entries are `NotStarted`
    pub fn status(&self, user: UserIndex, kind: EntityKind) -> CacheStatus {
        self.entries
            .get(&(user, kind))
            .map_or(CacheStatus::NotStarted, |entry| entry.status)
    }

    /// The cached entry for a key, if one has been touched
    pub fn get(&self, user: UserIndex, kind: EntityKind) -> Option<&CachedEntry> {
        self.entries.get(&(user, kind))
    }

    /// The cached payload for a key, if any data is held
    pub fn payload(&self, user: UserIndex, kind: EntityKind) -> Option<&EntityPayload> {
        self.entries
            .get(&(user, kind))
            .map(|entry| &entry.payload)
            .filter(|payload| !matches!(payload, EntityPayload::Empty))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Decide how a read request proceeds. A `Done` entry is served from
    /// cache, a `Reading` entry short-circuits to the in-flight operation,
    /// and anything else transitions to `Reading` for a fresh fetch. A read
    /// during an in-flight write is rejected.
    pub fn begin_read(
        &mut self,
        user: UserIndex,
        kind: EntityKind,
    ) -> OnlineResult<ReadDisposition> {
        let entry = self.entries.entry((user, kind)).or_insert_with(CachedEntry::fresh);
        match entry.status {
            CacheStatus::Done => Ok(ReadDisposition::Cached),
            CacheStatus::Reading => Ok(ReadDisposition::AlreadyInFlight),
            CacheStatus::Writing => Err(CacheError::WriteInFlight { user, kind }.into()),
            CacheStatus::NotStarted | CacheStatus::Failed => {
                entry.status = CacheStatus::Reading;
                Ok(ReadDisposition::Fetch)
            }
        }
    }

    /// Store a successfully read payload
    pub fn finish_read_success(
        &mut self,
        user: UserIndex,
        kind: EntityKind,
        payload: EntityPayload,
        version: u32,
    ) {
        let entry = self.entries.entry((user, kind)).or_insert_with(CachedEntry::fresh);
        entry.status = CacheStatus::Done;
        entry.payload = payload;
        entry.version = version;
    }

    /// The platform returned data written with an incompatible layout:
    /// discard it and accept built-in defaults as the final payload. The
    /// entry is `Done` - stale data is never refetched until invalidation.
    pub fn finish_read_version_mismatch(&mut self, user: UserIndex, kind: EntityKind) {
        debug!(%user, %kind, "discarding incompatible cached data, resetting to defaults");
        let entry = self.entries.entry((user, kind)).or_insert_with(CachedEntry::fresh);
        entry.status = CacheStatus::Done;
        entry.payload = EntityPayload::default_for(kind);
        entry.version = current_version(kind);
    }

    /// The read failed: fall back to defaults so callers hold a usable
    /// payload, but leave the entry `Failed` so a later read refetches
    pub fn finish_read_failed(&mut self, user: UserIndex, kind: EntityKind) {
        let entry = self.entries.entry((user, kind)).or_insert_with(CachedEntry::fresh);
        entry.status = CacheStatus::Failed;
        entry.payload = EntityPayload::default_for(kind);
        entry.version = current_version(kind);
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Transition to `Writing`; rejects when any operation is in flight
    pub fn begin_write(&mut self, user: UserIndex, kind: EntityKind) -> OnlineResult<()> {
        let entry = self.entries.entry((user, kind)).or_insert_with(CachedEntry::fresh);
        match entry.status {
            CacheStatus::Reading => Err(CacheError::ReadInFlight { user, kind }.into()),
            CacheStatus::Writing => Err(CacheError::WriteInFlight { user, kind }.into()),
            CacheStatus::NotStarted | CacheStatus::Done | CacheStatus::Failed => {
                entry.status = CacheStatus::Writing;
                Ok(())
            }
        }
    }

    /// The write landed: the written payload becomes the cached copy
    pub fn finish_write_success(
        &mut self,
        user: UserIndex,
        kind: EntityKind,
        payload: EntityPayload,
        version: u32,
    ) {
        let entry = self.entries.entry((user, kind)).or_insert_with(CachedEntry::fresh);
        entry.status = CacheStatus::Done;
        entry.payload = payload;
        entry.version = version;
    }

    /// The write failed: keep whatever payload was cached, mark `Failed`
    pub fn finish_write_failed(&mut self, user: UserIndex, kind: EntityKind) {
        let entry = self.entries.entry((user, kind)).or_insert_with(CachedEntry::fresh);
        entry.status = CacheStatus::Failed;
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Drop every cached entity for a user, forcing the next access to
    /// re-read. Called on sign-out / sign-in change.
    pub fn invalidate_user(&mut self, user: UserIndex) {
        debug!(%user, "invalidating all cached entities");
        self.entries.retain(|(owner, _), _| *owner != user);
    }

    /// Number of entries that have been touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries have been touched
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
