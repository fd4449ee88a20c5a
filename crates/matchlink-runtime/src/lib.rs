//! Matchlink Runtime Engine
//!
//! This crate contains the coordinator engine for matchlink:
//! - `OnlineCoordinator`: the facade gameplay code talks to, driven by one
//!   `tick` per frame
//! - `TaskQueue` and `AsyncTask`: ownership and polling of in-flight
//!   platform operations
//! - `SessionRegistry`: single-session-per-name lifecycle tracking
//! - `PlayerDataCache`: read-through caching of per-player data
//!
//! `matchlink-core` provides the stable type definitions; this is the
//! engine that gives them behavior.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod queue;
pub mod sessions;
pub mod task;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use cache::{CachedEntry, PlayerDataCache, ReadDisposition};
pub use config::CoordinatorConfig;
pub use coordinator::{OnlineCoordinator, OpDisposition};
pub use queue::{FinishedTask, TaskQueue, TaskVerdict};
pub use sessions::{ArbitrationRegistrant, Session, SessionRegistry, SessionState};
pub use task::{AsyncTask, ProfileReadStep, TaskKind};

// Re-export core types for convenience
pub use matchlink_core::{
    CacheStatus, CompletionCode, EntityKind, EntityPayload, EventKind, MatchType, OnlineError,
    OnlineEvent, OnlineResult, PlatformService, PlayerId, PlayerStats, ProfileSettings,
    SessionDescriptor, SessionName, SessionSettings, StorageBlob, UserIndex,
};
