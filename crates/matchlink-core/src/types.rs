//! Core identifier types for the matchlink coordinator
//!
//! This module defines the fundamental identifiers used throughout the
//! coordinator, using newtype patterns for semantic validation and type safety.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum number of locally signed-in players a single host supports
pub const MAX_LOCAL_USERS: usize = 4;

// ----------------------------------------------------------------------------
// User Index
// ----------------------------------------------------------------------------

/// Index of a locally signed-in player (controller slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserIndex(u32);

impl UserIndex {
    /// Create a new user index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw slot number
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether this index falls inside the local player range
    pub fn is_local(&self) -> bool {
        (self.0 as usize) < MAX_LOCAL_USERS
    }
}

impl fmt::Display for UserIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Player Identifier
// ----------------------------------------------------------------------------

/// Online identity of a player, issued by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Create a new PlayerId from its raw value
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.to_be_bytes()))
    }
}

impl FromStr for PlayerId {
    type Err = crate::OnlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(clean)
            .map_err(|_| crate::OnlineError::codec_error("invalid hex in PlayerId"))?;
        if bytes.len() != 8 {
            return Err(crate::OnlineError::codec_error(
                "PlayerId must be exactly 8 hex-encoded bytes",
            ));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(Self(u64::from_be_bytes(raw)))
    }
}

// ----------------------------------------------------------------------------
// Session Name
// ----------------------------------------------------------------------------

/// Unique key identifying a session in the registry (e.g. "Game", "Party")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionName(String);

impl SessionName {
    /// Create a new session name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for SessionName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// ----------------------------------------------------------------------------
// Task Identifier
// ----------------------------------------------------------------------------

/// Identifier assigned to an in-flight task by the task queue, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Create a task id from its raw counter value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw counter value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
