//! Session settings and search descriptors

use serde::{Deserialize, Serialize};

use crate::types::PlayerId;

// ----------------------------------------------------------------------------
// Match Type
// ----------------------------------------------------------------------------

/// Whether a session counts toward ranked standings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// Casual play, no skill tracking
    Standard,
    /// Competitive play with authoritative results
    Ranked,
}

// ----------------------------------------------------------------------------
// Session Settings
// ----------------------------------------------------------------------------

/// Configuration for a session: capacity, visibility, and match rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Number of publicly joinable slots
    pub public_slots: u32,
    /// Number of invite-only slots
    pub private_slots: u32,
    /// Whether the session is advertised to matchmaking searches
    pub advertised: bool,
    /// Whether the session requires consensus registration before start
    pub uses_arbitration: bool,
    /// Whether players may join after the session has started
    pub allow_join_in_progress: bool,
    /// Ranked or standard play
    pub match_type: MatchType,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            public_slots: 8,
            private_slots: 0,
            advertised: true,
            uses_arbitration: false,
            allow_join_in_progress: true,
            match_type: MatchType::Standard,
        }
    }
}

impl SessionSettings {
    /// Total capacity across public and private slots
    pub fn total_slots(&self) -> u32 {
        self.public_slots + self.private_slots
    }

    /// Validate the settings for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.total_slots() == 0 {
            return Err("session must have at least one slot".into());
        }
        if self.match_type == MatchType::Ranked && !self.advertised {
            return Err("ranked sessions must be advertised for matchmaking".into());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Session Descriptor
// ----------------------------------------------------------------------------

/// Description of a remote session, returned by a search and used to join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// The hosting player's online identity
    pub host: PlayerId,
    /// The settings the host created the session with
    pub settings: SessionSettings,
    /// Currently open public slots
    pub open_public_slots: u32,
    /// Currently open private slots
    pub open_private_slots: u32,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(SessionSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let settings = SessionSettings {
            public_slots: 0,
            private_slots: 0,
            ..SessionSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unadvertised_ranked_rejected() {
        let settings = SessionSettings {
            advertised: false,
            match_type: MatchType::Ranked,
            ..SessionSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
