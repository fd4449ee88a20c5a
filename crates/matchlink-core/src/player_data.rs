//! Per-player data model: profile settings, stats, content, achievements,
//! and the opaque storage blob
//!
//! Every entity kind the read-through cache can hold is defined here, along
//! with the tagged payload enum the cache stores. Payloads are serialized to
//! opaque blobs with bincode when they cross the platform boundary.

use serde::{Deserialize, Serialize};

use core::fmt;

// ----------------------------------------------------------------------------
// Versions and Limits
// ----------------------------------------------------------------------------

/// Version stamped into serialized profile settings; bump on layout changes
pub const PROFILE_DATA_VERSION: u32 = 3;

/// Version stamped into player storage blobs
pub const STORAGE_DATA_VERSION: u32 = 1;

/// Maximum size of a serialized profile blob
pub const PROFILE_BLOB_LIMIT: usize = 3000;

/// Maximum size of a single player storage file
pub const MAX_STORAGE_FILE_SIZE: usize = 8 * 1024;

// ----------------------------------------------------------------------------
// Entity Kinds and Cache Status
// ----------------------------------------------------------------------------

/// The kinds of per-player data the read-through cache tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Game-visible profile settings
    Profile,
    /// Leaderboard / stats rows
    Stats,
    /// Downloadable content owned by the player
    ContentList,
    /// Achievement list
    Achievements,
    /// Opaque save-data blob
    Storage,
}

impl EntityKind {
    /// Every cacheable kind, for whole-user invalidation sweeps
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Profile,
        EntityKind::Stats,
        EntityKind::ContentList,
        EntityKind::Achievements,
        EntityKind::Storage,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Profile => "profile",
            EntityKind::Stats => "stats",
            EntityKind::ContentList => "content",
            EntityKind::Achievements => "achievements",
            EntityKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// Async status of a cached entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    /// Never fetched (or invalidated since)
    NotStarted,
    /// A read is in flight
    Reading,
    /// A write is in flight
    Writing,
    /// Fetched and usable
    Done,
    /// Last operation failed; payload holds defaults
    Failed,
}

impl CacheStatus {
    /// Whether a platform operation is currently outstanding for this entry
    pub fn is_in_flight(&self) -> bool {
        matches!(self, CacheStatus::Reading | CacheStatus::Writing)
    }
}

// ----------------------------------------------------------------------------
// Profile Settings
// ----------------------------------------------------------------------------

/// Identifier of a single profile setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettingId(pub u32);

/// Well-known setting ids authored by the game layer
pub mod setting_ids {
    use super::SettingId;

    pub const CONTROLLER_VIBRATION: SettingId = SettingId(1);
    pub const INVERT_Y_AXIS: SettingId = SettingId(2);
    pub const AUTO_AIM: SettingId = SettingId(3);
    pub const VOICE_MUTED: SettingId = SettingId(4);
    pub const PREFERRED_COLOR: SettingId = SettingId(5);
}

/// Value of a single profile setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Text(String),
    Blob(Vec<u8>),
}

/// One profile setting: id plus typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSetting {
    pub id: SettingId,
    pub value: SettingValue,
}

/// A player's profile settings, versioned for staleness detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Layout version this set was written with
    pub version: u32,
    /// The settings themselves
    pub settings: Vec<ProfileSetting>,
}

impl ProfileSettings {
    /// An empty set at the current version, used as the accumulator for
    /// multi-source reads
    pub fn empty() -> Self {
        Self {
            version: PROFILE_DATA_VERSION,
            settings: Vec::new(),
        }
    }

    /// The built-in defaults every player starts from, and the fallback
    /// when a read fails or returns incompatible data
    pub fn defaults() -> Self {
        Self {
            version: PROFILE_DATA_VERSION,
            settings: vec![
                ProfileSetting {
                    id: setting_ids::CONTROLLER_VIBRATION,
                    value: SettingValue::Int32(1),
                },
                ProfileSetting {
                    id: setting_ids::INVERT_Y_AXIS,
                    value: SettingValue::Int32(0),
                },
                ProfileSetting {
                    id: setting_ids::AUTO_AIM,
                    value: SettingValue::Int32(1),
                },
                ProfileSetting {
                    id: setting_ids::VOICE_MUTED,
                    value: SettingValue::Int32(0),
                },
            ],
        }
    }

    /// Look up a setting by id
    pub fn get(&self, id: SettingId) -> Option<&SettingValue> {
        self.settings
            .iter()
            .find(|setting| setting.id == id)
            .map(|setting| &setting.value)
    }

    /// Insert or replace a setting
    pub fn upsert(&mut self, setting: ProfileSetting) {
        if let Some(existing) = self
            .settings
            .iter_mut()
            .find(|candidate| candidate.id == setting.id)
        {
            existing.value = setting.value;
        } else {
            self.settings.push(setting);
        }
    }

    /// Whether every requested id is present in this set
    pub fn covers(&self, ids: &[SettingId]) -> bool {
        ids.iter().all(|id| self.get(*id).is_some())
    }

    /// The subset of `ids` this set does not contain
    pub fn missing_from(&self, ids: &[SettingId]) -> Vec<SettingId> {
        ids.iter()
            .copied()
            .filter(|id| self.get(*id).is_none())
            .collect()
    }

    /// Merge settings from `other` that this set does not already have
    pub fn merge_missing(&mut self, other: ProfileSettings) {
        for setting in other.settings {
            if self.get(setting.id).is_none() {
                self.settings.push(setting);
            }
        }
    }

    /// Serialize to the opaque blob representation the platform stores
    pub fn to_blob(&self) -> Result<Vec<u8>, crate::OnlineError> {
        let blob = bincode::serialize(self)
            .map_err(|err| crate::OnlineError::codec_error(err.to_string()))?;
        if blob.len() > PROFILE_BLOB_LIMIT {
            return Err(crate::OnlineError::codec_error(format!(
                "profile blob is {} bytes, limit is {}",
                blob.len(),
                PROFILE_BLOB_LIMIT
            )));
        }
        Ok(blob)
    }

    /// Deserialize from the opaque blob representation
    pub fn from_blob(blob: &[u8]) -> Result<Self, crate::OnlineError> {
        bincode::deserialize(blob).map_err(|err| crate::OnlineError::codec_error(err.to_string()))
    }
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

// ----------------------------------------------------------------------------
// Stats
// ----------------------------------------------------------------------------

/// A single stat column value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatValue {
    pub column_id: u32,
    pub value: i64,
}

/// A player's rows from one stats view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// The view (leaderboard) these values belong to
    pub view_id: u32,
    /// Column values, in view order
    pub values: Vec<StatValue>,
}

impl PlayerStats {
    /// An empty stats set for a view, the fallback for failed reads
    pub fn empty(view_id: u32) -> Self {
        Self {
            view_id,
            values: Vec::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// Content and Achievements
// ----------------------------------------------------------------------------

/// One installed/downloadable content package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u32,
    pub name: String,
    pub size_bytes: u64,
}

/// One achievement with its unlock state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: u32,
    pub title: String,
    pub unlocked: bool,
}

// ----------------------------------------------------------------------------
// Storage Blob
// ----------------------------------------------------------------------------

/// Opaque per-player save data, versioned for staleness detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBlob {
    /// Layout version this blob was written with
    pub version: u32,
    /// The raw save data
    pub data: Vec<u8>,
}

impl StorageBlob {
    /// An empty blob at the current version, the reset target for
    /// incompatible or failed reads
    pub fn empty() -> Self {
        Self {
            version: STORAGE_DATA_VERSION,
            data: Vec::new(),
        }
    }

    /// Validate the blob against the per-file size cap
    pub fn validate(&self) -> Result<(), String> {
        if self.data.len() > MAX_STORAGE_FILE_SIZE {
            return Err(format!(
                "storage blob is {} bytes, limit is {}",
                self.data.len(),
                MAX_STORAGE_FILE_SIZE
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Entity Payload
// ----------------------------------------------------------------------------

/// The payload a cached entry holds, one variant per entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityPayload {
    /// No data yet
    Empty,
    Profile(ProfileSettings),
    Stats(PlayerStats),
    Content(Vec<ContentItem>),
    Achievements(Vec<Achievement>),
    Storage(StorageBlob),
}

impl EntityPayload {
    /// The built-in default payload for a kind, used when a read fails or
    /// returns incompatible data
    pub fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Profile => EntityPayload::Profile(ProfileSettings::defaults()),
            EntityKind::Stats => EntityPayload::Stats(PlayerStats::empty(0)),
            EntityKind::ContentList => EntityPayload::Content(Vec::new()),
            EntityKind::Achievements => EntityPayload::Achievements(Vec::new()),
            EntityKind::Storage => EntityPayload::Storage(StorageBlob::empty()),
        }
    }

    /// The kind this payload belongs to, if it holds data
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            EntityPayload::Empty => None,
            EntityPayload::Profile(_) => Some(EntityKind::Profile),
            EntityPayload::Stats(_) => Some(EntityKind::Stats),
            EntityPayload::Content(_) => Some(EntityKind::ContentList),
            EntityPayload::Achievements(_) => Some(EntityKind::Achievements),
            EntityPayload::Storage(_) => Some(EntityKind::Storage),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_known_ids() {
        let defaults = ProfileSettings::defaults();
        assert!(defaults.covers(&[
            setting_ids::CONTROLLER_VIBRATION,
            setting_ids::INVERT_Y_AXIS,
        ]));
        assert!(!defaults.covers(&[setting_ids::PREFERRED_COLOR]));
    }

    #[test]
    fn test_missing_from_reports_gaps() {
        let defaults = ProfileSettings::defaults();
        let missing = defaults.missing_from(&[
            setting_ids::AUTO_AIM,
            setting_ids::PREFERRED_COLOR,
        ]);
        assert_eq!(missing, vec![setting_ids::PREFERRED_COLOR]);
    }

    #[test]
    fn test_merge_missing_does_not_overwrite() {
        let mut base = ProfileSettings::defaults();
        let mut extra = ProfileSettings::defaults();
        extra.upsert(ProfileSetting {
            id: setting_ids::CONTROLLER_VIBRATION,
            value: SettingValue::Int32(0),
        });
        extra.upsert(ProfileSetting {
            id: setting_ids::PREFERRED_COLOR,
            value: SettingValue::Int32(7),
        });

        base.merge_missing(extra);

        // Existing value wins, missing value is adopted
        assert_eq!(
            base.get(setting_ids::CONTROLLER_VIBRATION),
            Some(&SettingValue::Int32(1))
        );
        assert_eq!(
            base.get(setting_ids::PREFERRED_COLOR),
            Some(&SettingValue::Int32(7))
        );
    }

    #[test]
    fn test_blob_round_trip_preserves_version() {
        let settings = ProfileSettings::defaults();
        let blob = settings.to_blob().unwrap();
        assert!(blob.len() <= PROFILE_BLOB_LIMIT);
        let decoded = ProfileSettings::from_blob(&blob).unwrap();
        assert_eq!(decoded.version, PROFILE_DATA_VERSION);
        assert_eq!(decoded, settings);
    }

    #[test]
    fn test_oversized_storage_blob_rejected() {
        let blob = StorageBlob {
            version: STORAGE_DATA_VERSION,
            data: vec![0u8; MAX_STORAGE_FILE_SIZE + 1],
        };
        assert!(blob.validate().is_err());
    }

    #[test]
    fn test_default_payload_matches_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityPayload::default_for(kind).kind(), Some(kind));
        }
    }
}
