//! # Mission Telemetry Recorder - Domain Model
//!
//! Core domain entities, value objects, and enums for mission telemetry
//! capture. These types are the single source of truth across all layers:
//! ingest pipeline, persistence, and export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod geometry;

pub use geometry::{parse_polyline, parse_position_3d, project_4326_to_3857, Position};

// =============================================================================
// ENUMS
// =============================================================================

/// Faction a soldier or vehicle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    West,
    East,
    Independent,
    Civilian,
    Empty,
    Unknown,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::West => "WEST",
            Self::East => "EAST",
            Self::Independent => "GUER",
            Self::Civilian => "CIV",
            Self::Empty => "EMPTY",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a side string as the host emits it. Unrecognized values map to
    /// `Unknown` rather than failing the row.
    pub fn from_host(s: &str) -> Self {
        match s {
            "WEST" | "BLUFOR" => Self::West,
            "EAST" | "OPFOR" => Self::East,
            "GUER" | "IND" | "INDEPENDENT" => Self::Independent,
            "CIV" | "CIVILIAN" => Self::Civilian,
            "EMPTY" => Self::Empty,
            _ => Self::Unknown,
        }
    }
}

/// Per-frame life state of a soldier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lifestate {
    Alive,
    Unconscious,
    Dead,
}

impl Lifestate {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Alive => 0,
            Self::Unconscious => 1,
            Self::Dead => 2,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self, DomainError> {
        match v {
            0 => Ok(Self::Alive),
            1 => Ok(Self::Unconscious),
            2 => Ok(Self::Dead),
            other => Err(DomainError::InvalidLifestate(other)),
        }
    }
}

/// Radio hardware class carried by a soldier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioType {
    /// Short-wave handheld
    SW,
    /// Long-range manpack
    LR,
}

impl RadioType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SW => "SW",
            Self::LR => "LR",
        }
    }

    pub fn from_host(s: &str) -> Result<Self, DomainError> {
        match s {
            "SW" => Ok(Self::SW),
            "LR" => Ok(Self::LR),
            other => Err(DomainError::InvalidRadioType(other.to_string())),
        }
    }
}

/// Whether a radio event marks the start or the end of a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transmission {
    Start,
    End,
}

impl Transmission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }

    pub fn from_host(s: &str) -> Result<Self, DomainError> {
        match s {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            other => Err(DomainError::InvalidTransmission(other.to_string())),
        }
    }
}

/// Map a numeric chat channel id to its display name.
///
/// Ids 6-15 are scripted custom channels; anything outside the known table
/// is attributed to the engine itself.
pub fn chat_channel_name(id: i32) -> &'static str {
    match id {
        0 => "Global",
        1 => "Side",
        2 => "Command",
        3 => "Group",
        4 => "Vehicle",
        5 => "Direct",
        6..=15 => "Custom",
        _ => "System",
    }
}

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Reference to either a soldier or a vehicle row. Hit and kill events carry
/// exactly one of these per role (victim, shooter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRef {
    Soldier(i64),
    Vehicle(i64),
}

impl EntityRef {
    pub fn soldier_id(&self) -> Option<i64> {
        match self {
            Self::Soldier(id) => Some(*id),
            Self::Vehicle(_) => None,
        }
    }

    pub fn vehicle_id(&self) -> Option<i64> {
        match self {
            Self::Soldier(_) => None,
            Self::Vehicle(id) => Some(*id),
        }
    }
}

/// Score components tracked for player soldiers. All six counters are small
/// unsigned values; AI soldiers carry the zero default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub infantry_kills: u8,
    pub vehicle_kills: u8,
    pub armor_kills: u8,
    pub air_kills: u8,
    pub deaths: u8,
    pub total_score: u8,
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// World (terrain) a mission is played on. Created lazily on the first
/// mission that references it; `world_name` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub id: i64,
    pub author: String,
    pub workshop_id: String,
    pub display_name: String,
    /// Canonical (unique) name
    pub world_name: String,
    pub world_name_original: String,
    /// Edge length in meters
    pub world_size: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// `latitude`/`longitude` projected to Web-Mercator
    pub location: Position,
}

/// One recorded mission. Every event and entity table hangs off this row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: i64,
    pub mission_name: String,
    pub briefing_name: String,
    pub mission_name_source: String,
    pub on_load_name: String,
    pub author: String,
    pub server_name: String,
    pub server_profile: String,
    pub start_time: DateTime<Utc>,
    /// Intended seconds between consecutive capture frames. Recorded, not
    /// enforced.
    pub capture_delay: f32,
    pub addon_version: String,
    pub extension_version: String,
    pub extension_build: String,
    pub tag: String,
    pub world_id: i64,
}

/// Mod/addon loaded for a mission. `name` is unique; workshop ids arrive as
/// either integers or strings and are coerced to string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    pub id: i64,
    pub name: String,
    pub workshop_id: String,
}

/// A tracked infantry unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Soldier {
    pub id: i64,
    pub mission_id: i64,
    pub join_frame: u32,
    pub join_time: DateTime<Utc>,
    /// Host-assigned id, unique per (mission, kind)
    pub ocap_id: u16,
    pub unit_name: String,
    pub group_id: String,
    pub side: Side,
    pub is_player: bool,
    pub role_description: String,
    pub class_name: String,
    pub display_name: String,
    pub player_uid: String,
}

/// Per-frame sample of a soldier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldierState {
    pub id: i64,
    pub soldier_id: i64,
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub position: Position,
    pub bearing: u16,
    pub lifestate: Lifestate,
    pub in_vehicle: bool,
    pub unit_name: String,
    pub is_player: bool,
    pub current_role: String,
    pub has_stable_vitals: bool,
    pub is_dragged_carried: bool,
    pub scores: Scores,
    pub vehicle_role: String,
}

/// A tracked vehicle (ground, air, sea, or static weapon).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub mission_id: i64,
    pub join_frame: u32,
    pub join_time: DateTime<Utc>,
    pub ocap_id: u16,
    /// Coarse class used by the playback viewer ("car", "tank", "heli", ...)
    pub ocap_type: String,
    pub display_name: String,
    pub class_name: String,
    pub customization: String,
}

/// Per-frame sample of a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: i64,
    pub vehicle_id: i64,
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub position: Position,
    pub bearing: u16,
    pub is_alive: bool,
    /// Comma-joined ocap ids of the crew, in seat order
    pub crew: String,
    pub fuel: f32,
    pub damage: f32,
    pub engine_on: bool,
    pub locked: bool,
    pub side: Side,
}

/// A weapon discharge by a soldier. Start is the muzzle, end is the
/// projectile impact or despawn point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiredEvent {
    pub id: i64,
    pub soldier_id: i64,
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub start_position: Position,
    pub end_position: Position,
    pub weapon: String,
    pub magazine: String,
    pub firing_mode: String,
}

/// Free-form scripted event ("endMission", "connected", objective ticks...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralEvent {
    pub id: i64,
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub name: String,
    pub message: String,
    pub extra_data: Option<serde_json::Value>,
}

/// Projectile hit. Victim and shooter each resolve to exactly one of
/// soldier/vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    pub id: i64,
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub victim_soldier: Option<i64>,
    pub victim_vehicle: Option<i64>,
    pub shooter_soldier: Option<i64>,
    pub shooter_vehicle: Option<i64>,
    pub event_text: String,
    pub distance: f32,
}

/// Confirmed kill. Same victim/killer shape as [`HitEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    pub id: i64,
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub victim_soldier: Option<i64>,
    pub victim_vehicle: Option<i64>,
    pub killer_soldier: Option<i64>,
    pub killer_vehicle: Option<i64>,
    pub event_text: String,
    pub distance: f32,
}

/// Chat line relayed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: i64,
    pub mission_id: i64,
    pub soldier_id: Option<i64>,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    /// Resolved via [`chat_channel_name`]
    pub channel: String,
    pub from_name: String,
    pub sender_name: String,
    pub message: String,
    pub player_uid: String,
}

/// Radio transmission start/end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioEvent {
    pub id: i64,
    pub mission_id: i64,
    pub soldier_id: Option<i64>,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub radio: String,
    pub radio_type: RadioType,
    pub transmission: Transmission,
    pub channel: i8,
    pub is_additional: bool,
    pub frequency: f32,
    pub code: String,
}

/// Server FPS sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFpsEvent {
    pub id: i64,
    pub mission_id: i64,
    pub time: DateTime<Utc>,
    pub fps_average: f32,
    pub fps_min: f32,
}

/// Single-row operator identity, seeded once at schema bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_name: String,
    pub group_description: String,
    pub group_website: String,
    pub group_logo: String,
}

impl Default for GroupInfo {
    fn default() -> Self {
        Self {
            group_name: "OCAP".to_string(),
            group_description: "Operation capture and playback".to_string(),
            group_website: String::new(),
            group_logo: String::new(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid coordinates: {0:?}")]
    InvalidCoordinates(String),

    #[error("invalid polyline: {0}")]
    InvalidPolyline(String),

    #[error("invalid lifestate value {0}")]
    InvalidLifestate(u8),

    #[error("invalid radio type {0:?}")]
    InvalidRadioType(String),

    #[error("invalid transmission marker {0:?}")]
    InvalidTransmission(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_channel_mapping() {
        assert_eq!(chat_channel_name(2), "Command");
        assert_eq!(chat_channel_name(3), "Group");
        assert_eq!(chat_channel_name(6), "Custom");
        assert_eq!(chat_channel_name(8), "Custom");
        assert_eq!(chat_channel_name(15), "Custom");
        assert_eq!(chat_channel_name(99), "System");
        assert_eq!(chat_channel_name(-1), "System");
    }

    #[test]
    fn test_lifestate_round_trip() {
        for v in 0..=2u8 {
            assert_eq!(Lifestate::from_u8(v).unwrap().as_u8(), v);
        }
        assert!(Lifestate::from_u8(3).is_err());
    }

    #[test]
    fn test_side_from_host_unknown() {
        assert_eq!(Side::from_host("WEST"), Side::West);
        assert_eq!(Side::from_host("LOGIC"), Side::Unknown);
    }
}
