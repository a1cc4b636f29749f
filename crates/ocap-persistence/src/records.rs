//! Insert records and row mappings.
//!
//! `New*` types are what the ingest pipeline queues for the batched writer:
//! fully resolved rows minus the database-assigned id. The `*Row` types are
//! the raw shapes read back from either driver; both dialects alias their
//! columns to the same names (the Postgres driver reads geometry through
//! `ST_X`/`ST_Y` aliases) so one `FromRow` mapping serves both.

use chrono::{DateTime, Utc};
use ocap_domain::{
    Addon, ChatEvent, FiredEvent, GeneralEvent, HitEvent, KillEvent, Lifestate, Mission, Position,
    RadioEvent, RadioType, Scores, ServerFpsEvent, Side, Soldier, SoldierState, Transmission,
    Vehicle, VehicleState, World,
};

// =============================================================================
// INSERT RECORDS
// =============================================================================

/// World attributes as parsed from a `:NEW:MISSION:` payload. `location` is
/// already projected to Web-Mercator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorld {
    pub author: String,
    pub workshop_id: String,
    pub display_name: String,
    pub world_name: String,
    pub world_name_original: String,
    pub world_size: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub location: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMission {
    pub mission_name: String,
    pub briefing_name: String,
    pub mission_name_source: String,
    pub on_load_name: String,
    pub author: String,
    pub server_name: String,
    pub server_profile: String,
    pub start_time: DateTime<Utc>,
    pub capture_delay: f32,
    pub addon_version: String,
    pub extension_version: String,
    pub extension_build: String,
    pub tag: String,
    pub world_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddon {
    pub name: String,
    pub workshop_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSoldier {
    pub mission_id: i64,
    pub join_frame: u32,
    pub join_time: DateTime<Utc>,
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewSoldierState {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewVehicle {
    pub mission_id: i64,
    pub join_frame: u32,
    pub join_time: DateTime<Utc>,
    pub ocap_id: u16,
    pub ocap_type: String,
    pub display_name: String,
    pub class_name: String,
    pub customization: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVehicleState {
    pub vehicle_id: i64,
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub position: Position,
    pub bearing: u16,
    pub is_alive: bool,
    pub crew: String,
    pub fuel: f32,
    pub damage: f32,
    pub engine_on: bool,
    pub locked: bool,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFiredEvent {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewGeneralEvent {
    pub mission_id: i64,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub name: String,
    pub message: String,
    pub extra_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHitEvent {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewKillEvent {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatEvent {
    pub mission_id: i64,
    pub soldier_id: Option<i64>,
    pub capture_frame: u32,
    pub time: DateTime<Utc>,
    pub channel: String,
    pub from_name: String,
    pub sender_name: String,
    pub message: String,
    pub player_uid: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRadioEvent {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewFpsEvent {
    pub mission_id: i64,
    pub time: DateTime<Utc>,
    pub fps_average: f32,
    pub fps_min: f32,
}

// =============================================================================
// ROW MAPPINGS
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct WorldRow {
    pub id: i64,
    pub author: String,
    pub workshop_id: String,
    pub display_name: String,
    pub world_name: String,
    pub world_name_original: String,
    pub world_size: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub location_x: f64,
    pub location_y: f64,
}

impl From<WorldRow> for World {
    fn from(r: WorldRow) -> Self {
        Self {
            id: r.id,
            author: r.author,
            workshop_id: r.workshop_id,
            display_name: r.display_name,
            world_name: r.world_name,
            world_name_original: r.world_name_original,
            world_size: r.world_size,
            latitude: r.latitude,
            longitude: r.longitude,
            location: Position::new(r.location_x, r.location_y, 0.0),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MissionRow {
    pub id: i64,
    pub mission_name: String,
    pub briefing_name: String,
    pub mission_name_source: String,
    pub on_load_name: String,
    pub author: String,
    pub server_name: String,
    pub server_profile: String,
    pub start_time: DateTime<Utc>,
    pub capture_delay: f32,
    pub addon_version: String,
    pub extension_version: String,
    pub extension_build: String,
    pub tag: String,
    pub world_id: i64,
}

impl From<MissionRow> for Mission {
    fn from(r: MissionRow) -> Self {
        Self {
            id: r.id,
            mission_name: r.mission_name,
            briefing_name: r.briefing_name,
            mission_name_source: r.mission_name_source,
            on_load_name: r.on_load_name,
            author: r.author,
            server_name: r.server_name,
            server_profile: r.server_profile,
            start_time: r.start_time,
            capture_delay: r.capture_delay,
            addon_version: r.addon_version,
            extension_version: r.extension_version,
            extension_build: r.extension_build,
            tag: r.tag,
            world_id: r.world_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AddonRow {
    pub id: i64,
    pub name: String,
    pub workshop_id: String,
}

impl From<AddonRow> for Addon {
    fn from(r: AddonRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            workshop_id: r.workshop_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SoldierRow {
    pub id: i64,
    pub mission_id: i64,
    pub join_frame: i64,
    pub join_time: DateTime<Utc>,
    pub ocap_id: i32,
    pub unit_name: String,
    pub group_id: String,
    pub side: String,
    pub is_player: bool,
    pub role_description: String,
    pub class_name: String,
    pub display_name: String,
    pub player_uid: String,
}

impl From<SoldierRow> for Soldier {
    fn from(r: SoldierRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            join_frame: r.join_frame as u32,
            join_time: r.join_time,
            ocap_id: r.ocap_id as u16,
            unit_name: r.unit_name,
            group_id: r.group_id,
            side: Side::from_host(&r.side),
            is_player: r.is_player,
            role_description: r.role_description,
            class_name: r.class_name,
            display_name: r.display_name,
            player_uid: r.player_uid,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SoldierStateRow {
    pub id: i64,
    pub soldier_id: i64,
    pub mission_id: i64,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub pos_x: f64,
    pub pos_y: f64,
    pub elevation_asl: f32,
    pub bearing: i32,
    pub lifestate: i32,
    pub in_vehicle: bool,
    pub unit_name: String,
    pub is_player: bool,
    pub current_role: String,
    pub has_stable_vitals: bool,
    pub is_dragged_carried: bool,
    pub score_infantry_kills: i32,
    pub score_vehicle_kills: i32,
    pub score_armor_kills: i32,
    pub score_air_kills: i32,
    pub score_deaths: i32,
    pub score_total: i32,
    pub vehicle_role: String,
}

impl From<SoldierStateRow> for SoldierState {
    fn from(r: SoldierStateRow) -> Self {
        Self {
            id: r.id,
            soldier_id: r.soldier_id,
            mission_id: r.mission_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            position: Position::new(r.pos_x, r.pos_y, f64::from(r.elevation_asl)),
            bearing: r.bearing as u16,
            lifestate: Lifestate::from_u8(r.lifestate as u8).unwrap_or(Lifestate::Alive),
            in_vehicle: r.in_vehicle,
            unit_name: r.unit_name,
            is_player: r.is_player,
            current_role: r.current_role,
            has_stable_vitals: r.has_stable_vitals,
            is_dragged_carried: r.is_dragged_carried,
            scores: Scores {
                infantry_kills: r.score_infantry_kills as u8,
                vehicle_kills: r.score_vehicle_kills as u8,
                armor_kills: r.score_armor_kills as u8,
                air_kills: r.score_air_kills as u8,
                deaths: r.score_deaths as u8,
                total_score: r.score_total as u8,
            },
            vehicle_role: r.vehicle_role,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct VehicleRow {
    pub id: i64,
    pub mission_id: i64,
    pub join_frame: i64,
    pub join_time: DateTime<Utc>,
    pub ocap_id: i32,
    pub ocap_type: String,
    pub display_name: String,
    pub class_name: String,
    pub customization: String,
}

impl From<VehicleRow> for Vehicle {
    fn from(r: VehicleRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            join_frame: r.join_frame as u32,
            join_time: r.join_time,
            ocap_id: r.ocap_id as u16,
            ocap_type: r.ocap_type,
            display_name: r.display_name,
            class_name: r.class_name,
            customization: r.customization,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct VehicleStateRow {
    pub id: i64,
    pub vehicle_id: i64,
    pub mission_id: i64,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub pos_x: f64,
    pub pos_y: f64,
    pub elevation_asl: f32,
    pub bearing: i32,
    pub is_alive: bool,
    pub crew: String,
    pub fuel: f32,
    pub damage: f32,
    pub engine_on: bool,
    pub locked: bool,
    pub side: String,
}

impl From<VehicleStateRow> for VehicleState {
    fn from(r: VehicleStateRow) -> Self {
        Self {
            id: r.id,
            vehicle_id: r.vehicle_id,
            mission_id: r.mission_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            position: Position::new(r.pos_x, r.pos_y, f64::from(r.elevation_asl)),
            bearing: r.bearing as u16,
            is_alive: r.is_alive,
            crew: r.crew,
            fuel: r.fuel,
            damage: r.damage,
            engine_on: r.engine_on,
            locked: r.locked,
            side: Side::from_host(&r.side),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FiredEventRow {
    pub id: i64,
    pub soldier_id: i64,
    pub mission_id: i64,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub start_x: f64,
    pub start_y: f64,
    pub start_elevation: f32,
    pub end_x: f64,
    pub end_y: f64,
    pub end_elevation: f32,
    pub weapon: String,
    pub magazine: String,
    pub firing_mode: String,
}

impl From<FiredEventRow> for FiredEvent {
    fn from(r: FiredEventRow) -> Self {
        Self {
            id: r.id,
            soldier_id: r.soldier_id,
            mission_id: r.mission_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            start_position: Position::new(r.start_x, r.start_y, f64::from(r.start_elevation)),
            end_position: Position::new(r.end_x, r.end_y, f64::from(r.end_elevation)),
            weapon: r.weapon,
            magazine: r.magazine,
            firing_mode: r.firing_mode,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GeneralEventRow {
    pub id: i64,
    pub mission_id: i64,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub name: String,
    pub message: String,
    pub extra_data: Option<String>,
}

impl From<GeneralEventRow> for GeneralEvent {
    fn from(r: GeneralEventRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            name: r.name,
            message: r.message,
            extra_data: r
                .extra_data
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HitEventRow {
    pub id: i64,
    pub mission_id: i64,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub victim_soldier_id: Option<i64>,
    pub victim_vehicle_id: Option<i64>,
    pub shooter_soldier_id: Option<i64>,
    pub shooter_vehicle_id: Option<i64>,
    pub event_text: String,
    pub distance: f32,
}

impl From<HitEventRow> for HitEvent {
    fn from(r: HitEventRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            victim_soldier: r.victim_soldier_id,
            victim_vehicle: r.victim_vehicle_id,
            shooter_soldier: r.shooter_soldier_id,
            shooter_vehicle: r.shooter_vehicle_id,
            event_text: r.event_text,
            distance: r.distance,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct KillEventRow {
    pub id: i64,
    pub mission_id: i64,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub victim_soldier_id: Option<i64>,
    pub victim_vehicle_id: Option<i64>,
    pub killer_soldier_id: Option<i64>,
    pub killer_vehicle_id: Option<i64>,
    pub event_text: String,
    pub distance: f32,
}

impl From<KillEventRow> for KillEvent {
    fn from(r: KillEventRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            victim_soldier: r.victim_soldier_id,
            victim_vehicle: r.victim_vehicle_id,
            killer_soldier: r.killer_soldier_id,
            killer_vehicle: r.killer_vehicle_id,
            event_text: r.event_text,
            distance: r.distance,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ChatEventRow {
    pub id: i64,
    pub mission_id: i64,
    pub soldier_id: Option<i64>,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub channel: String,
    pub from_name: String,
    pub sender_name: String,
    pub message: String,
    pub player_uid: String,
}

impl From<ChatEventRow> for ChatEvent {
    fn from(r: ChatEventRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            soldier_id: r.soldier_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            channel: r.channel,
            from_name: r.from_name,
            sender_name: r.sender_name,
            message: r.message,
            player_uid: r.player_uid,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RadioEventRow {
    pub id: i64,
    pub mission_id: i64,
    pub soldier_id: Option<i64>,
    pub capture_frame: i64,
    pub time: DateTime<Utc>,
    pub radio: String,
    pub radio_type: String,
    pub transmission: String,
    pub channel: i32,
    pub is_additional: bool,
    pub frequency: f32,
    pub code: String,
}

impl From<RadioEventRow> for RadioEvent {
    fn from(r: RadioEventRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            soldier_id: r.soldier_id,
            capture_frame: r.capture_frame as u32,
            time: r.time,
            radio: r.radio,
            radio_type: RadioType::from_host(&r.radio_type).unwrap_or(RadioType::SW),
            transmission: Transmission::from_host(&r.transmission).unwrap_or(Transmission::End),
            channel: r.channel as i8,
            is_additional: r.is_additional,
            frequency: r.frequency,
            code: r.code,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FpsEventRow {
    pub id: i64,
    pub mission_id: i64,
    pub time: DateTime<Utc>,
    pub fps_average: f32,
    pub fps_min: f32,
}

impl From<FpsEventRow> for ServerFpsEvent {
    fn from(r: FpsEventRow) -> Self {
        Self {
            id: r.id,
            mission_id: r.mission_id,
            time: r.time,
            fps_average: r.fps_average,
            fps_min: r.fps_min,
        }
    }
}
