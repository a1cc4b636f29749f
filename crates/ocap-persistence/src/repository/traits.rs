//! # Storage Port
//!
//! Abstract repository interfaces for all recorder entities. The Postgres
//! and SQLite drivers implement these; nothing above this layer sees a SQL
//! dialect.

use async_trait::async_trait;

use crate::error::Result;
use crate::records::*;
use ocap_domain::{
    ChatEvent, FiredEvent, GeneralEvent, HitEvent, KillEvent, Mission, RadioEvent, ServerFpsEvent,
    Soldier, SoldierState, Vehicle, VehicleState, World,
};

/// Which concrete driver backs a storage handle. Reported to the host in the
/// `:DB:OK:` callback and used to pick batch limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    Sqlite,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

// =============================================================================
// MISSION REPOSITORY
// =============================================================================

/// World and mission lifecycle operations
#[async_trait]
pub trait MissionRepository: Send + Sync {
    /// Look up a world by canonical name, creating it if this is the first
    /// mission played on it.
    async fn find_or_create_world(&self, world: &NewWorld) -> Result<World>;

    /// Create a mission row plus its addon join rows. Addons are deduplicated
    /// by name across missions.
    async fn create_mission(&self, mission: &NewMission, addons: &[NewAddon]) -> Result<Mission>;

    /// Get mission by id
    async fn get_mission(&self, mission_id: i64) -> Result<Option<Mission>>;

    /// Get world by id
    async fn get_world(&self, world_id: i64) -> Result<Option<World>>;

    /// Most recently created mission id, if any
    async fn latest_mission_id(&self) -> Result<Option<i64>>;

    /// All mission ids in creation order
    async fn list_mission_ids(&self) -> Result<Vec<i64>>;
}

// =============================================================================
// ENTITY REPOSITORY
// =============================================================================

/// Soldier and vehicle entity operations
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Batch insert soldiers, returning database ids in input order
    async fn insert_soldiers(&self, rows: &[NewSoldier]) -> Result<Vec<i64>>;

    /// Batch insert vehicles, returning database ids in input order
    async fn insert_vehicles(&self, rows: &[NewVehicle]) -> Result<Vec<i64>>;

    /// Find a soldier by host id within a mission. When duplicates exist the
    /// most recently joined row wins.
    async fn find_soldier(&self, mission_id: i64, ocap_id: u16) -> Result<Option<Soldier>>;

    /// Find a vehicle by host id within a mission, latest join first
    async fn find_vehicle(&self, mission_id: i64, ocap_id: u16) -> Result<Option<Vehicle>>;
}

// =============================================================================
// TIMELINE REPOSITORY
// =============================================================================

/// Per-frame state and fired-event batch inserts
#[async_trait]
pub trait TimelineRepository: Send + Sync {
    async fn insert_soldier_states(&self, rows: &[NewSoldierState]) -> Result<u64>;

    async fn insert_vehicle_states(&self, rows: &[NewVehicleState]) -> Result<u64>;

    async fn insert_fired_events(&self, rows: &[NewFiredEvent]) -> Result<u64>;
}

// =============================================================================
// EVENT REPOSITORY
// =============================================================================

/// Discrete event batch inserts
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert_general_events(&self, rows: &[NewGeneralEvent]) -> Result<u64>;

    async fn insert_hit_events(&self, rows: &[NewHitEvent]) -> Result<u64>;

    async fn insert_kill_events(&self, rows: &[NewKillEvent]) -> Result<u64>;

    async fn insert_chat_events(&self, rows: &[NewChatEvent]) -> Result<u64>;

    async fn insert_radio_events(&self, rows: &[NewRadioEvent]) -> Result<u64>;

    async fn insert_fps_events(&self, rows: &[NewFpsEvent]) -> Result<u64>;
}

// =============================================================================
// EXPORT REPOSITORY
// =============================================================================

/// Read-side queries used by the mission exporter. All state and event
/// queries return rows in `(capture_frame, time)` order.
#[async_trait]
pub trait ExportRepository: Send + Sync {
    async fn soldiers_by_mission(&self, mission_id: i64) -> Result<Vec<Soldier>>;

    async fn vehicles_by_mission(&self, mission_id: i64) -> Result<Vec<Vehicle>>;

    async fn soldier_states_by_soldier(&self, soldier_id: i64) -> Result<Vec<SoldierState>>;

    async fn vehicle_states_by_vehicle(&self, vehicle_id: i64) -> Result<Vec<VehicleState>>;

    async fn fired_events_by_soldier(&self, soldier_id: i64) -> Result<Vec<FiredEvent>>;

    async fn general_events_by_mission(&self, mission_id: i64) -> Result<Vec<GeneralEvent>>;

    async fn hit_events_by_mission(&self, mission_id: i64) -> Result<Vec<HitEvent>>;

    async fn kill_events_by_mission(&self, mission_id: i64) -> Result<Vec<KillEvent>>;

    async fn chat_events_by_mission(&self, mission_id: i64) -> Result<Vec<ChatEvent>>;

    async fn radio_events_by_mission(&self, mission_id: i64) -> Result<Vec<RadioEvent>>;

    async fn fps_events_by_mission(&self, mission_id: i64) -> Result<Vec<ServerFpsEvent>>;

    /// Highest soldier-state capture frame in the mission
    async fn last_soldier_state_frame(&self, mission_id: i64) -> Result<Option<u32>>;

    /// Highest vehicle-state capture frame in the mission
    async fn last_vehicle_state_frame(&self, mission_id: i64) -> Result<Option<u32>>;
}

// =============================================================================
// MAINTENANCE REPOSITORY
// =============================================================================

/// Schema lifecycle and space reclamation
#[async_trait]
pub trait MaintenanceRepository: Send + Sync {
    /// Create every table and index if absent
    async fn migrate(&self) -> Result<()>;

    /// Insert the single GroupInfo row if the table is empty
    async fn seed_group_info(&self) -> Result<()>;

    /// Liveness probe
    async fn ping(&self) -> Result<()>;

    /// Delete soldier states off the stride grid for one mission, returning
    /// the number of rows removed
    async fn reduce_soldier_states(&self, mission_id: i64, stride: u32) -> Result<u64>;

    /// Reclaim space after bulk deletes (dialect-specific vacuum)
    async fn vacuum(&self) -> Result<()>;
}

// =============================================================================
// COMBINED PORT
// =============================================================================

/// The full storage port. Everything the pipeline, exporter, and reducer
/// need, behind one object-safe trait.
pub trait Storage:
    MissionRepository
    + EntityRepository
    + TimelineRepository
    + EventRepository
    + ExportRepository
    + MaintenanceRepository
{
    /// Concrete driver tag
    fn driver(&self) -> Driver;

    /// Rows per insert chunk for this driver
    fn batch_size(&self) -> usize;
}
