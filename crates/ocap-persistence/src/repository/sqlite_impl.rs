//! # SQLite Driver
//!
//! Embedded fallback driver. Starts in memory with durability pragmas
//! relaxed for ingest speed; the lifecycle controller periodically dumps the
//! database to disk with `VACUUM INTO`. Positions are stored as plain
//! `pos_x`/`pos_y` real columns since there is no geometry extension.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite};

use crate::error::{PersistenceError, Result};
use crate::records::*;
use crate::repository::traits::*;
use ocap_domain::{
    ChatEvent, FiredEvent, GeneralEvent, GroupInfo, HitEvent, KillEvent, Mission, RadioEvent,
    ServerFpsEvent, Soldier, SoldierState, Vehicle, VehicleState, World,
};

/// Default SQLITE_MAX_VARIABLE_NUMBER for modern builds.
const MAX_BINDS: usize = 32_766;

/// Rows per insert chunk on the embedded driver.
const BATCH_SIZE: usize = 2_000;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS worlds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    author TEXT NOT NULL DEFAULT '',
    workshop_id TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    world_name TEXT NOT NULL UNIQUE,
    world_name_original TEXT NOT NULL DEFAULT '',
    world_size REAL NOT NULL DEFAULT 0,
    latitude REAL NOT NULL DEFAULT 0,
    longitude REAL NOT NULL DEFAULT 0,
    location_x REAL NOT NULL DEFAULT 0,
    location_y REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS missions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_name TEXT NOT NULL DEFAULT '',
    briefing_name TEXT NOT NULL DEFAULT '',
    mission_name_source TEXT NOT NULL DEFAULT '',
    on_load_name TEXT NOT NULL DEFAULT '',
    author TEXT NOT NULL DEFAULT '',
    server_name TEXT NOT NULL DEFAULT '',
    server_profile TEXT NOT NULL DEFAULT '',
    start_time TEXT NOT NULL,
    capture_delay REAL NOT NULL DEFAULT 1.0,
    addon_version TEXT NOT NULL DEFAULT '',
    extension_version TEXT NOT NULL DEFAULT '',
    extension_build TEXT NOT NULL DEFAULT '',
    tag TEXT NOT NULL DEFAULT '',
    world_id INTEGER NOT NULL REFERENCES worlds(id)
);

CREATE TABLE IF NOT EXISTS addons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    workshop_id TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS mission_addons (
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    addon_id INTEGER NOT NULL REFERENCES addons(id),
    PRIMARY KEY (mission_id, addon_id)
);

CREATE TABLE IF NOT EXISTS soldiers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    join_frame INTEGER NOT NULL,
    join_time TEXT NOT NULL,
    ocap_id INTEGER NOT NULL,
    unit_name TEXT NOT NULL DEFAULT '',
    group_id TEXT NOT NULL DEFAULT '',
    side TEXT NOT NULL DEFAULT '',
    is_player BOOLEAN NOT NULL DEFAULT FALSE,
    role_description TEXT NOT NULL DEFAULT '',
    class_name TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    player_uid TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_soldiers_mission_ocap ON soldiers(mission_id, ocap_id);

CREATE TABLE IF NOT EXISTS soldier_states (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    soldier_id INTEGER NOT NULL REFERENCES soldiers(id) ON DELETE CASCADE,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    pos_x REAL NOT NULL DEFAULT 0,
    pos_y REAL NOT NULL DEFAULT 0,
    elevation_asl REAL NOT NULL DEFAULT 0,
    bearing INTEGER NOT NULL DEFAULT 0,
    lifestate INTEGER NOT NULL DEFAULT 0,
    in_vehicle BOOLEAN NOT NULL DEFAULT FALSE,
    unit_name TEXT NOT NULL DEFAULT '',
    is_player BOOLEAN NOT NULL DEFAULT FALSE,
    current_role TEXT NOT NULL DEFAULT '',
    has_stable_vitals BOOLEAN NOT NULL DEFAULT TRUE,
    is_dragged_carried BOOLEAN NOT NULL DEFAULT FALSE,
    score_infantry_kills INTEGER NOT NULL DEFAULT 0,
    score_vehicle_kills INTEGER NOT NULL DEFAULT 0,
    score_armor_kills INTEGER NOT NULL DEFAULT 0,
    score_air_kills INTEGER NOT NULL DEFAULT 0,
    score_deaths INTEGER NOT NULL DEFAULT 0,
    score_total INTEGER NOT NULL DEFAULT 0,
    vehicle_role TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_soldier_states_soldier ON soldier_states(soldier_id, capture_frame);
CREATE INDEX IF NOT EXISTS idx_soldier_states_mission ON soldier_states(mission_id, capture_frame);

CREATE TABLE IF NOT EXISTS vehicles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    join_frame INTEGER NOT NULL,
    join_time TEXT NOT NULL,
    ocap_id INTEGER NOT NULL,
    ocap_type TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    class_name TEXT NOT NULL DEFAULT '',
    customization TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_vehicles_mission_ocap ON vehicles(mission_id, ocap_id);

CREATE TABLE IF NOT EXISTS vehicle_states (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vehicle_id INTEGER NOT NULL REFERENCES vehicles(id) ON DELETE CASCADE,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    pos_x REAL NOT NULL DEFAULT 0,
    pos_y REAL NOT NULL DEFAULT 0,
    elevation_asl REAL NOT NULL DEFAULT 0,
    bearing INTEGER NOT NULL DEFAULT 0,
    is_alive BOOLEAN NOT NULL DEFAULT TRUE,
    crew TEXT NOT NULL DEFAULT '',
    fuel REAL NOT NULL DEFAULT 0,
    damage REAL NOT NULL DEFAULT 0,
    engine_on BOOLEAN NOT NULL DEFAULT FALSE,
    locked BOOLEAN NOT NULL DEFAULT FALSE,
    side TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_vehicle_states_vehicle ON vehicle_states(vehicle_id, capture_frame);
CREATE INDEX IF NOT EXISTS idx_vehicle_states_mission ON vehicle_states(mission_id, capture_frame);

CREATE TABLE IF NOT EXISTS fired_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    soldier_id INTEGER NOT NULL REFERENCES soldiers(id) ON DELETE CASCADE,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    start_x REAL NOT NULL DEFAULT 0,
    start_y REAL NOT NULL DEFAULT 0,
    start_elevation REAL NOT NULL DEFAULT 0,
    end_x REAL NOT NULL DEFAULT 0,
    end_y REAL NOT NULL DEFAULT 0,
    end_elevation REAL NOT NULL DEFAULT 0,
    weapon TEXT NOT NULL DEFAULT '',
    magazine TEXT NOT NULL DEFAULT '',
    firing_mode TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_fired_events_soldier ON fired_events(soldier_id, capture_frame);

CREATE TABLE IF NOT EXISTS general_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    message TEXT NOT NULL DEFAULT '',
    extra_data TEXT
);
CREATE INDEX IF NOT EXISTS idx_general_events_mission ON general_events(mission_id, capture_frame);

CREATE TABLE IF NOT EXISTS hit_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    victim_soldier_id INTEGER REFERENCES soldiers(id) ON DELETE CASCADE,
    victim_vehicle_id INTEGER REFERENCES vehicles(id) ON DELETE CASCADE,
    shooter_soldier_id INTEGER REFERENCES soldiers(id) ON DELETE CASCADE,
    shooter_vehicle_id INTEGER REFERENCES vehicles(id) ON DELETE CASCADE,
    event_text TEXT NOT NULL DEFAULT '',
    distance REAL NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_hit_events_mission ON hit_events(mission_id, capture_frame);

CREATE TABLE IF NOT EXISTS kill_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    victim_soldier_id INTEGER REFERENCES soldiers(id) ON DELETE CASCADE,
    victim_vehicle_id INTEGER REFERENCES vehicles(id) ON DELETE CASCADE,
    killer_soldier_id INTEGER REFERENCES soldiers(id) ON DELETE CASCADE,
    killer_vehicle_id INTEGER REFERENCES vehicles(id) ON DELETE CASCADE,
    event_text TEXT NOT NULL DEFAULT '',
    distance REAL NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_kill_events_mission ON kill_events(mission_id, capture_frame);

CREATE TABLE IF NOT EXISTS chat_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    soldier_id INTEGER REFERENCES soldiers(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    channel TEXT NOT NULL DEFAULT '',
    from_name TEXT NOT NULL DEFAULT '',
    sender_name TEXT NOT NULL DEFAULT '',
    message TEXT NOT NULL DEFAULT '',
    player_uid TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS radio_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    soldier_id INTEGER REFERENCES soldiers(id) ON DELETE CASCADE,
    capture_frame INTEGER NOT NULL,
    time TEXT NOT NULL,
    radio TEXT NOT NULL DEFAULT '',
    radio_type TEXT NOT NULL DEFAULT 'SW',
    transmission TEXT NOT NULL DEFAULT 'end',
    channel INTEGER NOT NULL DEFAULT 0,
    is_additional BOOLEAN NOT NULL DEFAULT FALSE,
    frequency REAL NOT NULL DEFAULT 0,
    code TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS server_fps_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mission_id INTEGER NOT NULL REFERENCES missions(id) ON DELETE CASCADE,
    time TEXT NOT NULL,
    fps_average REAL NOT NULL DEFAULT 0,
    fps_min REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS group_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_name TEXT NOT NULL DEFAULT '',
    group_description TEXT NOT NULL DEFAULT '',
    group_website TEXT NOT NULL DEFAULT '',
    group_logo TEXT NOT NULL DEFAULT ''
);
"#;

/// SQLite-backed implementation of the storage port
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open the in-memory fallback store with ingest-speed pragmas.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .shared_cache(true)
            .journal_mode(SqliteJournalMode::Memory)
            .synchronous(SqliteSynchronous::Off)
            .pragma("cache_size", "-131072")
            .pragma("mmap_size", "268435456")
            .foreign_keys(true);

        Self::connect_with(options).await
    }

    /// Open an on-disk database, typically a snapshot produced by an earlier
    /// session (used by the backup migration verb).
    pub async fn open_file(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Memory)
            .synchronous(SqliteSynchronous::Off)
            .foreign_keys(true);

        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self> {
        // Single connection: the in-memory database lives and dies with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Raw pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Dump the whole database to `path`. The caller pauses inserts first so
    /// the copy is quiescent.
    pub async fn snapshot_into(&self, path: &Path) -> Result<()> {
        // VACUUM INTO refuses to overwrite
        let _ = tokio::fs::remove_file(path).await;

        let escaped = path.display().to_string().replace('\'', "''");
        sqlx::query(&format!("VACUUM INTO '{escaped}'"))
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Snapshot(e.to_string()))?;
        Ok(())
    }

    fn chunk_rows(&self, binds_per_row: usize) -> usize {
        (MAX_BINDS / binds_per_row).min(BATCH_SIZE).max(1)
    }
}

#[async_trait]
impl MissionRepository for SqliteStorage {
    async fn find_or_create_world(&self, world: &NewWorld) -> Result<World> {
        let existing =
            sqlx::query_as::<_, WorldRow>("SELECT * FROM worlds WHERE world_name = ?")
                .bind(&world.world_name)
                .fetch_optional(&self.pool)
                .await?;

        if let Some(row) = existing {
            return Ok(row.into());
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO worlds (author, workshop_id, display_name, world_name, \
             world_name_original, world_size, latitude, longitude, location_x, location_y) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&world.author)
        .bind(&world.workshop_id)
        .bind(&world.display_name)
        .bind(&world.world_name)
        .bind(&world.world_name_original)
        .bind(world.world_size)
        .bind(world.latitude)
        .bind(world.longitude)
        .bind(world.location.x)
        .bind(world.location.y)
        .fetch_one(&self.pool)
        .await?;

        Ok(World {
            id,
            author: world.author.clone(),
            workshop_id: world.workshop_id.clone(),
            display_name: world.display_name.clone(),
            world_name: world.world_name.clone(),
            world_name_original: world.world_name_original.clone(),
            world_size: world.world_size,
            latitude: world.latitude,
            longitude: world.longitude,
            location: world.location,
        })
    }

    async fn create_mission(&self, mission: &NewMission, addons: &[NewAddon]) -> Result<Mission> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO missions (mission_name, briefing_name, mission_name_source, \
             on_load_name, author, server_name, server_profile, start_time, capture_delay, \
             addon_version, extension_version, extension_build, tag, world_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&mission.mission_name)
        .bind(&mission.briefing_name)
        .bind(&mission.mission_name_source)
        .bind(&mission.on_load_name)
        .bind(&mission.author)
        .bind(&mission.server_name)
        .bind(&mission.server_profile)
        .bind(mission.start_time)
        .bind(mission.capture_delay)
        .bind(&mission.addon_version)
        .bind(&mission.extension_version)
        .bind(&mission.extension_build)
        .bind(&mission.tag)
        .bind(mission.world_id)
        .fetch_one(&mut *tx)
        .await?;

        for addon in addons {
            let addon_id: i64 = match sqlx::query_scalar("SELECT id FROM addons WHERE name = ?")
                .bind(&addon.name)
                .fetch_optional(&mut *tx)
                .await?
            {
                Some(existing) => existing,
                None => {
                    sqlx::query_scalar(
                        "INSERT INTO addons (name, workshop_id) VALUES (?, ?) RETURNING id",
                    )
                    .bind(&addon.name)
                    .bind(&addon.workshop_id)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            sqlx::query(
                "INSERT OR IGNORE INTO mission_addons (mission_id, addon_id) VALUES (?, ?)",
            )
            .bind(id)
            .bind(addon_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Mission {
            id,
            mission_name: mission.mission_name.clone(),
            briefing_name: mission.briefing_name.clone(),
            mission_name_source: mission.mission_name_source.clone(),
            on_load_name: mission.on_load_name.clone(),
            author: mission.author.clone(),
            server_name: mission.server_name.clone(),
            server_profile: mission.server_profile.clone(),
            start_time: mission.start_time,
            capture_delay: mission.capture_delay,
            addon_version: mission.addon_version.clone(),
            extension_version: mission.extension_version.clone(),
            extension_build: mission.extension_build.clone(),
            tag: mission.tag.clone(),
            world_id: mission.world_id,
        })
    }

    async fn get_mission(&self, mission_id: i64) -> Result<Option<Mission>> {
        let row = sqlx::query_as::<_, MissionRow>("SELECT * FROM missions WHERE id = ?")
            .bind(mission_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Mission::from))
    }

    async fn get_world(&self, world_id: i64) -> Result<Option<World>> {
        let row = sqlx::query_as::<_, WorldRow>("SELECT * FROM worlds WHERE id = ?")
            .bind(world_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(World::from))
    }

    async fn latest_mission_id(&self) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(id) FROM missions")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list_mission_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM missions ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl EntityRepository for SqliteStorage {
    async fn insert_soldiers(&self, rows: &[NewSoldier]) -> Result<Vec<i64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(rows.len());
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(12)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO soldiers (mission_id, join_frame, join_time, ocap_id, unit_name, \
                 group_id, side, is_player, role_description, class_name, display_name, player_uid) ",
            );
            qb.push_values(chunk, |mut b, s| {
                b.push_bind(s.mission_id)
                    .push_bind(i64::from(s.join_frame))
                    .push_bind(s.join_time)
                    .push_bind(i32::from(s.ocap_id))
                    .push_bind(&s.unit_name)
                    .push_bind(&s.group_id)
                    .push_bind(s.side.as_str())
                    .push_bind(s.is_player)
                    .push_bind(&s.role_description)
                    .push_bind(&s.class_name)
                    .push_bind(&s.display_name)
                    .push_bind(&s.player_uid);
            });
            qb.push(" RETURNING id");
            ids.extend(qb.build_query_scalar::<i64>().fetch_all(&mut *tx).await?);
        }
        tx.commit().await?;

        Ok(ids)
    }

    async fn insert_vehicles(&self, rows: &[NewVehicle]) -> Result<Vec<i64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(rows.len());
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(8)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO vehicles (mission_id, join_frame, join_time, ocap_id, ocap_type, \
                 display_name, class_name, customization) ",
            );
            qb.push_values(chunk, |mut b, v| {
                b.push_bind(v.mission_id)
                    .push_bind(i64::from(v.join_frame))
                    .push_bind(v.join_time)
                    .push_bind(i32::from(v.ocap_id))
                    .push_bind(&v.ocap_type)
                    .push_bind(&v.display_name)
                    .push_bind(&v.class_name)
                    .push_bind(&v.customization);
            });
            qb.push(" RETURNING id");
            ids.extend(qb.build_query_scalar::<i64>().fetch_all(&mut *tx).await?);
        }
        tx.commit().await?;

        Ok(ids)
    }

    async fn find_soldier(&self, mission_id: i64, ocap_id: u16) -> Result<Option<Soldier>> {
        let row = sqlx::query_as::<_, SoldierRow>(
            "SELECT * FROM soldiers WHERE mission_id = ? AND ocap_id = ? \
             ORDER BY join_frame DESC, id DESC LIMIT 1",
        )
        .bind(mission_id)
        .bind(i32::from(ocap_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Soldier::from))
    }

    async fn find_vehicle(&self, mission_id: i64, ocap_id: u16) -> Result<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            "SELECT * FROM vehicles WHERE mission_id = ? AND ocap_id = ? \
             ORDER BY join_frame DESC, id DESC LIMIT 1",
        )
        .bind(mission_id)
        .bind(i32::from(ocap_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Vehicle::from))
    }
}

#[async_trait]
impl TimelineRepository for SqliteStorage {
    async fn insert_soldier_states(&self, rows: &[NewSoldierState]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(22)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO soldier_states (soldier_id, mission_id, capture_frame, time, \
                 pos_x, pos_y, elevation_asl, bearing, lifestate, in_vehicle, unit_name, \
                 is_player, current_role, has_stable_vitals, is_dragged_carried, \
                 score_infantry_kills, score_vehicle_kills, score_armor_kills, score_air_kills, \
                 score_deaths, score_total, vehicle_role) ",
            );
            qb.push_values(chunk, |mut b, s| {
                b.push_bind(s.soldier_id)
                    .push_bind(s.mission_id)
                    .push_bind(i64::from(s.capture_frame))
                    .push_bind(s.time)
                    .push_bind(s.position.x)
                    .push_bind(s.position.y)
                    .push_bind(s.position.z as f32)
                    .push_bind(i32::from(s.bearing))
                    .push_bind(i32::from(s.lifestate.as_u8()))
                    .push_bind(s.in_vehicle)
                    .push_bind(&s.unit_name)
                    .push_bind(s.is_player)
                    .push_bind(&s.current_role)
                    .push_bind(s.has_stable_vitals)
                    .push_bind(s.is_dragged_carried)
                    .push_bind(i32::from(s.scores.infantry_kills))
                    .push_bind(i32::from(s.scores.vehicle_kills))
                    .push_bind(i32::from(s.scores.armor_kills))
                    .push_bind(i32::from(s.scores.air_kills))
                    .push_bind(i32::from(s.scores.deaths))
                    .push_bind(i32::from(s.scores.total_score))
                    .push_bind(&s.vehicle_role);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn insert_vehicle_states(&self, rows: &[NewVehicleState]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(15)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO vehicle_states (vehicle_id, mission_id, capture_frame, time, \
                 pos_x, pos_y, elevation_asl, bearing, is_alive, crew, fuel, damage, engine_on, \
                 locked, side) ",
            );
            qb.push_values(chunk, |mut b, s| {
                b.push_bind(s.vehicle_id)
                    .push_bind(s.mission_id)
                    .push_bind(i64::from(s.capture_frame))
                    .push_bind(s.time)
                    .push_bind(s.position.x)
                    .push_bind(s.position.y)
                    .push_bind(s.position.z as f32)
                    .push_bind(i32::from(s.bearing))
                    .push_bind(s.is_alive)
                    .push_bind(&s.crew)
                    .push_bind(s.fuel)
                    .push_bind(s.damage)
                    .push_bind(s.engine_on)
                    .push_bind(s.locked)
                    .push_bind(s.side.as_str());
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn insert_fired_events(&self, rows: &[NewFiredEvent]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(13)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO fired_events (soldier_id, mission_id, capture_frame, time, \
                 start_x, start_y, start_elevation, end_x, end_y, end_elevation, weapon, \
                 magazine, firing_mode) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.soldier_id)
                    .push_bind(e.mission_id)
                    .push_bind(i64::from(e.capture_frame))
                    .push_bind(e.time)
                    .push_bind(e.start_position.x)
                    .push_bind(e.start_position.y)
                    .push_bind(e.start_position.z as f32)
                    .push_bind(e.end_position.x)
                    .push_bind(e.end_position.y)
                    .push_bind(e.end_position.z as f32)
                    .push_bind(&e.weapon)
                    .push_bind(&e.magazine)
                    .push_bind(&e.firing_mode);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }
}

#[async_trait]
impl EventRepository for SqliteStorage {
    async fn insert_general_events(&self, rows: &[NewGeneralEvent]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(6)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO general_events (mission_id, capture_frame, time, name, message, \
                 extra_data) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.mission_id)
                    .push_bind(i64::from(e.capture_frame))
                    .push_bind(e.time)
                    .push_bind(&e.name)
                    .push_bind(&e.message)
                    .push_bind(e.extra_data.as_ref().map(|v| v.to_string()));
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn insert_hit_events(&self, rows: &[NewHitEvent]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(9)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO hit_events (mission_id, capture_frame, time, victim_soldier_id, \
                 victim_vehicle_id, shooter_soldier_id, shooter_vehicle_id, event_text, distance) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.mission_id)
                    .push_bind(i64::from(e.capture_frame))
                    .push_bind(e.time)
                    .push_bind(e.victim_soldier)
                    .push_bind(e.victim_vehicle)
                    .push_bind(e.shooter_soldier)
                    .push_bind(e.shooter_vehicle)
                    .push_bind(&e.event_text)
                    .push_bind(e.distance);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn insert_kill_events(&self, rows: &[NewKillEvent]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(9)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO kill_events (mission_id, capture_frame, time, victim_soldier_id, \
                 victim_vehicle_id, killer_soldier_id, killer_vehicle_id, event_text, distance) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.mission_id)
                    .push_bind(i64::from(e.capture_frame))
                    .push_bind(e.time)
                    .push_bind(e.victim_soldier)
                    .push_bind(e.victim_vehicle)
                    .push_bind(e.killer_soldier)
                    .push_bind(e.killer_vehicle)
                    .push_bind(&e.event_text)
                    .push_bind(e.distance);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn insert_chat_events(&self, rows: &[NewChatEvent]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(9)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO chat_events (mission_id, soldier_id, capture_frame, time, channel, \
                 from_name, sender_name, message, player_uid) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.mission_id)
                    .push_bind(e.soldier_id)
                    .push_bind(i64::from(e.capture_frame))
                    .push_bind(e.time)
                    .push_bind(&e.channel)
                    .push_bind(&e.from_name)
                    .push_bind(&e.sender_name)
                    .push_bind(&e.message)
                    .push_bind(&e.player_uid);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn insert_radio_events(&self, rows: &[NewRadioEvent]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(11)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO radio_events (mission_id, soldier_id, capture_frame, time, radio, \
                 radio_type, transmission, channel, is_additional, frequency, code) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.mission_id)
                    .push_bind(e.soldier_id)
                    .push_bind(i64::from(e.capture_frame))
                    .push_bind(e.time)
                    .push_bind(&e.radio)
                    .push_bind(e.radio_type.as_str())
                    .push_bind(e.transmission.as_str())
                    .push_bind(i32::from(e.channel))
                    .push_bind(e.is_additional)
                    .push_bind(e.frequency)
                    .push_bind(&e.code);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn insert_fps_events(&self, rows: &[NewFpsEvent]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_rows(4)) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO server_fps_events (mission_id, time, fps_average, fps_min) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(e.mission_id)
                    .push_bind(e.time)
                    .push_bind(e.fps_average)
                    .push_bind(e.fps_min);
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }
}

#[async_trait]
impl ExportRepository for SqliteStorage {
    async fn soldiers_by_mission(&self, mission_id: i64) -> Result<Vec<Soldier>> {
        let rows = sqlx::query_as::<_, SoldierRow>(
            "SELECT * FROM soldiers WHERE mission_id = ? ORDER BY id",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Soldier::from).collect())
    }

    async fn vehicles_by_mission(&self, mission_id: i64) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query_as::<_, VehicleRow>(
            "SELECT * FROM vehicles WHERE mission_id = ? ORDER BY id",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    async fn soldier_states_by_soldier(&self, soldier_id: i64) -> Result<Vec<SoldierState>> {
        let rows = sqlx::query_as::<_, SoldierStateRow>(
            "SELECT * FROM soldier_states WHERE soldier_id = ? ORDER BY capture_frame, time",
        )
        .bind(soldier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SoldierState::from).collect())
    }

    async fn vehicle_states_by_vehicle(&self, vehicle_id: i64) -> Result<Vec<VehicleState>> {
        let rows = sqlx::query_as::<_, VehicleStateRow>(
            "SELECT * FROM vehicle_states WHERE vehicle_id = ? ORDER BY capture_frame, time",
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VehicleState::from).collect())
    }

    async fn fired_events_by_soldier(&self, soldier_id: i64) -> Result<Vec<FiredEvent>> {
        let rows = sqlx::query_as::<_, FiredEventRow>(
            "SELECT * FROM fired_events WHERE soldier_id = ? ORDER BY capture_frame, time",
        )
        .bind(soldier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FiredEvent::from).collect())
    }

    async fn general_events_by_mission(&self, mission_id: i64) -> Result<Vec<GeneralEvent>> {
        let rows = sqlx::query_as::<_, GeneralEventRow>(
            "SELECT * FROM general_events WHERE mission_id = ? ORDER BY capture_frame, time",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(GeneralEvent::from).collect())
    }

    async fn hit_events_by_mission(&self, mission_id: i64) -> Result<Vec<HitEvent>> {
        let rows = sqlx::query_as::<_, HitEventRow>(
            "SELECT * FROM hit_events WHERE mission_id = ? ORDER BY capture_frame, time",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HitEvent::from).collect())
    }

    async fn kill_events_by_mission(&self, mission_id: i64) -> Result<Vec<KillEvent>> {
        let rows = sqlx::query_as::<_, KillEventRow>(
            "SELECT * FROM kill_events WHERE mission_id = ? ORDER BY capture_frame, time",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(KillEvent::from).collect())
    }

    async fn chat_events_by_mission(&self, mission_id: i64) -> Result<Vec<ChatEvent>> {
        let rows = sqlx::query_as::<_, ChatEventRow>(
            "SELECT * FROM chat_events WHERE mission_id = ? ORDER BY capture_frame, time",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChatEvent::from).collect())
    }

    async fn radio_events_by_mission(&self, mission_id: i64) -> Result<Vec<RadioEvent>> {
        let rows = sqlx::query_as::<_, RadioEventRow>(
            "SELECT * FROM radio_events WHERE mission_id = ? ORDER BY capture_frame, time",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RadioEvent::from).collect())
    }

    async fn fps_events_by_mission(&self, mission_id: i64) -> Result<Vec<ServerFpsEvent>> {
        let rows = sqlx::query_as::<_, FpsEventRow>(
            "SELECT * FROM server_fps_events WHERE mission_id = ? ORDER BY time",
        )
        .bind(mission_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ServerFpsEvent::from).collect())
    }

    async fn last_soldier_state_frame(&self, mission_id: i64) -> Result<Option<u32>> {
        let frame = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(capture_frame) FROM soldier_states WHERE mission_id = ?",
        )
        .bind(mission_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(frame.map(|f| f as u32))
    }

    async fn last_vehicle_state_frame(&self, mission_id: i64) -> Result<Option<u32>> {
        let frame = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(capture_frame) FROM vehicle_states WHERE mission_id = ?",
        )
        .bind(mission_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(frame.map(|f| f as u32))
    }
}

#[async_trait]
impl MaintenanceRepository for SqliteStorage {
    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn seed_group_info(&self) -> Result<()> {
        let info = GroupInfo::default();
        sqlx::query(
            "INSERT INTO group_info (group_name, group_description, group_website, group_logo) \
             SELECT ?, ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM group_info)",
        )
        .bind(&info.group_name)
        .bind(&info.group_description)
        .bind(&info.group_website)
        .bind(&info.group_logo)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn reduce_soldier_states(&self, mission_id: i64, stride: u32) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM soldier_states WHERE mission_id = ? AND capture_frame % ? != 0",
        )
        .bind(mission_id)
        .bind(i64::from(stride))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn batch_size(&self) -> usize {
        BATCH_SIZE
    }
}
