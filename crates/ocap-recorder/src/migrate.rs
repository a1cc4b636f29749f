//! Backup migration: copy every on-disk embedded snapshot into the
//! server-class store.
//!
//! Row ids are reassigned on insert, so soldier and vehicle references are
//! remapped as each mission is copied. Addon join rows are not carried
//! over; snapshots predate the information needed to rebuild them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::config::{install_dir, Config};
use ocap_domain::{ChatEvent, FiredEvent, HitEvent, KillEvent, RadioEvent, Soldier, SoldierState, Vehicle, VehicleState};
use ocap_persistence::repository::{PostgresStorage, SqliteStorage};
use ocap_persistence::{
    EntityRepository, EventRepository, ExportRepository, MaintenanceRepository, MissionRepository,
    NewChatEvent, NewFiredEvent, NewFpsEvent, NewGeneralEvent, NewHitEvent, NewKillEvent,
    NewMission, NewRadioEvent, NewSoldier, NewSoldierState, NewVehicle, NewVehicleState, NewWorld,
    Storage, TimelineRepository,
};

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let target = PostgresStorage::connect(&config.db)
        .await
        .context("server-class store is required for migratebackups")?;
    target.migrate().await?;
    target.seed_group_info().await?;

    let backups = find_backups(&install_dir())?;
    if backups.is_empty() {
        info!("no embedded backups found");
        return Ok(());
    }

    for path in backups {
        info!(path = %path.display(), "migrating backup");
        let source = match SqliteStorage::open_file(&path).await {
            Ok(source) => source,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "backup unreadable, skipped");
                continue;
            }
        };

        for mission_id in source.list_mission_ids().await? {
            match copy_mission(&source, &target, mission_id).await {
                Ok(rows) => info!(mission_id, rows, "mission copied"),
                Err(e) => warn!(mission_id, error = %e, "mission copy failed"),
            }
        }
    }

    Ok(())
}

fn find_backups(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut backups = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("ocap_") && name.ends_with(".db") {
            backups.push(path);
        }
    }
    backups.sort();
    Ok(backups)
}

/// Copy one mission and all of its child rows, remapping entity ids.
/// Returns the number of child rows written.
async fn copy_mission(
    source: &dyn Storage,
    target: &dyn Storage,
    mission_id: i64,
) -> anyhow::Result<u64> {
    let mission = source
        .get_mission(mission_id)
        .await?
        .context("mission vanished mid-copy")?;
    let world = source
        .get_world(mission.world_id)
        .await?
        .context("world vanished mid-copy")?;

    let new_world = target
        .find_or_create_world(&NewWorld {
            author: world.author,
            workshop_id: world.workshop_id,
            display_name: world.display_name,
            world_name: world.world_name,
            world_name_original: world.world_name_original,
            world_size: world.world_size,
            latitude: world.latitude,
            longitude: world.longitude,
            location: world.location,
        })
        .await?;

    let new_mission = target
        .create_mission(
            &NewMission {
                mission_name: mission.mission_name,
                briefing_name: mission.briefing_name,
                mission_name_source: mission.mission_name_source,
                on_load_name: mission.on_load_name,
                author: mission.author,
                server_name: mission.server_name,
                server_profile: mission.server_profile,
                start_time: mission.start_time,
                capture_delay: mission.capture_delay,
                addon_version: mission.addon_version,
                extension_version: mission.extension_version,
                extension_build: mission.extension_build,
                tag: mission.tag,
                world_id: new_world.id,
            },
            &[],
        )
        .await?;

    let mut rows = 0u64;

    // Soldiers and vehicles first; their fresh ids key everything else
    let soldiers = source.soldiers_by_mission(mission_id).await?;
    let new_soldiers: Vec<NewSoldier> = soldiers
        .iter()
        .map(|s| soldier_record(s, new_mission.id))
        .collect();
    let soldier_ids = target.insert_soldiers(&new_soldiers).await?;
    let soldier_map: HashMap<i64, i64> = soldiers
        .iter()
        .map(|s| s.id)
        .zip(soldier_ids.iter().copied())
        .collect();
    rows += soldier_map.len() as u64;

    let vehicles = source.vehicles_by_mission(mission_id).await?;
    let new_vehicles: Vec<NewVehicle> = vehicles
        .iter()
        .map(|v| vehicle_record(v, new_mission.id))
        .collect();
    let vehicle_ids = target.insert_vehicles(&new_vehicles).await?;
    let vehicle_map: HashMap<i64, i64> = vehicles
        .iter()
        .map(|v| v.id)
        .zip(vehicle_ids.iter().copied())
        .collect();
    rows += vehicle_map.len() as u64;

    for soldier in &soldiers {
        let Some(&new_id) = soldier_map.get(&soldier.id) else {
            continue;
        };

        let states: Vec<NewSoldierState> = source
            .soldier_states_by_soldier(soldier.id)
            .await?
            .into_iter()
            .map(|s| soldier_state_record(s, new_id, new_mission.id))
            .collect();
        rows += target.insert_soldier_states(&states).await?;

        let fired: Vec<NewFiredEvent> = source
            .fired_events_by_soldier(soldier.id)
            .await?
            .into_iter()
            .map(|f| fired_record(f, new_id, new_mission.id))
            .collect();
        rows += target.insert_fired_events(&fired).await?;
    }

    for vehicle in &vehicles {
        let Some(&new_id) = vehicle_map.get(&vehicle.id) else {
            continue;
        };
        let states: Vec<NewVehicleState> = source
            .vehicle_states_by_vehicle(vehicle.id)
            .await?
            .into_iter()
            .map(|s| vehicle_state_record(s, new_id, new_mission.id))
            .collect();
        rows += target.insert_vehicle_states(&states).await?;
    }

    let general: Vec<NewGeneralEvent> = source
        .general_events_by_mission(mission_id)
        .await?
        .into_iter()
        .map(|e| NewGeneralEvent {
            mission_id: new_mission.id,
            capture_frame: e.capture_frame,
            time: e.time,
            name: e.name,
            message: e.message,
            extra_data: e.extra_data,
        })
        .collect();
    rows += target.insert_general_events(&general).await?;

    let hits: Vec<NewHitEvent> = source
        .hit_events_by_mission(mission_id)
        .await?
        .into_iter()
        .map(|e| hit_record(e, new_mission.id, &soldier_map, &vehicle_map))
        .collect();
    rows += target.insert_hit_events(&hits).await?;

    let kills: Vec<NewKillEvent> = source
        .kill_events_by_mission(mission_id)
        .await?
        .into_iter()
        .map(|e| kill_record(e, new_mission.id, &soldier_map, &vehicle_map))
        .collect();
    rows += target.insert_kill_events(&kills).await?;

    let chat: Vec<NewChatEvent> = source
        .chat_events_by_mission(mission_id)
        .await?
        .into_iter()
        .map(|e| chat_record(e, new_mission.id, &soldier_map))
        .collect();
    rows += target.insert_chat_events(&chat).await?;

    let radio: Vec<NewRadioEvent> = source
        .radio_events_by_mission(mission_id)
        .await?
        .into_iter()
        .map(|e| radio_record(e, new_mission.id, &soldier_map))
        .collect();
    rows += target.insert_radio_events(&radio).await?;

    let fps: Vec<NewFpsEvent> = source
        .fps_events_by_mission(mission_id)
        .await?
        .into_iter()
        .map(|e| NewFpsEvent {
            mission_id: new_mission.id,
            time: e.time,
            fps_average: e.fps_average,
            fps_min: e.fps_min,
        })
        .collect();
    rows += target.insert_fps_events(&fps).await?;

    Ok(rows)
}

fn soldier_record(s: &Soldier, mission_id: i64) -> NewSoldier {
    NewSoldier {
        mission_id,
        join_frame: s.join_frame,
        join_time: s.join_time,
        ocap_id: s.ocap_id,
        unit_name: s.unit_name.clone(),
        group_id: s.group_id.clone(),
        side: s.side,
        is_player: s.is_player,
        role_description: s.role_description.clone(),
        class_name: s.class_name.clone(),
        display_name: s.display_name.clone(),
        player_uid: s.player_uid.clone(),
    }
}

fn vehicle_record(v: &Vehicle, mission_id: i64) -> NewVehicle {
    NewVehicle {
        mission_id,
        join_frame: v.join_frame,
        join_time: v.join_time,
        ocap_id: v.ocap_id,
        ocap_type: v.ocap_type.clone(),
        display_name: v.display_name.clone(),
        class_name: v.class_name.clone(),
        customization: v.customization.clone(),
    }
}

fn soldier_state_record(s: SoldierState, soldier_id: i64, mission_id: i64) -> NewSoldierState {
    NewSoldierState {
        soldier_id,
        mission_id,
        capture_frame: s.capture_frame,
        time: s.time,
        position: s.position,
        bearing: s.bearing,
        lifestate: s.lifestate,
        in_vehicle: s.in_vehicle,
        unit_name: s.unit_name,
        is_player: s.is_player,
        current_role: s.current_role,
        has_stable_vitals: s.has_stable_vitals,
        is_dragged_carried: s.is_dragged_carried,
        scores: s.scores,
        vehicle_role: s.vehicle_role,
    }
}

fn vehicle_state_record(s: VehicleState, vehicle_id: i64, mission_id: i64) -> NewVehicleState {
    NewVehicleState {
        vehicle_id,
        mission_id,
        capture_frame: s.capture_frame,
        time: s.time,
        position: s.position,
        bearing: s.bearing,
        is_alive: s.is_alive,
        crew: s.crew,
        fuel: s.fuel,
        damage: s.damage,
        engine_on: s.engine_on,
        locked: s.locked,
        side: s.side,
    }
}

fn fired_record(f: FiredEvent, soldier_id: i64, mission_id: i64) -> NewFiredEvent {
    NewFiredEvent {
        soldier_id,
        mission_id,
        capture_frame: f.capture_frame,
        time: f.time,
        start_position: f.start_position,
        end_position: f.end_position,
        weapon: f.weapon,
        magazine: f.magazine,
        firing_mode: f.firing_mode,
    }
}

fn hit_record(
    e: HitEvent,
    mission_id: i64,
    soldiers: &HashMap<i64, i64>,
    vehicles: &HashMap<i64, i64>,
) -> NewHitEvent {
    NewHitEvent {
        mission_id,
        capture_frame: e.capture_frame,
        time: e.time,
        victim_soldier: e.victim_soldier.and_then(|id| soldiers.get(&id).copied()),
        victim_vehicle: e.victim_vehicle.and_then(|id| vehicles.get(&id).copied()),
        shooter_soldier: e.shooter_soldier.and_then(|id| soldiers.get(&id).copied()),
        shooter_vehicle: e.shooter_vehicle.and_then(|id| vehicles.get(&id).copied()),
        event_text: e.event_text,
        distance: e.distance,
    }
}

fn kill_record(
    e: KillEvent,
    mission_id: i64,
    soldiers: &HashMap<i64, i64>,
    vehicles: &HashMap<i64, i64>,
) -> NewKillEvent {
    NewKillEvent {
        mission_id,
        capture_frame: e.capture_frame,
        time: e.time,
        victim_soldier: e.victim_soldier.and_then(|id| soldiers.get(&id).copied()),
        victim_vehicle: e.victim_vehicle.and_then(|id| vehicles.get(&id).copied()),
        killer_soldier: e.killer_soldier.and_then(|id| soldiers.get(&id).copied()),
        killer_vehicle: e.killer_vehicle.and_then(|id| vehicles.get(&id).copied()),
        event_text: e.event_text,
        distance: e.distance,
    }
}

fn chat_record(e: ChatEvent, mission_id: i64, soldiers: &HashMap<i64, i64>) -> NewChatEvent {
    NewChatEvent {
        mission_id,
        soldier_id: e.soldier_id.and_then(|id| soldiers.get(&id).copied()),
        capture_frame: e.capture_frame,
        time: e.time,
        channel: e.channel,
        from_name: e.from_name,
        sender_name: e.sender_name,
        message: e.message,
        player_uid: e.player_uid,
    }
}

fn radio_record(e: RadioEvent, mission_id: i64, soldiers: &HashMap<i64, i64>) -> NewRadioEvent {
    NewRadioEvent {
        mission_id,
        soldier_id: e.soldier_id.and_then(|id| soldiers.get(&id).copied()),
        capture_frame: e.capture_frame,
        time: e.time,
        radio: e.radio,
        radio_type: e.radio_type,
        transmission: e.transmission,
        channel: e.channel,
        is_additional: e.is_additional,
        frequency: e.frequency,
        code: e.code,
    }
}
