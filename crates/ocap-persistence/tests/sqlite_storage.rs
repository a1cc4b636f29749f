//! End-to-end checks for the embedded driver: schema bootstrap, batch
//! inserts, association lookups, reduction, and snapshots.

use chrono::{TimeZone, Utc};

use ocap_domain::{Lifestate, Position, Scores, Side};
use ocap_persistence::repository::SqliteStorage;
use ocap_persistence::{
    EntityRepository, EventRepository, ExportRepository, MaintenanceRepository, MissionRepository,
    NewAddon, NewGeneralEvent, NewMission, NewSoldier, NewSoldierState, NewVehicle,
    NewVehicleState, NewWorld, TimelineRepository,
};

async fn storage_with_mission() -> (SqliteStorage, i64) {
    let storage = SqliteStorage::connect_in_memory().await.unwrap();
    storage.migrate().await.unwrap();
    storage.seed_group_info().await.unwrap();

    let world = storage
        .find_or_create_world(&NewWorld {
            author: "BI".into(),
            workshop_id: "123".into(),
            display_name: "Altis".into(),
            world_name: "altis".into(),
            world_name_original: "Altis".into(),
            world_size: 30720.0,
            latitude: 35.0,
            longitude: 25.0,
            location: Position::new(2_782_987.0, 4_163_881.0, 0.0),
        })
        .await
        .unwrap();

    let mission = storage
        .create_mission(
            &NewMission {
                mission_name: "Operation Test".into(),
                briefing_name: "op_test".into(),
                mission_name_source: "op_test.altis".into(),
                on_load_name: String::new(),
                author: "author".into(),
                server_name: "srv".into(),
                server_profile: "profile".into(),
                start_time: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 0).unwrap(),
                capture_delay: 1.0,
                addon_version: "1.0".into(),
                extension_version: "2.0".into(),
                extension_build: "abc".into(),
                tag: "Op".into(),
                world_id: world.id,
            },
            &[
                NewAddon {
                    name: "ace".into(),
                    workshop_id: "463939057".into(),
                },
                NewAddon {
                    name: "cba_a3".into(),
                    workshop_id: "450814997".into(),
                },
            ],
        )
        .await
        .unwrap();

    (storage, mission.id)
}

fn soldier(mission_id: i64, ocap_id: u16, join_frame: u32) -> NewSoldier {
    NewSoldier {
        mission_id,
        join_frame,
        join_time: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 5).unwrap(),
        ocap_id,
        unit_name: format!("Unit {ocap_id}"),
        group_id: "Alpha 1-1".into(),
        side: Side::West,
        is_player: false,
        role_description: "Rifleman".into(),
        class_name: "B_Soldier_F".into(),
        display_name: "Rifleman".into(),
        player_uid: String::new(),
    }
}

fn soldier_state(soldier_id: i64, mission_id: i64, frame: u32) -> NewSoldierState {
    NewSoldierState {
        soldier_id,
        mission_id,
        capture_frame: frame,
        time: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 5).unwrap(),
        position: Position::new(1000.0 + f64::from(frame), 2000.0, 12.5),
        bearing: 90,
        lifestate: Lifestate::Alive,
        in_vehicle: false,
        unit_name: "Unit".into(),
        is_player: false,
        current_role: "Rifleman".into(),
        has_stable_vitals: true,
        is_dragged_carried: false,
        scores: Scores::default(),
        vehicle_role: String::new(),
    }
}

#[tokio::test]
async fn test_unreachable_primary_promotes_fallback() {
    let config = ocap_persistence::DbConfig {
        host: "127.0.0.1".into(),
        // Nothing listens here
        port: 1,
        ..Default::default()
    };

    let backend = ocap_persistence::connect(&config).await.unwrap();
    assert_eq!(backend.driver(), ocap_persistence::Driver::Sqlite);
    assert!(backend.as_sqlite().is_some());
    assert!(ocap_persistence::using_local());

    let storage = backend.storage();
    storage.migrate().await.unwrap();
    storage.ping().await.unwrap();
}

#[tokio::test]
async fn test_world_created_lazily_once() {
    let (storage, _mission_id) = storage_with_mission().await;

    let again = storage
        .find_or_create_world(&NewWorld {
            author: "someone else".into(),
            workshop_id: String::new(),
            display_name: "Altis".into(),
            world_name: "altis".into(),
            world_name_original: "Altis".into(),
            world_size: 30720.0,
            latitude: 35.0,
            longitude: 25.0,
            location: Position::default(),
        })
        .await
        .unwrap();

    // Same canonical name resolves to the original row
    assert_eq!(again.author, "BI");
}

#[tokio::test]
async fn test_soldier_lookup_prefers_latest_join() {
    let (storage, mission_id) = storage_with_mission().await;

    let ids = storage
        .insert_soldiers(&[soldier(mission_id, 7, 0), soldier(mission_id, 7, 120)])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    let found = storage.find_soldier(mission_id, 7).await.unwrap().unwrap();
    assert_eq!(found.join_frame, 120);
    assert_eq!(found.id, ids[1]);

    assert!(storage.find_soldier(mission_id, 99).await.unwrap().is_none());
}

#[tokio::test]
async fn test_soldier_states_round_trip_in_frame_order() {
    let (storage, mission_id) = storage_with_mission().await;

    let ids = storage
        .insert_soldiers(&[soldier(mission_id, 1, 0)])
        .await
        .unwrap();
    let soldier_id = ids[0];

    // Insert out of order; reads must come back sorted
    let states = vec![
        soldier_state(soldier_id, mission_id, 12),
        soldier_state(soldier_id, mission_id, 10),
        soldier_state(soldier_id, mission_id, 11),
    ];
    let inserted = storage.insert_soldier_states(&states).await.unwrap();
    assert_eq!(inserted, 3);

    let read = storage
        .soldier_states_by_soldier(soldier_id)
        .await
        .unwrap();
    let frames: Vec<u32> = read.iter().map(|s| s.capture_frame).collect();
    assert_eq!(frames, vec![10, 11, 12]);

    assert!((read[0].position.x - 1010.0).abs() < 1e-9);
    assert!((read[0].position.z - 12.5).abs() < 1e-6);
    assert_eq!(read[0].lifestate, Lifestate::Alive);

    let last = storage
        .last_soldier_state_frame(mission_id)
        .await
        .unwrap();
    assert_eq!(last, Some(12));
}

#[tokio::test]
async fn test_vehicle_states_and_last_frame() {
    let (storage, mission_id) = storage_with_mission().await;

    let ids = storage
        .insert_vehicles(&[NewVehicle {
            mission_id,
            join_frame: 4,
            join_time: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 9).unwrap(),
            ocap_id: 1,
            ocap_type: "car".into(),
            display_name: "Hunter".into(),
            class_name: "B_MRAP_01_F".into(),
            customization: String::new(),
        }])
        .await
        .unwrap();

    let states: Vec<NewVehicleState> = (10..=14)
        .map(|frame| NewVehicleState {
            vehicle_id: ids[0],
            mission_id,
            capture_frame: frame,
            time: Utc.with_ymd_and_hms(2026, 7, 1, 18, 0, 10).unwrap(),
            position: Position::new(500.0, 600.0, 0.0),
            bearing: 180,
            is_alive: true,
            crew: "1,2".into(),
            fuel: 0.9,
            damage: 0.0,
            engine_on: true,
            locked: false,
            side: Side::West,
        })
        .collect();
    storage.insert_vehicle_states(&states).await.unwrap();

    let read = storage.vehicle_states_by_vehicle(ids[0]).await.unwrap();
    assert_eq!(read.len(), 5);
    assert_eq!(read[0].crew, "1,2");
    assert!((read[0].fuel - 0.9).abs() < 1e-6);

    assert_eq!(
        storage.last_vehicle_state_frame(mission_id).await.unwrap(),
        Some(14)
    );
}

#[tokio::test]
async fn test_reduce_keeps_only_stride_frames() {
    let (storage, mission_id) = storage_with_mission().await;

    let ids = storage
        .insert_soldiers(&[soldier(mission_id, 1, 0)])
        .await
        .unwrap();

    let states: Vec<NewSoldierState> = (0..20)
        .map(|frame| soldier_state(ids[0], mission_id, frame))
        .collect();
    storage.insert_soldier_states(&states).await.unwrap();

    let removed = storage.reduce_soldier_states(mission_id, 5).await.unwrap();
    assert_eq!(removed, 16);
    storage.vacuum().await.unwrap();

    let left = storage.soldier_states_by_soldier(ids[0]).await.unwrap();
    let frames: Vec<u32> = left.iter().map(|s| s.capture_frame).collect();
    assert_eq!(frames, vec![0, 5, 10, 15]);
}

#[tokio::test]
async fn test_general_event_extra_data_round_trip() {
    let (storage, mission_id) = storage_with_mission().await;

    storage
        .insert_general_events(&[NewGeneralEvent {
            mission_id,
            capture_frame: 900,
            time: Utc.with_ymd_and_hms(2026, 7, 1, 19, 0, 0).unwrap(),
            name: "endMission".into(),
            message: String::new(),
            extra_data: Some(serde_json::json!({"winSide": "WEST", "message": "BLUFOR wins"})),
        }])
        .await
        .unwrap();

    let events = storage.general_events_by_mission(mission_id).await.unwrap();
    assert_eq!(events.len(), 1);
    let extra = events[0].extra_data.as_ref().unwrap();
    assert_eq!(extra["winSide"], "WEST");
}

#[tokio::test]
async fn test_snapshot_writes_file() {
    let (storage, mission_id) = storage_with_mission().await;
    storage
        .insert_soldiers(&[soldier(mission_id, 1, 0)])
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ocap_20260701_180000.db");
    storage.snapshot_into(&path).await.unwrap();
    assert!(path.metadata().unwrap().len() > 0);

    // The snapshot is itself a usable database
    let reopened = SqliteStorage::open_file(&path).await.unwrap();
    let soldiers = reopened.soldiers_by_mission(mission_id).await.unwrap();
    assert_eq!(soldiers.len(), 1);
}
