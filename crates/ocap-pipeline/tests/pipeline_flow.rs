//! End-to-end ingest checks against the embedded store: dispatch host
//! payloads through the router, let the processors drain, flush the writer
//! once, and read the rows back.

use std::sync::Arc;
use std::time::Duration;

use ocap_pipeline::host::{encode_field, LogCallback};
use ocap_pipeline::processors::{spawn_processors, ProcessorCtx};
use ocap_pipeline::writer::flush_once;
use ocap_pipeline::{
    build, AssociationCache, ChannelCapacities, Flags, MissionContext, Router, WriteQueues,
};
use ocap_persistence::repository::SqliteStorage;
use ocap_persistence::{EntityRepository, ExportRepository, MaintenanceRepository, Storage};

struct Harness {
    router: Router,
    lite: SqliteStorage,
    storage: Arc<dyn Storage>,
    queues: Arc<WriteQueues>,
    cache: Arc<AssociationCache>,
    context: Arc<MissionContext>,
}

async fn harness() -> Harness {
    let lite = SqliteStorage::connect_in_memory().await.unwrap();
    lite.migrate().await.unwrap();
    lite.seed_group_info().await.unwrap();
    let storage: Arc<dyn Storage> = Arc::new(lite.clone());

    let queues = Arc::new(WriteQueues::new());
    let cache = Arc::new(AssociationCache::new());
    let context = Arc::new(MissionContext::new());
    let flags = Arc::new(Flags::new());
    flags.set_storage_valid(true);

    let (router, receivers) = build(&ChannelCapacities::default());
    let ctx = ProcessorCtx {
        storage: storage.clone(),
        queues: queues.clone(),
        cache: cache.clone(),
        context: context.clone(),
        flags,
        callback: Arc::new(LogCallback),
        default_tag: "Op".to_string(),
    };
    spawn_processors(receivers, &ctx);

    Harness {
        router,
        lite,
        storage,
        queues,
        cache,
        context,
    }
}

fn world_json() -> String {
    serde_json::json!({
        "author": "BI",
        "workshopID": "107410",
        "displayName": "Altis",
        "worldName": "Altis",
        "worldSize": 30720,
        "latitude": 35.0,
        "longitude": 25.0,
    })
    .to_string()
}

fn mission_json() -> String {
    serde_json::json!({
        "missionName": "Operation Harness",
        "briefingName": "op_harness",
        "missionNameSource": "op_harness.Altis",
        "onLoadName": "",
        "author": "tester",
        "serverName": "local",
        "serverProfile": "server",
        "captureDelay": 1.0,
        "tag": "TvT",
        "addonVersion": "1.0",
        "extensionVersion": "2.0",
        "extensionBuild": "test",
        "addons": [["ace", 463939057]],
    })
    .to_string()
}

async fn load_mission(h: &Harness) -> i64 {
    let ack = h.router.dispatch(
        ":NEW:MISSION:",
        vec![encode_field(&world_json()), encode_field(&mission_json())],
    );
    assert_eq!(ack, "ok");

    // Mission creation is immediate (not queued); give the processor a beat
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if h.context.current().is_loaded() {
            break;
        }
    }
    let current = h.context.current();
    assert!(current.is_loaded(), "mission never loaded");
    assert_eq!(current.mission.mission_name, "Operation Harness");
    current.mission.id
}

async fn settle(h: &Harness) {
    // Let processors drain their channels, then flush pending batches
    tokio::time::sleep(Duration::from_millis(50)).await;
    flush_once(h.storage.as_ref(), &h.queues, &h.cache).await;
}

#[tokio::test]
async fn test_soldier_then_state_lands_in_storage() {
    let h = harness().await;
    let mission_id = load_mission(&h).await;

    h.router.dispatch(
        ":NEW:SOLDIER:",
        vec![
            "0".into(),
            "1".into(),
            encode_field("Alpha"),
            encode_field("g"),
            "WEST".into(),
            "false".into(),
            encode_field("Rifleman"),
            encode_field("B_Soldier_F"),
            encode_field("Rifleman"),
            encode_field("uid-1"),
        ],
    );
    settle(&h).await;

    let soldier = h
        .storage
        .find_soldier(mission_id, 1)
        .await
        .unwrap()
        .expect("soldier row");
    assert_eq!(soldier.unit_name, "Alpha");

    h.router.dispatch(
        ":NEW:SOLDIER:STATE:",
        vec![
            "1".into(),
            encode_field("[100,200,10]"),
            "45".into(),
            "0".into(),
            "false".into(),
            encode_field("Alpha"),
            "false".into(),
            encode_field("Rifleman"),
            "5".into(),
            "false".into(),
            "false".into(),
            encode_field(""),
            encode_field("Passenger"),
        ],
    );
    settle(&h).await;

    let states = h
        .storage
        .soldier_states_by_soldier(soldier.id)
        .await
        .unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].capture_frame, 5);
    assert!((states[0].position.x - 100.0).abs() < 1e-9);
    assert!((states[0].position.y - 200.0).abs() < 1e-9);
    assert!((states[0].position.z - 10.0).abs() < 1e-6);
    assert_eq!(states[0].vehicle_role, "Passenger");

    // The writer leaves every queue empty after a full pass
    assert_eq!(h.queues.total(), 0);
}

#[tokio::test]
async fn test_early_state_grace_window() {
    let h = harness().await;
    let mission_id = load_mission(&h).await;

    let state_payload = |frame: &str| {
        vec![
            "9".into(),
            encode_field("[10,20,0]"),
            "0".into(),
            "0".into(),
            "false".into(),
            encode_field("Bravo"),
            "false".into(),
            encode_field("Rifleman"),
            frame.to_string(),
            "true".into(),
            "false".into(),
            encode_field(""),
            encode_field(""),
        ]
    };

    // Both arrive before their soldier: frame 3 is inside the grace window,
    // frame 15 is a real missing association. Either way no row lands.
    h.router.dispatch(":NEW:SOLDIER:STATE:", state_payload("3"));
    h.router.dispatch(":NEW:SOLDIER:STATE:", state_payload("15"));
    settle(&h).await;
    assert_eq!(
        h.storage.last_soldier_state_frame(mission_id).await.unwrap(),
        None
    );

    // Soldier joins; later states resolve
    h.router.dispatch(
        ":NEW:SOLDIER:",
        vec![
            "0".into(),
            "9".into(),
            encode_field("Bravo"),
            encode_field("g"),
            "EAST".into(),
            "false".into(),
            encode_field("Rifleman"),
            encode_field("O_Soldier_F"),
            encode_field("Rifleman"),
            encode_field(""),
        ],
    );
    settle(&h).await;

    h.router.dispatch(":NEW:SOLDIER:STATE:", state_payload("16"));
    settle(&h).await;
    assert_eq!(
        h.storage.last_soldier_state_frame(mission_id).await.unwrap(),
        Some(16)
    );
}

#[tokio::test]
async fn test_hit_resolution_tries_soldier_first() {
    let h = harness().await;
    let mission_id = load_mission(&h).await;

    // Soldier and vehicle share ocap id 3
    h.router.dispatch(
        ":NEW:SOLDIER:",
        vec![
            "0".into(),
            "3".into(),
            encode_field("Victim"),
            encode_field("g"),
            "WEST".into(),
            "false".into(),
            encode_field("Rifleman"),
            encode_field("B_Soldier_F"),
            encode_field("Rifleman"),
            encode_field(""),
        ],
    );
    h.router.dispatch(
        ":NEW:VEHICLE:",
        vec![
            "0".into(),
            "3".into(),
            encode_field("car"),
            encode_field("Hunter"),
            encode_field("B_MRAP_01_F"),
            encode_field(""),
        ],
    );
    h.router.dispatch(
        ":NEW:SOLDIER:",
        vec![
            "0".into(),
            "4".into(),
            encode_field("Shooter"),
            encode_field("g"),
            "EAST".into(),
            "false".into(),
            encode_field("Rifleman"),
            encode_field("O_Soldier_F"),
            encode_field("Rifleman"),
            encode_field(""),
        ],
    );
    settle(&h).await;

    h.router.dispatch(
        ":HIT:",
        vec![
            "20".into(),
            "3".into(),
            "4".into(),
            encode_field("B_556x45_Ball"),
            "120.5".into(),
        ],
    );
    settle(&h).await;

    let hits = h.storage.hit_events_by_mission(mission_id).await.unwrap();
    assert_eq!(hits.len(), 1);
    // Exactly one victim reference, and it is the soldier
    assert!(hits[0].victim_soldier.is_some());
    assert!(hits[0].victim_vehicle.is_none());
    assert!(hits[0].shooter_soldier.is_some());
    assert!((hits[0].distance - 120.5).abs() < 1e-3);
}

#[tokio::test]
async fn test_chat_and_fps_events() {
    let h = harness().await;
    let mission_id = load_mission(&h).await;

    // System chat with no soldier attached
    h.router.dispatch(
        ":CHAT:",
        vec![
            "-1".into(),
            "30".into(),
            "99".into(),
            encode_field("Server"),
            encode_field("Server"),
            encode_field(""),
            encode_field("welcome"),
        ],
    );
    h.router.dispatch(":FPS:", vec!["47.5".into(), "31.2".into()]);
    settle(&h).await;

    // Unmapped channel id 99 classifies as System, no soldier attached
    let (channel, soldier_id): (String, Option<i64>) = sqlx::query_as(
        "SELECT channel, soldier_id FROM chat_events WHERE mission_id = ?",
    )
    .bind(mission_id)
    .fetch_one(h.lite.pool())
    .await
    .unwrap();
    assert_eq!(channel, "System");
    assert_eq!(soldier_id, None);

    let fps_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM server_fps_events")
        .fetch_one(h.lite.pool())
        .await
        .unwrap();
    assert_eq!(fps_rows, 1);
    assert_eq!(h.queues.total(), 0);
}
