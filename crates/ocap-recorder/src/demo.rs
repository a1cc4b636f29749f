//! Synthetic mission generator.
//!
//! Drives the real ingest entry point with a scripted firefight: a platoon
//! of soldiers and a few vehicles walking noisy paths, firing, taking hits,
//! chatting, plus FPS samples. Everything goes through `Router::dispatch`,
//! so the full pipeline (channels, processors, writer, storage) is
//! exercised exactly as by a live host.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_json::json;
use tracing::info;

use crate::config::{install_dir, Config};
use ocap_pipeline::host::{encode_field, LogCallback};
use ocap_pipeline::{build, ChannelCapacities, Controller, ControllerConfig, Router};

#[derive(Debug, Clone, Copy)]
pub struct DemoArgs {
    pub ticks: u32,
    pub soldiers: usize,
    pub vehicles: usize,
    pub tick_ms: u64,
}

struct DemoUnit {
    ocap_id: u16,
    x: f64,
    y: f64,
    bearing: u16,
    side: &'static str,
    alive: bool,
}

pub async fn run(config: Config, args: DemoArgs) -> anyhow::Result<()> {
    let (router, receivers) = build(&ChannelCapacities::default());

    let mut controller_config = ControllerConfig::new(config.db.clone(), install_dir());
    controller_config.default_tag = config.default_tag.clone();
    let controller = Arc::new(Controller::new(controller_config, Arc::new(LogCallback)));

    let run_controller = controller.clone();
    let run_router = router.clone();
    tokio::spawn(async move {
        run_controller.run(receivers, run_router).await;
    });

    // Same handshake a live host performs
    router.dispatch(":INIT:DB:", Vec::new());
    wait_for(|| controller.storage().is_some(), Duration::from_secs(30)).await?;

    dispatch_mission(&router, &config);
    wait_for(
        || controller.context.current().is_loaded(),
        Duration::from_secs(10),
    )
    .await?;

    let mut rng = rand::thread_rng();
    let walk_noise = Normal::new(0.0, 2.5).unwrap();

    let mut units: Vec<DemoUnit> = (0..args.soldiers)
        .map(|i| DemoUnit {
            ocap_id: (i + 1) as u16,
            x: 2000.0 + rng.gen_range(-200.0..200.0),
            y: 2000.0 + rng.gen_range(-200.0..200.0),
            bearing: rng.gen_range(0..360),
            side: if i % 2 == 0 { "WEST" } else { "EAST" },
            alive: true,
        })
        .collect();

    let mut rigs: Vec<DemoUnit> = (0..args.vehicles)
        .map(|i| DemoUnit {
            ocap_id: (100 + i) as u16,
            x: 2500.0,
            y: 1800.0 + (i as f64) * 50.0,
            bearing: 90,
            side: "WEST",
            alive: true,
        })
        .collect();

    for unit in &units {
        router.dispatch(
            ":NEW:SOLDIER:",
            vec![
                "0".into(),
                unit.ocap_id.to_string(),
                encode_field(&format!("Demo {}", unit.ocap_id)),
                encode_field(if unit.side == "WEST" { "Alpha 1-1" } else { "Omega 1-1" }),
                unit.side.into(),
                "false".into(),
                encode_field("Rifleman"),
                encode_field("B_Soldier_F"),
                encode_field("Rifleman"),
                encode_field(""),
            ],
        );
    }
    for rig in &rigs {
        router.dispatch(
            ":NEW:VEHICLE:",
            vec![
                "0".into(),
                rig.ocap_id.to_string(),
                encode_field("car"),
                encode_field("Hunter"),
                encode_field("B_MRAP_01_F"),
                encode_field(""),
            ],
        );
    }

    for frame in 0..args.ticks {
        for unit in &mut units {
            if !unit.alive {
                continue;
            }
            unit.x += walk_noise.sample(&mut rng);
            unit.y += walk_noise.sample(&mut rng);
            unit.bearing = (u32::from(unit.bearing) + rng.gen_range(0..8)) as u16 % 360;
            dispatch_soldier_state(&router, unit, frame);

            // Occasional shot toward a point downrange
            if rng.gen_bool(0.08) {
                let range = rng.gen_range(50.0..400.0);
                let rad = f64::from(unit.bearing).to_radians();
                router.dispatch(
                    ":FIRED:",
                    vec![
                        unit.ocap_id.to_string(),
                        frame.to_string(),
                        encode_field(&format!(
                            "{},{},0",
                            unit.x + rad.sin() * range,
                            unit.y + rad.cos() * range
                        )),
                        encode_field(&format!("{},{},1.5", unit.x, unit.y)),
                        encode_field("arifle_MX_F"),
                        encode_field("30Rnd_65x39_caseless_mag"),
                        encode_field("Single"),
                    ],
                );
            }
        }

        for rig in &mut rigs {
            rig.x += 1.5;
            dispatch_vehicle_state(&router, rig, frame, &units);
        }

        // A hit every so often, sometimes fatal
        if frame > 10 && rng.gen_bool(0.05) && units.len() >= 2 {
            let victim_idx = rng.gen_range(0..units.len());
            let shooter_idx = (victim_idx + 1) % units.len();
            let victim_id = units[victim_idx].ocap_id;
            let shooter_id = units[shooter_idx].ocap_id;
            let distance = rng.gen_range(20.0..350.0);

            router.dispatch(
                ":HIT:",
                vec![
                    frame.to_string(),
                    victim_id.to_string(),
                    shooter_id.to_string(),
                    encode_field("B_65x39_Caseless"),
                    format!("{distance:.1}"),
                ],
            );
            if rng.gen_bool(0.4) {
                units[victim_idx].alive = false;
                router.dispatch(
                    ":KILL:",
                    vec![
                        frame.to_string(),
                        victim_id.to_string(),
                        shooter_id.to_string(),
                        encode_field("arifle_MX_F"),
                        format!("{distance:.1}"),
                    ],
                );
            }
        }

        if frame % 30 == 0 && !units.is_empty() {
            router.dispatch(
                ":CHAT:",
                vec![
                    units[0].ocap_id.to_string(),
                    frame.to_string(),
                    "3".into(),
                    encode_field("Alpha 1-1"),
                    encode_field(&format!("Demo {}", units[0].ocap_id)),
                    encode_field(""),
                    encode_field("contact front"),
                ],
            );
        }
        if frame % 10 == 0 {
            let fps: f64 = 48.0 + walk_noise.sample(&mut rng);
            router.dispatch(
                ":FPS:",
                vec![format!("{fps:.1}"), format!("{:.1}", fps - 12.0)],
            );
        }

        tokio::time::sleep(Duration::from_millis(args.tick_ms)).await;
    }

    router.dispatch(
        ":EVENT:",
        vec![
            args.ticks.to_string(),
            encode_field("endMission"),
            encode_field(""),
            encode_field(&json!(["WEST", "Demo complete"]).to_string()),
        ],
    );

    // Let the processors drain, then flush and stop
    tokio::time::sleep(Duration::from_millis(500)).await;
    controller.shutdown().await;

    info!(
        ticks = args.ticks,
        soldiers = args.soldiers,
        vehicles = args.vehicles,
        "demo mission recorded"
    );
    Ok(())
}

fn dispatch_mission(router: &Router, config: &Config) {
    let world = json!({
        "author": "Bohemia Interactive",
        "workshopID": "107410",
        "displayName": "Altis",
        "worldName": "Altis",
        "worldSize": 30720,
        "latitude": 35.0,
        "longitude": 25.0,
    });
    let mission = json!({
        "missionName": "Demo Mission",
        "briefingName": "demo_mission",
        "missionNameSource": "demo_mission.Altis",
        "onLoadName": "",
        "author": "ocap-recorder",
        "serverName": "demo",
        "serverProfile": "demo",
        "captureDelay": 1.0,
        "tag": config.default_tag,
        "addonVersion": "1.0",
        "extensionVersion": env!("CARGO_PKG_VERSION"),
        "extensionBuild": "demo",
        "addons": [["ace", 463939057], ["cba_a3", 450814997]],
    });
    router.dispatch(
        ":NEW:MISSION:",
        vec![
            encode_field(&world.to_string()),
            encode_field(&mission.to_string()),
        ],
    );
}

fn dispatch_soldier_state(router: &Router, unit: &DemoUnit, frame: u32) {
    router.dispatch(
        ":NEW:SOLDIER:STATE:",
        vec![
            unit.ocap_id.to_string(),
            encode_field(&format!("{},{},0", unit.x, unit.y)),
            unit.bearing.to_string(),
            if unit.alive { "0" } else { "2" }.into(),
            "false".into(),
            encode_field(&format!("Demo {}", unit.ocap_id)),
            "false".into(),
            encode_field("Rifleman"),
            frame.to_string(),
            "true".into(),
            "false".into(),
            encode_field(""),
            encode_field(""),
        ],
    );
}

fn dispatch_vehicle_state(router: &Router, rig: &DemoUnit, frame: u32, units: &[DemoUnit]) {
    let crew = units
        .first()
        .map(|u| u.ocap_id.to_string())
        .unwrap_or_default();
    router.dispatch(
        ":NEW:VEHICLE:STATE:",
        vec![
            rig.ocap_id.to_string(),
            encode_field(&format!("{},{},0", rig.x, rig.y)),
            rig.bearing.to_string(),
            "true".into(),
            encode_field(&crew),
            frame.to_string(),
            "0.85".into(),
            "0".into(),
            "false".into(),
            "true".into(),
            rig.side.into(),
        ],
    );
}

async fn wait_for<F: Fn() -> bool>(ready: F, timeout: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !ready() {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("pipeline did not come up in time");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    Ok(())
}
