//! Mission telemetry recorder CLI.
//!
//! The same crate that backs the host extension doubles as the operator
//! tool: populate demo data, export recordings, decimate soldier states,
//! migrate embedded backups, and poke storage.

mod config;
mod demo;
mod logging;
mod migrate;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use config::{install_dir, Config};
use ocap_export::{Exporter, Reducer, DEFAULT_STRIDE};
use ocap_persistence::{ExportRepository, MaintenanceRepository, MissionRepository};

#[derive(Parser, Debug)]
#[command(name = "ocap-recorder")]
#[command(about = "Record, export, and maintain mission telemetry")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ocap_recorder.cfg.json next to the
    /// binary)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Populate a synthetic demo mission through the full pipeline
    Demo {
        /// Capture frames to simulate
        #[arg(long, default_value = "240")]
        ticks: u32,

        /// Soldiers in the demo platoon
        #[arg(long, default_value = "12")]
        soldiers: usize,

        /// Vehicles in the demo mission
        #[arg(long, default_value = "3")]
        vehicles: usize,

        /// Milliseconds between frames
        #[arg(long, default_value = "50")]
        tick_ms: u64,
    },

    /// Export gzipped recording(s) for the playback viewer
    Getjson {
        /// Mission ids to export
        #[arg(required = true)]
        mission_ids: Vec<i64>,

        /// Output directory (default: install directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Decimate soldier states by a frame stride and vacuum
    Reducemission {
        /// Mission ids to reduce
        #[arg(required = true)]
        mission_ids: Vec<i64>,

        /// Keep only frames divisible by this stride
        #[arg(long, default_value_t = DEFAULT_STRIDE)]
        stride: u32,
    },

    /// Copy every embedded backup in the install directory to the
    /// server-class store
    Migratebackups,

    /// Developer diagnostic: connect and run representative queries
    Testquery,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Verbs are case-insensitive
    let mut argv: Vec<String> = std::env::args().collect();
    if let Some(verb) = argv.get_mut(1) {
        if !verb.starts_with('-') {
            *verb = verb.to_lowercase();
        }
    }
    let cli = Cli::parse_from(argv);

    let config = Config::load(cli.config.as_deref());
    let _log_guards = logging::init(&config)?;

    match cli.command {
        Command::Demo {
            ticks,
            soldiers,
            vehicles,
            tick_ms,
        } => {
            demo::run(
                config,
                demo::DemoArgs {
                    ticks,
                    soldiers,
                    vehicles,
                    tick_ms,
                },
            )
            .await
        }
        Command::Getjson {
            mission_ids,
            out_dir,
        } => getjson(&config, &mission_ids, out_dir).await,
        Command::Reducemission {
            mission_ids,
            stride,
        } => reducemission(&config, &mission_ids, stride).await,
        Command::Migratebackups => migrate::run(&config).await,
        Command::Testquery => testquery(&config).await,
    }
}

async fn getjson(config: &Config, mission_ids: &[i64], out_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let out_dir = out_dir.unwrap_or_else(install_dir);
    std::fs::create_dir_all(&out_dir)?;

    let backend = ocap_persistence::connect(&config.db).await?;
    let exporter = Exporter::new(backend.storage());

    for &mission_id in mission_ids {
        let summary = exporter
            .export(mission_id, &out_dir)
            .await
            .with_context(|| format!("export of mission {mission_id} failed"))?;
        println!("{}", summary.insert_sql);
    }
    Ok(())
}

async fn reducemission(config: &Config, mission_ids: &[i64], stride: u32) -> anyhow::Result<()> {
    let backend = ocap_persistence::connect(&config.db).await?;
    let reducer = Reducer::new(backend.storage());

    for &mission_id in mission_ids {
        let removed = reducer.reduce(mission_id, stride).await?;
        println!("mission {mission_id}: removed {removed} soldier states (stride {stride})");
    }
    Ok(())
}

async fn testquery(config: &Config) -> anyhow::Result<()> {
    let backend = ocap_persistence::connect(&config.db).await?;
    let storage = backend.storage();
    storage.ping().await?;
    println!("driver: {}", backend.driver().as_str());

    let Some(mission_id) = storage.latest_mission_id().await? else {
        println!("no missions recorded");
        return Ok(());
    };

    let mission = storage.get_mission(mission_id).await?.context("latest mission vanished")?;
    let soldiers = storage.soldiers_by_mission(mission_id).await?;
    let vehicles = storage.vehicles_by_mission(mission_id).await?;
    let general = storage.general_events_by_mission(mission_id).await?;
    let hits = storage.hit_events_by_mission(mission_id).await?;
    let kills = storage.kill_events_by_mission(mission_id).await?;

    println!(
        "mission {}: {:?} ({} soldiers, {} vehicles, {} general, {} hits, {} kills)",
        mission_id,
        mission.mission_name,
        soldiers.len(),
        vehicles.len(),
        general.len(),
        hits.len(),
        kills.len()
    );

    if let Some(soldier) = soldiers.first() {
        let states = storage.soldier_states_by_soldier(soldier.id).await?;
        println!(
            "first soldier ocap_id={} has {} states, last frame {:?}",
            soldier.ocap_id,
            states.len(),
            states.last().map(|s| s.capture_frame)
        );
    }

    info!("testquery complete");
    Ok(())
}
