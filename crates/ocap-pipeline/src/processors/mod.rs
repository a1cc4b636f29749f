//! # Processors
//!
//! One long-running task per producer channel. Each drains payloads,
//! parses fields, resolves parent associations, and pushes typed records
//! onto the per-kind write queues.
//!
//! Parent lookups go through the association cache first, then storage.
//! A child whose parent cannot be found is dropped: silently when its
//! capture frame is inside the grace window (parent inserts race child
//! inserts across independent queues), with an error log otherwise.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::cache::AssociationCache;
use crate::context::MissionContext;
use crate::error::{PipelineError, Result};
use crate::host::SharedCallback;
use crate::queues::WriteQueues;
use crate::router::{Payload, Receivers};
use crate::{Flags, EARLY_ASSOCIATION_FRAMES};
use ocap_domain::EntityRef;
use ocap_persistence::{EntityRepository, Storage};

mod combat;
mod events;
mod mission;
mod soldier;
mod vehicle;

/// Everything a processor needs, cloned per task.
#[derive(Clone)]
pub struct ProcessorCtx {
    pub storage: Arc<dyn Storage>,
    pub queues: Arc<WriteQueues>,
    pub cache: Arc<AssociationCache>,
    pub context: Arc<MissionContext>,
    pub flags: Arc<Flags>,
    pub callback: SharedCallback,
    /// Tag for missions whose payload carries none
    pub default_tag: String,
}

/// Spawn every payload processor. The init receiver has already served its
/// purpose by the time this runs.
pub fn spawn_processors(receivers: Receivers, ctx: &ProcessorCtx) -> Vec<JoinHandle<()>> {
    let Receivers {
        init: _,
        missions,
        soldiers,
        soldier_states,
        vehicles,
        vehicle_states,
        fired,
        general,
        hits,
        kills,
        chat,
        radio,
        fps,
    } = receivers;

    vec![
        tokio::spawn(run_loop("missions", missions, ctx.clone(), mission::handle)),
        tokio::spawn(run_loop("soldiers", soldiers, ctx.clone(), soldier::handle_new)),
        tokio::spawn(run_loop(
            "soldier_states",
            soldier_states,
            ctx.clone(),
            soldier::handle_state,
        )),
        tokio::spawn(run_loop("vehicles", vehicles, ctx.clone(), vehicle::handle_new)),
        tokio::spawn(run_loop(
            "vehicle_states",
            vehicle_states,
            ctx.clone(),
            vehicle::handle_state,
        )),
        tokio::spawn(run_loop("fired", fired, ctx.clone(), combat::handle_fired)),
        tokio::spawn(run_loop("general", general, ctx.clone(), events::handle_general)),
        tokio::spawn(run_loop("hits", hits, ctx.clone(), combat::handle_hit)),
        tokio::spawn(run_loop("kills", kills, ctx.clone(), combat::handle_kill)),
        tokio::spawn(run_loop("chat", chat, ctx.clone(), events::handle_chat)),
        tokio::spawn(run_loop("radio", radio, ctx.clone(), events::handle_radio)),
        tokio::spawn(run_loop("fps", fps, ctx.clone(), events::handle_fps)),
    ]
}

/// Shared drain loop. Exits when the channel closes or storage goes
/// invalid. Per-record failures never take the task down; the logging
/// policy per error kind lives here so processors just return errors.
async fn run_loop<F, Fut>(
    name: &'static str,
    mut rx: mpsc::Receiver<Payload>,
    ctx: ProcessorCtx,
    handler: F,
) where
    F: Fn(ProcessorCtx, Payload) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    while let Some(payload) = rx.recv().await {
        if !ctx.flags.storage_valid() {
            break;
        }

        match handler(ctx.clone(), payload).await {
            Ok(()) => {}
            // Grace window: parent insert simply hasn't been flushed yet
            Err(PipelineError::TooEarlyForAssociation) => {}
            Err(PipelineError::NoMission) => {
                debug!(processor = name, "payload before any mission, dropped");
            }
            Err(e) => {
                error!(processor = name, error = %e, "payload dropped");
            }
        }
    }
    debug!(processor = name, "processor stopped");
}

/// Mission id from the context snapshot, or `NoMission` before the first
/// `:NEW:MISSION:`.
fn current_mission_id(ctx: &ProcessorCtx) -> Result<i64> {
    let current = ctx.context.current();
    if current.is_loaded() {
        Ok(current.mission.id)
    } else {
        Err(PipelineError::NoMission)
    }
}

/// Resolve a soldier parent: cache, then storage, then the grace-window
/// decision.
async fn resolve_soldier(
    ctx: &ProcessorCtx,
    mission_id: i64,
    ocap_id: u16,
    capture_frame: u32,
) -> Result<i64> {
    if let Some(id) = ctx.cache.soldier(mission_id, ocap_id) {
        return Ok(id);
    }
    if let Some(soldier) = ctx.storage.find_soldier(mission_id, ocap_id).await? {
        ctx.cache.insert_soldier(mission_id, ocap_id, soldier.id);
        return Ok(soldier.id);
    }
    if capture_frame < EARLY_ASSOCIATION_FRAMES {
        Err(PipelineError::TooEarlyForAssociation)
    } else {
        Err(PipelineError::MissingAssociation {
            parent: "soldier",
            ocap_id,
            mission_id,
        })
    }
}

/// Resolve a vehicle parent, same contract as [`resolve_soldier`].
async fn resolve_vehicle(
    ctx: &ProcessorCtx,
    mission_id: i64,
    ocap_id: u16,
    capture_frame: u32,
) -> Result<i64> {
    if let Some(id) = ctx.cache.vehicle(mission_id, ocap_id) {
        return Ok(id);
    }
    if let Some(vehicle) = ctx.storage.find_vehicle(mission_id, ocap_id).await? {
        ctx.cache.insert_vehicle(mission_id, ocap_id, vehicle.id);
        return Ok(vehicle.id);
    }
    if capture_frame < EARLY_ASSOCIATION_FRAMES {
        Err(PipelineError::TooEarlyForAssociation)
    } else {
        Err(PipelineError::MissingAssociation {
            parent: "vehicle",
            ocap_id,
            mission_id,
        })
    }
}

/// Resolve an id that may belong to either table. Soldiers and vehicles can
/// share an ocap id, so the soldier table is always tried first.
async fn resolve_entity(
    ctx: &ProcessorCtx,
    mission_id: i64,
    ocap_id: u16,
    capture_frame: u32,
) -> Result<EntityRef> {
    if let Some(id) = ctx.cache.soldier(mission_id, ocap_id) {
        return Ok(EntityRef::Soldier(id));
    }
    if let Some(soldier) = ctx.storage.find_soldier(mission_id, ocap_id).await? {
        ctx.cache.insert_soldier(mission_id, ocap_id, soldier.id);
        return Ok(EntityRef::Soldier(soldier.id));
    }
    if let Some(id) = ctx.cache.vehicle(mission_id, ocap_id) {
        return Ok(EntityRef::Vehicle(id));
    }
    if let Some(vehicle) = ctx.storage.find_vehicle(mission_id, ocap_id).await? {
        ctx.cache.insert_vehicle(mission_id, ocap_id, vehicle.id);
        return Ok(EntityRef::Vehicle(vehicle.id));
    }
    if capture_frame < EARLY_ASSOCIATION_FRAMES {
        Err(PipelineError::TooEarlyForAssociation)
    } else {
        Err(PipelineError::MissingAssociation {
            parent: "soldier or vehicle",
            ocap_id,
            mission_id,
        })
    }
}
