//! # Batched Writer
//!
//! Single task that drains every non-empty write queue each tick, one
//! transaction per kind, in a fixed parents-before-children order. A failed
//! transaction is rolled back by the driver and its batch is abandoned
//! (logged as lost) so the pipeline keeps moving.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, error};

use crate::cache::AssociationCache;
use crate::queues::WriteQueues;
use crate::Flags;
use ocap_persistence::{EntityRepository, EventRepository, Storage, TimelineRepository};

/// Tick interval between flush passes.
pub const WRITE_TICK: Duration = Duration::from_millis(750);

/// Back-off while the snapshot routine holds ingest paused.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Run until storage goes invalid.
pub async fn run_writer(
    storage: Arc<dyn Storage>,
    queues: Arc<WriteQueues>,
    cache: Arc<AssociationCache>,
    flags: Arc<Flags>,
    tick: Duration,
) {
    loop {
        if !flags.storage_valid() {
            debug!("storage invalid, writer stopping");
            return;
        }
        if flags.insert_paused() {
            sleep(PAUSE_POLL).await;
            continue;
        }

        let start = Instant::now();
        flush_once(storage.as_ref(), &queues, &cache).await;
        flags.set_last_write(start.elapsed());

        sleep(tick).await;
    }
}

/// One full flush pass over every queue, in the fixed per-kind order:
/// soldiers, soldier states, vehicles, vehicle states, fired, general, hit,
/// kill, chat, radio, fps. Also invoked directly at shutdown.
pub async fn flush_once(storage: &dyn Storage, queues: &WriteQueues, cache: &AssociationCache) {
    let soldiers = queues.soldiers.drain();
    if !soldiers.is_empty() {
        match storage.insert_soldiers(&soldiers).await {
            Ok(ids) => {
                for (row, id) in soldiers.iter().zip(ids) {
                    cache.insert_soldier(row.mission_id, row.ocap_id, id);
                }
            }
            Err(e) => error!(lost = soldiers.len(), error = %e, "soldier batch lost"),
        }
    }

    let soldier_states = queues.soldier_states.drain();
    if !soldier_states.is_empty() {
        if let Err(e) = storage.insert_soldier_states(&soldier_states).await {
            error!(lost = soldier_states.len(), error = %e, "soldier state batch lost");
        }
    }

    let vehicles = queues.vehicles.drain();
    if !vehicles.is_empty() {
        match storage.insert_vehicles(&vehicles).await {
            Ok(ids) => {
                for (row, id) in vehicles.iter().zip(ids) {
                    cache.insert_vehicle(row.mission_id, row.ocap_id, id);
                }
            }
            Err(e) => error!(lost = vehicles.len(), error = %e, "vehicle batch lost"),
        }
    }

    let vehicle_states = queues.vehicle_states.drain();
    if !vehicle_states.is_empty() {
        if let Err(e) = storage.insert_vehicle_states(&vehicle_states).await {
            error!(lost = vehicle_states.len(), error = %e, "vehicle state batch lost");
        }
    }

    let fired = queues.fired.drain();
    if !fired.is_empty() {
        if let Err(e) = storage.insert_fired_events(&fired).await {
            error!(lost = fired.len(), error = %e, "fired batch lost");
        }
    }

    let general = queues.general.drain();
    if !general.is_empty() {
        if let Err(e) = storage.insert_general_events(&general).await {
            error!(lost = general.len(), error = %e, "general event batch lost");
        }
    }

    let hit = queues.hit.drain();
    if !hit.is_empty() {
        if let Err(e) = storage.insert_hit_events(&hit).await {
            error!(lost = hit.len(), error = %e, "hit batch lost");
        }
    }

    let kill = queues.kill.drain();
    if !kill.is_empty() {
        if let Err(e) = storage.insert_kill_events(&kill).await {
            error!(lost = kill.len(), error = %e, "kill batch lost");
        }
    }

    let chat = queues.chat.drain();
    if !chat.is_empty() {
        if let Err(e) = storage.insert_chat_events(&chat).await {
            error!(lost = chat.len(), error = %e, "chat batch lost");
        }
    }

    let radio = queues.radio.drain();
    if !radio.is_empty() {
        if let Err(e) = storage.insert_radio_events(&radio).await {
            error!(lost = radio.len(), error = %e, "radio batch lost");
        }
    }

    let fps = queues.fps.drain();
    if !fps.is_empty() {
        if let Err(e) = storage.insert_fps_events(&fps).await {
            error!(lost = fps.len(), error = %e, "fps batch lost");
        }
    }
}
