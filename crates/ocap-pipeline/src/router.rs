//! # Ingest Router
//!
//! One synchronous entry point for every host call. Each payload is stamped
//! with the receipt time in nanoseconds, then dropped onto the bounded
//! channel for its kind. The host thread never blocks: a full channel drops
//! the payload, bumps a warning counter, and the caller still gets its
//! acknowledgement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::parse::now_ns;

/// A host payload: the original argument array plus the stamped timestamp
/// appended as the final element.
pub type Payload = Vec<String>;

/// The closed set of host commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    InitDb,
    NewMission,
    NewSoldier,
    SoldierState,
    NewVehicle,
    VehicleState,
    Fired,
    General,
    Hit,
    Kill,
    Chat,
    Radio,
    Fps,
}

impl EventKind {
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            ":INIT:DB:" => Some(Self::InitDb),
            ":NEW:MISSION:" => Some(Self::NewMission),
            ":NEW:SOLDIER:" => Some(Self::NewSoldier),
            ":NEW:SOLDIER:STATE:" => Some(Self::SoldierState),
            ":NEW:VEHICLE:" => Some(Self::NewVehicle),
            ":NEW:VEHICLE:STATE:" => Some(Self::VehicleState),
            ":FIRED:" => Some(Self::Fired),
            ":EVENT:" => Some(Self::General),
            ":HIT:" => Some(Self::Hit),
            ":KILL:" => Some(Self::Kill),
            ":CHAT:" => Some(Self::Chat),
            ":RADIO:" => Some(Self::Radio),
            ":FPS:" => Some(Self::Fps),
            _ => None,
        }
    }

    pub fn channel_name(&self) -> &'static str {
        match self {
            Self::InitDb => "init",
            Self::NewMission => "missions",
            Self::NewSoldier => "soldiers",
            Self::SoldierState => "soldier_states",
            Self::NewVehicle => "vehicles",
            Self::VehicleState => "vehicle_states",
            Self::Fired => "fired",
            Self::General => "general",
            Self::Hit => "hits",
            Self::Kill => "kills",
            Self::Chat => "chat",
            Self::Radio => "radio",
            Self::Fps => "fps",
        }
    }
}

/// Bounded capacity per producer channel.
#[derive(Debug, Clone)]
pub struct ChannelCapacities {
    pub missions: usize,
    pub soldiers: usize,
    pub soldier_states: usize,
    pub vehicles: usize,
    pub vehicle_states: usize,
    pub fired: usize,
    pub general: usize,
    pub hits: usize,
    pub kills: usize,
    pub chat: usize,
    pub radio: usize,
    pub fps: usize,
}

impl Default for ChannelCapacities {
    fn default() -> Self {
        Self {
            missions: 16,
            soldiers: 1_000,
            soldier_states: 10_000,
            vehicles: 1_000,
            vehicle_states: 10_000,
            fired: 10_000,
            general: 1_000,
            hits: 2_000,
            kills: 2_000,
            chat: 1_000,
            radio: 1_000,
            fps: 1_000,
        }
    }
}

struct Channel {
    kind: EventKind,
    tx: mpsc::Sender<Payload>,
    dropped: AtomicU64,
}

impl Channel {
    fn new(kind: EventKind, capacity: usize) -> (Self, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                kind,
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    fn send(&self, payload: Payload) {
        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    channel = self.kind.channel_name(),
                    dropped, "channel full, payload dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(
                    channel = self.kind.channel_name(),
                    "channel closed, payload dropped"
                );
            }
        }
    }
}

struct RouterInner {
    init_tx: mpsc::Sender<()>,
    missions: Channel,
    soldiers: Channel,
    soldier_states: Channel,
    vehicles: Channel,
    vehicle_states: Channel,
    fired: Channel,
    general: Channel,
    hits: Channel,
    kills: Channel,
    chat: Channel,
    radio: Channel,
    fps: Channel,
}

/// Cheap-clonable dispatch handle given to the host boundary.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// Receiver ends, consumed once by the lifecycle controller when it spawns
/// the processors.
pub struct Receivers {
    pub init: mpsc::Receiver<()>,
    pub missions: mpsc::Receiver<Payload>,
    pub soldiers: mpsc::Receiver<Payload>,
    pub soldier_states: mpsc::Receiver<Payload>,
    pub vehicles: mpsc::Receiver<Payload>,
    pub vehicle_states: mpsc::Receiver<Payload>,
    pub fired: mpsc::Receiver<Payload>,
    pub general: mpsc::Receiver<Payload>,
    pub hits: mpsc::Receiver<Payload>,
    pub kills: mpsc::Receiver<Payload>,
    pub chat: mpsc::Receiver<Payload>,
    pub radio: mpsc::Receiver<Payload>,
    pub fps: mpsc::Receiver<Payload>,
}

/// Build the router and its receiver ends.
pub fn build(capacities: &ChannelCapacities) -> (Router, Receivers) {
    let (init_tx, init_rx) = mpsc::channel(1);
    let (missions, missions_rx) = Channel::new(EventKind::NewMission, capacities.missions);
    let (soldiers, soldiers_rx) = Channel::new(EventKind::NewSoldier, capacities.soldiers);
    let (soldier_states, soldier_states_rx) =
        Channel::new(EventKind::SoldierState, capacities.soldier_states);
    let (vehicles, vehicles_rx) = Channel::new(EventKind::NewVehicle, capacities.vehicles);
    let (vehicle_states, vehicle_states_rx) =
        Channel::new(EventKind::VehicleState, capacities.vehicle_states);
    let (fired, fired_rx) = Channel::new(EventKind::Fired, capacities.fired);
    let (general, general_rx) = Channel::new(EventKind::General, capacities.general);
    let (hits, hits_rx) = Channel::new(EventKind::Hit, capacities.hits);
    let (kills, kills_rx) = Channel::new(EventKind::Kill, capacities.kills);
    let (chat, chat_rx) = Channel::new(EventKind::Chat, capacities.chat);
    let (radio, radio_rx) = Channel::new(EventKind::Radio, capacities.radio);
    let (fps, fps_rx) = Channel::new(EventKind::Fps, capacities.fps);

    let router = Router {
        inner: Arc::new(RouterInner {
            init_tx,
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
        }),
    };

    let receivers = Receivers {
        init: init_rx,
        missions: missions_rx,
        soldiers: soldiers_rx,
        soldier_states: soldier_states_rx,
        vehicles: vehicles_rx,
        vehicle_states: vehicle_states_rx,
        fired: fired_rx,
        general: general_rx,
        hits: hits_rx,
        kills: kills_rx,
        chat: chat_rx,
        radio: radio_rx,
        fps: fps_rx,
    };

    (router, receivers)
}

impl Router {
    /// Synchronous host entry point. Stamps the payload, enqueues it, and
    /// returns immediately.
    pub fn dispatch(&self, command: &str, mut args: Vec<String>) -> &'static str {
        let Some(kind) = EventKind::from_command(command) else {
            warn!(command, "unknown command");
            return "unknown command";
        };

        if kind == EventKind::InitDb {
            // Storage initialization runs asynchronously; the lifecycle
            // controller answers with :DB:OK: or :DB:ERROR:.
            let _ = self.inner.init_tx.try_send(());
            return "initializing";
        }

        args.push(now_ns().to_string());
        self.channel(kind).send(args);
        "ok"
    }

    fn channel(&self, kind: EventKind) -> &Channel {
        let inner = &self.inner;
        match kind {
            EventKind::NewMission => &inner.missions,
            EventKind::NewSoldier => &inner.soldiers,
            EventKind::SoldierState => &inner.soldier_states,
            EventKind::NewVehicle => &inner.vehicles,
            EventKind::VehicleState => &inner.vehicle_states,
            EventKind::Fired => &inner.fired,
            EventKind::General => &inner.general,
            EventKind::Hit => &inner.hits,
            EventKind::Kill => &inner.kills,
            EventKind::Chat => &inner.chat,
            EventKind::Radio => &inner.radio,
            EventKind::Fps => &inner.fps,
            EventKind::InitDb => unreachable!("init has no payload channel"),
        }
    }

    /// Depth of every payload channel, for the status monitor.
    pub fn depths(&self) -> Vec<(&'static str, usize)> {
        let inner = &self.inner;
        [
            &inner.missions,
            &inner.soldiers,
            &inner.soldier_states,
            &inner.vehicles,
            &inner.vehicle_states,
            &inner.fired,
            &inner.general,
            &inner.hits,
            &inner.kills,
            &inner.chat,
            &inner.radio,
            &inner.fps,
        ]
        .iter()
        .map(|c| (c.kind.channel_name(), c.depth()))
        .collect()
    }

    /// Total payloads dropped to full channels since start.
    pub fn dropped(&self) -> u64 {
        let inner = &self.inner;
        [
            &inner.missions,
            &inner.soldiers,
            &inner.soldier_states,
            &inner.vehicles,
            &inner.vehicle_states,
            &inner.fired,
            &inner.general,
            &inner.hits,
            &inner.kills,
            &inner.chat,
            &inner.radio,
            &inner.fps,
        ]
        .iter()
        .map(|c| c.dropped.load(Ordering::Relaxed))
        .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_stamps_and_routes() {
        let (router, mut receivers) = build(&ChannelCapacities::default());

        let ack = router.dispatch(":NEW:SOLDIER:", vec!["0".into(), "1".into()]);
        assert_eq!(ack, "ok");

        let payload = receivers.soldiers.recv().await.unwrap();
        assert_eq!(payload.len(), 3);
        // Stamp is parseable nanoseconds
        assert!(payload[2].parse::<i64>().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_unknown_command_rejected() {
        let (router, _receivers) = build(&ChannelCapacities::default());
        assert_eq!(router.dispatch(":BOGUS:", vec![]), "unknown command");
    }

    #[tokio::test]
    async fn test_full_channel_drops_but_acks() {
        let caps = ChannelCapacities {
            fps: 1,
            ..Default::default()
        };
        let (router, _receivers) = build(&caps);

        assert_eq!(router.dispatch(":FPS:", vec!["48".into(), "30".into()]), "ok");
        // Receiver never drained; second payload hits a full channel
        assert_eq!(router.dispatch(":FPS:", vec!["48".into(), "30".into()]), "ok");
        assert_eq!(router.dropped(), 1);
    }

    #[tokio::test]
    async fn test_init_signal() {
        let (router, mut receivers) = build(&ChannelCapacities::default());
        assert_eq!(router.dispatch(":INIT:DB:", vec![]), "initializing");
        assert!(receivers.init.recv().await.is_some());
    }
}
