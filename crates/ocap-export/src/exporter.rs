//! # Mission Exporter
//!
//! Materializes a recorded mission into the compact JSON document the web
//! playback viewer consumes, then gzips it to disk.
//!
//! Per-soldier timelines are forward-filled so every frame between the
//! join frame and the mission end frame has a sample. Vehicle trajectories
//! are run-length compressed: consecutive samples whose position, bearing,
//! and alive flag are identical collapse into one entry whose frame span
//! is widened in place.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{ExportError, Result};
use ocap_domain::{
    FiredEvent, GeneralEvent, HitEvent, KillEvent, Mission, Soldier, SoldierState, Vehicle,
    VehicleState, World,
};
use ocap_persistence::{ExportRepository, MissionRepository, Storage};

/// Everything the document builder needs, fetched up front so the assembly
/// itself is pure.
#[derive(Debug)]
pub struct MissionData {
    pub mission: Mission,
    pub world: World,
    pub soldiers: Vec<(Soldier, Vec<SoldierState>, Vec<FiredEvent>)>,
    pub vehicles: Vec<(Vehicle, Vec<VehicleState>)>,
    pub general: Vec<GeneralEvent>,
    pub hits: Vec<HitEvent>,
    pub kills: Vec<KillEvent>,
}

/// What one export produced, for operator review.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub mission_id: i64,
    pub path: PathBuf,
    pub end_frame: u32,
    pub insert_sql: String,
}

pub struct Exporter {
    storage: Arc<dyn Storage>,
}

impl Exporter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Export one mission to `<out_dir>/mission_<id>_<slug>.json.gz`.
    pub async fn export(&self, mission_id: i64, out_dir: &Path) -> Result<ExportSummary> {
        let data = self.load(mission_id).await?;
        let (document, end_frame) = build_recording(&data);

        let filename = recording_filename(mission_id, &data.mission.mission_name);
        let path = out_dir.join(&filename);

        let file = File::create(&path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer(&mut encoder, &document)?;
        encoder.finish()?;

        let insert_sql = format!(
            "INSERT INTO operations (world_name, mission_name, mission_duration, filename, \
             date, tag) VALUES ('{}', '{}', {}, '{}', '{}', '{}');",
            sql_escape(&data.world.world_name),
            sql_escape(&data.mission.mission_name),
            end_frame,
            filename,
            Utc::now().format("%Y-%m-%d"),
            sql_escape(&data.mission.tag),
        );

        info!(
            mission_id,
            end_frame,
            path = %path.display(),
            "recording exported"
        );

        Ok(ExportSummary {
            mission_id,
            path,
            end_frame,
            insert_sql,
        })
    }

    async fn load(&self, mission_id: i64) -> Result<MissionData> {
        let mission = self
            .storage
            .get_mission(mission_id)
            .await?
            .ok_or(ExportError::MissionNotFound(mission_id))?;
        let world = self
            .storage
            .get_world(mission.world_id)
            .await?
            .ok_or(ExportError::MissionNotFound(mission_id))?;

        let mut soldiers = Vec::new();
        for soldier in self.storage.soldiers_by_mission(mission_id).await? {
            let states = self.storage.soldier_states_by_soldier(soldier.id).await?;
            let fired = self.storage.fired_events_by_soldier(soldier.id).await?;
            soldiers.push((soldier, states, fired));
        }

        let mut vehicles = Vec::new();
        for vehicle in self.storage.vehicles_by_mission(mission_id).await? {
            let states = self.storage.vehicle_states_by_vehicle(vehicle.id).await?;
            vehicles.push((vehicle, states));
        }

        Ok(MissionData {
            mission,
            world,
            soldiers,
            vehicles,
            general: self.storage.general_events_by_mission(mission_id).await?,
            hits: self.storage.hit_events_by_mission(mission_id).await?,
            kills: self.storage.kill_events_by_mission(mission_id).await?,
        })
    }
}

/// `mission_<id>_<slug>.json.gz`, spaces replaced with underscores.
pub fn recording_filename(mission_id: i64, mission_name: &str) -> String {
    let slug = mission_name.replace(' ', "_");
    format!("mission_{mission_id}_{slug}.json.gz")
}

fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Assemble the full recording document. Returns the document and the
/// resolved end frame.
pub fn build_recording(data: &MissionData) -> (Value, u32) {
    let end_frame = determine_end_frame(data);

    let soldier_ocap: HashMap<i64, u16> = data
        .soldiers
        .iter()
        .map(|(s, _, _)| (s.id, s.ocap_id))
        .collect();
    let vehicle_ocap: HashMap<i64, u16> = data
        .vehicles
        .iter()
        .map(|(v, _)| (v.id, v.ocap_id))
        .collect();

    let mut entities = Vec::new();
    for (soldier, states, fired) in &data.soldiers {
        entities.push(soldier_entity(soldier, states, fired, end_frame));
    }
    for (vehicle, states) in &data.vehicles {
        entities.push(vehicle_entity(vehicle, states));
    }

    let mission = &data.mission;
    let world = &data.world;
    let document = json!({
        "addonVersion": mission.addon_version,
        "extensionVersion": mission.extension_version,
        "extensionBuild": mission.extension_build,
        "missionAuthor": mission.author,
        "missionName": mission.mission_name,
        "briefingName": mission.briefing_name,
        "onLoadName": mission.on_load_name,
        "serverName": mission.server_name,
        "tag": mission.tag,
        "captureDelay": mission.capture_delay,
        "worldName": world.world_name,
        "worldDisplayName": world.display_name,
        "endFrame": end_frame,
        "Markers": [],
        "entities": entities,
        "events": events_array(data, &soldier_ocap, &vehicle_ocap),
        "times": [],
    });

    (document, end_frame)
}

/// Capture frame of the most recent `endMission` event; otherwise the
/// highest state frame recorded for any soldier or vehicle.
pub fn determine_end_frame(data: &MissionData) -> u32 {
    if let Some(event) = data
        .general
        .iter()
        .filter(|e| e.name == "endMission")
        .next_back()
    {
        return event.capture_frame;
    }

    let soldier_max = data
        .soldiers
        .iter()
        .flat_map(|(_, states, _)| states.iter().map(|s| s.capture_frame))
        .max();
    let vehicle_max = data
        .vehicles
        .iter()
        .flat_map(|(_, states)| states.iter().map(|s| s.capture_frame))
        .max();

    soldier_max
        .into_iter()
        .chain(vehicle_max)
        .max()
        .unwrap_or(0)
}

// =============================================================================
// SOLDIERS
// =============================================================================

fn soldier_entity(
    soldier: &Soldier,
    states: &[SoldierState],
    fired: &[FiredEvent],
    end_frame: u32,
) -> Value {
    let frames_fired: Vec<Value> = fired
        .iter()
        .map(|f| {
            json!([
                f.capture_frame,
                [f.end_position.x, f.end_position.y, f.end_position.z]
            ])
        })
        .collect();

    json!({
        "id": soldier.ocap_id,
        "name": soldier.unit_name,
        "group": soldier.group_id,
        "side": soldier.side.as_str(),
        "isPlayer": u8::from(soldier.is_player),
        "role": soldier.role_description,
        "startFrameNum": soldier.join_frame,
        "type": "unit",
        "framesFired": frames_fired,
        "positions": soldier_positions(soldier, states, end_frame),
    })
}

/// One entry per frame in `[join_frame, end_frame]`. Frames with no sample
/// repeat the immediately preceding one; frames before the first sample
/// repeat the first.
fn soldier_positions(soldier: &Soldier, states: &[SoldierState], end_frame: u32) -> Vec<Value> {
    if states.is_empty() {
        return Vec::new();
    }

    let by_frame: BTreeMap<u32, &SoldierState> =
        states.iter().map(|s| (s.capture_frame, s)).collect();
    let first = &states[0];

    let mut positions = Vec::new();
    let mut last: Option<&SoldierState> = None;
    for frame in soldier.join_frame..=end_frame {
        if let Some(state) = by_frame.get(&frame) {
            last = Some(state);
        }
        let state = last.unwrap_or(first);
        positions.push(json!([
            [state.position.x, state.position.y, state.position.z],
            state.bearing,
            state.lifestate.as_u8(),
            u8::from(state.in_vehicle),
            state.unit_name,
            u8::from(state.is_player),
        ]));
    }
    positions
}

// =============================================================================
// VEHICLES
// =============================================================================

fn vehicle_entity(vehicle: &Vehicle, states: &[VehicleState]) -> Value {
    let positions: Vec<Value> = vehicle_samples(states)
        .into_iter()
        .map(|s| {
            json!([
                [s.position[0], s.position[1], s.position[2]],
                s.bearing,
                u8::from(s.is_alive),
                s.crew,
                [s.span[0], s.span[1]],
            ])
        })
        .collect();

    json!({
        "id": vehicle.ocap_id,
        "name": vehicle.display_name,
        "class": vehicle.ocap_type,
        "startFrameNum": vehicle.join_frame,
        "framesFired": [],
        "positions": positions,
    })
}

#[derive(Debug, Clone, PartialEq)]
struct VehicleSample {
    position: [f64; 3],
    bearing: u16,
    is_alive: bool,
    crew: Vec<i64>,
    span: [u32; 2],
}

/// Run-length compress a frame-ordered state list. Duplicate capture
/// frames are skipped; a gap extends the previous entry's span up to the
/// frame before the new sample.
fn vehicle_samples(states: &[VehicleState]) -> Vec<VehicleSample> {
    let mut entries: Vec<VehicleSample> = Vec::new();
    let mut seen_frames = HashSet::new();

    for state in states {
        let frame = state.capture_frame;
        if !seen_frames.insert(frame) {
            continue;
        }

        let candidate = VehicleSample {
            position: [state.position.x, state.position.y, state.position.z],
            bearing: state.bearing,
            is_alive: state.is_alive,
            crew: parse_crew(&state.crew),
            span: [frame, frame],
        };

        if let Some(last) = entries.last_mut() {
            if last.position == candidate.position
                && last.bearing == candidate.bearing
                && last.is_alive == candidate.is_alive
            {
                last.span[1] = frame;
                continue;
            }
            if last.span[1] + 1 < frame {
                last.span[1] = frame - 1;
            }
        }
        entries.push(candidate);
    }

    entries
}

fn parse_crew(crew: &str) -> Vec<i64> {
    crew.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

// =============================================================================
// EVENTS
// =============================================================================

/// General, hit, and kill events concatenated and sorted by
/// `(capture_frame, time)`.
fn events_array(
    data: &MissionData,
    soldier_ocap: &HashMap<i64, u16>,
    vehicle_ocap: &HashMap<i64, u16>,
) -> Vec<Value> {
    let mut items: Vec<(u32, DateTime<Utc>, Value)> = Vec::new();

    for event in &data.general {
        let message = if event.name == "endMission" {
            end_mission_message(event)
        } else {
            Value::String(event.message.clone())
        };
        items.push((
            event.capture_frame,
            event.time,
            json!([event.capture_frame, event.name, message]),
        ));
    }

    for hit in &data.hits {
        let victim = resolve_ocap(hit.victim_soldier, hit.victim_vehicle, soldier_ocap, vehicle_ocap);
        let causer = resolve_ocap(
            hit.shooter_soldier,
            hit.shooter_vehicle,
            soldier_ocap,
            vehicle_ocap,
        );
        match (victim, causer) {
            (Some(victim), Some(causer)) => items.push((
                hit.capture_frame,
                hit.time,
                json!([hit.capture_frame, "hit", victim, [causer, hit.event_text], hit.distance]),
            )),
            _ => warn!(event_id = hit.id, "hit event with unresolvable entities, dropped"),
        }
    }

    for kill in &data.kills {
        let victim =
            resolve_ocap(kill.victim_soldier, kill.victim_vehicle, soldier_ocap, vehicle_ocap);
        let causer =
            resolve_ocap(kill.killer_soldier, kill.killer_vehicle, soldier_ocap, vehicle_ocap);
        match (victim, causer) {
            (Some(victim), Some(causer)) => items.push((
                kill.capture_frame,
                kill.time,
                json!([
                    kill.capture_frame,
                    "killed",
                    victim,
                    [causer, kill.event_text],
                    kill.distance
                ]),
            )),
            _ => warn!(event_id = kill.id, "kill event with unresolvable entities, dropped"),
        }
    }

    items.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    items.into_iter().map(|(_, _, value)| value).collect()
}

fn resolve_ocap(
    soldier_id: Option<i64>,
    vehicle_id: Option<i64>,
    soldier_ocap: &HashMap<i64, u16>,
    vehicle_ocap: &HashMap<i64, u16>,
) -> Option<u16> {
    soldier_id
        .and_then(|id| soldier_ocap.get(&id).copied())
        .or_else(|| vehicle_id.and_then(|id| vehicle_ocap.get(&id).copied()))
}

/// `endMission` carries `[winSide, text]` in its extra data.
fn end_mission_message(event: &GeneralEvent) -> Value {
    match &event.extra_data {
        Some(Value::Array(parts)) if parts.len() >= 2 => json!([parts[0], parts[1]]),
        Some(Value::Object(fields)) => json!([
            fields.get("winSide").cloned().unwrap_or(Value::String(String::new())),
            fields
                .get("message")
                .cloned()
                .unwrap_or(Value::String(event.message.clone())),
        ]),
        _ => json!(["", event.message]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ocap_domain::{Lifestate, Position, Scores, Side};

    fn time(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_780_000_000 + seconds, 0).unwrap()
    }

    fn mission() -> Mission {
        Mission {
            id: 1,
            mission_name: "Operation Sandstorm Two".into(),
            briefing_name: "op_sandstorm".into(),
            mission_name_source: "op_sandstorm.Altis".into(),
            on_load_name: String::new(),
            author: "author".into(),
            server_name: "srv".into(),
            server_profile: "profile".into(),
            start_time: time(0),
            capture_delay: 1.0,
            addon_version: "1.0".into(),
            extension_version: "2.0".into(),
            extension_build: "build".into(),
            tag: "TvT".into(),
            world_id: 1,
        }
    }

    fn world() -> World {
        World {
            id: 1,
            author: "BI".into(),
            workshop_id: String::new(),
            display_name: "Altis".into(),
            world_name: "altis".into(),
            world_name_original: "Altis".into(),
            world_size: 30720.0,
            latitude: 35.0,
            longitude: 25.0,
            location: Position::default(),
        }
    }

    fn soldier(id: i64, ocap_id: u16, join_frame: u32) -> Soldier {
        Soldier {
            id,
            mission_id: 1,
            join_frame,
            join_time: time(0),
            ocap_id,
            unit_name: format!("Unit {ocap_id}"),
            group_id: "Alpha".into(),
            side: Side::West,
            is_player: false,
            role_description: "Rifleman".into(),
            class_name: "B_Soldier_F".into(),
            display_name: "Rifleman".into(),
            player_uid: String::new(),
        }
    }

    fn soldier_state(soldier_id: i64, frame: u32, x: f64) -> SoldierState {
        SoldierState {
            id: frame as i64,
            soldier_id,
            mission_id: 1,
            capture_frame: frame,
            time: time(frame as i64),
            position: Position::new(x, 200.0, 10.0),
            bearing: 45,
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

    fn vehicle(id: i64, ocap_id: u16) -> Vehicle {
        Vehicle {
            id,
            mission_id: 1,
            join_frame: 10,
            join_time: time(0),
            ocap_id,
            ocap_type: "car".into(),
            display_name: "Hunter".into(),
            class_name: "B_MRAP_01_F".into(),
            customization: String::new(),
        }
    }

    fn vehicle_state(frame: u32, x: f64) -> VehicleState {
        VehicleState {
            id: frame as i64,
            vehicle_id: 1,
            mission_id: 1,
            capture_frame: frame,
            time: time(frame as i64),
            position: Position::new(x, 600.0, 0.0),
            bearing: 180,
            is_alive: true,
            crew: "1,2".into(),
            fuel: 1.0,
            damage: 0.0,
            engine_on: true,
            locked: false,
            side: Side::West,
        }
    }

    fn empty_data() -> MissionData {
        MissionData {
            mission: mission(),
            world: world(),
            soldiers: Vec::new(),
            vehicles: Vec::new(),
            general: Vec::new(),
            hits: Vec::new(),
            kills: Vec::new(),
        }
    }

    #[test]
    fn test_vehicle_run_length_collapses_identical_samples() {
        let states = vec![
            vehicle_state(10, 500.0),
            vehicle_state(11, 500.0),
            vehicle_state(12, 500.0),
        ];
        let samples = vehicle_samples(&states);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].span, [10, 12]);
    }

    #[test]
    fn test_vehicle_run_length_gap_extends_previous_entry() {
        let states = vec![
            vehicle_state(10, 500.0),
            vehicle_state(11, 500.0),
            vehicle_state(12, 500.0),
            vehicle_state(15, 777.0),
        ];
        let samples = vehicle_samples(&states);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].span, [10, 14]);
        assert_eq!(samples[1].span, [15, 15]);
        assert_eq!(samples[1].position[0], 777.0);
    }

    #[test]
    fn test_vehicle_duplicate_frames_skipped() {
        let mut second = vehicle_state(10, 999.0);
        second.id = 99;
        let states = vec![vehicle_state(10, 500.0), second, vehicle_state(11, 500.0)];
        let samples = vehicle_samples(&states);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].position[0], 500.0);
        assert_eq!(samples[0].span, [10, 11]);
    }

    #[test]
    fn test_end_frame_prefers_end_mission_event() {
        let mut data = empty_data();
        data.soldiers
            .push((soldier(1, 1, 0), vec![soldier_state(1, 950, 100.0)], vec![]));
        data.general.push(GeneralEvent {
            id: 1,
            mission_id: 1,
            capture_frame: 900,
            time: time(900),
            name: "endMission".into(),
            message: String::new(),
            extra_data: None,
        });
        assert_eq!(determine_end_frame(&data), 900);
    }

    #[test]
    fn test_end_frame_falls_back_to_latest_state() {
        let mut data = empty_data();
        data.soldiers
            .push((soldier(1, 1, 0), vec![soldier_state(1, 900, 100.0)], vec![]));
        data.vehicles
            .push((vehicle(1, 1), vec![vehicle_state(1000, 500.0)]));
        assert_eq!(determine_end_frame(&data), 1000);
    }

    #[test]
    fn test_soldier_positions_cover_every_frame() {
        let s = soldier(1, 1, 5);
        let states = vec![
            soldier_state(1, 7, 100.0),
            soldier_state(1, 8, 110.0),
            soldier_state(1, 12, 120.0),
        ];
        let positions = soldier_positions(&s, &states, 14);

        // One entry per frame in [join_frame, end_frame]
        assert_eq!(positions.len(), 10);
        // Frames 5 and 6 predate the first sample and repeat it
        assert_eq!(positions[0][0][0], 100.0);
        // Frames 9-11 forward-fill frame 8
        assert_eq!(positions[4][0][0], 110.0);
        // Frame 12 onward uses the newest sample
        assert_eq!(positions[7][0][0], 120.0);
        assert_eq!(positions[9][0][0], 120.0);
    }

    #[test]
    fn test_events_sorted_with_end_mission_message() {
        let mut data = empty_data();
        let winner = soldier(1, 3, 0);
        let victim = soldier(2, 5, 0);
        data.soldiers.push((winner, vec![], vec![]));
        data.soldiers.push((victim, vec![], vec![]));

        data.general.push(GeneralEvent {
            id: 1,
            mission_id: 1,
            capture_frame: 500,
            time: time(500),
            name: "endMission".into(),
            message: String::new(),
            extra_data: Some(json!({"winSide": "WEST", "message": "BLUFOR wins"})),
        });
        data.kills.push(KillEvent {
            id: 1,
            mission_id: 1,
            capture_frame: 100,
            time: time(100),
            victim_soldier: Some(2),
            victim_vehicle: None,
            killer_soldier: Some(1),
            killer_vehicle: None,
            event_text: "M4".into(),
            distance: 250.0,
        });

        let (document, end_frame) = build_recording(&data);
        assert_eq!(end_frame, 500);

        let events = document["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        // Kill at frame 100 sorts before the end at frame 500
        assert_eq!(events[0][0], 100);
        assert_eq!(events[0][1], "killed");
        assert_eq!(events[0][2], 5);
        assert_eq!(events[0][3][0], 3);
        assert_eq!(events[1][1], "endMission");
        assert_eq!(events[1][2][0], "WEST");
        assert_eq!(events[1][2][1], "BLUFOR wins");
    }

    #[test]
    fn test_unresolvable_hit_dropped() {
        let mut data = empty_data();
        data.hits.push(HitEvent {
            id: 1,
            mission_id: 1,
            capture_frame: 50,
            time: time(50),
            victim_soldier: Some(42),
            victim_vehicle: None,
            shooter_soldier: None,
            shooter_vehicle: Some(43),
            event_text: "shell".into(),
            distance: 10.0,
        });

        let (document, _) = build_recording(&data);
        assert!(document["events"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_recording_filename_slug() {
        assert_eq!(
            recording_filename(7, "Operation Sandstorm Two"),
            "mission_7_Operation_Sandstorm_Two.json.gz"
        );
    }

    #[test]
    fn test_document_shape() {
        let data = empty_data();
        let (document, _) = build_recording(&data);
        assert_eq!(document["missionName"], "Operation Sandstorm Two");
        assert_eq!(document["worldName"], "altis");
        assert_eq!(document["worldDisplayName"], "Altis");
        assert!(document["Markers"].as_array().unwrap().is_empty());
        assert!(document["times"].as_array().unwrap().is_empty());
        assert!(document["entities"].as_array().unwrap().is_empty());
    }
}
