//! Mission processor: `:NEW:MISSION:` payloads.
//!
//! Creates the World lazily, creates the Mission fresh, swaps the mission
//! context, resets the association cache, and answers the host with
//! `:MISSION:OK:`.

use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::host::{payload_array, CB_MISSION_OK};
use crate::parse::Fields;
use crate::processors::ProcessorCtx;
use crate::router::Payload;
use ocap_domain::project_4326_to_3857;
use ocap_domain::Position;
use ocap_persistence::{NewAddon, NewMission, NewWorld};

pub(super) async fn handle(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("mission", &payload);
    let time = fields.stamped_time()?;

    let world_json: Value = parse_json(&fields.get(0)?)?;
    let mission_json: Value = parse_json(&fields.get(1)?)?;

    let latitude = json_f64(&world_json, "latitude");
    let longitude = json_f64(&world_json, "longitude");
    let (x, y) = project_4326_to_3857(longitude, latitude);

    let new_world = NewWorld {
        author: json_str(&world_json, "author"),
        workshop_id: json_str(&world_json, "workshopID"),
        display_name: json_str(&world_json, "displayName"),
        world_name: json_str(&world_json, "worldName").to_lowercase(),
        world_name_original: json_str(&world_json, "worldName"),
        world_size: json_f64(&world_json, "worldSize"),
        latitude,
        longitude,
        location: Position::new(x, y, 0.0),
    };

    if new_world.world_name.is_empty() {
        return Err(PipelineError::InvalidInput(
            "mission payload has no world name".to_string(),
        ));
    }

    let world = ctx.storage.find_or_create_world(&new_world).await?;

    let addons = parse_addons(&mission_json);
    let tag = match json_str(&mission_json, "tag") {
        tag if tag.is_empty() => ctx.default_tag.clone(),
        tag => tag,
    };
    let new_mission = NewMission {
        mission_name: json_str(&mission_json, "missionName"),
        briefing_name: json_str(&mission_json, "briefingName"),
        mission_name_source: json_str(&mission_json, "missionNameSource"),
        on_load_name: json_str(&mission_json, "onLoadName"),
        author: json_str(&mission_json, "author"),
        server_name: json_str(&mission_json, "serverName"),
        server_profile: json_str(&mission_json, "serverProfile"),
        start_time: time,
        capture_delay: json_f64(&mission_json, "captureDelay") as f32,
        addon_version: json_str(&mission_json, "addonVersion"),
        extension_version: json_str(&mission_json, "extensionVersion"),
        extension_build: json_str(&mission_json, "extensionBuild"),
        tag,
        world_id: world.id,
    };

    let mission = ctx.storage.create_mission(&new_mission, &addons).await?;

    tracing::info!(
        mission_id = mission.id,
        mission_name = %mission.mission_name,
        world = %world.world_name,
        addons = addons.len(),
        "mission loaded"
    );

    let name = mission.mission_name.clone();
    ctx.context.set(mission, world);
    ctx.cache.clear();
    ctx.callback
        .callback(CB_MISSION_OK, &payload_array(&[name.as_str()]));

    Ok(())
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| PipelineError::InvalidInput(format!("mission payload json: {e}")))
}

/// String field that tolerates numeric workshop ids and the like.
fn json_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn json_f64(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Addon list: an array of `[name, workshopId]` pairs; ids arrive as either
/// integers or strings.
fn parse_addons(mission_json: &Value) -> Vec<NewAddon> {
    let Some(Value::Array(entries)) = mission_json.get("addons") else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let pair = entry.as_array()?;
            let name = pair.first()?.as_str()?.to_string();
            if name.is_empty() {
                return None;
            }
            let workshop_id = match pair.get(1) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            Some(NewAddon { name, workshop_id })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addons_coerces_numeric_ids() {
        let mission = serde_json::json!({
            "addons": [["ace", 463939057], ["cba_a3", "450814997"], ["", 1]]
        });
        let addons = parse_addons(&mission);
        assert_eq!(addons.len(), 2);
        assert_eq!(addons[0].workshop_id, "463939057");
        assert_eq!(addons[1].workshop_id, "450814997");
    }

    #[test]
    fn test_json_str_coercion() {
        let v = serde_json::json!({"workshopID": 12345, "author": "bob"});
        assert_eq!(json_str(&v, "workshopID"), "12345");
        assert_eq!(json_str(&v, "author"), "bob");
        assert_eq!(json_str(&v, "missing"), "");
    }
}
