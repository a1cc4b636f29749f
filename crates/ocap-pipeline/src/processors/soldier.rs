//! Soldier processors: `:NEW:SOLDIER:` and `:NEW:SOLDIER:STATE:`.

use crate::error::Result;
use crate::parse::Fields;
use crate::processors::{current_mission_id, resolve_soldier, ProcessorCtx};
use crate::router::Payload;
use ocap_domain::{parse_position_3d, Lifestate, Scores, Side};
use ocap_persistence::{NewSoldier, NewSoldierState};

/// Payload layout: joinFrame, ocapId, unitName, groupId, side, isPlayer,
/// roleDescription, className, displayName, playerUid.
pub(super) async fn handle_new(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("soldier", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let record = NewSoldier {
        mission_id,
        join_frame: fields.u32(0)?,
        join_time: fields.stamped_time()?,
        ocap_id: fields.u16(1)?,
        unit_name: fields.get(2)?,
        group_id: fields.get(3)?,
        side: Side::from_host(&fields.get(4)?),
        is_player: fields.bool(5)?,
        role_description: fields.get(6)?,
        class_name: fields.get(7)?,
        display_name: fields.get(8)?,
        player_uid: fields.get_or_default(9),
    };

    ctx.queues.soldiers.push(record);
    Ok(())
}

/// Payload layout: ocapId, position, bearing, lifestate, inVehicle,
/// unitName, isPlayer, currentRole, captureFrame, hasStableVitals,
/// isDraggedCarried, scores, vehicleRole.
pub(super) async fn handle_state(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("soldier_state", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let ocap_id = fields.u16(0)?;
    let capture_frame = fields.u32(8)?;
    let soldier_id = resolve_soldier(&ctx, mission_id, ocap_id, capture_frame).await?;

    let record = NewSoldierState {
        soldier_id,
        mission_id,
        capture_frame,
        time: fields.stamped_time()?,
        position: parse_position_3d(&fields.get(1)?)?,
        bearing: fields.u16(2)?,
        lifestate: Lifestate::from_u8(fields.u32(3)? as u8)?,
        in_vehicle: fields.bool(4)?,
        unit_name: fields.get(5)?,
        is_player: fields.bool(6)?,
        current_role: fields.get(7)?,
        has_stable_vitals: fields.bool(9)?,
        is_dragged_carried: fields.bool(10)?,
        scores: parse_scores(&fields.get_or_default(11)),
        vehicle_role: fields.get_or_default(12),
    };

    ctx.queues.soldier_states.push(record);
    Ok(())
}

/// Score components arrive comma-joined for players and empty for AI.
/// Missing or malformed components default to zero.
fn parse_scores(raw: &str) -> Scores {
    if raw.is_empty() {
        return Scores::default();
    }

    let mut parts = raw.split(',').map(|p| p.trim().parse::<u8>().unwrap_or(0));
    Scores {
        infantry_kills: parts.next().unwrap_or(0),
        vehicle_kills: parts.next().unwrap_or(0),
        armor_kills: parts.next().unwrap_or(0),
        air_kills: parts.next().unwrap_or(0),
        deaths: parts.next().unwrap_or(0),
        total_score: parts.next().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_empty_is_default() {
        assert_eq!(parse_scores(""), Scores::default());
    }

    #[test]
    fn test_parse_scores_full() {
        let scores = parse_scores("1,2,3,4,5,15");
        assert_eq!(scores.infantry_kills, 1);
        assert_eq!(scores.air_kills, 4);
        assert_eq!(scores.total_score, 15);
    }

    #[test]
    fn test_parse_scores_short_and_bad_components() {
        let scores = parse_scores("2,x");
        assert_eq!(scores.infantry_kills, 2);
        assert_eq!(scores.vehicle_kills, 0);
        assert_eq!(scores.total_score, 0);
    }
}
