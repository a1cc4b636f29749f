//! Combat processors: `:FIRED:`, `:HIT:`, `:KILL:`.

use crate::error::Result;
use crate::parse::Fields;
use crate::processors::{current_mission_id, resolve_entity, resolve_soldier, ProcessorCtx};
use crate::router::Payload;
use ocap_domain::parse_position_3d;
use ocap_persistence::{NewFiredEvent, NewHitEvent, NewKillEvent};

/// Payload layout: ocapId, captureFrame, endPosition, startPosition,
/// weapon, magazine, firingMode.
///
/// The host sends the projectile end position before the muzzle position;
/// storage keeps them under their proper names.
pub(super) async fn handle_fired(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("fired", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let ocap_id = fields.u16(0)?;
    let capture_frame = fields.u32(1)?;
    let soldier_id = resolve_soldier(&ctx, mission_id, ocap_id, capture_frame).await?;

    let record = NewFiredEvent {
        soldier_id,
        mission_id,
        capture_frame,
        time: fields.stamped_time()?,
        end_position: parse_position_3d(&fields.get(2)?)?,
        start_position: parse_position_3d(&fields.get(3)?)?,
        weapon: fields.get(4)?,
        magazine: fields.get(5)?,
        firing_mode: fields.get_or_default(6),
    };

    ctx.queues.fired.push(record);
    Ok(())
}

/// Payload layout: captureFrame, victimOcapId, shooterOcapId, eventText,
/// distance.
pub(super) async fn handle_hit(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("hit", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let capture_frame = fields.u32(0)?;
    let victim = resolve_entity(&ctx, mission_id, fields.u16(1)?, capture_frame).await?;
    let shooter = resolve_entity(&ctx, mission_id, fields.u16(2)?, capture_frame).await?;

    let record = NewHitEvent {
        mission_id,
        capture_frame,
        time: fields.stamped_time()?,
        victim_soldier: victim.soldier_id(),
        victim_vehicle: victim.vehicle_id(),
        shooter_soldier: shooter.soldier_id(),
        shooter_vehicle: shooter.vehicle_id(),
        event_text: fields.get(3)?,
        distance: fields.f32(4)?,
    };

    ctx.queues.hit.push(record);
    Ok(())
}

/// Same layout as `:HIT:` with the shooter in the killer role.
pub(super) async fn handle_kill(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("kill", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let capture_frame = fields.u32(0)?;
    let victim = resolve_entity(&ctx, mission_id, fields.u16(1)?, capture_frame).await?;
    let killer = resolve_entity(&ctx, mission_id, fields.u16(2)?, capture_frame).await?;

    let record = NewKillEvent {
        mission_id,
        capture_frame,
        time: fields.stamped_time()?,
        victim_soldier: victim.soldier_id(),
        victim_vehicle: victim.vehicle_id(),
        killer_soldier: killer.soldier_id(),
        killer_vehicle: killer.vehicle_id(),
        event_text: fields.get(3)?,
        distance: fields.f32(4)?,
    };

    ctx.queues.kill.push(record);
    Ok(())
}
