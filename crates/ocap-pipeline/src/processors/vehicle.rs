//! Vehicle processors: `:NEW:VEHICLE:` and `:NEW:VEHICLE:STATE:`.

use crate::error::Result;
use crate::parse::Fields;
use crate::processors::{current_mission_id, resolve_vehicle, ProcessorCtx};
use crate::router::Payload;
use ocap_domain::{parse_position_3d, Side};
use ocap_persistence::{NewVehicle, NewVehicleState};

/// Payload layout: joinFrame, ocapId, ocapType, displayName, className,
/// customization.
pub(super) async fn handle_new(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("vehicle", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let record = NewVehicle {
        mission_id,
        join_frame: fields.u32(0)?,
        join_time: fields.stamped_time()?,
        ocap_id: fields.u16(1)?,
        ocap_type: fields.get(2)?,
        display_name: fields.get(3)?,
        class_name: fields.get(4)?,
        customization: fields.get_or_default(5),
    };

    ctx.queues.vehicles.push(record);
    Ok(())
}

/// Payload layout: ocapId, position, bearing, isAlive, crew, captureFrame,
/// fuel, damage, locked, engineOn, side.
pub(super) async fn handle_state(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("vehicle_state", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let ocap_id = fields.u16(0)?;
    let capture_frame = fields.u32(5)?;
    let vehicle_id = resolve_vehicle(&ctx, mission_id, ocap_id, capture_frame).await?;

    let record = NewVehicleState {
        vehicle_id,
        mission_id,
        capture_frame,
        time: fields.stamped_time()?,
        position: parse_position_3d(&fields.get(1)?)?,
        bearing: fields.u16(2)?,
        is_alive: fields.bool(3)?,
        crew: fields.get_or_default(4),
        fuel: fields.f32(6)?,
        damage: fields.f32(7)?,
        locked: fields.bool(8)?,
        engine_on: fields.bool(9)?,
        side: Side::from_host(&fields.get_or_default(10)),
    };

    ctx.queues.vehicle_states.push(record);
    Ok(())
}
