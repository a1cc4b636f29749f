//! Event processors: `:EVENT:`, `:CHAT:`, `:RADIO:`, `:FPS:`.

use serde_json::Value;

use crate::error::Result;
use crate::parse::Fields;
use crate::processors::{current_mission_id, resolve_soldier, ProcessorCtx};
use crate::router::Payload;
use ocap_domain::{chat_channel_name, RadioType, Transmission};
use ocap_persistence::{NewChatEvent, NewFpsEvent, NewGeneralEvent, NewRadioEvent};

/// Payload layout: captureFrame, name, message, [extraData].
pub(super) async fn handle_general(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("general_event", &payload);
    let mission_id = current_mission_id(&ctx)?;

    // Payload is frame, name, message, stamp without extra data
    let extra_data = if fields.len() > 4 {
        parse_extra_data(&fields.get(3)?)
    } else {
        None
    };

    let record = NewGeneralEvent {
        mission_id,
        capture_frame: fields.u32(0)?,
        time: fields.stamped_time()?,
        name: fields.get(1)?,
        message: fields.get(2)?,
        extra_data,
    };

    ctx.queues.general.push(record);
    Ok(())
}

/// Invalid JSON is preserved as a plain string rather than thrown away.
fn parse_extra_data(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(raw.to_string())),
    }
}

/// Payload layout: ocapId, captureFrame, channelId, fromName, senderName,
/// playerUid, message. An ocap id of -1 marks an engine message with no
/// soldier attached.
pub(super) async fn handle_chat(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("chat", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let capture_frame = fields.u32(1)?;
    let sender = fields.i32(0)?;
    let soldier_id = if sender >= 0 {
        Some(resolve_soldier(&ctx, mission_id, sender as u16, capture_frame).await?)
    } else {
        None
    };

    let record = NewChatEvent {
        mission_id,
        soldier_id,
        capture_frame,
        time: fields.stamped_time()?,
        channel: chat_channel_name(fields.i32(2)?).to_string(),
        from_name: fields.get(3)?,
        sender_name: fields.get(4)?,
        player_uid: fields.get_or_default(5),
        message: fields.get(6)?,
    };

    ctx.queues.chat.push(record);
    Ok(())
}

/// Payload layout: ocapId, captureFrame, radio, radioType, transmission,
/// channel, isAdditional, frequency, code.
pub(super) async fn handle_radio(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("radio", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let capture_frame = fields.u32(1)?;
    let sender = fields.i32(0)?;
    let soldier_id = if sender >= 0 {
        Some(resolve_soldier(&ctx, mission_id, sender as u16, capture_frame).await?)
    } else {
        None
    };

    let record = NewRadioEvent {
        mission_id,
        soldier_id,
        capture_frame,
        time: fields.stamped_time()?,
        radio: fields.get(2)?,
        radio_type: RadioType::from_host(&fields.get(3)?)?,
        transmission: Transmission::from_host(&fields.get(4)?)?,
        channel: fields.i32(5)? as i8,
        is_additional: fields.bool(6)?,
        frequency: fields.f32(7)?,
        code: fields.get_or_default(8),
    };

    ctx.queues.radio.push(record);
    Ok(())
}

/// Payload layout: fpsAverage, fpsMin.
pub(super) async fn handle_fps(ctx: ProcessorCtx, payload: Payload) -> Result<()> {
    let fields = Fields::new("fps", &payload);
    let mission_id = current_mission_id(&ctx)?;

    let record = NewFpsEvent {
        mission_id,
        time: fields.stamped_time()?,
        fps_average: fields.f32(0)?,
        fps_min: fields.f32(1)?,
    };

    ctx.queues.fps.push(record);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extra_data() {
        assert_eq!(parse_extra_data(""), None);
        assert_eq!(
            parse_extra_data("{\"winSide\":\"WEST\"}").unwrap()["winSide"],
            "WEST"
        );
        assert_eq!(
            parse_extra_data("not json"),
            Some(Value::String("not json".to_string()))
        );
    }
}
