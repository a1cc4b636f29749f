//! Host callback seam.
//!
//! The marshalling shim that carries these callbacks across the native
//! boundary lives outside this crate; everything here targets the seam: a
//! trait the lifecycle controller and processors call, plus the string
//! preprocessing every outbound payload goes through.

use std::sync::Arc;

/// Extension name reported with every callback.
pub const EXTENSION_NAME: &str = "ocap_recorder";

/// Well-known callback function names.
pub const CB_DB_OK: &str = ":DB:OK:";
pub const CB_DB_ERROR: &str = ":DB:ERROR:";
pub const CB_MISSION_OK: &str = ":MISSION:OK:";
pub const CB_VERSION: &str = ":VERSION:";

/// Asynchronous host callback channel: `(extension, function, payload)`.
pub trait HostCallback: Send + Sync {
    fn callback(&self, function: &str, payload: &str);
}

pub type SharedCallback = Arc<dyn HostCallback>;

/// Default sink when no host is attached (CLI verbs, tests): relays
/// callbacks to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCallback;

impl HostCallback for LogCallback {
    fn callback(&self, function: &str, payload: &str) {
        tracing::info!(extension = EXTENSION_NAME, function, payload, "host callback");
    }
}

/// Preprocess a string for the host boundary: single quotes are doubled and
/// square brackets become parentheses so the payload survives the host's
/// array-literal parser.
pub fn sanitize_outbound(s: &str) -> String {
    s.replace('\'', "''")
        .replace('[', "(")
        .replace(']', ")")
}

/// Encode a field the way the host quotes its arguments: wrapped in double
/// quotes with inner quotes doubled. Inverse of the processors' field
/// preprocessing; used by the demo generator and tests to emulate host
/// traffic.
pub fn encode_field(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Render a callback payload as the host-side array literal.
pub fn payload_array(fields: &[&str]) -> String {
    let joined = fields
        .iter()
        .map(|f| format!("\"{}\"", sanitize_outbound(f)))
        .collect::<Vec<_>>()
        .join(",");
    format!("({joined})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_outbound() {
        assert_eq!(sanitize_outbound("it's"), "it''s");
        assert_eq!(sanitize_outbound("[1,[2,3]]"), "(1,(2,3))");
    }

    #[test]
    fn test_payload_array() {
        assert_eq!(payload_array(&["ok", "sqlite"]), "(\"ok\",\"sqlite\")");
    }

    #[test]
    fn test_encode_field_doubles_quotes() {
        assert_eq!(encode_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(encode_field("plain"), "\"plain\"");
    }
}
