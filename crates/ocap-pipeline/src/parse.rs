//! Common payload preprocessing.
//!
//! Host payload fields arrive as quoted strings with doubled inner quotes.
//! Every processor runs its fields through [`Fields`], which strips the
//! surrounding quotes, unescapes `""` to `"`, and offers typed accessors
//! that turn parse failures into `InvalidInput`.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{PipelineError, Result};

/// Strip one layer of surrounding double quotes and unescape doubled inner
/// quotes.
pub fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unquoted.replace("\"\"", "\"")
}

/// Typed accessor over a stamped payload. The final element is always the
/// dispatch timestamp in nanoseconds.
pub struct Fields<'a> {
    kind: &'static str,
    raw: &'a [String],
}

impl<'a> Fields<'a> {
    pub fn new(kind: &'static str, raw: &'a [String]) -> Self {
        Self { kind, raw }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<String> {
        self.raw
            .get(index)
            .map(|s| clean_field(s))
            .ok_or(PipelineError::MissingField {
                kind: self.kind,
                index,
            })
    }

    /// Field or empty string when the payload is short (optional trailing
    /// fields).
    pub fn get_or_default(&self, index: usize) -> String {
        self.raw.get(index).map(|s| clean_field(s)).unwrap_or_default()
    }

    pub fn u32(&self, index: usize) -> Result<u32> {
        let field = self.get(index)?;
        field
            .parse::<u32>()
            .map_err(|_| invalid(self.kind, index, &field, "u32"))
    }

    pub fn u16(&self, index: usize) -> Result<u16> {
        let field = self.get(index)?;
        field
            .parse::<u16>()
            .map_err(|_| invalid(self.kind, index, &field, "u16"))
    }

    pub fn i32(&self, index: usize) -> Result<i32> {
        let field = self.get(index)?;
        field
            .parse::<i32>()
            .map_err(|_| invalid(self.kind, index, &field, "i32"))
    }

    pub fn f32(&self, index: usize) -> Result<f32> {
        let field = self.get(index)?;
        field
            .parse::<f32>()
            .map_err(|_| invalid(self.kind, index, &field, "f32"))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        let field = self.get(index)?;
        match field.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            _ => Err(invalid(self.kind, index, &field, "bool")),
        }
    }

    /// The dispatch-stamped timestamp appended by the router.
    pub fn stamped_time(&self) -> Result<DateTime<Utc>> {
        if self.raw.is_empty() {
            return Err(PipelineError::MissingField {
                kind: self.kind,
                index: 0,
            });
        }
        let index = self.raw.len() - 1;
        let field = self.get(index)?;
        let nanos = field
            .parse::<i64>()
            .map_err(|_| invalid(self.kind, index, &field, "nanoseconds"))?;
        Ok(Utc.timestamp_nanos(nanos))
    }
}

fn invalid(kind: &str, index: usize, field: &str, expected: &str) -> PipelineError {
    PipelineError::InvalidInput(format!(
        "{kind} field {index}: {field:?} is not a valid {expected}"
    ))
}

/// Current wall clock in nanoseconds since the epoch. Stamped by the
/// dispatch thread at receipt so ordering is independent of channel drain
/// order.
pub fn now_ns() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt().unwrap_or_else(|| {
        // Past 2262 the i64 nanosecond clock saturates
        i64::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_field_strips_and_unescapes() {
        assert_eq!(clean_field("\"Alpha\""), "Alpha");
        assert_eq!(clean_field("\"say \"\"hi\"\"\""), "say \"hi\"");
        assert_eq!(clean_field("plain"), "plain");
        assert_eq!(clean_field("\"\""), "");
    }

    #[test]
    fn test_typed_accessors() {
        let raw: Vec<String> = ["\"5\"", "\"true\"", "\"1.5\"", "\"-3\""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let fields = Fields::new("test", &raw);
        assert_eq!(fields.u32(0).unwrap(), 5);
        assert!(fields.bool(1).unwrap());
        assert!((fields.f32(2).unwrap() - 1.5).abs() < 1e-6);
        assert_eq!(fields.i32(3).unwrap(), -3);
        assert!(fields.u32(1).is_err());
        assert!(fields.get(9).is_err());
    }

    #[test]
    fn test_stamped_time_is_last_element() {
        let raw: Vec<String> = vec!["\"x\"".to_string(), "1700000000000000000".to_string()];
        let fields = Fields::new("test", &raw);
        let time = fields.stamped_time().unwrap();
        assert_eq!(time.timestamp(), 1_700_000_000);
    }
}
