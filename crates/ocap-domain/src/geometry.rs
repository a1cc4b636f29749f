//! Position literals, polylines, and the WGS-84 / Web-Mercator projection.
//!
//! Every position the recorder stores is Web-Mercator (SRID 3857). Host
//! payloads carry planar game-world coordinates that are already metric, so
//! only world reference points (latitude/longitude) go through the
//! projection.

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Half the Web-Mercator extent in meters (WGS-84 equatorial radius * pi).
const MERCATOR_EXTENT_M: f64 = 20_037_508.342789244;

/// A 3-D point. `z` is elevation above sea level in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Emit the canonical comma-separated literal. Round-trips through
    /// [`parse_position_3d`] exactly (f64 shortest-form display).
    pub fn to_literal(&self) -> String {
        format!("{},{},{}", self.x, self.y, self.z)
    }
}

/// Parse a comma-separated position literal.
///
/// Accepts `"x,y"` (z defaults to 0) or `"x,y,z"`; fields beyond the third
/// are ignored. Surrounding whitespace and one layer of `[` `]` brackets are
/// tolerated since host arrays arrive in literal form.
pub fn parse_position_3d(text: &str) -> Result<Position, DomainError> {
    let trimmed = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    let mut parts = trimmed.split(',');
    let x = parse_component(parts.next(), text)?;
    let y = parse_component(parts.next(), text)?;
    let z = match parts.next() {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| DomainError::InvalidCoordinates(text.to_string()))?,
        None => 0.0,
    };

    Ok(Position { x, y, z })
}

fn parse_component(raw: Option<&str>, original: &str) -> Result<f64, DomainError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DomainError::InvalidCoordinates(original.to_string()))?
        .parse::<f64>()
        .map_err(|_| DomainError::InvalidCoordinates(original.to_string()))
}

/// Parse a JSON polyline: an array of `[x, y]` pairs.
///
/// At least two points are required; any inner array shorter than two
/// elements invalidates the whole line. Extra components per point are
/// ignored.
pub fn parse_polyline(text: &str) -> Result<Vec<(f64, f64)>, DomainError> {
    let raw: Vec<Vec<f64>> = serde_json::from_str(text)
        .map_err(|e| DomainError::InvalidPolyline(format!("{text:?}: {e}")))?;

    if raw.len() < 2 {
        return Err(DomainError::InvalidPolyline(format!(
            "{text:?}: need at least 2 points, got {}",
            raw.len()
        )));
    }

    raw.iter()
        .map(|point| {
            if point.len() < 2 {
                Err(DomainError::InvalidPolyline(format!(
                    "{text:?}: point with {} components",
                    point.len()
                )))
            } else {
                Ok((point[0], point[1]))
            }
        })
        .collect()
}

/// Spherical Mercator projection of a WGS-84 coordinate.
///
/// `(0, 0)` maps to `(0, 0)` exactly; positive longitude maps to positive x
/// and positive latitude to positive y.
pub fn project_4326_to_3857(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon * MERCATOR_EXTENT_M / 180.0;
    let y = ((90.0 + lat) * std::f64::consts::PI / 360.0).tan().ln()
        / (std::f64::consts::PI / 180.0)
        * MERCATOR_EXTENT_M
        / 180.0;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_three_components() {
        let p = parse_position_3d("100.5,200.25,10").unwrap();
        assert_eq!(p, Position::new(100.5, 200.25, 10.0));
    }

    #[test]
    fn test_parse_two_components_defaults_z() {
        let p = parse_position_3d("3.5,-7.25").unwrap();
        assert_eq!(p.z, 0.0);
    }

    #[test]
    fn test_parse_extra_components_ignored() {
        let p = parse_position_3d("1,2,3,4,5").unwrap();
        assert_eq!(p, Position::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_parse_bracketed_literal() {
        let p = parse_position_3d("[100,200,10]").unwrap();
        assert_eq!(p, Position::new(100.0, 200.0, 10.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_position_3d("").is_err());
        assert!(parse_position_3d("1").is_err());
        assert!(parse_position_3d("a,b").is_err());
        assert!(parse_position_3d("1,,3").is_err());
    }

    #[test]
    fn test_literal_round_trip() {
        let original = parse_position_3d("1234.56789012345,-987.000000001,12.25").unwrap();
        let reparsed = parse_position_3d(&original.to_literal()).unwrap();
        assert!((original.x - reparsed.x).abs() < 1e-9);
        assert!((original.y - reparsed.y).abs() < 1e-9);
        assert!((original.z - reparsed.z).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_happy_path() {
        let line = parse_polyline("[[0,0],[10,20],[30,40]]").unwrap();
        assert_eq!(line.len(), 3);
        assert_eq!(line[1], (10.0, 20.0));
    }

    #[test]
    fn test_polyline_rejects_short_input() {
        assert!(parse_polyline("[]").is_err());
        assert!(parse_polyline("[[1,2]]").is_err());
        assert!(parse_polyline("[[1,2],[3]]").is_err());
        assert!(parse_polyline("not json").is_err());
    }

    #[test]
    fn test_projection_origin_and_signs() {
        let (x, y) = project_4326_to_3857(0.0, 0.0);
        assert_eq!(x, 0.0);
        assert_eq!(y, 0.0);

        let (x, y) = project_4326_to_3857(13.4, 52.5);
        assert!(x > 0.0);
        assert!(y > 0.0);

        let (x, y) = project_4326_to_3857(-70.6, -33.4);
        assert!(x < 0.0);
        assert!(y < 0.0);
    }

    #[test]
    fn test_projection_known_point() {
        // 180 degrees east pins to the mercator extent
        let (x, _) = project_4326_to_3857(180.0, 0.0);
        assert!((x - 20_037_508.342789244).abs() < 1e-6);
    }
}
