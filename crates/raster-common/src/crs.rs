//! Coordinate reference systems a raster may be stored in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Half the circumference of the Web Mercator sphere, in meters.
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.342789244;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CrsCode {
    /// WGS84 lon/lat in degrees.
    #[default]
    Epsg4326,
    /// Spherical Web Mercator in meters.
    Epsg3857,
}

impl CrsCode {
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(Self::Epsg4326),
            // 900913 and 3785 are retired aliases of 3857.
            3857 | 900913 | 3785 => Some(Self::Epsg3857),
            _ => None,
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Self::Epsg4326 => 4326,
            Self::Epsg3857 => 3857,
        }
    }

    /// Parse `EPSG:<code>`, a bare EPSG code, or `CRS:84` / `OGC:CRS84`.
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let upper = s.trim().to_uppercase();
        if matches!(upper.as_str(), "CRS:84" | "OGC:CRS84") {
            return Ok(Self::Epsg4326);
        }

        upper
            .strip_prefix("EPSG:")
            .unwrap_or(&upper)
            .parse::<u32>()
            .ok()
            .and_then(Self::from_epsg)
            .ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))
    }

    /// Read a CRS from a JSON attribute holding either a string or an EPSG
    /// number.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CrsParseError> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|code| u32::try_from(code).ok())
                .and_then(Self::from_epsg)
                .ok_or_else(|| CrsParseError::UnsupportedCrs(n.to_string())),
            other => Err(CrsParseError::UnsupportedCrs(other.to_string())),
        }
    }

    /// Area over which coordinates of this CRS are defined.
    pub fn valid_bounds(&self) -> BoundingBox {
        match self {
            Self::Epsg4326 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            Self::Epsg3857 => BoundingBox::new(
                -WEB_MERCATOR_EXTENT,
                -WEB_MERCATOR_EXTENT,
                WEB_MERCATOR_EXTENT,
                WEB_MERCATOR_EXTENT,
            ),
        }
    }
}

impl FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("unsupported CRS '{0}'")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_crs() {
        assert_eq!(CrsCode::parse("EPSG:4326").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse(" epsg:3857 ").unwrap(), CrsCode::Epsg3857);
        assert_eq!(CrsCode::parse("CRS:84").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse("3857").unwrap(), CrsCode::Epsg3857);
        assert_eq!("EPSG:900913".parse::<CrsCode>().unwrap(), CrsCode::Epsg3857);
        assert!(CrsCode::parse("EPSG:5070").is_err());
        assert!(CrsCode::parse("EPSG:").is_err());
    }

    #[test]
    fn test_from_json_attribute() {
        assert_eq!(CrsCode::from_json(&json!("EPSG:3857")).unwrap(), CrsCode::Epsg3857);
        assert_eq!(CrsCode::from_json(&json!(4326)).unwrap(), CrsCode::Epsg4326);
        assert!(CrsCode::from_json(&json!(-1)).is_err());
        assert!(CrsCode::from_json(&json!([4326])).is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for crs in [CrsCode::Epsg4326, CrsCode::Epsg3857] {
            assert_eq!(crs.to_string(), format!("EPSG:{}", crs.epsg()));
            assert_eq!(CrsCode::parse(&crs.to_string()).unwrap(), crs);
        }
    }
}
