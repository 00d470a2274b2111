//! Shared types and error enum for sonde-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced while running the monitor.
#[derive(Debug, Error)]
pub enum SondeError {
    #[error("upstream error during {op}: {detail}")]
    Upstream { op: &'static str, detail: String },
    #[error("storage error at {path}: {detail}")]
    Storage { path: String, detail: String },
    #[error("malformed {field} for sonde {id}: {detail}")]
    MalformedData {
        id: String,
        field: &'static str,
        detail: String,
    },
    #[error("config error: {0}")]
    Config(String),
}

impl SondeError {
    pub fn upstream(op: &'static str, detail: impl ToString) -> Self {
        SondeError::Upstream {
            op,
            detail: detail.to_string(),
        }
    }

    pub fn storage(path: impl ToString, detail: impl ToString) -> Self {
        SondeError::Storage {
            path: path.to_string(),
            detail: detail.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SondeError>;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate {
            latitude,
            longitude,
        }
    }
}

// ---------------------------------------------------------------------------
// Landing events
// ---------------------------------------------------------------------------

/// A single sonde touchdown as reported by the tracking API.
#[derive(Debug, Clone, PartialEq)]
pub struct LandingEvent {
    pub id: String,
    pub location: Coordinate,
    /// Meters above sea level.
    pub altitude: f64,
    /// Source-reported RFC3339 timestamp. Not validated until the event is evaluated.
    pub observed_at: Option<String>,
}

/// Wire shape of one entry in the SondeHub `/sondes` response.
///
/// The response is an object keyed by serial; unknown fields are ignored.
/// Every field is optional on the wire so that one incomplete record can be
/// rejected on its own instead of failing the whole response.
#[derive(Debug, Clone, Deserialize)]
pub struct SondeRecord {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub datetime: Option<String>,
}

impl SondeRecord {
    /// Decode one response entry. A null or missing altitude reads as 0 m;
    /// a missing or non-numeric position is `MalformedData`.
    pub fn from_value(id: &str, value: serde_json::Value) -> Result<LandingEvent> {
        let rec: SondeRecord =
            serde_json::from_value(value).map_err(|e| SondeError::MalformedData {
                id: id.to_string(),
                field: "record",
                detail: e.to_string(),
            })?;
        rec.into_event(id.to_string())
    }

    pub fn into_event(self, id: String) -> Result<LandingEvent> {
        let (Some(lat), Some(lon)) = (self.lat, self.lon) else {
            return Err(SondeError::MalformedData {
                id,
                field: "position",
                detail: "missing lat/lon".into(),
            });
        };
        Ok(LandingEvent {
            id,
            location: Coordinate::new(lat, lon),
            altitude: self.alt.unwrap_or(0.0),
            observed_at: self.datetime,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
