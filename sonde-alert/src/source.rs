//! Collaborator seams used by the cycle controller.
//!
//! The HTTP clients in `hub` and `sondehub` implement these; tests swap in
//! in-memory fakes.

use std::collections::BTreeMap;

use sonde_core::alert::AlertEventPayload;
use sonde_core::types::{Coordinate, LandingEvent, Result, SondeError};

/// Landings keyed by sonde id.
pub type Landings = BTreeMap<String, LandingEvent>;

/// One response from an event source.
#[derive(Debug, Default)]
pub struct LandingBatch {
    pub landings: Landings,
    /// Entries that couldn't be decoded, as `MalformedData`.
    pub rejected: Vec<SondeError>,
}

impl From<Landings> for LandingBatch {
    fn from(landings: Landings) -> Self {
        LandingBatch {
            landings,
            rejected: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
pub trait LocationSource: Send + Sync {
    /// Current coordinates of a hub entity.
    async fn current_location(&self, entity_id: &str) -> Result<Coordinate>;
}

#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Landings reported within `radius_km` of `center`. Empty is not an error,
    /// and a bad entry only rejects that entry.
    async fn nearby_landings(&self, center: Coordinate, radius_km: f64) -> Result<LandingBatch>;
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a human-readable alert, optionally with a link.
    async fn send_alert(&self, title: &str, message: &str, url: Option<&str>) -> Result<()>;

    /// Fire a structured audit event for dashboards.
    async fn fire_event(&self, payload: &AlertEventPayload) -> Result<()>;
}
