//! sonde-core: Pure pieces of the sonde landing monitor.
//!
//! No async, no network — geo math, alert composition, configuration, and
//! the file-backed dedup store. Used by the `sonde-alert` daemon.

pub mod alert;
pub mod config;
pub mod dedup;
pub mod geo;
pub mod types;

// Re-export commonly used types at crate root
pub use alert::{AlertContext, AlertEventPayload};
pub use config::{HubConfig, MonitorConfig, NotifyTarget};
pub use dedup::{DedupRecord, DedupStore};
pub use geo::distance_km;
pub use types::*;
