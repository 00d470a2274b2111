//! Monitor configuration.
//!
//! Built once at startup from CLI flags and environment, validated, then
//! passed by reference to every collaborator.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::types::{Result, SondeError};

pub const DEFAULT_SONDEHUB_URL: &str = "https://api.v2.sondehub.org";
pub const DEFAULT_NOTIFY_TARGET: &str = "script.notify_a_person_on_all_devices";
pub const DEFAULT_EVENT_TYPE: &str = "sonde_alert";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where alerts are delivered on the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    /// `script.<name>`: a script taking `{person, title, message}`.
    Script(String),
    /// `notify.<service>`: a notify service taking `{title, message, data: {url}}`.
    Service(String),
}

impl FromStr for NotifyTarget {
    type Err = SondeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('.') {
            Some(("script", name)) if !name.is_empty() => Ok(NotifyTarget::Script(name.into())),
            Some(("notify", name)) if !name.is_empty() => Ok(NotifyTarget::Service(name.into())),
            _ => Err(SondeError::Config(format!(
                "notify target must be script.<name> or notify.<service>, got {s:?}"
            ))),
        }
    }
}

impl std::fmt::Display for NotifyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyTarget::Script(name) => write!(f, "script.{name}"),
            NotifyTarget::Service(name) => write!(f, "notify.{name}"),
        }
    }
}

/// Hub connection settings.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub base_url: String,
    pub token: String,
    pub notify_target: NotifyTarget,
    pub event_type: String,
}

/// Full configuration for one monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub hub: HubConfig,
    pub sondehub_url: String,
    /// Tracked entity, e.g. `person.trick`.
    pub entity_id: String,
    pub radius_km: f64,
    pub notified_file: PathBuf,
    pub interval: Duration,
    pub max_jitter: Duration,
    pub request_timeout: Duration,
}

impl MonitorConfig {
    /// Check required values before the loop starts.
    pub fn validate(&self) -> Result<()> {
        require("hub URL", &self.hub.base_url)?;
        require("hub token", &self.hub.token)?;
        require("entity id", &self.entity_id)?;
        require("event type", &self.hub.event_type)?;
        require("SondeHub URL", &self.sondehub_url)?;
        if self.notified_file.as_os_str().is_empty() {
            return Err(SondeError::Config("notified file path is required".into()));
        }
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(SondeError::Config(format!(
                "search radius must be a positive number of km, got {}",
                self.radius_km
            )));
        }
        if self.interval.is_zero() {
            return Err(SondeError::Config("poll interval must be non-zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(SondeError::Config("request timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Hub base URL without a trailing slash.
    pub fn hub_url(&self) -> &str {
        self.hub.base_url.trim_end_matches('/')
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SondeError::Config(format!("{name} is required")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MonitorConfig {
        MonitorConfig {
            hub: HubConfig {
                base_url: "http://ha.local:8123/".into(),
                token: "secret".into(),
                notify_target: DEFAULT_NOTIFY_TARGET.parse().unwrap(),
                event_type: DEFAULT_EVENT_TYPE.into(),
            },
            sondehub_url: DEFAULT_SONDEHUB_URL.into(),
            entity_id: "person.trick".into(),
            radius_km: 25.0,
            notified_file: "notified_trick.json".into(),
            interval: DEFAULT_INTERVAL,
            max_jitter: Duration::ZERO,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    #[test]
    fn test_valid_config() {
        let c = config();
        assert!(c.validate().is_ok());
        assert_eq!(c.hub_url(), "http://ha.local:8123");
    }

    #[test]
    fn test_missing_token() {
        let mut c = config();
        c.hub.token = "  ".into();
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("hub token"));
    }

    #[test]
    fn test_bad_radius() {
        for r in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let mut c = config();
            c.radius_km = r;
            assert!(c.validate().is_err(), "radius {r} should be rejected");
        }
    }

    #[test]
    fn test_zero_interval() {
        let mut c = config();
        c.interval = Duration::ZERO;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_notify_target_parse() {
        assert_eq!(
            "script.notify_a_person_on_all_devices".parse::<NotifyTarget>().unwrap(),
            NotifyTarget::Script("notify_a_person_on_all_devices".into())
        );
        assert_eq!(
            "notify.mobile_app_pixel".parse::<NotifyTarget>().unwrap(),
            NotifyTarget::Service("mobile_app_pixel".into())
        );
        assert!("light.kitchen".parse::<NotifyTarget>().is_err());
        assert!("script.".parse::<NotifyTarget>().is_err());
        assert!("nodot".parse::<NotifyTarget>().is_err());
    }

    #[test]
    fn test_notify_target_display_roundtrip() {
        let t = NotifyTarget::Service("mobile_app_pixel".into());
        assert_eq!(t.to_string().parse::<NotifyTarget>().unwrap(), t);
    }
}
