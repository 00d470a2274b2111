//! Alert composition: per-event distance and age, message text, and the
//! structured record fired to the hub for dashboards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::distance_km;
use crate::types::{Coordinate, LandingEvent, Result, SondeError};

pub const ALERT_TITLE: &str = "Sonde Alert";
pub const ERROR_TITLE: &str = "Sonde Alert Error";
pub const SONDEHUB_SITE: &str = "https://sondehub.org";

/// Public tracker page for a sonde.
pub fn deep_link(id: &str) -> String {
    format!("{SONDEHUB_SITE}/{id}")
}

/// Parse the event's reported landing time.
pub fn parse_observed_at(event: &LandingEvent) -> Result<DateTime<Utc>> {
    let raw = event
        .observed_at
        .as_deref()
        .ok_or_else(|| SondeError::MalformedData {
            id: event.id.clone(),
            field: "datetime",
            detail: "missing".into(),
        })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SondeError::MalformedData {
            id: event.id.clone(),
            field: "datetime",
            detail: format!("{raw:?}: {e}"),
        })
}

/// Everything needed to describe one landing to the user.
#[derive(Debug, Clone)]
pub struct AlertContext<'a> {
    pub event: &'a LandingEvent,
    pub observer: Coordinate,
    pub tracked_entity_id: &'a str,
    pub distance_km: f64,
    /// Seconds since landing, never negative.
    pub age_secs: i64,
}

impl<'a> AlertContext<'a> {
    /// Fails with `MalformedData` if the event timestamp can't be parsed.
    pub fn new(
        event: &'a LandingEvent,
        observer: Coordinate,
        tracked_entity_id: &'a str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let landed = parse_observed_at(event)?;
        let age_secs = (now - landed).num_seconds().max(0);
        Ok(AlertContext {
            event,
            observer,
            tracked_entity_id,
            distance_km: distance_km(observer, event.location),
            age_secs,
        })
    }

    /// Age rounded to the nearest whole minute.
    pub fn age_minutes(&self) -> i64 {
        (self.age_secs + 30) / 60
    }

    /// Rounded age in `1h5m0s` form.
    pub fn landed_ago(&self) -> String {
        let mins = self.age_minutes();
        let (h, m) = (mins / 60, mins % 60);
        if h > 0 {
            format!("{h}h{m}m0s")
        } else if m > 0 {
            format!("{m}m0s")
        } else {
            "0s".to_string()
        }
    }

    pub fn url(&self) -> String {
        deep_link(&self.event.id)
    }

    /// One-line summary, e.g. `Sonde X1 at 1200 m about 12 min ago, 7.0 km away`.
    pub fn message(&self) -> String {
        format!(
            "Sonde {} at {} m about {} min ago, {:.1} km away",
            self.event.id,
            self.event.altitude.round() as i64,
            self.age_minutes(),
            self.distance_km
        )
    }

    pub fn event_payload(&self) -> AlertEventPayload {
        AlertEventPayload {
            sonde_id: self.event.id.clone(),
            sonde_lat: self.event.location.latitude,
            sonde_lon: self.event.location.longitude,
            sonde_alt: self.event.altitude,
            distance_km: self.distance_km,
            user: self.tracked_entity_id.to_string(),
            user_lat: self.observer.latitude,
            user_lon: self.observer.longitude,
            sonde_url: self.url(),
            landed_ago: self.landed_ago(),
            message: self.message(),
        }
    }
}

/// Body of the audit event posted to `/api/events/{type}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEventPayload {
    pub sonde_id: String,
    pub sonde_lat: f64,
    pub sonde_lon: f64,
    pub sonde_alt: f64,
    pub distance_km: f64,
    pub user: String,
    pub user_lat: f64,
    pub user_lon: f64,
    pub sonde_url: String,
    pub landed_ago: String,
    pub message: String,
}

/// Body of the meta-alert sent when a whole cycle fails.
pub fn error_message(err: &SondeError) -> String {
    format!("Error checking sondes: {err}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn event(datetime: Option<&str>) -> LandingEvent {
        LandingEvent {
            id: "X1".into(),
            location: Coordinate::new(40.05, -74.05),
            altitude: 1200.4,
            observed_at: datetime.map(str::to_string),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 12, 0).unwrap()
    }

    #[test]
    fn test_context_scenario() {
        let ev = event(Some("2024-05-01T12:00:00Z"));
        let ctx = AlertContext::new(&ev, Coordinate::new(40.0, -74.0), "person.trick", now())
            .unwrap();
        assert_eq!(ctx.age_minutes(), 12);
        assert_eq!(ctx.landed_ago(), "12m0s");

        let msg = ctx.message();
        assert!(msg.contains("X1"));
        assert!(msg.contains("1200 m"));
        assert!(msg.contains("12 min"));
        assert!(msg.contains(&format!("{:.1} km", ctx.distance_km)));
        assert_eq!(ctx.url(), "https://sondehub.org/X1");
    }

    #[test]
    fn test_offset_timestamp() {
        let ev = event(Some("2024-05-01T14:00:00+02:00"));
        let ctx = AlertContext::new(&ev, Coordinate::new(40.0, -74.0), "p", now()).unwrap();
        assert_eq!(ctx.age_minutes(), 12);
    }

    #[test]
    fn test_age_rounding_and_hours() {
        let ev = event(Some("2024-05-01T12:00:00Z"));
        let later = Utc.with_ymd_and_hms(2024, 5, 1, 13, 5, 31).unwrap();
        let ctx = AlertContext::new(&ev, Coordinate::new(40.0, -74.0), "p", later).unwrap();
        assert_eq!(ctx.age_minutes(), 66);
        assert_eq!(ctx.landed_ago(), "1h6m0s");
    }

    #[test]
    fn test_future_timestamp_clamped() {
        let ev = event(Some("2024-05-01T12:00:00Z"));
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() - Duration::minutes(5);
        let ctx = AlertContext::new(&ev, Coordinate::new(40.0, -74.0), "p", earlier).unwrap();
        assert_eq!(ctx.age_secs, 0);
        assert_eq!(ctx.landed_ago(), "0s");
    }

    #[test]
    fn test_malformed_timestamp() {
        let ev = event(Some("yesterday-ish"));
        let err = AlertContext::new(&ev, Coordinate::new(40.0, -74.0), "p", now()).unwrap_err();
        assert!(matches!(err, SondeError::MalformedData { ref id, .. } if id == "X1"));
    }

    #[test]
    fn test_missing_timestamp() {
        let ev = event(None);
        assert!(parse_observed_at(&ev).is_err());
    }

    #[test]
    fn test_event_payload_serialization() {
        let ev = event(Some("2024-05-01T12:00:00Z"));
        let ctx = AlertContext::new(&ev, Coordinate::new(40.0, -74.0), "person.trick", now())
            .unwrap();
        let json = serde_json::to_value(ctx.event_payload()).unwrap();
        assert_eq!(json["sonde_id"], "X1");
        assert_eq!(json["user"], "person.trick");
        assert_eq!(json["sonde_url"], "https://sondehub.org/X1");
        assert_eq!(json["landed_ago"], "12m0s");
        assert!(json["distance_km"].as_f64().is_some());
    }

    #[test]
    fn test_error_message() {
        let e = SondeError::upstream("location", "status 500");
        assert_eq!(
            error_message(&e),
            "Error checking sondes: upstream error during location: status 500"
        );
    }
}
