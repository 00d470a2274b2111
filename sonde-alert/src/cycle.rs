//! One poll cycle: locate, fetch landings, filter, alert, record.
//!
//! Location and landing fetches abort the cycle on failure. Everything past
//! that is scoped to a single sonde: an undecodable record, a bad timestamp,
//! a failed alert or a failed save only affects that sonde, and is recorded in the
//! [`CycleReport`] so callers can see it without it changing control flow.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use sonde_core::alert::{AlertContext, ALERT_TITLE};
use sonde_core::config::MonitorConfig;
use sonde_core::dedup::DedupStore;
use sonde_core::types::{Coordinate, LandingEvent, Result, SondeError};

use crate::source::{EventSource, LocationSource, Notifier};

/// Side effects of a completed cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub location: Option<Coordinate>,
    pub candidates: usize,
    /// Alerted and marked this cycle.
    pub notified: Vec<String>,
    pub already_notified: Vec<String>,
    /// Rejected by the event source or skipped because a field couldn't be
    /// parsed. Retried next cycle.
    pub malformed: Vec<SondeError>,
    /// Alert delivery failed. Left unmarked for retry.
    pub dispatch_failures: Vec<(String, SondeError)>,
    /// Audit event failed; the alert itself may still have gone out.
    pub audit_failures: Vec<(String, SondeError)>,
    /// Alert delivered but the dedup file couldn't be written.
    pub save_failures: Vec<(String, SondeError)>,
}

pub struct CycleController<'a> {
    config: &'a MonitorConfig,
    location: &'a dyn LocationSource,
    events: &'a dyn EventSource,
    notifier: &'a dyn Notifier,
    store: DedupStore,
}

impl<'a> CycleController<'a> {
    pub fn new(
        config: &'a MonitorConfig,
        location: &'a dyn LocationSource,
        events: &'a dyn EventSource,
        notifier: &'a dyn Notifier,
    ) -> Self {
        CycleController {
            config,
            location,
            events,
            notifier,
            store: DedupStore::new(&config.notified_file),
        }
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier
    }

    /// Run one cycle as of `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let entity = self.config.entity_id.as_str();
        let here = self.location.current_location(entity).await?;
        info!(
            entity,
            lat = here.latitude,
            lon = here.longitude,
            "tracked location"
        );

        let batch = self
            .events
            .nearby_landings(here, self.config.radius_km)
            .await?;
        let landings = batch.landings;

        let mut report = CycleReport {
            location: Some(here),
            candidates: landings.len(),
            malformed: batch.rejected,
            ..CycleReport::default()
        };

        if landings.is_empty() {
            info!(radius_km = self.config.radius_km, "no nearby landed sondes");
            return Ok(report);
        }

        let mut record = self.store.load()?;

        for (id, event) in &landings {
            if record.is_notified(id) {
                debug!(sonde_id = %id, "already notified");
                report.already_notified.push(id.clone());
                continue;
            }

            let ctx = match AlertContext::new(event, here, entity, now) {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!(sonde_id = %id, error = %e, "skipping sonde");
                    report.malformed.push(e);
                    continue;
                }
            };

            if let Err(e) = self.dispatch(event, &ctx, &mut report).await {
                error!(sonde_id = %id, op = "notify", error = %e, "alert failed");
                report.dispatch_failures.push((id.clone(), e));
                continue;
            }

            record.mark_notified(id);
            report.notified.push(id.clone());
            if let Err(e) = self.store.save(&record) {
                error!(sonde_id = %id, op = "save", error = %e, "could not persist dedup record");
                report.save_failures.push((id.clone(), e));
            }
        }

        info!(
            candidates = report.candidates,
            notified = report.notified.len(),
            skipped = report.already_notified.len(),
            "cycle complete"
        );
        Ok(report)
    }

    async fn dispatch(
        &self,
        event: &LandingEvent,
        ctx: &AlertContext<'_>,
        report: &mut CycleReport,
    ) -> Result<()> {
        let message = ctx.message();
        let url = ctx.url();
        info!(sonde_id = %event.id, distance_km = ctx.distance_km, "{message}");

        if let Err(e) = self.notifier.fire_event(&ctx.event_payload()).await {
            warn!(sonde_id = %event.id, op = "event", error = %e, "audit event failed");
            report.audit_failures.push((event.id.clone(), e));
        }

        self.notifier
            .send_alert(ALERT_TITLE, &message, Some(&url))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
