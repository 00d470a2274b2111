//! Fixed-interval driver for the cycle controller.
//!
//! Cycles never overlap: each one runs to completion, then the scheduler
//! sleeps for the interval plus optional random jitter. A failed cycle
//! triggers one best-effort meta-alert through the notifier.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tracing::{error, info, warn};

use sonde_core::alert::{error_message, ERROR_TITLE};
use sonde_core::config::MonitorConfig;
use sonde_core::types::SondeError;

use crate::cycle::{CycleController, CycleReport};

/// What happened on one tick of the scheduler.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Failed {
        error: SondeError,
        /// Result of reporting `error` through the notifier.
        meta_alert: Result<(), SondeError>,
    },
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    max_jitter: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, max_jitter: Duration) -> Self {
        Scheduler {
            interval,
            max_jitter,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.interval, config.max_jitter)
    }

    /// Interval plus a uniform draw from `[0, max_jitter]`.
    pub fn next_delay(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return self.interval;
        }
        self.interval + Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Run a single cycle and report a failure through the notifier.
    pub async fn run_once(&self, controller: &CycleController<'_>) -> CycleOutcome {
        match controller.run(Utc::now()).await {
            Ok(report) => CycleOutcome::Completed(report),
            Err(e) => {
                error!(error = %e, "cycle failed");
                let meta_alert = controller
                    .notifier()
                    .send_alert(ERROR_TITLE, &error_message(&e), None)
                    .await;
                if let Err(ref me) = meta_alert {
                    warn!(error = %me, "could not deliver error alert");
                }
                CycleOutcome::Failed {
                    error: e,
                    meta_alert,
                }
            }
        }
    }

    /// Run cycles until `shutdown` flips to `true`. Returns the number of
    /// cycles run. A cycle already in progress is allowed to finish.
    pub async fn run(
        &self,
        controller: &CycleController<'_>,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        let mut cycles = 0u64;
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_once(controller).await;
            cycles += 1;

            let delay = self.next_delay();
            info!(delay_secs = delay.as_secs_f64(), "sleeping until next cycle");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(cycles, "scheduler stopped");
        cycles
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
