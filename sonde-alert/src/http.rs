//! Shared reqwest plumbing: client construction and status checks.

use std::time::Duration;

use sonde_core::types::{Result, SondeError};

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sonde-alert/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SondeError::Config(format!("HTTP client: {e}")))
}

/// Map a transport error (including timeouts) into `Upstream`.
pub fn transport(op: &'static str, e: reqwest::Error) -> SondeError {
    if e.is_timeout() {
        SondeError::upstream(op, format!("timed out: {e}"))
    } else {
        SondeError::upstream(op, e)
    }
}

/// Reject any non-2xx response, keeping the body for diagnostics.
pub async fn check_status(op: &'static str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let body = body.trim();
    Err(SondeError::upstream(
        op,
        if body.is_empty() {
            format!("status {}", status.as_u16())
        } else {
            format!("status {}: {body}", status.as_u16())
        },
    ))
}
