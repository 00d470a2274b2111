//! Test helpers: a throwaway HTTP upstream and a ready-made config.

use std::path::Path;
use std::time::Duration;

use axum::Router;

use sonde_core::config::{HubConfig, MonitorConfig, DEFAULT_EVENT_TYPE, DEFAULT_NOTIFY_TARGET};

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn test_config(hub_url: &str, sondehub_url: &str, notified_file: &Path) -> MonitorConfig {
    MonitorConfig {
        hub: HubConfig {
            base_url: hub_url.to_string(),
            token: "secret".into(),
            notify_target: DEFAULT_NOTIFY_TARGET.parse().unwrap(),
            event_type: DEFAULT_EVENT_TYPE.into(),
        },
        sondehub_url: sondehub_url.to_string(),
        entity_id: "person.trick".into(),
        radius_km: 25.0,
        notified_file: notified_file.to_path_buf(),
        interval: Duration::from_millis(1),
        max_jitter: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
    }
}
