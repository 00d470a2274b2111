//! Home Assistant client: entity location, alert delivery, audit events.
//!
//! Every request carries the long-lived bearer token and the configured
//! timeout. Any status outside 2xx is an `Upstream` error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use sonde_core::alert::AlertEventPayload;
use sonde_core::config::{MonitorConfig, NotifyTarget};
use sonde_core::types::{Coordinate, Result, SondeError};

use crate::http::{build_client, check_status, transport};
use crate::source::{LocationSource, Notifier};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StateResponse {
    #[serde(default)]
    attributes: StateAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct StateAttributes {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Body for `script.<name>` targets.
#[derive(Debug, Serialize)]
pub struct ScriptNotifyPayload<'a> {
    pub person: &'a str,
    pub title: &'a str,
    pub message: String,
}

/// Body for `notify.<service>` targets.
#[derive(Debug, Serialize)]
pub struct ServiceNotifyPayload<'a> {
    pub title: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NotifyData<'a>>,
}

#[derive(Debug, Serialize)]
pub struct NotifyData<'a> {
    pub url: &'a str,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct HubClient {
    base_url: String,
    token: String,
    person: String,
    notify_target: NotifyTarget,
    event_type: String,
    client: reqwest::Client,
}

impl HubClient {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        Ok(HubClient {
            base_url: config.hub_url().to_string(),
            token: config.hub.token.clone(),
            person: config.entity_id.clone(),
            notify_target: config.hub.notify_target.clone(),
            event_type: config.hub.event_type.clone(),
            client: build_client(config.request_timeout)?,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        op: &'static str,
        path: &str,
        body: &T,
    ) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        debug!(op, %url, "hub POST");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(op, e))?;
        check_status(op, resp).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LocationSource for HubClient {
    async fn current_location(&self, entity_id: &str) -> Result<Coordinate> {
        const OP: &str = "location";
        let url = format!("{}/api/states/{entity_id}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport(OP, e))?;
        let resp = check_status(OP, resp).await?;
        let state: StateResponse = resp
            .json()
            .await
            .map_err(|e| SondeError::upstream(OP, format!("decoding state JSON: {e}")))?;

        match (state.attributes.latitude, state.attributes.longitude) {
            (Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon)),
            _ => Err(SondeError::upstream(
                OP,
                format!("{entity_id} has no latitude/longitude attributes"),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for HubClient {
    async fn send_alert(&self, title: &str, message: &str, url: Option<&str>) -> Result<()> {
        match &self.notify_target {
            NotifyTarget::Script(name) => {
                let message = match url {
                    Some(u) => format!("{message}\n{u}"),
                    None => message.to_string(),
                };
                let body = ScriptNotifyPayload {
                    person: &self.person,
                    title,
                    message,
                };
                self.post_json("notify", &format!("/api/services/script/{name}"), &body)
                    .await
            }
            NotifyTarget::Service(service) => {
                let body = ServiceNotifyPayload {
                    title,
                    message,
                    data: url.map(|url| NotifyData { url }),
                };
                self.post_json("notify", &format!("/api/services/notify/{service}"), &body)
                    .await
            }
        }
    }

    async fn fire_event(&self, payload: &AlertEventPayload) -> Result<()> {
        self.post_json("event", &format!("/api/events/{}", self.event_type), payload)
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
