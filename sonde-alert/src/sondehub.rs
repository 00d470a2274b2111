//! SondeHub client: landed sondes near a point.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use sonde_core::config::MonitorConfig;
use sonde_core::types::{Coordinate, Result, SondeError, SondeRecord};

use crate::http::{build_client, check_status, transport};
use crate::source::{EventSource, LandingBatch};

const OP: &str = "sondehub";

#[derive(Debug, Serialize)]
struct LandingQuery {
    frame_types: &'static str,
    lat: f64,
    lon: f64,
    /// Search radius in meters.
    distance: u64,
}

#[derive(Clone)]
pub struct SondehubClient {
    base_url: String,
    client: reqwest::Client,
}

impl SondehubClient {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        Ok(SondehubClient {
            base_url: config.sondehub_url.trim_end_matches('/').to_string(),
            client: build_client(config.request_timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl EventSource for SondehubClient {
    async fn nearby_landings(&self, center: Coordinate, radius_km: f64) -> Result<LandingBatch> {
        let query = LandingQuery {
            frame_types: "landing",
            lat: center.latitude,
            lon: center.longitude,
            distance: (radius_km * 1000.0).round() as u64,
        };
        let url = format!("{}/sondes", self.base_url);
        debug!(%url, ?query, "querying landings");

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport(OP, e))?;
        let resp = check_status(OP, resp).await?;
        let body = resp.bytes().await.map_err(|e| transport(OP, e))?;
        decode_landings(&body)
    }
}

/// Decode a `/sondes` body. Only a body that isn't a JSON object fails as a
/// whole; each entry is decoded on its own and bad ones are rejected.
fn decode_landings(body: &[u8]) -> Result<LandingBatch> {
    let records: HashMap<String, Value> = serde_json::from_slice(body)
        .map_err(|e| SondeError::upstream(OP, format!("decoding SondeHub JSON: {e}")))?;

    let mut batch = LandingBatch::default();
    for (id, value) in records {
        match SondeRecord::from_value(&id, value) {
            Ok(event) => {
                batch.landings.insert(id, event);
            }
            Err(e) => {
                warn!(sonde_id = %id, error = %e, "rejecting SondeHub record");
                batch.rejected.push(e);
            }
        }
    }
    Ok(batch)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use crate::testutil::{spawn_upstream, test_config};

    async fn client_for(router: Router) -> SondehubClient {
        let base = spawn_upstream(router).await;
        SondehubClient::new(&test_config("http://unused", &base, std::path::Path::new("n.json")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_and_decode() {
        let queries: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
        let seen = queries.clone();
        let router = Router::new().route(
            "/sondes",
            get(move |Query(q): Query<HashMap<String, String>>| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(q);
                    Json(json!({
                        "X1": {
                            "lat": 40.05, "lon": -74.05, "alt": 1200.0,
                            "datetime": "2024-05-01T12:00:00.000000Z",
                            "serial": "X1", "type": "RS41-SGP"
                        },
                        "Y2": {"lat": 40.1, "lon": -74.1, "alt": 90.0, "datetime": "garbage"}
                    }))
                }
            }),
        );
        let client = client_for(router).await;

        let batch = client
            .nearby_landings(Coordinate::new(40.0, -74.0), 25.0)
            .await
            .unwrap();
        let landings = &batch.landings;

        assert!(batch.rejected.is_empty());
        assert_eq!(landings.len(), 2);
        let x1 = &landings["X1"];
        assert_eq!(x1.id, "X1");
        assert_eq!(x1.altitude, 1200.0);
        assert_eq!(landings["Y2"].observed_at.as_deref(), Some("garbage"));

        let q = &queries.lock().unwrap()[0];
        assert_eq!(q["frame_types"], "landing");
        assert_eq!(q["distance"], "25000");
        assert_eq!(q["lat"].parse::<f64>().unwrap(), 40.0);
        assert_eq!(q["lon"].parse::<f64>().unwrap(), -74.0);
    }

    #[tokio::test]
    async fn test_empty_result() {
        let router = Router::new().route("/sondes", get(|| async { Json(json!({})) }));
        let client = client_for(router).await;
        let batch = client
            .nearby_landings(Coordinate::new(40.0, -74.0), 5.0)
            .await
            .unwrap();
        assert!(batch.landings.is_empty());
        assert!(batch.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_bad_record_does_not_drop_good_ones() {
        let router = Router::new().route(
            "/sondes",
            get(|| async {
                Json(json!({
                    "GOOD": {
                        "lat": 40.05, "lon": -74.05, "alt": 1200.0,
                        "datetime": "2024-05-01T12:00:00Z"
                    },
                    "NULLALT": {
                        "lat": 40.02, "lon": -74.02, "alt": null,
                        "datetime": "2024-05-01T12:00:00Z"
                    },
                    "NOLAT": {"lon": -74.03, "alt": 50.0},
                    "TEXT": "not a record"
                }))
            }),
        );
        let client = client_for(router).await;

        let batch = client
            .nearby_landings(Coordinate::new(40.0, -74.0), 25.0)
            .await
            .unwrap();

        let ids: Vec<&str> = batch.landings.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["GOOD", "NULLALT"]);
        assert_eq!(batch.landings["GOOD"].altitude, 1200.0);
        assert_eq!(batch.landings["NULLALT"].altitude, 0.0);

        let mut rejected: Vec<&str> = batch
            .rejected
            .iter()
            .map(|e| match e {
                SondeError::MalformedData { id, .. } => id.as_str(),
                other => panic!("unexpected error: {other}"),
            })
            .collect();
        rejected.sort();
        assert_eq!(rejected, vec!["NOLAT", "TEXT"]);
    }

    #[tokio::test]
    async fn test_error_status() {
        let router = Router::new().route(
            "/sondes",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
        );
        let client = client_for(router).await;
        let err = client
            .nearby_landings(Coordinate::new(40.0, -74.0), 5.0)
            .await
            .unwrap_err();
        assert!(matches!(err, SondeError::Upstream { op: "sondehub", .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let router = Router::new().route(
            "/sondes",
            get(|| async { Json(json!([1, 2])) }),
        );
        let client = client_for(router).await;
        let err = client
            .nearby_landings(Coordinate::new(40.0, -74.0), 5.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("decoding SondeHub JSON"));
    }
}
