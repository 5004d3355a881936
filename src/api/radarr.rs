use async_trait::async_trait;
use reqwest::Client;

use crate::api::sonarr::fetch_missing;
use crate::api::{render_count, ServiceAdapter, ServiceStatus};
use crate::config::ServiceInstance;
use crate::error::PollError;
use crate::render::Indicator;

/// Same endpoint as Sonarr, but only records flagged `isAvailable: true`
/// are reported. Kept as a separate adapter so the two counting rules stay
/// visible.
pub struct Radarr;

fn count_available(records: &[serde_json::Value]) -> i64 {
    records
        .iter()
        .filter(|r| r.get("isAvailable").and_then(serde_json::Value::as_bool) == Some(true))
        .count() as i64
}

#[async_trait]
impl ServiceAdapter for Radarr {
    fn family(&self) -> &'static str {
        "Radarr"
    }

    async fn poll(&self, client: &Client, instance: &ServiceInstance) -> Result<ServiceStatus, PollError> {
        let wanted = fetch_missing(client, instance).await?;
        Ok(ServiceStatus {
            active: wanted.records.len() as i64,
            secondary: count_available(&wanted.records),
            bandwidth_mbps: 0.0,
        })
    }

    fn render(&self, status: &ServiceStatus) -> (Indicator, String) {
        render_count(status.secondary, "No missing movies", "missing movie")
    }
}
