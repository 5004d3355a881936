use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::api::{fetch, null_as_default, render_count, ServiceAdapter, ServiceStatus};
use crate::config::ServiceInstance;
use crate::error::PollError;
use crate::render::Indicator;

pub struct Sonarr;

#[derive(Debug, Deserialize)]
pub(crate) struct WantedMissing {
    #[serde(default, deserialize_with = "null_as_default")]
    pub records: Vec<serde_json::Value>,
}

/// GETs `/api/v3/wanted/missing`, shared with Radarr.
pub(crate) async fn fetch_missing(client: &Client, instance: &ServiceInstance) -> Result<WantedMissing, PollError> {
    let endpoint = format!(
        "{}/api/v3/wanted/missing?apikey={}",
        instance.url,
        urlencoding::encode(&instance.credential)
    );
    let body = fetch(client, &endpoint, &[]).await?;
    Ok(serde_json::from_str(&body)?)
}

/// Every returned record is a missing episode.
fn count_missing(records: &[serde_json::Value]) -> i64 {
    records.len() as i64
}

#[async_trait]
impl ServiceAdapter for Sonarr {
    fn family(&self) -> &'static str {
        "Sonarr"
    }

    async fn poll(&self, client: &Client, instance: &ServiceInstance) -> Result<ServiceStatus, PollError> {
        let wanted = fetch_missing(client, instance).await?;
        Ok(ServiceStatus {
            active: count_missing(&wanted.records),
            ..ServiceStatus::default()
        })
    }

    fn render(&self, status: &ServiceStatus) -> (Indicator, String) {
        render_count(status.active, "No missing episodes", "missing episode")
    }
}
