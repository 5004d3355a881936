use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::api::{fetch, null_as_default, render_count, ServiceAdapter, ServiceStatus};
use crate::config::ServiceInstance;
use crate::error::PollError;
use crate::render::Indicator;

pub struct Organizr;

#[derive(Debug, Default, Deserialize)]
struct RequestsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    data: RequestsData,
}

#[derive(Debug, Default, Deserialize)]
struct RequestsData {
    #[serde(default, deserialize_with = "null_as_default")]
    total: i64,
}

#[async_trait]
impl ServiceAdapter for Organizr {
    fn family(&self) -> &'static str {
        "Organizr"
    }

    async fn poll(&self, client: &Client, instance: &ServiceInstance) -> Result<ServiceStatus, PollError> {
        let endpoint = format!("{}/api/v2/requests", instance.url);
        let auth = format!("Bearer {}", instance.credential);
        let body = fetch(client, &endpoint, &[("Authorization", auth.as_str())]).await?;
        let parsed: RequestsResponse = serde_json::from_str(&body)?;
        Ok(ServiceStatus {
            active: parsed.data.total,
            ..ServiceStatus::default()
        })
    }

    fn render(&self, status: &ServiceStatus) -> (Indicator, String) {
        render_count(status.active, "No requests", "request")
    }
}
