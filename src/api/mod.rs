pub mod jellyfin;
pub mod organizr;
pub mod plex;
pub mod radarr;
pub mod sonarr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::config::{Config, ServiceInstance};
use crate::error::PollError;
use crate::render::{Indicator, StatusLine};
use crate::AppState;

/// Normalized result of one poll.
///
/// `secondary` means transcodes for the session families and available
/// missing items for Radarr. Upstream values are reported verbatim, so
/// `secondary <= active` does not hold in general.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServiceStatus {
    pub active: i64,
    pub secondary: i64,
    pub bandwidth_mbps: f64,
}

/// One service family: knows its wire schema and how to phrase the result.
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    fn family(&self) -> &'static str;

    async fn poll(&self, client: &Client, instance: &ServiceInstance) -> Result<ServiceStatus, PollError>;

    fn render(&self, status: &ServiceStatus) -> (Indicator, String);
}

/// Issues a GET with the given headers and returns the body of a 2xx response.
pub(crate) async fn fetch(client: &Client, url: &str, headers: &[(&str, &str)]) -> Result<String, PollError> {
    let mut request = client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let resp = request.send().await?;
    if !resp.status().is_success() {
        return Err(PollError::Status(resp.status()));
    }
    Ok(resp.text().await?)
}

/// Reads an explicit `null` the same as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Polls every pollable instance of one family in order. Instances that fail
/// produce no line at all.
pub async fn poll_family(
    client: &Client,
    adapter: &dyn ServiceAdapter,
    instances: &[ServiceInstance],
) -> Vec<StatusLine> {
    let mut lines = Vec::new();
    for instance in instances.iter().filter(|i| i.is_pollable()) {
        match adapter.poll(client, instance).await {
            Ok(status) => {
                let (indicator, message) = adapter.render(&status);
                lines.push(StatusLine::new(instance.label(adapter.family()), indicator, message));
            }
            Err(e) => {
                tracing::debug!(
                    family = adapter.family(),
                    instance = %instance.name,
                    url = %instance.url,
                    "skipping instance: {}",
                    e
                );
            }
        }
    }
    lines
}

/// The five families in banner order, each paired with its instances.
pub fn families(config: &Config) -> Vec<(Box<dyn ServiceAdapter>, &[ServiceInstance])> {
    vec![
        (Box::new(plex::Plex) as Box<dyn ServiceAdapter>, config.plex.as_slice()),
        (Box::new(jellyfin::Jellyfin) as Box<dyn ServiceAdapter>, config.jellyfin.as_slice()),
        (Box::new(sonarr::Sonarr) as Box<dyn ServiceAdapter>, config.sonarr.as_slice()),
        (Box::new(radarr::Radarr) as Box<dyn ServiceAdapter>, config.radarr.as_slice()),
        (Box::new(organizr::Organizr) as Box<dyn ServiceAdapter>, config.organizr.as_slice()),
    ]
}

pub async fn media_lines(state: &AppState) -> Vec<StatusLine> {
    let mut lines = Vec::new();
    for (adapter, instances) in families(&state.config) {
        lines.extend(poll_family(&state.client, adapter.as_ref(), instances).await);
    }
    lines
}

/// Render policy shared by the session families.
pub(crate) fn render_sessions(status: &ServiceStatus) -> (Indicator, String) {
    if status.active == 0 {
        (Indicator::Ok, "No active streams".to_string())
    } else if status.secondary == 0 {
        (
            Indicator::Caution,
            format!("{} streams ({:.2} Mbps)", status.active, status.bandwidth_mbps),
        )
    } else {
        (
            Indicator::Alert,
            format!(
                "{} streams, {} transcodes ({:.2} Mbps)",
                status.active, status.secondary, status.bandwidth_mbps
            ),
        )
    }
}

/// "No {zero}" when empty, otherwise "{n} {noun}" with an "s" unless n is 1.
pub(crate) fn render_count(count: i64, zero: &str, noun: &str) -> (Indicator, String) {
    if count == 0 {
        (Indicator::Ok, zero.to_string())
    } else {
        (Indicator::Caution, pluralize(count, noun))
    }
}

pub(crate) fn pluralize(count: i64, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{} {}{}", count, noun, suffix)
}
