use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::api::{fetch, render_sessions, ServiceAdapter, ServiceStatus};
use crate::config::ServiceInstance;
use crate::error::PollError;
use crate::render::Indicator;

const TRANSCODE_METHOD: &str = "Transcode";

/// Jellyfin speaks the Emby sessions API.
pub struct Jellyfin;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JellyfinSession {
    #[serde(default)]
    now_playing_item: Option<serde_json::Value>,
    #[serde(default)]
    play_state: Option<PlayState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlayState {
    #[serde(default)]
    play_method: Option<String>,
}

#[async_trait]
impl ServiceAdapter for Jellyfin {
    fn family(&self) -> &'static str {
        "Jellyfin"
    }

    async fn poll(&self, client: &Client, instance: &ServiceInstance) -> Result<ServiceStatus, PollError> {
        let endpoint = format!("{}/Sessions", instance.url);
        let body = fetch(client, &endpoint, &[("X-Emby-Token", instance.credential.as_str())]).await?;
        let sessions: Vec<JellyfinSession> = serde_json::from_str(&body)?;
        Ok(summarize(&sessions))
    }

    fn render(&self, status: &ServiceStatus) -> (Indicator, String) {
        render_sessions(status)
    }
}

/// A session is active when it has a now-playing item. The API exposes no
/// bandwidth figure, so it is always reported as zero.
fn summarize(sessions: &[JellyfinSession]) -> ServiceStatus {
    let active: Vec<_> = sessions
        .iter()
        .filter(|s| s.now_playing_item.is_some())
        .collect();

    let transcodes = active
        .iter()
        .filter(|s| {
            s.play_state
                .as_ref()
                .and_then(|p| p.play_method.as_deref())
                == Some(TRANSCODE_METHOD)
        })
        .count();

    ServiceStatus {
        active: active.len() as i64,
        secondary: transcodes as i64,
        bandwidth_mbps: 0.0,
    }
}
