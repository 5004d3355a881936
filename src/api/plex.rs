use async_trait::async_trait;
use reqwest::Client;

use crate::api::{fetch, render_sessions, ServiceAdapter, ServiceStatus};
use crate::config::ServiceInstance;
use crate::error::PollError;
use crate::render::Indicator;

const TRANSCODE_DECISION: &str = "transcode";

pub struct Plex;

#[async_trait]
impl ServiceAdapter for Plex {
    fn family(&self) -> &'static str {
        "Plex"
    }

    async fn poll(&self, client: &Client, instance: &ServiceInstance) -> Result<ServiceStatus, PollError> {
        let endpoint = format!(
            "{}/status/sessions?X-Plex-Token={}",
            instance.url,
            urlencoding::encode(&instance.credential)
        );
        let body = fetch(client, &endpoint, &[("Accept", "application/xml")]).await?;
        parse_sessions(&body)
    }

    fn render(&self, status: &ServiceStatus) -> (Indicator, String) {
        render_sessions(status)
    }
}

/// Reads a `/status/sessions` document.
///
/// The container's `size` attribute is the stream count. Each `<Video>` may
/// carry a `<TranscodeSession videoDecision="...">` and a
/// `<Session bandwidth="...">` (kbps).
fn parse_sessions(xml: &str) -> Result<ServiceStatus, PollError> {
    let container = open_tag(xml, "MediaContainer")
        .ok_or_else(|| PollError::Malformed("missing MediaContainer element".to_string()))?;

    let active = match attr(container, "size") {
        Some(size) => size
            .parse::<i64>()
            .map_err(|_| PollError::Malformed(format!("bad size attribute {:?}", size)))?,
        None => 0,
    };

    let mut transcodes = 0;
    let mut bandwidth_kbps = 0u64;
    for video in element_chunks(xml, "Video") {
        let decision = open_tag(video, "TranscodeSession").and_then(|t| attr(t, "videoDecision"));
        if decision == Some(TRANSCODE_DECISION) {
            transcodes += 1;
        }
        if let Some(kbps) = open_tag(video, "Session")
            .and_then(|t| attr(t, "bandwidth"))
            .and_then(|v| v.parse::<u64>().ok())
        {
            bandwidth_kbps += kbps;
        }
    }

    Ok(ServiceStatus {
        active,
        secondary: transcodes,
        bandwidth_mbps: bandwidth_kbps as f64 / 1000.0,
    })
}

/// Byte offsets of every `<name` that is a whole element name.
fn element_starts(xml: &str, name: &str) -> Vec<usize> {
    let needle = format!("<{}", name);
    xml.match_indices(&needle)
        .filter(|(pos, _)| {
            xml[pos + needle.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/')
        })
        .map(|(pos, _)| pos)
        .collect()
}

/// Attribute text of the first `<name ...>` opening tag.
fn open_tag<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let start = *element_starts(xml, name).first()? + name.len() + 1;
    let rest = &xml[start..];
    let end = rest.find('>')?;
    Some(rest[..end].trim_end_matches('/'))
}

/// Each `<name>` element up to its closing tag or the next sibling. A
/// self-closing element ends with its own tag.
fn element_chunks<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
    let starts = element_starts(xml, name);
    let close = format!("</{}>", name);
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let limit = starts.get(i + 1).copied().unwrap_or(xml.len());
            let tag_end = xml[start..limit].find('>').map(|p| start + p + 1);
            if let Some(tag_end) = tag_end.filter(|&e| xml[..e].ends_with("/>")) {
                return &xml[start..tag_end];
            }
            let end = xml[start..limit]
                .find(&close)
                .map(|p| start + p + close.len())
                .unwrap_or(limit);
            &xml[start..end]
        })
        .collect()
}

fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut offset = 0;
    while let Some(pos) = tag[offset..].find(name) {
        let at = offset + pos;
        offset = at + name.len();

        let preceded_by_space = tag[..at].chars().last().is_some_and(char::is_whitespace);
        if !preceded_by_space {
            continue;
        }
        let Some(value) = tag[offset..].trim_start().strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        let quote = value.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let value = &value[1..];
        return value.find(quote).map(|end| &value[..end]);
    }
    None
}
