use std::cmp::Ordering;

use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, UpdateError};

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl Release {
    /// Tag with one leading `v` removed.
    pub fn version(&self) -> &str {
        self.tag_name.strip_prefix('v').unwrap_or(&self.tag_name)
    }

    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

pub async fn fetch_latest(client: &Client, api_base: &str, repo: &str) -> Result<Release> {
    let url = format!("{}/repos/{}/releases/latest", api_base, repo);
    let resp = client
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await?;

    match resp.status() {
        s if s.is_success() => Ok(resp.json::<Release>().await?),
        reqwest::StatusCode::NOT_FOUND => Err(UpdateError::NoRelease(repo.to_string())),
        status => Err(UpdateError::Status { url, status }),
    }
}

/// Release asset built for the given `std::env::consts` OS and architecture.
pub fn asset_name(os: &str, arch: &str) -> Option<String> {
    let os = match os {
        "linux" => "linux",
        "macos" => "darwin",
        "windows" => "windows",
        _ => return None,
    };
    let arch = match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        _ => return None,
    };
    let ext = if os == "windows" { ".exe" } else { "" };
    Some(format!("motd-{}-{}{}", os, arch, ext))
}

/// Numeric, component-wise comparison of dotted versions. Missing trailing
/// components count as 0, and so does any component that is not a number.
pub fn compare_versions(current: &str, other: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        let v = v.trim();
        v.strip_prefix('v')
            .unwrap_or(v)
            .split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(current), parse(other));

    (0..a.len().max(b.len()))
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
