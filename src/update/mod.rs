//! Self-update: find the latest release, download the matching binary,
//! verify it against the release checksums and swap it in with a backup.

pub mod checksum;
pub mod installer;
pub mod release;

use std::cmp::Ordering;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Result, UpdateError};
use crate::AppState;
use installer::{InstallOutcome, Installer};
use release::Release;

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { version: String },
    Declined,
    Updated { version: String },
    /// Replacement scheduled for after exit.
    Pending { version: String },
}

pub struct UpdateManager<'a> {
    client: &'a Client,
    api_base: String,
    repo: String,
    current_version: String,
    target: PathBuf,
    os: String,
    arch: String,
    installer: Box<dyn Installer>,
}

impl<'a> UpdateManager<'a> {
    /// Manager for the running executable on the running platform.
    pub fn new(state: &'a AppState) -> Result<Self> {
        Ok(Self {
            client: &state.client,
            api_base: state.config.update.api_base.clone(),
            repo: state.config.update.repo.clone(),
            current_version: CURRENT_VERSION.to_string(),
            target: std::env::current_exe()?,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            installer: installer::installer_for_platform(),
        })
    }
}

#[cfg(test)]
impl UpdateManager<'_> {
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    pub fn with_platform(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.os = os.into();
        self.arch = arch.into();
        self
    }

    pub fn with_installer(mut self, installer: Box<dyn Installer>) -> Self {
        self.installer = installer;
        self
    }
}

impl UpdateManager<'_> {
    /// Runs the whole pipeline. `force` skips both the up-to-date check and
    /// the confirmation read from `input`.
    pub async fn run<R: BufRead>(&self, force: bool, input: &mut R) -> Result<UpdateOutcome> {
        println!("Checking for updates...");
        let release = release::fetch_latest(self.client, &self.api_base, &self.repo).await?;
        let latest = release.version().to_string();
        tracing::debug!(current = %self.current_version, latest = %latest, "fetched latest release");

        if !force && release::compare_versions(&self.current_version, &latest) != Ordering::Less {
            return Ok(UpdateOutcome::UpToDate {
                version: self.current_version.clone(),
            });
        }

        if !force && !confirm(input, &self.current_version, &latest)? {
            tracing::debug!("update declined");
            return Ok(UpdateOutcome::Declined);
        }
        tracing::debug!(force, "update confirmed");

        let asset_name = release::asset_name(&self.os, &self.arch).ok_or_else(|| {
            UpdateError::UnsupportedPlatform {
                os: self.os.clone(),
                arch: self.arch.clone(),
            }
        })?;
        let asset = find_asset(&release, &asset_name)?;

        println!("Downloading {}...", asset_name);
        let (staged, digest) = self.download(&asset.browser_download_url).await?;
        tracing::debug!(asset = %asset_name, sha256 = %digest, "download complete");

        println!("Verifying checksum...");
        let manifest = find_asset(&release, checksum::MANIFEST_ASSET)?;
        let manifest = self.fetch_text(&manifest.browser_download_url).await?;
        let table = checksum::parse_manifest(&manifest);
        checksum::verify(&table, &asset_name, &digest)?;
        tracing::debug!(asset = %asset_name, "checksum verified");

        println!("Installing to {}...", self.target.display());
        let outcome = installer::apply(self.installer.as_ref(), staged, &self.target)?;
        tracing::debug!(path = %self.target.display(), ?outcome, "install finished");
        match outcome {
            InstallOutcome::Replaced => Ok(UpdateOutcome::Updated { version: latest }),
            InstallOutcome::Pending => Ok(UpdateOutcome::Pending { version: latest }),
        }
    }

    /// Streams the asset into a temp file beside the target while hashing it.
    async fn download(&self, url: &str) -> Result<(NamedTempFile, String)> {
        let mut resp = self.client.get(url).timeout(DOWNLOAD_TIMEOUT).send().await?;
        if !resp.status().is_success() {
            return Err(UpdateError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }

        let mut staged = tempfile::Builder::new()
            .prefix(".motd-update-")
            .tempfile_in(self.target_dir())?;
        let mut hasher = Sha256::new();
        while let Some(chunk) = resp.chunk().await? {
            hasher.update(&chunk);
            staged.write_all(&chunk)?;
        }
        staged.flush()?;

        Ok((staged, hex::encode(hasher.finalize())))
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(UpdateError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        Ok(resp.text().await?)
    }

    fn target_dir(&self) -> &Path {
        self.target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

fn find_asset<'r>(release: &'r Release, name: &str) -> Result<&'r release::ReleaseAsset> {
    release.asset(name).ok_or_else(|| UpdateError::AssetMissing {
        version: release.tag_name.clone(),
        asset: name.to_string(),
    })
}

fn confirm<R: BufRead>(input: &mut R, current: &str, latest: &str) -> Result<bool> {
    println!("Current version: v{}", current);
    println!("Latest version:  v{}", latest);
    print!("Update now? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
