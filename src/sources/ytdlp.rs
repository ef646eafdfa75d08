use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{process::Command, sync::Semaphore};
use tracing::{debug, error, info};

use super::Extractor;
use crate::formats::RawVideoInfo;

/// Options passed through to yt-dlp unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Format selection hint (`-f`)
    pub format: String,
    /// Outbound proxy for yt-dlp's own requests
    pub proxy: Option<String>,
    pub check_certificates: bool,
    pub socket_timeout: Option<Duration>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            format: "bestvideo+bestaudio/best".to_string(),
            proxy: None,
            check_certificates: false,
            socket_timeout: None,
        }
    }
}

/// Extractor backed by the yt-dlp binary, run as a child process.
pub struct YtDlpExtractor {
    binary: PathBuf,
    options: ExtractOptions,
    // caps concurrent yt-dlp processes
    limiter: Semaphore,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<PathBuf>, options: ExtractOptions, max_concurrent: usize) -> Self {
        Self {
            binary: binary.into(),
            options,
            limiter: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Checks that the yt-dlp binary runs and returns its version.
    pub async fn verify(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp --version exited with {}", output.status);
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("✅ yt-dlp version: {}", version);
        Ok(version)
    }

    fn args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
            "--quiet",
            "-f",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(self.options.format.clone());

        if !self.options.check_certificates {
            args.push("--no-check-certificates".to_string());
        }
        if let Some(proxy) = &self.options.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        if let Some(timeout) = self.options.socket_timeout {
            args.push("--socket-timeout".to_string());
            args.push(timeout.as_secs().max(1).to_string());
        }

        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(&self, url: &str) -> Result<RawVideoInfo> {
        let _permit = self.limiter.acquire().await?;
        debug!("📊 Extracting stream info for: {}", url);

        // dropping the future (caller timeout) kills yt-dlp
        let output = Command::new(&self.binary)
            .args(self.args(url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context("failed to run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("yt-dlp extraction failed for {}: {}", url, stderr.trim());
            anyhow::bail!("yt-dlp error: {}", stderr.trim());
        }

        let info: RawVideoInfo =
            serde_json::from_slice(&output.stdout).context("yt-dlp returned invalid JSON")?;

        Ok(info)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
