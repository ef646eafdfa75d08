use anyhow::{Context, Result};
use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::cache::TtlPolicy;
use crate::retrieval::RetrievalSettings;
use crate::sources::ExtractOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Servidor
    pub host: String,
    pub port: u16,

    // yt-dlp
    pub ytdlp_path: PathBuf,
    pub ytdlp_proxy: Option<String>,
    pub ytdlp_format: String,
    pub watch_url_prefix: String,
    pub extract_timeout_secs: u64,
    pub max_concurrent_extractions: usize,

    // Cache
    pub cache_default_ttl_secs: u64,
    pub cache_long_ttl_secs: u64,
    pub cache_rich_threshold: usize,
    pub cache_sweep_interval_secs: u64,

    // Format selection
    pub trusted_stream_domains: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to [`Config::default`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            // Servidor
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or(&var, "PORT", defaults.port)?,

            // yt-dlp
            ytdlp_path: var("YTDLP_PATH").map(PathBuf::from).unwrap_or(defaults.ytdlp_path),
            ytdlp_proxy: var("YTDLP_PROXY"),
            ytdlp_format: var("YTDLP_FORMAT").unwrap_or(defaults.ytdlp_format),
            watch_url_prefix: var("WATCH_URL_PREFIX").unwrap_or(defaults.watch_url_prefix),
            extract_timeout_secs: parse_or(&var, "EXTRACT_TIMEOUT_SECS", defaults.extract_timeout_secs)?,
            max_concurrent_extractions: parse_or(
                &var,
                "MAX_CONCURRENT_EXTRACTIONS",
                defaults.max_concurrent_extractions,
            )?,

            // Cache
            cache_default_ttl_secs: parse_or(&var, "CACHE_DEFAULT_TTL_SECS", defaults.cache_default_ttl_secs)?,
            cache_long_ttl_secs: parse_or(&var, "CACHE_LONG_TTL_SECS", defaults.cache_long_ttl_secs)?,
            cache_rich_threshold: parse_or(&var, "CACHE_RICH_THRESHOLD", defaults.cache_rich_threshold)?,
            cache_sweep_interval_secs: parse_or(
                &var,
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.cache_sweep_interval_secs,
            )?,

            trusted_stream_domains: var("TRUSTED_STREAM_DOMAINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - TTLs and the extraction timeout must be non-zero
    /// - The long TTL must not be shorter than the default one
    /// - At least one concurrent extraction must be allowed
    /// - The watch URL prefix must be an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.cache_default_ttl_secs == 0 || self.cache_long_ttl_secs == 0 {
            anyhow::bail!("Cache TTLs must be greater than 0");
        }

        if self.cache_long_ttl_secs < self.cache_default_ttl_secs {
            anyhow::bail!(
                "Long cache TTL ({}s) cannot be shorter than the default TTL ({}s)",
                self.cache_long_ttl_secs,
                self.cache_default_ttl_secs
            );
        }

        if self.extract_timeout_secs == 0 {
            anyhow::bail!("Extraction timeout must be greater than 0");
        }

        if self.max_concurrent_extractions == 0 {
            anyhow::bail!("Max concurrent extractions must be greater than 0");
        }

        let prefix = url::Url::parse(&self.watch_url_prefix)
            .with_context(|| format!("Invalid WATCH_URL_PREFIX: {}", self.watch_url_prefix))?;
        if !matches!(prefix.scheme(), "http" | "https") {
            anyhow::bail!("WATCH_URL_PREFIX must be an http(s) URL, got: {}", self.watch_url_prefix);
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            default_ttl: Duration::from_secs(self.cache_default_ttl_secs),
            long_ttl: Duration::from_secs(self.cache_long_ttl_secs),
            rich_threshold: self.cache_rich_threshold,
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            format: self.ytdlp_format.clone(),
            proxy: self.ytdlp_proxy.clone(),
            check_certificates: false,
            socket_timeout: Some(Duration::from_secs(self.extract_timeout_secs)),
        }
    }

    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            watch_url_prefix: self.watch_url_prefix.clone(),
            extract_timeout: Duration::from_secs(self.extract_timeout_secs),
        }
    }

    /// Background sweep period; `None` when disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep_interval_secs > 0).then(|| Duration::from_secs(self.cache_sweep_interval_secs))
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The proxy is reported as set/unset only, since its URL may embed
    /// credentials.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Server: {}:{}\n  \
            yt-dlp: {} (format {}, proxy {}, timeout {}s, {} concurrent)\n  \
            Cache: {}s default, {}s when >= {} formats, sweep every {}\n  \
            Trusted domains: {}",
            self.host,
            self.port,
            self.ytdlp_path.display(),
            self.ytdlp_format,
            if self.ytdlp_proxy.is_some() { "set" } else { "unset" },
            self.extract_timeout_secs,
            self.max_concurrent_extractions,
            self.cache_default_ttl_secs,
            self.cache_long_ttl_secs,
            self.cache_rich_threshold,
            self.sweep_interval()
                .map_or("request only".to_string(), |d| humantime::format_duration(d).to_string()),
            if self.trusted_stream_domains.is_empty() {
                "any".to_string()
            } else {
                self.trusted_stream_domains.join(", ")
            }
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,

            ytdlp_path: "yt-dlp".into(),
            ytdlp_proxy: None,
            ytdlp_format: "bestvideo+bestaudio/best".to_string(),
            watch_url_prefix: "https://www.youtube.com/watch?v=".to_string(),
            extract_timeout_secs: 60,
            max_concurrent_extractions: num_cpus::get(),

            cache_default_ttl_secs: 600,    // 10 minutos
            cache_long_ttl_secs: 14_200,    // ~4 horas
            cache_rich_threshold: 12,
            cache_sweep_interval_secs: 0,

            trusted_stream_domains: Vec::new(),
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, value)),
        None => Ok(default),
    }
}
