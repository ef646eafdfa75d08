pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;

use crate::formats::RawVideoInfo;

pub use ytdlp::{ExtractOptions, YtDlpExtractor};

/// Backend that turns a watch URL into raw video info.
///
/// Calls are slow (several seconds) and may fail for reasons outside our
/// control: network errors, bot checks, removed videos. Callers bound them
/// with a timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<RawVideoInfo>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
