//! Cache-or-extract entry point shared by every endpoint.
//!
//! Per request: check the cache; on a hit return the stored [`StreamInfo`];
//! on a miss run the extractor once (bounded by a timeout), normalize the
//! result, store it with its adaptive TTL and return it. Errors are returned
//! to the caller and never cached.
//!
//! Concurrent misses for the same video id share one in-flight extraction
//! instead of each launching yt-dlp.

use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{sync::Arc, time::Duration};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::StreamCache;
use crate::error::FetchError;
use crate::formats::StreamInfo;
use crate::sources::Extractor;

type FetchResult = Result<Arc<StreamInfo>, FetchError>;
type PendingFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalSettings {
    /// Canonical URL = prefix + video id
    pub watch_url_prefix: String,
    pub extract_timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            watch_url_prefix: "https://www.youtube.com/watch?v=".to_string(),
            extract_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct RetrievalCoordinator {
    cache: StreamCache,
    extractor: Arc<dyn Extractor>,
    in_flight: Arc<DashMap<String, PendingFetch>>,
    settings: RetrievalSettings,
}

impl RetrievalCoordinator {
    pub fn new(cache: StreamCache, extractor: Arc<dyn Extractor>, settings: RetrievalSettings) -> Self {
        Self {
            cache,
            extractor,
            in_flight: Arc::new(DashMap::new()),
            settings,
        }
    }

    pub fn cache(&self) -> &StreamCache {
        &self.cache
    }

    pub fn canonical_url(&self, video_id: &str) -> String {
        format!("{}{}", self.settings.watch_url_prefix, video_id)
    }

    /// Returns stream info for `video_id`, from cache when possible.
    pub async fn fetch(&self, video_id: &str) -> FetchResult {
        if video_id.trim().is_empty() {
            return Err(FetchError::InvalidVideoId);
        }

        self.cache.sweep();
        if let Some(info) = self.cache.get(video_id) {
            debug!("✅ Cache hit for {}", video_id);
            return Ok(info);
        }

        let pending = match self.in_flight.entry(video_id.to_string()) {
            Entry::Occupied(entry) => {
                debug!("Joining in-flight extraction for {}", video_id);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                // the previous extraction may have finished since the lookup above
                if let Some(info) = self.cache.get(video_id) {
                    return Ok(info);
                }
                debug!("❌ Cache miss for {}", video_id);
                let pending = self.extract_and_store(video_id.to_string()).shared();
                entry.insert(pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Runs the extraction on its own task so it completes, releases its
    /// extractor slot and leaves `in_flight` even if every waiter goes away.
    fn extract_and_store(&self, video_id: String) -> BoxFuture<'static, FetchResult> {
        let this = self.clone();
        let in_flight = self.in_flight.clone();
        let key = video_id.clone();
        let task = tokio::spawn(async move {
            let result = this.extract(&video_id).await;
            this.in_flight.remove(&video_id);
            result
        });

        task.map(move |joined| {
            joined.unwrap_or_else(|e| {
                // a panicked task never reached its own cleanup
                in_flight.remove(&key);
                error!("Extraction task for {} failed: {}", key, e);
                Err(FetchError::Extraction(format!("extraction task failed: {e}")))
            })
        })
        .boxed()
    }

    async fn extract(&self, video_id: &str) -> FetchResult {
        let url = self.canonical_url(video_id);
        let limit = self.settings.extract_timeout;
        let started = Instant::now();

        let raw = match timeout(limit, self.extractor.extract(&url)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("Error fetching {} via {}: {:#}", video_id, self.extractor.name(), e);
                return Err(FetchError::Extraction(format!("{e:#}")));
            }
            Err(_) => {
                warn!("⏰ Extraction of {} timed out after {:?}", video_id, limit);
                return Err(FetchError::Timeout(limit));
            }
        };

        let info = Arc::new(StreamInfo::from_raw(video_id, raw));
        let richness = info.richness();
        let ttl = self.cache.put(video_id.to_string(), info.clone(), richness);

        info!(
            "💾 Cached {} for {} ({} formats, extracted in {:?})",
            video_id,
            humantime::format_duration(ttl),
            richness,
            started.elapsed()
        );

        Ok(info)
    }
}
