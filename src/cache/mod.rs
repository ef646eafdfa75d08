//! # Cache Module
//!
//! In-memory cache of normalized stream info, keyed by video id.
//!
//! Extraction through yt-dlp takes several seconds per video, so every
//! successful result is kept for a while and served to later requests
//! directly. Failures are never cached.
//!
//! ## Expiry
//!
//! Each entry receives its TTL once, when it is stored, from a [`TtlPolicy`]:
//!
//! - **Rich results** (at least `rich_threshold` formats, 12 by default) are
//!   kept for `long_ttl` (14200 s by default)
//! - **Everything else** is kept for `default_ttl` (600 s by default)
//!
//! A result listing many formats is taken as a complete extraction that is
//! costly to redo and unlikely to change soon. This is a heuristic policy, not
//! a property of the data.
//!
//! An entry is expired once `now - stored_at >= ttl`. Expired entries are
//! removed by a sweep at the start of every lookup and listing, and optionally
//! by a background task (see [`spawn_sweeper`]).
//!
//! ## Configuration
//!
//! ```env
//! CACHE_DEFAULT_TTL_SECS=600
//! CACHE_LONG_TTL_SECS=14200
//! CACHE_RICH_THRESHOLD=12
//! CACHE_SWEEP_INTERVAL_SECS=0   # 0 disables the background sweeper
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let cache = StreamCache::new(TtlPolicy::default());
//! let ttl = cache.put("abc".to_string(), Arc::new(info), 15);
//! assert_eq!(ttl, Duration::from_secs(14_200));
//! assert!(cache.get("abc").is_some());
//! ```

pub mod ttl_cache;

use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::interval};
use tracing::info;

use crate::formats::StreamInfo;

pub use ttl_cache::{EntryStats, TtlCache};

/// Cache shared by the retrieval coordinator and the HTTP layer.
pub type StreamCache = TtlCache<String, Arc<StreamInfo>>;

/// How long an entry lives, chosen from how many formats it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub default_ttl: Duration,
    pub long_ttl: Duration,
    pub rich_threshold: usize,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),
            long_ttl: Duration::from_secs(14_200),
            rich_threshold: 12,
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, richness: usize) -> Duration {
        if richness >= self.rich_threshold {
            self.long_ttl
        } else {
            self.default_ttl
        }
    }
}

impl StreamCache {
    /// Sweep that reports what it removed at info level.
    pub fn cleanup_old_entries(&self) -> usize {
        let removed = self.sweep();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
        removed
    }
}

/// Periodically sweeps `cache` independently of request traffic.
pub fn spawn_sweeper(cache: StreamCache, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cleanup_interval = interval(every);

        loop {
            cleanup_interval.tick().await;
            cache.cleanup_old_entries();
        }
    })
}
