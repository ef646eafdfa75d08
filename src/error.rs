use std::time::Duration;
use thiserror::Error;

/// Failure to obtain stream info for a video id.
///
/// Cloneable because a single in-flight extraction hands the same result to
/// every request that joined it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("video id must not be empty")]
    InvalidVideoId,

    #[error("failed to fetch stream info: {0}")]
    Extraction(String),

    #[error("stream info extraction timed out after {}", pretty(.0))]
    Timeout(Duration),
}

/// A successful fetch had nothing matching the requested view.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no m3u8 or DASH stream manifest was found")]
    NoManifest,

    #[error("no playable video stream was found")]
    NoPlayableStream,
}

fn pretty(duration: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*duration)
}
