use serde::Serialize;
use tracing::debug;
use url::Url;

use super::FormatDescriptor;
use crate::error::SelectError;

const AUDIO_MISSING_NOTE: &str = "no combined audio+video stream available; this stream carries video only";

/// Result of [`FormatSelector::best_pick`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestPick {
    pub format: FormatDescriptor,
    /// Set when the pick came from the video-only fallback.
    pub audio_missing: bool,
}

impl BestPick {
    pub fn note(&self) -> Option<&'static str> {
        self.audio_missing.then_some(AUDIO_MISSING_NOTE)
    }
}

/// Derives the manifest-only and best-stream views from a cleaned format list.
///
/// Best-pick ordering is by video bitrate alone (unknown counts as 0). Ties go
/// to whichever descriptor came first in the input; no container is preferred.
#[derive(Debug, Clone, Default)]
pub struct FormatSelector {
    trusted_domains: Vec<String>,
}

impl FormatSelector {
    /// `trusted_domains` restricts combined streams to direct URLs on those
    /// hosts (or their subdomains). Empty means no restriction.
    pub fn new<I, S>(trusted_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let trusted_domains = trusted_domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Self { trusted_domains }
    }

    /// HLS/DASH entries only, in input order.
    pub fn manifest_view(formats: &[FormatDescriptor]) -> Result<Vec<FormatDescriptor>, SelectError> {
        let manifests: Vec<FormatDescriptor> = formats
            .iter()
            .filter(|f| f.is_manifest())
            .cloned()
            .collect();

        if manifests.is_empty() {
            return Err(SelectError::NoManifest);
        }
        Ok(manifests)
    }

    /// Single best playable stream.
    ///
    /// Combined audio+video streams win. Without any, the best video-only
    /// stream is returned flagged as `audio_missing`. Audio-only streams are
    /// never returned.
    pub fn best_pick(&self, formats: &[FormatDescriptor]) -> Result<BestPick, SelectError> {
        let combined = formats
            .iter()
            .filter(|f| f.has_audio() && f.has_video() && !f.is_manifest())
            .filter(|f| self.is_trusted(f));

        if let Some(best) = highest_bitrate(combined) {
            return Ok(BestPick {
                format: best.clone(),
                audio_missing: false,
            });
        }

        debug!("No combined stream among {} formats, trying video-only", formats.len());
        let separated = formats
            .iter()
            .filter(|f| f.has_video() && !f.has_audio() && !f.is_manifest());

        highest_bitrate(separated)
            .map(|best| BestPick {
                format: best.clone(),
                audio_missing: true,
            })
            .ok_or(SelectError::NoPlayableStream)
    }

    fn is_trusted(&self, format: &FormatDescriptor) -> bool {
        if self.trusted_domains.is_empty() {
            return true;
        }

        let Ok(url) = Url::parse(&format.playback_url) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        self.trusted_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// First descriptor with the highest video bitrate.
fn highest_bitrate<'a, I>(formats: I) -> Option<&'a FormatDescriptor>
where
    I: Iterator<Item = &'a FormatDescriptor>,
{
    formats.fold(None, |best, candidate| match best {
        Some(current) if current.video_bitrate_or_zero() >= candidate.video_bitrate_or_zero() => {
            Some(current)
        }
        _ => Some(candidate),
    })
}
