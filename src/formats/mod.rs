//! # Formats Module
//!
//! Normalized stream descriptors and the pure selection logic built on them.
//!
//! Extraction hands back yt-dlp's loosely typed format list, where a missing
//! codec may show up as an absent key, a JSON `null`, an empty string or the
//! literal `"none"`. Everything is folded into [`FormatDescriptor`] once, at
//! ingestion, so that the rest of the crate only ever sees `Option::None` for
//! "absent".
//!
//! Descriptors that can never be played are dropped at the same point:
//!
//! - entries without a playback URL
//! - `mhtml` entries (storyboard sprite sheets)

pub mod selector;

use serde::{Deserialize, Serialize};

pub use selector::FormatSelector;

/// Transport protocols that identify an HLS or DASH manifest.
pub const MANIFEST_PROTOCOLS: [&str; 2] = ["m3u8_native", "http_dash_segments"];

/// Container tag of storyboard sprite sheets.
const SPRITE_CONTAINER: &str = "mhtml";

/// Video information as dumped by `yt-dlp --dump-single-json`.
///
/// Only the fields this service uses are declared.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub formats: Option<Vec<RawFormat>>,
}

/// One entry of yt-dlp's `formats` array, untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub vbr: Option<f64>,
    #[serde(default)]
    pub abr: Option<f64>,
}

/// One playable stream variant.
///
/// Serialized with yt-dlp's short field names (`itag`, `ext`, `acodec`...)
/// since that is what clients of this service consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatDescriptor {
    #[serde(rename = "itag")]
    pub id: Option<String>,
    #[serde(rename = "ext")]
    pub container: Option<String>,
    pub resolution: Option<String>,
    #[serde(rename = "fps")]
    pub frame_rate: Option<f64>,
    #[serde(rename = "acodec")]
    pub audio_codec: Option<String>,
    #[serde(rename = "vcodec")]
    pub video_codec: Option<String>,
    #[serde(rename = "url")]
    pub playback_url: String,
    #[serde(rename = "protocol")]
    pub transport_protocol: Option<String>,
    #[serde(rename = "vbr")]
    pub video_bitrate: Option<f64>,
    #[serde(rename = "abr")]
    pub audio_bitrate: Option<f64>,
}

impl FormatDescriptor {
    /// Normalizes a raw entry, or returns `None` if it is never playable.
    pub fn from_raw(raw: RawFormat) -> Option<Self> {
        let playback_url = raw.url.filter(|url| !url.trim().is_empty())?;
        if raw.ext.as_deref() == Some(SPRITE_CONTAINER) {
            return None;
        }

        Some(Self {
            id: raw.format_id,
            container: raw.ext,
            resolution: raw.resolution,
            frame_rate: raw.fps,
            audio_codec: codec(raw.acodec),
            video_codec: codec(raw.vcodec),
            playback_url,
            transport_protocol: raw.protocol,
            video_bitrate: raw.vbr,
            audio_bitrate: raw.abr,
        })
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    /// HLS/DASH manifest rather than a single progressive file.
    pub fn is_manifest(&self) -> bool {
        let by_protocol = self
            .transport_protocol
            .as_deref()
            .is_some_and(|protocol| MANIFEST_PROTOCOLS.contains(&protocol));

        by_protocol
            || self.container.as_deref() == Some("m3u8")
            || self.playback_url.contains(".m3u8")
    }

    /// Video bitrate with "unknown" ranked lowest.
    pub fn video_bitrate_or_zero(&self) -> f64 {
        self.video_bitrate.unwrap_or(0.0)
    }
}

/// Drops unplayable entries and normalizes the rest, keeping input order.
pub fn clean_formats(raw: Vec<RawFormat>) -> Vec<FormatDescriptor> {
    raw.into_iter().filter_map(FormatDescriptor::from_raw).collect()
}

/// Normalized result of one extraction; this is what gets cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    pub title: Option<String>,
    pub id: String,
    pub formats: Vec<FormatDescriptor>,
}

impl StreamInfo {
    pub fn from_raw(video_id: &str, raw: RawVideoInfo) -> Self {
        Self {
            title: raw.title,
            id: video_id.to_string(),
            formats: clean_formats(raw.formats.unwrap_or_default()),
        }
    }

    /// Number of descriptors that survived cleaning. Drives the cache TTL.
    pub fn richness(&self) -> usize {
        self.formats.len()
    }
}

fn codec(value: Option<String>) -> Option<String> {
    value.filter(|codec| {
        let codec = codec.trim();
        !codec.is_empty() && !codec.eq_ignore_ascii_case("none")
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn raw(id: &str, ext: &str, url: &str) -> RawFormat {
        RawFormat {
            format_id: Some(id.to_string()),
            ext: Some(ext.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cleaning_drops_unplayable_in_any_order() {
        let formats = vec![
            raw("sb0", "mhtml", "https://i.ytimg.com/sb/0.jpg"),
            raw("18", "mp4", "https://cdn.example/18"),
            raw("empty", "mp4", ""),
            RawFormat {
                format_id: Some("no-url".into()),
                ext: Some("webm".into()),
                ..Default::default()
            },
            raw("22", "mp4", "https://cdn.example/22"),
        ];

        for shift in 0..formats.len() {
            let mut rotated = formats.clone();
            rotated.rotate_left(shift);

            let cleaned = clean_formats(rotated);
            let mut ids: Vec<_> = cleaned.iter().filter_map(|f| f.id.clone()).collect();
            ids.sort();
            assert_eq!(ids, vec!["18".to_string(), "22".to_string()]);
            assert!(cleaned
                .iter()
                .all(|f| !f.playback_url.is_empty() && f.container.as_deref() != Some("mhtml")));
        }
    }

    #[test]
    fn test_codec_sentinels_become_absent() {
        let format = FormatDescriptor::from_raw(RawFormat {
            acodec: Some("none".into()),
            vcodec: Some("".into()),
            ..raw("140", "m4a", "https://cdn.example/140")
        })
        .unwrap();

        assert_eq!(format.audio_codec, None);
        assert_eq!(format.video_codec, None);
        assert!(!format.has_audio());
        assert!(!format.has_video());
    }

    #[test]
    fn test_manifest_detection() {
        let hls = FormatDescriptor::from_raw(RawFormat {
            protocol: Some("m3u8_native".into()),
            ..raw("95", "mp4", "https://manifest.example/index")
        })
        .unwrap();
        let dash = FormatDescriptor::from_raw(RawFormat {
            protocol: Some("http_dash_segments".into()),
            ..raw("137", "mp4", "https://manifest.example/dash/137")
        })
        .unwrap();
        let by_container = FormatDescriptor::from_raw(raw("96", "m3u8", "https://manifest.example/hls/96")).unwrap();
        let by_url = FormatDescriptor::from_raw(raw("x", "mp4", "https://cdn.example/a.m3u8?x=1")).unwrap();
        let progressive = FormatDescriptor::from_raw(RawFormat {
            protocol: Some("https".into()),
            ..raw("18", "mp4", "https://cdn.example/18")
        })
        .unwrap();

        assert!(hls.is_manifest());
        assert!(dash.is_manifest());
        assert!(by_container.is_manifest());
        assert!(by_url.is_manifest());
        assert!(!progressive.is_manifest());
    }

    #[test]
    fn test_parses_ytdlp_json() {
        let json = r#"{
            "id": "abc",
            "title": "Some video",
            "formats": [
                {"format_id": "sb0", "ext": "mhtml", "url": "https://i.ytimg.com/sb", "acodec": "none", "vcodec": "none"},
                {"format_id": "18", "ext": "mp4", "resolution": "640x360", "fps": 30,
                 "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "url": "https://cdn.example/18",
                 "protocol": "https", "vbr": null, "abr": 96.0}
            ]
        }"#;

        let raw: RawVideoInfo = serde_json::from_str(json).unwrap();
        let info = StreamInfo::from_raw("abc", raw);

        assert_eq!(info.title.as_deref(), Some("Some video"));
        assert_eq!(info.richness(), 1);
        assert_eq!(info.formats[0].frame_rate, Some(30.0));
        assert_eq!(info.formats[0].audio_bitrate, Some(96.0));
        assert_eq!(info.formats[0].video_bitrate, None);
    }

    #[test]
    fn test_missing_formats_is_empty() {
        let raw: RawVideoInfo = serde_json::from_str(r#"{"title": null, "formats": null}"#).unwrap();
        let info = StreamInfo::from_raw("abc", raw);
        assert!(info.formats.is_empty());
        assert_eq!(info.title, None);
    }

    #[test]
    fn test_serializes_with_short_names() {
        let format = FormatDescriptor::from_raw(raw("18", "mp4", "https://cdn.example/18")).unwrap();
        let value = serde_json::to_value(&format).unwrap();
        assert_eq!(value["itag"], "18");
        assert_eq!(value["ext"], "mp4");
        assert_eq!(value["url"], "https://cdn.example/18");
    }
}
