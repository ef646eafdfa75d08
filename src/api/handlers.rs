use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{ApiError, ApiResult, AppState};
use crate::cache::EntryStats;
use crate::formats::{FormatDescriptor, FormatSelector, StreamInfo};

#[derive(Debug, Serialize)]
pub struct ManifestResponse {
    pub title: Option<String>,
    pub id: String,
    pub m3u8_formats: Vec<FormatDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct BestStreamResponse {
    pub title: Option<String>,
    pub id: String,
    pub format: FormatDescriptor,
    pub audio_missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    pub message: String,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Full stream info, cached or freshly extracted.
pub async fn get_streams(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<StreamInfo>> {
    let info = state.coordinator.fetch(&video_id).await?;
    Ok(Json((*info).clone()))
}

/// HLS/DASH manifests only; 404 when the video has none.
pub async fn get_manifest_streams(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<ManifestResponse>> {
    let info = state.coordinator.fetch(&video_id).await?;
    let m3u8_formats = FormatSelector::manifest_view(&info.formats)?;

    Ok(Json(ManifestResponse {
        title: info.title.clone(),
        id: info.id.clone(),
        m3u8_formats,
    }))
}

/// Single best playable stream; 404 when nothing qualifies.
pub async fn get_best_stream(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<BestStreamResponse>> {
    let info = state.coordinator.fetch(&video_id).await?;
    let pick = state.selector.best_pick(&info.formats)?;
    let note = pick.note();

    Ok(Json(BestStreamResponse {
        title: info.title.clone(),
        id: info.id.clone(),
        format: pick.format,
        audio_missing: pick.audio_missing,
        note,
    }))
}

pub async fn delete_cache(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.coordinator.cache().delete(video_id.as_str()) {
        debug!("No cache entry to delete for {}", video_id);
        return Err(ApiError::not_found("No cache entry exists for the given id"));
    }

    info!("🗑️ Deleted cache entry for {}", video_id);
    Ok(Json(DeleteResponse {
        status: "success",
        message: format!("Deleted cache entry for {}", video_id),
    }))
}

/// Live entries after a sweep, ordered by video id.
pub async fn list_cache(State(state): State<AppState>) -> Json<BTreeMap<String, EntryStats>> {
    Json(state.coordinator.cache().list().into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{StreamCache, TtlPolicy};
    use crate::formats::{tests::raw, RawFormat, RawVideoInfo};
    use crate::retrieval::{RetrievalCoordinator, RetrievalSettings};
    use crate::sources::MockExtractor;
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sample_info() -> RawVideoInfo {
        RawVideoInfo {
            title: Some("Sample".into()),
            formats: Some(vec![
                raw("sb0", "mhtml", "https://i.ytimg.com/sb/0"),
                RawFormat {
                    acodec: Some("mp4a.40.2".into()),
                    vcodec: Some("avc1".into()),
                    vbr: Some(500.0),
                    protocol: Some("https".into()),
                    ..raw("18", "mp4", "https://cdn.example/18")
                },
                RawFormat {
                    acodec: Some("mp4a.40.2".into()),
                    vcodec: Some("avc1".into()),
                    protocol: Some("m3u8_native".into()),
                    ..raw("95", "mp4", "https://manifest.example/95/index.m3u8")
                },
            ]),
        }
    }

    fn state_with(info: RawVideoInfo, calls: usize) -> AppState {
        let mut extractor = MockExtractor::new();
        extractor
            .expect_extract()
            .times(calls)
            .returning(move |_| Ok(info.clone()));
        extractor.expect_name().return_const("mock");

        AppState {
            coordinator: RetrievalCoordinator::new(
                StreamCache::new(TtlPolicy::default()),
                Arc::new(extractor),
                RetrievalSettings::default(),
            ),
            selector: Arc::new(FormatSelector::default()),
        }
    }

    #[tokio::test]
    async fn test_views_share_one_extraction() {
        let state = state_with(sample_info(), 1);

        let Json(full) = get_streams(State(state.clone()), Path("abc".into())).await.unwrap();
        assert_eq!(full.formats.len(), 2);

        let Json(manifests) = get_manifest_streams(State(state.clone()), Path("abc".into()))
            .await
            .unwrap();
        assert_eq!(manifests.m3u8_formats.len(), 1);
        assert_eq!(manifests.m3u8_formats[0].id.as_deref(), Some("95"));

        let Json(best) = get_best_stream(State(state), Path("abc".into())).await.unwrap();
        assert_eq!(best.format.id.as_deref(), Some("18"));
        assert!(!best.audio_missing);
        assert_eq!(best.note, None);
    }

    #[tokio::test]
    async fn test_missing_views_are_404() {
        let info = RawVideoInfo {
            title: Some("Audio only".into()),
            formats: Some(vec![RawFormat {
                acodec: Some("opus".into()),
                vcodec: Some("none".into()),
                ..raw("251", "webm", "https://cdn.example/251")
            }]),
        };
        let state = state_with(info, 1);

        let err = get_manifest_streams(State(state.clone()), Path("abc".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = get_best_stream(State(state), Path("abc".into())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let state = state_with(sample_info(), 1);
        let Json(full) = get_streams(State(state.clone()), Path("abc".into())).await.unwrap();
        assert_eq!(full.id, "abc");

        let Json(listed) = list_cache(State(state.clone())).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed["abc"].duration_sec, 600);

        let Json(deleted) = delete_cache(State(state.clone()), Path("abc".into())).await.unwrap();
        assert_eq!(deleted.status, "success");

        let err = delete_cache(State(state.clone()), Path("abc".into())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err = delete_cache(State(state.clone()), Path("abc".into())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let Json(listed) = list_cache(State(state)).await;
        assert!(listed.is_empty());
    }
}
