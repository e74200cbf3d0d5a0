//! Render handler.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use tracing::{info, warn};
use validator::Validate;

use cutlist_media::{MediaBlob, RenderInputs};
use cutlist_models::{RenderRequest, RenderResponse};
use cutlist_storage::StoredFile;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Render a project's timeline to a video file.
///
/// Validation, unknown projects and missing inputs are HTTP errors. From the
/// engine check onward every outcome is a `RenderResponse`.
pub async fn render_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<RenderRequest>,
) -> ApiResult<Json<RenderResponse>> {
    request.validate()?;

    if state.store.get_project(&project_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Project {} not found", project_id)));
    }

    let source = state
        .store
        .get_file(&request.video_file_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Video file {} not found", request.video_file_id)))?;

    let mut clips = Vec::with_capacity(request.audio_files.len());
    for clip in &request.audio_files {
        let file = state
            .store
            .get_file(&clip.id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Audio file {} not found", clip.id)))?;
        clips.push(to_blob(file));
    }

    info!(
        project_id = %project_id,
        segments = request.video_segments.len(),
        audio_tracks = request.audio_files.len(),
        subtitles = request.subtitles.len(),
        "Render requested"
    );

    let inputs = RenderInputs {
        project_id,
        request,
        source: to_blob(source),
        clips,
    };

    let start = Instant::now();
    metrics::render_started();
    let report = state.renderer.render_with_report(inputs).await;
    metrics::record_render(report.state, start.elapsed().as_secs_f64());

    if !report.response.is_ok() {
        warn!(state = %report.state, "Render did not succeed: {}", report.response.message);
    }

    Ok(Json(report.response))
}

fn to_blob(file: StoredFile) -> MediaBlob {
    MediaBlob::new(file.filename, file.bytes)
}
