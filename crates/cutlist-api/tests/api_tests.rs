//! API integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use cutlist_api::{create_router, ApiConfig, AppState};
use cutlist_media::RenderConfig;
use cutlist_storage::{LocalStore, LocalStoreConfig, Project};

struct TestApp {
    router: Router,
    _dir: TempDir,
    temp_root: std::path::PathBuf,
}

/// Router over a temp-dir store with an engine binary that does not exist.
async fn create_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(LocalStoreConfig {
        root: dir.path().join("store"),
    });
    store.put_project(&Project::new("proj-1", "Holiday")).await.unwrap();
    store
        .put_file("video-1", "holiday.mp4", "video/mp4", b"video-bytes")
        .await
        .unwrap();
    store
        .put_file("music-1", "music.mp3", "audio/mpeg", b"mp3-bytes")
        .await
        .unwrap();

    let temp_root = dir.path().join("render-tmp");
    let render_config = RenderConfig {
        ffmpeg_binary: dir.path().join("missing-ffmpeg").to_string_lossy().into_owned(),
        ffprobe_binary: dir.path().join("missing-ffprobe").to_string_lossy().into_owned(),
        temp_root: Some(temp_root.clone()),
        ..Default::default()
    }
    .with_data_root(dir.path().join("data"));

    let state = AppState::new(ApiConfig::default(), render_config, Arc::new(store));
    TestApp {
        router: create_router(state, None),
        _dir: dir,
        temp_root,
    }
}

fn post_render(project_id: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/projects/{}/render", project_id))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    for uri in ["/health", "/healthz"] {
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
    }
}

#[tokio::test]
async fn test_ready_reports_missing_engine() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["checks"]["ffmpeg"]["status"], "error");
}

#[tokio::test]
async fn test_metrics_disabled() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");
}

#[tokio::test]
async fn test_unknown_project_is_404() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render("nope", json!({ "video_file_id": "video-1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("Project nope"));
}

#[tokio::test]
async fn test_missing_video_is_404() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render("proj-1", json!({ "videoFileId": "video-404" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_audio_clip_is_404() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render(
            "proj-1",
            json!({
                "video_file_id": "video-1",
                "audio_files": [
                    { "id": "music-1", "startTime": 0.0 },
                    { "id": "music-404", "startTime": 2.0 }
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("music-404"));
}

#[tokio::test]
async fn test_invalid_segment_is_400() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render(
            "proj-1",
            json!({
                "video_file_id": "video-1",
                "video_segments": [{ "sourceStartTime": 5.0, "sourceEndTime": 2.0 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blur_box_past_canvas_edge_is_400() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render(
            "proj-1",
            json!({
                "video_file_id": "video-1",
                "hardsub_cover_box": { "x": 90.0, "y": 50.0, "width": 50.0, "height": 20.0, "enabled": true }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_colour_is_400() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render(
            "proj-1",
            json!({
                "video_file_id": "video-1",
                "subtitle_style": { "primaryColor": "white" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_json_shape_is_rejected() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render("proj-1", json!({ "video_segments": "all of them" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_missing_engine_returns_error_response() {
    let app = create_test_app().await;
    let response = app
        .router
        .oneshot(post_render(
            "proj-1",
            json!({
                "videoFileId": "video-1",
                "videoSegments": [
                    { "sourceStartTime": 0.0, "sourceEndTime": 5.0 },
                    { "sourceStartTime": 10.0, "sourceEndTime": 12.0, "playbackRate": 0.5 }
                ],
                "audioFiles": [{ "id": "music-1", "startTime": 3.2, "volumeDb": -6.0 }],
                "subtitles": [{ "startTime": "00:00:01,000", "endTime": "00:00:02,000", "text": "Hi" }],
                "masterVolumeDb": 0.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("FFmpeg not found"));
    assert_eq!(body["segment_count"], 2);
    assert_eq!(body["audio_track_count"], 1);
    assert_eq!(body["subtitle_count"], 1);
    assert!(body.get("output_path").is_none());

    // Pre-check failure stages nothing
    assert!(!app.temp_root.exists() || std::fs::read_dir(&app.temp_root).unwrap().next().is_none());
}
