//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use cutlist_media::RenderState;

/// Install the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "cutlist_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "cutlist_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "cutlist_http_requests_in_flight";

    // Render metrics
    pub const RENDERS_TOTAL: &str = "cutlist_renders_total";
    pub const RENDER_DURATION_SECONDS: &str = "cutlist_render_duration_seconds";
    pub const RENDERS_IN_FLIGHT: &str = "cutlist_renders_in_flight";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Mark a render as started.
pub fn render_started() {
    gauge!(names::RENDERS_IN_FLIGHT).increment(1.0);
}

/// Record the outcome of a render.
pub fn record_render(state: RenderState, duration_secs: f64) {
    gauge!(names::RENDERS_IN_FLIGHT).decrement(1.0);

    let labels = [("outcome", state.as_str().to_string())];
    counter!(names::RENDERS_TOTAL, &labels).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let replace = |pattern: &str, input: &str, with: &str| -> String {
        match regex_lite::Regex::new(pattern) {
            Ok(re) => re.replace_all(input, with).into_owned(),
            Err(_) => input.to_string(),
        }
    };
    // Project ids are free-form
    let path = replace(r"/projects/[^/]+", path, "/projects/:project_id");
    replace(r"/[0-9]+(/|$)", &path, "/:id$1")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
