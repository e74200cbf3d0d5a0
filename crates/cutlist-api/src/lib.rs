//! Axum HTTP API for the render backend.
//!
//! This crate provides:
//! - `POST /projects/:project_id/render`
//! - Health and readiness probes
//! - Request id, logging, security headers and CORS middleware
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
