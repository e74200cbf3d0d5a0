//! Application state.

use std::sync::Arc;

use cutlist_media::{RenderConfig, Renderer};
use cutlist_storage::{LocalStore, MediaStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub renderer: Arc<Renderer>,
    pub store: Arc<dyn MediaStore>,
}

impl AppState {
    pub fn new(config: ApiConfig, render_config: RenderConfig, store: Arc<dyn MediaStore>) -> Self {
        Self {
            config,
            renderer: Arc::new(Renderer::new(render_config)),
            store,
        }
    }

    /// State backed by the local store under `DATA_ROOT`.
    pub fn from_env(config: ApiConfig) -> Self {
        let render_config = RenderConfig::from_env();
        let store = LocalStore::from_env();
        Self::new(config, render_config, Arc::new(store))
    }
}
