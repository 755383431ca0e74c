//! DIET: synthesizes a two-tier leaf/spine data-center topology from a
//! declarative plan, and serves validation, preview and commit over HTTP.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod router;

use std::sync::Arc;

use catalog::SwitchModelCatalog;
use config::Config;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<SwitchModelCatalog>,
}
