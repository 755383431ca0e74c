use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::SwitchModel;
use crate::AppState;

use super::ApiError;

/// List every switch model in the catalog, by name
pub async fn list_switch_models(State(state): State<Arc<AppState>>) -> Json<Vec<SwitchModel>> {
    Json(state.catalog.list())
}

/// Get a single switch model by name
pub async fn get_switch_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SwitchModel>, ApiError> {
    let model = state
        .catalog
        .get(&name)
        .cloned()
        .ok_or_else(|| ApiError::not_found("switch model"))?;
    Ok(Json(model))
}
