use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;

use crate::engine::{self, DietError};
use crate::models::{CommitPayload, GeneratedTopology, Plan, PreviewResponse, ValidationResponse};
use crate::AppState;

use super::ApiError;

/// Run a generation on the blocking pool, bounded by the configured timeout
async fn generate(state: &Arc<AppState>, plan: Plan) -> Result<Result<GeneratedTopology, DietError>, ApiError> {
    let catalog = state.catalog.clone();
    let name = plan.name.clone();
    let task = tokio::task::spawn_blocking(move || engine::generate(&plan, &catalog));

    match tokio::time::timeout(state.config.generation_timeout(), task).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => {
            tracing::error!(plan = %name, "Generation task failed: {}", e);
            Err(ApiError::internal(format!("Generation task failed: {}", e)))
        }
        Err(_) => {
            tracing::warn!(plan = %name, "Generation timed out");
            Err(ApiError::gateway_timeout(format!(
                "generation of plan '{}' exceeded {}s",
                name, state.config.generation_timeout_secs
            )))
        }
    }
}

/// Validate a plan; a rejected plan is still a 200 with `valid: false`
pub async fn validate_plan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Plan>, JsonRejection>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let Json(plan) = payload?;
    let response = match generate(&state, plan).await? {
        Ok(_) => ValidationResponse {
            valid: true,
            error: None,
        },
        Err(e) => {
            tracing::debug!("Plan rejected: {}", e);
            ValidationResponse {
                valid: false,
                error: Some(e.to_string()),
            }
        }
    };
    Ok(Json(response))
}

/// Preview the counts and sizing a plan would produce
pub async fn preview_plan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Plan>, JsonRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let Json(plan) = payload?;
    let topology = generate(&state, plan).await??;
    Ok(Json(PreviewResponse::from(&topology)))
}

/// Generate the full record set for the persistence layer
pub async fn commit_plan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Plan>, JsonRejection>,
) -> Result<Json<CommitPayload>, ApiError> {
    let Json(plan) = payload?;
    let topology = generate(&state, plan).await??;
    let payload = CommitPayload::new(topology);
    tracing::info!(
        plan = %payload.plan,
        generation_id = %payload.generation_id,
        devices = payload.summary.device_count,
        cables = payload.summary.cable_count,
        "Committed topology"
    );
    Ok(Json(payload))
}
