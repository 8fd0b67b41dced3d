use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use styleshift_core::{StyleDefinition, TransferJob, TransferRequest};
use uuid::Uuid;

use crate::{error::ApiError, startup::AppState, IMAGES_ROUTE};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&StyleDefinition> for StyleSummary {
    fn from(style: &StyleDefinition) -> Self {
        Self {
            id: style.id.clone(),
            name: style.name.clone(),
            description: style.description.clone(),
        }
    }
}

/// Returned as soon as a transfer is queued. `image_url` only resolves once
/// the background job has written the file; callers poll it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferResult {
    pub id: Uuid,
    pub product_id: String,
    pub style_id: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&TransferJob> for TransferResult {
    fn from(job: &TransferJob) -> Self {
        Self {
            id: job.transfer_id,
            product_id: job.product_id.clone(),
            style_id: job.style_id.clone(),
            image_url: format!("{IMAGES_ROUTE}/{}", job.output_file_name()),
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn list_styles(State(state): State<AppState>) -> Json<Vec<StyleSummary>> {
    Json(
        state
            .pipeline
            .catalog()
            .iter()
            .map(StyleSummary::from)
            .collect(),
    )
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResult>, ApiError> {
    let job = state.pipeline.plan(&request)?;
    let result = TransferResult::from(&job);
    state.queue.submit(job)?;

    tracing::info!(
        transfer_id = %result.id,
        product_id = %result.product_id,
        style_id = %result.style_id,
        pending = state.queue.pending(),
        "transfer queued"
    );
    Ok(Json(result))
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}
