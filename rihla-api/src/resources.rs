use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use rihla_core::{ResourceInfo, ResourceKind, ResourceRef};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/resources/{kind}/{id}/availability", get(availability))
}

async fn availability(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<ResourceInfo>, AppError> {
    let kind: ResourceKind = kind.parse()?;
    let info = state
        .orchestrator
        .availability(ResourceRef::new(kind, id))
        .await?;
    Ok(Json(info))
}
