use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use rihla_core::{Actor, PriceSnapshot};
use rihla_order::Refund;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request Types
// ============================================================================

/// Omitted amounts default to the full payment.
#[derive(Debug, Deserialize)]
pub struct RequestRefund {
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub amount_sar: Option<Decimal>,
    pub amount_usd: Option<Decimal>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessAction {
    /// Move to `processing`
    Process,
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRefund {
    pub action: ProcessAction,
    #[serde(default)]
    pub notes: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/refunds", post(request_refund).get(list_refunds))
        .route("/v1/refunds/{id}/process", post(process_refund))
}

async fn request_refund(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<RequestRefund>,
) -> Result<(StatusCode, Json<Refund>), AppError> {
    // Visibility check before the payment's amount is read
    state.orchestrator.booking(req.booking_id, &actor)?;

    let amount = match (req.amount_sar, req.amount_usd) {
        (Some(sar), Some(usd)) => PriceSnapshot::new(sar, usd),
        (None, None) => state.orchestrator.payments().get(req.payment_id)?.amount,
        _ => {
            return Err(AppError::ValidationError(
                "amount_sar and amount_usd must be given together".to_string(),
            ))
        }
    };

    let refund = state
        .orchestrator
        .request_refund(req.booking_id, req.payment_id, amount, &req.reason, &actor)?;
    Ok((StatusCode::CREATED, Json(refund)))
}

async fn list_refunds(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Refund>>, AppError> {
    Ok(Json(state.orchestrator.refunds_for(&actor)?))
}

async fn process_refund(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProcessRefund>,
) -> Result<Json<Refund>, AppError> {
    let refund = match req.action {
        ProcessAction::Process => state.orchestrator.begin_refund_processing(id, &actor)?,
        ProcessAction::Approve => {
            let refund = state.orchestrator.approve_refund(id, &actor, &req.notes).await?;
            state.metrics.refund_decided("approve");
            refund
        }
        ProcessAction::Reject => {
            let refund = state.orchestrator.reject_refund(id, &actor, &req.notes)?;
            state.metrics.refund_decided("reject");
            refund
        }
    };
    Ok(Json(refund))
}
