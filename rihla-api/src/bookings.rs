use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use rihla_core::Actor;
use rihla_order::{Booking, Payment, PlaceBookingRequest};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(place_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/payments", get(list_payments))
}

async fn place_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(mut req): Json<PlaceBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    if req.currency.is_none() {
        req.currency = Some(state.default_currency.code().to_string());
    }

    match state.orchestrator.place_booking(&actor, req).await {
        Ok(booking) => {
            state.metrics.booking_placed(booking.resource.kind().as_str());
            Ok((StatusCode::CREATED, Json(booking)))
        }
        Err(e) => {
            state.metrics.booking_rejected(e.kind());
            Err(e.into())
        }
    }
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.orchestrator.bookings_for(&actor)?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.orchestrator.booking(id, &actor)?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.orchestrator.cancel_booking(id, &actor).await?;
    state.metrics.booking_cancelled();
    Ok(Json(booking))
}

async fn list_payments(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(state.orchestrator.payments_for(id, &actor)?))
}
