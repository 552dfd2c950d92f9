use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Lifecycle counters, exported in Prometheus text format.
pub struct ApiMetrics {
    registry: Registry,
    bookings_placed: IntCounterVec,
    booking_rejections: IntCounterVec,
    cancellations: IntCounter,
    refund_decisions: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_placed = IntCounterVec::new(
            Opts::new("rihla_bookings_placed_total", "Confirmed bookings by resource kind"),
            &["kind"],
        )?;
        registry.register(Box::new(bookings_placed.clone()))?;

        let booking_rejections = IntCounterVec::new(
            Opts::new("rihla_booking_rejections_total", "Failed placements by error kind"),
            &["reason"],
        )?;
        registry.register(Box::new(booking_rejections.clone()))?;

        let cancellations = IntCounter::new("rihla_booking_cancellations_total", "Cancelled bookings")?;
        registry.register(Box::new(cancellations.clone()))?;

        let refund_decisions = IntCounterVec::new(
            Opts::new("rihla_refund_decisions_total", "Refund decisions by outcome"),
            &["decision"],
        )?;
        registry.register(Box::new(refund_decisions.clone()))?;

        Ok(Self {
            registry,
            bookings_placed,
            booking_rejections,
            cancellations,
            refund_decisions,
        })
    }

    pub fn booking_placed(&self, kind: &str) {
        self.bookings_placed.with_label_values(&[kind]).inc();
    }

    pub fn booking_rejected(&self, reason: &str) {
        self.booking_rejections.with_label_values(&[reason]).inc();
    }

    pub fn booking_cancelled(&self) {
        self.cancellations.inc();
    }

    pub fn refund_decided(&self, decision: &str) {
        self.refund_decisions.with_label_values(&[decision]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(export))
}

async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(format!("metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
