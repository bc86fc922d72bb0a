use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{register_int_counter_vec_with_registry, Encoder, IntCounterVec, Registry, TextEncoder};

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    /// Labelled by `outcome`: reserved, conflict, limit_exceeded, timeout, error
    pub reservations: IntCounterVec,
    /// Labelled by `result`: confirmed, already_final, released, ignored, rejected
    pub payment_notifications: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let reservations = register_int_counter_vec_with_registry!(
            "tessera_reservations_total",
            "Reservation attempts by outcome",
            &["outcome"],
            registry,
        )?;
        let payment_notifications = register_int_counter_vec_with_registry!(
            "tessera_payment_notifications_total",
            "Gateway notifications by result",
            &["result"],
            registry,
        )?;

        Ok(Self {
            registry,
            reservations,
            payment_notifications,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
