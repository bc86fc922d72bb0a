use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tessera_core::{CoreError, SeatId, SeatStatus};
use tessera_shared::models::events::SeatStatusChangedEvent;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub seat_ids: Vec<SeatId>,
}

#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    pub order_id: Uuid,
    pub seat_ids: Vec<SeatId>,
    pub held_until: chrono::DateTime<chrono::Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/reservations", post(reserve_seats))
}

/// POST /v1/reservations
async fn reserve_seats(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReserveResponse>), AppError> {
    let result = state.coordinator.reserve(user_id, &req.seat_ids).await;

    let outcome = match &result {
        Ok(_) => "reserved",
        Err(CoreError::Conflict(_)) => "conflict",
        Err(CoreError::LimitExceeded { .. }) => "limit_exceeded",
        Err(CoreError::Timeout(_)) => "timeout",
        Err(_) => "error",
    };
    state.metrics.reservations.with_label_values(&[outcome]).inc();

    let receipt = result?;

    state.announce(
        receipt
            .seat_ids
            .iter()
            .map(|id| SeatStatusChangedEvent::new(*id, SeatStatus::Reserved.as_str(), Some(receipt.order_id)))
            .collect(),
    );

    Ok((
        StatusCode::CREATED,
        Json(ReserveResponse {
            order_id: receipt.order_id,
            seat_ids: receipt.seat_ids,
            held_until: receipt.held_until,
        }),
    ))
}
