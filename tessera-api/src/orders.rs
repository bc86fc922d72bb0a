use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use tessera_order::OrderSummary;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub order_id: Uuid,
    pub gross_amount: i64,
    pub token: String,
    pub redirect_url: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders/{order_id}", get(get_order))
        .route("/v1/orders/{order_id}/payment", post(initiate_payment))
}

/// GET /v1/orders/{order_id}
async fn get_order(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderSummary>, AppError> {
    let summary = state.coordinator.order_summary(user_id, order_id).await?;
    Ok(Json(summary))
}

/// POST /v1/orders/{order_id}/payment
/// Opens a gateway transaction; the seats stay held until a notification arrives.
async fn initiate_payment(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let (summary, reference) = state.payments.initiate_payment(user_id, order_id).await?;

    Ok(Json(PaymentResponse {
        order_id,
        gross_amount: summary.gross_amount,
        token: reference.token,
        redirect_url: reference.redirect_url,
    }))
}
