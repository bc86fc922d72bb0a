use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};

use tessera_core::payment::PaymentNotification;
use tessera_core::SeatStatus;
use tessera_order::{ConfirmOutcome, NotificationOutcome};
use tessera_shared::models::events::{OrderSettledEvent, SeatStatusChangedEvent};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_notification))
}

/// POST /v1/webhooks/payments
/// Gateway callback. Repeats are acknowledged with 200 so the gateway stops retrying.
async fn handle_payment_notification(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<Value>, AppError> {
    let order_id = notification.order_id;
    tracing::info!(
        "Received notification '{}' for order {}",
        notification.transaction_status,
        order_id
    );

    let outcome = match state.payments.handle_notification(&notification).await {
        Ok(outcome) => outcome,
        Err(e) => {
            state.metrics.payment_notifications.with_label_values(&["rejected"]).inc();
            return Err(e.into());
        }
    };

    let label = match &outcome {
        NotificationOutcome::Confirmed(ConfirmOutcome::Settled { seat_ids }) => {
            state.announce(
                seat_ids
                    .iter()
                    .map(|id| SeatStatusChangedEvent::new(*id, SeatStatus::Sold.as_str(), Some(order_id)))
                    .collect(),
            );
            state.announce_settlement(OrderSettledEvent::new(order_id, seat_ids.clone()));
            "confirmed"
        }
        NotificationOutcome::Confirmed(ConfirmOutcome::AlreadyFinal) => "already_final",
        NotificationOutcome::Released(seat_ids) => {
            state.announce(
                seat_ids
                    .iter()
                    .map(|id| SeatStatusChangedEvent::new(*id, SeatStatus::Available.as_str(), None))
                    .collect(),
            );
            "released"
        }
        NotificationOutcome::Ignored => "ignored",
    };
    state.metrics.payment_notifications.with_label_values(&[label]).inc();

    Ok(Json(json!({ "status": "ok", "result": label })))
}
