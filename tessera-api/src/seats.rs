use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Json, Router,
};
use futures_util::Stream;
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use tessera_catalog::SeatView;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SeatsResponse {
    pub seats: Vec<SeatView>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/seats", get(list_seats))
        .route("/v1/seats/stream", get(seat_stream))
}

/// GET /v1/seats
/// Every seat as the caller sees it
async fn list_seats(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<SeatsResponse>, AppError> {
    let seats = state.resolver.seats_for(user_id).await?;
    Ok(Json(SeatsResponse { seats }))
}

/// GET /v1/seats/stream
async fn seat_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let event = msg.ok()?;
        Event::default()
            .event("seat_status")
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
