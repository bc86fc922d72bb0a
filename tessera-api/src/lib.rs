use axum::{http::Method, middleware::from_fn_with_state, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod orders;
pub mod reservations;
pub mod seats;
pub mod state;
pub mod webhooks;
pub mod worker;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let customer = Router::new()
        .merge(seats::routes())
        .merge(reservations::routes())
        .merge(orders::routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::customer_auth_middleware));

    Router::new()
        .merge(customer)
        .merge(webhooks::routes())
        .route("/metrics", get(metrics::metrics_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .with_state(state)
}
