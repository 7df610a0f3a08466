//! HTTP surface of the mizan books.
//!
//! Every route lives under `/api/v1` and answers with the
//! [`ApiResponse`](mizan_core::api::ApiResponse) envelope. Everything except
//! `/api/v1/health` sits behind [`auth::require_auth`].

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(routes::catalog::router())
        .merge(routes::parties::router())
        .merge(routes::transactions::router())
        .merge(routes::payments::router())
        .merge(routes::expenses::router())
        .merge(routes::notifications::router())
        .merge(routes::reports::router())
        .layer(from_fn_with_state(state.clone(), auth::require_auth));

    let public = Router::new().route("/health", get(routes::health::health));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
