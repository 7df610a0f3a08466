use axum::extract::State;
use mizan_core::api::{HealthResponse, ServerStatus};

use crate::{
    error::{ApiResult, ok},
    state::AppState,
};

pub async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let status = if state.is_shutting_down() {
        ServerStatus::ShuttingDown
    } else {
        ServerStatus::Running
    };
    ok(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_owned(),
        uptime_secs: state.uptime_secs(),
        currency: state.books.currency().await,
        persistent: state.books.is_persistent(),
    })
}
