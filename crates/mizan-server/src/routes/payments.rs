//! Payments against a transaction's remaining amount.

use axum::{Router, extract::State, routing::get};
use mizan_core::{
    api::Deleted,
    books::{NewPayment, Payment, PaymentFilter, PaymentPatch},
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::Actor,
    error::{ApiCreated, ApiJson, ApiPath, ApiQuery, ApiResult, created, ok},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list).post(create))
        .route("/payments/{id}", get(fetch).put(update).delete(delete))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
) -> ApiResult<Vec<Payment>> {
    ok(state
        .books
        .read(|b| b.payments(&filter).into_iter().cloned().collect())
        .await)
}

async fn fetch(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Payment> {
    ok(state.books.read(|b| b.payment(id).cloned()).await?)
}

async fn create(
    State(state): State<AppState>,
    Actor(user): Actor,
    ApiJson(mut new): ApiJson<NewPayment>,
) -> ApiCreated<Payment> {
    new.created_by = user;
    created(state.books.record_payment(new).await?)
}

#[instrument(skip(state, patch))]
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<PaymentPatch>,
) -> ApiResult<Payment> {
    ok(state
        .books
        .write("update_payment", |b| b.update_payment(id, patch))
        .await?)
}

#[instrument(skip(state))]
async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    let payment = state
        .books
        .write("delete_payment", |b| b.delete_payment(id))
        .await?;
    ok(Deleted { id: payment.id })
}
