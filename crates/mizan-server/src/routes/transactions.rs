//! Sales and purchases.

use axum::{Router, extract::State, routing::get};
use mizan_core::{
    api::Deleted,
    books::{NewTransaction, Transaction, TransactionFilter, TransactionPatch},
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
        .route("/transactions", get(list).post(create))
        .route("/transactions/{id}", get(fetch).put(update).delete(delete))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TransactionFilter>,
) -> ApiResult<Vec<Transaction>> {
    ok(state
        .books
        .read(|b| b.transactions(&filter).into_iter().cloned().collect())
        .await)
}

async fn fetch(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Transaction> {
    ok(state.books.read(|b| b.transaction(id).cloned()).await?)
}

async fn create(
    State(state): State<AppState>,
    Actor(user): Actor,
    ApiJson(mut new): ApiJson<NewTransaction>,
) -> ApiCreated<Transaction> {
    new.created_by = user;
    created(state.books.record_transaction(new).await?)
}

#[instrument(skip(state, patch))]
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<TransactionPatch>,
) -> ApiResult<Transaction> {
    ok(state
        .books
        .write("update_transaction", |b| b.update_transaction(id, patch))
        .await?)
}

#[instrument(skip(state))]
async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    let tx = state
        .books
        .write("delete_transaction", |b| b.delete_transaction(id))
        .await?;
    ok(Deleted { id: tx.id })
}
