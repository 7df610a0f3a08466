use axum::{Router, extract::State, routing::get};
use mizan_core::{
    api::Deleted,
    books::{Expense, ExpenseDetails, ExpenseFilter},
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
        .route("/expenses", get(list).post(create))
        .route("/expenses/{id}", get(fetch).put(update).delete(delete))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ExpenseFilter>,
) -> ApiResult<Vec<Expense>> {
    ok(state
        .books
        .read(|b| b.expenses(&filter).into_iter().cloned().collect())
        .await)
}

async fn fetch(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Expense> {
    ok(state.books.read(|b| b.expense(id).cloned()).await?)
}

#[instrument(skip(state, details), fields(title = %details.title))]
async fn create(
    State(state): State<AppState>,
    Actor(user): Actor,
    ApiJson(mut details): ApiJson<ExpenseDetails>,
) -> ApiCreated<Expense> {
    details.created_by = user;
    created(
        state
            .books
            .write("create_expense", |b| b.create_expense(details))
            .await?,
    )
}

#[instrument(skip(state, details))]
async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(details): ApiJson<ExpenseDetails>,
) -> ApiResult<Expense> {
    ok(state
        .books
        .write("update_expense", |b| b.update_expense(id, details))
        .await?)
}

#[instrument(skip(state))]
async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    let expense = state
        .books
        .write("delete_expense", |b| b.delete_expense(id))
        .await?;
    ok(Deleted { id: expense.id })
}
