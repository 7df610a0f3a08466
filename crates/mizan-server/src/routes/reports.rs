//! Dashboard figures and chart data.

use axum::{Router, extract::State, routing::get};
use chrono::{DateTime, Datelike, Utc};
use mizan_core::{
    books::{DateRange, Product},
    report::{CategoryTotal, Dashboard, MonthlyRow, TopProduct},
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiQuery, ApiResult, ok},
    state::AppState,
};

pub const DEFAULT_TOP_PRODUCTS: usize = 10;
pub const MAX_TOP_PRODUCTS: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/dashboard", get(dashboard))
        .route("/reports/monthly", get(monthly))
        .route("/reports/top-products", get(top_products))
        .route("/reports/low-stock", get(low_stock))
        .route("/reports/expenses-by-category", get(expenses_by_category))
}

#[derive(Debug, Default, Deserialize)]
struct MonthlyQuery {
    #[serde(default)]
    year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct TopQuery {
    #[serde(default)]
    from: Option<DateTime<Utc>>,
    #[serde(default)]
    to: Option<DateTime<Utc>>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn dashboard(
    State(state): State<AppState>,
    ApiQuery(range): ApiQuery<DateRange>,
) -> ApiResult<Dashboard> {
    ok(state.books.read(|b| b.dashboard(range)).await)
}

async fn monthly(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MonthlyQuery>,
) -> ApiResult<Vec<MonthlyRow>> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    ok(state.books.read(|b| b.monthly(year)).await)
}

async fn top_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopQuery>,
) -> ApiResult<Vec<TopProduct>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_PRODUCTS);
    if limit == 0 || limit > MAX_TOP_PRODUCTS {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_TOP_PRODUCTS}"
        )));
    }
    let range = DateRange::new(query.from, query.to);
    ok(state.books.read(|b| b.top_products(range, limit)).await)
}

async fn low_stock(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    ok(state
        .books
        .read(|b| b.low_stock().into_iter().cloned().collect())
        .await)
}

async fn expenses_by_category(
    State(state): State<AppState>,
    ApiQuery(range): ApiQuery<DateRange>,
) -> ApiResult<Vec<CategoryTotal>> {
    ok(state.books.read(|b| b.expenses_by_category(range)).await)
}
