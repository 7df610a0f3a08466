//! Categories, products and manual stock corrections.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use mizan_core::{
    api::Deleted,
    books::{Category, CategoryDetails, NewProduct, Product, ProductDetails, ProductFilter, StockAdjustment},
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    error::{ApiCreated, ApiJson, ApiPath, ApiQuery, ApiResult, created, ok},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/adjust", post(adjust_stock))
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    ok(state
        .books
        .read(|b| b.categories().into_iter().cloned().collect())
        .await)
}

async fn get_category(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Category> {
    ok(state.books.read(|b| b.category(id).cloned()).await?)
}

#[instrument(skip(state, details), fields(name = %details.name))]
async fn create_category(
    State(state): State<AppState>,
    ApiJson(details): ApiJson<CategoryDetails>,
) -> ApiCreated<Category> {
    created(
        state
            .books
            .write("create_category", |b| b.create_category(details))
            .await?,
    )
}

#[instrument(skip(state, details))]
async fn update_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(details): ApiJson<CategoryDetails>,
) -> ApiResult<Category> {
    ok(state
        .books
        .write("update_category", |b| b.update_category(id, details))
        .await?)
}

#[instrument(skip(state))]
async fn delete_category(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    let category = state
        .books
        .write("delete_category", |b| b.delete_category(id))
        .await?;
    ok(Deleted { id: category.id })
}

async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> ApiResult<Vec<Product>> {
    ok(state
        .books
        .read(|b| b.products(&filter).into_iter().cloned().collect())
        .await)
}

async fn get_product(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Product> {
    ok(state.books.read(|b| b.product(id).cloned()).await?)
}

#[instrument(skip(state, new), fields(name = %new.details.name))]
async fn create_product(State(state): State<AppState>, ApiJson(new): ApiJson<NewProduct>) -> ApiCreated<Product> {
    created(
        state
            .books
            .write("create_product", |b| b.create_product(new))
            .await?,
    )
}

#[instrument(skip(state, details))]
async fn update_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(details): ApiJson<ProductDetails>,
) -> ApiResult<Product> {
    ok(state
        .books
        .write("update_product", |b| b.update_product(id, details))
        .await?)
}

#[instrument(skip(state))]
async fn delete_product(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    let product = state
        .books
        .write("delete_product", |b| b.delete_product(id))
        .await?;
    ok(Deleted { id: product.id })
}

#[instrument(skip(state, adjustment), fields(delta = %adjustment.delta))]
async fn adjust_stock(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(adjustment): ApiJson<StockAdjustment>,
) -> ApiResult<Product> {
    ok(state
        .books
        .write("adjust_stock", |b| b.adjust_stock(id, adjustment))
        .await?)
}
