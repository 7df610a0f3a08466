//! Clients and suppliers share one set of handlers; the route prefix fixes
//! the party kind.

use axum::{Router, extract::State, routing::get};
use mizan_core::{
    api::Deleted,
    books::{Party, PartyDetails, PartyKind, PartyStatement},
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    error::{ApiCreated, ApiJson, ApiPath, ApiResult, created, ok},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(kind_router(PartyKind::Client, "/clients"))
        .merge(kind_router(PartyKind::Supplier, "/suppliers"))
}

fn kind_router(kind: PartyKind, prefix: &str) -> Router<AppState> {
    Router::new()
        .route(
            prefix,
            get(move |state: State<AppState>| list(kind, state)).post(
                move |state: State<AppState>, body: ApiJson<PartyDetails>| create(kind, state, body),
            ),
        )
        .route(
            &format!("{prefix}/{{id}}"),
            get(move |state: State<AppState>, id: ApiPath<Uuid>| fetch(kind, state, id))
                .put(
                    move |state: State<AppState>, id: ApiPath<Uuid>, body: ApiJson<PartyDetails>| {
                        update(kind, state, id, body)
                    },
                )
                .delete(move |state: State<AppState>, id: ApiPath<Uuid>| delete(kind, state, id)),
        )
        .route(
            &format!("{prefix}/{{id}}/statement"),
            get(move |state: State<AppState>, id: ApiPath<Uuid>| statement(kind, state, id)),
        )
}

async fn list(kind: PartyKind, State(state): State<AppState>) -> ApiResult<Vec<Party>> {
    ok(state
        .books
        .read(|b| b.parties(kind).into_iter().cloned().collect())
        .await)
}

async fn fetch(kind: PartyKind, State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Party> {
    ok(state.books.read(|b| b.party(kind, id).cloned()).await?)
}

#[instrument(skip(state, details), fields(name = %details.name))]
async fn create(
    kind: PartyKind,
    State(state): State<AppState>,
    ApiJson(details): ApiJson<PartyDetails>,
) -> ApiCreated<Party> {
    created(
        state
            .books
            .write("create_party", |b| b.create_party(kind, details))
            .await?,
    )
}

#[instrument(skip(state, details))]
async fn update(
    kind: PartyKind,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(details): ApiJson<PartyDetails>,
) -> ApiResult<Party> {
    ok(state
        .books
        .write("update_party", |b| b.update_party(kind, id, details))
        .await?)
}

#[instrument(skip(state))]
async fn delete(kind: PartyKind, State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    let party = state
        .books
        .write("delete_party", |b| b.delete_party(kind, id))
        .await?;
    ok(Deleted { id: party.id })
}

async fn statement(
    kind: PartyKind,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<PartyStatement> {
    ok(state.books.read(|b| b.statement(kind, id)).await?)
}
