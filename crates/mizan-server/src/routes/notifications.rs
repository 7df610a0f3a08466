//! Notifications, rendered in the language asked for in `Accept-Language`.

use axum::{
    Router,
    extract::State,
    routing::{delete, get, post},
};
use mizan_core::api::{Deleted, MarkedRead, NotificationView, UnreadCount};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::Lang,
    error::{ApiPath, ApiQuery, ApiResult, ok},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}", delete(remove))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    unread_only: bool,
}

async fn list(
    State(state): State<AppState>,
    Lang(locale): Lang,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<NotificationView>> {
    ok(state
        .books
        .read(|b| {
            b.notifications(query.unread_only)
                .into_iter()
                .map(|n| NotificationView::render(n, locale, b.currency()))
                .collect()
        })
        .await)
}

async fn unread_count(State(state): State<AppState>) -> ApiResult<UnreadCount> {
    ok(UnreadCount {
        unread: state.books.read(|b| b.unread_count()).await,
    })
}

#[instrument(skip(state))]
async fn mark_read(
    State(state): State<AppState>,
    Lang(locale): Lang,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<NotificationView> {
    let notification = state
        .books
        .write("mark_notification_read", |b| b.mark_notification_read(id))
        .await?;
    let currency = state.books.currency().await;
    ok(NotificationView::render(&notification, locale, currency))
}

#[instrument(skip(state))]
async fn mark_all_read(State(state): State<AppState>) -> ApiResult<MarkedRead> {
    let marked = state
        .books
        .write("mark_all_notifications_read", |b| {
            Ok(b.mark_all_notifications_read())
        })
        .await?;
    ok(MarkedRead { marked })
}

#[instrument(skip(state))]
async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Deleted> {
    let notification = state
        .books
        .write("delete_notification", |b| b.delete_notification(id))
        .await?;
    ok(Deleted { id: notification.id })
}
