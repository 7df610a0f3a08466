use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mizan_core::books::Notification;
use mizan_primitives::{Amount, Quantity};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::codec::{notification_kind_str, parse_notification_kind};

/// Row type mapping the `notifications` table.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    kind: String,
    subject_id: Option<Uuid>,
    subject: String,
    amount: Option<Decimal>,
    quantity: Option<Decimal>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            kind: parse_notification_kind(&row.kind)?,
            subject_id: row.subject_id,
            subject: row.subject,
            amount: row.amount.map(Amount::from),
            quantity: row.quantity.map(Quantity::from),
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[instrument(skip_all, level = "debug", fields(notification_id = %n.id))]
pub async fn upsert_notification(conn: &mut PgConnection, n: &Notification) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO notifications (id, kind, subject_id, subject, amount, quantity, read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET read = EXCLUDED.read
        ",
    )
    .bind(n.id)
    .bind(notification_kind_str(n.kind))
    .bind(n.subject_id)
    .bind(&n.subject)
    .bind(n.amount.map(Decimal::from))
    .bind(n.quantity.map(Decimal::from))
    .bind(n.read)
    .bind(n.created_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to save notification {}", n.id))?;
    Ok(())
}

pub async fn delete_notification(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to delete notification {id}"))?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn load_notifications(pool: &PgPool) -> Result<Vec<Notification>> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        r"
        SELECT id, kind, subject_id, subject, amount, quantity, read, created_at
        FROM notifications
        ORDER BY created_at ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load notifications")?;

    rows.into_iter()
        .map(Notification::try_from)
        .collect::<Result<Vec<_>>>()
        .context("failed to convert notification rows")
}
