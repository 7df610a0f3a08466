use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mizan_core::books::Payment;
use mizan_primitives::Amount;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::codec::{method_str, parse_method};

/// Row type mapping the `payments` table.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    transaction_id: Uuid,
    amount: Decimal,
    method: String,
    reference: Option<String>,
    note: Option<String>,
    paid_at: DateTime<Utc>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = anyhow::Error;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Payment {
            id: row.id,
            transaction_id: row.transaction_id,
            amount: Amount::from(row.amount),
            method: parse_method(&row.method)?,
            reference: row.reference,
            note: row.note,
            paid_at: row.paid_at,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[instrument(skip_all, fields(payment_id = %payment.id, transaction_id = %payment.transaction_id))]
pub async fn upsert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO payments (
            id, transaction_id, amount, method, reference, note,
            paid_at, created_by, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            amount = EXCLUDED.amount,
            method = EXCLUDED.method,
            reference = EXCLUDED.reference,
            note = EXCLUDED.note,
            paid_at = EXCLUDED.paid_at,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(payment.id)
    .bind(payment.transaction_id)
    .bind(Decimal::from(payment.amount))
    .bind(method_str(payment.method))
    .bind(&payment.reference)
    .bind(&payment.note)
    .bind(payment.paid_at)
    .bind(&payment.created_by)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to save payment {}", payment.id))?;
    Ok(())
}

pub async fn delete_payment(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM payments WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to delete payment {id}"))?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn load_payments(pool: &PgPool) -> Result<Vec<Payment>> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        r"
        SELECT id, transaction_id, amount, method, reference, note,
               paid_at, created_by, created_at, updated_at
        FROM payments
        ORDER BY paid_at ASC, created_at ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load payments")?;

    rows.into_iter()
        .map(Payment::try_from)
        .collect::<Result<Vec<_>>>()
        .context("failed to convert payment rows")
}
