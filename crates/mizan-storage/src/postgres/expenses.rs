use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mizan_core::books::Expense;
use mizan_primitives::Amount;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::codec::parse_expense_category;

/// Row type mapping the `expenses` table.
#[derive(Debug, sqlx::FromRow)]
struct ExpenseRow {
    id: Uuid,
    title: String,
    amount: Decimal,
    category: String,
    note: Option<String>,
    date: DateTime<Utc>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExpenseRow> for Expense {
    type Error = anyhow::Error;

    fn try_from(row: ExpenseRow) -> Result<Self> {
        Ok(Expense {
            id: row.id,
            title: row.title,
            amount: Amount::from(row.amount),
            category: parse_expense_category(&row.category)?,
            note: row.note,
            date: row.date,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[instrument(skip_all, fields(expense_id = %expense.id, category = %expense.category))]
pub async fn upsert_expense(conn: &mut PgConnection, expense: &Expense) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO expenses (
            id, title, amount, category, note, date, created_by, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE SET
            title = EXCLUDED.title,
            amount = EXCLUDED.amount,
            category = EXCLUDED.category,
            note = EXCLUDED.note,
            date = EXCLUDED.date,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(expense.id)
    .bind(&expense.title)
    .bind(Decimal::from(expense.amount))
    .bind(expense.category.as_str())
    .bind(&expense.note)
    .bind(expense.date)
    .bind(&expense.created_by)
    .bind(expense.created_at)
    .bind(expense.updated_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to save expense {}", expense.id))?;
    Ok(())
}

pub async fn delete_expense(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM expenses WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to delete expense {id}"))?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn load_expenses(pool: &PgPool) -> Result<Vec<Expense>> {
    let rows = sqlx::query_as::<_, ExpenseRow>(
        r"
        SELECT id, title, amount, category, note, date, created_by, created_at, updated_at
        FROM expenses
        ORDER BY date ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load expenses")?;

    rows.into_iter()
        .map(Expense::try_from)
        .collect::<Result<Vec<_>>>()
        .context("failed to convert expense rows")
}
