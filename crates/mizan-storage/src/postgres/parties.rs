use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mizan_core::books::Party;
use mizan_primitives::Amount;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::codec::{parse_party_kind, party_kind_str};

/// Row type mapping the `parties` table.
#[derive(Debug, sqlx::FromRow)]
struct PartyRow {
    id: Uuid,
    kind: String,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    note: Option<String>,
    total_due: Decimal,
    amount_paid: Decimal,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PartyRow> for Party {
    type Error = anyhow::Error;

    fn try_from(row: PartyRow) -> Result<Self> {
        Ok(Party {
            id: row.id,
            kind: parse_party_kind(&row.kind)?,
            name: row.name,
            phone: row.phone,
            email: row.email,
            address: row.address,
            note: row.note,
            total_due: Amount::from(row.total_due),
            amount_paid: Amount::from(row.amount_paid),
            balance: Amount::from(row.balance),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[instrument(skip_all, fields(party_id = %party.id, kind = %party.kind))]
pub async fn upsert_party(conn: &mut PgConnection, party: &Party) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO parties (
            id, kind, name, phone, email, address, note,
            total_due, amount_paid, balance, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            phone = EXCLUDED.phone,
            email = EXCLUDED.email,
            address = EXCLUDED.address,
            note = EXCLUDED.note,
            total_due = EXCLUDED.total_due,
            amount_paid = EXCLUDED.amount_paid,
            balance = EXCLUDED.balance,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(party.id)
    .bind(party_kind_str(party.kind))
    .bind(&party.name)
    .bind(&party.phone)
    .bind(&party.email)
    .bind(&party.address)
    .bind(&party.note)
    .bind(Decimal::from(party.total_due))
    .bind(Decimal::from(party.amount_paid))
    .bind(Decimal::from(party.balance))
    .bind(party.created_at)
    .bind(party.updated_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to save party {}", party.id))?;
    Ok(())
}

pub async fn delete_party(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM parties WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to delete party {id}"))?;
    Ok(())
}

/// Load clients and suppliers, ordered by `created_at`.
#[instrument(skip(pool))]
pub async fn load_parties(pool: &PgPool) -> Result<Vec<Party>> {
    let rows = sqlx::query_as::<_, PartyRow>(
        r"
        SELECT id, kind, name, phone, email, address, note,
               total_due, amount_paid, balance, created_at, updated_at
        FROM parties
        ORDER BY created_at ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load parties")?;

    rows.into_iter()
        .map(Party::try_from)
        .collect::<Result<Vec<_>>>()
        .context("failed to convert party rows")
}
