use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mizan_core::books::{Transaction, TransactionItem};
use mizan_primitives::{Amount, Quantity};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::codec::{parse_status, parse_transaction_kind, status_str, transaction_kind_str};

/// Row type mapping the `transactions` table.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    reference: String,
    kind: String,
    party_id: Option<Uuid>,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    amount_paid: Decimal,
    remaining_amount: Decimal,
    status: String,
    note: Option<String>,
    date: DateTime<Utc>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row type mapping the `transaction_items` table.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    transaction_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: Decimal,
    unit_price: Decimal,
    unit_cost: Decimal,
    total: Decimal,
}

impl From<ItemRow> for TransactionItem {
    fn from(row: ItemRow) -> Self {
        TransactionItem {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: Quantity::from(row.quantity),
            unit_price: Amount::from(row.unit_price),
            unit_cost: Amount::from(row.unit_cost),
            total: Amount::from(row.total),
        }
    }
}

impl TransactionRow {
    fn into_transaction(self, items: Vec<TransactionItem>) -> Result<Transaction> {
        Ok(Transaction {
            id: self.id,
            reference: self.reference,
            kind: parse_transaction_kind(&self.kind)?,
            party_id: self.party_id,
            items,
            subtotal: Amount::from(self.subtotal),
            discount: Amount::from(self.discount),
            total: Amount::from(self.total),
            amount_paid: Amount::from(self.amount_paid),
            remaining_amount: Amount::from(self.remaining_amount),
            status: parse_status(&self.status)?,
            note: self.note,
            date: self.date,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Upsert a transaction header. Line items never change after posting, so
/// they are inserted once and skipped on later upserts.
#[instrument(skip_all, fields(transaction_id = %tx.id, reference = %tx.reference, item_count = tx.items.len()))]
pub async fn upsert_transaction(conn: &mut PgConnection, tx: &Transaction) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO transactions (
            id, reference, kind, party_id, subtotal, discount, total, amount_paid,
            remaining_amount, status, note, date, created_by, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (id) DO UPDATE SET
            discount = EXCLUDED.discount,
            total = EXCLUDED.total,
            amount_paid = EXCLUDED.amount_paid,
            remaining_amount = EXCLUDED.remaining_amount,
            status = EXCLUDED.status,
            note = EXCLUDED.note,
            date = EXCLUDED.date,
            updated_at = EXCLUDED.updated_at
        ",
    )
    .bind(tx.id)
    .bind(&tx.reference)
    .bind(transaction_kind_str(tx.kind))
    .bind(tx.party_id)
    .bind(Decimal::from(tx.subtotal))
    .bind(Decimal::from(tx.discount))
    .bind(Decimal::from(tx.total))
    .bind(Decimal::from(tx.amount_paid))
    .bind(Decimal::from(tx.remaining_amount))
    .bind(status_str(tx.status))
    .bind(&tx.note)
    .bind(tx.date)
    .bind(&tx.created_by)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to save transaction {}", tx.reference))?;

    for (position, item) in tx.items.iter().enumerate() {
        let position = i32::try_from(position).context("too many transaction items")?;
        sqlx::query(
            r"
            INSERT INTO transaction_items (
                transaction_id, position, product_id, product_name,
                quantity, unit_price, unit_cost, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (transaction_id, position) DO NOTHING
            ",
        )
        .bind(tx.id)
        .bind(position)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(Decimal::from(item.quantity))
        .bind(Decimal::from(item.unit_price))
        .bind(Decimal::from(item.unit_cost))
        .bind(Decimal::from(item.total))
        .execute(&mut *conn)
        .await
        .with_context(|| {
            format!(
                "failed to save item {} of transaction {}",
                item.product_id, tx.reference
            )
        })?;
    }

    Ok(())
}

/// Delete a transaction. Its items and payments go with it.
pub async fn delete_transaction(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM transactions WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to delete transaction {id}"))?;
    Ok(())
}

/// Load all transactions with their items, ordered by `date`.
/// Two queries, merged in a single pass.
#[instrument(skip(pool))]
pub async fn load_transactions(pool: &PgPool) -> Result<Vec<Transaction>> {
    let tx_rows = sqlx::query_as::<_, TransactionRow>(
        r"
        SELECT id, reference, kind, party_id, subtotal, discount, total, amount_paid,
               remaining_amount, status, note, date, created_by, created_at, updated_at
        FROM transactions
        ORDER BY date ASC, created_at ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load transactions")?;

    if tx_rows.is_empty() {
        return Ok(Vec::new());
    }

    let item_rows = sqlx::query_as::<_, ItemRow>(
        r"
        SELECT transaction_id, product_id, product_name, quantity, unit_price, unit_cost, total
        FROM transaction_items
        ORDER BY transaction_id, position ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("failed to load transaction items")?;

    // Items arrive ordered by (transaction_id, position), so pushing keeps
    // each transaction's lines in their original order.
    let mut items_by_tx: HashMap<Uuid, Vec<TransactionItem>> =
        HashMap::with_capacity(tx_rows.len());
    for row in item_rows {
        items_by_tx
            .entry(row.transaction_id)
            .or_default()
            .push(TransactionItem::from(row));
    }

    tx_rows
        .into_iter()
        .map(|row| {
            let items = items_by_tx.remove(&row.id).unwrap_or_default();
            row.into_transaction(items)
        })
        .collect::<Result<Vec<_>>>()
        .context("failed to convert transaction rows")
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use mizan_core::books::{PaymentStatus, TransactionKind};
    use rust_decimal::dec;

    use super::*;

    fn header(kind: &str, status: &str) -> TransactionRow {
        let now = Utc::now();
        TransactionRow {
            id: Uuid::new_v4(),
            reference: "SAL-000007".into(),
            kind: kind.into(),
            party_id: None,
            subtotal: dec!(100),
            discount: dec!(10),
            total: dec!(90),
            amount_paid: dec!(40),
            remaining_amount: dec!(50),
            status: status.into(),
            note: None,
            date: now,
            created_by: Some("cashier-1".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transaction_row_into_transaction() -> Result<()> {
        let item = TransactionItem::from(ItemRow {
            transaction_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Dates 1kg".into(),
            quantity: dec!(4),
            unit_price: dec!(25),
            unit_cost: dec!(18),
            total: dec!(100),
        });
        let tx = header("sale", "partial").into_transaction(vec![item])?;
        assert_eq!(tx.kind, TransactionKind::Sale);
        assert_eq!(tx.status, PaymentStatus::Partial);
        assert_eq!(tx.items.len(), 1);
        assert_eq!(tx.items[0].unit_cost, Amount::from(dec!(18)));
        assert_eq!(tx.remaining_amount, tx.total - tx.amount_paid);
        Ok(())
    }

    #[test]
    fn test_transaction_row_rejects_unknown_codes() {
        assert!(header("refund", "paid").into_transaction(Vec::new()).is_err());
        assert!(header("sale", "settled").into_transaction(Vec::new()).is_err());
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        /// Decimals that survive the `Amount` newtype unchanged.
        fn decimal_strategy() -> impl Strategy<Value = Decimal> {
            (any::<i64>(), 0u32..=28).prop_map(|(m, s)| Decimal::new(m, s))
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn proptest_decimal_amount_round_trip(d in decimal_strategy()) {
                prop_assert_eq!(Decimal::from(Amount::from(d)), d);
                prop_assert_eq!(Decimal::from(Quantity::from(d)), d);
            }
        }
    }
}
