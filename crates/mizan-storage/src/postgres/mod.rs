pub mod catalog;
pub(crate) mod codec;
pub mod expenses;
pub mod notifications;
pub mod parties;
pub mod payments;
pub mod recovery;
pub mod transactions;

use anyhow::{Context, Result};
use mizan_core::books::{ChangeSet, Record, RecordKey};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

/// Foreign-key order: a record is written after everything it references.
fn record_rank(record: &Record) -> u8 {
    key_rank(record.key())
}

fn key_rank(key: RecordKey) -> u8 {
    match key {
        RecordKey::Category(_) => 0,
        RecordKey::Party(_) => 1,
        RecordKey::Product(_) => 2,
        RecordKey::Transaction(_) => 3,
        RecordKey::Payment(_) => 4,
        RecordKey::Expense(_) => 5,
        RecordKey::Notification(_) => 6,
    }
}

/// Persist a change set atomically: either every upsert and delete lands or
/// none does. Upserts run parents first, deletes run children first.
#[instrument(skip_all, fields(upserts = changes.upserts().len(), deletes = changes.deletes().len()))]
pub async fn persist_changes(pool: &PgPool, changes: &ChangeSet) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }

    let mut db_tx = pool
        .begin()
        .await
        .context("failed to begin database transaction")?;

    let mut upserts: Vec<&Record> = changes.upserts().iter().collect();
    upserts.sort_by_key(|r| record_rank(r));
    for record in upserts {
        upsert(&mut *db_tx, record).await?;
    }

    let mut deletes: Vec<RecordKey> = changes.deletes().to_vec();
    deletes.sort_by_key(|k| std::cmp::Reverse(key_rank(*k)));
    for key in deletes {
        delete(&mut *db_tx, key).await?;
    }

    db_tx
        .commit()
        .await
        .context("failed to commit change set")?;
    Ok(())
}

async fn upsert(conn: &mut PgConnection, record: &Record) -> Result<()> {
    match record {
        Record::Category(c) => catalog::upsert_category(conn, c).await,
        Record::Product(p) => catalog::upsert_product(conn, p).await,
        Record::Party(p) => parties::upsert_party(conn, p).await,
        Record::Transaction(t) => transactions::upsert_transaction(conn, t).await,
        Record::Payment(p) => payments::upsert_payment(conn, p).await,
        Record::Expense(e) => expenses::upsert_expense(conn, e).await,
        Record::Notification(n) => notifications::upsert_notification(conn, n).await,
    }
}

async fn delete(conn: &mut PgConnection, key: RecordKey) -> Result<()> {
    match key {
        RecordKey::Category(id) => catalog::delete_category(conn, id).await,
        RecordKey::Product(id) => catalog::delete_product(conn, id).await,
        RecordKey::Party(id) => parties::delete_party(conn, id).await,
        RecordKey::Transaction(id) => transactions::delete_transaction(conn, id).await,
        RecordKey::Payment(id) => payments::delete_payment(conn, id).await,
        RecordKey::Expense(id) => expenses::delete_expense(conn, id).await,
        RecordKey::Notification(id) => notifications::delete_notification(conn, id).await,
    }
}
