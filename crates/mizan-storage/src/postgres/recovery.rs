use anyhow::{Context, Result};
use mizan_core::books::{Books, BooksSnapshot};
use mizan_primitives::Currency;
use sqlx::PgPool;
use tracing::{info, instrument};

use super::{catalog, expenses, notifications, parties, payments, transactions};

/// Load every table into a [`BooksSnapshot`].
#[instrument(skip(pool))]
pub async fn load_snapshot(pool: &PgPool) -> Result<BooksSnapshot> {
    Ok(BooksSnapshot {
        categories: catalog::load_categories(pool).await?,
        products: catalog::load_products(pool).await?,
        parties: parties::load_parties(pool).await?,
        transactions: transactions::load_transactions(pool).await?,
        payments: payments::load_payments(pool).await?,
        expenses: expenses::load_expenses(pool).await?,
        notifications: notifications::load_notifications(pool).await?,
    })
}

/// Rebuild [`Books`] from persisted state.
///
/// An empty database yields empty books. Restoring re-checks every balance
/// identity, so rows edited behind the service's back are refused here
/// rather than served.
#[instrument(skip(pool), fields(currency = %currency))]
pub async fn recover_books(pool: &PgPool, currency: Currency) -> Result<Books> {
    let snapshot = load_snapshot(pool)
        .await
        .context("failed to load records during recovery")?;

    let counts = (
        snapshot.products.len(),
        snapshot.parties.len(),
        snapshot.transactions.len(),
        snapshot.payments.len(),
    );

    let books =
        Books::restore(currency, snapshot).context("persisted records do not reconcile")?;

    info!(
        products = counts.0,
        parties = counts.1,
        transactions = counts.2,
        payments = counts.3,
        "Books recovered from database"
    );
    Ok(books)
}
