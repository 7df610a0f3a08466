pub mod handle;

use anyhow::{Context, Result};
use mizan_core::books::Books;
use mizan_primitives::Currency;
use mizan_storage::service::StorageService;
use tracing::{info, instrument};

pub use mizan_storage::event::STORAGE_CHANNEL_CAPACITY;

/// Capacity of the broadcast channel for raised notifications. Slow
/// consumers that fall behind this many messages receive a `Lagged` error
/// and skip to the latest.
pub const NOTIFICATION_BROADCAST_CAPACITY: usize = 256;

/// Build the books the server starts with: recovered from `PostgreSQL` when
/// storage is configured, empty otherwise.
#[instrument(skip(storage), fields(currency = %currency, persistent = storage.is_some()))]
pub async fn bootstrap_books(currency: Currency, storage: Option<&StorageService>) -> Result<Books> {
    let Some(storage) = storage else {
        info!("Starting with empty in-memory books");
        return Ok(Books::new(currency));
    };
    let books = storage
        .recover(currency)
        .await
        .context("failed to recover books from PostgreSQL")?;
    info!(unread = books.unread_count(), "Books bootstrapped");
    Ok(books)
}
