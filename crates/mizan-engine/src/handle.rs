//! A cloneable handle to the shop's books.
//!
//! `BooksHandle` owns the only path that mutates [`Books`]: every write runs
//! under the write lock, and its change set is forwarded to the storage task
//! before the lock is released so `PostgreSQL` sees writes in commit order.
//! All fields are `Arc`, `mpsc::Sender` or `broadcast::Sender`, so cloning
//! is cheap.

use std::sync::Arc;

use anyhow::{Context, Result};
use mizan_core::books::{
    Books, BooksError, ChangeSet, Committed, NewPayment, NewTransaction, Notification, Payment,
    Transaction,
};
use mizan_primitives::Currency;
use mizan_storage::event::StorageEvent;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tracing::{debug, error, info, instrument};

use crate::NOTIFICATION_BROADCAST_CAPACITY;

/// Thread-safe, cheaply cloneable handle to the books.
#[derive(Clone)]
pub struct BooksHandle {
    books: Arc<RwLock<Books>>,
    storage_tx: Option<mpsc::Sender<StorageEvent>>,
    notify_tx: broadcast::Sender<Notification>,
}

impl BooksHandle {
    /// Wrap books that live only in memory.
    pub fn new(books: Books) -> Self {
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_BROADCAST_CAPACITY);
        Self {
            books: Arc::new(RwLock::new(books)),
            storage_tx: None,
            notify_tx,
        }
    }

    /// Wrap books whose writes are persisted through `storage_tx`.
    pub fn with_storage(books: Books, storage_tx: mpsc::Sender<StorageEvent>) -> Self {
        let mut handle = Self::new(books);
        handle.storage_tx = Some(storage_tx);
        handle
    }

    pub fn is_persistent(&self) -> bool {
        self.storage_tx.is_some()
    }

    pub async fn currency(&self) -> Currency {
        self.books.read().await.currency()
    }

    /// Subscribe to notifications as they are raised.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    /// Run a read-only query against a consistent view of the books.
    pub async fn read<R>(&self, f: impl FnOnce(&Books) -> R) -> R {
        let books = self.books.read().await;
        f(&books)
    }

    /// Apply a write. On success its change set is queued for storage and
    /// any notifications it raised are broadcast; on error nothing changed.
    #[instrument(name = "write", skip(self, f))]
    pub async fn write<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Books) -> Result<Committed<T>, BooksError>,
    ) -> Result<T, BooksError> {
        let mut books = self.books.write().await;
        let committed = match f(&mut books) {
            Ok(committed) => committed,
            Err(e) => {
                debug!(error = %e, "write rejected");
                return Err(e);
            }
        };
        let Committed { value, changes } = committed;
        debug!(changes = changes.len(), "write committed");

        self.broadcast(&changes);
        self.persist(changes).await;
        drop(books);
        Ok(value)
    }

    /// Validate and post a sale or purchase.
    #[instrument(skip(self, new), fields(kind = %new.kind, items = new.items.len()))]
    pub async fn record_transaction(&self, new: NewTransaction) -> Result<Transaction, BooksError> {
        self.write("record_transaction", |books| {
            let validated = books.prepare_transaction(new)?;
            Ok(books.post_transaction(validated))
        })
        .await
    }

    /// Validate and apply a payment against a transaction.
    #[instrument(skip(self, new), fields(transaction_id = %new.transaction_id, amount = %new.amount))]
    pub async fn record_payment(&self, new: NewPayment) -> Result<Payment, BooksError> {
        self.write("record_payment", |books| {
            let validated = books.prepare_payment(new)?;
            Ok(books.post_payment(validated))
        })
        .await
    }

    /// Wait until every queued change set has been written to storage.
    /// Returns immediately for in-memory books.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<()> {
        let Some(storage_tx) = &self.storage_tx else {
            return Ok(());
        };
        let (done_tx, done_rx) = oneshot::channel();
        storage_tx
            .send(StorageEvent::Flush { done: done_tx })
            .await
            .context("storage channel closed (flush)")?;
        done_rx
            .await
            .context("storage task dropped flush acknowledgment")?;
        info!("storage flushed");
        Ok(())
    }

    fn broadcast(&self, changes: &ChangeSet) {
        for notification in changes.notifications() {
            // send() fails only when there are zero receivers.
            let _ = self.notify_tx.send(notification.clone());
        }
    }

    async fn persist(&self, changes: ChangeSet) {
        let Some(storage_tx) = &self.storage_tx else {
            return;
        };
        if changes.is_empty() {
            return;
        }
        if let Err(e) = storage_tx.send(StorageEvent::Changes { changes }).await {
            error!(error = %e, "storage channel closed; change set not persisted");
        }
    }
}
