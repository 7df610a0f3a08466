use std::time::Duration;

use anyhow::Result;
use mizan_core::books::ChangeSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::{event::StorageEvent, service::StorageService};

/// Run the storage background task. Receives change sets from the engine
/// and persists them to `PostgreSQL` in arrival order, batched by size and
/// time. Each change set is still its own database transaction.
///
/// A change set the database refuses is logged and dropped; the task keeps
/// draining and still acknowledges `Flush`. Exits when the channel is closed
/// (all senders dropped).
#[instrument(skip_all, fields(batch_size, flush_interval_ms))]
pub async fn run_storage_task(
    service: StorageService,
    mut rx: mpsc::Receiver<StorageEvent>,
    batch_size: usize,
    flush_interval_ms: u64,
) -> Result<()> {
    let batch_size = batch_size.max(1);
    let mut buffer: Vec<ChangeSet> = Vec::with_capacity(batch_size);
    let mut flush_timer = tokio::time::interval(Duration::from_millis(flush_interval_ms.max(1)));
    // The first tick completes immediately.
    flush_timer.tick().await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(StorageEvent::Changes { changes }) => {
                        buffer.push(changes);
                        if buffer.len() >= batch_size {
                            flush_buffer(&service, &mut buffer).await;
                        }
                    }
                    Some(StorageEvent::Flush { done }) => {
                        let failed = flush_buffer(&service, &mut buffer).await;
                        if failed > 0 {
                            warn!(failed, "flush acknowledged with dropped change sets");
                        }
                        let _ = done.send(());
                    }
                    None => {
                        // Channel closed: final flush.
                        flush_buffer(&service, &mut buffer).await;
                        break;
                    }
                }
            }
            _ = flush_timer.tick() => {
                if !buffer.is_empty() {
                    flush_buffer(&service, &mut buffer).await;
                }
            }
        }
    }

    info!("Storage task exiting");
    Ok(())
}

/// Persist and clear the buffer. Returns how many change sets were dropped.
async fn flush_buffer(service: &StorageService, buffer: &mut Vec<ChangeSet>) -> usize {
    if buffer.is_empty() {
        return 0;
    }
    debug!(change_sets = buffer.len(), "flushing to PostgreSQL");
    let mut failed = 0;
    for changes in buffer.drain(..) {
        if let Err(e) = service.persist(&changes).await {
            failed += 1;
            error!(
                error = %format!("{e:#}"),
                upserts = changes.upserts().len(),
                deletes = changes.deletes().len(),
                "failed to persist change set; skipping"
            );
        }
    }
    failed
}
