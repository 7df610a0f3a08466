use mizan_core::books::ChangeSet;

/// Bounded channel capacity between the engine and the storage task.
pub const STORAGE_CHANNEL_CAPACITY: usize = 256;

/// Events sent from the engine to the storage task.
#[derive(Debug)]
pub enum StorageEvent {
    /// Everything a single committed write changed.
    Changes { changes: ChangeSet },
    /// Persist everything buffered so far, then signal `done`.
    Flush {
        done: tokio::sync::oneshot::Sender<()>,
    },
}
