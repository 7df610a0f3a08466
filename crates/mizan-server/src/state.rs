use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use mizan_engine::handle::BooksHandle;

use crate::auth::AuthConfig;

/// Shared state handed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub books: BooksHandle,
    pub auth: Arc<AuthConfig>,
    started_at: Instant,
    shutting_down: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(books: BooksHandle, auth: AuthConfig) -> Self {
        Self {
            books,
            auth: Arc::new(auth),
            started_at: Instant::now(),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Relaxed)
    }
}
