//! `PostgreSQL` persistence for mizan.
//!
//! The engine applies writes to the in-memory books and forwards each
//! write's [`ChangeSet`](mizan_core::books::ChangeSet) here. The storage task
//! persists every change set inside one database transaction, and recovery
//! loads the tables back into a verified [`Books`](mizan_core::books::Books).

pub mod config;
pub mod event;
pub mod postgres;
pub mod service;
pub mod task;
