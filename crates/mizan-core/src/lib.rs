//! Domain model for the mizan inventory, sales and finance service.
//!
//! [`books::Books`] is the authoritative in-memory state. Every write is
//! validated before any record is touched and returns the full
//! [`books::ChangeSet`] it produced, so the caller can persist it as one
//! unit.

pub mod api;
pub mod books;
pub mod report;
