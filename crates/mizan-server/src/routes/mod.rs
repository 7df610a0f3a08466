pub mod catalog;
pub mod expenses;
pub mod health;
pub mod notifications;
pub mod parties;
pub mod payments;
pub mod reports;
pub mod transactions;
