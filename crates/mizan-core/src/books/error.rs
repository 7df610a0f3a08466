use std::fmt;

use mizan_primitives::{Amount, Quantity};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::books::PartyKind;

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Product,
    Client,
    Supplier,
    Transaction,
    Payment,
    Expense,
    Notification,
}

impl From<PartyKind> for EntityKind {
    fn from(kind: PartyKind) -> Self {
        match kind {
            PartyKind::Client => Self::Client,
            PartyKind::Supplier => Self::Supplier,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Category => "Category",
            Self::Product => "Product",
            Self::Client => "Client",
            Self::Supplier => "Supplier",
            Self::Transaction => "Transaction",
            Self::Payment => "Payment",
            Self::Expense => "Expense",
            Self::Notification => "Notification",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BooksError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("Invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("{entity} already exists: {value}")]
    Duplicate { entity: EntityKind, value: String },

    #[error("{entity} {id} is still referenced by other records")]
    InUse { entity: EntityKind, id: Uuid },

    #[error("Party Kind Mismatch: expected {expected}, found {found}")]
    PartyKindMismatch {
        expected: PartyKind,
        found: PartyKind,
    },

    #[error("Transaction must contain at least one item")]
    EmptyTransaction,

    #[error("Product {0} appears more than once in the transaction")]
    DuplicateItem(Uuid),

    #[error("Insufficient Stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: Quantity,
        requested: Quantity,
    },

    #[error("Overpayment: amount {amount} exceeds remaining {remaining}")]
    Overpayment { amount: Amount, remaining: Amount },

    #[error("Total Below Paid: total {total} would fall below amount paid {paid}")]
    TotalBelowPaid { total: Amount, paid: Amount },

    #[error("Books Inconsistent: {0}")]
    Inconsistent(String),
}

impl BooksError {
    pub(crate) fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidField { field, reason }
    }
}
