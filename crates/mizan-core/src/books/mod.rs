pub mod catalog;
pub mod error;
pub mod expense;
pub mod ledger;
pub mod notification;
pub mod party;
pub mod payment;
pub mod transaction;

pub use catalog::{
    Category, CategoryDetails, NewProduct, Product, ProductDetails, ProductFilter,
    StockAdjustment,
};
pub use error::{BooksError, EntityKind};
pub use expense::{Expense, ExpenseCategory, ExpenseDetails, ExpenseFilter};
pub use ledger::{Books, BooksSnapshot, ChangeSet, Committed, DateRange, Record, RecordKey};
pub use notification::{Notification, NotificationKind};
pub use party::{Party, PartyDetails, PartyKind, PartyStatement, StatementEntry, StatementLine};
pub use payment::{NewPayment, Payment, PaymentFilter, PaymentMethod, PaymentPatch, ValidatedPayment};
pub use transaction::{
    NewTransaction, NewTransactionItem, PaymentStatus, Transaction, TransactionFilter,
    TransactionItem, TransactionKind, TransactionPatch, ValidatedTransaction,
};
