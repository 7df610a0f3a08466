use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mizan_primitives::{Amount, Currency};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{
    BooksError, Category, Expense, Notification, Party, Payment, PaymentStatus, Product,
    Transaction, TransactionKind,
};

/// A record created or updated by a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "snake_case")]
pub enum Record {
    Category(Category),
    Product(Product),
    Party(Party),
    Transaction(Transaction),
    Payment(Payment),
    Expense(Expense),
    Notification(Notification),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Self::Category(c) => RecordKey::Category(c.id),
            Self::Product(p) => RecordKey::Product(p.id),
            Self::Party(p) => RecordKey::Party(p.id),
            Self::Transaction(t) => RecordKey::Transaction(t.id),
            Self::Payment(p) => RecordKey::Payment(p.id),
            Self::Expense(e) => RecordKey::Expense(e.id),
            Self::Notification(n) => RecordKey::Notification(n.id),
        }
    }
}

/// Identity of a record removed by a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum RecordKey {
    Category(Uuid),
    Product(Uuid),
    Party(Uuid),
    Transaction(Uuid),
    Payment(Uuid),
    Expense(Uuid),
    Notification(Uuid),
}

/// Every record touched by a single write. Persisted as one database
/// transaction so storage never observes half of a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    upserts: Vec<Record>,
    deletes: Vec<RecordKey>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest state of a record. A later upsert of the same
    /// record replaces the earlier one.
    pub fn upsert(&mut self, record: Record) {
        let key = record.key();
        self.deletes.retain(|k| *k != key);
        if let Some(slot) = self.upserts.iter_mut().find(|r| r.key() == key) {
            *slot = record;
        } else {
            self.upserts.push(record);
        }
    }

    pub fn delete(&mut self, key: RecordKey) {
        self.upserts.retain(|r| r.key() != key);
        if !self.deletes.contains(&key) {
            self.deletes.push(key);
        }
    }

    pub fn upserts(&self) -> &[Record] {
        &self.upserts
    }

    pub fn deletes(&self) -> &[RecordKey] {
        &self.deletes
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    /// Notifications raised by the write, in the order they were raised.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.upserts.iter().filter_map(|r| match r {
            Record::Notification(n) => Some(n),
            _ => None,
        })
    }
}

/// The result of a successful write: the primary record plus everything the
/// write changed.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub value: T,
    pub changes: ChangeSet,
}

impl<T> Committed<T> {
    pub fn new(value: T, changes: ChangeSet) -> Self {
        Self { value, changes }
    }
}

/// Half-open date window `[from, to)`. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at < to)
    }
}

/// Flat copy of every record, used to persist and rebuild [`Books`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BooksSnapshot {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub parties: Vec<Party>,
    pub transactions: Vec<Transaction>,
    pub payments: Vec<Payment>,
    pub expenses: Vec<Expense>,
    pub notifications: Vec<Notification>,
}

/// The shop's books: catalog, parties, transactions, payments, expenses and
/// notifications, together with the rules that keep balances reconciled.
///
/// Writes follow one discipline: every check runs against `&self` first, and
/// only once all of them pass are records mutated. A returned error therefore
/// always means nothing changed.
#[derive(Debug, Clone)]
pub struct Books {
    pub(crate) currency: Currency,
    pub(crate) categories: HashMap<Uuid, Category>,
    pub(crate) products: HashMap<Uuid, Product>,
    pub(crate) parties: HashMap<Uuid, Party>,
    pub(crate) transactions: HashMap<Uuid, Transaction>,
    pub(crate) payments: HashMap<Uuid, Payment>,
    pub(crate) expenses: HashMap<Uuid, Expense>,
    pub(crate) notifications: HashMap<Uuid, Notification>,
    pub(crate) sale_seq: u64,
    pub(crate) purchase_seq: u64,
}

impl Books {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            categories: HashMap::new(),
            products: HashMap::new(),
            parties: HashMap::new(),
            transactions: HashMap::new(),
            payments: HashMap::new(),
            expenses: HashMap::new(),
            notifications: HashMap::new(),
            sale_seq: 0,
            purchase_seq: 0,
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Rebuild books from persisted records and verify that the restored
    /// state satisfies every balance invariant.
    #[instrument(skip_all, fields(currency = %currency))]
    pub fn restore(currency: Currency, snapshot: BooksSnapshot) -> Result<Self, BooksError> {
        let mut books = Self::new(currency);
        books.categories = snapshot
            .categories
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        books.products = snapshot.products.into_iter().map(|p| (p.id, p)).collect();
        books.parties = snapshot.parties.into_iter().map(|p| (p.id, p)).collect();
        books.transactions = snapshot
            .transactions
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        books.payments = snapshot.payments.into_iter().map(|p| (p.id, p)).collect();
        books.expenses = snapshot.expenses.into_iter().map(|e| (e.id, e)).collect();
        books.notifications = snapshot
            .notifications
            .into_iter()
            .map(|n| (n.id, n))
            .collect();

        for tx in books.transactions.values() {
            let seq = tx.sequence().unwrap_or(0);
            match tx.kind {
                TransactionKind::Sale => books.sale_seq = books.sale_seq.max(seq),
                TransactionKind::Purchase => books.purchase_seq = books.purchase_seq.max(seq),
            }
        }

        books.check_invariants()?;
        Ok(books)
    }

    pub fn snapshot(&self) -> BooksSnapshot {
        BooksSnapshot {
            categories: self.categories.values().cloned().collect(),
            products: self.products.values().cloned().collect(),
            parties: self.parties.values().cloned().collect(),
            transactions: self.transactions.values().cloned().collect(),
            payments: self.payments.values().cloned().collect(),
            expenses: self.expenses.values().cloned().collect(),
            notifications: self.notifications.values().cloned().collect(),
        }
    }

    /// Verify the reconciliation identities across the whole book:
    ///
    /// * `remaining = total - amount_paid` and `0 <= amount_paid <= total`
    /// * `Σ payments of a transaction = amount_paid`
    /// * `party.total_due = Σ total`, `party.amount_paid = Σ amount_paid`,
    ///   `party.balance = total_due - amount_paid`
    /// * every stock quantity is non-negative
    pub fn check_invariants(&self) -> Result<(), BooksError> {
        let mut paid_by_tx: HashMap<Uuid, Amount> = HashMap::with_capacity(self.transactions.len());
        for payment in self.payments.values() {
            if !self.transactions.contains_key(&payment.transaction_id) {
                return Err(BooksError::Inconsistent(format!(
                    "payment {} references missing transaction {}",
                    payment.id, payment.transaction_id
                )));
            }
            *paid_by_tx.entry(payment.transaction_id).or_default() += payment.amount;
        }

        let mut party_sums: HashMap<Uuid, (Amount, Amount)> = HashMap::new();
        for tx in self.transactions.values() {
            if tx.remaining_amount != tx.total - tx.amount_paid {
                return Err(BooksError::Inconsistent(format!(
                    "transaction {}: remaining {} != total {} - paid {}",
                    tx.reference, tx.remaining_amount, tx.total, tx.amount_paid
                )));
            }
            if tx.amount_paid.is_sign_negative() || tx.amount_paid > tx.total {
                return Err(BooksError::Inconsistent(format!(
                    "transaction {}: paid {} outside [0, {}]",
                    tx.reference, tx.amount_paid, tx.total
                )));
            }
            let paid = paid_by_tx.get(&tx.id).copied().unwrap_or_default();
            if paid != tx.amount_paid {
                return Err(BooksError::Inconsistent(format!(
                    "transaction {}: payments sum {} != paid {}",
                    tx.reference, paid, tx.amount_paid
                )));
            }
            if tx.status != PaymentStatus::derive(tx.total, tx.amount_paid) {
                return Err(BooksError::Inconsistent(format!(
                    "transaction {}: stale status {}",
                    tx.reference, tx.status
                )));
            }
            if let Some(party_id) = tx.party_id {
                let Some(party) = self.parties.get(&party_id) else {
                    return Err(BooksError::Inconsistent(format!(
                        "transaction {} references missing party {party_id}",
                        tx.reference
                    )));
                };
                if party.kind != tx.kind.party_kind() {
                    return Err(BooksError::Inconsistent(format!(
                        "transaction {} is a {} but party {} is a {}",
                        tx.reference, tx.kind, party.id, party.kind
                    )));
                }
                let sums = party_sums.entry(party_id).or_default();
                sums.0 += tx.total;
                sums.1 += tx.amount_paid;
            }
        }

        for party in self.parties.values() {
            let (due, paid) = party_sums.get(&party.id).copied().unwrap_or_default();
            if party.total_due != due || party.amount_paid != paid {
                return Err(BooksError::Inconsistent(format!(
                    "party {}: stored due/paid {}/{} != derived {due}/{paid}",
                    party.id, party.total_due, party.amount_paid
                )));
            }
            if party.balance != party.total_due - party.amount_paid {
                return Err(BooksError::Inconsistent(format!(
                    "party {}: balance {} != due {} - paid {}",
                    party.id, party.balance, party.total_due, party.amount_paid
                )));
            }
        }

        if let Some(p) = self.products.values().find(|p| p.quantity.is_sign_negative()) {
            return Err(BooksError::Inconsistent(format!(
                "product {} has negative stock {}",
                p.id, p.quantity
            )));
        }

        Ok(())
    }

    /// Round a monetary input to the books' currency.
    pub(crate) fn money(&self, amount: Amount) -> Amount {
        amount.round_to(self.currency)
    }
}

pub(crate) fn required_text(field: &'static str, value: &str) -> Result<String, BooksError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BooksError::invalid(field, "must not be blank"));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

pub(crate) fn too_large(field: &'static str) -> BooksError {
    BooksError::invalid(field, "too large")
}

pub(crate) fn non_negative(field: &'static str, amount: Amount) -> Result<Amount, BooksError> {
    if amount.is_sign_negative() {
        return Err(BooksError::invalid(field, "must not be negative"));
    }
    Ok(amount)
}

pub(crate) fn positive(field: &'static str, amount: Amount) -> Result<Amount, BooksError> {
    if !amount.is_positive() {
        return Err(BooksError::invalid(field, "must be positive"));
    }
    Ok(amount)
}

/// Sort newest first, breaking timestamp ties by id so listings are stable.
pub(crate) fn newest_first<T>(items: &mut [&T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::books::{Category, CategoryDetails, NotificationKind};

    fn category(name: &str) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            name: name.into(),
            name_ar: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_change_set_upsert_replaces_same_record() {
        let mut cat = category("Drinks");
        let mut changes = ChangeSet::new();
        changes.upsert(Record::Category(cat.clone()));
        cat.name = "Beverages".into();
        changes.upsert(Record::Category(cat.clone()));

        assert_eq!(changes.upserts().len(), 1);
        assert_eq!(changes.upserts()[0], Record::Category(cat));
    }

    #[test]
    fn test_change_set_delete_cancels_upsert() {
        let cat = category("Snacks");
        let mut changes = ChangeSet::new();
        changes.upsert(Record::Category(cat.clone()));
        changes.delete(RecordKey::Category(cat.id));
        changes.delete(RecordKey::Category(cat.id));

        assert!(changes.upserts().is_empty());
        assert_eq!(changes.deletes(), &[RecordKey::Category(cat.id)]);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_change_set_notifications_filter() {
        let mut changes = ChangeSet::new();
        changes.upsert(Record::Category(category("Tools")));
        changes.upsert(Record::Notification(Notification::new(
            NotificationKind::OutOfStock,
            None,
            "Hammer".into(),
        )));
        assert_eq!(changes.notifications().count(), 1);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_date_range_half_open() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single();
        let to = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).single();
        let range = DateRange::new(from, to);
        let (Some(from), Some(to)) = (from, to) else {
            unreachable!("fixed dates are valid");
        };

        assert!(range.contains(from));
        assert!(range.contains(to - Duration::seconds(1)));
        assert!(!range.contains(to));
        assert!(!range.contains(from - Duration::seconds(1)));
        assert!(DateRange::all().contains(to));
    }

    #[test]
    fn test_new_books_are_consistent() {
        let books = Books::new(Currency::sar());
        assert!(books.check_invariants().is_ok());
        assert_eq!(books.currency(), Currency::sar());
    }

    #[test]
    fn test_snapshot_restore_round_trip() -> Result<(), BooksError> {
        let mut books = Books::new(Currency::usd());
        books.create_category(CategoryDetails {
            name: "Dairy".into(),
            ..CategoryDetails::default()
        })?;

        let restored = Books::restore(Currency::usd(), books.snapshot())?;
        assert_eq!(restored.categories().len(), 1);
        Ok(())
    }

    #[test]
    fn test_required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("name", "  Milk ").ok(), Some("Milk".into()));
        assert!(required_text("name", "   ").is_err());
    }

    #[test]
    fn test_optional_text_drops_blank() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" x ".into())), Some("x".into()));
        assert_eq!(optional_text(None), None);
    }
}
