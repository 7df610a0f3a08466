use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};
use mizan_primitives::{Amount, Quantity};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{
    ledger::{newest_first, non_negative, optional_text, too_large},
    Books, BooksError, ChangeSet, Committed, DateRange, EntityKind, Notification,
    NotificationKind, PartyKind, Payment, PaymentMethod, Record, RecordKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Sale,
}

impl TransactionKind {
    pub fn party_kind(self) -> PartyKind {
        match self {
            Self::Purchase => PartyKind::Supplier,
            Self::Sale => PartyKind::Client,
        }
    }

    /// Prefix of the human-readable reference, e.g. `SAL-000042`.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Purchase => "PUR",
            Self::Sale => "SAL",
        }
    }

    /// Payments on this kind of transaction raise this notification.
    pub fn payment_notification(self) -> NotificationKind {
        match self {
            Self::Purchase => NotificationKind::PaymentMade,
            Self::Sale => NotificationKind::PaymentReceived,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Purchase => "purchase",
            Self::Sale => "sale",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentStatus {
    pub fn derive(total: Amount, amount_paid: Amount) -> Self {
        if total - amount_paid <= Amount::ZERO {
            Self::Paid
        } else if amount_paid.is_zero() {
            Self::Unpaid
        } else {
            Self::Partial
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Paid => "paid",
            Self::Partial => "partial",
            Self::Unpaid => "unpaid",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub product_id: Uuid,
    /// Product name at the time of the transaction.
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Amount,
    /// Cost price at the time of the transaction, used for profit.
    pub unit_cost: Amount,
    pub total: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub reference: String,
    pub kind: TransactionKind,
    pub party_id: Option<Uuid>,
    pub items: Vec<TransactionItem>,
    pub subtotal: Amount,
    pub discount: Amount,
    pub total: Amount,
    pub amount_paid: Amount,
    pub remaining_amount: Amount,
    pub status: PaymentStatus,
    pub note: Option<String>,
    pub date: DateTime<Utc>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Sequence number encoded in the reference, `SAL-000042` → `42`.
    pub fn sequence(&self) -> Option<u64> {
        self.reference.rsplit_once('-')?.1.parse().ok()
    }

    /// Set `amount_paid` and keep `remaining_amount` and `status` in step.
    pub(crate) fn set_paid(&mut self, amount_paid: Amount) {
        self.amount_paid = amount_paid;
        self.remaining_amount = self.total - amount_paid;
        self.status = PaymentStatus::derive(self.total, amount_paid);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransactionItem {
    pub product_id: Uuid,
    pub quantity: Quantity,
    /// Defaults to the product's sale price for sales and cost price for
    /// purchases.
    #[serde(default)]
    pub unit_price: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    #[serde(default)]
    pub party_id: Option<Uuid>,
    pub items: Vec<NewTransactionItem>,
    #[serde(default)]
    pub discount: Amount,
    /// Paid up front; recorded as the transaction's first payment.
    #[serde(default)]
    pub amount_paid: Amount,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub created_by: Option<String>,
}

impl NewTransaction {
    pub fn sale() -> Self {
        Self::of_kind(TransactionKind::Sale)
    }

    pub fn purchase() -> Self {
        Self::of_kind(TransactionKind::Purchase)
    }

    fn of_kind(kind: TransactionKind) -> Self {
        Self {
            kind,
            party_id: None,
            items: Vec::new(),
            discount: Amount::ZERO,
            amount_paid: Amount::ZERO,
            payment_method: PaymentMethod::default(),
            note: None,
            date: None,
            created_by: None,
        }
    }
}

/// Proof that a [`NewTransaction`] passed every check against the books it
/// was prepared on: parties and products exist, stock suffices, amounts
/// are in range. Consumed by [`Books::post_transaction`], which is
/// infallible.
#[derive(Debug)]
pub struct ValidatedTransaction {
    pub(crate) tx: Transaction,
    pub(crate) payment_method: PaymentMethod,
}

impl ValidatedTransaction {
    pub fn id(&self) -> Uuid {
        self.tx.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.tx.kind
    }

    pub fn item_count(&self) -> usize {
        self.tx.items.len()
    }

    pub fn total(&self) -> Amount {
        self.tx.total
    }
}

/// Fields of a posted transaction that may still change. Items are fixed
/// once stock has moved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub discount: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub party_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    fn matches(&self, tx: &Transaction) -> bool {
        self.kind.is_none_or(|k| tx.kind == k)
            && self.party_id.is_none_or(|p| tx.party_id == Some(p))
            && self.status.is_none_or(|s| tx.status == s)
            && DateRange::new(self.from, self.to).contains(tx.date)
    }
}

impl Books {
    pub fn transaction(&self, id: Uuid) -> Result<&Transaction, BooksError> {
        self.transactions
            .get(&id)
            .ok_or(BooksError::not_found(EntityKind::Transaction, id))
    }

    /// Transactions matching `filter`, newest first.
    pub fn transactions(&self, filter: &TransactionFilter) -> Vec<&Transaction> {
        let mut list: Vec<_> = self
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .collect();
        newest_first(&mut list, |tx| (tx.date, tx.id));
        list
    }

    /// Validate a new purchase or sale against the current books.
    ///
    /// Nothing is mutated; the returned [`ValidatedTransaction`] is posted
    /// with [`Self::post_transaction`].
    #[instrument(skip_all, fields(kind = %new.kind, item_count = new.items.len()))]
    pub fn prepare_transaction(
        &self,
        new: NewTransaction,
    ) -> Result<ValidatedTransaction, BooksError> {
        if new.items.is_empty() {
            return Err(BooksError::EmptyTransaction);
        }
        if let Some(party_id) = new.party_id {
            self.party_of_kind(party_id, new.kind.party_kind())?;
        }

        let mut seen = HashSet::with_capacity(new.items.len());
        let mut items = Vec::with_capacity(new.items.len());
        for item in new.items {
            if !seen.insert(item.product_id) {
                return Err(BooksError::DuplicateItem(item.product_id));
            }
            let product = self.product(item.product_id)?;
            if !item.quantity.is_positive() {
                return Err(BooksError::invalid("quantity", "must be positive"));
            }
            let default_price = match new.kind {
                TransactionKind::Sale => product.sale_price,
                TransactionKind::Purchase => product.cost_price,
            };
            let unit_price = non_negative(
                "unit_price",
                self.money(item.unit_price.unwrap_or(default_price)),
            )?;
            if new.kind == TransactionKind::Sale && item.quantity > product.quantity {
                return Err(BooksError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.quantity,
                    requested: item.quantity,
                });
            }
            if new.kind == TransactionKind::Purchase
                && product.quantity.checked_add(item.quantity).is_none()
            {
                return Err(too_large("quantity"));
            }
            let unit_cost = match new.kind {
                TransactionKind::Sale => product.cost_price,
                TransactionKind::Purchase => unit_price,
            };
            let total = unit_price
                .checked_mul(item.quantity)
                .ok_or_else(|| too_large("amount"))?;
            items.push(TransactionItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: item.quantity,
                unit_price,
                unit_cost,
                total: self.money(total),
            });
        }

        let subtotal = items
            .iter()
            .try_fold(Amount::ZERO, |acc, i| acc.checked_add(i.total))
            .ok_or_else(|| too_large("amount"))?;
        let discount = non_negative("discount", self.money(new.discount))?;
        if discount > subtotal {
            return Err(BooksError::invalid("discount", "must not exceed the subtotal"));
        }
        let total = subtotal - discount;
        let amount_paid = non_negative("amount_paid", self.money(new.amount_paid))?;
        if amount_paid > total {
            return Err(BooksError::Overpayment {
                amount: amount_paid,
                remaining: total,
            });
        }
        // The party's running totals must still fit once this is posted.
        let party = new.party_id.and_then(|id| self.parties.get(&id));
        if party.is_some_and(|p| p.total_due.checked_add(total).is_none()) {
            return Err(too_large("amount"));
        }

        let now = Utc::now();
        Ok(ValidatedTransaction {
            tx: Transaction {
                id: Uuid::new_v4(),
                reference: String::new(),
                kind: new.kind,
                party_id: new.party_id,
                items,
                subtotal,
                discount,
                total,
                amount_paid,
                remaining_amount: total - amount_paid,
                status: PaymentStatus::derive(total, amount_paid),
                note: optional_text(new.note),
                date: new.date.unwrap_or(now),
                created_by: optional_text(new.created_by),
                created_at: now,
                updated_at: now,
            },
            payment_method: new.payment_method,
        })
    }

    /// Post a validated transaction: assign its reference, move stock,
    /// record the up-front payment and refresh the party's balance.
    ///
    /// Infallible: the token guarantees every referenced record exists and
    /// every sale line is covered by stock.
    #[instrument(skip_all, fields(transaction_id = %validated.id(), kind = %validated.kind()))]
    pub fn post_transaction(&mut self, validated: ValidatedTransaction) -> Committed<Transaction> {
        let ValidatedTransaction {
            mut tx,
            payment_method,
        } = validated;
        let seq = match tx.kind {
            TransactionKind::Sale => {
                self.sale_seq += 1;
                self.sale_seq
            }
            TransactionKind::Purchase => {
                self.purchase_seq += 1;
                self.purchase_seq
            }
        };
        tx.reference = format!("{}-{seq:06}", tx.kind.prefix());

        let mut changes = ChangeSet::new();
        for item in &tx.items {
            match tx.kind {
                TransactionKind::Sale => {
                    self.move_stock(item.product_id, -item.quantity, &mut changes);
                }
                TransactionKind::Purchase => {
                    if let Some(product) = self.products.get_mut(&item.product_id) {
                        product.cost_price = item.unit_price;
                    }
                    self.move_stock(item.product_id, item.quantity, &mut changes);
                }
            }
        }

        self.transactions.insert(tx.id, tx.clone());
        changes.upsert(Record::Transaction(tx.clone()));

        if tx.amount_paid.is_positive() {
            let payment = Payment {
                id: Uuid::new_v4(),
                transaction_id: tx.id,
                amount: tx.amount_paid,
                method: payment_method,
                reference: None,
                note: None,
                paid_at: tx.date,
                created_by: tx.created_by.clone(),
                created_at: tx.created_at,
                updated_at: tx.created_at,
            };
            self.payments.insert(payment.id, payment.clone());
            changes.upsert(Record::Payment(payment));
            let notification = Notification::new(
                tx.kind.payment_notification(),
                Some(tx.id),
                tx.reference.clone(),
            )
            .with_amount(tx.amount_paid);
            self.raise(notification, &mut changes);
        }

        if let Some(party_id) = tx.party_id {
            self.refresh_party(party_id, &mut changes);
        }

        let notification = Notification::new(
            NotificationKind::TransactionCreated,
            Some(tx.id),
            tx.reference.clone(),
        )
        .with_amount(tx.total);
        self.raise(notification, &mut changes);

        tracing::info!(reference = %tx.reference, total = %tx.total, "transaction posted");
        Committed::new(tx, changes)
    }

    /// Edit the note, date or discount of a posted transaction. A discount
    /// change recomputes the total and may not push it below what has
    /// already been paid.
    #[instrument(skip_all, fields(transaction_id = %id))]
    pub fn update_transaction(
        &mut self,
        id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Committed<Transaction>, BooksError> {
        let current = self.transaction(id)?;
        let discount = match patch.discount {
            Some(d) => non_negative("discount", self.money(d))?,
            None => current.discount,
        };
        if discount > current.subtotal {
            return Err(BooksError::invalid("discount", "must not exceed the subtotal"));
        }
        let total = current.subtotal - discount;
        if total < current.amount_paid {
            return Err(BooksError::TotalBelowPaid {
                total,
                paid: current.amount_paid,
            });
        }

        let Some(tx) = self.transactions.get_mut(&id) else {
            return Err(BooksError::not_found(EntityKind::Transaction, id));
        };
        if let Some(note) = patch.note {
            tx.note = optional_text(Some(note));
        }
        if let Some(date) = patch.date {
            tx.date = date;
        }
        tx.discount = discount;
        tx.total = total;
        tx.set_paid(tx.amount_paid);
        let tx = tx.clone();

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Transaction(tx.clone()));
        if let Some(party_id) = tx.party_id {
            self.refresh_party(party_id, &mut changes);
        }
        Ok(Committed::new(tx, changes))
    }

    /// Delete a transaction, reversing its stock movement, removing its
    /// payments and reversing the party's totals.
    ///
    /// Deleting a purchase fails with [`BooksError::InsufficientStock`] when
    /// the purchased stock has since been sold.
    #[instrument(skip_all, fields(transaction_id = %id))]
    pub fn delete_transaction(&mut self, id: Uuid) -> Result<Committed<Transaction>, BooksError> {
        let tx = self.transaction(id)?;
        if tx.kind == TransactionKind::Purchase {
            for item in &tx.items {
                let product = self.product(item.product_id)?;
                if item.quantity > product.quantity {
                    return Err(BooksError::InsufficientStock {
                        product: product.name.clone(),
                        available: product.quantity,
                        requested: item.quantity,
                    });
                }
            }
        }

        let Some(tx) = self.transactions.remove(&id) else {
            return Err(BooksError::not_found(EntityKind::Transaction, id));
        };
        let mut changes = ChangeSet::new();
        for item in &tx.items {
            let delta = match tx.kind {
                TransactionKind::Sale => item.quantity,
                TransactionKind::Purchase => -item.quantity,
            };
            self.move_stock(item.product_id, delta, &mut changes);
        }

        let payment_ids: Vec<Uuid> = self
            .payments
            .values()
            .filter(|p| p.transaction_id == id)
            .map(|p| p.id)
            .collect();
        for payment_id in payment_ids {
            self.payments.remove(&payment_id);
            changes.delete(RecordKey::Payment(payment_id));
        }
        changes.delete(RecordKey::Transaction(id));

        if let Some(party_id) = tx.party_id {
            self.refresh_party(party_id, &mut changes);
        }
        tracing::info!(reference = %tx.reference, "transaction deleted");
        Ok(Committed::new(tx, changes))
    }

    /// Shift a transaction's paid amount by `delta` and refresh its party.
    /// Callers have already checked the result stays within `[0, total]`.
    pub(crate) fn shift_paid(&mut self, id: Uuid, delta: Amount, changes: &mut ChangeSet) {
        let Some(tx) = self.transactions.get_mut(&id) else {
            return;
        };
        tx.set_paid(tx.amount_paid + delta);
        let party_id = tx.party_id;
        changes.upsert(Record::Transaction(tx.clone()));
        if let Some(party_id) = party_id {
            self.refresh_party(party_id, changes);
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use assert_matches::assert_matches;
    use mizan_primitives::Currency;
    use rust_decimal::dec;

    use super::*;
    use crate::books::{NewProduct, PartyDetails, ProductDetails};

    struct Shop {
        books: Books,
        client: Uuid,
        supplier: Uuid,
        tea: Uuid,
        sugar: Uuid,
    }

    fn shop() -> Result<Shop> {
        let mut books = Books::new(Currency::usd());
        let client = books
            .create_party(
                PartyKind::Client,
                PartyDetails {
                    name: "Nadia".into(),
                    ..PartyDetails::default()
                },
            )?
            .value
            .id;
        let supplier = books
            .create_party(
                PartyKind::Supplier,
                PartyDetails {
                    name: "Levant Traders".into(),
                    ..PartyDetails::default()
                },
            )?
            .value
            .id;
        let tea = books
            .create_product(NewProduct {
                details: ProductDetails {
                    name: "Black Tea 500g".into(),
                    cost_price: Amount::from(dec!(3)),
                    sale_price: Amount::from(dec!(5)),
                    min_quantity: Quantity::from(dec!(2)),
                    ..ProductDetails::default()
                },
                quantity: Quantity::from(dec!(10)),
            })?
            .value
            .id;
        let sugar = books
            .create_product(NewProduct {
                details: ProductDetails {
                    name: "Sugar 1kg".into(),
                    cost_price: Amount::from(dec!(1)),
                    sale_price: Amount::from(dec!(1.5)),
                    ..ProductDetails::default()
                },
                quantity: Quantity::from(dec!(4)),
            })?
            .value
            .id;
        Ok(Shop {
            books,
            client,
            supplier,
            tea,
            sugar,
        })
    }

    fn line(product_id: Uuid, quantity: rust_decimal::Decimal) -> NewTransactionItem {
        NewTransactionItem {
            product_id,
            quantity: Quantity::from(quantity),
            unit_price: None,
        }
    }

    #[test]
    fn test_payment_status_derive() {
        let hundred = Amount::from(dec!(100));
        assert_eq!(PaymentStatus::derive(hundred, hundred), PaymentStatus::Paid);
        assert_eq!(
            PaymentStatus::derive(hundred, Amount::from(dec!(40))),
            PaymentStatus::Partial
        );
        assert_eq!(PaymentStatus::derive(hundred, Amount::ZERO), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::derive(Amount::ZERO, Amount::ZERO), PaymentStatus::Paid);
    }

    #[test]
    fn test_transaction_kind_helpers() -> Result<()> {
        assert_eq!(TransactionKind::Sale.prefix(), "SAL");
        assert_eq!(TransactionKind::Purchase.party_kind(), PartyKind::Supplier);
        assert_eq!(serde_json::to_string(&TransactionKind::Purchase)?, r#""purchase""#);
        Ok(())
    }

    #[test]
    fn test_sale_posts_stock_party_and_payment() -> Result<()> {
        let Shop {
            mut books,
            client,
            tea,
            sugar,
            ..
        } = shop()?;

        let validated = books.prepare_transaction(NewTransaction {
            party_id: Some(client),
            items: vec![line(tea, dec!(8)), line(sugar, dec!(2))],
            discount: Amount::from(dec!(1)),
            amount_paid: Amount::from(dec!(10)),
            ..NewTransaction::sale()
        })?;
        assert_eq!(validated.total(), Amount::from(dec!(42)));
        let committed = books.post_transaction(validated);
        let tx = committed.value;

        assert_eq!(tx.reference, "SAL-000001");
        assert_eq!(tx.subtotal, Amount::from(dec!(43)));
        assert_eq!(tx.remaining_amount, Amount::from(dec!(32)));
        assert_eq!(tx.status, PaymentStatus::Partial);
        assert_eq!(tx.items[0].unit_cost, Amount::from(dec!(3)));
        assert_eq!(books.product(tea)?.quantity, Quantity::from(dec!(2)));
        assert_eq!(books.product(sugar)?.quantity, Quantity::from(dec!(2)));

        let party = books.party(PartyKind::Client, client)?;
        assert_eq!(party.total_due, Amount::from(dec!(42)));
        assert_eq!(party.amount_paid, Amount::from(dec!(10)));
        assert_eq!(party.balance, Amount::from(dec!(32)));

        let kinds: Vec<_> = committed.changes.notifications().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::LowStock,
                NotificationKind::PaymentReceived,
                NotificationKind::TransactionCreated
            ]
        );
        books.check_invariants()?;
        Ok(())
    }

    #[test]
    fn test_references_are_sequential_per_kind() -> Result<()> {
        let Shop {
            mut books, tea, ..
        } = shop()?;
        for expected in ["SAL-000001", "SAL-000002"] {
            let v = books.prepare_transaction(NewTransaction {
                items: vec![line(tea, dec!(1))],
                ..NewTransaction::sale()
            })?;
            assert_eq!(books.post_transaction(v).value.reference, expected);
        }
        let v = books.prepare_transaction(NewTransaction {
            items: vec![line(tea, dec!(1))],
            ..NewTransaction::purchase()
        })?;
        let purchase = books.post_transaction(v).value;
        assert_eq!(purchase.reference, "PUR-000001");
        assert_eq!(purchase.sequence(), Some(1));
        Ok(())
    }

    #[test]
    fn test_prepare_rejections_leave_books_untouched() -> Result<()> {
        let Shop {
            books,
            client,
            supplier,
            tea,
            ..
        } = shop()?;
        let before = books.snapshot();

        assert_matches!(
            books.prepare_transaction(NewTransaction::sale()),
            Err(BooksError::EmptyTransaction)
        );
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                items: vec![line(tea, dec!(1)), line(tea, dec!(2))],
                ..NewTransaction::sale()
            }),
            Err(BooksError::DuplicateItem(id)) if id == tea
        );
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                items: vec![line(tea, dec!(11))],
                ..NewTransaction::sale()
            }),
            Err(BooksError::InsufficientStock { .. })
        );
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                party_id: Some(supplier),
                items: vec![line(tea, dec!(1))],
                ..NewTransaction::sale()
            }),
            Err(BooksError::PartyKindMismatch { .. })
        );
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                party_id: Some(client),
                items: vec![line(tea, dec!(1))],
                amount_paid: Amount::from(dec!(6)),
                ..NewTransaction::sale()
            }),
            Err(BooksError::Overpayment { .. })
        );
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                items: vec![line(tea, dec!(1))],
                discount: Amount::from(dec!(6)),
                ..NewTransaction::sale()
            }),
            Err(BooksError::InvalidField { field: "discount", .. })
        );
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                items: vec![line(tea, dec!(0))],
                ..NewTransaction::sale()
            }),
            Err(BooksError::InvalidField { field: "quantity", .. })
        );

        assert_eq!(books.snapshot(), before);
        Ok(())
    }

    #[test]
    fn test_prepare_rejects_totals_beyond_decimal_range() -> Result<()> {
        let Shop {
            mut books,
            supplier,
            tea,
            ..
        } = shop()?;
        let saffron = books
            .create_product(NewProduct {
                details: ProductDetails {
                    name: "Saffron 1g".into(),
                    cost_price: Amount::from(dec!(1)),
                    sale_price: Amount::from(dec!(50000000000000000000000000000)),
                    ..ProductDetails::default()
                },
                quantity: Quantity::from(rust_decimal::Decimal::MAX),
            })?
            .value
            .id;
        let before = books.snapshot();

        assert_matches!(
            books.prepare_transaction(NewTransaction {
                items: vec![line(saffron, dec!(2))],
                ..NewTransaction::sale()
            }),
            Err(BooksError::InvalidField { field: "amount", reason: "too large" })
        );
        let half = Amount::from(dec!(40000000000000000000000000000));
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                items: vec![
                    NewTransactionItem {
                        unit_price: Some(half),
                        ..line(saffron, dec!(1))
                    },
                    NewTransactionItem {
                        unit_price: Some(half),
                        ..line(tea, dec!(1))
                    },
                ],
                ..NewTransaction::sale()
            }),
            Err(BooksError::InvalidField { field: "amount", .. })
        );
        assert_matches!(
            books.prepare_transaction(NewTransaction {
                party_id: Some(supplier),
                items: vec![line(saffron, dec!(1))],
                ..NewTransaction::purchase()
            }),
            Err(BooksError::InvalidField { field: "quantity", reason: "too large" })
        );

        assert_eq!(books.snapshot(), before);
        Ok(())
    }

    #[test]
    fn test_purchase_restocks_and_updates_cost() -> Result<()> {
        let Shop {
            mut books,
            supplier,
            sugar,
            ..
        } = shop()?;
        let v = books.prepare_transaction(NewTransaction {
            party_id: Some(supplier),
            items: vec![NewTransactionItem {
                product_id: sugar,
                quantity: Quantity::from(dec!(20)),
                unit_price: Some(Amount::from(dec!(0.9))),
            }],
            ..NewTransaction::purchase()
        })?;
        let tx = books.post_transaction(v).value;

        let product = books.product(sugar)?;
        assert_eq!(product.quantity, Quantity::from(dec!(24)));
        assert_eq!(product.cost_price, Amount::from(dec!(0.9)));
        assert_eq!(tx.status, PaymentStatus::Unpaid);
        assert_eq!(
            books.party(PartyKind::Supplier, supplier)?.balance,
            Amount::from(dec!(18))
        );
        Ok(())
    }

    #[test]
    fn test_update_discount_recomputes_and_guards_paid() -> Result<()> {
        let Shop {
            mut books,
            client,
            tea,
            ..
        } = shop()?;
        let v = books.prepare_transaction(NewTransaction {
            party_id: Some(client),
            items: vec![line(tea, dec!(4))],
            amount_paid: Amount::from(dec!(15)),
            ..NewTransaction::sale()
        })?;
        let id = books.post_transaction(v).value.id;

        let updated = books.update_transaction(
            id,
            TransactionPatch {
                discount: Some(Amount::from(dec!(5))),
                note: Some("loyalty discount".into()),
                ..TransactionPatch::default()
            },
        )?;
        assert_eq!(updated.value.total, Amount::from(dec!(15)));
        assert_eq!(updated.value.status, PaymentStatus::Paid);
        assert_eq!(
            books.party(PartyKind::Client, client)?.balance,
            Amount::ZERO
        );

        assert_matches!(
            books.update_transaction(
                id,
                TransactionPatch {
                    discount: Some(Amount::from(dec!(6))),
                    ..TransactionPatch::default()
                },
            ),
            Err(BooksError::TotalBelowPaid { .. })
        );
        books.check_invariants()?;
        Ok(())
    }

    #[test]
    fn test_delete_sale_restores_stock_and_balances() -> Result<()> {
        let Shop {
            mut books,
            client,
            tea,
            ..
        } = shop()?;
        let v = books.prepare_transaction(NewTransaction {
            party_id: Some(client),
            items: vec![line(tea, dec!(2))],
            amount_paid: Amount::from(dec!(4)),
            ..NewTransaction::sale()
        })?;
        let id = books.post_transaction(v).value.id;

        let deleted = books.delete_transaction(id)?;
        assert!(deleted.changes.deletes().contains(&RecordKey::Transaction(id)));
        assert_eq!(books.product(tea)?.quantity, Quantity::from(dec!(10)));
        assert!(books.payments.is_empty());
        let party = books.party(PartyKind::Client, client)?;
        assert_eq!(party.total_due, Amount::ZERO);
        assert_eq!(party.amount_paid, Amount::ZERO);
        books.check_invariants()?;
        Ok(())
    }

    #[test]
    fn test_delete_purchase_fails_when_stock_was_sold() -> Result<()> {
        let Shop {
            mut books, sugar, ..
        } = shop()?;
        let v = books.prepare_transaction(NewTransaction {
            items: vec![line(sugar, dec!(5))],
            ..NewTransaction::purchase()
        })?;
        let purchase = books.post_transaction(v).value.id;
        let v = books.prepare_transaction(NewTransaction {
            items: vec![line(sugar, dec!(8))],
            ..NewTransaction::sale()
        })?;
        books.post_transaction(v);

        assert_matches!(
            books.delete_transaction(purchase),
            Err(BooksError::InsufficientStock { .. })
        );
        assert_eq!(books.product(sugar)?.quantity, Quantity::from(dec!(1)));
        Ok(())
    }

    #[test]
    fn test_transactions_filter() -> Result<()> {
        let Shop {
            mut books,
            client,
            tea,
            ..
        } = shop()?;
        for party in [Some(client), None] {
            let v = books.prepare_transaction(NewTransaction {
                party_id: party,
                items: vec![line(tea, dec!(1))],
                ..NewTransaction::sale()
            })?;
            books.post_transaction(v);
        }
        let by_party = books.transactions(&TransactionFilter {
            party_id: Some(client),
            ..TransactionFilter::default()
        });
        assert_eq!(by_party.len(), 1);
        let purchases = books.transactions(&TransactionFilter {
            kind: Some(TransactionKind::Purchase),
            ..TransactionFilter::default()
        });
        assert!(purchases.is_empty());
        let unpaid = books.transactions(&TransactionFilter {
            status: Some(PaymentStatus::Unpaid),
            ..TransactionFilter::default()
        });
        assert_eq!(unpaid.len(), 2);
        Ok(())
    }
}
