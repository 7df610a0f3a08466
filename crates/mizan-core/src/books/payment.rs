use chrono::{DateTime, Utc};
use mizan_primitives::Amount;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{
    ledger::{newest_first, optional_text, positive, too_large},
    Books, BooksError, ChangeSet, Committed, DateRange, EntityKind, Notification, Record,
    RecordKey,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    Cheque,
    Other,
}

/// An amount applied against a transaction's remaining balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Amount,
    pub method: PaymentMethod,
    /// External reference such as a cheque or transfer number.
    pub reference: Option<String>,
    pub note: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub transaction_id: Uuid,
    pub amount: Amount,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub created_by: Option<String>,
}

/// Proof that a payment is positive and fits within its transaction's
/// remaining amount. Consumed by [`Books::post_payment`], which is
/// infallible.
#[derive(Debug)]
pub struct ValidatedPayment(pub(crate) Payment);

impl ValidatedPayment {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn transaction_id(&self) -> Uuid {
        self.0.transaction_id
    }

    pub fn amount(&self) -> Amount {
        self.0.amount
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPatch {
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFilter {
    #[serde(default)]
    pub transaction_id: Option<Uuid>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl Books {
    pub fn payment(&self, id: Uuid) -> Result<&Payment, BooksError> {
        self.payments
            .get(&id)
            .ok_or(BooksError::not_found(EntityKind::Payment, id))
    }

    /// Payments matching `filter`, most recent first.
    pub fn payments(&self, filter: &PaymentFilter) -> Vec<&Payment> {
        let range = DateRange::new(filter.from, filter.to);
        let mut list: Vec<_> = self
            .payments
            .values()
            .filter(|p| filter.transaction_id.is_none_or(|id| p.transaction_id == id))
            .filter(|p| range.contains(p.paid_at))
            .collect();
        newest_first(&mut list, |p| (p.paid_at, p.id));
        list
    }

    /// Check a payment against its transaction: the amount must be positive
    /// and no larger than what remains to be paid.
    #[instrument(skip_all, fields(transaction_id = %new.transaction_id, amount = %new.amount))]
    pub fn prepare_payment(&self, new: NewPayment) -> Result<ValidatedPayment, BooksError> {
        let tx = self.transaction(new.transaction_id)?;
        let amount = positive("amount", self.money(new.amount))?;
        if amount > tx.remaining_amount {
            return Err(BooksError::Overpayment {
                amount,
                remaining: tx.remaining_amount,
            });
        }

        let now = Utc::now();
        Ok(ValidatedPayment(Payment {
            id: Uuid::new_v4(),
            transaction_id: tx.id,
            amount,
            method: new.method,
            reference: optional_text(new.reference),
            note: optional_text(new.note),
            paid_at: new.paid_at.unwrap_or(now),
            created_by: optional_text(new.created_by),
            created_at: now,
            updated_at: now,
        }))
    }

    /// Apply a validated payment to its transaction and party.
    #[instrument(skip_all, fields(payment_id = %validated.id(), transaction_id = %validated.transaction_id()))]
    pub fn post_payment(&mut self, validated: ValidatedPayment) -> Committed<Payment> {
        let payment = validated.0;
        let mut changes = ChangeSet::new();

        self.payments.insert(payment.id, payment.clone());
        changes.upsert(Record::Payment(payment.clone()));
        self.shift_paid(payment.transaction_id, payment.amount, &mut changes);
        self.notify_payment(&payment, &mut changes);

        tracing::info!(amount = %payment.amount, method = ?payment.method, "payment posted");
        Committed::new(payment, changes)
    }

    /// Amend a payment. A new amount must be positive and may use at most
    /// the transaction's remaining amount plus the payment's old amount.
    #[instrument(skip_all, fields(payment_id = %id))]
    pub fn update_payment(
        &mut self,
        id: Uuid,
        patch: PaymentPatch,
    ) -> Result<Committed<Payment>, BooksError> {
        let current = self.payment(id)?;
        let old_amount = current.amount;
        let tx = self.transaction(current.transaction_id)?;
        let amount = match patch.amount {
            Some(a) => positive("amount", self.money(a))?,
            None => old_amount,
        };
        let available = tx
            .remaining_amount
            .checked_add(old_amount)
            .ok_or_else(|| too_large("amount"))?;
        if amount > available {
            return Err(BooksError::Overpayment {
                amount,
                remaining: available,
            });
        }

        let Some(payment) = self.payments.get_mut(&id) else {
            return Err(BooksError::not_found(EntityKind::Payment, id));
        };
        payment.amount = amount;
        if let Some(method) = patch.method {
            payment.method = method;
        }
        if let Some(reference) = patch.reference {
            payment.reference = optional_text(Some(reference));
        }
        if let Some(note) = patch.note {
            payment.note = optional_text(Some(note));
        }
        if let Some(paid_at) = patch.paid_at {
            payment.paid_at = paid_at;
        }
        payment.updated_at = Utc::now();
        let payment = payment.clone();

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Payment(payment.clone()));
        if amount != old_amount {
            self.shift_paid(payment.transaction_id, amount - old_amount, &mut changes);
        }
        Ok(Committed::new(payment, changes))
    }

    /// Remove a payment and take its amount back off the transaction and
    /// party.
    #[instrument(skip_all, fields(payment_id = %id))]
    pub fn delete_payment(&mut self, id: Uuid) -> Result<Committed<Payment>, BooksError> {
        self.payment(id)?;
        let Some(payment) = self.payments.remove(&id) else {
            return Err(BooksError::not_found(EntityKind::Payment, id));
        };

        let mut changes = ChangeSet::new();
        changes.delete(RecordKey::Payment(id));
        self.shift_paid(payment.transaction_id, -payment.amount, &mut changes);
        Ok(Committed::new(payment, changes))
    }

    fn notify_payment(&mut self, payment: &Payment, changes: &mut ChangeSet) {
        let Some(tx) = self.transactions.get(&payment.transaction_id) else {
            return;
        };
        let notification = Notification::new(
            tx.kind.payment_notification(),
            Some(tx.id),
            tx.reference.clone(),
        )
        .with_amount(payment.amount);
        self.raise(notification, changes);
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use assert_matches::assert_matches;
    use mizan_primitives::{Currency, Quantity};
    use rust_decimal::dec;

    use super::*;
    use crate::books::{
        NewProduct, NewTransaction, NewTransactionItem, NotificationKind, PartyDetails, PartyKind,
        PaymentStatus, ProductDetails,
    };

    /// Books with one client owing 100 on an unpaid sale.
    fn owing_sale() -> Result<(Books, Uuid, Uuid)> {
        let mut books = Books::new(Currency::usd());
        let client = books
            .create_party(
                PartyKind::Client,
                PartyDetails {
                    name: "Samir".into(),
                    ..PartyDetails::default()
                },
            )?
            .value
            .id;
        let product = books
            .create_product(NewProduct {
                details: ProductDetails {
                    name: "Coffee Beans 1kg".into(),
                    sale_price: Amount::from(dec!(25)),
                    ..ProductDetails::default()
                },
                quantity: Quantity::from(dec!(10)),
            })?
            .value
            .id;
        let v = books.prepare_transaction(NewTransaction {
            party_id: Some(client),
            items: vec![NewTransactionItem {
                product_id: product,
                quantity: Quantity::from(dec!(4)),
                unit_price: None,
            }],
            ..NewTransaction::sale()
        })?;
        let tx = books.post_transaction(v).value.id;
        Ok((books, client, tx))
    }

    fn pay(books: &mut Books, tx: Uuid, amount: rust_decimal::Decimal) -> Result<Payment> {
        let v = books.prepare_payment(NewPayment {
            transaction_id: tx,
            amount: Amount::from(amount),
            ..NewPayment::default()
        })?;
        Ok(books.post_payment(v).value)
    }

    #[test]
    fn test_payment_method_serialization() -> Result<()> {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer)?,
            r#""bank_transfer""#
        );
        let parsed: NewPayment = serde_json::from_str(&format!(
            r#"{{"transaction_id":"{}","amount":"12.50"}}"#,
            Uuid::nil()
        ))?;
        assert_eq!(parsed.method, PaymentMethod::Cash);
        assert_eq!(parsed.amount, Amount::from(dec!(12.5)));
        Ok(())
    }

    #[test]
    fn test_post_payment_reconciles_transaction_and_party() -> Result<()> {
        let (mut books, client, tx) = owing_sale()?;

        let v = books.prepare_payment(NewPayment {
            transaction_id: tx,
            amount: Amount::from(dec!(30)),
            method: PaymentMethod::Cheque,
            reference: Some("CHQ-7781".into()),
            ..NewPayment::default()
        })?;
        let committed = books.post_payment(v);

        let t = books.transaction(tx)?;
        assert_eq!(t.amount_paid, Amount::from(dec!(30)));
        assert_eq!(t.remaining_amount, Amount::from(dec!(70)));
        assert_eq!(t.status, PaymentStatus::Partial);
        let party = books.party(PartyKind::Client, client)?;
        assert_eq!(party.amount_paid, Amount::from(dec!(30)));
        assert_eq!(party.balance, Amount::from(dec!(70)));

        let kinds: Vec<_> = committed.changes.notifications().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::PaymentReceived]);
        assert_eq!(committed.changes.upserts().len(), 4);
        books.check_invariants()?;
        Ok(())
    }

    #[test]
    fn test_payment_cannot_exceed_remaining() -> Result<()> {
        let (mut books, _, tx) = owing_sale()?;
        pay(&mut books, tx, dec!(60))?;

        let over = books.prepare_payment(NewPayment {
            transaction_id: tx,
            amount: Amount::from(dec!(40.01)),
            ..NewPayment::default()
        });
        assert_matches!(
            over,
            Err(BooksError::Overpayment { remaining, .. }) if remaining == Amount::from(dec!(40))
        );

        pay(&mut books, tx, dec!(40))?;
        assert_eq!(books.transaction(tx)?.status, PaymentStatus::Paid);
        assert_matches!(
            books.prepare_payment(NewPayment {
                transaction_id: tx,
                amount: Amount::from(dec!(0.01)),
                ..NewPayment::default()
            }),
            Err(BooksError::Overpayment { .. })
        );
        Ok(())
    }

    #[test]
    fn test_payment_must_be_positive_and_reference_transaction() -> Result<()> {
        let (books, _, tx) = owing_sale()?;
        assert_matches!(
            books.prepare_payment(NewPayment {
                transaction_id: tx,
                amount: Amount::ZERO,
                ..NewPayment::default()
            }),
            Err(BooksError::InvalidField { field: "amount", .. })
        );
        assert_matches!(
            books.prepare_payment(NewPayment {
                transaction_id: Uuid::new_v4(),
                amount: Amount::from(dec!(1)),
                ..NewPayment::default()
            }),
            Err(BooksError::NotFound { entity: EntityKind::Transaction, .. })
        );
        Ok(())
    }

    #[test]
    fn test_update_payment_allows_remaining_plus_old() -> Result<()> {
        let (mut books, client, tx) = owing_sale()?;
        let first = pay(&mut books, tx, dec!(50))?;
        pay(&mut books, tx, dec!(30))?;

        let updated = books.update_payment(
            first.id,
            PaymentPatch {
                amount: Some(Amount::from(dec!(70))),
                method: Some(PaymentMethod::Card),
                ..PaymentPatch::default()
            },
        )?;
        assert_eq!(updated.value.amount, Amount::from(dec!(70)));
        assert_eq!(updated.value.method, PaymentMethod::Card);
        assert_eq!(books.transaction(tx)?.remaining_amount, Amount::ZERO);
        assert_eq!(
            books.party(PartyKind::Client, client)?.balance,
            Amount::ZERO
        );

        assert_matches!(
            books.update_payment(
                first.id,
                PaymentPatch {
                    amount: Some(Amount::from(dec!(70.5))),
                    ..PaymentPatch::default()
                },
            ),
            Err(BooksError::Overpayment { .. })
        );
        books.check_invariants()?;
        Ok(())
    }

    #[test]
    fn test_update_payment_metadata_only() -> Result<()> {
        let (mut books, _, tx) = owing_sale()?;
        let payment = pay(&mut books, tx, dec!(10))?;
        let updated = books.update_payment(
            payment.id,
            PaymentPatch {
                note: Some("paid at counter".into()),
                ..PaymentPatch::default()
            },
        )?;
        assert_eq!(updated.value.note.as_deref(), Some("paid at counter"));
        assert_eq!(updated.changes.upserts().len(), 1);
        Ok(())
    }

    #[test]
    fn test_delete_payment_reverses_amounts() -> Result<()> {
        let (mut books, client, tx) = owing_sale()?;
        let payment = pay(&mut books, tx, dec!(25))?;

        let deleted = books.delete_payment(payment.id)?;
        assert_eq!(deleted.changes.deletes(), &[RecordKey::Payment(payment.id)]);
        let t = books.transaction(tx)?;
        assert_eq!(t.amount_paid, Amount::ZERO);
        assert_eq!(t.status, PaymentStatus::Unpaid);
        assert_eq!(
            books.party(PartyKind::Client, client)?.balance,
            Amount::from(dec!(100))
        );
        assert_matches!(
            books.delete_payment(payment.id),
            Err(BooksError::NotFound { entity: EntityKind::Payment, .. })
        );
        books.check_invariants()?;
        Ok(())
    }

    #[test]
    fn test_payments_filter_by_transaction() -> Result<()> {
        let (mut books, _, tx) = owing_sale()?;
        pay(&mut books, tx, dec!(5))?;
        pay(&mut books, tx, dec!(6))?;
        let list = books.payments(&PaymentFilter {
            transaction_id: Some(tx),
            ..PaymentFilter::default()
        });
        assert_eq!(list.len(), 2);
        assert!(books
            .payments(&PaymentFilter {
                transaction_id: Some(Uuid::new_v4()),
                ..PaymentFilter::default()
            })
            .is_empty());
        Ok(())
    }
}
