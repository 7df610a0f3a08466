//! Property-based tests for the balance reconciliation rules.
//!
//! Invariants verified after every operation of a random sequence:
//! - `remaining_amount = total - amount_paid` for every transaction
//! - `Σ payments = amount_paid` for every transaction
//! - `balance = total_due - amount_paid` for every party
//! - a rejected operation leaves every record untouched
//! - no payment sequence ever pushes `amount_paid` above `total`

use mizan_core::books::{
    Books, BooksError, BooksSnapshot, NewPayment, NewProduct, NewTransaction, NewTransactionItem,
    PartyDetails, PartyKind, PaymentFilter, PaymentPatch, ProductDetails, TransactionFilter,
    TransactionPatch,
};
use mizan_primitives::{Amount, Currency, Quantity};
use proptest::{prelude::*, test_runner::TestCaseError};
use rust_decimal::Decimal;
use uuid::Uuid;

// ── Helpers
// ───────────────────────────────────────────────────────────────────

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

/// Amounts in cents [1, 20 000], i.e. 0.01 to 200.00.
fn cents_strat() -> impl Strategy<Value = Amount> {
    (1i64..=20_000i64).prop_map(|c| Amount::from(Decimal::new(c, 2)))
}

#[derive(Debug, Clone)]
enum Op {
    Pay { tx: usize, amount: Amount },
    Amend { payment: usize, amount: Amount },
    Remove { payment: usize },
    Discount { tx: usize, amount: Amount },
}

fn op_strat() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..8, cents_strat()).prop_map(|(tx, amount)| Op::Pay { tx, amount }),
        2 => (0usize..16, cents_strat()).prop_map(|(payment, amount)| Op::Amend { payment, amount }),
        1 => (0usize..16).prop_map(|payment| Op::Remove { payment }),
        1 => (0usize..8, cents_strat()).prop_map(|(tx, amount)| Op::Discount { tx, amount }),
    ]
}

/// Snapshot with every list in id order so two snapshots compare by content.
fn sorted(mut s: BooksSnapshot) -> BooksSnapshot {
    s.categories.sort_by_key(|r| r.id);
    s.products.sort_by_key(|r| r.id);
    s.parties.sort_by_key(|r| r.id);
    s.transactions.sort_by_key(|r| r.id);
    s.payments.sort_by_key(|r| r.id);
    s.expenses.sort_by_key(|r| r.id);
    s.notifications.sort_by_key(|r| r.id);
    s
}

/// Two clients and a supplier with a mix of credit sales and purchases.
fn seeded_books() -> Result<Books, BooksError> {
    let mut books = Books::new(Currency::usd());
    let mut parties = Vec::new();
    for (kind, name) in [
        (PartyKind::Client, "Amal"),
        (PartyKind::Client, "Yusuf"),
        (PartyKind::Supplier, "Delta Supply Co"),
    ] {
        let details = PartyDetails {
            name: name.into(),
            ..PartyDetails::default()
        };
        parties.push(books.create_party(kind, details)?.value.id);
    }
    let product = books
        .create_product(NewProduct {
            details: ProductDetails {
                name: "Canned Beans".into(),
                cost_price: Amount::from(Decimal::new(75, 2)),
                sale_price: Amount::from(Decimal::new(125, 2)),
                ..ProductDetails::default()
            },
            quantity: Quantity::from(Decimal::from(1_000)),
        })?
        .value
        .id;

    for (i, units) in [40i64, 120, 15, 64].into_iter().enumerate() {
        let item = NewTransactionItem {
            product_id: product,
            quantity: Quantity::from(Decimal::from(units)),
            unit_price: None,
        };
        let new = NewTransaction {
            party_id: Some(parties[i % 2]),
            items: vec![item],
            ..NewTransaction::sale()
        };
        let v = books.prepare_transaction(new)?;
        books.post_transaction(v);
    }
    for units in [200i64, 50] {
        let new = NewTransaction {
            party_id: Some(parties[2]),
            items: vec![NewTransactionItem {
                product_id: product,
                quantity: Quantity::from(Decimal::from(units)),
                unit_price: None,
            }],
            ..NewTransaction::purchase()
        };
        let v = books.prepare_transaction(new)?;
        books.post_transaction(v);
    }
    Ok(books)
}

fn nth_transaction(books: &Books, i: usize) -> Uuid {
    let list = books.transactions(&TransactionFilter::default());
    let mut ids: Vec<Uuid> = list.iter().map(|t| t.id).collect();
    ids.sort();
    ids[i % ids.len()]
}

fn nth_payment(books: &Books, i: usize) -> Option<Uuid> {
    let mut ids: Vec<Uuid> = books
        .payments(&PaymentFilter::default())
        .iter()
        .map(|p| p.id)
        .collect();
    ids.sort();
    (!ids.is_empty()).then(|| ids[i % ids.len()])
}

fn apply(books: &mut Books, op: &Op) -> Result<(), BooksError> {
    match *op {
        Op::Pay { tx, amount } => {
            let transaction_id = nth_transaction(books, tx);
            let v = books.prepare_payment(NewPayment {
                transaction_id,
                amount,
                ..NewPayment::default()
            })?;
            books.post_payment(v);
        }
        Op::Amend { payment, amount } => {
            if let Some(id) = nth_payment(books, payment) {
                books.update_payment(
                    id,
                    PaymentPatch {
                        amount: Some(amount),
                        ..PaymentPatch::default()
                    },
                )?;
            }
        }
        Op::Remove { payment } => {
            if let Some(id) = nth_payment(books, payment) {
                books.delete_payment(id)?;
            }
        }
        Op::Discount { tx, amount } => {
            let id = nth_transaction(books, tx);
            books.update_transaction(
                id,
                TransactionPatch {
                    discount: Some(amount),
                    ..TransactionPatch::default()
                },
            )?;
        }
    }
    Ok(())
}

// ── All property tests
// ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Any sequence of payment creates, amendments, removals and discount
    /// changes keeps every reconciliation identity, and a rejected step
    /// changes nothing.
    #[test]
    fn payment_sequences_preserve_invariants(ops in prop::collection::vec(op_strat(), 1..40)) {
        let mut books = seeded_books().map_err(fail)?;

        for op in &ops {
            let before = sorted(books.snapshot());
            match apply(&mut books, op) {
                Ok(()) => {
                    books.check_invariants().map_err(fail)?;
                }
                Err(_) => {
                    prop_assert_eq!(sorted(books.snapshot()), before);
                }
            }
        }

        for tx in books.transactions(&TransactionFilter::default()) {
            prop_assert!(tx.amount_paid <= tx.total);
            prop_assert!(!tx.remaining_amount.is_sign_negative());
        }
    }

    /// Paying a transaction off in arbitrary slices settles exactly the
    /// total: the slice that would overshoot is rejected.
    #[test]
    fn slices_never_overshoot_total(slices in prop::collection::vec(cents_strat(), 1..30)) {
        let mut books = seeded_books().map_err(fail)?;
        let id = nth_transaction(&books, 0);

        for amount in slices {
            let remaining = books.transaction(id).map_err(fail)?.remaining_amount;
            let result = books.prepare_payment(NewPayment {
                transaction_id: id,
                amount,
                ..NewPayment::default()
            });
            match result {
                Ok(v) => {
                    prop_assert!(amount <= remaining);
                    books.post_payment(v);
                }
                Err(BooksError::Overpayment { .. }) => {
                    prop_assert!(amount > remaining);
                }
                Err(e) => return Err(fail(e)),
            }
        }

        let tx = books.transaction(id).map_err(fail)?;
        let paid: Amount = books
            .payments(&PaymentFilter { transaction_id: Some(id), ..PaymentFilter::default() })
            .iter()
            .map(|p| p.amount)
            .sum();
        prop_assert_eq!(paid, tx.amount_paid);
        prop_assert_eq!(tx.remaining_amount, tx.total - tx.amount_paid);
    }

    /// Snapshot and restore reproduce the same books.
    #[test]
    fn restore_accepts_any_reachable_state(ops in prop::collection::vec(op_strat(), 0..20)) {
        let mut books = seeded_books().map_err(fail)?;
        for op in &ops {
            let _ = apply(&mut books, op);
        }
        let restored = Books::restore(books.currency(), books.snapshot()).map_err(fail)?;
        prop_assert_eq!(sorted(restored.snapshot()), sorted(books.snapshot()));
    }
}

/// Tampering with a stored balance is caught on restore.
#[test]
fn restore_rejects_inconsistent_party() -> anyhow::Result<()> {
    let books = seeded_books()?;
    let mut snapshot = books.snapshot();
    let party = snapshot
        .parties
        .iter_mut()
        .find(|p| p.kind == PartyKind::Client)
        .ok_or_else(|| anyhow::anyhow!("seeded books have clients"))?;
    party.balance -= Amount::from(Decimal::ONE);

    let result = Books::restore(Currency::usd(), snapshot);
    assert!(matches!(result, Err(BooksError::Inconsistent(_))));
    Ok(())
}
