use anyhow::Result;
use chrono::Datelike;
use mizan_core::books::{
    Books, BooksError, CategoryDetails, ExpenseCategory, ExpenseDetails, NewPayment, NewProduct,
    NewTransaction, NewTransactionItem, NotificationKind, PartyDetails, PartyKind, PaymentMethod,
    PaymentPatch, PaymentStatus, ProductDetails, StatementEntry,
};
use mizan_core::report::MonthlyRow;
use mizan_primitives::{Amount, Currency, Locale, Quantity};
use rust_decimal::dec;

/// Simulates a day in a small grocery: restock from a supplier, sell on
/// credit and for cash, take payments, correct a payment, record an expense
/// and read the dashboard. Balances must reconcile at every step.
#[test]
fn simulation_shop_day_cycle() -> Result<()> {
    let mut books = Books::new(Currency::sar());

    let staples = books
        .create_category(CategoryDetails {
            name: "Staples".into(),
            name_ar: Some("مواد أساسية".into()),
            ..CategoryDetails::default()
        })?
        .value;
    let supplier = books
        .create_party(
            PartyKind::Supplier,
            PartyDetails {
                name: "Al Noor Wholesale".into(),
                phone: Some("+966 11 000 0000".into()),
                ..PartyDetails::default()
            },
        )?
        .value;
    let client = books
        .create_party(
            PartyKind::Client,
            PartyDetails {
                name: "Fatima Al-Zahra".into(),
                ..PartyDetails::default()
            },
        )?
        .value;
    let rice = books
        .create_product(NewProduct {
            details: ProductDetails {
                name: "Basmati Rice 5kg".into(),
                name_ar: Some("أرز بسمتي ٥ كغ".into()),
                sku: Some("RICE-5".into()),
                category_id: Some(staples.id),
                supplier_id: Some(supplier.id),
                sale_price: Amount::from(dec!(45)),
                min_quantity: Quantity::from(dec!(10)),
                ..ProductDetails::default()
            },
            quantity: Quantity::ZERO,
        })?
        .value;

    // Morning restock: 50 bags at 30, half paid by transfer.
    let restock = books.prepare_transaction(NewTransaction {
        party_id: Some(supplier.id),
        items: vec![NewTransactionItem {
            product_id: rice.id,
            quantity: Quantity::from(dec!(50)),
            unit_price: Some(Amount::from(dec!(30))),
        }],
        amount_paid: Amount::from(dec!(750)),
        payment_method: PaymentMethod::BankTransfer,
        ..NewTransaction::purchase()
    })?;
    let restock = books.post_transaction(restock).value;
    assert_eq!(restock.reference, "PUR-000001");
    assert_eq!(restock.status, PaymentStatus::Partial);
    assert_eq!(books.product(rice.id)?.cost_price, Amount::from(dec!(30)));
    assert_eq!(
        books.party(PartyKind::Supplier, supplier.id)?.balance,
        Amount::from(dec!(750))
    );

    // Credit sale of 42 bags leaves 8, below the threshold of 10.
    let sale = books.prepare_transaction(NewTransaction {
        party_id: Some(client.id),
        items: vec![NewTransactionItem {
            product_id: rice.id,
            quantity: Quantity::from(dec!(42)),
            unit_price: None,
        }],
        discount: Amount::from(dec!(90)),
        ..NewTransaction::sale()
    })?;
    let committed = books.post_transaction(sale);
    let sale = committed.value;
    assert_eq!(sale.total, Amount::from(dec!(1800)));
    assert_eq!(sale.status, PaymentStatus::Unpaid);
    assert!(committed
        .changes
        .notifications()
        .any(|n| n.kind == NotificationKind::LowStock));

    // Two instalments, then the first is corrected upwards.
    let mut instalments = Vec::new();
    for amount in [dec!(500), dec!(300)] {
        let v = books.prepare_payment(NewPayment {
            transaction_id: sale.id,
            amount: Amount::from(amount),
            method: PaymentMethod::Cash,
            ..NewPayment::default()
        })?;
        instalments.push(books.post_payment(v).value);
    }
    books.update_payment(
        instalments[0].id,
        PaymentPatch {
            amount: Some(Amount::from(dec!(600))),
            ..PaymentPatch::default()
        },
    )?;
    let sale_now = books.transaction(sale.id)?;
    assert_eq!(sale_now.amount_paid, Amount::from(dec!(900)));
    assert_eq!(sale_now.remaining_amount, Amount::from(dec!(900)));

    // Over-paying the rest is refused and changes nothing.
    let over = books.prepare_payment(NewPayment {
        transaction_id: sale.id,
        amount: Amount::from(dec!(900.01)),
        ..NewPayment::default()
    });
    assert!(matches!(over, Err(BooksError::Overpayment { .. })));

    let statement = books.statement(PartyKind::Client, client.id)?;
    assert_eq!(statement.lines.len(), 3);
    assert_eq!(statement.lines[0].entry, StatementEntry::Charge);
    assert_eq!(statement.lines[2].balance, Amount::from(dec!(900)));
    assert_eq!(statement.party.balance, Amount::from(dec!(900)));

    // Cash walk-in sale empties the shelf.
    let walk_in = books.prepare_transaction(NewTransaction {
        items: vec![NewTransactionItem {
            product_id: rice.id,
            quantity: Quantity::from(dec!(8)),
            unit_price: None,
        }],
        amount_paid: Amount::from(dec!(360)),
        ..NewTransaction::sale()
    })?;
    let walk_in = books.post_transaction(walk_in);
    assert_eq!(walk_in.value.status, PaymentStatus::Paid);
    let out = walk_in
        .changes
        .notifications()
        .find(|n| n.kind == NotificationKind::OutOfStock)
        .ok_or_else(|| anyhow::anyhow!("expected an out-of-stock notification"))?;
    assert_eq!(out.title(Locale::Ar), "نفاد المخزون");

    books.create_expense(ExpenseDetails {
        title: "Delivery van fuel".into(),
        amount: Amount::from(dec!(120)),
        category: ExpenseCategory::Transport,
        ..ExpenseDetails::default()
    })?;

    let dashboard = books.dashboard(mizan_core::books::DateRange::all());
    assert_eq!(dashboard.sales_total, Amount::from(dec!(2160)));
    assert_eq!(dashboard.purchases_total, Amount::from(dec!(1500)));
    assert_eq!(dashboard.receivables, Amount::from(dec!(900)));
    assert_eq!(dashboard.payables, Amount::from(dec!(750)));
    assert_eq!(dashboard.collected, Amount::from(dec!(1260)));
    assert_eq!(dashboard.out_of_stock_count, 1);
    // 42 × 15 − 90 + 8 × 15
    assert_eq!(dashboard.gross_profit, Amount::from(dec!(660)));
    assert_eq!(dashboard.net_profit, Amount::from(dec!(540)));

    let months: Vec<MonthlyRow> = books.monthly(sale.date.year());
    let total_sales: Amount = months.iter().map(|m| m.sales).sum();
    assert_eq!(total_sales, Amount::from(dec!(2160)));

    books.check_invariants()?;
    let restored = Books::restore(Currency::sar(), books.snapshot())?;
    assert_eq!(restored.unread_count(), books.unread_count());
    Ok(())
}
