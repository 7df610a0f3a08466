//! Read-only aggregates over the books, shaped for dashboards and charts.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};
use mizan_primitives::{Amount, Currency, Quantity};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{
    Books, DateRange, ExpenseCategory, PartyKind, Product, ProductFilter, Transaction,
    TransactionKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub currency: Currency,
    pub range: DateRange,
    pub product_count: usize,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub stock_value: Amount,
    pub sales_total: Amount,
    pub purchases_total: Amount,
    pub expenses_total: Amount,
    /// Payments received on sales.
    pub collected: Amount,
    /// Payments made on purchases.
    pub paid_out: Amount,
    /// Outstanding client balances.
    pub receivables: Amount,
    /// Outstanding supplier balances.
    pub payables: Amount,
    pub gross_profit: Amount,
    pub net_profit: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRow {
    /// 1 = January.
    pub month: u32,
    pub sales: Amount,
    pub purchases: Amount,
    pub expenses: Amount,
    pub profit: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: Quantity,
    pub revenue: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub count: usize,
    pub total: Amount,
}

/// Margin earned on a sale: item margins at the cost captured when sold,
/// less the discount.
fn sale_profit(tx: &Transaction) -> Amount {
    let margin: Amount = tx
        .items
        .iter()
        .fold(Amount::ZERO, |acc, item| {
            let unit_margin = item.unit_price.saturating_sub(item.unit_cost);
            acc.saturating_add(unit_margin.saturating_mul(item.quantity))
        });
    margin.saturating_sub(tx.discount)
}

impl Books {
    #[instrument(skip_all, level = "debug")]
    pub fn dashboard(&self, range: DateRange) -> Dashboard {
        let products = self.products.values();
        let (product_count, low_stock_count, out_of_stock_count, stock_value) = products.fold(
            (0, 0, 0, Amount::ZERO),
            |(count, low, out, value), p| {
                (
                    count + 1,
                    low + usize::from(p.is_low_stock()),
                    out + usize::from(p.is_out_of_stock()),
                    value.saturating_add(p.stock_value()),
                )
            },
        );

        let mut sales_total = Amount::ZERO;
        let mut purchases_total = Amount::ZERO;
        let mut gross_profit = Amount::ZERO;
        for tx in self.transactions.values().filter(|tx| range.contains(tx.date)) {
            match tx.kind {
                TransactionKind::Sale => {
                    sales_total = sales_total.saturating_add(tx.total);
                    gross_profit = gross_profit.saturating_add(sale_profit(tx));
                }
                TransactionKind::Purchase => {
                    purchases_total = purchases_total.saturating_add(tx.total);
                }
            }
        }

        let mut collected = Amount::ZERO;
        let mut paid_out = Amount::ZERO;
        for payment in self.payments.values().filter(|p| range.contains(p.paid_at)) {
            match self.transactions.get(&payment.transaction_id).map(|tx| tx.kind) {
                Some(TransactionKind::Sale) => {
                    collected = collected.saturating_add(payment.amount);
                }
                Some(TransactionKind::Purchase) => {
                    paid_out = paid_out.saturating_add(payment.amount);
                }
                None => {}
            }
        }

        let expenses_total: Amount = self
            .expenses
            .values()
            .filter(|e| range.contains(e.date))
            .fold(Amount::ZERO, |sum, e| sum.saturating_add(e.amount));

        let balance_of = |kind: PartyKind| -> Amount {
            self.parties
                .values()
                .filter(|p| p.kind == kind)
                .fold(Amount::ZERO, |sum, p| sum.saturating_add(p.balance))
        };

        let gross_profit = self.money(gross_profit);
        Dashboard {
            currency: self.currency,
            range,
            product_count,
            low_stock_count,
            out_of_stock_count,
            stock_value: self.money(stock_value),
            sales_total,
            purchases_total,
            expenses_total,
            collected,
            paid_out,
            receivables: balance_of(PartyKind::Client),
            payables: balance_of(PartyKind::Supplier),
            gross_profit,
            net_profit: gross_profit.saturating_sub(expenses_total),
        }
    }

    /// Twelve rows, January to December, of the given calendar year (UTC).
    #[instrument(skip(self), level = "debug")]
    pub fn monthly(&self, year: i32) -> Vec<MonthlyRow> {
        let mut rows: Vec<MonthlyRow> = (1..=12)
            .map(|month| MonthlyRow {
                month,
                sales: Amount::ZERO,
                purchases: Amount::ZERO,
                expenses: Amount::ZERO,
                profit: Amount::ZERO,
            })
            .collect();
        let slot = |at: DateTime<Utc>| (at.year() == year).then(|| at.month0() as usize);

        for tx in self.transactions.values() {
            let Some(row) = slot(tx.date).and_then(|i| rows.get_mut(i)) else {
                continue;
            };
            match tx.kind {
                TransactionKind::Sale => {
                    row.sales = row.sales.saturating_add(tx.total);
                    row.profit = row.profit.saturating_add(sale_profit(tx));
                }
                TransactionKind::Purchase => {
                    row.purchases = row.purchases.saturating_add(tx.total);
                }
            }
        }
        for expense in self.expenses.values() {
            let Some(row) = slot(expense.date).and_then(|i| rows.get_mut(i)) else {
                continue;
            };
            row.expenses = row.expenses.saturating_add(expense.amount);
            row.profit -= expense.amount;
        }
        for row in &mut rows {
            row.profit = self.money(row.profit);
        }
        rows
    }

    /// Best sellers by quantity sold within `range`.
    #[instrument(skip(self), level = "debug")]
    pub fn top_products(&self, range: DateRange, limit: usize) -> Vec<TopProduct> {
        let mut totals: HashMap<Uuid, TopProduct> = HashMap::new();
        let sales = self
            .transactions
            .values()
            .filter(|tx| tx.kind == TransactionKind::Sale && range.contains(tx.date));
        for tx in sales {
            for item in &tx.items {
                let entry = totals.entry(item.product_id).or_insert_with(|| TopProduct {
                    product_id: item.product_id,
                    product_name: self
                        .products
                        .get(&item.product_id)
                        .map_or_else(|| item.product_name.clone(), |p| p.name.clone()),
                    quantity: Quantity::ZERO,
                    revenue: Amount::ZERO,
                });
                entry.quantity += item.quantity;
                entry.revenue = entry.revenue.saturating_add(item.total);
            }
        }

        let mut ranked: Vec<TopProduct> = totals.into_values().collect();
        ranked.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then(b.revenue.cmp(&a.revenue))
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Products at or below their reorder threshold, emptiest first.
    pub fn low_stock(&self) -> Vec<&Product> {
        let mut list = self.products(&ProductFilter {
            low_stock: true,
            ..ProductFilter::default()
        });
        list.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
        list
    }

    /// Expense totals per category within `range`, largest first. Categories
    /// without expenses are omitted.
    pub fn expenses_by_category(&self, range: DateRange) -> Vec<CategoryTotal> {
        let mut totals: Vec<CategoryTotal> = ExpenseCategory::ALL
            .into_iter()
            .map(|category| {
                let (count, total) = self
                    .expenses
                    .values()
                    .filter(|e| e.category == category && range.contains(e.date))
                    .fold((0, Amount::ZERO), |(n, sum), e| (n + 1, sum.saturating_add(e.amount)));
                CategoryTotal {
                    category,
                    count,
                    total,
                }
            })
            .filter(|c| c.count > 0)
            .collect();
        totals.sort_by(|a, b| b.total.cmp(&a.total));
        totals
    }
}
