//! Plain-text tables for the REPL.

use std::io::Write;

use anyhow::Result;
use mizan_core::{
    api::{HealthResponse, NotificationView},
    books::{Category, Expense, Party, PartyStatement, Payment, Product, Transaction},
    report::{CategoryTotal, Dashboard, MonthlyRow, TopProduct},
};
use mizan_primitives::{Amount, Currency, Money};

fn money(amount: Amount, currency: Currency) -> Money {
    Money::new(amount, currency)
}

pub fn health(out: &mut impl Write, h: &HealthResponse) -> Result<()> {
    writeln!(
        out,
        "[*] mizan-server {} {} (uptime {}s, currency {}, {})",
        h.version,
        h.status,
        h.uptime_secs,
        h.currency,
        if h.persistent { "persistent" } else { "in-memory" }
    )?;
    Ok(())
}

pub fn categories(out: &mut impl Write, list: &[Category]) -> Result<()> {
    if list.is_empty() {
        writeln!(out, "(no categories)")?;
    }
    for c in list {
        let ar = c.name_ar.as_deref().unwrap_or("");
        writeln!(out, "{}  {:<24} {ar}", c.id, c.name)?;
    }
    Ok(())
}

pub fn products(out: &mut impl Write, list: &[Product], currency: Currency) -> Result<()> {
    if list.is_empty() {
        writeln!(out, "(no products)")?;
        return Ok(());
    }
    writeln!(out, "{:<36}  {:<24} {:>10} {:>14}", "ID", "NAME", "QTY", "PRICE")?;
    for p in list {
        let flag = if p.is_out_of_stock() {
            " [out]"
        } else if p.is_low_stock() {
            " [low]"
        } else {
            ""
        };
        writeln!(
            out,
            "{}  {:<24} {:>10} {:>14}{flag}",
            p.id,
            p.name,
            p.quantity,
            money(p.sale_price, currency).to_string()
        )?;
    }
    Ok(())
}

pub fn parties(out: &mut impl Write, list: &[Party], currency: Currency) -> Result<()> {
    if list.is_empty() {
        writeln!(out, "(none)")?;
        return Ok(());
    }
    for p in list {
        writeln!(
            out,
            "{}  {:<24} balance {}",
            p.id,
            p.name,
            money(p.balance, currency)
        )?;
    }
    Ok(())
}

pub fn statement(out: &mut impl Write, s: &PartyStatement, currency: Currency) -> Result<()> {
    writeln!(out, "{} ({})", s.party.name, s.party.kind)?;
    for line in &s.lines {
        writeln!(
            out,
            "  {}  {:<12} {:>12} {:>12} {:>14}",
            line.date.format("%Y-%m-%d"),
            line.reference,
            line.debit,
            line.credit,
            money(line.balance, currency).to_string()
        )?;
    }
    writeln!(out, "Balance: {}", money(s.party.balance, currency))?;
    Ok(())
}

pub fn transaction(out: &mut impl Write, t: &Transaction, currency: Currency) -> Result<()> {
    writeln!(
        out,
        "{} {:<8} total {} paid {} remaining {} [{}]",
        t.reference,
        t.kind,
        money(t.total, currency),
        money(t.amount_paid, currency),
        money(t.remaining_amount, currency),
        t.status
    )?;
    Ok(())
}

pub fn transactions(out: &mut impl Write, list: &[Transaction], currency: Currency) -> Result<()> {
    if list.is_empty() {
        writeln!(out, "(no transactions)")?;
    }
    for t in list {
        write!(out, "{}  ", t.id)?;
        transaction(out, t, currency)?;
    }
    Ok(())
}

pub fn payments(out: &mut impl Write, list: &[Payment], currency: Currency) -> Result<()> {
    if list.is_empty() {
        writeln!(out, "(no payments)")?;
    }
    for p in list {
        writeln!(
            out,
            "{}  {}  {:>14}  {:?}  tx {}",
            p.id,
            p.paid_at.format("%Y-%m-%d"),
            money(p.amount, currency).to_string(),
            p.method,
            p.transaction_id
        )?;
    }
    Ok(())
}

pub fn expenses(out: &mut impl Write, list: &[Expense], currency: Currency) -> Result<()> {
    if list.is_empty() {
        writeln!(out, "(no expenses)")?;
    }
    for e in list {
        writeln!(
            out,
            "{}  {}  {:<12} {:>14}  {}",
            e.id,
            e.date.format("%Y-%m-%d"),
            e.category,
            money(e.amount, currency).to_string(),
            e.title
        )?;
    }
    Ok(())
}

pub fn notifications(out: &mut impl Write, list: &[NotificationView]) -> Result<()> {
    if list.is_empty() {
        writeln!(out, "(no notifications)")?;
    }
    for n in list {
        let marker = if n.read { ' ' } else { '*' };
        writeln!(out, "{marker} {}  {}: {}", n.id, n.title, n.message)?;
    }
    Ok(())
}

pub fn dashboard(out: &mut impl Write, d: &Dashboard) -> Result<()> {
    let c = d.currency;
    writeln!(
        out,
        "Products: {} ({} low, {} out)  stock value {}",
        d.product_count,
        d.low_stock_count,
        d.out_of_stock_count,
        money(d.stock_value, c)
    )?;
    writeln!(out, "Sales:        {}", money(d.sales_total, c))?;
    writeln!(out, "Purchases:    {}", money(d.purchases_total, c))?;
    writeln!(out, "Expenses:     {}", money(d.expenses_total, c))?;
    writeln!(out, "Collected:    {}", money(d.collected, c))?;
    writeln!(out, "Paid out:     {}", money(d.paid_out, c))?;
    writeln!(out, "Receivables:  {}", money(d.receivables, c))?;
    writeln!(out, "Payables:     {}", money(d.payables, c))?;
    writeln!(out, "Gross profit: {}", money(d.gross_profit, c))?;
    writeln!(out, "Net profit:   {}", money(d.net_profit, c))?;
    Ok(())
}

pub fn monthly(out: &mut impl Write, rows: &[MonthlyRow]) -> Result<()> {
    writeln!(
        out,
        "{:>5} {:>14} {:>14} {:>14} {:>14}",
        "MONTH", "SALES", "PURCHASES", "EXPENSES", "PROFIT"
    )?;
    for r in rows {
        writeln!(
            out,
            "{:>5} {:>14} {:>14} {:>14} {:>14}",
            r.month, r.sales, r.purchases, r.expenses, r.profit
        )?;
    }
    Ok(())
}

pub fn top_products(out: &mut impl Write, list: &[TopProduct], currency: Currency) -> Result<()> {
    for (rank, p) in list.iter().enumerate() {
        writeln!(
            out,
            "{:>2}. {:<24} {:>10} sold  {}",
            rank + 1,
            p.product_name,
            p.quantity,
            money(p.revenue, currency)
        )?;
    }
    Ok(())
}

pub fn expense_totals(out: &mut impl Write, list: &[CategoryTotal], currency: Currency) -> Result<()> {
    for t in list {
        writeln!(
            out,
            "{:<12} {:>4} × {}",
            t.category,
            t.count,
            money(t.total, currency)
        )?;
    }
    Ok(())
}
