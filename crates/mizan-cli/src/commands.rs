use clap::{Parser, Subcommand};
use mizan_core::books::{
    ExpenseCategory, NewTransactionItem, PartyKind, PaymentMethod, PaymentStatus, TransactionKind,
};
use mizan_primitives::{Amount, Quantity};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Parse a wire-format enum name, accepting `bank-transfer` for
/// `bank_transfer` and any letter case.
fn parse_wire<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    let name = s.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(name)).map_err(|_| format!("unknown value '{s}'"))
}

fn parse_method(s: &str) -> Result<PaymentMethod, String> {
    parse_wire(s)
}

fn parse_status(s: &str) -> Result<PaymentStatus, String> {
    parse_wire(s)
}

fn parse_kind(s: &str) -> Result<TransactionKind, String> {
    parse_wire(s)
}

fn parse_party_kind(s: &str) -> Result<PartyKind, String> {
    parse_wire(s)
}

fn parse_expense_category(s: &str) -> Result<ExpenseCategory, String> {
    parse_wire(s).map_err(|_| {
        let known: Vec<_> = ExpenseCategory::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown expense category '{s}': expected one of {}", known.join(", "))
    })
}

/// `PRODUCT_ID:QTY` or `PRODUCT_ID:QTY@UNIT_PRICE`.
pub fn parse_item(s: &str) -> Result<NewTransactionItem, String> {
    let (product, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("expected PRODUCT_ID:QTY[@PRICE], got '{s}'"))?;
    let (quantity, unit_price) = match rest.split_once('@') {
        Some((q, p)) => (q, Some(p)),
        None => (rest, None),
    };
    let product_id = product
        .trim()
        .parse::<Uuid>()
        .map_err(|e| format!("invalid product id '{product}': {e}"))?;
    let quantity = quantity
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid quantity '{quantity}': {e}"))?;
    let unit_price = unit_price
        .map(|p| {
            p.trim()
                .parse::<Decimal>()
                .map(Amount::from)
                .map_err(|e| format!("invalid price '{p}': {e}"))
        })
        .transpose()?;
    Ok(NewTransactionItem {
        product_id,
        quantity: Quantity::from(quantity),
        unit_price,
    })
}

#[derive(Parser, Debug)]
#[command(name = "", bin_name = "", disable_help_subcommand = true)]
pub struct ReplCli {
    #[command(subcommand)]
    pub command: ReplCommand,
}

#[derive(Subcommand, Debug)]
pub enum ReplCommand {
    /// Check the server is up.
    Health,
    Categories,
    AddCategory {
        name: String,
        /// Arabic name.
        #[arg(long)]
        ar: Option<String>,
    },
    /// List products, optionally searching names, SKU and barcode.
    Products {
        search: Option<String>,
        #[arg(long)]
        low: bool,
    },
    AddProduct {
        name: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        cost: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        qty: Decimal,
        /// Low-stock threshold.
        #[arg(long, default_value_t = Decimal::ZERO)]
        min: Decimal,
        #[arg(long)]
        sku: Option<String>,
        #[arg(long)]
        category: Option<Uuid>,
    },
    /// Correct stock by a signed delta, e.g. after a stock count.
    Adjust {
        product: Uuid,
        #[arg(allow_hyphen_values = true)]
        delta: Decimal,
        #[arg(long)]
        reason: Option<String>,
    },
    Clients,
    Suppliers,
    AddClient {
        name: String,
        #[arg(long)]
        phone: Option<String>,
    },
    AddSupplier {
        name: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Show a client's or supplier's running balance.
    Statement {
        #[arg(value_parser = parse_party_kind)]
        kind: PartyKind,
        id: Uuid,
    },
    /// Record a sale: `sell -i <PRODUCT_ID>:<QTY>[@PRICE] ...`
    Sell {
        #[arg(long)]
        client: Option<Uuid>,
        #[arg(short, long = "item", value_parser = parse_item, required = true)]
        items: Vec<NewTransactionItem>,
        #[arg(long, default_value_t = Decimal::ZERO)]
        paid: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        discount: Decimal,
        #[arg(long, value_parser = parse_method, default_value = "cash")]
        method: PaymentMethod,
        #[arg(long)]
        note: Option<String>,
    },
    /// Record a purchase: `buy --supplier <ID> -i <PRODUCT_ID>:<QTY>@<COST> ...`
    Buy {
        #[arg(long)]
        supplier: Option<Uuid>,
        #[arg(short, long = "item", value_parser = parse_item, required = true)]
        items: Vec<NewTransactionItem>,
        #[arg(long, default_value_t = Decimal::ZERO)]
        paid: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        discount: Decimal,
        #[arg(long, value_parser = parse_method, default_value = "cash")]
        method: PaymentMethod,
        #[arg(long)]
        note: Option<String>,
    },
    Transactions {
        #[arg(long, value_parser = parse_kind)]
        kind: Option<TransactionKind>,
        #[arg(long, value_parser = parse_status)]
        status: Option<PaymentStatus>,
        #[arg(long)]
        party: Option<Uuid>,
    },
    /// Pay part or all of a transaction's remaining amount.
    Pay {
        transaction: Uuid,
        amount: Decimal,
        #[arg(long, value_parser = parse_method, default_value = "cash")]
        method: PaymentMethod,
        #[arg(long)]
        reference: Option<String>,
    },
    Payments {
        #[arg(long)]
        transaction: Option<Uuid>,
    },
    /// Change the amount of a recorded payment.
    AmendPayment { id: Uuid, amount: Decimal },
    DeletePayment { id: Uuid },
    AddExpense {
        title: String,
        amount: Decimal,
        #[arg(long, value_parser = parse_expense_category, default_value = "other")]
        category: ExpenseCategory,
        #[arg(long)]
        note: Option<String>,
    },
    Expenses {
        #[arg(long, value_parser = parse_expense_category)]
        category: Option<ExpenseCategory>,
    },
    Notifications {
        #[arg(long)]
        unread: bool,
    },
    ReadAll,
    Dashboard,
    Monthly { year: Option<i32> },
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    LowStock,
    #[command(name = "quit", visible_alias = "exit")]
    Quit,
    Help,
}
