mod client;
mod commands;
mod render;

use std::{
    io::{Stdout, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::Parser;
use client::ApiClient;
use commands::{ReplCli, ReplCommand};
use mizan_config::ClientConfig;
use mizan_core::{
    api::{Deleted, HealthResponse, MarkedRead, NotificationView},
    books::{
        Category, CategoryDetails, Expense, ExpenseDetails, ExpenseFilter, NewPayment, NewProduct,
        NewTransaction, Party, PartyDetails, PartyKind, PartyStatement, Payment, PaymentFilter,
        PaymentPatch, Product, ProductDetails, ProductFilter, StockAdjustment, Transaction,
        TransactionFilter,
    },
    report::{Dashboard, MonthlyRow, TopProduct},
};
use mizan_primitives::{Amount, Currency, Quantity};
use rustyline::{DefaultEditor, error::ReadlineError};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = ClientConfig::load();

    let file_appender = tracing_appender::rolling::daily("logs", "mizan-cli.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let (filter, env_err) = match EnvFilter::try_from_default_env() {
        Ok(f) => (f, None),
        Err(e) => {
            let level = if config.verbose { "debug" } else { "info" };
            (EnvFilter::new(format!("mizan_cli={level}")), Some(e))
        }
    };
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(filter)
        .init();
    if let Some(e) = env_err {
        warn!(error = %e, "invalid RUST_LOG filter, using default");
    }

    let mut stdout = std::io::stdout();
    writeln!(stdout, "--------------------------------------------------")?;
    writeln!(stdout, " Mizan v{} (HTTP client)", env!("CARGO_PKG_VERSION"))?;
    writeln!(stdout, " Server: {}", config.server_url)?;
    writeln!(stdout, " Logs redirected to: logs/mizan-cli.log")?;
    writeln!(stdout, "--------------------------------------------------")?;

    let client = ApiClient::new(&config)?;

    // Amounts are printed in the shop's currency; learn it from the server.
    let mut currency = Currency::usd();
    match client.get::<HealthResponse>("/health") {
        Ok(health) => {
            currency = health.currency;
            render::health(&mut stdout, &health)?;
        }
        Err(e) => {
            writeln!(stdout, "[!] {e:#}")?;
            writeln!(stdout, "[*] Commands will fail until the server is reachable.")?;
        }
    }
    info!(server = %config.server_url, user = %config.user_id, "mizan-cli started");
    writeln!(stdout, "[*] Type 'help' for commands.")?;

    let mut rl = DefaultEditor::new()?;
    let history_path = PathBuf::from(".mizan_history");
    if rl.load_history(&history_path).is_err() {
        // No history exists yet; not an error.
    }

    let mut session = Session {
        client,
        currency,
        out: stdout,
    };

    loop {
        match rl.readline("mizan> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let split_args = match shell_words::split(line) {
                    Ok(args) => args,
                    Err(e) => {
                        writeln!(session.out, "Error parsing command: {e}")?;
                        continue;
                    }
                };

                match ReplCli::try_parse_from(std::iter::once(String::new()).chain(split_args)) {
                    Ok(cli) => match session.handle(cli.command) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => writeln!(session.out, "[!] {e:#}")?,
                    },
                    Err(e) => writeln!(session.out, "{e}")?,
                }
            }
            Err(ReadlineError::Interrupted) => {
                writeln!(session.out, "(Ctrl-C) Exiting CLI. Server keeps running.")?;
                break;
            }
            Err(ReadlineError::Eof) => {
                writeln!(session.out, "(Ctrl-D) Exiting CLI. Server keeps running.")?;
                break;
            }
            Err(err) => {
                writeln!(session.out, "Error: {err:?}")?;
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

struct Session {
    client: ApiClient,
    currency: Currency,
    out: Stdout,
}

impl Session {
    /// Run one command. Returns `true` when the REPL should exit.
    #[allow(clippy::too_many_lines)]
    fn handle(&mut self, command: ReplCommand) -> Result<bool> {
        let c = self.currency;
        let out = &mut self.out;
        let api = &self.client;
        match command {
            ReplCommand::Health => {
                let health: HealthResponse = api.get("/health")?;
                self.currency = health.currency;
                render::health(out, &health)?;
            }
            ReplCommand::Categories => {
                let list: Vec<Category> = api.get("/categories")?;
                render::categories(out, &list)?;
            }
            ReplCommand::AddCategory { name, ar } => {
                let category: Category = api.post(
                    "/categories",
                    &CategoryDetails {
                        name,
                        name_ar: ar,
                        ..CategoryDetails::default()
                    },
                )?;
                writeln!(out, "[+] Category {} ({})", category.name, category.id)?;
            }
            ReplCommand::Products { search, low } => {
                let filter = ProductFilter {
                    search,
                    low_stock: low,
                    ..ProductFilter::default()
                };
                let list: Vec<Product> = api.get_with("/products", &filter)?;
                render::products(out, &list, c)?;
            }
            ReplCommand::AddProduct {
                name,
                price,
                cost,
                qty,
                min,
                sku,
                category,
            } => {
                let product: Product = api.post(
                    "/products",
                    &NewProduct {
                        details: ProductDetails {
                            name,
                            sku,
                            category_id: category,
                            cost_price: Amount::from(cost),
                            sale_price: Amount::from(price),
                            min_quantity: Quantity::from(min),
                            ..ProductDetails::default()
                        },
                        quantity: Quantity::from(qty),
                    },
                )?;
                writeln!(out, "[+] Product {} ({})", product.name, product.id)?;
            }
            ReplCommand::Adjust {
                product,
                delta,
                reason,
            } => {
                let product: Product = api.post(
                    &format!("/products/{product}/adjust"),
                    &StockAdjustment {
                        delta: Quantity::from(delta),
                        reason,
                    },
                )?;
                writeln!(out, "[*] {} now at {}", product.name, product.quantity)?;
            }
            ReplCommand::Clients => {
                let list: Vec<Party> = api.get("/clients")?;
                render::parties(out, &list, c)?;
            }
            ReplCommand::Suppliers => {
                let list: Vec<Party> = api.get("/suppliers")?;
                render::parties(out, &list, c)?;
            }
            ReplCommand::AddClient { name, phone } => {
                add_party(api, out, PartyKind::Client, name, phone)?;
            }
            ReplCommand::AddSupplier { name, phone } => {
                add_party(api, out, PartyKind::Supplier, name, phone)?;
            }
            ReplCommand::Statement { kind, id } => {
                let statement: PartyStatement =
                    api.get(&format!("{}/{id}/statement", party_path(kind)))?;
                render::statement(out, &statement, c)?;
            }
            ReplCommand::Sell {
                client,
                items,
                paid,
                discount,
                method,
                note,
            } => {
                let new = NewTransaction {
                    party_id: client,
                    items,
                    discount: Amount::from(discount),
                    amount_paid: Amount::from(paid),
                    payment_method: method,
                    note,
                    ..NewTransaction::sale()
                };
                let tx: Transaction = api.post("/transactions", &new)?;
                render::transaction(out, &tx, c)?;
            }
            ReplCommand::Buy {
                supplier,
                items,
                paid,
                discount,
                method,
                note,
            } => {
                let new = NewTransaction {
                    party_id: supplier,
                    items,
                    discount: Amount::from(discount),
                    amount_paid: Amount::from(paid),
                    payment_method: method,
                    note,
                    ..NewTransaction::purchase()
                };
                let tx: Transaction = api.post("/transactions", &new)?;
                render::transaction(out, &tx, c)?;
            }
            ReplCommand::Transactions { kind, status, party } => {
                let filter = TransactionFilter {
                    kind,
                    status,
                    party_id: party,
                    ..TransactionFilter::default()
                };
                let list: Vec<Transaction> = api.get_with("/transactions", &filter)?;
                render::transactions(out, &list, c)?;
            }
            ReplCommand::Pay {
                transaction,
                amount,
                method,
                reference,
            } => {
                let payment: Payment = api.post(
                    "/payments",
                    &NewPayment {
                        transaction_id: transaction,
                        amount: Amount::from(amount),
                        method,
                        reference,
                        ..NewPayment::default()
                    },
                )?;
                show_transaction_after(api, out, payment.transaction_id, c)?;
            }
            ReplCommand::Payments { transaction } => {
                let filter = PaymentFilter {
                    transaction_id: transaction,
                    ..PaymentFilter::default()
                };
                let list: Vec<Payment> = api.get_with("/payments", &filter)?;
                render::payments(out, &list, c)?;
            }
            ReplCommand::AmendPayment { id, amount } => {
                let payment: Payment = api.put(
                    &format!("/payments/{id}"),
                    &PaymentPatch {
                        amount: Some(Amount::from(amount)),
                        ..PaymentPatch::default()
                    },
                )?;
                show_transaction_after(api, out, payment.transaction_id, c)?;
            }
            ReplCommand::DeletePayment { id } => {
                let payment: Payment = api.get(&format!("/payments/{id}"))?;
                let _: Deleted = api.delete(&format!("/payments/{id}"))?;
                show_transaction_after(api, out, payment.transaction_id, c)?;
            }
            ReplCommand::AddExpense {
                title,
                amount,
                category,
                note,
            } => {
                let expense: Expense = api.post(
                    "/expenses",
                    &ExpenseDetails {
                        title,
                        amount: Amount::from(amount),
                        category,
                        note,
                        ..ExpenseDetails::default()
                    },
                )?;
                writeln!(out, "[+] Expense {} ({})", expense.title, expense.id)?;
            }
            ReplCommand::Expenses { category } => {
                let filter = ExpenseFilter {
                    category,
                    ..ExpenseFilter::default()
                };
                let list: Vec<Expense> = api.get_with("/expenses", &filter)?;
                render::expenses(out, &list, c)?;
            }
            ReplCommand::Notifications { unread } => {
                let list: Vec<NotificationView> =
                    api.get_with("/notifications", &UnreadOnly { unread_only: unread })?;
                render::notifications(out, &list)?;
            }
            ReplCommand::ReadAll => {
                let marked: MarkedRead = api.post("/notifications/read-all", &())?;
                writeln!(out, "[*] Marked {} notification(s) read", marked.marked)?;
            }
            ReplCommand::Dashboard => {
                let dashboard: Dashboard = api.get("/reports/dashboard")?;
                render::dashboard(out, &dashboard)?;
            }
            ReplCommand::Monthly { year } => {
                let rows: Vec<MonthlyRow> = api.get_with("/reports/monthly", &YearQuery { year })?;
                render::monthly(out, &rows)?;
            }
            ReplCommand::Top { limit } => {
                let list: Vec<TopProduct> =
                    api.get_with("/reports/top-products", &LimitQuery { limit })?;
                render::top_products(out, &list, c)?;
            }
            ReplCommand::LowStock => {
                let list: Vec<Product> = api.get("/reports/low-stock")?;
                render::products(out, &list, c)?;
            }
            ReplCommand::Quit => {
                writeln!(out, "[*] Exiting CLI. Server keeps running.")?;
                return Ok(true);
            }
            ReplCommand::Help => print_help(out)?,
        }
        Ok(false)
    }
}

#[derive(Serialize)]
struct UnreadOnly {
    unread_only: bool,
}

#[derive(Serialize)]
struct YearQuery {
    year: Option<i32>,
}

#[derive(Serialize)]
struct LimitQuery {
    limit: usize,
}

fn party_path(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Client => "/clients",
        PartyKind::Supplier => "/suppliers",
    }
}

fn add_party(
    api: &ApiClient,
    out: &mut Stdout,
    kind: PartyKind,
    name: String,
    phone: Option<String>,
) -> Result<()> {
    let party: Party = api.post(
        party_path(kind),
        &PartyDetails {
            name,
            phone,
            ..PartyDetails::default()
        },
    )?;
    writeln!(out, "[+] {} {} ({})", party.kind, party.name, party.id)?;
    Ok(())
}

fn show_transaction_after(
    api: &ApiClient,
    out: &mut Stdout,
    transaction_id: uuid::Uuid,
    currency: Currency,
) -> Result<()> {
    let tx: Transaction = api.get(&format!("/transactions/{transaction_id}"))?;
    render::transaction(out, &tx, currency)
}

fn print_help(out: &mut Stdout) -> Result<()> {
    const HELP: &[(&str, &str)] = &[
        ("health", "Check the server"),
        ("categories | add-category <NAME> [--ar <NAME>]", "List or add categories"),
        ("products [SEARCH] [--low]", "List products"),
        (
            "add-product <NAME> --price <P> [--cost <C>] [--qty <Q>] [--min <M>]",
            "Add a product",
        ),
        ("adjust <PRODUCT> <DELTA> [--reason <TEXT>]", "Correct stock"),
        ("clients | suppliers", "List parties with balances"),
        ("add-client | add-supplier <NAME> [--phone <P>]", "Add a party"),
        ("statement <client|supplier> <ID>", "Running balance of a party"),
        (
            "sell [--client <ID>] -i <PRODUCT>:<QTY>[@PRICE]... [--paid <A>]",
            "Record a sale",
        ),
        (
            "buy [--supplier <ID>] -i <PRODUCT>:<QTY>@<COST>... [--paid <A>]",
            "Record a purchase",
        ),
        ("transactions [--kind K] [--status S] [--party ID]", "List transactions"),
        ("pay <TRANSACTION> <AMOUNT> [--method M]", "Pay against a transaction"),
        ("payments [--transaction <ID>]", "List payments"),
        ("amend-payment <ID> <AMOUNT> | delete-payment <ID>", "Correct a payment"),
        ("add-expense <TITLE> <AMOUNT> [--category C]", "Record an expense"),
        ("expenses [--category C]", "List expenses"),
        ("notifications [--unread] | read-all", "Read notifications"),
        ("dashboard | monthly [YEAR] | top [--limit N] | low-stock", "Reports"),
        ("quit | exit", "Exit the CLI (server keeps running)"),
    ];
    writeln!(out, "Available commands:")?;
    for (usage, what) in HELP {
        writeln!(out, "  {usage:<68} {what}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_paths() {
        assert_eq!(party_path(PartyKind::Client), "/clients");
        assert_eq!(party_path(PartyKind::Supplier), "/suppliers");
    }
}
