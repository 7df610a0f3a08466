//! Text encodings of the enum columns. Kept in step with the serde names
//! so rows read the same as the JSON API.

use anyhow::{Result, bail};
use mizan_core::books::{
    ExpenseCategory, NotificationKind, PartyKind, PaymentMethod, PaymentStatus, TransactionKind,
};

pub(crate) fn party_kind_str(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Client => "client",
        PartyKind::Supplier => "supplier",
    }
}

pub(crate) fn parse_party_kind(s: &str) -> Result<PartyKind> {
    match s {
        "client" => Ok(PartyKind::Client),
        "supplier" => Ok(PartyKind::Supplier),
        other => bail!("unknown party kind: {other}"),
    }
}

pub(crate) fn transaction_kind_str(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Sale => "sale",
        TransactionKind::Purchase => "purchase",
    }
}

pub(crate) fn parse_transaction_kind(s: &str) -> Result<TransactionKind> {
    match s {
        "sale" => Ok(TransactionKind::Sale),
        "purchase" => Ok(TransactionKind::Purchase),
        other => bail!("unknown transaction kind: {other}"),
    }
}

pub(crate) fn status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Paid => "paid",
        PaymentStatus::Partial => "partial",
        PaymentStatus::Unpaid => "unpaid",
    }
}

pub(crate) fn parse_status(s: &str) -> Result<PaymentStatus> {
    match s {
        "paid" => Ok(PaymentStatus::Paid),
        "partial" => Ok(PaymentStatus::Partial),
        "unpaid" => Ok(PaymentStatus::Unpaid),
        other => bail!("unknown payment status: {other}"),
    }
}

pub(crate) fn method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "cash",
        PaymentMethod::Card => "card",
        PaymentMethod::BankTransfer => "bank_transfer",
        PaymentMethod::Cheque => "cheque",
        PaymentMethod::Other => "other",
    }
}

pub(crate) fn parse_method(s: &str) -> Result<PaymentMethod> {
    match s {
        "cash" => Ok(PaymentMethod::Cash),
        "card" => Ok(PaymentMethod::Card),
        "bank_transfer" => Ok(PaymentMethod::BankTransfer),
        "cheque" => Ok(PaymentMethod::Cheque),
        "other" => Ok(PaymentMethod::Other),
        other => bail!("unknown payment method: {other}"),
    }
}

pub(crate) fn parse_expense_category(s: &str) -> Result<ExpenseCategory> {
    ExpenseCategory::ALL
        .into_iter()
        .find(|c| c.as_str() == s)
        .ok_or_else(|| anyhow::anyhow!("unknown expense category: {s}"))
}

pub(crate) fn notification_kind_str(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::LowStock => "low_stock",
        NotificationKind::OutOfStock => "out_of_stock",
        NotificationKind::PaymentReceived => "payment_received",
        NotificationKind::PaymentMade => "payment_made",
        NotificationKind::TransactionCreated => "transaction_created",
    }
}

pub(crate) fn parse_notification_kind(s: &str) -> Result<NotificationKind> {
    match s {
        "low_stock" => Ok(NotificationKind::LowStock),
        "out_of_stock" => Ok(NotificationKind::OutOfStock),
        "payment_received" => Ok(NotificationKind::PaymentReceived),
        "payment_made" => Ok(NotificationKind::PaymentMade),
        "transaction_created" => Ok(NotificationKind::TransactionCreated),
        other => bail!("unknown notification kind: {other}"),
    }
}
