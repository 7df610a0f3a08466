use std::{cmp::Ordering, fmt};

use chrono::{DateTime, Utc};
use mizan_primitives::Amount;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{
    ledger::{optional_text, required_text},
    Books, BooksError, ChangeSet, Committed, EntityKind, Record, RecordKey, TransactionKind,
};

/// Clients buy from the shop, suppliers sell to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Client,
    Supplier,
}

impl PartyKind {
    /// The transaction kind a party of this kind takes part in.
    pub fn transaction_kind(self) -> TransactionKind {
        match self {
            Self::Client => TransactionKind::Sale,
            Self::Supplier => TransactionKind::Purchase,
        }
    }
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Client => "client",
            Self::Supplier => "supplier",
        })
    }
}

/// A client or supplier. `total_due`, `amount_paid` and `balance` are
/// derived from the party's transactions and are never set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub kind: PartyKind,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub total_due: Amount,
    pub amount_paid: Amount,
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetails {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementEntry {
    Charge,
    Payment,
}

/// One row of a party statement. For charges `debit` holds the transaction
/// total; for payments `credit` holds the amount paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub date: DateTime<Utc>,
    pub entry: StatementEntry,
    pub transaction_id: Uuid,
    pub reference: String,
    pub debit: Amount,
    pub credit: Amount,
    pub balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyStatement {
    pub party: Party,
    pub lines: Vec<StatementLine>,
}

impl Books {
    /// Look up a party of the given kind. A party of the other kind is
    /// reported as not found.
    pub fn party(&self, kind: PartyKind, id: Uuid) -> Result<&Party, BooksError> {
        self.parties
            .get(&id)
            .filter(|p| p.kind == kind)
            .ok_or(BooksError::not_found(kind.into(), id))
    }

    /// All parties of `kind`, ordered by name.
    pub fn parties(&self, kind: PartyKind) -> Vec<&Party> {
        let mut list: Vec<_> = self.parties.values().filter(|p| p.kind == kind).collect();
        list.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        list
    }

    #[instrument(skip_all, fields(kind = %kind, name = %details.name))]
    pub fn create_party(
        &mut self,
        kind: PartyKind,
        details: PartyDetails,
    ) -> Result<Committed<Party>, BooksError> {
        let details = validate_party(details)?;
        let now = Utc::now();
        let party = Party {
            id: Uuid::new_v4(),
            kind,
            name: details.name,
            phone: details.phone,
            email: details.email,
            address: details.address,
            note: details.note,
            total_due: Amount::ZERO,
            amount_paid: Amount::ZERO,
            balance: Amount::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.parties.insert(party.id, party.clone());

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Party(party.clone()));
        Ok(Committed::new(party, changes))
    }

    #[instrument(skip_all, fields(kind = %kind, party_id = %id))]
    pub fn update_party(
        &mut self,
        kind: PartyKind,
        id: Uuid,
        details: PartyDetails,
    ) -> Result<Committed<Party>, BooksError> {
        self.party(kind, id)?;
        let details = validate_party(details)?;
        let Some(party) = self.parties.get_mut(&id) else {
            return Err(BooksError::not_found(kind.into(), id));
        };
        party.name = details.name;
        party.phone = details.phone;
        party.email = details.email;
        party.address = details.address;
        party.note = details.note;
        party.updated_at = Utc::now();
        let party = party.clone();

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Party(party.clone()));
        Ok(Committed::new(party, changes))
    }

    /// Remove a party that no transaction or product refers to.
    #[instrument(skip_all, fields(kind = %kind, party_id = %id))]
    pub fn delete_party(&mut self, kind: PartyKind, id: Uuid) -> Result<Committed<Party>, BooksError> {
        self.party(kind, id)?;
        let referenced = self.transactions.values().any(|tx| tx.party_id == Some(id))
            || self.products.values().any(|p| p.supplier_id == Some(id));
        if referenced {
            return Err(BooksError::InUse {
                entity: kind.into(),
                id,
            });
        }
        let Some(party) = self.parties.remove(&id) else {
            return Err(BooksError::not_found(kind.into(), id));
        };

        let mut changes = ChangeSet::new();
        changes.delete(RecordKey::Party(id));
        Ok(Committed::new(party, changes))
    }

    /// The party's transactions and payments in date order with a running
    /// balance. The final balance equals [`Party::balance`].
    ///
    /// A payment dated before its transaction still sorts after the charge,
    /// so the running balance never dips below zero.
    #[instrument(skip_all, level = "debug", fields(kind = %kind, party_id = %id))]
    pub fn statement(&self, kind: PartyKind, id: Uuid) -> Result<PartyStatement, BooksError> {
        let party = self.party(kind, id)?.clone();

        let mut lines: Vec<(DateTime<Utc>, DateTime<Utc>, StatementLine)> = Vec::new();
        for tx in self.transactions.values().filter(|tx| tx.party_id == Some(id)) {
            lines.push((
                tx.date,
                tx.created_at,
                StatementLine {
                    date: tx.date,
                    entry: StatementEntry::Charge,
                    transaction_id: tx.id,
                    reference: tx.reference.clone(),
                    debit: tx.total,
                    credit: Amount::ZERO,
                    balance: Amount::ZERO,
                },
            ));
            for payment in self.payments.values().filter(|p| p.transaction_id == tx.id) {
                lines.push((
                    payment.paid_at.max(tx.date),
                    payment.created_at,
                    StatementLine {
                        date: payment.paid_at,
                        entry: StatementEntry::Payment,
                        transaction_id: tx.id,
                        reference: tx.reference.clone(),
                        debit: Amount::ZERO,
                        credit: payment.amount,
                        balance: Amount::ZERO,
                    },
                ));
            }
        }

        lines.sort_by(|(a_at, a_created, a), (b_at, b_created, b)| {
            a_at.cmp(b_at)
                .then_with(|| entry_order(a.entry, b.entry))
                .then(a_created.cmp(b_created))
        });

        let mut running = Amount::ZERO;
        let lines = lines
            .into_iter()
            .map(|(_, _, mut line)| {
                running += line.debit;
                running -= line.credit;
                line.balance = running;
                line
            })
            .collect();

        Ok(PartyStatement { party, lines })
    }

    /// Look up a party and require it to be of `expected` kind.
    pub(crate) fn party_of_kind(&self, id: Uuid, expected: PartyKind) -> Result<&Party, BooksError> {
        let party = self
            .parties
            .get(&id)
            .ok_or(BooksError::not_found(expected.into(), id))?;
        if party.kind != expected {
            return Err(BooksError::PartyKindMismatch {
                expected,
                found: party.kind,
            });
        }
        Ok(party)
    }

    /// Recompute a party's totals from its transactions and record the result.
    pub(crate) fn refresh_party(&mut self, id: Uuid, changes: &mut ChangeSet) {
        let (total_due, amount_paid) = self
            .transactions
            .values()
            .filter(|tx| tx.party_id == Some(id))
            .fold((Amount::ZERO, Amount::ZERO), |(due, paid), tx| {
                (due + tx.total, paid + tx.amount_paid)
            });
        let Some(party) = self.parties.get_mut(&id) else {
            return;
        };
        if party.total_due == total_due && party.amount_paid == amount_paid {
            return;
        }
        party.total_due = total_due;
        party.amount_paid = amount_paid;
        party.balance = total_due - amount_paid;
        party.updated_at = Utc::now();
        changes.upsert(Record::Party(party.clone()));
    }
}

fn entry_order(a: StatementEntry, b: StatementEntry) -> Ordering {
    let rank = |e| match e {
        StatementEntry::Charge => 0,
        StatementEntry::Payment => 1,
    };
    rank(a).cmp(&rank(b))
}

fn validate_party(details: PartyDetails) -> Result<PartyDetails, BooksError> {
    let email = optional_text(details.email);
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(BooksError::invalid("email", "must be an email address"));
    }
    Ok(PartyDetails {
        name: required_text("name", &details.name)?,
        phone: optional_text(details.phone),
        email,
        address: optional_text(details.address),
        note: optional_text(details.note),
    })
}
