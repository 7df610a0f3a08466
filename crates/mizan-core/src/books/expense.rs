use std::fmt;

use chrono::{DateTime, Utc};
use mizan_primitives::Amount;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{
    ledger::{newest_first, optional_text, positive, required_text},
    Books, BooksError, ChangeSet, Committed, DateRange, EntityKind, Record, RecordKey,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Salaries,
    Utilities,
    Supplies,
    Maintenance,
    Transport,
    Marketing,
    Taxes,
    #[default]
    Other,
}

impl ExpenseCategory {
    pub const ALL: [Self; 9] = [
        Self::Rent,
        Self::Salaries,
        Self::Utilities,
        Self::Supplies,
        Self::Maintenance,
        Self::Transport,
        Self::Marketing,
        Self::Taxes,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rent => "rent",
            Self::Salaries => "salaries",
            Self::Utilities => "utilities",
            Self::Supplies => "supplies",
            Self::Maintenance => "maintenance",
            Self::Transport => "transport",
            Self::Marketing => "marketing",
            Self::Taxes => "taxes",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub title: String,
    pub amount: Amount,
    pub category: ExpenseCategory,
    pub note: Option<String>,
    pub date: DateTime<Utc>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub title: String,
    pub amount: Amount,
    #[serde(default)]
    pub category: ExpenseCategory,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    #[serde(default)]
    pub category: Option<ExpenseCategory>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl Books {
    pub fn expense(&self, id: Uuid) -> Result<&Expense, BooksError> {
        self.expenses
            .get(&id)
            .ok_or(BooksError::not_found(EntityKind::Expense, id))
    }

    pub fn expenses(&self, filter: &ExpenseFilter) -> Vec<&Expense> {
        let range = DateRange::new(filter.from, filter.to);
        let mut list: Vec<_> = self
            .expenses
            .values()
            .filter(|e| filter.category.is_none_or(|c| e.category == c))
            .filter(|e| range.contains(e.date))
            .collect();
        newest_first(&mut list, |e| (e.date, e.id));
        list
    }

    #[instrument(skip_all, fields(category = %details.category, amount = %details.amount))]
    pub fn create_expense(&mut self, details: ExpenseDetails) -> Result<Committed<Expense>, BooksError> {
        let title = required_text("title", &details.title)?;
        let amount = positive("amount", self.money(details.amount))?;
        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4(),
            title,
            amount,
            category: details.category,
            note: optional_text(details.note),
            date: details.date.unwrap_or(now),
            created_by: optional_text(details.created_by),
            created_at: now,
            updated_at: now,
        };
        self.expenses.insert(expense.id, expense.clone());

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Expense(expense.clone()));
        Ok(Committed::new(expense, changes))
    }

    /// Replace an expense's details. The original author is kept.
    #[instrument(skip_all, fields(expense_id = %id))]
    pub fn update_expense(
        &mut self,
        id: Uuid,
        details: ExpenseDetails,
    ) -> Result<Committed<Expense>, BooksError> {
        self.expense(id)?;
        let title = required_text("title", &details.title)?;
        let amount = positive("amount", self.money(details.amount))?;
        let Some(expense) = self.expenses.get_mut(&id) else {
            return Err(BooksError::not_found(EntityKind::Expense, id));
        };
        expense.title = title;
        expense.amount = amount;
        expense.category = details.category;
        expense.note = optional_text(details.note);
        if let Some(date) = details.date {
            expense.date = date;
        }
        expense.updated_at = Utc::now();
        let expense = expense.clone();

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Expense(expense.clone()));
        Ok(Committed::new(expense, changes))
    }

    #[instrument(skip_all, fields(expense_id = %id))]
    pub fn delete_expense(&mut self, id: Uuid) -> Result<Committed<Expense>, BooksError> {
        let Some(expense) = self.expenses.remove(&id) else {
            return Err(BooksError::not_found(EntityKind::Expense, id));
        };
        let mut changes = ChangeSet::new();
        changes.delete(RecordKey::Expense(id));
        Ok(Committed::new(expense, changes))
    }
}
