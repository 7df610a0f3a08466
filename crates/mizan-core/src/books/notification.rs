use chrono::{DateTime, Utc};
use mizan_primitives::{Amount, Currency, Locale, Money, Quantity};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::books::{Books, BooksError, ChangeSet, Committed, EntityKind, Record, RecordKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LowStock,
    OutOfStock,
    PaymentReceived,
    PaymentMade,
    TransactionCreated,
}

/// An event raised by the books. Only the facts are stored; the text is
/// rendered in the reader's language by [`Notification::title`] and
/// [`Notification::message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    /// The product or transaction the notification is about.
    pub subject_id: Option<Uuid>,
    /// Product name or transaction reference.
    pub subject: String,
    pub amount: Option<Amount>,
    pub quantity: Option<Quantity>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, subject_id: Option<Uuid>, subject: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subject_id,
            subject,
            amount: None,
            quantity: None,
            read: false,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn title(&self, locale: Locale) -> &'static str {
        match (self.kind, locale) {
            (NotificationKind::LowStock, Locale::En) => "Low stock",
            (NotificationKind::LowStock, Locale::Ar) => "مخزون منخفض",
            (NotificationKind::OutOfStock, Locale::En) => "Out of stock",
            (NotificationKind::OutOfStock, Locale::Ar) => "نفاد المخزون",
            (NotificationKind::PaymentReceived, Locale::En) => "Payment received",
            (NotificationKind::PaymentReceived, Locale::Ar) => "تم استلام دفعة",
            (NotificationKind::PaymentMade, Locale::En) => "Payment made",
            (NotificationKind::PaymentMade, Locale::Ar) => "تم سداد دفعة",
            (NotificationKind::TransactionCreated, Locale::En) => "New transaction",
            (NotificationKind::TransactionCreated, Locale::Ar) => "معاملة جديدة",
        }
    }

    pub fn message(&self, locale: Locale, currency: Currency) -> String {
        let subject = &self.subject;
        let amount = Money::new(self.amount.unwrap_or_default(), currency);
        let quantity = self.quantity.unwrap_or_default();
        match (self.kind, locale) {
            (NotificationKind::LowStock, Locale::En) => {
                format!("{subject} is running low ({quantity} left)")
            }
            (NotificationKind::LowStock, Locale::Ar) => {
                format!("المنتج {subject} على وشك النفاد (المتبقي {quantity})")
            }
            (NotificationKind::OutOfStock, Locale::En) => format!("{subject} is out of stock"),
            (NotificationKind::OutOfStock, Locale::Ar) => format!("نفد مخزون المنتج {subject}"),
            (NotificationKind::PaymentReceived, Locale::En) => {
                format!("Received {amount} for {subject}")
            }
            (NotificationKind::PaymentReceived, Locale::Ar) => {
                format!("تم استلام {amount} عن {subject}")
            }
            (NotificationKind::PaymentMade, Locale::En) => format!("Paid {amount} for {subject}"),
            (NotificationKind::PaymentMade, Locale::Ar) => {
                format!("تم سداد {amount} عن {subject}")
            }
            (NotificationKind::TransactionCreated, Locale::En) => {
                format!("{subject} created for {amount}")
            }
            (NotificationKind::TransactionCreated, Locale::Ar) => {
                format!("تم إنشاء {subject} بقيمة {amount}")
            }
        }
    }
}

impl Books {
    pub fn notification(&self, id: Uuid) -> Result<&Notification, BooksError> {
        self.notifications
            .get(&id)
            .ok_or(BooksError::not_found(EntityKind::Notification, id))
    }

    /// Notifications newest first, optionally only the unread ones.
    pub fn notifications(&self, unread_only: bool) -> Vec<&Notification> {
        let mut list: Vec<_> = self
            .notifications
            .values()
            .filter(|n| !unread_only || !n.read)
            .collect();
        list.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        list
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.values().filter(|n| !n.read).count()
    }

    #[instrument(skip_all, level = "debug", fields(notification_id = %id))]
    pub fn mark_notification_read(&mut self, id: Uuid) -> Result<Committed<Notification>, BooksError> {
        let Some(notification) = self.notifications.get_mut(&id) else {
            return Err(BooksError::not_found(EntityKind::Notification, id));
        };
        notification.read = true;
        let notification = notification.clone();

        let mut changes = ChangeSet::new();
        changes.upsert(Record::Notification(notification.clone()));
        Ok(Committed::new(notification, changes))
    }

    /// Mark every unread notification read, returning how many changed.
    #[instrument(skip_all, level = "debug")]
    pub fn mark_all_notifications_read(&mut self) -> Committed<usize> {
        let mut changes = ChangeSet::new();
        for notification in self.notifications.values_mut().filter(|n| !n.read) {
            notification.read = true;
            changes.upsert(Record::Notification(notification.clone()));
        }
        Committed::new(changes.len(), changes)
    }

    #[instrument(skip_all, level = "debug", fields(notification_id = %id))]
    pub fn delete_notification(&mut self, id: Uuid) -> Result<Committed<Notification>, BooksError> {
        let Some(notification) = self.notifications.remove(&id) else {
            return Err(BooksError::not_found(EntityKind::Notification, id));
        };
        let mut changes = ChangeSet::new();
        changes.delete(RecordKey::Notification(id));
        Ok(Committed::new(notification, changes))
    }

    pub(crate) fn raise(&mut self, notification: Notification, changes: &mut ChangeSet) {
        tracing::debug!(kind = ?notification.kind, subject = %notification.subject, "notification raised");
        self.notifications
            .insert(notification.id, notification.clone());
        changes.upsert(Record::Notification(notification));
    }
}
