//! Shared request/response types for the mizan HTTP API.
//!
//! Used by both `mizan-server` (the producer) and `mizan-cli` (the
//! consumer), so the wire format lives next to the records it carries.

use std::fmt;

use chrono::{DateTime, Utc};
use mizan_primitives::{Currency, Locale};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::books::{Notification, NotificationKind};

// ---------------------------------------------------------------------------
// Generic API envelope
// ---------------------------------------------------------------------------

/// JSON envelope for all REST responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Convenience constructor for a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Convenience constructor for an error response.
    pub fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response for `GET /api/v1/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServerStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub currency: Currency,
    /// `false` when the server runs without PostgreSQL.
    pub persistent: bool,
}

/// Server lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Running,
    ShuttingDown,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::ShuttingDown => f.write_str("shutting_down"),
        }
    }
}

/// A notification rendered in the caller's language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub locale: Locale,
    /// `"rtl"` for Arabic, `"ltr"` otherwise.
    pub dir: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationView {
    pub fn render(notification: &Notification, locale: Locale, currency: Currency) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            subject_id: notification.subject_id,
            title: notification.title(locale).to_owned(),
            message: notification.message(locale, currency),
            locale,
            dir: if locale.is_rtl() { "rtl" } else { "ltr" }.to_owned(),
            read: notification.read,
            created_at: notification.created_at,
        }
    }
}

/// Response for `GET /api/v1/notifications/unread-count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: usize,
}

/// Response for `POST /api/v1/notifications/read-all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedRead {
    pub marked: usize,
}

/// Response for every `DELETE` route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub id: Uuid,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use mizan_primitives::Amount;
    use rust_decimal::dec;

    use super::*;

    #[test]
    fn test_api_response_ok_serialization() -> anyhow::Result<()> {
        let resp = ApiResponse::ok(UnreadCount { unread: 3 });
        let json = serde_json::to_string(&resp)?;

        assert!(json.contains(r#""success":true"#));
        assert!(json.contains(r#""unread":3"#));
        assert!(!json.contains(r#""error""#));
        Ok(())
    }

    #[test]
    fn test_api_response_err_serialization() -> anyhow::Result<()> {
        let resp: ApiResponse<Deleted> = ApiResponse::err("Product not found".into());
        let json = serde_json::to_string(&resp)?;

        assert!(json.contains(r#""success":false"#));
        assert!(json.contains(r#""error":"Product not found""#));
        assert!(!json.contains(r#""data""#));
        Ok(())
    }

    #[test]
    fn test_health_response_round_trip() -> anyhow::Result<()> {
        let original = ApiResponse::ok(HealthResponse {
            status: ServerStatus::Running,
            version: "0.1.0".into(),
            uptime_secs: 42,
            currency: Currency::sar(),
            persistent: false,
        });
        let json = serde_json::to_string(&original)?;
        let decoded: ApiResponse<HealthResponse> = serde_json::from_str(&json)?;

        let data = decoded
            .data
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("missing data"))?;
        assert_eq!(data.status, ServerStatus::Running);
        assert_eq!(data.currency, Currency::sar());
        assert!(!data.persistent);
        Ok(())
    }

    #[test]
    fn test_server_status_display() {
        assert_eq!(ServerStatus::Running.to_string(), "running");
        assert_eq!(ServerStatus::ShuttingDown.to_string(), "shutting_down");
    }

    #[test]
    fn test_notification_view_renders_locale() {
        let n = Notification::new(
            NotificationKind::PaymentMade,
            None,
            "PUR-000002".into(),
        )
        .with_amount(Amount::from(dec!(75.5)));

        let en = NotificationView::render(&n, Locale::En, Currency::usd());
        assert_eq!(en.title, "Payment made");
        assert_eq!(en.message, "Paid 75.5 USD for PUR-000002");
        assert_eq!(en.dir, "ltr");

        let ar = NotificationView::render(&n, Locale::Ar, Currency::usd());
        assert_eq!(ar.title, "تم سداد دفعة");
        assert_eq!(ar.dir, "rtl");
        assert_eq!(ar.locale, Locale::Ar);
    }
}
