//! Provider webhook event model.
//!
//! Events arrive as signed JSON payloads from the custody provider.
//! Unknown event types decode into [`EventKind::Other`] so the handler
//! can log and ignore them instead of failing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DepositAccountRef, TransferRef};

/// Provider event type. The wire form is the dotted provider string
/// (`"deposit.completed"` etc.); anything unrecognized round-trips
/// through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Funds observed but not yet irreversible. Never good funds.
    DepositReceived,
    /// Funds irreversible — the good-funds gate opens on this and only this.
    DepositCompleted,
    TransferCompleted,
    TransferFailed,
    Other(String),
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "deposit.received" => Self::DepositReceived,
            "deposit.completed" => Self::DepositCompleted,
            "transfer.completed" => Self::TransferCompleted,
            "transfer.failed" => Self::TransferFailed,
            _ => Self::Other(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::DepositReceived => "deposit.received".to_string(),
            EventKind::DepositCompleted => "deposit.completed".to_string(),
            EventKind::TransferCompleted => "transfer.completed".to_string(),
            EventKind::TransferFailed => "transfer.failed".to_string(),
            EventKind::Other(s) => s,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from(self.clone()))
    }
}

/// One asynchronous provider event, deduplicated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    /// Provider-assigned event id; duplicate deliveries share it.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Deposit-receiving account, set on deposit events.
    #[serde(default)]
    pub account_ref: Option<DepositAccountRef>,
    /// Transfer handle, set on transfer events.
    #[serde(default)]
    pub transfer_ref: Option<TransferRef>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Failure detail on `transfer.failed`.
    #[serde(default)]
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_parse() {
        assert_eq!(
            EventKind::from("deposit.completed".to_string()),
            EventKind::DepositCompleted
        );
        assert_eq!(
            EventKind::from("transfer.failed".to_string()),
            EventKind::TransferFailed
        );
    }

    #[test]
    fn unknown_kind_preserved() {
        let kind = EventKind::from("account.frozen".to_string());
        assert_eq!(kind, EventKind::Other("account.frozen".to_string()));
        assert_eq!(kind.to_string(), "account.frozen");
    }

    #[test]
    fn deserializes_provider_payload() {
        let body = r#"{
            "id": "evt_01",
            "type": "deposit.completed",
            "account_ref": "acct_9",
            "amount": "50000.00",
            "occurred_at": "2026-03-01T12:00:00Z"
        }"#;
        let ev: ProviderEvent = serde_json::from_str(body).unwrap();
        assert_eq!(ev.id, "evt_01");
        assert_eq!(ev.kind, EventKind::DepositCompleted);
        assert_eq!(ev.account_ref, Some(DepositAccountRef::new("acct_9")));
        assert_eq!(ev.amount, Some(Decimal::new(50_000_00, 2)));
        assert!(ev.transfer_ref.is_none());
    }

    #[test]
    fn unknown_type_still_deserializes() {
        let body = r#"{
            "id": "evt_02",
            "type": "kyc.review_opened",
            "occurred_at": "2026-03-01T12:00:00Z"
        }"#;
        let ev: ProviderEvent = serde_json::from_str(body).unwrap();
        assert!(matches!(ev.kind, EventKind::Other(_)));
    }
}
