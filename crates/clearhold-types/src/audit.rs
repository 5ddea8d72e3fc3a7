//! Audit events — the append-only compliance record.
//!
//! Every meaningful mutation writes one event carrying the action type,
//! structured details, and the acting identity. Details never include
//! raw bank data; tokenized refs and amounts only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuditEventId, EscrowId};

/// What happened. One variant per meaningful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    EscrowOpened,
    DepositInstructionsIssued,
    /// Provider observed incoming funds that are not yet irreversible.
    DepositObserved,
    DepositRecorded,
    MarkedReadyToClose,
    ClosingStarted,
    EscrowClosed,
    EscrowCancelled,
    SignerRegistered,
    CloseInitiated,
    SignatureAdded,
    PayeeRegistered,
    TransferInitiated,
    TransferCompleted,
    TransferFailed,
    TransferRetried,
    YieldReturned,
    BatchUploaded,
    BatchApproved,
    BatchRejected,
    BatchExecuted,
    BatchCancelled,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // serde's snake_case name doubles as the wire/log form.
        let s = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    /// Escrow the event belongs to; `None` for batch-level events.
    pub escrow_id: Option<EscrowId>,
    pub action: AuditAction,
    /// Acting identity: a wallet address, "reconciler", or "system".
    pub actor: String,
    /// Structured details. Never sensitive financial data.
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(
        escrow_id: Option<EscrowId>,
        action: AuditAction,
        actor: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: AuditEventId::new(),
            escrow_id,
            action,
            actor: actor.into(),
            details,
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_is_snake_case() {
        assert_eq!(AuditAction::EscrowClosed.to_string(), "escrow_closed");
        assert_eq!(AuditAction::SignatureAdded.to_string(), "signature_added");
    }

    #[test]
    fn event_carries_details() {
        let eid = EscrowId::new();
        let ev = AuditEvent::new(
            Some(eid),
            AuditAction::DepositRecorded,
            "reconciler",
            json!({ "amount": "50000.00" }),
        );
        assert_eq!(ev.escrow_id, Some(eid));
        assert_eq!(ev.details["amount"], "50000.00");
    }

    #[test]
    fn serde_roundtrip() {
        let ev = AuditEvent::new(None, AuditAction::BatchUploaded, "0xabc", json!({}));
        let json = serde_json::to_string(&ev).unwrap();
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev.id, back.id);
        assert_eq!(ev.action, back.action);
    }
}
