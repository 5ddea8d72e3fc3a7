//! Settlement Reconciler.
//!
//! The single entry point for provider webhooks. Order of operations is
//! fixed: verify signature and freshness, decode, deduplicate by
//! provider event id, then dispatch — so a replayed or forged delivery
//! can never reach a handler, and a redelivery adds no audit entries.
//!
//! Handlers only ever advance state monotonically. A `deposit.received`
//! for a funded escrow, or a `transfer.failed` for a payee the executor
//! already completed, is a no-op rather than a regression.

use chrono::{DateTime, Utc};
use clearhold_core::{AuditLog, LifecycleManager};
use clearhold_types::{
    AuditAction, ClearholdError, EscrowId, EscrowStatus, EventKind, OrchestratorConfig, PayeeId,
    PayeeStatus, ProviderEvent, Result, YieldRecipient,
};
use ed25519_dalek::VerifyingKey;
use rust_decimal::Decimal;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::dedupe::EventSeenGuard;
use crate::verify::WebhookVerifier;

/// What a verified, decoded delivery amounted to. Every variant is an
/// acknowledgement; rejections surface as errors from `ingest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State advanced.
    Applied,
    /// Redelivery of an already-processed event id.
    Duplicate,
    /// Matched an entity whose state was already at or past the target.
    NoOp,
    /// Unknown event type or no matching entity; logged and dropped.
    Ignored,
}

/// HTTP status for a webhook ingest result. Acknowledged outcomes are
/// 200 so the provider stops redelivering; verification failures are
/// 401, undecodable payloads 400, everything else 500.
#[must_use]
pub fn http_status(result: &Result<WebhookOutcome>) -> u16 {
    match result {
        Ok(_) => 200,
        Err(
            ClearholdError::SignatureVerification { .. } | ClearholdError::StaleWebhook { .. },
        ) => 401,
        Err(ClearholdError::MalformedEvent { .. }) => 400,
        Err(_) => 500,
    }
}

/// Consumes provider webhooks and advances escrow/payee state.
#[derive(Debug)]
pub struct SettlementReconciler {
    verifier: WebhookVerifier,
    guard: EventSeenGuard,
}

impl SettlementReconciler {
    #[must_use]
    pub fn new(verifier: WebhookVerifier, event_cache_size: usize) -> Self {
        Self {
            verifier,
            guard: EventSeenGuard::new(event_cache_size),
        }
    }

    pub fn from_config(config: &OrchestratorConfig, key: Option<VerifyingKey>) -> Result<Self> {
        let verifier = WebhookVerifier::from_config(config, key)?;
        Ok(Self::new(verifier, config.event_cache_size))
    }

    /// Ingest one webhook delivery.
    pub fn ingest(
        &mut self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        timestamp: DateTime<Utc>,
        raw_body: &str,
        signature_hex: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome> {
        self.verifier.verify(timestamp, raw_body, signature_hex, now)?;

        let event: ProviderEvent = serde_json::from_str(raw_body).map_err(|e| {
            ClearholdError::MalformedEvent {
                reason: e.to_string(),
            }
        })?;

        // Dedupe before any handler or audit write.
        if !self.guard.first_seen(&event.id) {
            info!(event = %event.id, "duplicate delivery dropped");
            return Ok(WebhookOutcome::Duplicate);
        }

        match &event.kind {
            EventKind::DepositReceived => self.on_deposit_received(lm, audit, &event),
            EventKind::DepositCompleted => self.on_deposit_completed(lm, audit, &event),
            EventKind::TransferCompleted => self.on_transfer_completed(lm, audit, &event),
            EventKind::TransferFailed => self.on_transfer_failed(lm, audit, &event),
            EventKind::Other(kind) => {
                info!(event = %event.id, %kind, "unhandled event type ignored");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Funds observed, not yet irreversible: at most `DEPOSIT_PENDING`.
    fn on_deposit_received(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        event: &ProviderEvent,
    ) -> Result<WebhookOutcome> {
        let Some(escrow_id) = Self::escrow_for_account(lm, event) else {
            return Ok(WebhookOutcome::Ignored);
        };
        let status = lm.ledger().escrow(escrow_id)?.status;
        if status != EscrowStatus::Created {
            return Ok(WebhookOutcome::NoOp);
        }
        lm.note_deposit_observed(audit, escrow_id, event.amount, "reconciler")?;
        Ok(WebhookOutcome::Applied)
    }

    /// Funds irreversible: the good-funds gate opens here and only here.
    fn on_deposit_completed(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        event: &ProviderEvent,
    ) -> Result<WebhookOutcome> {
        let Some(escrow_id) = Self::escrow_for_account(lm, event) else {
            return Ok(WebhookOutcome::Ignored);
        };
        let status = lm.ledger().escrow(escrow_id)?.status;
        if !matches!(
            status,
            EscrowStatus::Created | EscrowStatus::DepositPending
        ) {
            return Ok(WebhookOutcome::NoOp);
        }
        let Some(amount) = event.amount else {
            return Err(ClearholdError::MalformedEvent {
                reason: format!("deposit.completed {} carries no amount", event.id),
            });
        };
        lm.record_deposit(audit, escrow_id, amount, "reconciler")?;
        Ok(WebhookOutcome::Applied)
    }

    /// Provider confirmation of a transfer the executor initiated.
    fn on_transfer_completed(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        event: &ProviderEvent,
    ) -> Result<WebhookOutcome> {
        let Some((payee_id, escrow_id, status)) = Self::payee_for_transfer(lm, event) else {
            return Ok(WebhookOutcome::Ignored);
        };
        if status == PayeeStatus::Completed {
            // Already confirmed, but a crash between the executor's
            // transfers and finalization can leave the escrow CLOSING;
            // the confirmation is the recovery trigger.
            self.finalize_if_settled(lm, audit, escrow_id)?;
            return Ok(WebhookOutcome::NoOp);
        }
        lm.mark_payee_completed(payee_id, None)?;
        audit.record(
            Some(escrow_id),
            AuditAction::TransferCompleted,
            "reconciler",
            json!({ "payee": payee_id.to_string(), "event": event.id }),
        );
        self.finalize_if_settled(lm, audit, escrow_id)?;
        Ok(WebhookOutcome::Applied)
    }

    fn on_transfer_failed(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        event: &ProviderEvent,
    ) -> Result<WebhookOutcome> {
        let Some((payee_id, escrow_id, status)) = Self::payee_for_transfer(lm, event) else {
            return Ok(WebhookOutcome::Ignored);
        };
        // Never regress a completed payee, and a failed one stays failed.
        if status.is_terminal() {
            return Ok(WebhookOutcome::NoOp);
        }
        let reason = event
            .reason
            .clone()
            .unwrap_or_else(|| "provider reported failure".to_string());
        lm.mark_payee_failed(payee_id, &reason)?;
        audit.record(
            Some(escrow_id),
            AuditAction::TransferFailed,
            "reconciler",
            json!({ "payee": payee_id.to_string(), "event": event.id, "reason": reason }),
        );
        Ok(WebhookOutcome::Applied)
    }

    /// Async settlement path: when confirmations (rather than the
    /// executor's synchronous path) complete the last payee of a
    /// CLOSING escrow, finalize from the stamped yield fields.
    fn finalize_if_settled(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
    ) -> Result<()> {
        let escrow = lm.ledger().escrow(escrow_id)?;
        if escrow.status != EscrowStatus::Closing || !lm.all_payees_completed(escrow_id) {
            return Ok(());
        }
        let yield_earned = escrow.yield_earned;
        let yield_recipient = escrow.yield_recipient;

        let payees = lm.ledger().payees_of(escrow_id);
        let mut distributed_total: Decimal =
            payees.iter().filter_map(|p| p.resolved_amount).sum();
        // A depositor yield-return line has no payee record; fold the
        // stamped yield into the total so it is not under-reported.
        if yield_recipient == Some(YieldRecipient::Depositor) {
            distributed_total += yield_earned;
        }
        let mut hasher = Sha256::new();
        hasher.update(b"clearhold:settlement:v1:");
        hasher.update(escrow_id.0.as_bytes());
        for payee in &payees {
            if let Some(transfer_ref) = &payee.transfer_ref {
                hasher.update(transfer_ref.0.as_bytes());
            }
        }
        let settlement_ref = format!("stl-{}", &hex::encode(hasher.finalize())[..16]);

        lm.finalize_closed(
            audit,
            escrow_id,
            distributed_total,
            yield_earned,
            yield_recipient,
            &settlement_ref,
            true,
            "reconciler",
        )
    }

    fn escrow_for_account(lm: &LifecycleManager, event: &ProviderEvent) -> Option<EscrowId> {
        let Some(account) = &event.account_ref else {
            warn!(event = %event.id, kind = %event.kind, "deposit event without account_ref");
            return None;
        };
        let Some(escrow) = lm.ledger().find_by_deposit_account(account) else {
            warn!(event = %event.id, %account, "no escrow for deposit account");
            return None;
        };
        Some(escrow.id)
    }

    fn payee_for_transfer(
        lm: &LifecycleManager,
        event: &ProviderEvent,
    ) -> Option<(PayeeId, EscrowId, PayeeStatus)> {
        let Some(transfer) = &event.transfer_ref else {
            warn!(event = %event.id, kind = %event.kind, "transfer event without transfer_ref");
            return None;
        };
        let Some(payee) = lm.ledger().find_payee_by_transfer(transfer) else {
            warn!(event = %event.id, %transfer, "no payee for transfer");
            return None;
        };
        Some((payee.id, payee.escrow_id, payee.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(http_status(&Ok(WebhookOutcome::Applied)), 200);
        assert_eq!(http_status(&Ok(WebhookOutcome::Duplicate)), 200);
        assert_eq!(http_status(&Ok(WebhookOutcome::Ignored)), 200);
        assert_eq!(
            http_status(&Err(ClearholdError::SignatureVerification {
                reason: "x".into()
            })),
            401
        );
        assert_eq!(
            http_status(&Err(ClearholdError::StaleWebhook { age_secs: 900 })),
            401
        );
        assert_eq!(
            http_status(&Err(ClearholdError::MalformedEvent { reason: "x".into() })),
            400
        );
        assert_eq!(http_status(&Err(ClearholdError::Internal("x".into()))), 500);
    }
}
