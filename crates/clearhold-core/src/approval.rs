//! Approval Workflow Engine — the M-of-N gate on fund release.
//!
//! A closure request is an intent gathering signatures from the escrow's
//! registered signers. The engine counts unique signer confirmations
//! against `required_approvals`; signature order is irrelevant. It never
//! executes the disbursement itself — execution is a separate explicit
//! step gated by [`ApprovalState::can_execute`].

use clearhold_types::{
    AuditAction, ClearholdError, EscrowId, EscrowStatus, Result, WalletAddress,
};
use serde_json::json;
use tracing::info;

use crate::audit::AuditLog;
use crate::lifecycle::LifecycleManager;

/// Snapshot of an escrow's approval progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalState {
    pub confirmations: u32,
    pub required: u32,
}

impl ApprovalState {
    /// Threshold met: the closure intent may be executed.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        self.confirmations >= self.required
    }
}

/// Gathers signatures; never auto-executes.
#[derive(Debug, Default)]
pub struct ApprovalEngine;

impl ApprovalEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Start the closure intent. The initiator is signer #1 and signs
    /// immediately; the escrow enters CLOSING. With
    /// `required_approvals == 1` the intent is executable at once — no
    /// intermediate waiting state.
    pub fn initiate(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        initiator: &WalletAddress,
    ) -> Result<ApprovalState> {
        let status = lm.ledger().escrow(escrow_id)?.status;
        if !matches!(status, EscrowStatus::ReadyToClose | EscrowStatus::Closing) {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: status.to_string(),
                attempted: "close initiation".into(),
            });
        }

        lm.sign(escrow_id, initiator)?;
        lm.begin_closing(audit, escrow_id, initiator)?;

        let state = Self::state(lm, escrow_id)?;
        info!(
            escrow = %escrow_id,
            initiator = initiator.short(),
            confirmations = state.confirmations,
            required = state.required,
            "close initiated"
        );
        audit.record(
            Some(escrow_id),
            AuditAction::CloseInitiated,
            initiator.to_string(),
            json!({ "required_approvals": state.required }),
        );
        audit.record(
            Some(escrow_id),
            AuditAction::SignatureAdded,
            initiator.to_string(),
            json!({ "confirmations": state.confirmations }),
        );
        Ok(state)
    }

    /// Add one signature to an in-flight closure intent.
    ///
    /// Fails with `NotAuthorized` for unregistered wallets and
    /// `AlreadySigned` on a repeat signature. Returns the updated count
    /// and whether the intent became executable.
    pub fn add_signature(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        wallet: &WalletAddress,
    ) -> Result<ApprovalState> {
        let status = lm.ledger().escrow(escrow_id)?.status;
        if status != EscrowStatus::Closing {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: status.to_string(),
                attempted: "signature".into(),
            });
        }

        lm.sign(escrow_id, wallet)?;
        let state = Self::state(lm, escrow_id)?;
        audit.record(
            Some(escrow_id),
            AuditAction::SignatureAdded,
            wallet.to_string(),
            json!({
                "confirmations": state.confirmations,
                "executable": state.can_execute(),
            }),
        );
        Ok(state)
    }

    /// Current confirmation count vs. threshold.
    pub fn state(lm: &LifecycleManager, escrow_id: EscrowId) -> Result<ApprovalState> {
        let required = lm.ledger().escrow(escrow_id)?.required_approvals;
        let confirmations = u32::try_from(
            lm.ledger()
                .signers_of(escrow_id)
                .iter()
                .filter(|s| s.has_signed)
                .count(),
        )
        .map_err(|_| ClearholdError::Internal("signer count overflow".into()))?;
        Ok(ApprovalState {
            confirmations,
            required,
        })
    }
}
