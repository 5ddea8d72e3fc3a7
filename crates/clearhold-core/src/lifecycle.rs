//! Escrow Lifecycle Manager.
//!
//! Owns the ledger and exposes the guarded operations that move an
//! escrow through
//! `CREATED → DEPOSIT_PENDING → FUNDS_RECEIVED → READY_TO_CLOSE →
//! CLOSING → CLOSED`. Every transition writes an audit entry.
//!
//! Cancellation policy: the status enum admits `CANCELLED` from any
//! pre-CLOSING state, but a funded escrow holds client money — the
//! manager only permits cancellation while `initial_deposit` is zero.

use clearhold_types::{
    AuditAction, BankDetails, ClearholdError, CustodyGateway, Escrow, EscrowId, EscrowStatus,
    IdempotencyKey, NotificationSink, Payee, PayeeId, PayeeRole, PayeeStatus, PaymentRail,
    PayoutSpec, Result, Signer, TransferRef, WalletAddress, YieldRecipient,
    constants::MIN_REQUIRED_APPROVALS,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use crate::audit::AuditLog;
use crate::ledger::EscrowLedger;
use crate::notify::notify_best_effort;

/// Parameters for opening a new escrow.
#[derive(Debug, Clone)]
pub struct OpenEscrowRequest {
    /// External-facing reference, unique per transaction.
    pub reference: String,
    pub purchase_price: Decimal,
    pub required_approvals: u32,
    pub yield_enabled: bool,
    /// Chain the segregated wallet is created on.
    pub chain: String,
}

/// Owns the escrow ledger and the lifecycle state machine.
#[derive(Debug, Default)]
pub struct LifecycleManager {
    ledger: EscrowLedger,
}

impl LifecycleManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ledger: EscrowLedger::new(),
        }
    }

    /// Read access to the ledger for queries.
    #[must_use]
    pub fn ledger(&self) -> &EscrowLedger {
        &self.ledger
    }

    // -----------------------------------------------------------------
    // Opening
    // -----------------------------------------------------------------

    /// Open an escrow: provision the segregated wallet and deposit
    /// account at the provider and tokenize the depositor's return
    /// destination. The raw bank details are dropped on return.
    pub fn open(
        &mut self,
        gateway: &mut dyn CustodyGateway,
        audit: &mut AuditLog,
        req: &OpenEscrowRequest,
        depositor_bank: &BankDetails,
        actor: &WalletAddress,
    ) -> Result<EscrowId> {
        if req.required_approvals < MIN_REQUIRED_APPROVALS {
            return Err(ClearholdError::Configuration(format!(
                "required_approvals must be >= {MIN_REQUIRED_APPROVALS}"
            )));
        }
        if req.purchase_price <= Decimal::ZERO {
            return Err(ClearholdError::InvalidPayout {
                reason: "purchase price must be positive".into(),
            });
        }

        let wallet_ref = gateway.create_wallet(
            &IdempotencyKey::derive("escrow-wallet", &req.reference, "create"),
            &req.chain,
        )?;
        let deposit_account_ref = gateway.create_deposit_account(
            &IdempotencyKey::derive("escrow-account", &req.reference, "create"),
            &wallet_ref,
            req.yield_enabled,
        )?;
        let depositor_ref = gateway.tokenize_recipient(
            &IdempotencyKey::derive("escrow-depositor", &req.reference, "tokenize"),
            depositor_bank,
        )?;

        let now = Utc::now();
        let escrow = Escrow {
            id: EscrowId::new(),
            reference: req.reference.clone(),
            purchase_price: req.purchase_price,
            initial_deposit: Decimal::ZERO,
            current_balance: Decimal::ZERO,
            yield_enabled: req.yield_enabled,
            yield_earned: Decimal::ZERO,
            yield_recipient: None,
            yield_return_ref: None,
            required_approvals: req.required_approvals,
            wallet_ref,
            deposit_account_ref,
            depositor_ref,
            settlement_ref: None,
            status: EscrowStatus::Created,
            created_at: now,
            updated_at: now,
        };
        let id = escrow.id;
        self.ledger.insert_escrow(escrow)?;

        info!(escrow = %id, reference = %req.reference, "escrow opened");
        audit.record(
            Some(id),
            AuditAction::EscrowOpened,
            actor.to_string(),
            json!({
                "reference": req.reference,
                "purchase_price": req.purchase_price.to_string(),
                "required_approvals": req.required_approvals,
                "yield_enabled": req.yield_enabled,
            }),
        );
        Ok(id)
    }

    /// Issue deposit instructions: `CREATED → DEPOSIT_PENDING`, with a
    /// best-effort deposit link notification.
    pub fn issue_deposit_instructions(
        &mut self,
        audit: &mut AuditLog,
        sink: &dyn NotificationSink,
        escrow_id: EscrowId,
        actor: &WalletAddress,
    ) -> Result<()> {
        self.ledger
            .transition(escrow_id, EscrowStatus::DepositPending)?;
        let reference = self.ledger.escrow(escrow_id)?.reference.clone();
        notify_best_effort(sink, "deposit_link", &reference);
        audit.record(
            Some(escrow_id),
            AuditAction::DepositInstructionsIssued,
            actor.to_string(),
            json!({ "reference": reference }),
        );
        Ok(())
    }

    // -----------------------------------------------------------------
    // Funding
    // -----------------------------------------------------------------

    /// Note provider-observed (not yet irreversible) incoming funds:
    /// advances `CREATED → DEPOSIT_PENDING` and nothing further. Funds
    /// that are merely observed never open the good-funds gate, and an
    /// escrow already at `FUNDS_RECEIVED` or beyond is left untouched.
    pub fn note_deposit_observed(
        &mut self,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        amount: Option<Decimal>,
        actor: &str,
    ) -> Result<()> {
        let status = self.ledger.escrow(escrow_id)?.status;
        if status != EscrowStatus::Created {
            return Ok(());
        }
        self.ledger
            .transition(escrow_id, EscrowStatus::DepositPending)?;
        audit.record(
            Some(escrow_id),
            AuditAction::DepositObserved,
            actor,
            json!({ "amount": amount.map(|a| a.to_string()) }),
        );
        Ok(())
    }

    /// Record confirmed good funds: sets `initial_deposit` and
    /// `current_balance`, transitions to `FUNDS_RECEIVED`.
    ///
    /// Permitted only from `CREATED`/`DEPOSIT_PENDING`; a second deposit
    /// is rejected.
    pub fn record_deposit(
        &mut self,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        amount: Decimal,
        actor: &str,
    ) -> Result<()> {
        let status = self.ledger.escrow(escrow_id)?.status;
        if !matches!(
            status,
            EscrowStatus::Created | EscrowStatus::DepositPending
        ) {
            return Err(ClearholdError::DepositAlreadyReceived(escrow_id));
        }
        if amount <= Decimal::ZERO {
            return Err(ClearholdError::InvalidPayout {
                reason: format!("deposit amount must be positive, got {amount}"),
            });
        }

        self.ledger
            .transition(escrow_id, EscrowStatus::FundsReceived)?;
        let escrow = self.ledger.escrow_mut(escrow_id)?;
        escrow.initial_deposit = amount;
        escrow.current_balance = amount;

        info!(escrow = %escrow_id, %amount, "good funds recorded");
        audit.record(
            Some(escrow_id),
            AuditAction::DepositRecorded,
            actor,
            json!({ "amount": amount.to_string() }),
        );
        Ok(())
    }

    // -----------------------------------------------------------------
    // Closing
    // -----------------------------------------------------------------

    /// `FUNDS_RECEIVED → READY_TO_CLOSE`; requires at least one payee.
    pub fn mark_ready_to_close(
        &mut self,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        actor: &WalletAddress,
    ) -> Result<()> {
        if self.ledger.payees_of(escrow_id).is_empty() {
            return Err(ClearholdError::NoPayees(escrow_id));
        }
        self.ledger
            .transition(escrow_id, EscrowStatus::ReadyToClose)?;
        audit.record(
            Some(escrow_id),
            AuditAction::MarkedReadyToClose,
            actor.to_string(),
            json!({}),
        );
        Ok(())
    }

    /// `READY_TO_CLOSE → CLOSING`. Idempotent if already CLOSING.
    pub fn begin_closing(
        &mut self,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        actor: &WalletAddress,
    ) -> Result<()> {
        if self.ledger.escrow(escrow_id)?.status == EscrowStatus::Closing {
            return Ok(());
        }
        self.ledger.transition(escrow_id, EscrowStatus::Closing)?;
        audit.record(
            Some(escrow_id),
            AuditAction::ClosingStarted,
            actor.to_string(),
            json!({}),
        );
        Ok(())
    }

    /// Stamp the computed yield on a CLOSING escrow before disbursement.
    pub fn stamp_yield(
        &mut self,
        escrow_id: EscrowId,
        yield_earned: Decimal,
        recipient: Option<YieldRecipient>,
    ) -> Result<()> {
        let escrow = self.ledger.escrow_mut(escrow_id)?;
        if escrow.status != EscrowStatus::Closing {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: escrow.status.to_string(),
                attempted: "yield stamp".into(),
            });
        }
        escrow.yield_earned = yield_earned;
        escrow.yield_recipient = recipient;
        Ok(())
    }

    /// Record the completed depositor yield-return transfer. Rejected if
    /// one was already recorded.
    pub fn stamp_yield_return(
        &mut self,
        escrow_id: EscrowId,
        transfer_ref: TransferRef,
    ) -> Result<()> {
        let escrow = self.ledger.escrow_mut(escrow_id)?;
        if escrow.yield_return_ref.is_some() {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: escrow.status.to_string(),
                attempted: "yield return (already returned)".into(),
            });
        }
        escrow.yield_return_ref = Some(transfer_ref);
        Ok(())
    }

    /// `CLOSING → CLOSED`: zero the balance and stamp the settlement
    /// summary. A partially failed disbursement still finalizes; the
    /// audit entry flags it for manual reconciliation.
    #[allow(clippy::too_many_arguments)]
    pub fn finalize_closed(
        &mut self,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        distributed_total: Decimal,
        yield_earned: Decimal,
        yield_recipient: Option<YieldRecipient>,
        settlement_ref: &str,
        disbursement_complete: bool,
        actor: &str,
    ) -> Result<()> {
        self.ledger.transition(escrow_id, EscrowStatus::Closed)?;
        let escrow = self.ledger.escrow_mut(escrow_id)?;
        escrow.current_balance = Decimal::ZERO;
        escrow.yield_earned = yield_earned;
        escrow.yield_recipient = yield_recipient;
        escrow.settlement_ref = Some(settlement_ref.to_string());

        info!(
            escrow = %escrow_id,
            %distributed_total,
            %yield_earned,
            disbursement_complete,
            "escrow closed"
        );
        audit.record(
            Some(escrow_id),
            AuditAction::EscrowClosed,
            actor,
            json!({
                "distributed_total": distributed_total.to_string(),
                "yield_earned": yield_earned.to_string(),
                "settlement_ref": settlement_ref,
                "disbursement_complete": disbursement_complete,
            }),
        );
        Ok(())
    }

    /// Cancel an unfunded escrow. Rejected once a deposit was recorded.
    pub fn cancel(
        &mut self,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        actor: &WalletAddress,
    ) -> Result<()> {
        let escrow = self.ledger.escrow(escrow_id)?;
        if escrow.initial_deposit > Decimal::ZERO {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: escrow.status.to_string(),
                attempted: "CANCELLED (escrow is funded)".into(),
            });
        }
        self.ledger.transition(escrow_id, EscrowStatus::Cancelled)?;
        audit.record(
            Some(escrow_id),
            AuditAction::EscrowCancelled,
            actor.to_string(),
            json!({}),
        );
        Ok(())
    }

    // -----------------------------------------------------------------
    // Payees & signers
    // -----------------------------------------------------------------

    /// Register a payee. Raw bank details are tokenized at the provider
    /// and dropped on return; only the opaque ref is stored.
    #[allow(clippy::too_many_arguments)]
    pub fn register_payee(
        &mut self,
        gateway: &mut dyn CustodyGateway,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        name: &str,
        role: PayeeRole,
        payout: PayoutSpec,
        bank: &BankDetails,
        rail: PaymentRail,
        actor: &WalletAddress,
    ) -> Result<PayeeId> {
        let status = self.ledger.escrow(escrow_id)?.status;
        if status.is_terminal() || status == EscrowStatus::Closing {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: status.to_string(),
                attempted: "payee registration".into(),
            });
        }

        let dest_ref = gateway.tokenize_recipient(
            &IdempotencyKey::derive(&escrow_id.to_string(), name, "tokenize-payee"),
            bank,
        )?;
        let payee = Payee::new(escrow_id, name, role, payout, dest_ref, rail)?;
        let payee_id = self.ledger.insert_payee(payee)?;

        audit.record(
            Some(escrow_id),
            AuditAction::PayeeRegistered,
            actor.to_string(),
            json!({ "payee": payee_id.to_string(), "role": role.to_string() }),
        );
        Ok(payee_id)
    }

    /// Register an approver. The first registered signer is the
    /// initiating party (#1).
    pub fn register_signer(
        &mut self,
        audit: &mut AuditLog,
        escrow_id: EscrowId,
        wallet: WalletAddress,
        role: &str,
        actor: &WalletAddress,
    ) -> Result<()> {
        let order = u8::try_from(self.ledger.signers_of(escrow_id).len() + 1)
            .map_err(|_| ClearholdError::Internal("signer list overflow".into()))?;
        let wallet_str = wallet.to_string();
        self.ledger
            .insert_signer(escrow_id, Signer::new(wallet, role, order))?;
        audit.record(
            Some(escrow_id),
            AuditAction::SignerRegistered,
            actor.to_string(),
            json!({ "wallet": wallet_str, "order": order }),
        );
        Ok(())
    }

    /// Record a signature for a registered signer. Crate-internal: the
    /// approval engine is the public face.
    pub(crate) fn sign(&mut self, escrow_id: EscrowId, wallet: &WalletAddress) -> Result<()> {
        let signer = self
            .ledger
            .signer_mut(escrow_id, wallet)
            .ok_or_else(|| ClearholdError::NotAuthorized {
                reason: format!("{wallet} is not a registered signer"),
            })?;
        if signer.has_signed {
            return Err(ClearholdError::AlreadySigned {
                wallet: wallet.to_string(),
            });
        }
        signer.sign();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Payee settlement bookkeeping (used by the executor & reconciler)
    // -----------------------------------------------------------------

    /// Stamp the resolved cent amount and move the payee to PROCESSING.
    pub fn begin_payee_transfer(&mut self, payee_id: PayeeId, amount: Decimal) -> Result<()> {
        self.ledger
            .transition_payee(payee_id, PayeeStatus::Processing)?;
        let payee = self.ledger.payee_mut(payee_id)?;
        payee.resolved_amount = Some(amount);
        Ok(())
    }

    /// Mark a payee COMPLETED. `transfer_ref` is stamped when the caller
    /// initiated the transfer; the reconciler passes `None` because the
    /// handle was recorded at initiation. Idempotent no-op when already
    /// COMPLETED.
    pub fn mark_payee_completed(
        &mut self,
        payee_id: PayeeId,
        transfer_ref: Option<TransferRef>,
    ) -> Result<()> {
        if self.ledger.payee(payee_id)?.status == PayeeStatus::Completed {
            return Ok(());
        }
        self.ledger
            .transition_payee(payee_id, PayeeStatus::Completed)?;
        let payee = self.ledger.payee_mut(payee_id)?;
        if let Some(r) = transfer_ref {
            payee.transfer_ref = Some(r);
        }
        payee.failure_reason = None;
        Ok(())
    }

    /// Mark a payee FAILED with a reason. Left for manual re-drive.
    pub fn mark_payee_failed(&mut self, payee_id: PayeeId, reason: &str) -> Result<()> {
        self.ledger
            .transition_payee(payee_id, PayeeStatus::Failed)?;
        let payee = self.ledger.payee_mut(payee_id)?;
        payee.failure_reason = Some(reason.to_string());
        Ok(())
    }

    /// Whether every payee of the escrow is in a terminal status.
    #[must_use]
    pub fn all_payees_terminal(&self, escrow_id: EscrowId) -> bool {
        self.ledger
            .payees_of(escrow_id)
            .iter()
            .all(|p| p.status.is_terminal())
    }

    /// Whether every payee of the escrow is COMPLETED.
    #[must_use]
    pub fn all_payees_completed(&self, escrow_id: EscrowId) -> bool {
        let payees = self.ledger.payees_of(escrow_id);
        !payees.is_empty() && payees.iter().all(|p| p.status == PayeeStatus::Completed)
    }
}
