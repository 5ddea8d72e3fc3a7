//! Disbursement Executor.
//!
//! Given an escrow in CLOSING whose approval threshold is met, computes
//! the final payout set (fixed amounts, basis-point shares, and the
//! yield allocation) and drives one idempotent transfer per line item.
//!
//! Partial-failure policy: every line item is attempted; a provider
//! failure is recorded on that payee and never aborts siblings. There
//! is no automatic retry — failed payees stay FAILED for manual
//! re-drive. Finalization runs only after all line-item outcomes are in.

use clearhold_core::{ApprovalEngine, AuditLog, LifecycleManager};
use clearhold_types::{
    AuditAction, ClearholdError, CustodyGateway, EscrowId, EscrowStatus, IdempotencyKey,
    LineResult, PayeeId, PayeeRole, PayeeStatus, PaymentRail, RecipientRef, Result, TransferRef,
    YieldRecipient, money::to_cents,
};
use rust_decimal::Decimal;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Outcome of one payout line. `payee_id` is `None` for the synthetic
/// yield-return line.
#[derive(Debug, Clone)]
pub struct PayoutOutcome {
    pub payee_id: Option<PayeeId>,
    pub label: String,
    pub amount: Decimal,
    pub result: LineResult,
}

/// Summary of an executed close.
#[derive(Debug, Clone)]
pub struct CloseReport {
    /// Sum of successfully disbursed amounts (principal + yield).
    pub distributed_total: Decimal,
    pub yield_earned: Decimal,
    pub yield_recipient: Option<YieldRecipient>,
    pub settlement_ref: String,
    /// False when at least one line failed — flagged in the audit trail
    /// for manual reconciliation; the escrow still finalizes as CLOSED.
    pub complete: bool,
    pub outcomes: Vec<PayoutOutcome>,
}

/// One resolved payout line, ready for transfer.
struct PayoutLine {
    payee_id: Option<PayeeId>,
    label: String,
    dest: RecipientRef,
    amount: Decimal,
    rail: PaymentRail,
    key: IdempotencyKey,
    is_yield_return: bool,
}

/// Drives idempotent transfers for escrow closes and manual re-drives.
#[derive(Debug, Default)]
pub struct DisbursementExecutor;

impl DisbursementExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Execute the close-out disbursement of a CLOSING escrow.
    ///
    /// Validates the approval threshold and the custody balance before
    /// any mutation, then attempts every line item and finalizes the
    /// escrow as CLOSED once all outcomes are collected.
    pub fn execute_close(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        gateway: &mut dyn CustodyGateway,
        escrow_id: EscrowId,
        actor: &str,
    ) -> Result<CloseReport> {
        let escrow = lm.ledger().escrow(escrow_id)?;
        if escrow.status != EscrowStatus::Closing {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: escrow.status.to_string(),
                attempted: "disbursement".into(),
            });
        }
        let approval = ApprovalEngine::state(lm, escrow_id)?;
        if !approval.can_execute() {
            return Err(ClearholdError::ThresholdNotMet {
                confirmations: approval.confirmations,
                required: approval.required,
            });
        }

        let escrow = lm.ledger().escrow(escrow_id)?;
        let purchase_price = escrow.purchase_price;
        let initial_deposit = escrow.initial_deposit;
        let wallet_ref = escrow.wallet_ref.clone();
        let source = escrow.deposit_account_ref.clone();
        let depositor_ref = escrow.depositor_ref.clone();

        let payees = lm.ledger().payees_of(escrow_id);
        if payees.is_empty() {
            return Err(ClearholdError::NoPayees(escrow_id));
        }

        // Yield: whatever the custody balance earned over the deposit.
        let custody_balance = gateway.balance(&wallet_ref)?;
        let yield_earned = to_cents((custody_balance - initial_deposit).max(Decimal::ZERO));

        // 100%-yield-to-depositor: a BUYER payee absorbs it, otherwise a
        // synthetic line returns it to the depositor. Never retained.
        let buyer_payee = payees
            .iter()
            .find(|p| p.role == PayeeRole::Buyer)
            .map(|p| p.id);
        let yield_recipient = match buyer_payee {
            Some(id) => Some(YieldRecipient::BuyerPayee(id)),
            None if yield_earned > Decimal::ZERO => Some(YieldRecipient::Depositor),
            None => None,
        };

        let mut lines: Vec<PayoutLine> = payees
            .iter()
            .filter(|p| p.status == PayeeStatus::Pending)
            .map(|p| {
                let mut amount = p.payout.resolve(purchase_price);
                if Some(p.id) == buyer_payee {
                    amount += yield_earned;
                }
                PayoutLine {
                    payee_id: Some(p.id),
                    label: p.name.clone(),
                    dest: p.dest_ref.clone(),
                    amount,
                    rail: p.rail,
                    key: IdempotencyKey::for_close(escrow_id, p.id),
                    is_yield_return: false,
                }
            })
            .collect();
        if yield_recipient == Some(YieldRecipient::Depositor) {
            lines.push(PayoutLine {
                payee_id: None,
                label: "yield return to depositor".into(),
                dest: depositor_ref,
                amount: yield_earned,
                rail: PaymentRail::Ach,
                key: IdempotencyKey::for_yield_return(escrow_id),
                is_yield_return: true,
            });
        }

        // Reject up front, before any state moves.
        let grand_total: Decimal = lines.iter().map(|l| l.amount).sum();
        if grand_total > custody_balance {
            return Err(ClearholdError::InsufficientFunds {
                needed: grand_total,
                available: custody_balance,
            });
        }

        lm.stamp_yield(escrow_id, yield_earned, yield_recipient)?;

        let mut outcomes = Vec::with_capacity(lines.len());
        for line in &lines {
            if let Some(payee_id) = line.payee_id {
                lm.begin_payee_transfer(payee_id, line.amount)?;
            }
            audit.record(
                Some(escrow_id),
                AuditAction::TransferInitiated,
                actor,
                json!({
                    "label": line.label,
                    "amount": line.amount.to_string(),
                    "idempotency_key": line.key.as_str(),
                }),
            );

            let result = match gateway.transfer(&line.key, &source, &line.dest, line.amount, line.rail)
            {
                Ok(transfer_ref) => {
                    if let Some(payee_id) = line.payee_id {
                        lm.mark_payee_completed(payee_id, Some(transfer_ref.clone()))?;
                    }
                    let action = if line.is_yield_return {
                        lm.stamp_yield_return(escrow_id, transfer_ref.clone())?;
                        AuditAction::YieldReturned
                    } else {
                        AuditAction::TransferCompleted
                    };
                    audit.record(
                        Some(escrow_id),
                        action,
                        actor,
                        json!({
                            "label": line.label,
                            "transfer_ref": transfer_ref.0,
                            "amount": line.amount.to_string(),
                        }),
                    );
                    LineResult::Success { transfer_ref }
                }
                Err(err) => {
                    let reason = err.to_string();
                    warn!(escrow = %escrow_id, label = %line.label, %reason, "transfer failed");
                    if let Some(payee_id) = line.payee_id {
                        lm.mark_payee_failed(payee_id, &reason)?;
                    }
                    audit.record(
                        Some(escrow_id),
                        AuditAction::TransferFailed,
                        actor,
                        json!({ "label": line.label, "reason": reason }),
                    );
                    LineResult::Failed { reason }
                }
            };
            outcomes.push(PayoutOutcome {
                payee_id: line.payee_id,
                label: line.label.clone(),
                amount: line.amount,
                result,
            });
        }

        // Barrier: all outcomes are in; roll up and finalize.
        let distributed_total: Decimal = outcomes
            .iter()
            .filter(|o| matches!(o.result, LineResult::Success { .. }))
            .map(|o| o.amount)
            .sum();
        let complete = outcomes
            .iter()
            .all(|o| matches!(o.result, LineResult::Success { .. }));
        let settlement_ref = Self::settlement_ref(escrow_id, &outcomes);

        lm.finalize_closed(
            audit,
            escrow_id,
            distributed_total,
            yield_earned,
            yield_recipient,
            &settlement_ref,
            complete,
            actor,
        )?;
        info!(
            escrow = %escrow_id,
            %distributed_total,
            complete,
            "disbursement finished"
        );

        Ok(CloseReport {
            distributed_total,
            yield_earned,
            yield_recipient,
            settlement_ref,
            complete,
            outcomes,
        })
    }

    /// Manually re-drive a single FAILED payee.
    ///
    /// Reuses the original deterministic idempotency key, so a re-drive
    /// after an ambiguous failure can never double-pay.
    pub fn retry_payee(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        gateway: &mut dyn CustodyGateway,
        escrow_id: EscrowId,
        payee_id: PayeeId,
        actor: &str,
    ) -> Result<TransferRef> {
        let payee = lm.ledger().payee(payee_id)?;
        if payee.escrow_id != escrow_id {
            return Err(ClearholdError::PayeeNotFound(payee_id));
        }
        if payee.status != PayeeStatus::Failed {
            return Err(ClearholdError::InvalidState {
                entity: format!("payee {payee_id}"),
                from: payee.status.to_string(),
                attempted: "re-drive".into(),
            });
        }
        let amount = payee.resolved_amount.ok_or_else(|| {
            ClearholdError::Internal(format!("failed payee {payee_id} has no resolved amount"))
        })?;
        let dest = payee.dest_ref.clone();
        let rail = payee.rail;
        let label = payee.name.clone();
        let source = lm.ledger().escrow(escrow_id)?.deposit_account_ref.clone();

        lm.begin_payee_transfer(payee_id, amount)?;
        audit.record(
            Some(escrow_id),
            AuditAction::TransferRetried,
            actor,
            json!({ "payee": payee_id.to_string(), "amount": amount.to_string() }),
        );

        let key = IdempotencyKey::for_close(escrow_id, payee_id);
        match gateway.transfer(&key, &source, &dest, amount, rail) {
            Ok(transfer_ref) => {
                lm.mark_payee_completed(payee_id, Some(transfer_ref.clone()))?;
                audit.record(
                    Some(escrow_id),
                    AuditAction::TransferCompleted,
                    actor,
                    json!({ "label": label, "transfer_ref": transfer_ref.0 }),
                );
                Ok(transfer_ref)
            }
            Err(err) => {
                let reason = err.to_string();
                lm.mark_payee_failed(payee_id, &reason)?;
                audit.record(
                    Some(escrow_id),
                    AuditAction::TransferFailed,
                    actor,
                    json!({ "label": label, "reason": reason }),
                );
                Err(err)
            }
        }
    }

    /// Manually re-drive a failed depositor yield-return line.
    ///
    /// Available only while the close routed yield to the depositor and
    /// no return transfer has completed. Reuses the original
    /// deterministic idempotency key, so a re-drive after an ambiguous
    /// failure can never double-pay.
    pub fn retry_yield_return(
        &self,
        lm: &mut LifecycleManager,
        audit: &mut AuditLog,
        gateway: &mut dyn CustodyGateway,
        escrow_id: EscrowId,
        actor: &str,
    ) -> Result<TransferRef> {
        let escrow = lm.ledger().escrow(escrow_id)?;
        if escrow.yield_recipient != Some(YieldRecipient::Depositor)
            || escrow.yield_earned <= Decimal::ZERO
        {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: escrow.status.to_string(),
                attempted: "yield-return re-drive (no depositor yield owed)".into(),
            });
        }
        if escrow.yield_return_ref.is_some() {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {escrow_id}"),
                from: escrow.status.to_string(),
                attempted: "yield-return re-drive (already returned)".into(),
            });
        }
        let amount = escrow.yield_earned;
        let source = escrow.deposit_account_ref.clone();
        let dest = escrow.depositor_ref.clone();

        audit.record(
            Some(escrow_id),
            AuditAction::TransferRetried,
            actor,
            json!({
                "label": "yield return to depositor",
                "amount": amount.to_string(),
            }),
        );

        let key = IdempotencyKey::for_yield_return(escrow_id);
        match gateway.transfer(&key, &source, &dest, amount, PaymentRail::Ach) {
            Ok(transfer_ref) => {
                lm.stamp_yield_return(escrow_id, transfer_ref.clone())?;
                audit.record(
                    Some(escrow_id),
                    AuditAction::YieldReturned,
                    actor,
                    json!({
                        "transfer_ref": transfer_ref.0,
                        "amount": amount.to_string(),
                    }),
                );
                Ok(transfer_ref)
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(escrow = %escrow_id, %reason, "yield return re-drive failed");
                audit.record(
                    Some(escrow_id),
                    AuditAction::TransferFailed,
                    actor,
                    json!({ "label": "yield return to depositor", "reason": reason }),
                );
                Err(err)
            }
        }
    }

    /// Aggregate settlement reference: deterministic digest over the
    /// escrow id and the successful transfer handles.
    fn settlement_ref(escrow_id: EscrowId, outcomes: &[PayoutOutcome]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"clearhold:settlement:v1:");
        hasher.update(escrow_id.0.as_bytes());
        for outcome in outcomes {
            if let LineResult::Success { transfer_ref } = &outcome.result {
                hasher.update(transfer_ref.0.as_bytes());
            }
        }
        format!("stl-{}", &hex::encode(hasher.finalize())[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockCustodyGateway;
    use clearhold_core::{ApprovalEngine, OpenEscrowRequest};
    use clearhold_types::{BankDetails, PayoutSpec, WalletAddress};

    fn bank(holder: &str) -> BankDetails {
        BankDetails {
            account_holder: holder.into(),
            routing_number: "021000021".into(),
            account_number: "000123456789".into(),
        }
    }

    struct Setup {
        lm: LifecycleManager,
        audit: AuditLog,
        gateway: MockCustodyGateway,
        escrow_id: EscrowId,
    }

    /// Escrow funded with 500k deposit, in CLOSING with threshold met.
    fn closing_escrow(payees: &[(&str, PayeeRole, PayoutSpec)], balance: Decimal) -> Setup {
        let mut lm = LifecycleManager::new();
        let mut audit = AuditLog::new();
        let mut gateway = MockCustodyGateway::new();
        let agent = WalletAddress::new("0xagent");

        let escrow_id = lm
            .open(
                &mut gateway,
                &mut audit,
                &OpenEscrowRequest {
                    reference: "ESC-1".into(),
                    purchase_price: Decimal::new(500_000, 0),
                    required_approvals: 1,
                    yield_enabled: true,
                    chain: "base".into(),
                },
                &bank("Buyer"),
                &agent,
            )
            .unwrap();
        lm.record_deposit(&mut audit, escrow_id, Decimal::new(500_000, 0), "reconciler")
            .unwrap();

        for (name, role, payout) in payees {
            lm.register_payee(
                &mut gateway,
                &mut audit,
                escrow_id,
                name,
                *role,
                *payout,
                &bank(name),
                PaymentRail::Wire,
                &agent,
            )
            .unwrap();
        }
        lm.register_signer(&mut audit, escrow_id, agent.clone(), "agent", &agent)
            .unwrap();
        lm.mark_ready_to_close(&mut audit, escrow_id, &agent).unwrap();
        ApprovalEngine::new()
            .initiate(&mut lm, &mut audit, escrow_id, &agent)
            .unwrap();

        let wallet = lm.ledger().escrow(escrow_id).unwrap().wallet_ref.clone();
        gateway.set_balance(wallet, balance);

        Setup {
            lm,
            audit,
            gateway,
            escrow_id,
        }
    }

    #[test]
    fn happy_close_two_payees() {
        let mut s = closing_escrow(
            &[
                ("Jane Seller", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(485_000, 0))),
                ("Acme Realty", PayeeRole::Agent, PayoutSpec::Percentage(300)),
            ],
            Decimal::new(500_000, 0),
        );

        let report = DisbursementExecutor::new()
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();

        assert!(report.complete);
        // 485,000 fixed + 15,000 (300 bps of 500k); no yield (balance == deposit).
        assert_eq!(report.distributed_total, Decimal::new(500_000_00, 2));
        assert_eq!(report.yield_earned, Decimal::new(0, 2));
        assert_eq!(s.gateway.executed_transfers().len(), 2);

        let escrow = s.lm.ledger().escrow(s.escrow_id).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Closed);
        assert_eq!(escrow.current_balance, Decimal::ZERO);
        assert!(escrow.invariants_hold());
    }

    #[test]
    fn yield_goes_to_buyer_payee() {
        // Balance grew by 1,200 over the deposit.
        let mut s = closing_escrow(
            &[
                ("Refund Buyer", PayeeRole::Buyer, PayoutSpec::Fixed(Decimal::new(10_000, 0))),
                ("Jane Seller", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(400_000, 0))),
            ],
            Decimal::new(501_200, 0),
        );

        let report = DisbursementExecutor::new()
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();

        assert_eq!(report.yield_earned, Decimal::new(1_200_00, 2));
        let buyer = report
            .outcomes
            .iter()
            .find(|o| o.label == "Refund Buyer")
            .unwrap();
        // 10,000 principal + 1,200 yield.
        assert_eq!(buyer.amount, Decimal::new(11_200_00, 2));
        assert!(matches!(
            report.yield_recipient,
            Some(YieldRecipient::BuyerPayee(_))
        ));
        // No synthetic yield line.
        assert_eq!(report.outcomes.len(), 2);
    }

    #[test]
    fn yield_without_buyer_returns_to_depositor() {
        let mut s = closing_escrow(
            &[("Jane Seller", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(500_000, 0)))],
            Decimal::new(500_750, 0),
        );

        let report = DisbursementExecutor::new()
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();

        assert_eq!(report.yield_earned, Decimal::new(750_00, 2));
        assert_eq!(report.yield_recipient, Some(YieldRecipient::Depositor));
        let yield_line = report.outcomes.iter().find(|o| o.payee_id.is_none()).unwrap();
        assert_eq!(yield_line.amount, Decimal::new(750_00, 2));

        // P5: everything disbursed = principal + yield; platform keeps nothing.
        assert_eq!(
            report.distributed_total,
            Decimal::new(500_000_00, 2) + Decimal::new(750_00, 2)
        );
        assert_eq!(s.audit.count_for(s.escrow_id, AuditAction::YieldReturned), 1);
        assert!(
            s.lm.ledger()
                .escrow(s.escrow_id)
                .unwrap()
                .yield_return_ref
                .is_some()
        );
    }

    #[test]
    fn partial_failure_still_finalizes() {
        let mut s = closing_escrow(
            &[
                ("Jane Seller", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(400_000, 0))),
                ("Bad Dest", PayeeRole::Lender, PayoutSpec::Fixed(Decimal::new(50_000, 0))),
            ],
            Decimal::new(500_000, 0),
        );
        // Script the lender's destination to fail.
        let lender_dest = s
            .lm
            .ledger()
            .payees_of(s.escrow_id)
            .iter()
            .find(|p| p.name == "Bad Dest")
            .unwrap()
            .dest_ref
            .clone();
        s.gateway.fail_destination(lender_dest);

        let report = DisbursementExecutor::new()
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();

        assert!(!report.complete);
        assert_eq!(report.distributed_total, Decimal::new(400_000_00, 2));

        // The escrow still closes; the failed payee awaits re-drive.
        let escrow = s.lm.ledger().escrow(s.escrow_id).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Closed);
        let failed = s
            .lm
            .ledger()
            .payees_of(s.escrow_id)
            .iter()
            .find(|p| p.name == "Bad Dest")
            .map(|p| (p.id, p.status))
            .unwrap();
        assert_eq!(failed.1, PayeeStatus::Failed);
    }

    #[test]
    fn retry_failed_payee_does_not_double_pay() {
        let mut s = closing_escrow(
            &[("Bad Dest", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(100_000, 0)))],
            Decimal::new(500_000, 0),
        );
        let dest = s.lm.ledger().payees_of(s.escrow_id)[0].dest_ref.clone();
        let payee_id = s.lm.ledger().payees_of(s.escrow_id)[0].id;
        s.gateway.fail_destination(dest.clone());

        let executor = DisbursementExecutor::new();
        let report = executor
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();
        assert!(!report.complete);
        assert!(s.gateway.executed_transfers().is_empty());

        // Rail recovered: re-drive succeeds once.
        s.gateway.clear_failure(&dest);
        executor
            .retry_payee(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, payee_id, "ops")
            .unwrap();
        assert_eq!(s.gateway.executed_transfers().len(), 1);
        assert_eq!(
            s.lm.ledger().payee(payee_id).unwrap().status,
            PayeeStatus::Completed
        );

        // A second re-drive is rejected: the payee is terminal-complete.
        let err = executor
            .retry_payee(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, payee_id, "ops")
            .unwrap_err();
        assert!(matches!(err, ClearholdError::InvalidState { .. }));
        assert_eq!(s.gateway.executed_transfers().len(), 1);
    }

    #[test]
    fn failed_yield_return_is_redrivable_once() {
        let mut s = closing_escrow(
            &[("Jane Seller", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(500_000, 0)))],
            Decimal::new(500_750, 0),
        );
        let depositor = s
            .lm
            .ledger()
            .escrow(s.escrow_id)
            .unwrap()
            .depositor_ref
            .clone();
        s.gateway.fail_destination(depositor.clone());

        let executor = DisbursementExecutor::new();
        let report = executor
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();
        assert!(!report.complete);
        // Seller paid; the 750 yield is still owed to the depositor.
        assert_eq!(report.distributed_total, Decimal::new(500_000_00, 2));
        let escrow = s.lm.ledger().escrow(s.escrow_id).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Closed);
        assert!(escrow.yield_return_ref.is_none());

        // Rail recovered: the re-drive pays it out exactly once.
        s.gateway.clear_failure(&depositor);
        let transfer_ref = executor
            .retry_yield_return(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "ops")
            .unwrap();
        let escrow = s.lm.ledger().escrow(s.escrow_id).unwrap();
        assert_eq!(escrow.yield_return_ref, Some(transfer_ref));
        assert_eq!(s.gateway.executed_transfers().len(), 2);
        assert_eq!(s.audit.count_for(s.escrow_id, AuditAction::YieldReturned), 1);

        // A second re-drive is rejected: the yield was already returned.
        let err = executor
            .retry_yield_return(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "ops")
            .unwrap_err();
        assert!(matches!(err, ClearholdError::InvalidState { .. }));
        assert_eq!(s.gateway.executed_transfers().len(), 2);
    }

    #[test]
    fn yield_return_redrive_rejected_when_buyer_absorbed_yield() {
        let mut s = closing_escrow(
            &[("Refund Buyer", PayeeRole::Buyer, PayoutSpec::Fixed(Decimal::new(10_000, 0)))],
            Decimal::new(500_300, 0),
        );
        let executor = DisbursementExecutor::new();
        executor
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();

        let err = executor
            .retry_yield_return(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "ops")
            .unwrap_err();
        assert!(matches!(err, ClearholdError::InvalidState { .. }));
        assert_eq!(s.gateway.executed_transfers().len(), 1);
    }

    #[test]
    fn insufficient_funds_rejected_without_mutation() {
        let mut s = closing_escrow(
            &[("Jane Seller", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(600_000, 0)))],
            Decimal::new(500_000, 0),
        );

        let err = DisbursementExecutor::new()
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap_err();
        assert!(matches!(err, ClearholdError::InsufficientFunds { .. }));

        // No transfers, no status movement.
        assert!(s.gateway.executed_transfers().is_empty());
        assert_eq!(
            s.lm.ledger().escrow(s.escrow_id).unwrap().status,
            EscrowStatus::Closing
        );
        assert_eq!(
            s.lm.ledger().payees_of(s.escrow_id)[0].status,
            PayeeStatus::Pending
        );
    }

    #[test]
    fn below_threshold_rejected() {
        let mut lm = LifecycleManager::new();
        let mut audit = AuditLog::new();
        let mut gateway = MockCustodyGateway::new();
        let agent = WalletAddress::new("0xagent");
        let other = WalletAddress::new("0xother");

        let escrow_id = lm
            .open(
                &mut gateway,
                &mut audit,
                &OpenEscrowRequest {
                    reference: "ESC-2".into(),
                    purchase_price: Decimal::new(500_000, 0),
                    required_approvals: 2,
                    yield_enabled: false,
                    chain: "base".into(),
                },
                &bank("Buyer"),
                &agent,
            )
            .unwrap();
        lm.record_deposit(&mut audit, escrow_id, Decimal::new(500_000, 0), "reconciler")
            .unwrap();
        lm.register_payee(
            &mut gateway,
            &mut audit,
            escrow_id,
            "Jane Seller",
            PayeeRole::Seller,
            PayoutSpec::Fixed(Decimal::new(1_000, 0)),
            &bank("Jane"),
            PaymentRail::Wire,
            &agent,
        )
        .unwrap();
        lm.register_signer(&mut audit, escrow_id, agent.clone(), "agent", &agent)
            .unwrap();
        lm.register_signer(&mut audit, escrow_id, other, "buyer", &agent)
            .unwrap();
        lm.mark_ready_to_close(&mut audit, escrow_id, &agent).unwrap();
        ApprovalEngine::new()
            .initiate(&mut lm, &mut audit, escrow_id, &agent)
            .unwrap();

        let err = DisbursementExecutor::new()
            .execute_close(&mut lm, &mut audit, &mut gateway, escrow_id, "executor")
            .unwrap_err();
        assert!(matches!(
            err,
            ClearholdError::ThresholdNotMet {
                confirmations: 1,
                required: 2
            }
        ));
    }

    #[test]
    fn second_execute_rejected_after_close() {
        let mut s = closing_escrow(
            &[("Jane Seller", PayeeRole::Seller, PayoutSpec::Fixed(Decimal::new(1_000, 0)))],
            Decimal::new(500_000, 0),
        );
        let executor = DisbursementExecutor::new();
        executor
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap();
        let err = executor
            .execute_close(&mut s.lm, &mut s.audit, &mut s.gateway, s.escrow_id, "executor")
            .unwrap_err();
        assert!(matches!(err, ClearholdError::InvalidState { .. }));
        assert_eq!(s.gateway.executed_transfers().len(), 1);
    }
}
