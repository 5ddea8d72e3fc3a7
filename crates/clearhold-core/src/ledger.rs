//! The transactional record store for escrow aggregates.
//!
//! Owns the escrow, payee, and signer maps and enforces the storage
//! invariants: status writes go through the transition guards, and a
//! wallet address registers at most once as a signer per escrow. The
//! raw `*_mut` accessors are crate-private so components outside this
//! crate can only mutate through [`crate::LifecycleManager`]'s guarded
//! operations.

use std::collections::HashMap;

use chrono::Utc;
use clearhold_types::{
    ClearholdError, DepositAccountRef, Escrow, EscrowId, EscrowStatus, Payee, PayeeId, PayeeStatus,
    Result, Signer, TransferRef, WalletAddress,
};

/// In-process store for Escrow, Payee, and Signer records.
///
/// Each mutation reads current state, validates the transition is legal,
/// and writes the new state — the per-aggregate read-modify-write path
/// concurrent callers must serialize through.
#[derive(Debug, Default)]
pub struct EscrowLedger {
    escrows: HashMap<EscrowId, Escrow>,
    payees: HashMap<PayeeId, Payee>,
    /// Escrow -> payees, in registration order.
    payee_index: HashMap<EscrowId, Vec<PayeeId>>,
    /// Escrow -> signers, in registration order (initiator first).
    signers: HashMap<EscrowId, Vec<Signer>>,
}

impl EscrowLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Escrow
    // -----------------------------------------------------------------

    /// Insert a new escrow. The id must be unused.
    pub fn insert_escrow(&mut self, escrow: Escrow) -> Result<()> {
        if self.escrows.contains_key(&escrow.id) {
            return Err(ClearholdError::Internal(format!(
                "escrow id collision: {}",
                escrow.id
            )));
        }
        self.escrows.insert(escrow.id, escrow);
        Ok(())
    }

    pub fn escrow(&self, id: EscrowId) -> Result<&Escrow> {
        self.escrows
            .get(&id)
            .ok_or(ClearholdError::EscrowNotFound(id))
    }

    pub(crate) fn escrow_mut(&mut self, id: EscrowId) -> Result<&mut Escrow> {
        self.escrows
            .get_mut(&id)
            .ok_or(ClearholdError::EscrowNotFound(id))
    }

    /// The only escrow status write path. Validates legality and stamps
    /// `updated_at`.
    pub(crate) fn transition(&mut self, id: EscrowId, target: EscrowStatus) -> Result<()> {
        let escrow = self.escrow_mut(id)?;
        if !escrow.status.can_transition_to(target) {
            return Err(ClearholdError::InvalidState {
                entity: format!("escrow {id}"),
                from: escrow.status.to_string(),
                attempted: target.to_string(),
            });
        }
        escrow.status = target;
        escrow.updated_at = Utc::now();
        Ok(())
    }

    /// Find the escrow owning a provider deposit account.
    #[must_use]
    pub fn find_by_deposit_account(&self, account: &DepositAccountRef) -> Option<&Escrow> {
        self.escrows
            .values()
            .find(|e| &e.deposit_account_ref == account)
    }

    #[must_use]
    pub fn escrow_count(&self) -> usize {
        self.escrows.len()
    }

    // -----------------------------------------------------------------
    // Payees
    // -----------------------------------------------------------------

    pub fn insert_payee(&mut self, payee: Payee) -> Result<PayeeId> {
        let id = payee.id;
        let escrow_id = payee.escrow_id;
        // The escrow must exist first.
        self.escrow(escrow_id)?;
        self.payees.insert(id, payee);
        self.payee_index.entry(escrow_id).or_default().push(id);
        Ok(id)
    }

    pub fn payee(&self, id: PayeeId) -> Result<&Payee> {
        self.payees.get(&id).ok_or(ClearholdError::PayeeNotFound(id))
    }

    pub(crate) fn payee_mut(&mut self, id: PayeeId) -> Result<&mut Payee> {
        self.payees
            .get_mut(&id)
            .ok_or(ClearholdError::PayeeNotFound(id))
    }

    /// The only payee status write path.
    pub(crate) fn transition_payee(&mut self, id: PayeeId, target: PayeeStatus) -> Result<()> {
        let payee = self.payee_mut(id)?;
        if !payee.status.can_transition_to(target) {
            return Err(ClearholdError::InvalidState {
                entity: format!("payee {id}"),
                from: payee.status.to_string(),
                attempted: target.to_string(),
            });
        }
        payee.status = target;
        payee.updated_at = Utc::now();
        Ok(())
    }

    /// Payees of an escrow, in registration order.
    #[must_use]
    pub fn payees_of(&self, escrow_id: EscrowId) -> Vec<&Payee> {
        self.payee_index
            .get(&escrow_id)
            .map(|ids| ids.iter().filter_map(|id| self.payees.get(id)).collect())
            .unwrap_or_default()
    }

    /// Find the payee whose initiated transfer carries this handle.
    #[must_use]
    pub fn find_payee_by_transfer(&self, transfer: &TransferRef) -> Option<&Payee> {
        self.payees
            .values()
            .find(|p| p.transfer_ref.as_ref() == Some(transfer))
    }

    // -----------------------------------------------------------------
    // Signers
    // -----------------------------------------------------------------

    /// Register a signer; each wallet appears at most once per escrow.
    pub fn insert_signer(&mut self, escrow_id: EscrowId, signer: Signer) -> Result<()> {
        self.escrow(escrow_id)?;
        let signers = self.signers.entry(escrow_id).or_default();
        if signers.iter().any(|s| s.wallet == signer.wallet) {
            return Err(ClearholdError::DuplicateSigner {
                wallet: signer.wallet.to_string(),
            });
        }
        signers.push(signer);
        Ok(())
    }

    #[must_use]
    pub fn signers_of(&self, escrow_id: EscrowId) -> &[Signer] {
        self.signers.get(&escrow_id).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn signer_mut(
        &mut self,
        escrow_id: EscrowId,
        wallet: &WalletAddress,
    ) -> Option<&mut Signer> {
        self.signers
            .get_mut(&escrow_id)?
            .iter_mut()
            .find(|s| &s.wallet == wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearhold_types::{PaymentRail, PayeeRole, PayoutSpec, RecipientRef};
    use rust_decimal::Decimal;

    fn seeded() -> (EscrowLedger, EscrowId) {
        let mut ledger = EscrowLedger::new();
        let escrow = Escrow::dummy(Decimal::new(500_000, 0), 2);
        let id = escrow.id;
        ledger.insert_escrow(escrow).unwrap();
        (ledger, id)
    }

    #[test]
    fn insert_and_fetch() {
        let (ledger, id) = seeded();
        assert_eq!(ledger.escrow(id).unwrap().id, id);
        assert_eq!(ledger.escrow_count(), 1);
    }

    #[test]
    fn missing_escrow_errors() {
        let ledger = EscrowLedger::new();
        let err = ledger.escrow(EscrowId::new()).unwrap_err();
        assert!(matches!(err, ClearholdError::EscrowNotFound(_)));
    }

    #[test]
    fn duplicate_escrow_id_rejected() {
        let mut ledger = EscrowLedger::new();
        let escrow = Escrow::dummy(Decimal::new(100, 0), 1);
        let dup = escrow.clone();
        ledger.insert_escrow(escrow).unwrap();
        assert!(ledger.insert_escrow(dup).is_err());
    }

    #[test]
    fn transition_guard_rejects_illegal() {
        let (mut ledger, id) = seeded();
        let err = ledger.transition(id, EscrowStatus::Closed).unwrap_err();
        assert!(matches!(err, ClearholdError::InvalidState { .. }));

        ledger.transition(id, EscrowStatus::DepositPending).unwrap();
        assert_eq!(
            ledger.escrow(id).unwrap().status,
            EscrowStatus::DepositPending
        );
    }

    #[test]
    fn payee_index_preserves_order() {
        let (mut ledger, id) = seeded();
        for n in 0..3 {
            let payee = Payee::new(
                id,
                format!("payee {n}"),
                PayeeRole::Seller,
                PayoutSpec::Fixed(Decimal::new(100, 0)),
                RecipientRef::new(format!("r-{n}")),
                PaymentRail::Wire,
            )
            .unwrap();
            ledger.insert_payee(payee).unwrap();
        }
        let payees = ledger.payees_of(id);
        assert_eq!(payees.len(), 3);
        assert_eq!(payees[0].name, "payee 0");
        assert_eq!(payees[2].name, "payee 2");
    }

    #[test]
    fn payee_requires_existing_escrow() {
        let mut ledger = EscrowLedger::new();
        let payee = Payee::new(
            EscrowId::new(),
            "orphan",
            PayeeRole::Seller,
            PayoutSpec::Fixed(Decimal::ONE),
            RecipientRef::new("r"),
            PaymentRail::Wire,
        )
        .unwrap();
        assert!(ledger.insert_payee(payee).is_err());
    }

    #[test]
    fn signer_wallet_unique_per_escrow() {
        let (mut ledger, id) = seeded();
        let wallet = WalletAddress::new("0xAAA");
        ledger
            .insert_signer(id, Signer::new(wallet.clone(), "buyer", 1))
            .unwrap();

        // Same wallet, different casing — still a duplicate.
        let err = ledger
            .insert_signer(id, Signer::new(WalletAddress::new("0xaaa"), "agent", 2))
            .unwrap_err();
        assert!(matches!(err, ClearholdError::DuplicateSigner { .. }));
        assert_eq!(ledger.signers_of(id).len(), 1);
    }

    #[test]
    fn find_payee_by_transfer_ref() {
        let (mut ledger, id) = seeded();
        let mut payee = Payee::new(
            id,
            "seller",
            PayeeRole::Seller,
            PayoutSpec::Fixed(Decimal::new(100, 0)),
            RecipientRef::new("r"),
            PaymentRail::Wire,
        )
        .unwrap();
        payee.transfer_ref = Some(TransferRef::new("t-1"));
        let pid = ledger.insert_payee(payee).unwrap();

        let found = ledger.find_payee_by_transfer(&TransferRef::new("t-1")).unwrap();
        assert_eq!(found.id, pid);
        assert!(ledger.find_payee_by_transfer(&TransferRef::new("t-2")).is_none());
    }
}
