//! # Escrow — the per-transaction aggregate
//!
//! One `Escrow` exists per property transaction. Its status is the single
//! source of truth for the lifecycle; balance and yield fields are
//! bookkeeping views stamped by the guarded transitions.
//!
//! ## State Machine
//!
//! ```text
//!   CREATED ──▶ DEPOSIT_PENDING ──▶ FUNDS_RECEIVED ──▶ READY_TO_CLOSE ──▶ CLOSING ──▶ CLOSED
//!      │               │                   │                  │
//!      └───────────────┴───────────────────┴──────────────────┴──▶ CANCELLED
//! ```
//!
//! Transitions are **monotonic**: `CLOSED` and `CANCELLED` are terminal,
//! and `CANCELLED` is unreachable once closing has begun. A funded escrow
//! is never physically deleted — only pre-funding cancellation exists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DepositAccountRef, EscrowId, PayeeId, RecipientRef, TransferRef, WalletRef};

/// The lifecycle status of an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Opened; custody wallet and deposit account provisioned.
    Created,
    /// Deposit instructions issued; awaiting incoming funds.
    DepositPending,
    /// Good funds confirmed irreversible by the provider.
    FundsReceived,
    /// Payees registered; eligible for the closing workflow.
    ReadyToClose,
    /// A closure intent is gathering signatures / disbursing.
    Closing,
    /// All disbursement attempts finished; balance zeroed. **Terminal.**
    Closed,
    /// Cancelled before funding. **Terminal.**
    Cancelled,
}

impl EscrowStatus {
    /// Can this status transition to the given target?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::DepositPending | Self::FundsReceived | Self::Cancelled)
                | (Self::DepositPending, Self::FundsReceived | Self::Cancelled)
                | (Self::FundsReceived, Self::ReadyToClose | Self::Cancelled)
                | (Self::ReadyToClose, Self::Closing | Self::Cancelled)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Terminal statuses never transition again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }

    /// Ordinal used by the reconciler to enforce monotonic advancement:
    /// a redelivered event may never regress a higher-ranked status.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::DepositPending => 1,
            Self::FundsReceived => 2,
            Self::ReadyToClose => 3,
            Self::Closing => 4,
            Self::Closed | Self::Cancelled => 5,
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::DepositPending => write!(f, "DEPOSIT_PENDING"),
            Self::FundsReceived => write!(f, "FUNDS_RECEIVED"),
            Self::ReadyToClose => write!(f, "READY_TO_CLOSE"),
            Self::Closing => write!(f, "CLOSING"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Where the earned yield was routed at close — always back to the
/// depositor side, never retained by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YieldRecipient {
    /// A registered payee with role BUYER absorbed the yield into their
    /// resolved payout.
    BuyerPayee(PayeeId),
    /// No BUYER payee existed; a separate yield-return line paid the
    /// original depositor.
    Depositor,
}

/// The escrow aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    /// Internal identifier.
    pub id: EscrowId,
    /// External-facing reference (shown on statements and links).
    pub reference: String,
    /// Agreed purchase price of the property.
    pub purchase_price: Decimal,
    /// Deposit amount recorded when good funds arrived. Zero until then.
    pub initial_deposit: Decimal,
    /// Current custodied balance view. Zero once CLOSED.
    pub current_balance: Decimal,
    /// Whether the deposit account accrues yield.
    pub yield_enabled: bool,
    /// Yield earned over the initial deposit, stamped during closing.
    pub yield_earned: Decimal,
    /// Who received the yield, stamped during closing.
    pub yield_recipient: Option<YieldRecipient>,
    /// Transfer reference of the completed depositor yield-return line,
    /// if one was owed. `None` while the return is still outstanding.
    pub yield_return_ref: Option<TransferRef>,
    /// M-of-N threshold: signatures required to authorize the close.
    pub required_approvals: u32,
    /// Provider handle to the segregated custody wallet.
    pub wallet_ref: WalletRef,
    /// Provider handle to the deposit-receiving account.
    pub deposit_account_ref: DepositAccountRef,
    /// Tokenized destination for returning funds/yield to the depositor.
    pub depositor_ref: RecipientRef,
    /// Aggregate settlement reference stamped at finalization.
    pub settlement_ref: Option<String>,
    /// Lifecycle status — the single source of truth.
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Escrow {
    /// Invariant check: balances never negative, closed means zeroed.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        self.current_balance >= Decimal::ZERO
            && self.yield_earned >= Decimal::ZERO
            && (self.status != EscrowStatus::Closed || self.current_balance == Decimal::ZERO)
            && self.required_approvals >= 1
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Escrow {
    /// Escrow fixture for unit tests.
    pub fn dummy(purchase_price: Decimal, required_approvals: u32) -> Self {
        let now = Utc::now();
        let id = EscrowId::new();
        Self {
            id,
            reference: format!("ESC-{}", &id.to_string()[..8]),
            purchase_price,
            initial_deposit: Decimal::ZERO,
            current_balance: Decimal::ZERO,
            yield_enabled: true,
            yield_earned: Decimal::ZERO,
            yield_recipient: None,
            yield_return_ref: None,
            required_approvals,
            wallet_ref: WalletRef::new("w-test"),
            deposit_account_ref: DepositAccountRef::new("a-test"),
            depositor_ref: RecipientRef::new("r-depositor"),
            settlement_ref: None,
            status: EscrowStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use EscrowStatus::*;
        assert!(Created.can_transition_to(DepositPending));
        assert!(DepositPending.can_transition_to(FundsReceived));
        assert!(FundsReceived.can_transition_to(ReadyToClose));
        assert!(ReadyToClose.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
    }

    #[test]
    fn direct_deposit_skips_pending() {
        assert!(EscrowStatus::Created.can_transition_to(EscrowStatus::FundsReceived));
    }

    #[test]
    fn cancel_reachable_pre_closing_only() {
        use EscrowStatus::*;
        assert!(Created.can_transition_to(Cancelled));
        assert!(DepositPending.can_transition_to(Cancelled));
        assert!(FundsReceived.can_transition_to(Cancelled));
        assert!(ReadyToClose.can_transition_to(Cancelled));
        assert!(!Closing.can_transition_to(Cancelled));
        assert!(!Closed.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_never_leave() {
        use EscrowStatus::*;
        for target in [
            Created,
            DepositPending,
            FundsReceived,
            ReadyToClose,
            Closing,
            Closed,
            Cancelled,
        ] {
            assert!(!Closed.can_transition_to(target), "CLOSED -> {target}");
            assert!(!Cancelled.can_transition_to(target), "CANCELLED -> {target}");
        }
    }

    #[test]
    fn no_regression() {
        use EscrowStatus::*;
        assert!(!FundsReceived.can_transition_to(DepositPending));
        assert!(!Closing.can_transition_to(ReadyToClose));
    }

    #[test]
    fn rank_is_monotone_along_happy_path() {
        use EscrowStatus::*;
        let path = [Created, DepositPending, FundsReceived, ReadyToClose, Closing, Closed];
        for pair in path.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn dummy_satisfies_invariants() {
        let e = Escrow::dummy(Decimal::new(500_000, 0), 2);
        assert!(e.invariants_hold());
    }

    #[test]
    fn closed_with_balance_violates_invariant() {
        let mut e = Escrow::dummy(Decimal::new(500_000, 0), 1);
        e.status = EscrowStatus::Closed;
        e.current_balance = Decimal::ONE;
        assert!(!e.invariants_hold());
    }

    #[test]
    fn serde_roundtrip() {
        let e = Escrow::dummy(Decimal::new(500_000, 0), 2);
        let json = serde_json::to_string(&e).unwrap();
        let back: Escrow = serde_json::from_str(&json).unwrap();
        assert_eq!(e.id, back.id);
        assert_eq!(e.status, back.status);
        assert_eq!(e.purchase_price, back.purchase_price);
    }
}
