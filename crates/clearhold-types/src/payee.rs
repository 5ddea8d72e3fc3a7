//! # Payee — a disbursement recipient
//!
//! Each payee belongs to one escrow and carries exactly one payout
//! specification. The old loosely-typed pair of nullable fields (fixed
//! amount *or* basis points) is a tagged [`PayoutSpec`] variant, so the
//! exclusivity invariant is structural rather than a runtime check.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{resolve_basis_points, to_cents};
use crate::{
    ClearholdError, EscrowId, PayeeId, PaymentRail, RecipientRef, Result, TransferRef,
    constants::BASIS_POINTS_SCALE,
};

/// How a payee's amount is computed at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PayoutSpec {
    /// A fixed dollar amount (must be positive).
    Fixed(Decimal),
    /// A share of the purchase price in basis points (0..=10000).
    Percentage(u16),
}

impl PayoutSpec {
    /// Validate the payout's own invariants.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Fixed(amount) if *amount <= Decimal::ZERO => {
                Err(ClearholdError::InvalidPayout {
                    reason: format!("fixed amount must be positive, got {amount}"),
                })
            }
            Self::Percentage(bps) if *bps > BASIS_POINTS_SCALE => {
                Err(ClearholdError::InvalidPayout {
                    reason: format!("basis points must be <= {BASIS_POINTS_SCALE}, got {bps}"),
                })
            }
            _ => Ok(()),
        }
    }

    /// Resolve to a cent-precision amount against the purchase price.
    #[must_use]
    pub fn resolve(&self, purchase_price: Decimal) -> Decimal {
        match self {
            Self::Fixed(amount) => to_cents(*amount),
            Self::Percentage(bps) => resolve_basis_points(purchase_price, *bps),
        }
    }
}

/// The payee's role in the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayeeRole {
    /// The depositing buyer. Receives the earned yield at close.
    Buyer,
    Seller,
    Agent,
    Lender,
    TitleCompany,
}

impl std::fmt::Display for PayeeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "BUYER"),
            Self::Seller => write!(f, "SELLER"),
            Self::Agent => write!(f, "AGENT"),
            Self::Lender => write!(f, "LENDER"),
            Self::TitleCompany => write!(f, "TITLE_COMPANY"),
        }
    }
}

/// Payee disbursement status. `Completed` and `Failed` are terminal;
/// failed payees are left for manual re-drive, never retried
/// automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayeeStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayeeStatus {
    /// Can this status transition to the given target?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
                // Manual re-drive of a failed payee goes back through
                // PROCESSING with the same idempotency key.
                | (Self::Failed, Self::Processing)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PayeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A disbursement recipient belonging to one escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payee {
    pub id: PayeeId,
    pub escrow_id: EscrowId,
    /// Display name (never raw bank details).
    pub name: String,
    pub role: PayeeRole,
    pub payout: PayoutSpec,
    /// Tokenized destination; raw account/routing numbers were forwarded
    /// to the custody provider and discarded at registration.
    pub dest_ref: RecipientRef,
    /// Rail the close-out transfer rides on.
    pub rail: PaymentRail,
    pub status: PayeeStatus,
    /// Final cent amount, stamped by the executor at close (includes the
    /// yield share for a BUYER payee).
    pub resolved_amount: Option<Decimal>,
    /// Provider transfer handle once initiated.
    pub transfer_ref: Option<TransferRef>,
    /// Failure reason for FAILED payees awaiting manual re-drive.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payee {
    /// Build a validated payee in PENDING state.
    pub fn new(
        escrow_id: EscrowId,
        name: impl Into<String>,
        role: PayeeRole,
        payout: PayoutSpec,
        dest_ref: RecipientRef,
        rail: PaymentRail,
    ) -> Result<Self> {
        payout.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: PayeeId::new(),
            escrow_id,
            name: name.into(),
            role,
            payout,
            dest_ref,
            rail,
            status: PayeeStatus::Pending,
            resolved_amount: None,
            transfer_ref: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        })
    }
}
