//! # WireBatch — a bulk-upload unit under dual control
//!
//! A wire batch is parsed from an uploaded file, staged with a content
//! hash for tamper detection, and gated by maker/checker separation
//! before execution.
//!
//! ## State Machine
//!
//! ```text
//!   UPLOADED ──▶ APPROVED ──┐
//!       │            │      ├──▶ PROCESSING ──▶ COMPLETED | PARTIAL | FAILED
//!       │            │      │
//!       ├──▶ REJECTED│──────┘ (execute is also legal straight from UPLOADED)
//!       └────────────┴──▶ CANCELLED (maker only, pre-PROCESSING)
//! ```
//!
//! Once a batch reaches COMPLETED/PARTIAL/FAILED its execution results
//! are immutable.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{RecipientRef, TransferRef, WalletAddress, WireBatchId};

/// Settlement rail a payout rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRail {
    Ach,
    Wire,
    Rtp,
}

impl std::fmt::Display for PaymentRail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ach => write!(f, "ach"),
            Self::Wire => write!(f, "wire"),
            Self::Rtp => write!(f, "rtp"),
        }
    }
}

impl FromStr for PaymentRail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ach" => Ok(Self::Ach),
            "wire" => Ok(Self::Wire),
            "rtp" => Ok(Self::Rtp),
            other => Err(format!("unknown rail: {other}")),
        }
    }
}

/// Batch lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    Uploaded,
    Approved,
    Rejected,
    Processing,
    /// Every line succeeded. **Terminal.**
    Completed,
    /// At least one success and at least one failure/skip. **Terminal.**
    Partial,
    /// Zero successes. **Terminal.**
    Failed,
    /// Withdrawn by the maker before processing. **Terminal.**
    Cancelled,
}

impl BatchStatus {
    /// Can this status transition to the given target?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Uploaded, Self::Approved | Self::Rejected | Self::Processing | Self::Cancelled)
                | (Self::Approved, Self::Processing | Self::Cancelled)
                | (Self::Rejected, Self::Cancelled)
                | (Self::Processing, Self::Completed | Self::Partial | Self::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Partial | Self::Failed | Self::Cancelled
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uploaded => write!(f, "UPLOADED"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One parsed line of a wire file. Raw routing/account data was
/// tokenized at upload and discarded; only the opaque ref survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireLine {
    /// 1-based position in the uploaded file (header excluded).
    pub line_number: u32,
    pub name: String,
    pub amount: Decimal,
    pub dest_ref: RecipientRef,
    pub rail: PaymentRail,
}

/// Outcome of executing one wire line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LineResult {
    Success { transfer_ref: TransferRef },
    Failed { reason: String },
    Skipped { reason: String },
}

/// Per-line execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineOutcome {
    pub line_number: u32,
    pub result: LineResult,
}

/// A bulk wire batch under maker/checker control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireBatch {
    pub id: WireBatchId,
    pub file_name: String,
    pub file_type: String,
    /// SHA-256 of the raw uploaded content, for tamper detection.
    pub content_hash: [u8; 32],
    pub lines: Vec<WireLine>,
    /// Sum of all line amounts.
    pub total: Decimal,
    /// Subtotals keyed by rail.
    pub rail_subtotals: BTreeMap<PaymentRail, Decimal>,
    /// Uploader. Only the maker may cancel.
    pub maker: WalletAddress,
    /// Approver or rejecter; always distinct from the maker.
    pub checker: Option<WalletAddress>,
    pub rejection_reason: Option<String>,
    pub status: BatchStatus,
    /// Immutable once the batch reaches a terminal processing status.
    pub outcomes: Vec<LineOutcome>,
    pub success_count: u32,
    pub failed_count: u32,
    pub skipped_count: u32,
    pub uploaded_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl WireBatch {
    /// Aggregate line amounts into total and per-rail subtotals.
    #[must_use]
    pub fn tally(lines: &[WireLine]) -> (Decimal, BTreeMap<PaymentRail, Decimal>) {
        let mut total = Decimal::ZERO;
        let mut subtotals: BTreeMap<PaymentRail, Decimal> = BTreeMap::new();
        for line in lines {
            total += line.amount;
            *subtotals.entry(line.rail).or_insert(Decimal::ZERO) += line.amount;
        }
        (total, subtotals)
    }

    /// Final status from the outcome counts after processing.
    #[must_use]
    pub fn rollup_status(success: u32, failed: u32, skipped: u32) -> BatchStatus {
        if success > 0 && failed == 0 && skipped == 0 {
            BatchStatus::Completed
        } else if success > 0 {
            BatchStatus::Partial
        } else {
            BatchStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u32, amount: Decimal, rail: PaymentRail) -> WireLine {
        WireLine {
            line_number: n,
            name: format!("Recipient {n}"),
            amount,
            dest_ref: RecipientRef::new(format!("r-{n}")),
            rail,
        }
    }

    #[test]
    fn rail_parsing() {
        assert_eq!("WIRE".parse::<PaymentRail>().unwrap(), PaymentRail::Wire);
        assert_eq!(" ach ".parse::<PaymentRail>().unwrap(), PaymentRail::Ach);
        assert!("fedex".parse::<PaymentRail>().is_err());
    }

    #[test]
    fn tally_totals_and_subtotals() {
        let lines = vec![
            line(1, Decimal::new(100_00, 2), PaymentRail::Ach),
            line(2, Decimal::new(250_00, 2), PaymentRail::Wire),
            line(3, Decimal::new(50_00, 2), PaymentRail::Ach),
        ];
        let (total, subtotals) = WireBatch::tally(&lines);
        assert_eq!(total, Decimal::new(400_00, 2));
        assert_eq!(subtotals[&PaymentRail::Ach], Decimal::new(150_00, 2));
        assert_eq!(subtotals[&PaymentRail::Wire], Decimal::new(250_00, 2));
        assert!(!subtotals.contains_key(&PaymentRail::Rtp));
    }

    #[test]
    fn status_transitions() {
        use BatchStatus::*;
        assert!(Uploaded.can_transition_to(Approved));
        assert!(Uploaded.can_transition_to(Rejected));
        assert!(Uploaded.can_transition_to(Processing)); // execute without separate approval
        assert!(Uploaded.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Processing));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(Rejected.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Partial));
        assert!(Processing.can_transition_to(Failed));
    }

    #[test]
    fn processing_and_terminal_not_cancellable() {
        use BatchStatus::*;
        assert!(!Processing.can_transition_to(Cancelled));
        for terminal in [Completed, Partial, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Processing));
            assert!(!terminal.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn rollup_scenarios() {
        assert_eq!(WireBatch::rollup_status(3, 0, 0), BatchStatus::Completed);
        assert_eq!(WireBatch::rollup_status(2, 1, 0), BatchStatus::Partial);
        assert_eq!(WireBatch::rollup_status(1, 0, 2), BatchStatus::Partial);
        assert_eq!(WireBatch::rollup_status(0, 3, 0), BatchStatus::Failed);
        assert_eq!(WireBatch::rollup_status(0, 0, 0), BatchStatus::Failed);
    }
}
