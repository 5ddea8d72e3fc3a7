//! Signer — an authorized approver of an escrow's closure.
//!
//! Signers are registered per escrow; each wallet address appears at most
//! once (enforced by the ledger). The initiating party is always signer #1.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::WalletAddress;

/// One authorized approver on an escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signer {
    /// Wallet identity of the approver.
    pub wallet: WalletAddress,
    /// Role label shown in the approval UI (e.g. "buyer", "escrow agent").
    pub role: String,
    /// Position in the signer list; the initiator is always #1.
    pub order: u8,
    pub has_signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
}

impl Signer {
    #[must_use]
    pub fn new(wallet: WalletAddress, role: impl Into<String>, order: u8) -> Self {
        Self {
            wallet,
            role: role.into(),
            order,
            has_signed: false,
            signed_at: None,
        }
    }

    /// Record this signer's signature.
    pub fn sign(&mut self) {
        self.has_signed = true;
        self.signed_at = Some(Utc::now());
    }
}
