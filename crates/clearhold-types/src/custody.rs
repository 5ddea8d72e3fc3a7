//! The custody seam — interfaces the core consumes but does not implement.
//!
//! The implementation is chosen at process start and injected by
//! configuration (a real provider client in production, the mock gateway
//! in tests and sandboxes). There is no runtime mock/real switch inside
//! call sites.

use rust_decimal::Decimal;

use crate::{
    DepositAccountRef, IdempotencyKey, PaymentRail, RecipientRef, Result, TransferRef, WalletRef,
};

/// Raw bank details as received from a form or wire file.
///
/// These exist only in transit: they are forwarded to the custody
/// provider for tokenization and dropped immediately after. No entity in
/// the ledger stores them. `Debug` redacts the numbers so they cannot
/// leak into logs.
#[derive(Clone)]
pub struct BankDetails {
    pub account_holder: String,
    pub routing_number: String,
    pub account_number: String,
}

impl std::fmt::Debug for BankDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankDetails")
            .field("account_holder", &self.account_holder)
            .field("routing_number", &"<redacted>")
            .field("account_number", &"<redacted>")
            .finish()
    }
}

/// The external banking/custody provider, as the orchestrator sees it.
///
/// Every call takes an [`IdempotencyKey`] the provider is assumed to
/// honor server-side: a repeated request with the same key produces the
/// same effect exactly once.
pub trait CustodyGateway {
    /// Create a segregated custody wallet on the given chain.
    fn create_wallet(&mut self, key: &IdempotencyKey, chain: &str) -> Result<WalletRef>;

    /// Create a deposit-receiving account attached to a wallet.
    fn create_deposit_account(
        &mut self,
        key: &IdempotencyKey,
        wallet: &WalletRef,
        yield_enabled: bool,
    ) -> Result<DepositAccountRef>;

    /// Exchange raw bank details for an opaque recipient reference.
    fn tokenize_recipient(
        &mut self,
        key: &IdempotencyKey,
        details: &BankDetails,
    ) -> Result<RecipientRef>;

    /// Initiate a transfer out of a deposit account.
    fn transfer(
        &mut self,
        key: &IdempotencyKey,
        source: &DepositAccountRef,
        dest: &RecipientRef,
        amount: Decimal,
        rail: PaymentRail,
    ) -> Result<TransferRef>;

    /// Current custodied balance of a wallet.
    fn balance(&self, wallet: &WalletRef) -> Result<Decimal>;
}

/// Outbound notification trigger (deposit links, close confirmations).
///
/// Strictly fire-and-forget: callers log and swallow failures so a
/// notification outage can never fail the core transition it was
/// triggered from.
pub trait NotificationSink {
    fn notify(&self, topic: &str, message: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_details_debug_redacts_numbers() {
        let details = BankDetails {
            account_holder: "Jane Seller".into(),
            routing_number: "021000021".into(),
            account_number: "000123456789".into(),
        };
        let out = format!("{details:?}");
        assert!(out.contains("Jane Seller"));
        assert!(!out.contains("021000021"));
        assert!(!out.contains("000123456789"));
    }
}
