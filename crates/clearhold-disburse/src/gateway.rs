//! Mock custody gateway for tests and sandboxes.
//!
//! Chosen by configuration at process start — production wires in the
//! real provider client behind the same [`CustodyGateway`] trait. The
//! mock honors idempotency keys the way the provider contract promises:
//! a repeated call with the same key returns the original result and
//! executes nothing new.

use std::collections::{HashMap, HashSet};

use clearhold_types::{
    BankDetails, ClearholdError, CustodyGateway, DepositAccountRef, IdempotencyKey, PaymentRail,
    RecipientRef, Result, TransferRef, WalletRef,
};
use rust_decimal::Decimal;

/// A transfer the mock actually executed (idempotent replays excluded).
#[derive(Debug, Clone)]
pub struct ExecutedTransfer {
    pub transfer_ref: TransferRef,
    pub source: DepositAccountRef,
    pub dest: RecipientRef,
    pub amount: Decimal,
    pub rail: PaymentRail,
}

/// In-memory provider double with scriptable failures.
#[derive(Debug, Default)]
pub struct MockCustodyGateway {
    wallets: HashMap<IdempotencyKey, WalletRef>,
    accounts: HashMap<IdempotencyKey, DepositAccountRef>,
    recipients: HashMap<IdempotencyKey, RecipientRef>,
    /// Key -> transfer handle. A hit means replay: same handle, no new
    /// execution. Failed attempts never populate this map, so a retry
    /// with the same key genuinely re-attempts.
    transfers: HashMap<IdempotencyKey, TransferRef>,
    balances: HashMap<WalletRef, Decimal>,
    /// Destinations scripted to fail transfer calls.
    failing_dests: HashSet<RecipientRef>,
    executed: Vec<ExecutedTransfer>,
    seq: u64,
}

impl MockCustodyGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the custodied balance of a wallet.
    pub fn set_balance(&mut self, wallet: WalletRef, amount: Decimal) {
        self.balances.insert(wallet, amount);
    }

    /// Script every transfer to this destination to fail.
    pub fn fail_destination(&mut self, dest: RecipientRef) {
        self.failing_dests.insert(dest);
    }

    /// Remove a scripted failure (the rail recovered).
    pub fn clear_failure(&mut self, dest: &RecipientRef) {
        self.failing_dests.remove(dest);
    }

    /// Transfers actually executed, replays excluded.
    #[must_use]
    pub fn executed_transfers(&self) -> &[ExecutedTransfer] {
        &self.executed
    }

    fn next_ref(&mut self, prefix: &str) -> String {
        self.seq += 1;
        format!("{prefix}-{:06}", self.seq)
    }
}

impl CustodyGateway for MockCustodyGateway {
    fn create_wallet(&mut self, key: &IdempotencyKey, chain: &str) -> Result<WalletRef> {
        if let Some(existing) = self.wallets.get(key) {
            return Ok(existing.clone());
        }
        let wallet = WalletRef::new(format!("{}-{}", chain, self.next_ref("w")));
        self.wallets.insert(key.clone(), wallet.clone());
        self.balances.insert(wallet.clone(), Decimal::ZERO);
        Ok(wallet)
    }

    fn create_deposit_account(
        &mut self,
        key: &IdempotencyKey,
        _wallet: &WalletRef,
        _yield_enabled: bool,
    ) -> Result<DepositAccountRef> {
        if let Some(existing) = self.accounts.get(key) {
            return Ok(existing.clone());
        }
        let account = DepositAccountRef::new(self.next_ref("acct"));
        self.accounts.insert(key.clone(), account.clone());
        Ok(account)
    }

    fn tokenize_recipient(
        &mut self,
        key: &IdempotencyKey,
        _details: &BankDetails,
    ) -> Result<RecipientRef> {
        if let Some(existing) = self.recipients.get(key) {
            return Ok(existing.clone());
        }
        let recipient = RecipientRef::new(self.next_ref("recip"));
        self.recipients.insert(key.clone(), recipient.clone());
        Ok(recipient)
    }

    fn transfer(
        &mut self,
        key: &IdempotencyKey,
        source: &DepositAccountRef,
        dest: &RecipientRef,
        amount: Decimal,
        rail: PaymentRail,
    ) -> Result<TransferRef> {
        if let Some(existing) = self.transfers.get(key) {
            return Ok(existing.clone());
        }
        if self.failing_dests.contains(dest) {
            return Err(ClearholdError::ProviderCall {
                reason: format!("transfer to {dest} rejected by rail"),
            });
        }
        let transfer_ref = TransferRef::new(self.next_ref("xfr"));
        self.transfers.insert(key.clone(), transfer_ref.clone());
        self.executed.push(ExecutedTransfer {
            transfer_ref: transfer_ref.clone(),
            source: source.clone(),
            dest: dest.clone(),
            amount,
            rail,
        });
        Ok(transfer_ref)
    }

    fn balance(&self, wallet: &WalletRef) -> Result<Decimal> {
        Ok(self.balances.get(wallet).copied().unwrap_or(Decimal::ZERO))
    }
}
