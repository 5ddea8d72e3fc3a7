//! Globally unique identifiers used throughout Clearhold.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting.
//! Custody handles (`WalletRef`, `DepositAccountRef`, `RecipientRef`,
//! `TransferRef`) are opaque strings owned by the custody provider — the
//! orchestrator never inspects their contents.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EscrowId
// ---------------------------------------------------------------------------

/// Globally unique escrow identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EscrowId(pub Uuid);

impl EscrowId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for EscrowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PayeeId
// ---------------------------------------------------------------------------

/// Unique identifier for a disbursement recipient within an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PayeeId(pub Uuid);

impl PayeeId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PayeeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PayeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WireBatchId
// ---------------------------------------------------------------------------

/// Unique identifier for a bulk wire-upload batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct WireBatchId(pub Uuid);

impl WireBatchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for WireBatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WireBatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AuditEventId
// ---------------------------------------------------------------------------

/// Unique identifier for an append-only audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AuditEventId(pub Uuid);

impl AuditEventId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WalletAddress
// ---------------------------------------------------------------------------

/// The on-chain wallet address identifying a signer or batch operator.
///
/// Compared case-insensitively: providers and wallets disagree on hex
/// casing, and a checksum-cased and lowercased address must count as the
/// same signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logs (first 10 chars).
    #[must_use]
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(10) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl PartialEq for WalletAddress {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for WalletAddress {}

impl std::hash::Hash for WalletAddress {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Opaque custody references
// ---------------------------------------------------------------------------

/// Opaque handle to a provider-custodied segregated wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletRef(pub String);

impl WalletRef {
    #[must_use]
    pub fn new(r: impl Into<String>) -> Self {
        Self(r.into())
    }
}

impl fmt::Display for WalletRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wallet:{}", self.0)
    }
}

/// Opaque handle to a provider deposit-receiving account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositAccountRef(pub String);

impl DepositAccountRef {
    #[must_use]
    pub fn new(r: impl Into<String>) -> Self {
        Self(r.into())
    }
}

impl fmt::Display for DepositAccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

/// Opaque tokenized reference to a recipient's bank or wallet destination.
///
/// Raw routing/account numbers are forwarded to the custody provider and
/// discarded immediately after tokenization; only this ref is retained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientRef(pub String);

impl RecipientRef {
    #[must_use]
    pub fn new(r: impl Into<String>) -> Self {
        Self(r.into())
    }
}

impl fmt::Display for RecipientRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recip:{}", self.0)
    }
}

/// Opaque handle to an initiated provider transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferRef(pub String);

impl TransferRef {
    #[must_use]
    pub fn new(r: impl Into<String>) -> Self {
        Self(r.into())
    }
}

impl fmt::Display for TransferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xfer:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IdempotencyKey
// ---------------------------------------------------------------------------

/// Deterministic idempotency key passed to every custody call.
///
/// Derived as `SHA-256("clearhold:idem:v1:" || scope || entity || action)`,
/// hex-encoded. The same (scope, entity, action) triple always yields the
/// same key, so a retried execution can never create a second real-world
/// transfer. Keys are stored alongside the transfer record for audit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derive a key from a (scope, entity, action) triple.
    #[must_use]
    pub fn derive(scope: &str, entity: &str, action: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"clearhold:idem:v1:");
        hasher.update(scope.as_bytes());
        hasher.update([0x1f]);
        hasher.update(entity.as_bytes());
        hasher.update([0x1f]);
        hasher.update(action.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Key for a payee's close-out disbursement.
    #[must_use]
    pub fn for_close(escrow_id: EscrowId, payee_id: PayeeId) -> Self {
        Self::derive(&escrow_id.to_string(), &payee_id.to_string(), "close")
    }

    /// Key for the synthetic yield-return line to the original depositor.
    #[must_use]
    pub fn for_yield_return(escrow_id: EscrowId) -> Self {
        Self::derive(&escrow_id.to_string(), "depositor", "yield-return")
    }

    /// Key for one line of a wire batch.
    #[must_use]
    pub fn for_batch_line(batch_id: WireBatchId, line_number: u32) -> Self {
        Self::derive(&batch_id.to_string(), &line_number.to_string(), "batch-line")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escrow_id_uniqueness() {
        let a = EscrowId::new();
        let b = EscrowId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn escrow_id_ordering() {
        let a = EscrowId::new();
        let b = EscrowId::new();
        assert!(a < b);
    }

    #[test]
    fn wallet_address_case_insensitive_eq() {
        let a = WalletAddress::new("0xAbCd1234");
        let b = WalletAddress::new("0xabcd1234");
        assert_eq!(a, b);

        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn wallet_address_short() {
        let a = WalletAddress::new("0x1234567890abcdef");
        assert_eq!(a.short(), "0x12345678");
        let tiny = WalletAddress::new("0x12");
        assert_eq!(tiny.short(), "0x12");
    }

    #[test]
    fn wallet_address_short_respects_char_boundaries() {
        // A multibyte char spanning byte 10 must not split.
        let accented = WalletAddress::new("0xabcdefg\u{00e9}xyz");
        assert_eq!(accented.short(), "0xabcdefg\u{00e9}");
        let wide = WalletAddress::new("\u{30a6}\u{30a9}\u{30ec}\u{30c3}\u{30c8}");
        assert_eq!(wide.short(), "\u{30a6}\u{30a9}\u{30ec}\u{30c3}\u{30c8}");
    }

    #[test]
    fn idempotency_key_deterministic() {
        let e = EscrowId::new();
        let p = PayeeId::new();
        assert_eq!(
            IdempotencyKey::for_close(e, p),
            IdempotencyKey::for_close(e, p)
        );
    }

    #[test]
    fn idempotency_key_differs_by_component() {
        let e = EscrowId::new();
        let p1 = PayeeId::new();
        let p2 = PayeeId::new();
        assert_ne!(
            IdempotencyKey::for_close(e, p1),
            IdempotencyKey::for_close(e, p2)
        );
        assert_ne!(
            IdempotencyKey::derive("a", "b", "c"),
            IdempotencyKey::derive("a", "b", "d")
        );
    }

    #[test]
    fn idempotency_key_no_concatenation_collision() {
        // "ab" + "c" must not collide with "a" + "bc".
        assert_ne!(
            IdempotencyKey::derive("ab", "c", "x"),
            IdempotencyKey::derive("a", "bc", "x")
        );
    }

    #[test]
    fn batch_line_keys_distinct_per_line() {
        let b = WireBatchId::new();
        assert_ne!(
            IdempotencyKey::for_batch_line(b, 1),
            IdempotencyKey::for_batch_line(b, 2)
        );
    }

    #[test]
    fn serde_roundtrips() {
        let eid = EscrowId::new();
        let json = serde_json::to_string(&eid).unwrap();
        let back: EscrowId = serde_json::from_str(&json).unwrap();
        assert_eq!(eid, back);

        let key = IdempotencyKey::derive("s", "e", "a");
        let json = serde_json::to_string(&key).unwrap();
        let back: IdempotencyKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
