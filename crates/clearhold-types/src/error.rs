//! Error types for the Clearhold orchestrator.
//!
//! All errors use the `CH_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Lifecycle / state-machine errors
//! - 2xx: Authorization / approval errors
//! - 3xx: Funds / payout errors
//! - 4xx: Batch errors
//! - 5xx: Custody provider errors
//! - 6xx: Webhook errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{EscrowId, PayeeId, WireBatchId};

/// Central error enum for all Clearhold operations.
#[derive(Debug, Error)]
pub enum ClearholdError {
    // =================================================================
    // Lifecycle Errors (1xx)
    // =================================================================
    /// An illegal state transition was attempted.
    #[error("CH_ERR_100: Invalid state: {entity} cannot go from {from} to {attempted}")]
    InvalidState {
        entity: String,
        from: String,
        attempted: String,
    },

    /// The requested escrow was not found.
    #[error("CH_ERR_101: Escrow not found: {0}")]
    EscrowNotFound(EscrowId),

    /// The requested payee was not found.
    #[error("CH_ERR_102: Payee not found: {0}")]
    PayeeNotFound(PayeeId),

    /// A close was requested on an escrow with no registered payees.
    #[error("CH_ERR_103: Escrow {0} has no payees to disburse to")]
    NoPayees(EscrowId),

    /// The deposit was already recorded for this escrow.
    #[error("CH_ERR_104: Deposit already received for escrow {0}")]
    DepositAlreadyReceived(EscrowId),

    // =================================================================
    // Authorization Errors (2xx)
    // =================================================================
    /// The actor lacks permission for this operation.
    #[error("CH_ERR_200: Not authorized: {reason}")]
    NotAuthorized { reason: String },

    /// This signer has already signed the closure intent.
    #[error("CH_ERR_201: Signer {wallet} has already signed")]
    AlreadySigned { wallet: String },

    /// Maker/checker separation violated: the approver is the uploader.
    #[error("CH_ERR_202: Dual-control violation: checker must differ from maker")]
    DualControlViolation,

    /// A wallet was registered twice as a signer on the same escrow.
    #[error("CH_ERR_203: Wallet {wallet} is already a signer on this escrow")]
    DuplicateSigner { wallet: String },

    /// Execution was attempted below the approval threshold.
    #[error("CH_ERR_204: Approval threshold not met: {confirmations} of {required}")]
    ThresholdNotMet { confirmations: u32, required: u32 },

    // =================================================================
    // Funds / Payout Errors (3xx)
    // =================================================================
    /// The disbursement total exceeds the custody balance.
    #[error("CH_ERR_300: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// A payout specification failed validation.
    #[error("CH_ERR_301: Invalid payout: {reason}")]
    InvalidPayout { reason: String },

    // =================================================================
    // Batch Errors (4xx)
    // =================================================================
    /// The requested batch was not found.
    #[error("CH_ERR_400: Batch not found: {0}")]
    BatchNotFound(WireBatchId),

    /// A wire file line failed to parse.
    #[error("CH_ERR_401: Batch parse error on line {line}: {reason}")]
    BatchParse { line: u32, reason: String },

    /// The uploaded wire file contained no line items.
    #[error("CH_ERR_402: Batch file is empty")]
    EmptyBatch,

    /// The wire file exceeds the configured line limit.
    #[error("CH_ERR_403: Batch has {lines} lines, limit is {max}")]
    BatchLimitExceeded { lines: usize, max: usize },

    /// The same wire file content was already uploaded.
    #[error("CH_ERR_404: Duplicate upload: identical file content already staged")]
    DuplicateUpload,

    // =================================================================
    // Custody Provider Errors (5xx)
    // =================================================================
    /// A custody/banking provider call failed (transient).
    #[error("CH_ERR_500: Provider call failed: {reason}")]
    ProviderCall { reason: String },

    // =================================================================
    // Webhook Errors (6xx)
    // =================================================================
    /// The webhook signature did not verify.
    #[error("CH_ERR_600: Webhook signature verification failed: {reason}")]
    SignatureVerification { reason: String },

    /// The webhook timestamp is outside the freshness window.
    #[error("CH_ERR_601: Stale webhook: {age_secs}s old exceeds freshness window")]
    StaleWebhook { age_secs: i64 },

    /// The webhook payload could not be decoded into a provider event.
    #[error("CH_ERR_602: Malformed webhook event: {reason}")]
    MalformedEvent { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CH_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CH_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("CH_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ClearholdError>;

impl From<serde_json::Error> for ClearholdError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = ClearholdError::EscrowNotFound(EscrowId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("CH_ERR_101"), "Got: {msg}");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = ClearholdError::InsufficientFunds {
            needed: Decimal::new(50_000_00, 2),
            available: Decimal::new(40_000_00, 2),
        };
        let msg = format!("{err}");
        assert!(msg.contains("CH_ERR_300"));
        assert!(msg.contains("50000"));
        assert!(msg.contains("40000"));
    }

    #[test]
    fn invalid_state_display() {
        let err = ClearholdError::InvalidState {
            entity: "escrow".into(),
            from: "CLOSED".into(),
            attempted: "CLOSING".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("CH_ERR_100"));
        assert!(msg.contains("CLOSED"));
        assert!(msg.contains("CLOSING"));
    }

    #[test]
    fn all_errors_have_ch_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(ClearholdError::DualControlViolation),
            Box::new(ClearholdError::EmptyBatch),
            Box::new(ClearholdError::AlreadySigned {
                wallet: "0xabc".into(),
            }),
            Box::new(ClearholdError::ProviderCall {
                reason: "timeout".into(),
            }),
            Box::new(ClearholdError::StaleWebhook { age_secs: 900 }),
            Box::new(ClearholdError::Internal("test".into())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("CH_ERR_"),
                "Error missing CH_ERR_ prefix: {msg}"
            );
        }
    }
}
