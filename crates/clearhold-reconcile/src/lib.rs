//! # clearhold-reconcile
//!
//! **Reconciliation Plane**: consumes asynchronous custody-provider
//! webhooks and advances escrow and payee state from provider-confirmed
//! facts only.
//!
//! ## Guarantees
//!
//! 1. Good-funds gate: `deposit.received` never advances an escrow past
//!    `DEPOSIT_PENDING`; only `deposit.completed` opens `FUNDS_RECEIVED`.
//! 2. Every payload is signature-verified and freshness-checked before
//!    any state is read or written.
//! 3. Deliveries are deduplicated by provider event id; a redelivery is
//!    a no-op with no additional audit entries.
//! 4. Unknown event types are logged and acknowledged, never fatal.

pub mod dedupe;
pub mod reconciler;
pub mod verify;

pub use dedupe::EventSeenGuard;
pub use reconciler::{SettlementReconciler, WebhookOutcome, http_status};
pub use verify::WebhookVerifier;
