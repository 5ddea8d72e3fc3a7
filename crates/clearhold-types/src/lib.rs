//! # clearhold-types
//!
//! Shared types, errors, and configuration for the **Clearhold** escrow
//! settlement orchestrator.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`EscrowId`], [`PayeeId`], [`WireBatchId`], [`AuditEventId`], [`WalletAddress`], opaque custody refs, [`IdempotencyKey`]
//! - **Escrow model**: [`Escrow`], [`EscrowStatus`], [`YieldRecipient`]
//! - **Payee model**: [`Payee`], [`PayeeRole`], [`PayeeStatus`], [`PayoutSpec`]
//! - **Signer model**: [`Signer`]
//! - **Batch model**: [`WireBatch`], [`BatchStatus`], [`WireLine`], [`LineOutcome`], [`PaymentRail`]
//! - **Audit model**: [`AuditEvent`], [`AuditAction`]
//! - **Provider events**: [`ProviderEvent`], [`EventKind`]
//! - **Custody seam**: [`CustodyGateway`], [`BankDetails`], [`NotificationSink`]
//! - **Configuration**: [`OrchestratorConfig`]
//! - **Errors**: [`ClearholdError`] with `CH_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod audit;
pub mod batch;
pub mod config;
pub mod constants;
pub mod custody;
pub mod error;
pub mod escrow;
pub mod events;
pub mod ids;
pub mod money;
pub mod payee;
pub mod signer;

// Re-export all primary types at crate root for ergonomic imports:
//   use clearhold_types::{Escrow, EscrowStatus, Payee, PayoutSpec, ...};

pub use audit::*;
pub use batch::*;
pub use config::*;
pub use custody::*;
pub use error::*;
pub use escrow::*;
pub use events::*;
pub use ids::*;
pub use money::*;
pub use payee::*;
pub use signer::*;

// Constants are accessed via `clearhold_types::constants::FOO`
// (not re-exported to avoid name collisions).
