//! # clearhold-core
//!
//! **Lifecycle Plane**: the escrow state machine, the M-of-N approval
//! workflow that gates fund release, the transactional ledger, and the
//! append-only audit log.
//!
//! ## Architecture
//!
//! All escrow and payee status writes funnel through the
//! [`LifecycleManager`]'s guard methods — no component writes status
//! directly. The [`EscrowLedger`] enforces the storage invariants
//! (transition legality, one signer wallet per escrow); the
//! [`ApprovalEngine`] gathers signatures but never auto-executes.
//! Every mutation appends an [`AuditLog`] entry.

pub mod approval;
pub mod audit;
pub mod ledger;
pub mod lifecycle;
pub mod notify;

pub use approval::{ApprovalEngine, ApprovalState};
pub use audit::AuditLog;
pub use ledger::EscrowLedger;
pub use lifecycle::{LifecycleManager, OpenEscrowRequest};
pub use notify::{TracingSink, notify_best_effort};
