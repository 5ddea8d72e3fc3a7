//! # clearhold-disburse
//!
//! **Disbursement Plane**: computes the final payout set for a closing
//! escrow and drives idempotent transfers through the custody gateway,
//! plus the dual-control bulk wire batch processor.
//!
//! ## Guarantees
//!
//! 1. Every transfer call carries a deterministic idempotency key — a
//!    retried execution can never create a second real-world transfer.
//! 2. One payee's failure never blocks siblings; outcomes are collected
//!    per line and failed items await manual re-drive.
//! 3. Earned yield is always routed back to the depositor side (the
//!    BUYER payee, or a synthetic yield-return line), never retained.
//! 4. Bulk uploads execute only after maker/checker separation held.

pub mod batch;
pub mod executor;
pub mod gateway;
pub mod wire_file;

pub use batch::BatchProcessor;
pub use executor::{CloseReport, DisbursementExecutor, PayoutOutcome};
pub use gateway::{ExecutedTransfer, MockCustodyGateway};
pub use wire_file::{ParsedLine, content_hash, parse_wire_file};
