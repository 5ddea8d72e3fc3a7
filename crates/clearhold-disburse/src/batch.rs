//! Batch Dual-Control Processor.
//!
//! Stages bulk wire files under maker/checker separation. Upload parses
//! the file, tokenizes every line's bank details at the provider (raw
//! routing/account data is discarded immediately), and stores a content
//! hash so an identical re-upload is rejected. Approval or rejection
//! must come from a wallet other than the maker. Execution reuses the
//! per-line idempotent transfer path, so a re-driven batch can never
//! double-pay a line.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use clearhold_core::AuditLog;
use clearhold_types::{
    AuditAction, BatchStatus, ClearholdError, CustodyGateway, DepositAccountRef, IdempotencyKey,
    LineOutcome, LineResult, Result, WalletAddress, WireBatch, WireBatchId, WireLine,
    constants::DEFAULT_MAX_BATCH_LINES,
};
use serde_json::json;
use tracing::{info, warn};

use crate::wire_file::{content_hash, parse_wire_file};

/// Stages, gates, and executes bulk wire batches.
#[derive(Debug)]
pub struct BatchProcessor {
    batches: HashMap<WireBatchId, WireBatch>,
    /// Content hashes of every staged upload, for duplicate detection.
    seen_hashes: HashSet<[u8; 32]>,
    max_lines: usize,
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_LINES)
    }
}

impl BatchProcessor {
    #[must_use]
    pub fn new(max_lines: usize) -> Self {
        Self {
            batches: HashMap::new(),
            seen_hashes: HashSet::new(),
            max_lines,
        }
    }

    pub fn batch(&self, id: WireBatchId) -> Result<&WireBatch> {
        self.batches
            .get(&id)
            .ok_or(ClearholdError::BatchNotFound(id))
    }

    /// Parse and stage an uploaded wire file as `UPLOADED`.
    ///
    /// Every line's routing/account numbers are forwarded for
    /// tokenization and dropped; the staged batch holds only opaque
    /// recipient refs.
    pub fn upload(
        &mut self,
        gateway: &mut dyn CustodyGateway,
        audit: &mut AuditLog,
        file_name: &str,
        contents: &str,
        maker: WalletAddress,
    ) -> Result<WireBatchId> {
        let parsed = parse_wire_file(contents)?;
        if parsed.is_empty() {
            return Err(ClearholdError::EmptyBatch);
        }
        if parsed.len() > self.max_lines {
            return Err(ClearholdError::BatchLimitExceeded {
                lines: parsed.len(),
                max: self.max_lines,
            });
        }

        let hash = content_hash(contents);
        if self.seen_hashes.contains(&hash) {
            return Err(ClearholdError::DuplicateUpload);
        }

        let hash_hex = hex::encode(hash);
        let mut lines = Vec::with_capacity(parsed.len());
        for item in parsed {
            let dest_ref = gateway.tokenize_recipient(
                &IdempotencyKey::derive(
                    "batch-tokenize",
                    &hash_hex,
                    &item.line_number.to_string(),
                ),
                &item.bank,
            )?;
            lines.push(WireLine {
                line_number: item.line_number,
                name: item.name,
                amount: item.amount,
                dest_ref,
                rail: item.rail,
            });
        }

        let (total, rail_subtotals) = WireBatch::tally(&lines);
        let line_count = lines.len();
        let batch = WireBatch {
            id: WireBatchId::new(),
            file_name: file_name.to_string(),
            file_type: "csv".to_string(),
            content_hash: hash,
            lines,
            total,
            rail_subtotals,
            maker: maker.clone(),
            checker: None,
            rejection_reason: None,
            status: BatchStatus::Uploaded,
            outcomes: Vec::new(),
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            uploaded_at: Utc::now(),
            decided_at: None,
            executed_at: None,
        };
        let id = batch.id;
        self.seen_hashes.insert(hash);
        self.batches.insert(id, batch);

        info!(batch = %id, file = file_name, lines = line_count, %total, "batch uploaded");
        audit.record(
            None,
            AuditAction::BatchUploaded,
            maker.to_string(),
            json!({
                "batch": id.to_string(),
                "file": file_name,
                "lines": line_count,
                "total": total.to_string(),
            }),
        );
        Ok(id)
    }

    /// Checker approval: `UPLOADED → APPROVED`. The checker must differ
    /// from the maker.
    pub fn approve(
        &mut self,
        audit: &mut AuditLog,
        id: WireBatchId,
        checker: &WalletAddress,
    ) -> Result<()> {
        let batch = self.decidable(id, checker)?;
        batch.status = BatchStatus::Approved;
        batch.checker = Some(checker.clone());
        batch.decided_at = Some(Utc::now());
        audit.record(
            None,
            AuditAction::BatchApproved,
            checker.to_string(),
            json!({ "batch": id.to_string() }),
        );
        Ok(())
    }

    /// Checker rejection: `UPLOADED → REJECTED`, with a recorded reason.
    pub fn reject(
        &mut self,
        audit: &mut AuditLog,
        id: WireBatchId,
        checker: &WalletAddress,
        reason: &str,
    ) -> Result<()> {
        let batch = self.decidable(id, checker)?;
        batch.status = BatchStatus::Rejected;
        batch.checker = Some(checker.clone());
        batch.rejection_reason = Some(reason.to_string());
        batch.decided_at = Some(Utc::now());
        audit.record(
            None,
            AuditAction::BatchRejected,
            checker.to_string(),
            json!({ "batch": id.to_string(), "reason": reason }),
        );
        Ok(())
    }

    /// Maker withdrawal, legal only before processing starts.
    pub fn cancel(
        &mut self,
        audit: &mut AuditLog,
        id: WireBatchId,
        requester: &WalletAddress,
    ) -> Result<()> {
        let batch = self
            .batches
            .get_mut(&id)
            .ok_or(ClearholdError::BatchNotFound(id))?;
        if &batch.maker != requester {
            return Err(ClearholdError::NotAuthorized {
                reason: format!("only the maker may cancel batch {id}"),
            });
        }
        if !batch.status.can_transition_to(BatchStatus::Cancelled) {
            return Err(ClearholdError::InvalidState {
                entity: format!("batch {id}"),
                from: batch.status.to_string(),
                attempted: BatchStatus::Cancelled.to_string(),
            });
        }
        batch.status = BatchStatus::Cancelled;
        audit.record(
            None,
            AuditAction::BatchCancelled,
            requester.to_string(),
            json!({ "batch": id.to_string() }),
        );
        Ok(())
    }

    /// Execute every line of a staged batch from the given funding
    /// account. Legal from `UPLOADED` or `APPROVED`: dual control is
    /// enforced at decision time, and execution authority may be
    /// delegated to the escrow-level approval workflow.
    ///
    /// Zero-amount lines are skipped; a provider failure on one line
    /// never aborts its siblings. Each line's idempotency key is derived
    /// from the batch id and line number, so replaying a batch after a
    /// crash re-issues only the lines the provider has not seen.
    pub fn execute(
        &mut self,
        audit: &mut AuditLog,
        gateway: &mut dyn CustodyGateway,
        id: WireBatchId,
        source: &DepositAccountRef,
        actor: &str,
    ) -> Result<BatchStatus> {
        let batch = self
            .batches
            .get_mut(&id)
            .ok_or(ClearholdError::BatchNotFound(id))?;
        if !batch.status.can_transition_to(BatchStatus::Processing) {
            return Err(ClearholdError::InvalidState {
                entity: format!("batch {id}"),
                from: batch.status.to_string(),
                attempted: BatchStatus::Processing.to_string(),
            });
        }
        batch.status = BatchStatus::Processing;

        let mut outcomes = Vec::with_capacity(batch.lines.len());
        let (mut success, mut failed, mut skipped) = (0u32, 0u32, 0u32);
        for line in &batch.lines {
            let result = if line.amount.is_zero() {
                skipped += 1;
                LineResult::Skipped {
                    reason: "zero amount".into(),
                }
            } else {
                let key = IdempotencyKey::for_batch_line(id, line.line_number);
                match gateway.transfer(&key, source, &line.dest_ref, line.amount, line.rail) {
                    Ok(transfer_ref) => {
                        success += 1;
                        LineResult::Success { transfer_ref }
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        warn!(batch = %id, line = line.line_number, %reason, "line failed");
                        failed += 1;
                        LineResult::Failed { reason }
                    }
                }
            };
            outcomes.push(LineOutcome {
                line_number: line.line_number,
                result,
            });
        }

        // Rollup only after every line has an outcome.
        let final_status = WireBatch::rollup_status(success, failed, skipped);
        batch.status = final_status;
        batch.outcomes = outcomes;
        batch.success_count = success;
        batch.failed_count = failed;
        batch.skipped_count = skipped;
        batch.executed_at = Some(Utc::now());

        info!(
            batch = %id,
            status = %final_status,
            success,
            failed,
            skipped,
            "batch executed"
        );
        audit.record(
            None,
            AuditAction::BatchExecuted,
            actor,
            json!({
                "batch": id.to_string(),
                "status": final_status.to_string(),
                "success": success,
                "failed": failed,
                "skipped": skipped,
            }),
        );
        Ok(final_status)
    }

    /// Shared precondition for approve/reject: batch exists, is still
    /// `UPLOADED`, and the checker is not the maker.
    fn decidable(&mut self, id: WireBatchId, checker: &WalletAddress) -> Result<&mut WireBatch> {
        let batch = self
            .batches
            .get_mut(&id)
            .ok_or(ClearholdError::BatchNotFound(id))?;
        if batch.status != BatchStatus::Uploaded {
            return Err(ClearholdError::InvalidState {
                entity: format!("batch {id}"),
                from: batch.status.to_string(),
                attempted: "maker/checker decision".into(),
            });
        }
        if &batch.maker == checker {
            return Err(ClearholdError::DualControlViolation);
        }
        Ok(batch)
    }
}
