//! Append-only audit log.
//!
//! One entry per meaningful mutation. Entries are never updated or
//! deleted; the per-escrow query returns newest-first for compliance
//! review.

use clearhold_types::{AuditAction, AuditEvent, EscrowId};
use serde_json::Value;
use tracing::info;

/// The append-only record of every state transition.
#[derive(Debug, Default)]
pub struct AuditLog {
    /// Chronological append order.
    events: Vec<AuditEvent>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event.
    pub fn record(
        &mut self,
        escrow_id: Option<EscrowId>,
        action: AuditAction,
        actor: impl Into<String>,
        details: Value,
    ) {
        let event = AuditEvent::new(escrow_id, action, actor, details);
        info!(
            action = %event.action,
            escrow = event.escrow_id.map(|id| id.to_string()),
            actor = %event.actor,
            "audit"
        );
        self.events.push(event);
    }

    /// All events for one escrow, newest first.
    #[must_use]
    pub fn for_escrow(&self, escrow_id: EscrowId) -> Vec<&AuditEvent> {
        self.events
            .iter()
            .rev()
            .filter(|e| e.escrow_id == Some(escrow_id))
            .collect()
    }

    /// The most recent `n` events across all escrows, newest first.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<&AuditEvent> {
        self.events.iter().rev().take(n).collect()
    }

    /// Count events of one action type for an escrow.
    #[must_use]
    pub fn count_for(&self, escrow_id: EscrowId, action: AuditAction) -> usize {
        self.events
            .iter()
            .filter(|e| e.escrow_id == Some(escrow_id) && e.action == action)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
