//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::{ClearholdError, Result, constants};

/// Process-level configuration for the settlement orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Webhook freshness window in seconds; older payloads are rejected.
    pub webhook_freshness_secs: i64,
    /// Accept unsigned webhook payloads. Only legal outside production
    /// (sandbox/test modes); the verifier refuses to run unsigned in a
    /// production build of the config.
    pub allow_unsigned_webhooks: bool,
    /// Capacity of the provider-event dedupe cache.
    pub event_cache_size: usize,
    /// Maximum lines accepted per wire batch upload.
    pub max_batch_lines: usize,
    /// Chain the segregated custody wallets are created on.
    pub custody_chain: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            webhook_freshness_secs: constants::WEBHOOK_FRESHNESS_SECS,
            allow_unsigned_webhooks: false,
            event_cache_size: constants::DEFAULT_EVENT_CACHE_SIZE,
            max_batch_lines: constants::DEFAULT_MAX_BATCH_LINES,
            custody_chain: constants::DEFAULT_CUSTODY_CHAIN.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Validate field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.webhook_freshness_secs <= 0 {
            return Err(ClearholdError::Configuration(
                "webhook_freshness_secs must be positive".into(),
            ));
        }
        if self.event_cache_size == 0 {
            return Err(ClearholdError::Configuration(
                "event_cache_size must be > 0".into(),
            ));
        }
        if self.max_batch_lines == 0 {
            return Err(ClearholdError::Configuration(
                "max_batch_lines must be > 0".into(),
            ));
        }
        Ok(())
    }
}
