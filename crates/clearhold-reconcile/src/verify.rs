//! Webhook signature and freshness verification.
//!
//! The provider signs `"{timestamp}.{raw_body}"`: the SHA-256 digest of
//! that string is the Ed25519 message. Payloads older than the
//! freshness window, or dated in the future beyond a small clock-skew
//! allowance, are rejected regardless of signature validity, which
//! bounds the replay window to the dedupe cache's horizon.

use chrono::{DateTime, Utc};
use clearhold_types::{
    ClearholdError, OrchestratorConfig, Result, constants::WEBHOOK_CLOCK_SKEW_SECS,
};
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Verifies inbound provider webhooks at the boundary.
///
/// Built with a verifying key for production, or in unsigned mode for
/// sandbox/test environments where the provider does not sign.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    key: Option<VerifyingKey>,
    freshness_secs: i64,
    allow_unsigned: bool,
}

impl WebhookVerifier {
    /// Production verifier: signature required on every payload.
    #[must_use]
    pub fn new(key: VerifyingKey, freshness_secs: i64) -> Self {
        Self {
            key: Some(key),
            freshness_secs,
            allow_unsigned: false,
        }
    }

    /// Sandbox verifier: unsigned payloads pass with a warning; signed
    /// payloads without a configured key are also tolerated.
    #[must_use]
    pub fn unsigned(freshness_secs: i64) -> Self {
        Self {
            key: None,
            freshness_secs,
            allow_unsigned: true,
        }
    }

    /// Build from config. A config that forbids unsigned webhooks must
    /// supply a verifying key.
    pub fn from_config(config: &OrchestratorConfig, key: Option<VerifyingKey>) -> Result<Self> {
        config.validate()?;
        if key.is_none() && !config.allow_unsigned_webhooks {
            return Err(ClearholdError::Configuration(
                "signed webhooks required but no verifying key configured".into(),
            ));
        }
        Ok(Self {
            key,
            freshness_secs: config.webhook_freshness_secs,
            allow_unsigned: config.allow_unsigned_webhooks,
        })
    }

    /// Check freshness and signature for one delivery. `signature_hex`
    /// is the provider's hex-encoded Ed25519 signature, absent in
    /// unsigned sandbox traffic.
    pub fn verify(
        &self,
        timestamp: DateTime<Utc>,
        raw_body: &str,
        signature_hex: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // A future-dated timestamp (beyond tolerated clock skew) is as
        // invalid as a stale one; otherwise a forged timestamp would
        // sidestep the freshness window entirely.
        let age_secs = (now - timestamp).num_seconds();
        if age_secs > self.freshness_secs || age_secs < -WEBHOOK_CLOCK_SKEW_SECS {
            return Err(ClearholdError::StaleWebhook { age_secs });
        }

        let Some(sig_hex) = signature_hex else {
            if self.allow_unsigned {
                warn!("accepting unsigned webhook (sandbox mode)");
                return Ok(());
            }
            return Err(ClearholdError::SignatureVerification {
                reason: "missing signature".into(),
            });
        };

        let Some(key) = &self.key else {
            if self.allow_unsigned {
                return Ok(());
            }
            // from_config rules this out, but a hand-built verifier may not.
            return Err(ClearholdError::SignatureVerification {
                reason: "no verifying key configured".into(),
            });
        };

        let sig_bytes = hex::decode(sig_hex).map_err(|e| {
            ClearholdError::SignatureVerification {
                reason: format!("signature is not valid hex: {e}"),
            }
        })?;
        let signature = Signature::from_slice(&sig_bytes).map_err(|e| {
            ClearholdError::SignatureVerification {
                reason: format!("malformed signature: {e}"),
            }
        })?;

        let digest = Self::signed_digest(timestamp, raw_body);
        key.verify_strict(&digest, &signature)
            .map_err(|_| ClearholdError::SignatureVerification {
                reason: "signature does not match payload".into(),
            })
    }

    /// SHA-256 over `"{unix_timestamp}.{raw_body}"`, the signed message.
    #[must_use]
    pub fn signed_digest(timestamp: DateTime<Utc>, raw_body: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(timestamp.timestamp().to_string().as_bytes());
        hasher.update(b".");
        hasher.update(raw_body.as_bytes());
        hasher.finalize().into()
    }
}
