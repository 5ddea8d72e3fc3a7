//! System-wide limits and defaults.

/// Basis-point scale: 10000 bps = 100% of the purchase price.
pub const BASIS_POINTS_SCALE: u16 = 10_000;

/// Monetary precision: all amounts settle at cent precision.
pub const CENT_PRECISION: u32 = 2;

/// Webhook freshness window in seconds. Payloads older than this are
/// rejected to bound replay risk.
pub const WEBHOOK_FRESHNESS_SECS: i64 = 600;

/// Tolerated clock skew in seconds for webhook timestamps. Payloads
/// dated further in the future than this are rejected as invalid.
pub const WEBHOOK_CLOCK_SKEW_SECS: i64 = 30;

/// Default capacity of the provider-event dedupe cache.
pub const DEFAULT_EVENT_CACHE_SIZE: usize = 10_000;

/// Maximum number of line items accepted in one wire batch upload.
pub const DEFAULT_MAX_BATCH_LINES: usize = 5_000;

/// Minimum number of approvals an escrow may require.
pub const MIN_REQUIRED_APPROVALS: u32 = 1;

/// Default chain the segregated custody wallet is created on.
pub const DEFAULT_CUSTODY_CHAIN: &str = "base";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sane_defaults() {
        assert_eq!(BASIS_POINTS_SCALE, 10_000);
        assert_eq!(WEBHOOK_FRESHNESS_SECS, 600);
        assert!(MIN_REQUIRED_APPROVALS >= 1);
        assert!(DEFAULT_MAX_BATCH_LINES > 0);
    }
}
