//! Notification dispatch helpers.
//!
//! Notifications are strictly fire-and-forget: a sink failure is logged
//! and swallowed so it can never fail the core transition that triggered
//! it.

use clearhold_types::NotificationSink;
use tracing::warn;

/// Send a notification, logging and swallowing any failure.
pub fn notify_best_effort(sink: &dyn NotificationSink, topic: &str, message: &str) {
    if let Err(err) = sink.notify(topic, message) {
        warn!(topic, %err, "notification delivery failed; continuing");
    }
}

/// Sink that logs instead of delivering. Used in tests and sandboxes.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, topic: &str, message: &str) -> clearhold_types::Result<()> {
        tracing::info!(topic, message, "notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearhold_types::ClearholdError;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn notify(&self, _topic: &str, _message: &str) -> clearhold_types::Result<()> {
            Err(ClearholdError::ProviderCall {
                reason: "smtp down".into(),
            })
        }
    }

    #[test]
    fn failures_are_swallowed() {
        // Must not panic or propagate.
        notify_best_effort(&FailingSink, "deposit_link", "escrow ESC-1");
    }

    #[test]
    fn tracing_sink_succeeds() {
        assert!(TracingSink.notify("close_confirmation", "done").is_ok());
    }
}
