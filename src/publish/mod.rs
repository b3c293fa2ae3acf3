//! Multi-channel publish dispatcher
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │               Dispatcher                   │
//! │  - Concurrent fan-out                      │
//! │  - Per-channel deadline enforcement        │
//! │  - Failure isolation                       │
//! └────────────────────────────────────────────┘
//!                     │
//!         ┌───────────┼───────────┐
//!         ▼           ▼           ▼
//!   ┌──────────┐ ┌───────────┐ ┌─────────┐
//!   │ Telegram │ │ Instagram │ │ TikTok  │
//!   └──────────┘ └───────────┘ └─────────┘
//! ```
//!
//! One channel failing, hanging, or being misconfigured never blocks the
//! others: every adapter call is wrapped in its own timeout and its outcome
//! is reduced to a `DeliveryStatus` entry in the report. `dispatch` itself
//! is infallible.

pub mod channels;

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::QuoteItem;
use channels::{ChannelError, DeliveryStatus, Publisher};

pub use channels::ChannelResult;

/// Outcome of one dispatch across all configured channels
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Delivery status per channel name
    pub deliveries: BTreeMap<String, DeliveryStatus>,
}

impl DispatchReport {
    /// Number of successful deliveries
    pub fn succeeded(&self) -> usize {
        self.deliveries.values().filter(|d| d.success).count()
    }

    /// Number of failed deliveries
    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.succeeded()
    }

    /// Whether every channel failed (an empty dispatch counts as total
    /// failure so the scheduler reports it)
    pub fn all_failed(&self) -> bool {
        self.succeeded() == 0
    }

    /// One line per channel, for logs and operator messages
    pub fn summary(&self) -> String {
        if self.deliveries.is_empty() {
            return "no channels configured".to_string();
        }
        self.deliveries
            .values()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fans one quote out to every configured channel
pub struct Dispatcher {
    channels: Vec<Arc<dyn Publisher>>,
}

impl Dispatcher {
    /// Create a dispatcher over a set of channel adapters
    pub fn new(channels: Vec<Arc<dyn Publisher>>) -> Self {
        Self { channels }
    }

    /// Number of configured channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Publish one quote to all channels concurrently.
    ///
    /// Each adapter runs under its own deadline; a panic-free adapter that
    /// hangs is cut off and reported as a timeout failure.
    pub async fn dispatch(&self, item: &QuoteItem) -> DispatchReport {
        let attempts = self.channels.iter().map(|channel| {
            let channel = Arc::clone(channel);
            async move {
                let name = channel.name().to_string();
                let deadline = channel.timeout();
                let result = tokio::time::timeout(deadline, async {
                    channel.ensure_ready().await?;
                    channel.publish(item).await
                })
                .await;

                let status = match result {
                    Ok(Ok(status)) => status,
                    Ok(Err(e)) => {
                        tracing::error!(channel = %name, error = %e, "channel publish failed");
                        DeliveryStatus::failure(&name, e.to_string())
                    }
                    Err(_) => {
                        let e = ChannelError::Timeout(deadline);
                        tracing::error!(channel = %name, error = %e, "channel publish timed out");
                        DeliveryStatus::failure(&name, e.to_string())
                    }
                };
                (name, status)
            }
        });

        let deliveries = join_all(attempts).await.into_iter().collect();
        let report = DispatchReport { deliveries };
        tracing::info!(
            quote_id = item.id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "dispatch complete"
        );
        report
    }
}

/// Operator notification sink used by the scheduler
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an operator message; failures are logged, never propagated
    async fn notify(&self, text: &str);
}

#[async_trait::async_trait]
impl Notifier for channels::TelegramNotifier {
    async fn notify(&self, text: &str) {
        if let Err(e) = channels::TelegramNotifier::notify(self, text).await {
            tracing::warn!(error = %e, "failed to deliver operator notification");
        }
    }
}

/// Notifier that only logs, for setups without an admin chat
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) {
        tracing::info!(message = text, "operator notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewQuote, Origin};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;

    fn test_item() -> QuoteItem {
        let new = NewQuote::curated("Every channel for itself.", None);
        QuoteItem {
            id: 11,
            text: new.text,
            attribution: None,
            category: None,
            tags: Vec::new(),
            origin: Origin::Curated,
            generator_model: None,
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    struct OkChannel(&'static str);

    #[async_trait]
    impl Publisher for OkChannel {
        fn name(&self) -> &str {
            self.0
        }
        async fn publish(&self, _item: &QuoteItem) -> ChannelResult<DeliveryStatus> {
            Ok(DeliveryStatus::success(self.0))
        }
    }

    struct FailChannel;

    #[async_trait]
    impl Publisher for FailChannel {
        fn name(&self) -> &str {
            "broken"
        }
        async fn publish(&self, _item: &QuoteItem) -> ChannelResult<DeliveryStatus> {
            Err(ChannelError::Unavailable("api down".to_string()))
        }
    }

    struct HangChannel;

    #[async_trait]
    impl Publisher for HangChannel {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }
        async fn publish(&self, _item: &QuoteItem) -> ChannelResult<DeliveryStatus> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("deadline fires first")
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_block_others() {
        let dispatcher = Dispatcher::new(vec![
            Arc::new(OkChannel("telegram")),
            Arc::new(FailChannel),
            Arc::new(OkChannel("tiktok")),
        ]);

        let report = dispatcher.dispatch(&test_item()).await;
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_failed());

        assert!(report.deliveries["telegram"].success);
        assert!(!report.deliveries["broken"].success);
        assert!(report.deliveries["broken"]
            .message
            .as_deref()
            .unwrap()
            .contains("api down"));
    }

    #[tokio::test]
    async fn test_hanging_channel_is_cut_off() {
        let dispatcher = Dispatcher::new(vec![
            Arc::new(HangChannel),
            Arc::new(OkChannel("telegram")),
        ]);

        let report = dispatcher.dispatch(&test_item()).await;
        assert!(report.deliveries["telegram"].success);
        assert!(!report.deliveries["sleepy"].success);
        assert!(report.deliveries["sleepy"]
            .message
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_dispatch_counts_as_total_failure() {
        let dispatcher = Dispatcher::new(Vec::new());
        let report = dispatcher.dispatch(&test_item()).await;
        assert!(report.all_failed());
        assert_eq!(report.summary(), "no channels configured");
    }

    #[test]
    fn test_summary_lines() {
        let mut report = DispatchReport::default();
        report
            .deliveries
            .insert("telegram".to_string(), DeliveryStatus::success("telegram"));
        report.deliveries.insert(
            "instagram".to_string(),
            DeliveryStatus::failure("instagram", "session expired"),
        );

        let summary = report.summary();
        assert!(summary.contains("[SUCCESS] telegram"));
        assert!(summary.contains("[FAILED] instagram: session expired"));
    }
}
