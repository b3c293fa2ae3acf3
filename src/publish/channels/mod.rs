//! Publishing channel adapters
//!
//! Each social platform gets one adapter behind the [`Publisher`] trait. The
//! dispatcher only sees the trait, so a misbehaving platform is contained to
//! its own adapter and its own `DeliveryStatus` entry.

pub mod instagram;
pub mod telegram;
pub mod tiktok;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::models::QuoteItem;

pub use instagram::{InstagramChannel, InstagramConfig};
pub use telegram::{TelegramChannel, TelegramConfig, TelegramNotifier};
pub use tiktok::{TikTokChannel, TikTokConfig};

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid channel configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Authentication or session failure
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Channel temporarily unavailable
    #[error("Channel temporarily unavailable: {0}")]
    Unavailable(String),

    /// Adapter exceeded its publish deadline
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("Channel error: {0}")]
    Other(String),
}

impl ChannelError {
    /// Whether retrying the same call could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::InvalidConfig(_) | Self::Auth(_) | Self::Serialization(_) | Self::Other(_) => {
                false
            }
        }
    }
}

/// Outcome of one delivery attempt on one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the post was successfully delivered
    pub success: bool,
    /// Channel that delivered (or failed to deliver) the post
    pub channel: String,
    /// Optional message about the delivery
    pub message: Option<String>,
    /// Timestamp of the delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Create a successful delivery status
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a successful delivery status with a message
    pub fn success_with_message(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a failed delivery status
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.channel)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Trait for publishing channels
///
/// Implement this trait to add a platform adapter.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Stable channel name used as the key in dispatch reports
    fn name(&self) -> &str;

    /// Per-call deadline enforced by the dispatcher
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Session bootstrap hook, called before the first publish.
    /// The default is a no-op for stateless channels.
    async fn ensure_ready(&self) -> ChannelResult<()> {
        Ok(())
    }

    /// Publish a quote through this channel
    async fn publish(&self, item: &QuoteItem) -> ChannelResult<DeliveryStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_success() {
        let status = DeliveryStatus::success("telegram");
        assert!(status.success);
        assert_eq!(status.channel, "telegram");
        assert!(status.message.is_none());
    }

    #[test]
    fn test_delivery_status_failure() {
        let status = DeliveryStatus::failure("instagram", "session expired");
        assert!(!status.success);
        assert_eq!(status.message, Some("session expired".to_string()));
    }

    #[test]
    fn test_delivery_status_display() {
        let success = DeliveryStatus::success_with_message("telegram", "message_id=42");
        assert!(success.to_string().contains("SUCCESS"));
        assert!(success.to_string().contains("telegram"));

        let failure = DeliveryStatus::failure("tiktok", "not configured");
        assert!(failure.to_string().contains("FAILED"));
        assert!(failure.to_string().contains("not configured"));
    }

    #[test]
    fn test_recoverability() {
        assert!(ChannelError::Unavailable("503".to_string()).is_recoverable());
        assert!(ChannelError::Timeout(Duration::from_secs(30)).is_recoverable());
        assert!(!ChannelError::Auth("bad token".to_string()).is_recoverable());
        assert!(!ChannelError::InvalidConfig("missing chat id".to_string()).is_recoverable());
    }
}
