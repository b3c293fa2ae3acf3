//! Telegram channel adapter
//!
//! Posts the formatted quote of the day to a public channel via the Bot API,
//! and doubles as the operator notification path through
//! [`TelegramNotifier`], which messages the admin chat directly.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChannelError, ChannelResult, DeliveryStatus, Publisher};
use crate::models::QuoteItem;
use crate::utils::retry::{with_retry_if, RetryConfig};
use crate::utils::ReportingClock;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Configuration for the Telegram channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,

    /// Target channel id or @username
    pub chat_id: String,

    /// Admin chat for operator notifications
    #[serde(default)]
    pub admin_chat_id: Option<String>,

    /// Per-call deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bot API base URL, overridable for tests
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl TelegramConfig {
    /// Create config from environment variables
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("BOT_TOKEN").ok().filter(|v| !v.is_empty())?;
        let chat_id = std::env::var("CHANNEL_ID").ok().filter(|v| !v.is_empty())?;
        Some(Self {
            bot_token,
            chat_id,
            admin_chat_id: std::env::var("ADMIN_CHAT_ID").ok().filter(|v| !v.is_empty()),
            timeout_secs: default_timeout_secs(),
            api_base: std::env::var("TELEGRAM_API_URL").unwrap_or_else(|_| default_api_base()),
        })
    }

    /// Validate required fields
    pub fn validate(&self) -> ChannelResult<()> {
        if self.bot_token.is_empty() {
            return Err(ChannelError::InvalidConfig("bot_token is empty".to_string()));
        }
        if self.chat_id.is_empty() {
            return Err(ChannelError::InvalidConfig("chat_id is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Telegram publishing channel
pub struct TelegramChannel {
    client: Client,
    config: TelegramConfig,
    clock: ReportingClock,
    retry: RetryConfig,
}

impl TelegramChannel {
    /// Create a channel; fails on invalid config or HTTP client build errors
    pub fn new(config: TelegramConfig, clock: ReportingClock) -> ChannelResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            clock,
            retry: RetryConfig::with_delays(2, 500, 5_000),
        })
    }

    /// Render the channel post: quote body, attribution, hashtags,
    /// and a time/date footer in the reporting zone
    pub fn format_post(&self, item: &QuoteItem) -> String {
        let mut post = String::from("💬 <b>Quote of the day</b>\n\n");
        post.push_str(&format!("«{}»\n", escape_html(&item.text)));

        if let Some(author) = &item.attribution {
            post.push_str(&format!("\n— <i>{}</i>\n", escape_html(author)));
        }

        post.push('\n');
        post.push_str(&item.hashtags());
        post.push('\n');

        let local = self.clock.local_now();
        post.push_str(&format!(
            "\n🕰 {} | 📅 {}",
            local.format("%H:%M"),
            local.format("%d.%m.%Y")
        ));
        post
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> ChannelResult<i64> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        );
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if status.is_server_error() {
            return Err(ChannelError::Unavailable(format!(
                "Bot API returned {status}"
            )));
        }

        let api: ApiResponse = response.json().await?;
        if !api.ok {
            // 4xx with ok=false is a caller problem (bad token, bad chat id)
            return Err(ChannelError::Auth(
                api.description
                    .unwrap_or_else(|| format!("Bot API returned {status}")),
            ));
        }

        Ok(api.result.map(|m| m.message_id).unwrap_or_default())
    }
}

#[async_trait]
impl Publisher for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs + 15)
    }

    async fn publish(&self, item: &QuoteItem) -> ChannelResult<DeliveryStatus> {
        let text = self.format_post(item);

        // Retry 5xx and transport errors only; auth/config failures are final
        let message_id = with_retry_if(
            &self.retry,
            || self.send_message(&self.config.chat_id, &text),
            ChannelError::is_recoverable,
        )
        .await?;

        tracing::info!(quote_id = item.id, message_id, "posted quote to Telegram");
        Ok(DeliveryStatus::success_with_message(
            self.name(),
            format!("message_id={message_id}"),
        ))
    }
}

/// Operator notification path: plain messages to the admin chat
pub struct TelegramNotifier {
    channel: TelegramChannel,
}

impl TelegramNotifier {
    /// Create a notifier; requires `admin_chat_id` to be set
    pub fn new(config: TelegramConfig, clock: ReportingClock) -> ChannelResult<Self> {
        if config.admin_chat_id.is_none() {
            return Err(ChannelError::InvalidConfig(
                "admin_chat_id is required for notifications".to_string(),
            ));
        }
        Ok(Self {
            channel: TelegramChannel::new(config, clock)?,
        })
    }

    /// Send a plain operator message to the admin chat
    pub async fn notify(&self, text: &str) -> ChannelResult<()> {
        let admin = self
            .channel
            .config
            .admin_chat_id
            .as_deref()
            .expect("checked in constructor");
        self.channel
            .send_message(admin, &escape_html(text))
            .await?;
        Ok(())
    }
}

/// Minimal escaping for Telegram's HTML parse mode
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
