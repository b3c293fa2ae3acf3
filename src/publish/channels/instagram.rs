//! Instagram channel adapter
//!
//! Sessions are expensive to establish and rate-limited, so the adapter
//! bootstraps lazily: the first publish loads a cached session file or logs
//! in with credentials, and the session is reused for the process lifetime.
//! Follow-back and comment-reply helpers go through the interaction log, so
//! a restarted process never repeats a side effect it already performed.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{ChannelError, ChannelResult, DeliveryStatus, Publisher};
use crate::models::{InteractionKind, QuoteItem};
use crate::storage::SharedQuoteRepository;
use crate::utils::{format_ts, ReportingClock};

const DEFAULT_SESSION_FILE: &str = "instagram_session.json";

/// Configuration for the Instagram channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    /// Account username
    pub username: String,

    /// Account password
    pub password: String,

    /// Where the cached session is stored between runs
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// API base URL, overridable for tests
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-call deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_session_file() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}

fn default_api_base() -> String {
    "https://i.instagram.com/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl InstagramConfig {
    /// Create config from environment variables
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("INSTAGRAM_USERNAME")
            .ok()
            .filter(|v| !v.is_empty())?;
        let password = std::env::var("INSTAGRAM_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self {
            username,
            password,
            session_file: std::env::var("INSTAGRAM_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_session_file()),
            api_base: std::env::var("INSTAGRAM_API_URL").unwrap_or_else(|_| default_api_base()),
            timeout_secs: default_timeout_secs(),
        })
    }
}

/// Cached login session
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Session {
    username: String,
    session_id: String,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    media_id: String,
}

/// Instagram publishing channel
pub struct InstagramChannel {
    client: Client,
    config: InstagramConfig,
    session: Mutex<Option<Session>>,
    store: SharedQuoteRepository,
    clock: ReportingClock,
}

impl InstagramChannel {
    /// Create a channel; the session is bootstrapped on first use
    pub fn new(
        config: InstagramConfig,
        store: SharedQuoteRepository,
        clock: ReportingClock,
    ) -> ChannelResult<Self> {
        if config.username.is_empty() || config.password.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "username and password are required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            session: Mutex::new(None),
            store,
            clock,
        })
    }

    /// Get a live session, loading the cached file or logging in
    async fn session_id(&self) -> ChannelResult<String> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.session_id.clone());
        }

        // Cached session first, credential login as fallback
        let session = match self.load_session_file() {
            Some(session) if session.username == self.config.username => {
                tracing::info!(username = %self.config.username, "loaded cached Instagram session");
                session
            }
            _ => self.login().await?,
        };

        let id = session.session_id.clone();
        *guard = Some(session);
        Ok(id)
    }

    fn load_session_file(&self) -> Option<Session> {
        let raw = std::fs::read_to_string(&self.config.session_file).ok()?;
        serde_json::from_str(&raw).ok()
    }

    async fn login(&self) -> ChannelResult<Session> {
        tracing::info!(username = %self.config.username, "logging in to Instagram");
        let url = format!("{}/accounts/login", self.config.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChannelError::Auth(format!(
                "login rejected with status {}",
                response.status()
            )));
        }

        let login: LoginResponse = response.json().await?;
        let session = Session {
            username: self.config.username.clone(),
            session_id: login.session_id,
            created_at: format_ts(self.clock.now()),
        };

        // Best-effort cache; a failed write only costs a re-login next run
        if let Ok(raw) = serde_json::to_string(&session) {
            if let Err(e) = std::fs::write(&self.config.session_file, raw) {
                tracing::warn!(error = %e, "failed to cache Instagram session");
            }
        }
        Ok(session)
    }

    fn caption(item: &QuoteItem) -> String {
        let mut caption = item.text.clone();
        if let Some(author) = &item.attribution {
            caption.push_str(&format!("\n\n— {author}"));
        }
        caption.push_str("\n\n");
        caption.push_str(&item.hashtags());
        caption
    }

    /// Follow a user back exactly once, keyed by the interaction log
    pub async fn follow_back(&self, user_id: &str) -> ChannelResult<bool> {
        if self
            .store
            .interaction_seen(self.name(), InteractionKind::Follow, user_id)
            .map_err(|e| ChannelError::Other(e.to_string()))?
        {
            tracing::debug!(user_id, "follow already performed, skipping");
            return Ok(false);
        }

        let session_id = self.session_id().await?;
        let url = format!(
            "{}/friendships/create/{}",
            self.config.api_base.trim_end_matches('/'),
            user_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session_id)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChannelError::Unavailable(format!(
                "follow rejected with status {}",
                response.status()
            )));
        }

        self.store
            .record_interaction(self.name(), InteractionKind::Follow, user_id)
            .map_err(|e| ChannelError::Other(e.to_string()))?;
        tracing::info!(user_id, "followed user back");
        Ok(true)
    }

    /// Reply to a comment exactly once, keyed by the interaction log
    pub async fn reply_to_comment(&self, comment_id: &str, text: &str) -> ChannelResult<bool> {
        if self
            .store
            .interaction_seen(self.name(), InteractionKind::Reply, comment_id)
            .map_err(|e| ChannelError::Other(e.to_string()))?
        {
            tracing::debug!(comment_id, "reply already sent, skipping");
            return Ok(false);
        }

        let session_id = self.session_id().await?;
        let url = format!(
            "{}/comments/{}/reply",
            self.config.api_base.trim_end_matches('/'),
            comment_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session_id)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChannelError::Unavailable(format!(
                "reply rejected with status {}",
                response.status()
            )));
        }

        self.store
            .record_interaction(self.name(), InteractionKind::Reply, comment_id)
            .map_err(|e| ChannelError::Other(e.to_string()))?;
        tracing::info!(comment_id, "replied to comment");
        Ok(true)
    }
}

#[async_trait]
impl Publisher for InstagramChannel {
    fn name(&self) -> &str {
        "instagram"
    }

    fn timeout(&self) -> Duration {
        // Login plus upload can be slow on a cold session
        Duration::from_secs(self.config.timeout_secs + 30)
    }

    async fn ensure_ready(&self) -> ChannelResult<()> {
        self.session_id().await.map(|_| ())
    }

    async fn publish(&self, item: &QuoteItem) -> ChannelResult<DeliveryStatus> {
        let session_id = self.session_id().await?;

        let url = format!("{}/media/upload", self.config.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session_id)
            .json(&serde_json::json!({ "caption": Self::caption(item) }))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            // Session went stale; drop it so the next cycle re-authenticates
            *self.session.lock().await = None;
            return Err(ChannelError::Auth(format!(
                "upload rejected with status {status}"
            )));
        }
        if !status.is_success() {
            return Err(ChannelError::Unavailable(format!(
                "upload rejected with status {status}"
            )));
        }

        let upload: UploadResponse = response.json().await?;
        tracing::info!(quote_id = item.id, media_id = %upload.media_id, "posted quote to Instagram");
        Ok(DeliveryStatus::success_with_message(
            self.name(),
            format!("media_id={}", upload.media_id),
        ))
    }
}
