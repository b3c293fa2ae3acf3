//! AI quote generation gateway
//!
//! Fallback content source for days the curated pool runs dry. Talks to a
//! DeepSeek-compatible chat-completions endpoint and normalizes whatever the
//! model returns (fenced JSON, raw JSON, or free text) into a [`NewQuote`].
//! Without an API key the gateway runs in disabled mode and performs no I/O.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{NewQuote, Origin};

/// Topics the generator cycles through when the caller leaves it unspecified
const TOPICS: &[&str] = &[
    "perseverance",
    "creativity",
    "courage",
    "discipline",
    "change",
    "curiosity",
    "patience",
    "failure and growth",
    "focus",
    "gratitude",
];

/// Voice styles for the prompt
const STYLES: &[&str] = &[
    "stoic philosopher",
    "modern entrepreneur",
    "zen teacher",
    "old sea captain",
    "pragmatic engineer",
];

/// Errors from the generation gateway
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Generation is disabled (no API key configured)")]
    Disabled,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned error status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Could not parse model output into a quote")]
    Unparseable,

    #[error("Model returned an empty quote")]
    EmptyResponse,
}

impl GenerateError {
    /// Whether a later attempt could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Disabled | Self::Unparseable => false,
            Self::Http(_) | Self::Status { .. } | Self::Timeout | Self::EmptyResponse => true,
        }
    }
}

/// Configuration for the generation gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// API key; `None` disables generation entirely
    pub api_key: Option<String>,

    /// Chat-completions endpoint base URL
    pub api_url: String,

    /// Model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 30,
            temperature: 1.1,
            max_tokens: 300,
        }
    }
}

impl GeneratorConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("DEEPSEEK_API_KEY").ok().filter(|k| !k.is_empty()),
            api_url: std::env::var("DEEPSEEK_API_URL").unwrap_or(defaults.api_url),
            model: std::env::var("DEEPSEEK_MODEL").unwrap_or(defaults.model),
            timeout_secs: std::env::var("DEEPSEEK_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            temperature: std::env::var("DEEPSEEK_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
            max_tokens: std::env::var("DEEPSEEK_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Model output in its structured form
#[derive(Debug, Deserialize)]
struct GeneratedPayload {
    #[serde(alias = "text")]
    quote: String,
    #[serde(default, alias = "attribution")]
    author: Option<String>,
    #[serde(default, alias = "tags")]
    hashtags: Vec<String>,
}

/// Gateway to a DeepSeek-compatible chat-completions API
pub struct QuoteGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl QuoteGenerator {
    /// Create a gateway; fails only if the HTTP client cannot be built
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Create a gateway from environment variables
    pub fn from_env() -> Result<Self, GenerateError> {
        Self::new(GeneratorConfig::from_env())
    }

    /// Whether an API key is configured
    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Model name this gateway is configured for
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Generate one quote. Unspecified topic/style are drawn from the
    /// built-in catalogs. One call makes at most one API request.
    pub async fn generate(
        &self,
        topic: Option<&str>,
        style: Option<&str>,
    ) -> Result<NewQuote, GenerateError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(GenerateError::Disabled);
        };

        let (topic, style) = {
            let mut rng = rand::thread_rng();
            (
                topic
                    .map(str::to_string)
                    .unwrap_or_else(|| TOPICS.choose(&mut rng).unwrap().to_string()),
                style
                    .map(str::to_string)
                    .unwrap_or_else(|| STYLES.choose(&mut rng).unwrap().to_string()),
            )
        };

        let prompt = build_prompt(&topic, &style);
        tracing::debug!(%topic, %style, model = %self.config.model, "requesting quote generation");

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You write short, original, quotable aphorisms. \
                              Never repeat famous quotes verbatim."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let mut quote = parse_model_output(content)?;
        quote.category = Some(topic);
        quote.generator_model = Some(self.config.model.clone());
        Ok(quote)
    }
}

/// Three prompt shapes keep the outputs from converging on one template
fn build_prompt(topic: &str, style: &str) -> String {
    let variant = rand::thread_rng().gen_range(0..3u8);
    match variant {
        0 => format!(
            "Write one short original quote about {topic}, in the voice of a {style}. \
             Respond as JSON: {{\"quote\": \"...\", \"author\": \"...\", \
             \"hashtags\": [\"...\"]}}. The author is a fictional persona, \
             not a real person. 2-3 hashtags, lowercase, no # prefix."
        ),
        1 => format!(
            "Invent a memorable aphorism on the theme of {topic}. Channel a {style}. \
             Keep it under 30 words. Return JSON with keys quote, author, hashtags \
             (a list of 2-3 plain lowercase words)."
        ),
        _ => format!(
            "You are a {style}. Distill one insight about {topic} into a single \
             quotable sentence. Output JSON only: \
             {{\"quote\": ..., \"author\": ..., \"hashtags\": [...]}}."
        ),
    }
}

/// Normalize model output into a [`NewQuote`]
///
/// Accepts fenced ```json blocks, raw JSON objects, or free text of the form
/// `"Some quote" — Author` with optional `#hashtag` trailers.
fn parse_model_output(content: &str) -> Result<NewQuote, GenerateError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(GenerateError::EmptyResponse);
    }

    let json_str = extract_json(content);
    tracing::debug!(extracted = %crate::utils::truncate_text(&json_str, 200), "model output");
    if let Ok(payload) = serde_json::from_str::<GeneratedPayload>(&json_str) {
        return payload_to_quote(payload);
    }

    parse_free_text(content)
}

fn payload_to_quote(payload: GeneratedPayload) -> Result<NewQuote, GenerateError> {
    let text = clean_quote_text(&payload.quote);
    if text.is_empty() {
        return Err(GenerateError::EmptyResponse);
    }
    Ok(NewQuote {
        text,
        attribution: payload
            .author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
        category: None,
        tags: payload
            .hashtags
            .into_iter()
            .map(|t| t.trim_start_matches('#').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
        origin: Origin::Generated,
        generator_model: None,
    })
}

/// Extract a JSON object from markdown code fences or raw text
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        let after_start = &text[start + 3..];
        let content_start = after_start.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = after_start[content_start..].find("```") {
            return after_start[content_start..content_start + end]
                .trim()
                .to_string();
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return text[start..=end].to_string();
            }
        }
    }

    text.trim().to_string()
}

/// Fallback for models that ignore the JSON instruction
fn parse_free_text(content: &str) -> Result<NewQuote, GenerateError> {
    // `"Quote text" — Author` (em dash, en dash, hyphen all seen in the wild)
    let quoted_re =
        regex::Regex::new(r#""([^"]+)"\s*(?:[—–-]+\s*(.+?))?\s*$"#).expect("valid regex");
    let tag_re = regex::Regex::new(r"#([A-Za-z0-9_]+)").expect("valid regex");

    let tags: Vec<String> = tag_re
        .captures_iter(content)
        .map(|c| c[1].to_lowercase())
        .collect();

    let body: String = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(caps) = quoted_re.captures(body.trim()) {
        let text = clean_quote_text(&caps[1]);
        if !text.is_empty() {
            return Ok(NewQuote {
                text,
                attribution: caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|a| !a.is_empty()),
                category: None,
                tags,
                origin: Origin::Generated,
                generator_model: None,
            });
        }
    }

    // Last resort: a single bare sentence with no markup
    let bare = clean_quote_text(body.trim());
    if !bare.is_empty() && bare.len() <= 500 && !bare.contains('{') {
        return Ok(NewQuote {
            text: bare,
            attribution: None,
            category: None,
            tags,
            origin: Origin::Generated,
            generator_model: None,
        });
    }

    Err(GenerateError::Unparseable)
}

fn clean_quote_text(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim()
        .to_string()
}
