//! Core data structures for the sage publisher

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Provenance of a content item, set once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Hand-curated pool entry
    Curated,
    /// Produced by the generator gateway
    Generated,
    /// Imported emergency-pool entry, kept on hand for outages
    Fallback,
}

impl Origin {
    /// Get string representation (stored in the database)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Curated => "curated",
            Self::Generated => "generated",
            Self::Fallback => "fallback",
        }
    }

    /// Create from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "curated" | "manual" => Some(Self::Curated),
            "generated" | "ai" => Some(Self::Generated),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored quote with its usage bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteItem {
    /// Assigned on insert, immutable
    pub id: i64,
    pub text: String,
    pub attribution: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub origin: Origin,
    /// Set only when origin is Generated
    pub generator_model: Option<String>,
    /// Incremented exactly once per consuming selection
    pub usage_count: u32,
    /// Stamped on each consuming selection (UTC)
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QuoteItem {
    /// Whether this item may be consumed on `today`.
    ///
    /// Eligibility is a pure function of stored state plus the current
    /// calendar day in the reporting time zone: an item is eligible when it
    /// has never been used, or was last used on an earlier day.
    pub fn is_eligible_on<F>(&self, today: NaiveDate, day_of: F) -> bool
    where
        F: Fn(DateTime<Utc>) -> NaiveDate,
    {
        match self.last_used_at {
            None => true,
            Some(ts) => day_of(ts) < today,
        }
    }

    /// Hashtag line for channel captions, e.g. `#motivation #QuoteOfTheDay`
    pub fn hashtags(&self) -> String {
        let mut tags: Vec<String> = Vec::new();
        if let Some(cat) = &self.category {
            tags.push(format!("#{}", cat.replace(' ', "")));
        }
        for tag in &self.tags {
            tags.push(format!("#{}", tag.replace(' ', "")));
        }
        tags.push("#QuoteOfTheDay".to_string());
        tags.join(" ")
    }
}

/// A quote that has not been persisted yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuote {
    pub text: String,
    pub attribution: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub origin: Origin,
    pub generator_model: Option<String>,
}

impl NewQuote {
    /// Create a curated entry with just text and attribution
    pub fn curated(text: impl Into<String>, attribution: Option<String>) -> Self {
        Self {
            text: text.into(),
            attribution,
            category: None,
            tags: Vec::new(),
            origin: Origin::Curated,
            generator_model: None,
        }
    }

    /// Create an emergency-pool entry (e.g. imported from a seed file)
    pub fn fallback(text: impl Into<String>, attribution: Option<String>) -> Self {
        Self {
            origin: Origin::Fallback,
            ..Self::curated(text, attribution)
        }
    }

    /// Content hash used for duplicate rejection: SHA-256 over the
    /// whitespace-normalized, lowercased text.
    pub fn content_hash(&self) -> String {
        let normalized = self
            .text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{digest:x}")
    }
}

/// Pool statistics as reported to the operator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteStats {
    pub total: usize,
    /// Items still eligible for today's rotation
    pub eligible: usize,
    /// Consuming selections performed today
    pub consumed_today: usize,
    pub curated: usize,
    pub generated: usize,
    pub fallback: usize,
}

impl QuoteStats {
    /// Format as a short operator-facing report
    pub fn display(&self) -> String {
        format!(
            "pool: {} total ({} curated, {} generated, {} fallback)\n\
             today: {} consumed, {} still eligible",
            self.total,
            self.curated,
            self.generated,
            self.fallback,
            self.consumed_today,
            self.eligible,
        )
    }
}

/// Kind of social side effect a channel may perform after publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    /// Follow a user back
    Follow,
    /// Reply to a comment
    Reply,
}

impl InteractionKind {
    /// Get string representation (stored in the interaction log)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Reply => "reply",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
