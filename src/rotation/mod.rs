//! Three-tier content selection
//!
//! Tier 1: a fresh quote from the pool (least-used, not yet used today).
//! Tier 2: one AI generation attempt, persisted before use.
//! Tier 3: a stale re-run of the least-recently-used quote.
//!
//! Storage errors abort the cycle; generation errors only degrade to the
//! next tier. An empty pool with generation unavailable is the one terminal
//! outcome, surfaced as `Error::NoContentAvailable`.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generator::QuoteGenerator;
use crate::models::QuoteItem;
use crate::storage::SharedQuoteRepository;

/// Which tier produced the selected quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTier {
    /// Eligible quote from the pool
    Fresh,
    /// Newly generated and persisted this cycle
    Generated,
    /// Re-run of an already-consumed quote
    Stale,
}

impl SelectionTier {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Generated => "generated",
            Self::Stale => "stale",
        }
    }
}

impl std::fmt::Display for SelectionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A selected quote together with the tier that produced it
#[derive(Debug, Clone)]
pub struct Selection {
    pub quote: QuoteItem,
    pub tier: SelectionTier,
}

/// Walks the fallback tiers to produce the next quote to publish
pub struct RotationSelector {
    store: SharedQuoteRepository,
    generator: Arc<QuoteGenerator>,
}

impl RotationSelector {
    /// Create a selector over a store and a generation gateway
    pub fn new(store: SharedQuoteRepository, generator: Arc<QuoteGenerator>) -> Self {
        Self { store, generator }
    }

    /// Select the next quote. Makes at most one generation attempt.
    pub async fn next_quote(&self) -> Result<Selection> {
        // Tier 1: fresh
        if let Some(quote) = self.store.pick_random_eligible()? {
            tracing::debug!(quote_id = quote.id, "selected fresh quote");
            return Ok(Selection {
                quote,
                tier: SelectionTier::Fresh,
            });
        }

        // Tier 2: one generation attempt, persisted before use so the
        // published item always carries stored state
        match self.generator.generate(None, None).await {
            Ok(new_quote) => match self.store.insert(&new_quote) {
                Ok(id) => {
                    let quote = self
                        .store
                        .get(id)?
                        .ok_or(Error::NoContentAvailable)?;
                    tracing::info!(quote_id = id, "selected newly generated quote");
                    return Ok(Selection {
                        quote,
                        tier: SelectionTier::Generated,
                    });
                }
                // The model reproduced an existing quote; fall through to
                // the stale tier rather than publish the duplicate as new
                Err(Error::DuplicateContent { existing_id }) => {
                    tracing::warn!(existing_id, "generated quote duplicates the pool");
                }
                Err(e) => return Err(e),
            },
            Err(e) => {
                tracing::warn!(error = %e, recoverable = e.is_recoverable(), "generation unavailable");
            }
        }

        // Tier 3: stale
        if let Some(quote) = self.store.pick_any_stale()? {
            tracing::warn!(quote_id = quote.id, "falling back to stale quote");
            return Ok(Selection {
                quote,
                tier: SelectionTier::Stale,
            });
        }

        Err(Error::NoContentAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorConfig, QuoteGenerator};
    use crate::models::NewQuote;
    use crate::storage::create_mock_store;
    use crate::utils::ReportingClock;

    fn disabled_generator() -> Arc<QuoteGenerator> {
        Arc::new(QuoteGenerator::new(GeneratorConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_fresh_tier_preferred() {
        let store = create_mock_store(ReportingClock::utc());
        store
            .insert(&NewQuote::curated("Fresh pick.", None))
            .unwrap();

        let selector = RotationSelector::new(Arc::clone(&store), disabled_generator());
        let selection = selector.next_quote().await.unwrap();

        assert_eq!(selection.tier, SelectionTier::Fresh);
        assert_eq!(selection.quote.text, "Fresh pick.");
        assert_eq!(selection.quote.usage_count, 1);
    }

    #[tokio::test]
    async fn test_stale_tier_when_pool_exhausted_and_generation_disabled() {
        let store = create_mock_store(ReportingClock::utc());
        store
            .insert(&NewQuote::curated("Only one today.", None))
            .unwrap();

        let selector = RotationSelector::new(Arc::clone(&store), disabled_generator());

        let first = selector.next_quote().await.unwrap();
        assert_eq!(first.tier, SelectionTier::Fresh);

        // Pool exhausted for the day, generator disabled: same quote again
        let second = selector.next_quote().await.unwrap();
        assert_eq!(second.tier, SelectionTier::Stale);
        assert_eq!(second.quote.id, first.quote.id);
        assert_eq!(second.quote.usage_count, 2);
    }

    #[tokio::test]
    async fn test_empty_store_is_terminal() {
        let store = create_mock_store(ReportingClock::utc());
        let selector = RotationSelector::new(store, disabled_generator());

        let err = selector.next_quote().await.unwrap_err();
        assert!(matches!(err, Error::NoContentAvailable));
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(SelectionTier::Fresh.to_string(), "fresh");
        assert_eq!(SelectionTier::Generated.to_string(), "generated");
        assert_eq!(SelectionTier::Stale.to_string(), "stale");
    }
}
