//! Repository abstraction over quote persistence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Rotation Selector / Scheduler        │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │             QuoteRepository trait           │
//! └─────────────────────────────────────────────┘
//!           │                        │
//!           ▼                        ▼
//! ┌──────────────────┐   ┌──────────────────┐
//! │ SqliteQuoteStore │   │  MockQuoteStore  │
//! └──────────────────┘   └──────────────────┘
//! ```
//!
//! The consuming pick (`pick_random_eligible`) selects among eligible items
//! least-used-first, random within the least-used tier, and increments the
//! usage bookkeeping inside the same critical section. Selection is driven by
//! a seedable ChaCha8 RNG so that, given identical store state and seed, the
//! pick order is reproducible in tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::error::{Error, Result};
use crate::models::{InteractionKind, NewQuote, Origin, QuoteItem, QuoteStats};
use crate::utils::{format_ts, parse_ts, ReportingClock};

// ============================================================================
// Repository Trait
// ============================================================================

/// Storage contract for quote rotation and the interaction log
pub trait QuoteRepository: Send + Sync {
    /// Consuming pick: among eligible items (not used on the current
    /// reporting-zone day), return one of the least-used at random and
    /// atomically mark it consumed. Returns `None` when no item is eligible.
    fn pick_random_eligible(&self) -> Result<Option<QuoteItem>>;

    /// Non-consuming random lookup within a category
    fn pick_by_category(&self, category: &str) -> Result<Option<QuoteItem>>;

    /// Degraded-tier consuming pick: least-recently-used item across the
    /// whole pool, ignoring the eligibility window. May repeat within a day.
    fn pick_any_stale(&self) -> Result<Option<QuoteItem>>;

    /// Persist a new quote with zero usage; rejects duplicate content
    fn insert(&self, quote: &NewQuote) -> Result<i64>;

    /// Fetch a quote by id
    fn get(&self, id: i64) -> Result<Option<QuoteItem>>;

    /// Keyword search over text and attribution
    fn search(&self, keyword: &str, limit: usize) -> Result<Vec<QuoteItem>>;

    /// Distinct categories present in the pool
    fn categories(&self) -> Result<Vec<String>>;

    /// Pool statistics for the operator surface
    fn stats(&self) -> Result<QuoteStats>;

    /// Maintenance: overwrite an item's last-used timestamp (None resets it,
    /// making the item immediately eligible again)
    fn set_last_used(&self, id: i64, when: Option<DateTime<Utc>>) -> Result<()>;

    /// Whether a side-effecting interaction was already performed for this key
    fn interaction_seen(
        &self,
        channel: &str,
        kind: InteractionKind,
        external_id: &str,
    ) -> Result<bool>;

    /// Record a performed interaction; replays of the same key are no-ops
    fn record_interaction(
        &self,
        channel: &str,
        kind: InteractionKind,
        external_id: &str,
    ) -> Result<()>;
}

/// Thread-safe shared repository handle
pub type SharedQuoteRepository = Arc<dyn QuoteRepository>;

/// Create a shared SQLite store
pub fn create_sqlite_store(
    path: impl AsRef<Path>,
    clock: ReportingClock,
) -> Result<SharedQuoteRepository> {
    let store = SqliteQuoteStore::new(path, clock)?;
    Ok(Arc::new(store))
}

/// Create a shared mock store
pub fn create_mock_store(clock: ReportingClock) -> SharedQuoteRepository {
    Arc::new(MockQuoteStore::new(clock))
}

// ============================================================================
// SQLite Implementation
// ============================================================================

struct StoreInner {
    conn: Connection,
    rng: ChaCha8Rng,
}

/// SQLite implementation of [`QuoteRepository`]
///
/// The connection and RNG sit behind one `Mutex`, so every operation
/// (including the read-and-mark of a consuming pick) is a single critical
/// section. Network-bound callers must never hold a pick across an await.
pub struct SqliteQuoteStore {
    inner: Mutex<StoreInner>,
    clock: ReportingClock,
}

impl SqliteQuoteStore {
    /// Open (or create) a store at the given path
    pub fn new(path: impl AsRef<Path>, clock: ReportingClock) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL for better concurrency between the scheduler and operator commands
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::from_parts(conn, clock, ChaCha8Rng::from_entropy())?;
        tracing::info!(path = %path.display(), "SQLite quote store initialized");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory(clock: ReportingClock) -> Result<Self> {
        Self::from_parts(
            Connection::open_in_memory()?,
            clock,
            ChaCha8Rng::from_entropy(),
        )
    }

    /// Create an in-memory store with a fixed selection seed, making pick
    /// order deterministic given identical store state
    pub fn in_memory_with_seed(clock: ReportingClock, seed: u64) -> Result<Self> {
        Self::from_parts(
            Connection::open_in_memory()?,
            clock,
            ChaCha8Rng::seed_from_u64(seed),
        )
    }

    fn from_parts(conn: Connection, clock: ReportingClock, rng: ChaCha8Rng) -> Result<Self> {
        let store = Self {
            inner: Mutex::new(StoreInner { conn, rng }),
            clock,
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Create the schema; migrations are additive-only
    fn create_schema(&self) -> Result<()> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS quotes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                attribution TEXT,
                category TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                origin TEXT NOT NULL DEFAULT 'curated',
                generator_model TEXT,
                usage_count INTEGER NOT NULL DEFAULT 0,
                last_used_at TEXT,
                created_at TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE
            );

            CREATE INDEX IF NOT EXISTS idx_quotes_last_used
                ON quotes(last_used_at);

            CREATE INDEX IF NOT EXISTS idx_quotes_category
                ON quotes(category);

            CREATE TABLE IF NOT EXISTS interaction_log (
                channel TEXT NOT NULL,
                action TEXT NOT NULL,
                external_id TEXT NOT NULL,
                performed_at TEXT NOT NULL,
                PRIMARY KEY (channel, action, external_id)
            );
            "#,
        )?;
        Ok(())
    }

    fn row_to_quote(row: &Row<'_>) -> rusqlite::Result<QuoteItem> {
        let tags_json: String = row.get("tags")?;
        let origin_str: String = row.get("origin")?;
        let last_used: Option<String> = row.get("last_used_at")?;
        let created: String = row.get("created_at")?;

        Ok(QuoteItem {
            id: row.get("id")?,
            text: row.get("text")?,
            attribution: row.get("attribution")?,
            category: row.get("category")?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            origin: Origin::parse(&origin_str).unwrap_or(Origin::Curated),
            generator_model: row.get("generator_model")?,
            usage_count: row.get::<_, i64>("usage_count")? as u32,
            last_used_at: last_used.as_deref().and_then(parse_ts),
            created_at: parse_ts(&created).unwrap_or_else(Utc::now),
        })
    }

    fn get_in_tx(tx: &Transaction<'_>, id: i64) -> Result<Option<QuoteItem>> {
        let quote = tx
            .query_row("SELECT * FROM quotes WHERE id = ?1", params![id], |row| {
                Self::row_to_quote(row)
            })
            .optional()?;
        Ok(quote)
    }
}

const SELECT_COLS: &str = "id, text, attribution, category, tags, origin, \
     generator_model, usage_count, last_used_at, created_at";

impl QuoteRepository for SqliteQuoteStore {
    fn pick_random_eligible(&self) -> Result<Option<QuoteItem>> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let StoreInner { conn, rng } = &mut *inner;

        let now = format_ts(self.clock.now());
        let day_start = format_ts(self.clock.day_start_utc());

        let tx = conn.transaction()?;

        // Least-used tier among eligible items
        let min_usage: Option<i64> = tx.query_row(
            "SELECT MIN(usage_count) FROM quotes
             WHERE last_used_at IS NULL OR last_used_at < ?1",
            params![day_start],
            |row| row.get(0),
        )?;
        let Some(min_usage) = min_usage else {
            return Ok(None);
        };

        let ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM quotes
                 WHERE (last_used_at IS NULL OR last_used_at < ?1)
                   AND usage_count = ?2
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![day_start, min_usage], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        if ids.is_empty() {
            return Ok(None);
        }

        let chosen = ids[rng.gen_range(0..ids.len())];
        tx.execute(
            "UPDATE quotes
             SET usage_count = usage_count + 1, last_used_at = ?1
             WHERE id = ?2",
            params![now, chosen],
        )?;

        let item = Self::get_in_tx(&tx, chosen)?;
        tx.commit()?;
        Ok(item)
    }

    fn pick_by_category(&self, category: &str) -> Result<Option<QuoteItem>> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let StoreInner { conn, rng } = &mut *inner;

        let ids: Vec<i64> = {
            let mut stmt =
                conn.prepare("SELECT id FROM quotes WHERE category = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![category], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        if ids.is_empty() {
            return Ok(None);
        }

        let chosen = ids[rng.gen_range(0..ids.len())];
        let quote = conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM quotes WHERE id = ?1"),
                params![chosen],
                Self::row_to_quote,
            )
            .optional()?;
        Ok(quote)
    }

    fn pick_any_stale(&self) -> Result<Option<QuoteItem>> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let StoreInner { conn, .. } = &mut *inner;

        let now = format_ts(self.clock.now());
        let tx = conn.transaction()?;

        // NULL sorts first in ASC order: never-used items win, then oldest
        let chosen: Option<i64> = tx
            .query_row(
                "SELECT id FROM quotes
                 ORDER BY last_used_at ASC, usage_count ASC, id ASC
                 LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(chosen) = chosen else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE quotes
             SET usage_count = usage_count + 1, last_used_at = ?1
             WHERE id = ?2",
            params![now, chosen],
        )?;

        let item = Self::get_in_tx(&tx, chosen)?;
        tx.commit()?;
        Ok(item)
    }

    fn insert(&self, quote: &NewQuote) -> Result<i64> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let hash = quote.content_hash();

        let existing: Option<i64> = inner
            .conn
            .query_row(
                "SELECT id FROM quotes WHERE content_hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing_id) = existing {
            return Err(Error::DuplicateContent { existing_id });
        }

        let tags_json = serde_json::to_string(&quote.tags)?;
        inner.conn.execute(
            "INSERT INTO quotes
                (text, attribution, category, tags, origin, generator_model,
                 usage_count, last_used_at, created_at, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7, ?8)",
            params![
                quote.text,
                quote.attribution,
                quote.category,
                tags_json,
                quote.origin.as_str(),
                quote.generator_model,
                format_ts(self.clock.now()),
                hash,
            ],
        )?;
        Ok(inner.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<QuoteItem>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let quote = inner
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM quotes WHERE id = ?1"),
                params![id],
                Self::row_to_quote,
            )
            .optional()?;
        Ok(quote)
    }

    fn search(&self, keyword: &str, limit: usize) -> Result<Vec<QuoteItem>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let pattern = format!("%{keyword}%");
        let mut stmt = inner.conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM quotes
             WHERE text LIKE ?1 OR attribution LIKE ?1
             ORDER BY id LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![pattern, limit as i64], Self::row_to_quote)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn categories(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut stmt = inner.conn.prepare(
            "SELECT DISTINCT category FROM quotes
             WHERE category IS NOT NULL ORDER BY category",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn stats(&self) -> Result<QuoteStats> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let day_start = format_ts(self.clock.day_start_utc());

        let total: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;
        let eligible: i64 = inner.conn.query_row(
            "SELECT COUNT(*) FROM quotes
             WHERE last_used_at IS NULL OR last_used_at < ?1",
            params![day_start],
            |row| row.get(0),
        )?;
        let consumed_today: i64 = inner.conn.query_row(
            "SELECT COUNT(*) FROM quotes WHERE last_used_at >= ?1",
            params![day_start],
            |row| row.get(0),
        )?;

        let count_origin = |origin: Origin| -> Result<i64> {
            Ok(inner.conn.query_row(
                "SELECT COUNT(*) FROM quotes WHERE origin = ?1",
                params![origin.as_str()],
                |row| row.get(0),
            )?)
        };

        Ok(QuoteStats {
            total: total as usize,
            eligible: eligible as usize,
            consumed_today: consumed_today as usize,
            curated: count_origin(Origin::Curated)? as usize,
            generated: count_origin(Origin::Generated)? as usize,
            fallback: count_origin(Origin::Fallback)? as usize,
        })
    }

    fn set_last_used(&self, id: i64, when: Option<DateTime<Utc>>) -> Result<()> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.conn.execute(
            "UPDATE quotes SET last_used_at = ?1 WHERE id = ?2",
            params![when.map(format_ts), id],
        )?;
        Ok(())
    }

    fn interaction_seen(
        &self,
        channel: &str,
        kind: InteractionKind,
        external_id: &str,
    ) -> Result<bool> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let exists: bool = inner.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM interaction_log
                 WHERE channel = ?1 AND action = ?2 AND external_id = ?3
             )",
            params![channel, kind.as_str(), external_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn record_interaction(
        &self,
        channel: &str,
        kind: InteractionKind,
        external_id: &str,
    ) -> Result<()> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.conn.execute(
            "INSERT OR IGNORE INTO interaction_log
                 (channel, action, external_id, performed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                channel,
                kind.as_str(),
                external_id,
                format_ts(self.clock.now())
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

/// In-memory mock implementation of [`QuoteRepository`]
pub struct MockQuoteStore {
    quotes: RwLock<Vec<QuoteItem>>,
    interactions: RwLock<HashSet<(String, String, String)>>,
    next_id: AtomicI64,
    rng: Mutex<ChaCha8Rng>,
    clock: ReportingClock,
}

impl MockQuoteStore {
    /// Create a new mock store
    pub fn new(clock: ReportingClock) -> Self {
        Self::with_seed(clock, 0)
    }

    /// Create a mock store with a fixed selection seed
    pub fn with_seed(clock: ReportingClock, seed: u64) -> Self {
        Self {
            quotes: RwLock::new(Vec::new()),
            interactions: RwLock::new(HashSet::new()),
            next_id: AtomicI64::new(1),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            clock,
        }
    }

    /// Number of stored quotes
    pub fn len(&self) -> usize {
        self.quotes.read().expect("mock lock poisoned").len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_eligible(&self, quote: &QuoteItem) -> bool {
        let today = self.clock.today();
        quote.is_eligible_on(today, |ts| self.clock.day_of(ts))
    }
}

impl QuoteRepository for MockQuoteStore {
    fn pick_random_eligible(&self) -> Result<Option<QuoteItem>> {
        let mut quotes = self.quotes.write().expect("mock lock poisoned");

        let min_usage = quotes
            .iter()
            .filter(|q| self.is_eligible(q))
            .map(|q| q.usage_count)
            .min();
        let Some(min_usage) = min_usage else {
            return Ok(None);
        };

        let candidates: Vec<usize> = quotes
            .iter()
            .enumerate()
            .filter(|(_, q)| self.is_eligible(q) && q.usage_count == min_usage)
            .map(|(i, _)| i)
            .collect();

        let idx = {
            let mut rng = self.rng.lock().expect("mock rng poisoned");
            candidates[rng.gen_range(0..candidates.len())]
        };

        let quote = &mut quotes[idx];
        quote.usage_count += 1;
        quote.last_used_at = Some(self.clock.now());
        Ok(Some(quote.clone()))
    }

    fn pick_by_category(&self, category: &str) -> Result<Option<QuoteItem>> {
        let quotes = self.quotes.read().expect("mock lock poisoned");
        let candidates: Vec<&QuoteItem> = quotes
            .iter()
            .filter(|q| q.category.as_deref() == Some(category))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        let mut rng = self.rng.lock().expect("mock rng poisoned");
        Ok(Some(candidates[rng.gen_range(0..candidates.len())].clone()))
    }

    fn pick_any_stale(&self) -> Result<Option<QuoteItem>> {
        let mut quotes = self.quotes.write().expect("mock lock poisoned");
        if quotes.is_empty() {
            return Ok(None);
        }

        let idx = quotes
            .iter()
            .enumerate()
            .min_by_key(|(_, q)| (q.last_used_at, q.usage_count, q.id))
            .map(|(i, _)| i)
            .expect("non-empty pool");

        let quote = &mut quotes[idx];
        quote.usage_count += 1;
        quote.last_used_at = Some(self.clock.now());
        Ok(Some(quote.clone()))
    }

    fn insert(&self, quote: &NewQuote) -> Result<i64> {
        let mut quotes = self.quotes.write().expect("mock lock poisoned");
        let hash = quote.content_hash();
        if let Some(existing) = quotes
            .iter()
            .find(|q| NewQuote::curated(q.text.clone(), None).content_hash() == hash)
        {
            return Err(Error::DuplicateContent {
                existing_id: existing.id,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        quotes.push(QuoteItem {
            id,
            text: quote.text.clone(),
            attribution: quote.attribution.clone(),
            category: quote.category.clone(),
            tags: quote.tags.clone(),
            origin: quote.origin,
            generator_model: quote.generator_model.clone(),
            usage_count: 0,
            last_used_at: None,
            created_at: self.clock.now(),
        });
        Ok(id)
    }

    fn get(&self, id: i64) -> Result<Option<QuoteItem>> {
        let quotes = self.quotes.read().expect("mock lock poisoned");
        Ok(quotes.iter().find(|q| q.id == id).cloned())
    }

    fn search(&self, keyword: &str, limit: usize) -> Result<Vec<QuoteItem>> {
        let needle = keyword.to_lowercase();
        let quotes = self.quotes.read().expect("mock lock poisoned");
        Ok(quotes
            .iter()
            .filter(|q| {
                q.text.to_lowercase().contains(&needle)
                    || q.attribution
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn categories(&self) -> Result<Vec<String>> {
        let quotes = self.quotes.read().expect("mock lock poisoned");
        let mut cats: Vec<String> = quotes
            .iter()
            .filter_map(|q| q.category.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        cats.sort();
        Ok(cats)
    }

    fn stats(&self) -> Result<QuoteStats> {
        let quotes = self.quotes.read().expect("mock lock poisoned");
        let day_start = self.clock.day_start_utc();
        let mut stats = QuoteStats {
            total: quotes.len(),
            ..Default::default()
        };
        for quote in quotes.iter() {
            if self.is_eligible(quote) {
                stats.eligible += 1;
            }
            if quote.last_used_at.is_some_and(|ts| ts >= day_start) {
                stats.consumed_today += 1;
            }
            match quote.origin {
                Origin::Curated => stats.curated += 1,
                Origin::Generated => stats.generated += 1,
                Origin::Fallback => stats.fallback += 1,
            }
        }
        Ok(stats)
    }

    fn set_last_used(&self, id: i64, when: Option<DateTime<Utc>>) -> Result<()> {
        let mut quotes = self.quotes.write().expect("mock lock poisoned");
        if let Some(quote) = quotes.iter_mut().find(|q| q.id == id) {
            quote.last_used_at = when;
        }
        Ok(())
    }

    fn interaction_seen(
        &self,
        channel: &str,
        kind: InteractionKind,
        external_id: &str,
    ) -> Result<bool> {
        let interactions = self.interactions.read().expect("mock lock poisoned");
        Ok(interactions.contains(&(
            channel.to_string(),
            kind.as_str().to_string(),
            external_id.to_string(),
        )))
    }

    fn record_interaction(
        &self,
        channel: &str,
        kind: InteractionKind,
        external_id: &str,
    ) -> Result<()> {
        let mut interactions = self.interactions.write().expect("mock lock poisoned");
        interactions.insert((
            channel.to_string(),
            kind.as_str().to_string(),
            external_id.to_string(),
        ));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
