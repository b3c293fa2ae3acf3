//! Durable quote storage
//!
//! The store is the single owner of persistence: it is the only writer of
//! `usage_count` and `last_used_at`, and its consuming pick is one atomic
//! read-and-mark operation so two concurrent callers can never consume the
//! same item. Business logic depends on the [`QuoteRepository`] trait; the
//! SQLite implementation is the production backend and the mock backs tests.

pub mod repository;

pub use repository::{
    create_mock_store, create_sqlite_store, MockQuoteStore, QuoteRepository, SharedQuoteRepository,
    SqliteQuoteStore,
};
