//! sage - Daily Quote Publishing Bot
//!
//! A content rotation and multi-channel publishing system: a curated quote
//! pool with no-repeat-per-day rotation, AI generation fallback, and
//! scheduled fan-out to Telegram, Instagram, and TikTok.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`storage`] - Quote pool and interaction log (SQLite)
//! - [`generator`] - AI generation gateway (DeepSeek-compatible API)
//! - [`rotation`] - Three-tier quote selection
//! - [`publish`] - Channel adapters and the dispatch fan-out
//! - [`scheduler`] - Timer loop and manual triggers
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use sage::config::Config;
//! use sage::storage::create_sqlite_store;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = create_sqlite_store(&config.store.sqlite_path, config.clock()?)?;
//!     println!("{}", store.stats()?.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod models;
pub mod publish;
pub mod rotation;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::generator::{GenerateError, QuoteGenerator};
    pub use crate::models::{InteractionKind, NewQuote, Origin, QuoteItem, QuoteStats};
    pub use crate::publish::channels::{ChannelError, DeliveryStatus, Publisher};
    pub use crate::publish::{DispatchReport, Dispatcher};
    pub use crate::rotation::{RotationSelector, Selection, SelectionTier};
    pub use crate::scheduler::{CycleReport, PublishScheduler};
    pub use crate::storage::{QuoteRepository, SharedQuoteRepository};
}

// Direct re-exports for convenience
pub use models::{NewQuote, Origin, QuoteItem, QuoteStats};
