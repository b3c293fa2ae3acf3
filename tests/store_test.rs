//! Integration tests for the SQLite quote store

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use sage::models::{InteractionKind, NewQuote, Origin};
use sage::prelude::*;
use sage::storage::SqliteQuoteStore;
use sage::utils::ReportingClock;

fn open_store(dir: &TempDir) -> SqliteQuoteStore {
    SqliteQuoteStore::new(dir.path().join("quotes.db"), ReportingClock::utc()).unwrap()
}

fn seed(store: &dyn QuoteRepository, texts: &[&str]) -> Vec<i64> {
    texts
        .iter()
        .map(|t| store.insert(&NewQuote::curated(*t, None)).unwrap())
        .collect()
}

#[test]
fn no_repeat_within_a_day() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let ids = seed(&store, &["alpha", "beta", "gamma"]);

    let mut picked = Vec::new();
    while let Some(quote) = store.pick_random_eligible().unwrap() {
        picked.push(quote.id);
    }

    // Every quote exactly once, then the pool is dry for the day
    picked.sort_unstable();
    let mut expected = ids.clone();
    expected.sort_unstable();
    assert_eq!(picked, expected);
    assert!(store.pick_random_eligible().unwrap().is_none());
}

#[test]
fn usage_counts_stay_balanced_over_many_days() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let ids = seed(&store, &["one", "two", "three", "four"]);

    // Simulate 5 full days of publishing by back-dating after each day
    for day in 0..5 {
        for _ in 0..ids.len() {
            store.pick_random_eligible().unwrap().unwrap();
        }
        let backdated = Utc::now() - Duration::days(5 - day);
        for &id in &ids {
            store.set_last_used(id, Some(backdated)).unwrap();
        }
    }

    for &id in &ids {
        let quote = store.get(id).unwrap().unwrap();
        assert_eq!(quote.usage_count, 5, "uneven usage for quote {id}");
    }
}

#[test]
fn concurrent_picks_consume_single_quote_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));
    let id = store.insert(&NewQuote::curated("contended", None)).unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.pick_random_eligible().unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(store.get(id).unwrap().unwrap().usage_count, 1);
}

#[test]
fn stale_pick_serves_exhausted_pool() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed(&store, &["lonely"]);

    store.pick_random_eligible().unwrap().unwrap();
    assert!(store.pick_random_eligible().unwrap().is_none());

    // Stale tier repeats within the day rather than going silent
    let stale = store.pick_any_stale().unwrap().unwrap();
    assert_eq!(stale.text, "lonely");
    assert_eq!(stale.usage_count, 2);
}

#[test]
fn duplicate_content_is_rejected_across_restarts() {
    let dir = TempDir::new().unwrap();
    let id;
    {
        let store = open_store(&dir);
        id = store
            .insert(&NewQuote::curated("Persistence pays.", None))
            .unwrap();
    }

    // Same file reopened: the hash constraint is in the schema, not memory
    let store = open_store(&dir);
    let err = store
        .insert(&NewQuote::curated("persistence   PAYS.", None))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateContent { existing_id } if existing_id == id));
}

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        let mut quote = NewQuote::curated("durable", Some("Author".to_string()));
        quote.origin = Origin::Generated;
        quote.generator_model = Some("deepseek-chat".to_string());
        quote.tags = vec!["memory".to_string()];
        store.insert(&quote).unwrap();
        store.pick_random_eligible().unwrap().unwrap();
    }

    let store = open_store(&dir);
    let quote = store.get(1).unwrap().unwrap();
    assert_eq!(quote.text, "durable");
    assert_eq!(quote.origin, Origin::Generated);
    assert_eq!(quote.generator_model.as_deref(), Some("deepseek-chat"));
    assert_eq!(quote.tags, vec!["memory".to_string()]);
    assert_eq!(quote.usage_count, 1);
    assert!(quote.last_used_at.is_some());
}

#[test]
fn interaction_log_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        store
            .record_interaction("instagram", InteractionKind::Follow, "fan_1")
            .unwrap();
    }

    let store = open_store(&dir);
    assert!(store
        .interaction_seen("instagram", InteractionKind::Follow, "fan_1")
        .unwrap());
    assert!(!store
        .interaction_seen("instagram", InteractionKind::Reply, "fan_1")
        .unwrap());
}

#[test]
fn imported_emergency_entries_rotate_like_any_other() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let id = store
        .insert(&NewQuote::fallback("The road is made by walking.", Some("Proverb".to_string())))
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.fallback, 1);
    assert_eq!(stats.curated, 0);

    let picked = store.pick_random_eligible().unwrap().unwrap();
    assert_eq!(picked.id, id);
    assert_eq!(picked.origin, Origin::Fallback);
}

#[test]
fn reporting_offset_defines_the_day_boundary() {
    // 22:00 UTC is already "tomorrow" at UTC+03:00. A quote used before the
    // local midnight instant must be eligible again right after it.
    let clock = ReportingClock::from_offset_minutes(180).unwrap();
    let dir = TempDir::new().unwrap();
    let store = SqliteQuoteStore::new(dir.path().join("quotes.db"), clock).unwrap();

    let id = store.insert(&NewQuote::curated("boundary", None)).unwrap();

    // Used just before the current local day started
    let before_day_start = clock.day_start_utc() - Duration::minutes(1);
    store.set_last_used(id, Some(before_day_start)).unwrap();
    assert!(store.pick_random_eligible().unwrap().is_some());

    // Used just after: consumed for today
    let after_day_start = clock.day_start_utc() + Duration::minutes(1);
    store.set_last_used(id, Some(after_day_start)).unwrap();
    assert!(store.pick_random_eligible().unwrap().is_none());
}
