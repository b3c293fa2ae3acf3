//! End-to-end publish cycle tests: selector, dispatcher and scheduler
//! wired together over the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use sage::generator::{GeneratorConfig, QuoteGenerator};
use sage::models::{NewQuote, QuoteItem};
use sage::prelude::*;
use sage::publish::channels::ChannelResult;
use sage::publish::LogNotifier;
use sage::scheduler::ScheduleConfig;
use sage::storage::create_mock_store;
use sage::utils::ReportingClock;

struct CountingChannel {
    name: &'static str,
    calls: AtomicUsize,
}

impl CountingChannel {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Publisher for CountingChannel {
    fn name(&self) -> &str {
        self.name
    }
    async fn publish(&self, _item: &QuoteItem) -> ChannelResult<DeliveryStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DeliveryStatus::success(self.name))
    }
}

struct BrokenChannel;

#[async_trait]
impl Publisher for BrokenChannel {
    fn name(&self) -> &str {
        "instagram"
    }
    async fn publish(&self, _item: &QuoteItem) -> ChannelResult<DeliveryStatus> {
        Err(ChannelError::Unavailable("login challenge".to_string()))
    }
}

fn disabled_generator() -> Arc<QuoteGenerator> {
    Arc::new(QuoteGenerator::new(GeneratorConfig::default()).unwrap())
}

fn scheduler_with(
    store: SharedQuoteRepository,
    channels: Vec<Arc<dyn Publisher>>,
) -> PublishScheduler {
    PublishScheduler::new(
        RotationSelector::new(store, disabled_generator()),
        Dispatcher::new(channels),
        Arc::new(LogNotifier),
        ReportingClock::utc(),
        ScheduleConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn full_cycle_delivers_to_all_channels() {
    let store = create_mock_store(ReportingClock::utc());
    store
        .insert(&NewQuote::curated("Publish me everywhere.", None))
        .unwrap();

    let telegram = CountingChannel::new("telegram");
    let tiktok = CountingChannel::new("tiktok");
    let scheduler = scheduler_with(
        Arc::clone(&store),
        vec![Arc::clone(&telegram) as _, Arc::clone(&tiktok) as _],
    );

    let report = scheduler.trigger_now().await.unwrap();

    assert_eq!(report.tier, SelectionTier::Fresh);
    assert_eq!(report.deliveries.succeeded(), 2);
    assert_eq!(telegram.calls.load(Ordering::SeqCst), 1);
    assert_eq!(tiktok.calls.load(Ordering::SeqCst), 1);

    // The pick was consumed
    let stats = store.stats().unwrap();
    assert_eq!(stats.consumed_today, 1);
}

#[tokio::test]
async fn one_broken_channel_does_not_sink_the_cycle() {
    let store = create_mock_store(ReportingClock::utc());
    store
        .insert(&NewQuote::curated("Partial delivery.", None))
        .unwrap();

    let telegram = CountingChannel::new("telegram");
    let scheduler = scheduler_with(
        store,
        vec![Arc::clone(&telegram) as _, Arc::new(BrokenChannel) as _],
    );

    let report = scheduler.trigger_now().await.unwrap();

    assert_eq!(report.deliveries.succeeded(), 1);
    assert_eq!(report.deliveries.failed(), 1);
    assert!(!report.deliveries.all_failed());
    assert!(report.deliveries.deliveries["instagram"]
        .message
        .as_deref()
        .unwrap()
        .contains("login challenge"));
    assert!(report.summary().contains("1 ok, 1 failed"));
}

#[tokio::test]
async fn empty_pool_with_disabled_generator_is_reported_not_paniced() {
    let store = create_mock_store(ReportingClock::utc());
    let scheduler = scheduler_with(store, vec![CountingChannel::new("telegram") as _]);

    let err = scheduler.trigger_now().await.unwrap_err();
    assert!(matches!(err, Error::NoContentAvailable));
    assert_eq!(err.category(), ErrorCategory::Scheduler);
}

#[tokio::test]
async fn exhausted_pool_degrades_to_stale_tier() {
    let store = create_mock_store(ReportingClock::utc());
    store
        .insert(&NewQuote::curated("The only one.", None))
        .unwrap();

    let telegram = CountingChannel::new("telegram");
    let scheduler = scheduler_with(Arc::clone(&store), vec![Arc::clone(&telegram) as _]);

    let first = scheduler.trigger_now().await.unwrap();
    assert_eq!(first.tier, SelectionTier::Fresh);

    let second = scheduler.trigger_now().await.unwrap();
    assert_eq!(second.tier, SelectionTier::Stale);
    assert_eq!(second.quote_id, first.quote_id);
    assert_eq!(telegram.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn interaction_replay_is_idempotent() {
    let store = create_mock_store(ReportingClock::utc());

    // First run performs the side effect and records it
    assert!(!store
        .interaction_seen("instagram", sage::models::InteractionKind::Follow, "fan_7")
        .unwrap());
    store
        .record_interaction("instagram", sage::models::InteractionKind::Follow, "fan_7")
        .unwrap();

    // A replay of the same event (e.g. after a restart) sees the record and
    // must skip the action; recording again stays a no-op
    assert!(store
        .interaction_seen("instagram", sage::models::InteractionKind::Follow, "fan_7")
        .unwrap());
    store
        .record_interaction("instagram", sage::models::InteractionKind::Follow, "fan_7")
        .unwrap();
    assert!(store
        .interaction_seen("instagram", sage::models::InteractionKind::Follow, "fan_7")
        .unwrap());
}
