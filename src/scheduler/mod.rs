//! Publish scheduling
//!
//! Timer-driven publishing at fixed local times (or a fixed interval), plus
//! a manual trigger sharing the same single-flight guard. A cycle is
//! selector then dispatcher; two cycles never run concurrently, so a pool
//! with one eligible quote is consumed exactly once no matter how the timer
//! and manual triggers interleave.
//!
//! The loop survives failed cycles indefinitely. Failures are logged and
//! forwarded to the operator notifier.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::publish::{DispatchReport, Dispatcher, Notifier};
use crate::rotation::{RotationSelector, SelectionTier};
use crate::utils::ReportingClock;

/// Configuration for the publish schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Daily publish times as `HH:MM` in the reporting zone
    #[serde(default)]
    pub post_times: Vec<String>,

    /// Fixed interval in minutes, used when `post_times` is empty
    #[serde(default)]
    pub interval_minutes: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        // Morning and evening slots, matching the original deployment
        Self {
            post_times: vec!["09:00".to_string(), "21:00".to_string()],
            interval_minutes: None,
        }
    }
}

impl ScheduleConfig {
    /// Validate the schedule; at least one trigger source must exist
    pub fn validate(&self) -> Result<()> {
        if self.post_times.is_empty() && self.interval_minutes.is_none() {
            return Err(Error::config(
                "schedule needs post_times or interval_minutes",
            ));
        }
        if let Some(0) = self.interval_minutes {
            return Err(Error::config("interval_minutes must be positive"));
        }
        for time in &self.post_times {
            parse_slot(time)?;
        }
        Ok(())
    }

    fn slots(&self) -> Result<Vec<NaiveTime>> {
        self.post_times.iter().map(|t| parse_slot(t)).collect()
    }
}

fn parse_slot(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| Error::config(format!("invalid post time '{raw}', expected HH:MM")))
}

/// Outcome of one publish cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub quote_id: i64,
    pub tier: SelectionTier,
    pub deliveries: DispatchReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    /// Render the operator message
    pub fn summary(&self) -> String {
        format!(
            "Published quote #{} ({} tier): {} ok, {} failed\n{}",
            self.quote_id,
            self.tier,
            self.deliveries.succeeded(),
            self.deliveries.failed(),
            self.deliveries.summary()
        )
    }
}

/// Drives publish cycles from a timer and from manual triggers
pub struct PublishScheduler {
    selector: RotationSelector,
    dispatcher: Dispatcher,
    notifier: Arc<dyn Notifier>,
    clock: ReportingClock,
    config: ScheduleConfig,
    // Single-flight guard shared by the timer loop and trigger_now
    cycle_guard: Mutex<()>,
}

impl PublishScheduler {
    /// Create a scheduler; the config must validate
    pub fn new(
        selector: RotationSelector,
        dispatcher: Dispatcher,
        notifier: Arc<dyn Notifier>,
        clock: ReportingClock,
        config: ScheduleConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            selector,
            dispatcher,
            notifier,
            clock,
            config,
            cycle_guard: Mutex::new(()),
        })
    }

    /// Run the timer loop forever. Failed cycles are reported and the loop
    /// moves on to the next slot.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            post_times = ?self.config.post_times,
            interval_minutes = ?self.config.interval_minutes,
            "scheduler started"
        );

        loop {
            let wait = self.time_until_next_slot()?;
            tracing::info!(wait_secs = wait.as_secs(), "sleeping until next publish slot");
            tokio::time::sleep(wait).await;

            match self.cycle_guard.try_lock() {
                Ok(_guard) => {
                    if let Err(e) = self.execute_cycle().await {
                        tracing::error!(error = %e, "scheduled cycle failed");
                        self.notifier
                            .notify(&format!("Publish cycle failed: {e}"))
                            .await;
                    }
                }
                // A manual trigger is still in flight; this tick is skipped,
                // never queued behind it
                Err(_) => {
                    tracing::warn!("previous cycle still running, skipping this slot");
                }
            }
        }
    }

    /// Manually trigger one cycle. Rejected while another cycle is running.
    pub async fn trigger_now(&self) -> Result<CycleReport> {
        let _guard = self
            .cycle_guard
            .try_lock()
            .map_err(|_| Error::CycleInProgress)?;
        self.execute_cycle().await
    }

    /// One cycle: select, dispatch, report. Caller holds the guard.
    async fn execute_cycle(&self) -> Result<CycleReport> {
        let started_at = self.clock.now();
        let selection = self.selector.next_quote().await?;
        let deliveries = self.dispatcher.dispatch(&selection.quote).await;

        let report = CycleReport {
            quote_id: selection.quote.id,
            tier: selection.tier,
            deliveries,
            started_at,
            finished_at: self.clock.now(),
        };

        if report.deliveries.all_failed() {
            tracing::error!(quote_id = report.quote_id, "all channels failed");
            self.notifier
                .notify(&format!("All channels failed!\n{}", report.summary()))
                .await;
        } else {
            tracing::info!(quote_id = report.quote_id, tier = %report.tier, "cycle complete");
            self.notifier.notify(&report.summary()).await;
        }

        Ok(report)
    }

    /// How long to sleep until the next slot fires
    fn time_until_next_slot(&self) -> Result<Duration> {
        if !self.config.post_times.is_empty() {
            return self.time_until_next_post_time();
        }
        let minutes = self
            .config
            .interval_minutes
            .ok_or_else(|| Error::config("schedule has no trigger source"))?;
        Ok(Duration::from_secs(minutes * 60))
    }

    fn time_until_next_post_time(&self) -> Result<Duration> {
        let slots = self.config.slots()?;
        let local = self.clock.local_now();
        let today = local.date_naive();
        let now_time = local.time();

        // Earliest slot still ahead today, else the first slot tomorrow
        let next_local = slots
            .iter()
            .filter(|slot| **slot > now_time)
            .min()
            .map(|slot| today.and_time(*slot))
            .or_else(|| {
                let first = slots.iter().min().copied()?;
                Some(today.succ_opt()?.and_time(first))
            })
            .ok_or_else(|| Error::config("schedule has no post times"))?;

        let wait = next_local - local.naive_local();
        Ok(wait.to_std().unwrap_or(Duration::ZERO))
    }
}
