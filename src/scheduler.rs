//! # Scheduler
//! Sequential polling loop over the configured sources.
//!
//! Each cycle walks the sources in configured order. A source is polled when it
//! is enabled and its refresh interval has elapsed since the last attempt.
//! `last_refresh` is stamped whether the attempt succeeded or not, so a broken
//! feed is retried on its normal cadence instead of every cycle. One failing
//! source never affects the others.
//!
//! The loop runs on a single task: cycles never overlap, and the
//! `CancellationToken` is observed during every sleep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::sources::SourceSpec;
use crate::config::AppConfig;
use crate::ingest::types::FeedFetcher;
use crate::ingest::{self, IngestReport};
use crate::store::ItemStore;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    /// Pause after each polled source, to spare the fetch backend.
    pub inter_source_delay: Duration,
    /// Pause between cycles.
    pub idle_sleep: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            inter_source_delay: Duration::from_secs(5),
            idle_sleep: Duration::from_secs(60),
        }
    }
}

impl SchedulerCfg {
    /// No pauses at all; for tests and one-shot runs.
    pub fn immediate() -> Self {
        Self {
            inter_source_delay: Duration::ZERO,
            idle_sleep: Duration::ZERO,
        }
    }
}

/// Mutable per-source bookkeeping owned by the scheduler.
#[derive(Debug, Clone)]
pub struct SourceState {
    pub spec: SourceSpec,
    pub last_refresh: Option<DateTime<Utc>>,
    pub disabled: bool,
}

impl SourceState {
    pub fn new(spec: SourceSpec) -> Self {
        let disabled = !spec.enabled;
        Self {
            spec,
            last_refresh: None,
            disabled,
        }
    }

    /// Due when enabled and never attempted, or `interval` has fully elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.disabled {
            return false;
        }
        match self.last_refresh {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).num_milliseconds();
                let interval = i64::try_from(self.spec.refresh_interval_secs.saturating_mul(1000))
                    .unwrap_or(i64::MAX);
                elapsed >= interval
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub ingested: Vec<IngestReport>,
    /// (source url, error) for sources whose fetch or parse failed.
    pub failed: Vec<(String, String)>,
    pub not_due: usize,
    pub disabled: usize,
}

impl CycleReport {
    pub fn polled(&self) -> usize {
        self.ingested.len() + self.failed.len()
    }

    pub fn inserted(&self) -> usize {
        self.ingested.iter().map(|r| r.inserted).sum()
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Scheduler {
    sources: Vec<SourceState>,
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn ItemStore>,
    cfg: SchedulerCfg,
    clock: Clock,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        sources: Vec<SourceSpec>,
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn ItemStore>,
        cfg: SchedulerCfg,
    ) -> Self {
        Self {
            sources: sources.into_iter().map(SourceState::new).collect(),
            fetcher,
            store,
            cfg,
            clock: Arc::new(Utc::now),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Offline mode: every source is disabled and no fetch will ever happen.
    pub fn disable_polling(&mut self) {
        for s in &mut self.sources {
            s.disabled = true;
        }
        info!(target: "ingest", sources = self.sources.len(), "polling disabled");
    }

    /// Honour `FEED_POLLING_DISABLED` as read into `AppConfig`. Both the
    /// service and the one-shot binary go through here.
    pub fn with_app_config(mut self, app: &AppConfig) -> Self {
        if app.polling_disabled {
            warn!(target: "ingest", "polling disabled, serving stored items only");
            self.disable_polling();
        }
        self
    }

    pub fn sources(&self) -> &[SourceState] {
        &self.sources
    }

    /// Mutable access for operators/tests (e.g. to disable one source).
    pub fn source_mut(&mut self, url: &str) -> Option<&mut SourceState> {
        self.sources.iter_mut().find(|s| s.spec.url == url)
    }

    /// One full pass over all sources, in configured order.
    pub async fn run_cycle(&mut self) -> CycleReport {
        ingest::ensure_metrics_described();
        let t0 = Instant::now();
        let mut report = CycleReport::default();

        for idx in 0..self.sources.len() {
            if self.cancel.is_cancelled() {
                break;
            }
            let now = (self.clock)();
            let state = &self.sources[idx];
            if state.disabled {
                debug!(target: "ingest", source = %state.spec.url, "source disabled, skipping");
                report.disabled += 1;
                continue;
            }
            if !state.is_due(now) {
                report.not_due += 1;
                continue;
            }

            let spec = state.spec.clone();
            let result = ingest::ingest_source(
                self.fetcher.as_ref(),
                self.store.as_ref(),
                &spec,
                now.timestamp_millis(),
            )
            .await;
            // Stamped on success and failure alike.
            self.sources[idx].last_refresh = Some(now);

            match result {
                Ok(r) => {
                    info!(
                        target: "ingest",
                        source = %r.source,
                        fetched = r.fetched,
                        kept = r.kept,
                        inserted = r.inserted,
                        failed = r.failed,
                        "source ingested"
                    );
                    report.ingested.push(r);
                }
                Err(e) => {
                    warn!(target: "ingest", source = %spec.url, error = ?e, "source fetch failed");
                    counter!("ingest_source_errors_total").increment(1);
                    report.failed.push((spec.url, format!("{e:#}")));
                }
            }

            self.pause(self.cfg.inter_source_delay).await;
        }

        histogram!("ingest_cycle_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("ingest_last_cycle_ts").set(Utc::now().timestamp() as f64);
        report
    }

    async fn pause(&self, d: Duration) {
        if d.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(d) => {}
        }
    }

    /// Run cycles until `cancel` fires. The next cycle starts only after the
    /// previous one and the idle sleep have finished.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        self.cancel = cancel;
        tokio::spawn(async move {
            info!(target: "ingest", sources = self.sources.len(), "scheduler started");
            while !self.cancel.is_cancelled() {
                let report = self.run_cycle().await;
                info!(
                    target: "ingest",
                    polled = report.polled(),
                    inserted = report.inserted(),
                    failed = report.failed.len(),
                    not_due = report.not_due,
                    disabled = report.disabled,
                    "cycle finished"
                );
                self.pause(self.cfg.idle_sleep).await;
            }
            info!(target: "ingest", "scheduler stopped");
        })
    }
}
