use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ab_core::catalog;
use ab_core::evaluator::Qualifier;
use ab_core::types::{Insight, Message, DEFAULT_AGENT_ID};
use ab_inbox::InboxStore;
use ab_telemetry::{names, MetricsCollector};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Insight source
// ---------------------------------------------------------------------------

/// Supplies the insights evaluated on each tick.
pub trait InsightSource: Send + Sync {
    fn insights(&self) -> Vec<Insight>;
}

/// A fixed insight set, returned unchanged on every tick.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    insights: Vec<Insight>,
}

impl StaticSource {
    pub fn new(insights: Vec<Insight>) -> Self {
        Self { insights }
    }

    /// The built-in mock catalog.
    pub fn catalog() -> Self {
        Self::new(catalog::mock_insights())
    }
}

impl InsightSource for StaticSource {
    fn insights(&self) -> Vec<Insight> {
        self.insights.clone()
    }
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub evaluated: usize,
    pub qualified: usize,
    /// Qualifying insights dropped because this session already processed them.
    pub skipped_seen: usize,
    /// Messages that did not exist in the inbox before this tick.
    pub inserted: Vec<Message>,
    /// Qualifying insights whose `(title, agent)` was already stored.
    pub existing: usize,
    pub unread: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

// ---------------------------------------------------------------------------
// InsightPoller
// ---------------------------------------------------------------------------

struct Shared {
    polling: AtomicBool,
    /// Bumped by every `start`; a loop exits once it no longer owns the
    /// current generation.
    generation: AtomicU64,
    seen: Mutex<HashSet<String>>,
    unread: AtomicUsize,
}

/// Two-state polling driver: `Idle -> Polling -> Idle`.
///
/// While polling it ticks once immediately and then every `interval`. A
/// [`stop`](Self::stop) is observed at the next scheduled tick; a tick that
/// is already running always completes. Clones share state.
#[derive(Clone)]
pub struct InsightPoller {
    inbox: Arc<InboxStore>,
    qualifier: Arc<dyn Qualifier>,
    source: Arc<dyn InsightSource>,
    metrics: Arc<MetricsCollector>,
    interval: Duration,
    shared: Arc<Shared>,
}

impl InsightPoller {
    pub fn new(
        inbox: Arc<InboxStore>,
        qualifier: Arc<dyn Qualifier>,
        source: Arc<dyn InsightSource>,
    ) -> Self {
        Self {
            inbox,
            qualifier,
            source,
            metrics: Arc::new(MetricsCollector::with_defaults()),
            interval: DEFAULT_POLL_INTERVAL,
            shared: Arc::new(Shared {
                polling: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                seen: Mutex::new(HashSet::new()),
                unread: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!("poll interval of zero requested, keeping {:?}", self.interval);
        } else {
            self.interval = interval;
        }
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollState {
        if self.shared.polling.load(Ordering::Acquire) {
            PollState::Polling
        } else {
            PollState::Idle
        }
    }

    /// Unread count as of the last completed tick.
    pub fn unread_count(&self) -> usize {
        self.shared.unread.load(Ordering::Acquire)
    }

    /// Number of insight ids processed this session.
    pub fn seen_count(&self) -> usize {
        self.shared.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Begin polling on the current tokio runtime.
    ///
    /// `on_message` runs once per message newly inserted into the inbox.
    /// Returns `None` when already polling.
    pub fn start<F>(&self, on_message: F) -> Option<JoinHandle<()>>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        if self
            .shared
            .polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("poller already running");
            return None;
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(interval_secs = self.interval.as_secs_f64(), generation, "polling started");

        let poller = self.clone();
        Some(tokio::spawn(async move {
            poller.run(generation, on_message).await;
        }))
    }

    /// Clear the polling flag. Already scheduled ticks become no-ops.
    pub fn stop(&self) {
        if self.shared.polling.swap(false, Ordering::AcqRel) {
            info!("polling stop requested");
        }
    }

    fn owns(&self, generation: u64) -> bool {
        self.shared.polling.load(Ordering::Acquire)
            && self.shared.generation.load(Ordering::Acquire) == generation
    }

    async fn run<F>(&self, generation: u64, on_message: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let on_message = Arc::new(on_message);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            if !self.owns(generation) {
                debug!(generation, "poll loop observed stop");
                break;
            }
            // Storage access is blocking file I/O; run the pass on the
            // blocking pool. It completes even if this task is aborted.
            let poller = self.clone();
            let callback = Arc::clone(&on_message);
            if let Err(e) = tokio::task::spawn_blocking(move || {
                poller.tick_with(&*callback);
            })
            .await
            {
                error!(error = %e, generation, "poll tick failed");
            }
        }
        info!(generation, "polling stopped");
    }

    /// Run one evaluation pass synchronously.
    pub fn tick(&self) -> TickReport {
        self.tick_with(&|_| {})
    }

    /// Like [`tick`](Self::tick), calling `on_message` right after each
    /// insert so listeners see the unread count grow one message at a time.
    pub fn tick_with(&self, on_message: &dyn Fn(&Message)) -> TickReport {
        let started = Instant::now();
        let insights = self.source.insights();
        let mut report = TickReport {
            evaluated: insights.len(),
            ..TickReport::default()
        };

        for insight in insights.iter().filter(|i| self.qualifier.qualifies(i)) {
            report.qualified += 1;
            let agent = insight.agent_id.as_deref().unwrap_or(DEFAULT_AGENT_ID);
            self.metrics
                .increment_counter(names::INSIGHTS_QUALIFIED, &[("agent", agent)]);

            // Mark before adding; a failed write does not make the insight
            // eligible again this session.
            let first_time = self
                .shared
                .seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(insight.id.clone());
            if !first_time {
                report.skipped_seen += 1;
                continue;
            }

            let outcome = self.inbox.add(insight.clone(), None);
            if outcome.is_inserted() {
                let message = outcome.into_message();
                on_message(&message);
                report.inserted.push(message);
            } else {
                report.existing += 1;
            }
        }

        report.unread = self.inbox.unread_count();
        self.shared.unread.store(report.unread, Ordering::Release);

        let m = &self.metrics;
        m.increment_counter_by(names::INSIGHTS_EVALUATED, &[], report.evaluated as u64);
        m.increment_counter_by(names::INSIGHTS_SKIPPED_SEEN, &[], report.skipped_seen as u64);
        m.increment_counter_by(names::MESSAGES_ADDED, &[], report.inserted.len() as u64);
        m.set_gauge(names::INBOX_UNREAD, report.unread as i64);
        m.record_histogram(names::POLL_TICK_DURATION, started.elapsed().as_secs_f64());

        debug!(
            evaluated = report.evaluated,
            qualified = report.qualified,
            skipped_seen = report.skipped_seen,
            inserted = report.inserted.len(),
            existing = report.existing,
            unread = report.unread,
            "poll tick"
        );
        report
    }
}
