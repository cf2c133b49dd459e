use std::sync::Arc;
use std::time::Duration;

use ab_core::config::{Config, QualifierKind, StorageBackend};
use ab_core::evaluator::Qualifier;
use ab_core::thresholds::ThresholdStore;
use ab_core::types::Message;
use ab_inbox::{
    FileStore, InboxEvent, InboxKeys, InboxStore, KeyValueStore, MemoryStore, NotificationBroker,
};
use ab_telemetry::{names, MetricsCollector};
use anyhow::{Context, Result};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::poller::{InsightPoller, InsightSource, StaticSource};
use crate::shutdown::ShutdownSignal;

/// Daemon loop timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonIntervals {
    /// Time between insight polls (default: 10s).
    pub poll_secs: u64,
    /// How long a banner stays up; 0 leaves it until replaced (default: 4s).
    pub banner_dismiss_secs: u64,
    /// How often the badge count is re-read (default: 2s).
    pub badge_refresh_secs: u64,
}

impl Default for DaemonIntervals {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DaemonIntervals {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_secs: config.polling.interval_secs,
            banner_dismiss_secs: config.notifications.banner_dismiss_secs,
            badge_refresh_secs: config.notifications.badge_refresh_secs,
        }
    }
}

/// Open the configured storage backend.
pub fn open_storage(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => {
            let dir = config.storage.resolved_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create storage dir {}", dir.display()))?;
            info!(dir = %dir.display(), "file storage ready");
            Ok(Arc::new(FileStore::new(dir)))
        }
    }
}

/// Build the qualifier selected by `evaluation.qualifier`.
pub fn build_qualifier(config: &Config) -> Arc<dyn Qualifier> {
    match config.evaluation.qualifier {
        QualifierKind::Agent => Arc::new(config.evaluation.build_evaluator()),
        QualifierKind::Source => Arc::new(ThresholdStore::builtin()),
    }
}

/// The agentboard background daemon.
///
/// Polls the insight source into the inbox, announces new messages through
/// the broker, dismisses banners after a delay and keeps badge listeners in
/// step with the unread count. Runs until the [`ShutdownSignal`] fires.
pub struct Daemon {
    config: Config,
    intervals: DaemonIntervals,
    inbox: Arc<InboxStore>,
    broker: Arc<NotificationBroker>,
    poller: InsightPoller,
    metrics: Arc<MetricsCollector>,
    shutdown: ShutdownSignal,
}

impl Daemon {
    /// Create a daemon on the configured storage backend and the built-in
    /// insight catalog.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let storage = open_storage(&config)?;
        Ok(Self::with_parts(config, storage, Arc::new(StaticSource::catalog())))
    }

    pub fn with_parts(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
        source: Arc<dyn InsightSource>,
    ) -> Self {
        let keys = InboxKeys {
            messages: config.storage.messages_key.clone(),
            counter: config.storage.counter_key.clone(),
        };
        let inbox = Arc::new(InboxStore::with_parts(
            storage,
            Arc::new(ab_core::clock::SystemClock),
            keys,
        ));
        let broker = Arc::new(NotificationBroker::new(inbox.clone()));
        let metrics = Arc::new(MetricsCollector::with_defaults());
        let intervals = DaemonIntervals::from_config(&config);
        let poller = InsightPoller::new(inbox.clone(), build_qualifier(&config), source)
            .with_interval(Duration::from_secs(intervals.poll_secs))
            .with_metrics(metrics.clone());

        Self {
            config,
            intervals,
            inbox,
            broker,
            poller,
            metrics,
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn intervals(&self) -> &DaemonIntervals {
        &self.intervals
    }

    pub fn inbox(&self) -> &Arc<InboxStore> {
        &self.inbox
    }

    pub fn broker(&self) -> &Arc<NotificationBroker> {
        &self.broker
    }

    pub fn poller(&self) -> &InsightPoller {
        &self.poller
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Returns a handle that can trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Run until shutdown is triggered.
    pub async fn run(&self) -> Result<()> {
        info!(
            poll_secs = self.intervals.poll_secs,
            polling_enabled = self.config.polling.enabled,
            banner_dismiss_secs = self.intervals.banner_dismiss_secs,
            badge_refresh_secs = self.intervals.badge_refresh_secs,
            "daemon starting event loop"
        );

        // Subscribe before polling starts so the first banner is not missed.
        let events = self.broker.subscribe_events();

        let poll_handle = if self.config.polling.enabled {
            let broker = self.broker.clone();
            self.poller
                .start(move |message: &Message| broker.notify_new_message(message))
        } else {
            warn!("polling disabled by configuration");
            None
        };

        self.run_loops(events).await;

        self.poller.stop();
        if let Some(handle) = poll_handle {
            // A tick already on the blocking pool still runs to completion.
            handle.abort();
            let _ = handle.await;
        }

        info!(
            unread = self.inbox.unread_count(),
            "daemon stopped\n{}",
            self.metrics.export_prometheus()
        );
        Ok(())
    }

    async fn run_loops(&self, events: flume::Receiver<InboxEvent>) {
        let banner_dismiss = Duration::from_secs(self.intervals.banner_dismiss_secs);
        let mut badge_interval =
            tokio::time::interval(Duration::from_secs(self.intervals.badge_refresh_secs));
        badge_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Consume the immediate tick; the first refresh happens one period in.
        badge_interval.tick().await;

        let mut last_badge: Option<usize> = None;
        let mut dismiss_at: Option<Instant> = None;

        let stopped = self.shutdown.wait();
        tokio::pin!(stopped);

        loop {
            let dismiss = async move {
                match dismiss_at {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                event = events.recv_async() => match event {
                    Ok(InboxEvent::Banner(Some(message))) => {
                        if !banner_dismiss.is_zero() {
                            dismiss_at = Some(Instant::now() + banner_dismiss);
                        }
                        debug!(message_id = message.id, "banner shown");
                    }
                    Ok(InboxEvent::Banner(None)) => dismiss_at = None,
                    Ok(InboxEvent::Badge(count)) => {
                        last_badge = Some(count);
                        self.metrics.set_gauge(names::INBOX_UNREAD, count as i64);
                    }
                    Err(_) => {
                        warn!("broker event channel closed");
                        break;
                    }
                },
                _ = dismiss => {
                    debug!("banner auto-dismissed");
                    dismiss_at = None;
                    self.broker.clear_notification();
                }
                _ = badge_interval.tick() => {
                    let count = self.inbox.unread_count();
                    if last_badge != Some(count) {
                        debug!(count, previous = ?last_badge, "unread count changed");
                        self.broker.notify_badge();
                    }
                }
                _ = &mut stopped => {
                    info!("shutdown signal received, stopping background loops");
                    break;
                }
            }
        }
    }
}
