use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ab_core::catalog;
use ab_core::evaluator::InsightEvaluator;
use ab_core::types::{Insight, Message};
use ab_daemon::poller::{InsightPoller, InsightSource, PollState};
use ab_inbox::{InboxStore, MemoryStore};
use ab_telemetry::{names, MetricsCollector};

/// Catalog source that counts how often it is read.
#[derive(Default)]
struct CountingSource {
    reads: AtomicUsize,
}

impl CountingSource {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl InsightSource for CountingSource {
    fn insights(&self) -> Vec<Insight> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        catalog::mock_insights()
    }
}

struct Fixture {
    inbox: Arc<InboxStore>,
    source: Arc<CountingSource>,
    metrics: Arc<MetricsCollector>,
    poller: InsightPoller,
}

fn fixture() -> Fixture {
    let inbox = Arc::new(InboxStore::new(Arc::new(MemoryStore::new())));
    let source = Arc::new(CountingSource::default());
    let metrics = Arc::new(MetricsCollector::with_defaults());
    let poller = InsightPoller::new(
        inbox.clone(),
        Arc::new(InsightEvaluator::builtin()),
        source.clone(),
    )
    .with_interval(Duration::from_secs(10))
    .with_metrics(metrics.clone());
    Fixture {
        inbox,
        source,
        metrics,
        poller,
    }
}

fn collector() -> (Arc<Mutex<Vec<Message>>>, impl Fn(&Message) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |m: &Message| sink.lock().unwrap().push(m.clone()))
}

#[tokio::test(start_paused = true)]
async fn start_ticks_immediately_and_reports_new_messages() {
    let f = fixture();
    let (seen, on_message) = collector();
    let _handle = f.poller.start(on_message).expect("poller was idle");
    assert_eq!(f.poller.state(), PollState::Polling);

    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(f.source.reads(), 1);
    let titles: Vec<String> = seen.lock().unwrap().iter().map(|m| m.title.clone()).collect();
    assert_eq!(titles.len(), 4);
    assert!(titles.contains(&"Safety stock breach for SKU-1142".to_string()));
    assert_eq!(f.poller.unread_count(), 4);
    assert_eq!(f.inbox.unread_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn ticks_follow_the_interval() {
    let f = fixture();
    let (seen, on_message) = collector();
    let _handle = f.poller.start(on_message);

    tokio::time::sleep(Duration::from_secs(25)).await;

    // t = 0, 10, 20
    assert_eq!(f.source.reads(), 3);
    // later ticks only hit the seen set
    assert_eq!(seen.lock().unwrap().len(), 4);
    assert_eq!(f.metrics.get_counter(names::INSIGHTS_SKIPPED_SEEN, &[]), 8);
    assert_eq!(f.metrics.get_counter(names::INSIGHTS_EVALUATED, &[]), 21);
    assert_eq!(f.metrics.get_counter(names::MESSAGES_ADDED, &[]), 4);
}

#[tokio::test(start_paused = true)]
async fn stop_is_observed_at_the_next_tick() {
    let f = fixture();
    let (_, on_message) = collector();
    let handle = f.poller.start(on_message).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;

    f.poller.stop();
    assert_eq!(f.poller.state(), PollState::Idle);
    assert!(!handle.is_finished());

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(handle.is_finished());
    assert_eq!(f.source.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_start_while_polling_is_rejected() {
    let f = fixture();
    let (_, a) = collector();
    let (_, b) = collector();
    assert!(f.poller.start(a).is_some());
    assert!(f.poller.start(b).is_none());
}

#[tokio::test(start_paused = true)]
async fn restart_after_stop_runs_a_single_loop() {
    let f = fixture();
    let (_, a) = collector();
    let (_, b) = collector();
    let first = f.poller.start(a).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    f.poller.stop();
    let _second = f.poller.start(b).unwrap();

    tokio::time::sleep(Duration::from_secs(15)).await;

    assert!(first.is_finished());
    // first loop at t=0, second loop at t=0 and t=10
    assert_eq!(f.source.reads(), 3);
}

#[tokio::test]
async fn callback_skips_messages_already_in_the_inbox() {
    let f = fixture();
    let cash = catalog::mock_insights()
        .into_iter()
        .find(|i| i.id == "ins-001")
        .unwrap();
    f.inbox.add_message(cash, None);

    let report = f.poller.tick();
    assert_eq!(report.qualified, 4);
    assert_eq!(report.existing, 1);
    assert_eq!(report.inserted.len(), 3);
    assert!(report.inserted.iter().all(|m| m.title != "Idle cash above target in operating account"));
}

#[tokio::test]
async fn unread_count_follows_the_inbox_between_ticks() {
    let f = fixture();
    f.poller.tick();
    assert_eq!(f.poller.unread_count(), 4);

    f.inbox.mark_all_as_read();
    // observable value only moves on the next tick
    assert_eq!(f.poller.unread_count(), 4);
    f.poller.tick();
    assert_eq!(f.poller.unread_count(), 0);
    assert_eq!(f.metrics.get_gauge(names::INBOX_UNREAD), 0);
}

#[tokio::test]
async fn cleared_inbox_is_not_refilled_within_a_session() {
    let f = fixture();
    f.poller.tick();
    f.inbox.clear_inbox();
    let report = f.poller.tick();
    assert!(report.inserted.is_empty());
    assert!(f.inbox.all_messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduled_ticks_run_off_the_runtime_thread() {
    let f = fixture();
    let runtime_thread = std::thread::current().id();
    let tick_threads = Arc::new(Mutex::new(Vec::new()));
    let sink = tick_threads.clone();
    let _handle = f
        .poller
        .start(move |_: &Message| sink.lock().unwrap().push(std::thread::current().id()));

    tokio::time::sleep(Duration::from_millis(1)).await;

    let threads = tick_threads.lock().unwrap();
    assert_eq!(threads.len(), 4);
    assert!(threads.iter().all(|id| *id != runtime_thread));
}
