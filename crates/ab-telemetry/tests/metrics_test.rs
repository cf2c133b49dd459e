use std::sync::Arc;

use ab_telemetry::{names, MetricsCollector};

#[test]
fn concurrent_increments_are_not_lost() {
    let m = Arc::new(MetricsCollector::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let m = m.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    m.increment_counter(names::MESSAGES_ADDED, &[]);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(m.get_counter(names::MESSAGES_ADDED, &[]), 8000);
}

#[test]
fn prometheus_groups_labelled_series_under_one_type_line() {
    let m = MetricsCollector::new();
    m.increment_counter(names::INSIGHTS_QUALIFIED, &[("agent", "b")]);
    m.increment_counter(names::INSIGHTS_QUALIFIED, &[("agent", "a")]);
    m.set_gauge(names::INBOX_UNREAD, 3);

    let out = m.export_prometheus();
    assert_eq!(out.matches("# TYPE insights_qualified_total counter").count(), 1);
    let a = out.find("insights_qualified_total{agent=\"a\"} 1").unwrap();
    let b = out.find("insights_qualified_total{agent=\"b\"} 1").unwrap();
    assert!(a < b);
    assert!(out.contains("# TYPE inbox_unread gauge\ninbox_unread 3\n"));
}

#[test]
fn histogram_buckets_are_cumulative() {
    let m = MetricsCollector::with_defaults();
    m.record_histogram(names::POLL_TICK_DURATION, 0.003);
    m.record_histogram(names::POLL_TICK_DURATION, 0.3);

    let out = m.export_prometheus();
    assert!(out.contains("poll_tick_duration_seconds_bucket{le=\"0.001\"} 0"));
    assert!(out.contains("poll_tick_duration_seconds_bucket{le=\"0.005\"} 1"));
    assert!(out.contains("poll_tick_duration_seconds_bucket{le=\"0.5\"} 2"));
    assert!(out.contains("poll_tick_duration_seconds_bucket{le=\"+Inf\"} 2"));
}

#[test]
fn json_export_shape() {
    let m = MetricsCollector::with_defaults();
    m.increment_counter(names::INSIGHTS_EVALUATED, &[]);
    m.set_gauge(names::INBOX_UNREAD, 4);

    let json = m.export_json();
    assert_eq!(json["counters"][names::INSIGHTS_EVALUATED], 1);
    assert_eq!(json["gauges"][names::INBOX_UNREAD], 4);
    assert_eq!(json["histograms"][names::POLL_TICK_DURATION]["count"], 0);
}
