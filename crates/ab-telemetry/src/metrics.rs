use ahash::AHashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Metric names recorded by the inbox pipeline.
pub mod names {
    pub const INSIGHTS_EVALUATED: &str = "insights_evaluated_total";
    pub const INSIGHTS_QUALIFIED: &str = "insights_qualified_total";
    pub const INSIGHTS_SKIPPED_SEEN: &str = "insights_skipped_seen_total";
    pub const MESSAGES_ADDED: &str = "messages_added_total";
    pub const INBOX_UNREAD: &str = "inbox_unread";
    pub const POLL_TICK_DURATION: &str = "poll_tick_duration_seconds";
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Bucketed distribution of observed values. An observation lands in every
/// bucket whose upper bound it fits under, so stored counts are cumulative.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        for (boundary, count) in self.buckets.iter().zip(&self.counts) {
            if value <= *boundary {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn bucket_counts(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.buckets
            .iter()
            .zip(&self.counts)
            .map(|(b, c)| (*b, c.load(Ordering::Relaxed)))
    }
}

/// Poll ticks are local and short: milliseconds up to a few seconds.
fn tick_duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Sorted `key=value` pairs distinguishing series of one counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut v: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        v.sort();
        Self(v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `{key="value",...}`, or the empty string for no labels.
    pub fn prometheus_str(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let inner: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        format!("{{{}}}", inner.join(","))
    }
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Thread-safe registry of counters, gauges and histograms.
///
/// Series are created on first use; reads of unknown series return zero.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: RwLock<AHashMap<(String, Labels), AtomicU64>>,
    gauges: RwLock<AHashMap<String, AtomicI64>>,
    histograms: RwLock<AHashMap<String, Histogram>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector with the inbox pipeline series pre-registered at zero, so an
    /// idle daemon still exports them.
    pub fn with_defaults() -> Self {
        let collector = Self::new();
        for name in [
            names::INSIGHTS_EVALUATED,
            names::INSIGHTS_QUALIFIED,
            names::INSIGHTS_SKIPPED_SEEN,
            names::MESSAGES_ADDED,
        ] {
            collector.increment_counter_by(name, &[], 0);
        }
        collector.set_gauge(names::INBOX_UNREAD, 0);
        write(&collector.histograms).insert(
            names::POLL_TICK_DURATION.to_string(),
            Histogram::new(tick_duration_buckets()),
        );
        collector
    }

    // -- Counters -----------------------------------------------------------

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.increment_counter_by(name, labels, 1);
    }

    pub fn increment_counter_by(&self, name: &str, labels: &[(&str, &str)], amount: u64) {
        let key = (name.to_string(), Labels::new(labels));
        if let Some(c) = read(&self.counters).get(&key) {
            c.fetch_add(amount, Ordering::Relaxed);
            return;
        }
        write(&self.counters)
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get_counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = (name.to_string(), Labels::new(labels));
        read(&self.counters)
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // -- Gauges -------------------------------------------------------------

    pub fn set_gauge(&self, name: &str, value: i64) {
        if let Some(g) = read(&self.gauges).get(name) {
            g.store(value, Ordering::Relaxed);
            return;
        }
        write(&self.gauges)
            .entry(name.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .store(value, Ordering::Relaxed);
    }

    pub fn get_gauge(&self, name: &str) -> i64 {
        read(&self.gauges)
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // -- Histograms ---------------------------------------------------------

    /// Record into `name`, creating it with tick-duration buckets if needed.
    pub fn record_histogram(&self, name: &str, value: f64) {
        if let Some(h) = read(&self.histograms).get(name) {
            h.observe(value);
            return;
        }
        write(&self.histograms)
            .entry(name.to_string())
            .or_insert_with(|| Histogram::new(tick_duration_buckets()))
            .observe(value);
    }

    /// `(count, sum)` of a histogram; zeros when it does not exist.
    pub fn histogram_summary(&self, name: &str) -> (u64, f64) {
        read(&self.histograms)
            .get(name)
            .map(|h| (h.count(), h.sum()))
            .unwrap_or((0, 0.0))
    }

    // -- Export --------------------------------------------------------------

    /// Prometheus text exposition format, series sorted by name.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        {
            let map = read(&self.counters);
            let mut series: Vec<(&str, &Labels, u64)> = map
                .iter()
                .map(|((name, labels), v)| (name.as_str(), labels, v.load(Ordering::Relaxed)))
                .collect();
            series.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1 .0.cmp(&b.1 .0)));
            let mut last: Option<&str> = None;
            for (name, labels, value) in series {
                if last != Some(name) {
                    out.push_str(&format!("# TYPE {name} counter\n"));
                    last = Some(name);
                }
                out.push_str(&format!("{name}{} {value}\n", labels.prometheus_str()));
            }
        }

        {
            let map = read(&self.gauges);
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            for name in names {
                let val = map[name].load(Ordering::Relaxed);
                out.push_str(&format!("# TYPE {name} gauge\n{name} {val}\n"));
            }
        }

        {
            let map = read(&self.histograms);
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            for name in names {
                let h = &map[name];
                out.push_str(&format!("# TYPE {name} histogram\n"));
                for (boundary, count) in h.bucket_counts() {
                    out.push_str(&format!("{name}_bucket{{le=\"{boundary}\"}} {count}\n"));
                }
                out.push_str(&format!("{name}_bucket{{le=\"+Inf\"}} {}\n", h.count()));
                out.push_str(&format!("{name}_sum {}\n", h.sum()));
                out.push_str(&format!("{name}_count {}\n", h.count()));
            }
        }

        out
    }

    pub fn export_json(&self) -> serde_json::Value {
        let mut counters = serde_json::Map::new();
        for ((name, labels), val) in read(&self.counters).iter() {
            let key = if labels.is_empty() {
                name.clone()
            } else {
                format!("{name}{}", labels.prometheus_str())
            };
            counters.insert(key, serde_json::json!(val.load(Ordering::Relaxed)));
        }

        let mut gauges = serde_json::Map::new();
        for (name, val) in read(&self.gauges).iter() {
            gauges.insert(name.clone(), serde_json::json!(val.load(Ordering::Relaxed)));
        }

        let mut histograms = serde_json::Map::new();
        for (name, h) in read(&self.histograms).iter() {
            let buckets: Vec<serde_json::Value> = h
                .bucket_counts()
                .map(|(le, count)| serde_json::json!({ "le": le, "count": count }))
                .collect();
            histograms.insert(
                name.clone(),
                serde_json::json!({ "buckets": buckets, "sum": h.sum(), "count": h.count() }),
            );
        }

        serde_json::json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_keyed_by_labels() {
        let m = MetricsCollector::new();
        m.increment_counter(names::INSIGHTS_QUALIFIED, &[("agent", "cfo")]);
        m.increment_counter(names::INSIGHTS_QUALIFIED, &[("agent", "cfo")]);
        m.increment_counter(names::INSIGHTS_QUALIFIED, &[("agent", "ops")]);
        assert_eq!(m.get_counter(names::INSIGHTS_QUALIFIED, &[("agent", "cfo")]), 2);
        assert_eq!(m.get_counter(names::INSIGHTS_QUALIFIED, &[("agent", "ops")]), 1);
        assert_eq!(m.get_counter(names::INSIGHTS_QUALIFIED, &[]), 0);
    }

    #[test]
    fn label_order_does_not_matter() {
        assert_eq!(
            Labels::new(&[("b", "2"), ("a", "1")]),
            Labels::new(&[("a", "1"), ("b", "2")])
        );
        assert_eq!(
            Labels::new(&[("b", "2"), ("a", "1")]).prometheus_str(),
            "{a=\"1\",b=\"2\"}"
        );
        assert_eq!(Labels::default().prometheus_str(), "");
    }

    #[test]
    fn label_values_are_escaped() {
        let l = Labels::new(&[("title", "say \"hi\"")]);
        assert_eq!(l.prometheus_str(), "{title=\"say \\\"hi\\\"\"}");
    }

    #[test]
    fn histogram_tracks_sum_and_count() {
        let m = MetricsCollector::with_defaults();
        m.record_histogram(names::POLL_TICK_DURATION, 0.002);
        m.record_histogram(names::POLL_TICK_DURATION, 0.2);
        let (count, sum) = m.histogram_summary(names::POLL_TICK_DURATION);
        assert_eq!(count, 2);
        assert!((sum - 0.202).abs() < 1e-9);
    }

    #[test]
    fn defaults_export_zero_series() {
        let out = MetricsCollector::with_defaults().export_prometheus();
        assert!(out.contains("# TYPE insights_evaluated_total counter\ninsights_evaluated_total 0\n"));
        assert!(out.contains("inbox_unread 0"));
        assert!(out.contains("poll_tick_duration_seconds_count 0"));
    }
}
