//! Per-label metric registry.
//!
//! Each label owns one `RouteSeries`: success counter, error counters keyed by
//! status code, an in-progress gauge, a cumulative latency histogram and a
//! rolling latency window. Series are created lazily through a single
//! `DashMap` entry so concurrent first requests agree on one instance, and are
//! never removed. Histogram state is integer microseconds to keep the hot path
//! free of floating point.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use crate::error::{Result, RouteMetricsError};

/// Latency ladder in seconds, 5ms to 10s.
pub const DEFAULT_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

pub const DEFAULT_SUMMARY_WINDOW: usize = 1024;

pub fn default_buckets() -> Vec<f64> {
    DEFAULT_BUCKETS.to_vec()
}

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Ascending upper bounds, in seconds.
    pub buckets: Vec<f64>,
    /// Number of most recent samples kept for quantiles.
    pub summary_window: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
            summary_window: DEFAULT_SUMMARY_WINDOW,
        }
    }
}

impl RegistryOptions {
    pub fn validate(&self) -> Result<()> {
        if self.buckets.is_empty() {
            return Err(RouteMetricsError::InvalidConfig("buckets must not be empty".into()));
        }
        if self.buckets.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(RouteMetricsError::InvalidConfig(
                "buckets must be finite and positive".into(),
            ));
        }
        if self.buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RouteMetricsError::InvalidConfig(
                "buckets must be strictly ascending".into(),
            ));
        }
        // Histogram state is whole microseconds; bounds must stay distinct there.
        let micros: Vec<u64> = self.buckets.iter().map(|b| seconds_to_micros(*b)).collect();
        if micros.first() == Some(&0) || micros.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RouteMetricsError::InvalidConfig(
                "buckets must be at least 1us apart and at least 1us".into(),
            ));
        }
        if self.summary_window == 0 {
            return Err(RouteMetricsError::InvalidConfig("summary_window must be at least 1".into()));
        }
        Ok(())
    }
}

fn seconds_to_micros(seconds: f64) -> u64 {
    (seconds * 1_000_000.0).round() as u64
}

struct AtomicHistogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: Box<[AtomicU64]>,
}

impl AtomicHistogram {
    fn new(len: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            buckets: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn observe(&self, bounds_micros: &[u64], micros: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);

        // Cumulative: every bucket whose bound covers the value.
        for (bucket, &le) in self.buckets.iter().zip(bounds_micros) {
            if micros <= le {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

struct LatencyWindow {
    cap: usize,
    samples: Mutex<VecDeque<u64>>,
}

impl LatencyWindow {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            samples: Mutex::new(VecDeque::with_capacity(cap.min(DEFAULT_SUMMARY_WINDOW))),
        }
    }

    fn push(&self, micros: u64) {
        // A poisoned lock drops the sample; the request itself is unaffected.
        if let Ok(mut g) = self.samples.lock() {
            if g.len() == self.cap {
                g.pop_front();
            }
            g.push_back(micros);
        }
    }

    fn summary(&self) -> WindowSummary {
        let samples: Vec<u64> = match self.samples.lock() {
            Ok(g) => g.iter().copied().collect(),
            Err(_) => Vec::new(),
        };
        WindowSummary::from_micros(samples)
    }
}

/// Quantiles over the rolling window, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowSummary {
    pub count: usize,
    /// Sum of the windowed samples.
    pub sum: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl WindowSummary {
    fn from_micros(mut samples: Vec<u64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();
        let sum = samples.iter().sum::<u64>() as f64 / 1_000_000.0;
        let at = |q: f64| {
            let idx = (samples.len() as f64 * q) as usize;
            samples[idx.min(samples.len() - 1)] as f64 / 1_000_000.0
        };
        Self {
            count: samples.len(),
            sum,
            p50: at(0.50),
            p90: at(0.90),
            p99: at(0.99),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    /// Upper bounds in seconds.
    pub bounds: Vec<f64>,
    /// Cumulative counts, one per bound.
    pub cumulative: Vec<u64>,
    pub count: u64,
    pub sum_seconds: f64,
}

/// Metric state for one label.
pub struct RouteSeries {
    label: String,
    success: AtomicU64,
    errors: DashMap<u16, AtomicU64>,
    in_progress: AtomicI64,
    bounds: Arc<[f64]>,
    bounds_micros: Arc<[u64]>,
    duration: AtomicHistogram,
    window: LatencyWindow,
}

impl RouteSeries {
    fn new(label: String, bounds: Arc<[f64]>, bounds_micros: Arc<[u64]>, window: usize) -> Self {
        let duration = AtomicHistogram::new(bounds_micros.len());
        Self {
            label,
            success: AtomicU64::new(0),
            errors: DashMap::new(),
            in_progress: AtomicI64::new(0),
            bounds,
            bounds_micros,
            duration,
            window: LatencyWindow::new(window),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn in_progress_inc(&self) {
        self.in_progress.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_progress_dec(&self) {
        self.in_progress.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, code: u16) {
        self.errors
            .entry(code)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, d: Duration) {
        let micros = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
        self.duration.observe(&self.bounds_micros, micros);
        self.window.push(micros);
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn error_count(&self, code: u16) -> u64 {
        self.errors
            .get(&code)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn error_total(&self) -> u64 {
        self.errors.iter().map(|e| e.value().load(Ordering::Relaxed)).sum()
    }

    /// Error counts by status code, sorted by code.
    pub fn errors(&self) -> BTreeMap<u16, u64> {
        self.errors
            .iter()
            .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
            .collect()
    }

    pub fn in_progress(&self) -> i64 {
        self.in_progress.load(Ordering::Relaxed)
    }

    pub fn histogram(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bounds: self.bounds.to_vec(),
            cumulative: self
                .duration
                .buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
            count: self.duration.count.load(Ordering::Relaxed),
            sum_seconds: self.duration.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }

    pub fn summary(&self) -> WindowSummary {
        self.window.summary()
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            label: self.label.clone(),
            success: self.success_count(),
            errors: self.errors(),
            in_progress: self.in_progress(),
            duration: self.histogram(),
            window: self.summary(),
        }
    }
}

impl std::fmt::Debug for RouteSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSeries")
            .field("label", &self.label)
            .field("success", &self.success_count())
            .field("errors", &self.errors())
            .field("in_progress", &self.in_progress())
            .finish()
    }
}

/// Point-in-time copy of one series, for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub label: String,
    pub success: u64,
    pub errors: BTreeMap<u16, u64>,
    pub in_progress: i64,
    pub duration: HistogramSnapshot,
    pub window: WindowSummary,
}

/// Process-wide label -> series store. Build once at startup and share via `Arc`.
pub struct MetricRegistry {
    series: DashMap<String, Arc<RouteSeries>>,
    bounds: Arc<[f64]>,
    bounds_micros: Arc<[u64]>,
    summary_window: usize,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::build(RegistryOptions::default())
    }
}

impl MetricRegistry {
    pub fn new(opts: RegistryOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self::build(opts))
    }

    fn build(opts: RegistryOptions) -> Self {
        let bounds_micros: Arc<[u64]> = opts
            .buckets
            .iter()
            .map(|s| seconds_to_micros(*s))
            .collect();
        Self {
            series: DashMap::new(),
            bounds: opts.buckets.into(),
            bounds_micros,
            summary_window: opts.summary_window,
        }
    }

    /// Series for `label`, created on first access.
    pub fn series_for(&self, label: &str) -> Arc<RouteSeries> {
        if let Some(s) = self.series.get(label) {
            return Arc::clone(s.value());
        }

        let entry = self.series.entry(label.to_string()).or_insert_with(|| {
            tracing::debug!(%label, "creating metric series");
            Arc::new(RouteSeries::new(
                label.to_string(),
                Arc::clone(&self.bounds),
                Arc::clone(&self.bounds_micros),
                self.summary_window,
            ))
        });
        Arc::clone(entry.value())
    }

    /// Existing series only; never creates.
    pub fn get(&self, label: &str) -> Option<Arc<RouteSeries>> {
        self.series.get(label).map(|s| Arc::clone(s.value()))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn buckets(&self) -> &[f64] {
        &self.bounds
    }

    /// Sorted labels.
    pub fn labels(&self) -> Vec<String> {
        let mut out: Vec<String> = self.series.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    /// Snapshots sorted by label, so exports are stable.
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        let mut out: Vec<SeriesSnapshot> = self.series.iter().map(|e| e.value().snapshot()).collect();
        out.sort_by(|a, b| a.label.cmp(&b.label));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_is_created_once_per_label() {
        let reg = MetricRegistry::default();
        let a = reg.series_for("GET /a");
        let b = reg.series_for("GET /a");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
        reg.series_for("GET /b");
        assert_eq!(reg.labels(), vec!["GET /a".to_string(), "GET /b".to_string()]);
    }

    #[test]
    fn get_does_not_create() {
        let reg = MetricRegistry::default();
        assert!(reg.get("GET /a").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn counters_and_gauge() {
        let reg = MetricRegistry::default();
        let s = reg.series_for("GET /a");
        s.in_progress_inc();
        s.in_progress_inc();
        s.in_progress_dec();
        s.record_success();
        s.record_error(404);
        s.record_error(404);
        s.record_error(500);
        assert_eq!(s.in_progress(), 1);
        assert_eq!(s.success_count(), 1);
        assert_eq!(s.error_count(404), 2);
        assert_eq!(s.error_count(503), 0);
        assert_eq!(s.error_total(), 3);
        assert_eq!(s.errors().keys().copied().collect::<Vec<_>>(), vec![404, 500]);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let reg = MetricRegistry::new(RegistryOptions {
            buckets: vec![0.01, 0.1, 1.0],
            summary_window: 8,
        })
        .unwrap();
        let s = reg.series_for("GET /a");
        s.observe_duration(Duration::from_millis(5));
        s.observe_duration(Duration::from_millis(50));
        s.observe_duration(Duration::from_secs(2));

        let h = s.histogram();
        assert_eq!(h.bounds, vec![0.01, 0.1, 1.0]);
        assert_eq!(h.cumulative, vec![1, 2, 2]);
        assert_eq!(h.count, 3);
        assert!((h.sum_seconds - 2.055).abs() < 1e-9);
    }

    #[test]
    fn window_keeps_most_recent_samples() {
        let reg = MetricRegistry::new(RegistryOptions {
            buckets: default_buckets(),
            summary_window: 4,
        })
        .unwrap();
        let s = reg.series_for("GET /a");
        for ms in [1000, 1000, 1, 2, 3, 4] {
            s.observe_duration(Duration::from_millis(ms));
        }
        let w = s.summary();
        assert_eq!(w.count, 4);
        assert!((w.sum - 0.010).abs() < 1e-9);
        assert!(w.p99 <= 0.004 + 1e-9);
        assert!(w.p50 >= 0.002);
    }

    #[test]
    fn empty_window_summary_is_zero() {
        let reg = MetricRegistry::default();
        assert_eq!(reg.series_for("x").summary(), WindowSummary::default());
    }

    #[test]
    fn rejects_bad_options() {
        for buckets in [
            vec![],
            vec![0.1, 0.1],
            vec![0.5, 0.1],
            vec![-1.0],
            vec![f64::NAN],
            vec![0.0000001, 0.0000004],
            vec![0.001, 0.0010001],
        ] {
            let opts = RegistryOptions { buckets, summary_window: 1 };
            assert!(MetricRegistry::new(opts).is_err());
        }
        let opts = RegistryOptions { buckets: default_buckets(), summary_window: 0 };
        assert!(MetricRegistry::new(opts).is_err());
    }

    #[test]
    fn snapshot_is_sorted_and_serializable() {
        let reg = MetricRegistry::default();
        reg.series_for("b").record_success();
        reg.series_for("a").record_error(418);
        let snap = reg.snapshot();
        assert_eq!(snap[0].label, "a");
        assert_eq!(snap[0].errors.get(&418), Some(&1));
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json[1]["success"], 1);
    }
}
