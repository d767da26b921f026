//! Metrics collection for snapshot requests
//!
//! Atomic counters for each pipeline stage, failures broken down by error
//! kind, and a bounded ring buffer of request durations for percentiles.
//! [`Metrics::to_prometheus_format`] renders everything as Prometheus text.

use crate::error::ErrorKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

/// Maximum number of duration samples to keep in the histogram
const MAX_HISTOGRAM_SAMPLES: usize = 1000;

/// Metrics for snapshot requests
///
/// Thread-safe; counters are atomics, breakdowns sit behind `RwLock`s.
#[derive(Debug)]
pub struct Metrics {
    /// Snapshot requests started
    pub requests_total: AtomicU64,
    /// Navigations that reached the readiness barrier
    pub navigations_total: AtomicU64,
    /// Trees extracted
    pub extractions_total: AtomicU64,
    /// Images captured
    pub captures_total: AtomicU64,
    /// Artifact sets written
    pub artifacts_total: AtomicU64,
    /// Failed requests
    pub errors_total: AtomicU64,
    /// Page contexts currently open
    pub active_contexts: AtomicU32,

    request_durations: RwLock<RingBuffer<Duration>>,
    errors_by_kind: RwLock<HashMap<&'static str, u64>>,
}

#[derive(Debug)]
struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    write_pos: usize,
}

impl<T: Clone + Ord> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            write_pos: 0,
        }
    }

    fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.write_pos] = value;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    /// Calculate percentile (0.0 to 1.0)
    fn percentile(&self, p: f64) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let mut sorted = self.data.clone();
        sorted.sort();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).cloned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            navigations_total: AtomicU64::new(0),
            extractions_total: AtomicU64::new(0),
            captures_total: AtomicU64::new(0),
            artifacts_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            active_contexts: AtomicU32::new(0),
            request_durations: RwLock::new(RingBuffer::new(MAX_HISTOGRAM_SAMPLES)),
            errors_by_kind: RwLock::new(HashMap::new()),
        }
    }

    /// Record a started request
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished request's duration
    pub fn record_duration(&self, duration: Duration) {
        if let Ok(mut durations) = self.request_durations.write() {
            durations.push(duration);
        }
    }

    /// Record a completed navigation
    pub fn record_navigation(&self) {
        self.navigations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an extracted tree
    pub fn record_extraction(&self) {
        self.extractions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a captured image
    pub fn record_capture(&self) {
        self.captures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a written artifact set
    pub fn record_artifacts(&self) {
        self.artifacts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed request
    pub fn record_error(&self, kind: ErrorKind) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut breakdown) = self.errors_by_kind.write() {
            *breakdown.entry(kind.as_str()).or_insert(0) += 1;
        }
    }

    /// Failures recorded for one kind
    pub fn errors_of(&self, kind: ErrorKind) -> u64 {
        self.errors_by_kind
            .read()
            .ok()
            .and_then(|b| b.get(kind.as_str()).copied())
            .unwrap_or(0)
    }

    /// Track a context being opened
    pub fn inc_active_contexts(&self) {
        self.active_contexts.fetch_add(1, Ordering::Relaxed);
    }

    /// Track a context being closed
    pub fn dec_active_contexts(&self) {
        self.active_contexts.fetch_sub(1, Ordering::Relaxed);
    }

    /// Request duration percentile (0.0 to 1.0)
    pub fn duration_percentile(&self, p: f64) -> Option<Duration> {
        self.request_durations
            .read()
            .ok()
            .and_then(|d| d.percentile(p))
    }

    /// Convert metrics to Prometheus text format
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("pagesnap_requests_total", &self.requests_total),
            ("pagesnap_navigations_total", &self.navigations_total),
            ("pagesnap_extractions_total", &self.extractions_total),
            ("pagesnap_captures_total", &self.captures_total),
            ("pagesnap_artifacts_total", &self.artifacts_total),
            ("pagesnap_errors_total", &self.errors_total),
        ];
        for (name, counter) in counters {
            output.push_str(&format!("{} {}\n", name, counter.load(Ordering::Relaxed)));
        }

        output.push_str(&format!(
            "pagesnap_active_contexts {}\n",
            self.active_contexts.load(Ordering::Relaxed)
        ));

        if let Ok(breakdown) = self.errors_by_kind.read() {
            let mut kinds: Vec<_> = breakdown.iter().collect();
            kinds.sort();
            for (kind, count) in kinds {
                output.push_str(&format!(
                    "pagesnap_errors_by_kind{{kind=\"{}\"}} {}\n",
                    kind, count
                ));
            }
        }

        for (label, p) in [("p50", 0.5), ("p95", 0.95), ("p99", 0.99)] {
            if let Some(d) = self.duration_percentile(p) {
                output.push_str(&format!(
                    "pagesnap_request_duration_{}_ms {}\n",
                    label,
                    d.as_millis()
                ));
            }
        }

        output
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get or initialize the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
