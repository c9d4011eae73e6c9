//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub swaps_attempted: IntCounter,
    pub swaps_confirmed: IntCounter,
    pub swaps_rejected: IntCounter,
    pub swaps_failed: IntCounter,
    pub quote_failures: IntCounter,
    pub submissions: IntCounter,
    /// Failures labelled by `SwapError::category`
    pub errors_by_category: IntCounterVec,

    // Gauges
    pub swaps_in_flight: IntGauge,

    // Histograms
    pub quote_latency: Histogram,
    pub build_latency: Histogram,
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let swaps_attempted = IntCounter::with_opts(Opts::new(
            "swaps_attempted_total",
            "Total number of swaps attempted",
        ))?;

        let swaps_confirmed = IntCounter::with_opts(Opts::new(
            "swaps_confirmed_total",
            "Number of swaps confirmed on-chain",
        ))?;

        let swaps_rejected = IntCounter::with_opts(Opts::new(
            "swaps_rejected_total",
            "Number of swaps rejected by the risk guard",
        ))?;

        let swaps_failed =
            IntCounter::with_opts(Opts::new("swaps_failed_total", "Number of failed swaps"))?;

        let quote_failures = IntCounter::with_opts(Opts::new(
            "quote_failures_total",
            "Number of failed price oracle calls",
        ))?;

        let submissions = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Number of signed transactions broadcast",
        ))?;

        let errors_by_category = IntCounterVec::new(
            Opts::new("swap_errors_total", "Swap failures by error category"),
            &["category"],
        )?;

        let swaps_in_flight = IntGauge::with_opts(Opts::new(
            "swaps_in_flight",
            "Number of swaps currently executing",
        ))?;

        let quote_latency = Histogram::with_opts(
            HistogramOpts::new("quote_latency_seconds", "Price oracle latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Transaction build latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from broadcast to terminal status",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        registry.register(Box::new(swaps_attempted.clone()))?;
        registry.register(Box::new(swaps_confirmed.clone()))?;
        registry.register(Box::new(swaps_rejected.clone()))?;
        registry.register(Box::new(swaps_failed.clone()))?;
        registry.register(Box::new(quote_failures.clone()))?;
        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(errors_by_category.clone()))?;
        registry.register(Box::new(swaps_in_flight.clone()))?;
        registry.register(Box::new(quote_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            swaps_attempted,
            swaps_confirmed,
            swaps_rejected,
            swaps_failed,
            quote_failures,
            submissions,
            errors_by_category,
            swaps_in_flight,
            quote_latency,
            build_latency,
            confirmation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a failure under its error category
    pub fn record_error(&self, category: &str) {
        self.errors_by_category.with_label_values(&[category]).inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Keeps `swaps_in_flight` accurate on every exit path
pub struct InFlightGuard;

impl InFlightGuard {
    pub fn new() -> Self {
        metrics().swaps_in_flight.inc();
        Self
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        metrics().swaps_in_flight.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_swap_metrics() {
        let m = Metrics::new().unwrap();
        m.swaps_attempted.inc();
        m.record_error("risk");

        let text = m.export().unwrap();
        assert!(text.contains("swaps_attempted_total 1"));
        assert!(text.contains("swap_errors_total{category=\"risk\"} 1"));
    }

    #[test]
    fn test_timer_observes() {
        let m = Metrics::new().unwrap();
        let timer = Timer::new();
        timer.observe_duration(&m.quote_latency);
        assert_eq!(m.quote_latency.get_sample_count(), 1);
    }
}
