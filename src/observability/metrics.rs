//! Atomic per-provider counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::budget::COST_SCALE_FACTOR;

/// Thread-safe atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Simple histogram using fixed buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    bucket_bounds: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bucket_bounds: Vec<f64>) -> Self {
        let buckets = (0..=bucket_bounds.len())
            .map(|_| AtomicU64::new(0))
            .collect();
        Self {
            buckets,
            bucket_bounds,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn default_latency() -> Self {
        Self::new(vec![
            10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
        ])
    }

    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .bucket_bounds
            .iter()
            .position(|&bound| value <= bound)
            .unwrap_or(self.bucket_bounds.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // scaled by 1000 to keep sub-millisecond precision
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    pub fn sum_ms(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn mean_ms(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum_ms() / n as f64,
        }
    }
}

fn to_micros(cost: Decimal) -> u64 {
    cost.max(Decimal::ZERO)
        .checked_mul(COST_SCALE_FACTOR)
        .and_then(|micros| micros.round().to_u64())
        .unwrap_or(u64::MAX)
}

/// Counters for one provider.
#[derive(Debug)]
pub struct ProviderMetrics {
    pub attempts: Counter,
    pub successes: Counter,
    pub failures: Counter,
    pub skipped_unavailable: Counter,
    pub skipped_budget: Counter,
    pub cost_total_micros: Counter,
    pub latency_ms: Histogram,
}

impl Default for ProviderMetrics {
    fn default() -> Self {
        Self {
            attempts: Counter::new(),
            successes: Counter::new(),
            failures: Counter::new(),
            skipped_unavailable: Counter::new(),
            skipped_budget: Counter::new(),
            cost_total_micros: Counter::new(),
            latency_ms: Histogram::default_latency(),
        }
    }
}

impl ProviderMetrics {
    pub fn total_cost(&self) -> Decimal {
        Decimal::from(self.cost_total_micros.get()) / COST_SCALE_FACTOR
    }

    pub fn success_rate(&self) -> f64 {
        let invoked = self.successes.get() + self.failures.get();
        if invoked == 0 {
            return 0.0;
        }
        self.successes.get() as f64 / invoked as f64
    }
}

/// Point-in-time copy of [`ProviderMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    pub provider: String,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub skipped_unavailable: u64,
    pub skipped_budget: u64,
    pub total_cost: Decimal,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
}

/// Orchestrator-wide metrics keyed by provider name.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    pub requests_total: Counter,
    pub requests_success: Counter,
    pub requests_exhausted: Counter,
    pub requests_aborted: Counter,
    providers: DashMap<String, Arc<ProviderMetrics>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self, name: &str) -> Arc<ProviderMetrics> {
        if let Some(m) = self.providers.get(name) {
            return Arc::clone(m.value());
        }
        Arc::clone(self.providers.entry(name.to_string()).or_default().value())
    }

    pub fn record_unavailable(&self, provider: &str) {
        self.provider(provider).skipped_unavailable.inc();
    }

    pub fn record_over_budget(&self, provider: &str) {
        self.provider(provider).skipped_budget.inc();
    }

    pub fn record_invocation(&self, provider: &str, success: bool, cost: Decimal, latency: Duration) {
        let m = self.provider(provider);
        m.attempts.inc();
        if success {
            m.successes.inc();
        } else {
            m.failures.inc();
        }
        m.cost_total_micros.add(to_micros(cost));
        m.latency_ms.observe(latency.as_secs_f64() * 1000.0);
    }

    pub fn stats(&self, provider: &str) -> Option<ProviderStats> {
        let m = self.providers.get(provider)?;
        Some(ProviderStats {
            provider: provider.to_string(),
            attempts: m.attempts.get(),
            successes: m.successes.get(),
            failures: m.failures.get(),
            skipped_unavailable: m.skipped_unavailable.get(),
            skipped_budget: m.skipped_budget.get(),
            total_cost: m.total_cost(),
            success_rate: m.success_rate(),
            avg_latency_ms: m.latency_ms.mean_ms(),
        })
    }

    pub fn all_stats(&self) -> Vec<ProviderStats> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names.iter().filter_map(|n| self.stats(n)).collect()
    }
}
