//! Performance monitor
//!
//! Thread-safe recorder of cache operation events with bounded, time-windowed
//! retention per metric category, and derived (not persisted) alerting.
//! Writes are best-effort and never block a cache operation; if a category's
//! ring buffer is full the oldest record is dropped and an overflow counter
//! is incremented, matching the backpressure policy in the spec's
//! concurrency model.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

const DEFAULT_MAX_MEASUREMENTS: usize = 1000;
const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);
const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 2.0;
const KEY_GEN_SLOW_FLOOR_MS: f64 = 100.0;
const CACHE_OP_SLOW_FLOOR_MS: f64 = 50.0;
const MEMORY_WARNING_BYTES: u64 = 50 * 1024 * 1024;
const MEMORY_CRITICAL_BYTES: u64 = 100 * 1024 * 1024;
const INVALIDATION_WARNING_PER_HOUR: f64 = 50.0;
const INVALIDATION_CRITICAL_PER_HOUR: f64 = 100.0;

/// Distinguishes what an `OperationRecord` represents so aggregates that
/// only make sense for reads (hit ratio) don't fold in writes or internal
/// timings recorded under the same ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Get,
    Set,
    Other,
}

#[derive(Debug, Clone)]
struct OperationRecord {
    at: Instant,
    operation: String,
    duration: Duration,
    hit: bool,
    text_length: usize,
    kind: OperationKind,
}

#[derive(Debug, Clone)]
struct RemoteEventRecord {
    at: Instant,
    reason: String,
}

#[derive(Debug, Clone)]
struct CompressionRecord {
    at: Instant,
    original: usize,
    compressed: usize,
    duration: Duration,
}

#[derive(Debug, Clone)]
struct MemoryRecord {
    at: Instant,
    l1_size_bytes: u64,
    entry_count: u64,
    remote_reported_bytes: Option<u64>,
}

#[derive(Debug, Clone)]
struct InvalidationRecord {
    at: Instant,
    pattern: String,
    keys_removed: u64,
    duration: Duration,
    reason: String,
}

struct Ring<T> {
    items: VecDeque<T>,
    cap: usize,
    dropped: u64,
}

impl<T> Ring<T> {
    fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap.min(256)),
            cap,
            dropped: 0,
        }
    }

    fn push(&mut self, item: T) {
        if self.items.len() >= self.cap {
            self.items.pop_front();
            self.dropped += 1;
        }
        self.items.push_back(item);
    }
}

/// Retention and alert threshold configuration for the monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub max_measurements: usize,
    pub window: Duration,
    pub threshold_multiplier: f64,
    pub memory_warning_bytes: u64,
    pub memory_critical_bytes: u64,
    pub invalidation_warning_per_hour: f64,
    pub invalidation_critical_per_hour: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_measurements: DEFAULT_MAX_MEASUREMENTS,
            window: DEFAULT_WINDOW,
            threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
            memory_warning_bytes: MEMORY_WARNING_BYTES,
            memory_critical_bytes: MEMORY_CRITICAL_BYTES,
            invalidation_warning_per_hour: INVALIDATION_WARNING_PER_HOUR,
            invalidation_critical_per_hour: INVALIDATION_CRITICAL_PER_HOUR,
        }
    }
}

struct MonitorState {
    operations: Ring<OperationRecord>,
    compressions: Ring<CompressionRecord>,
    memory: Ring<MemoryRecord>,
    invalidations: Ring<InvalidationRecord>,
    remote_unavailable: Ring<RemoteEventRecord>,
}

/// Thread-safe cache performance monitor.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    state: RwLock<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            state: RwLock::new(MonitorState {
                operations: Ring::new(config.max_measurements),
                compressions: Ring::new(config.max_measurements),
                memory: Ring::new(config.max_measurements),
                invalidations: Ring::new(config.max_measurements),
                remote_unavailable: Ring::new(config.max_measurements),
            }),
            config,
        }
    }

    pub async fn record_operation(&self, operation: &str, duration: Duration, hit: bool, text_length: usize) {
        self.record_operation_kind(operation, duration, hit, text_length, OperationKind::Get).await;
    }

    /// Record an operation tagged with an explicit `kind`, so `hit_ratio`
    /// can exclude writes (and other non-read timings) from its denominator
    /// while `latency_by_operation`/`slow_operations` still see every record.
    pub async fn record_operation_kind(
        &self,
        operation: &str,
        duration: Duration,
        hit: bool,
        text_length: usize,
        kind: OperationKind,
    ) {
        let mut state = self.state.write().await;
        state.operations.push(OperationRecord {
            at: Instant::now(),
            operation: operation.to_string(),
            duration,
            hit,
            text_length,
            kind,
        });
    }

    /// Record that the remote (L2) store was unreachable or returned an
    /// error for a single operation. Feeds the `remote_unavailable` alert
    /// (§5/§7 observability, seed scenario 6) without blocking the caller.
    pub async fn record_remote_unavailable(&self, reason: &str) {
        let mut state = self.state.write().await;
        state.remote_unavailable.push(RemoteEventRecord {
            at: Instant::now(),
            reason: reason.to_string(),
        });
    }

    pub async fn record_compression(&self, original: usize, compressed: usize, duration: Duration) {
        let mut state = self.state.write().await;
        state.compressions.push(CompressionRecord {
            at: Instant::now(),
            original,
            compressed,
            duration,
        });
    }

    pub async fn record_memory(&self, l1_size_bytes: u64, entry_count: u64, remote_reported_bytes: Option<u64>) {
        let mut state = self.state.write().await;
        state.memory.push(MemoryRecord {
            at: Instant::now(),
            l1_size_bytes,
            entry_count,
            remote_reported_bytes,
        });
    }

    pub async fn record_invalidation(&self, pattern: &str, keys_removed: u64, duration: Duration, reason: &str) {
        let mut state = self.state.write().await;
        state.invalidations.push(InvalidationRecord {
            at: Instant::now(),
            pattern: pattern.to_string(),
            keys_removed,
            duration,
            reason: reason.to_string(),
        });
    }

    /// Prune records older than the retention window and compute the
    /// aggregated report plus derived alerts.
    pub async fn stats(&self) -> MonitorReport {
        let mut state = self.state.write().await;
        let now = Instant::now();
        prune(&mut state.operations, now, self.config.window);
        prune(&mut state.compressions, now, self.config.window);
        prune(&mut state.memory, now, self.config.window);
        prune(&mut state.invalidations, now, self.config.window);
        prune(&mut state.remote_unavailable, now, self.config.window);

        let hit_ratio = hit_ratio(&state.operations.items);
        let latency_by_op = latency_by_operation(&state.operations.items);
        let compression = compression_summary(&state.compressions.items);
        let memory = memory_summary(&state.memory.items);
        let invalidation_rate_per_hour = invalidation_rate(&state.invalidations.items, self.config.window);
        let slow_operations = slow_operations(&state.operations.items, &latency_by_op, self.config.threshold_multiplier);
        let remote_unavailable_events = state.remote_unavailable.items.len() as u64;

        let alerts = derive_alerts(
            &self.config,
            memory.as_ref(),
            invalidation_rate_per_hour,
            &slow_operations,
            remote_unavailable_events,
        );

        MonitorReport {
            hit_ratio,
            latency_by_operation: latency_by_op,
            compression,
            memory,
            invalidation_rate_per_hour,
            slow_operations,
            remote_unavailable: remote_unavailable_events > 0,
            remote_unavailable_events,
            alerts,
            dropped_operation_records: state.operations.dropped,
            dropped_compression_records: state.compressions.dropped,
            dropped_memory_records: state.memory.dropped,
            dropped_invalidation_records: state.invalidations.dropped,
            dropped_remote_unavailable_records: state.remote_unavailable.dropped,
        }
    }
}

fn prune<T>(ring: &mut Ring<T>, now: Instant, window: Duration)
where
    T: HasTimestamp,
{
    while let Some(front) = ring.items.front() {
        if now.duration_since(front.at()) > window {
            ring.items.pop_front();
        } else {
            break;
        }
    }
}

trait HasTimestamp {
    fn at(&self) -> Instant;
}
impl HasTimestamp for OperationRecord {
    fn at(&self) -> Instant {
        self.at
    }
}
impl HasTimestamp for CompressionRecord {
    fn at(&self) -> Instant {
        self.at
    }
}
impl HasTimestamp for MemoryRecord {
    fn at(&self) -> Instant {
        self.at
    }
}
impl HasTimestamp for InvalidationRecord {
    fn at(&self) -> Instant {
        self.at
    }
}
impl HasTimestamp for RemoteEventRecord {
    fn at(&self) -> Instant {
        self.at
    }
}

/// Fraction of *get* operations that hit, ignoring set and other non-read
/// records so an interleaved write never drags the ratio down.
fn hit_ratio(records: &VecDeque<OperationRecord>) -> f64 {
    let gets: Vec<&OperationRecord> = records.iter().filter(|r| r.kind == OperationKind::Get).collect();
    if gets.is_empty() {
        return 0.0;
    }
    let hits = gets.iter().filter(|r| r.hit).count();
    hits as f64 / gets.len() as f64
}

/// Latency distribution for a single operation category.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyDistribution {
    pub count: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

fn latency_by_operation(records: &VecDeque<OperationRecord>) -> std::collections::HashMap<String, LatencyDistribution> {
    let mut grouped: std::collections::HashMap<String, Vec<f64>> = std::collections::HashMap::new();
    for record in records {
        grouped
            .entry(record.operation.clone())
            .or_default()
            .push(record.duration.as_secs_f64() * 1000.0);
    }

    grouped
        .into_iter()
        .map(|(op, mut samples)| (op, distribution(&mut samples)))
        .collect()
}

fn distribution(samples: &mut [f64]) -> LatencyDistribution {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let count = samples.len();
    let mean = if count > 0 {
        samples.iter().sum::<f64>() / count as f64
    } else {
        0.0
    };
    LatencyDistribution {
        count,
        mean_ms: mean,
        p50_ms: percentile(samples, 0.50),
        p95_ms: percentile(samples, 0.95),
        p99_ms: percentile(samples, 0.99),
        min_ms: samples.first().copied().unwrap_or(0.0),
        max_ms: samples.last().copied().unwrap_or(0.0),
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Compression efficiency summary across the retention window.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionSummary {
    pub samples: usize,
    pub average_ratio: f64,
    pub bytes_saved: i64,
    pub average_duration_ms: f64,
}

fn compression_summary(records: &VecDeque<CompressionRecord>) -> Option<CompressionSummary> {
    if records.is_empty() {
        return None;
    }
    let samples = records.len();
    let total_original: i64 = records.iter().map(|r| r.original as i64).sum();
    let total_compressed: i64 = records.iter().map(|r| r.compressed as i64).sum();
    let average_ratio = if total_original > 0 {
        total_compressed as f64 / total_original as f64
    } else {
        1.0
    };
    let average_duration_ms = records.iter().map(|r| r.duration.as_secs_f64() * 1000.0).sum::<f64>() / samples as f64;

    Some(CompressionSummary {
        samples,
        average_ratio,
        bytes_saved: total_original - total_compressed,
        average_duration_ms,
    })
}

/// Latest memory snapshot plus a simple trend indicator.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySummary {
    pub l1_size_bytes: u64,
    pub entry_count: u64,
    pub remote_reported_bytes: Option<u64>,
    pub trend: MemoryTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryTrend {
    Growing,
    Shrinking,
    Stable,
    Unknown,
}

fn memory_summary(records: &VecDeque<MemoryRecord>) -> Option<MemorySummary> {
    let latest = records.back()?;
    let trend = if records.len() < 2 {
        MemoryTrend::Unknown
    } else {
        let earliest = records.front().unwrap();
        if latest.l1_size_bytes > earliest.l1_size_bytes {
            MemoryTrend::Growing
        } else if latest.l1_size_bytes < earliest.l1_size_bytes {
            MemoryTrend::Shrinking
        } else {
            MemoryTrend::Stable
        }
    };

    Some(MemorySummary {
        l1_size_bytes: latest.l1_size_bytes,
        entry_count: latest.entry_count,
        remote_reported_bytes: latest.remote_reported_bytes,
        trend,
    })
}

fn invalidation_rate(records: &VecDeque<InvalidationRecord>, window: Duration) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let hours = (window.as_secs_f64() / 3600.0).max(1.0 / 3600.0);
    records.len() as f64 / hours
}

/// A single slow-operation observation.
#[derive(Debug, Clone, Serialize)]
pub struct SlowOperation {
    pub operation: String,
    pub duration_ms: f64,
    pub category_mean_ms: f64,
}

fn slow_operations(
    records: &VecDeque<OperationRecord>,
    latency_by_op: &std::collections::HashMap<String, LatencyDistribution>,
    threshold_multiplier: f64,
) -> Vec<SlowOperation> {
    let mut slow = Vec::new();
    for record in records {
        let duration_ms = record.duration.as_secs_f64() * 1000.0;
        let Some(dist) = latency_by_op.get(&record.operation) else {
            continue;
        };
        let floor = if record.operation == "key_generation" {
            KEY_GEN_SLOW_FLOOR_MS
        } else {
            CACHE_OP_SLOW_FLOOR_MS
        };
        let threshold = (dist.mean_ms * threshold_multiplier).max(floor);
        if duration_ms >= threshold {
            slow.push(SlowOperation {
                operation: record.operation.clone(),
                duration_ms,
                category_mean_ms: dist.mean_ms,
            });
        }
    }
    slow
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A derived alert, computed fresh on every `stats()` call.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub kind: String,
    pub message: String,
}

fn derive_alerts(
    config: &MonitorConfig,
    memory: Option<&MemorySummary>,
    invalidation_rate_per_hour: f64,
    slow_operations: &[SlowOperation],
    remote_unavailable_events: u64,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(memory) = memory {
        if memory.l1_size_bytes >= config.memory_critical_bytes {
            alerts.push(Alert {
                severity: AlertSeverity::Critical,
                kind: "memory_usage".to_string(),
                message: format!("L1 memory usage {} bytes exceeds critical threshold", memory.l1_size_bytes),
            });
        } else if memory.l1_size_bytes >= config.memory_warning_bytes {
            alerts.push(Alert {
                severity: AlertSeverity::Warning,
                kind: "memory_usage".to_string(),
                message: format!("L1 memory usage {} bytes exceeds warning threshold", memory.l1_size_bytes),
            });
        }
    }

    if invalidation_rate_per_hour >= config.invalidation_critical_per_hour {
        alerts.push(Alert {
            severity: AlertSeverity::Critical,
            kind: "invalidation_rate".to_string(),
            message: format!("invalidation rate {:.1}/hour exceeds critical threshold", invalidation_rate_per_hour),
        });
    } else if invalidation_rate_per_hour >= config.invalidation_warning_per_hour {
        alerts.push(Alert {
            severity: AlertSeverity::Warning,
            kind: "invalidation_rate".to_string(),
            message: format!("invalidation rate {:.1}/hour exceeds warning threshold", invalidation_rate_per_hour),
        });
    }

    if !slow_operations.is_empty() {
        alerts.push(Alert {
            severity: AlertSeverity::Warning,
            kind: "slow_operations".to_string(),
            message: format!("{} slow operation(s) detected in the retention window", slow_operations.len()),
        });
    }

    if remote_unavailable_events > 0 {
        alerts.push(Alert {
            severity: AlertSeverity::Warning,
            kind: "remote_unavailable".to_string(),
            message: format!(
                "remote cache store was unreachable {} time(s) in the retention window; serving from L1 only",
                remote_unavailable_events
            ),
        });
    }

    alerts
}

/// Aggregated statistics report returned by `PerformanceMonitor::stats`.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub hit_ratio: f64,
    pub latency_by_operation: std::collections::HashMap<String, LatencyDistribution>,
    pub compression: Option<CompressionSummary>,
    pub memory: Option<MemorySummary>,
    pub invalidation_rate_per_hour: f64,
    pub slow_operations: Vec<SlowOperation>,
    /// `true` when the remote (L2) store reported an error or was degraded
    /// to L1-only at least once within the retention window.
    pub remote_unavailable: bool,
    pub remote_unavailable_events: u64,
    pub alerts: Vec<Alert>,
    pub dropped_operation_records: u64,
    pub dropped_compression_records: u64,
    pub dropped_memory_records: u64,
    pub dropped_invalidation_records: u64,
    pub dropped_remote_unavailable_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_ratio_is_monotonic_on_warm_repeats() {
        let monitor = PerformanceMonitor::new(MonitorConfig::default());
        monitor.record_operation("summarize", Duration::from_millis(5), false, 10).await;
        let after_miss = monitor.stats().await.hit_ratio;
        monitor.record_operation("summarize", Duration::from_millis(1), true, 10).await;
        let after_hit = monitor.stats().await.hit_ratio;
        assert!(after_hit >= after_miss);
        assert_eq!(after_hit, 0.5);
    }

    #[tokio::test]
    async fn retention_caps_record_count() {
        let config = MonitorConfig {
            max_measurements: 5,
            ..MonitorConfig::default()
        };
        let monitor = PerformanceMonitor::new(config);
        for _ in 0..20 {
            monitor.record_operation("summarize", Duration::from_millis(1), true, 1).await;
        }
        let state = monitor.state.read().await;
        assert!(state.operations.items.len() <= 5);
        assert!(state.operations.dropped >= 15);
    }

    #[tokio::test]
    async fn memory_alert_fires_above_critical_threshold() {
        let monitor = PerformanceMonitor::new(MonitorConfig::default());
        monitor.record_memory(200 * 1024 * 1024, 10, None).await;
        let report = monitor.stats().await;
        assert!(report.alerts.iter().any(|a| a.kind == "memory_usage" && a.severity == AlertSeverity::Critical));
    }

    #[tokio::test]
    async fn retention_prunes_entries_older_than_window() {
        let config = MonitorConfig {
            window: Duration::from_millis(20),
            ..MonitorConfig::default()
        };
        let monitor = PerformanceMonitor::new(config);
        monitor.record_operation("summarize", Duration::from_millis(1), true, 1).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let report = monitor.stats().await;
        assert_eq!(report.hit_ratio, 0.0);
    }

    #[tokio::test]
    async fn hit_ratio_ignores_interleaved_set_records() {
        let monitor = PerformanceMonitor::new(MonitorConfig::default());
        monitor.record_operation("summarize", Duration::from_millis(5), false, 10).await;
        monitor
            .record_operation_kind("summarize", Duration::from_millis(2), false, 10, OperationKind::Set)
            .await;
        monitor.record_operation("summarize", Duration::from_millis(1), true, 10).await;
        let report = monitor.stats().await;
        assert_eq!(report.hit_ratio, 0.5);
    }

    #[tokio::test]
    async fn remote_unavailable_event_surfaces_as_a_warning_alert() {
        let monitor = PerformanceMonitor::new(MonitorConfig::default());
        monitor.record_remote_unavailable("connection refused").await;
        let report = monitor.stats().await;
        assert!(report.remote_unavailable);
        assert_eq!(report.remote_unavailable_events, 1);
        assert!(report.alerts.iter().any(|a| a.kind == "remote_unavailable" && a.severity == AlertSeverity::Warning));
    }

    #[tokio::test]
    async fn key_generation_floor_applies_to_key_generation_records_only() {
        let monitor = PerformanceMonitor::new(MonitorConfig::default());
        monitor
            .record_operation_kind("key_generation", Duration::from_millis(120), true, 5, OperationKind::Other)
            .await;
        let report = monitor.stats().await;
        assert_eq!(report.slow_operations.len(), 1);
        assert_eq!(report.slow_operations[0].operation, "key_generation");
    }
}
