//! # Statistics Collector
//!
//! Running counters updated by the dispatcher at fixed points of the request pipeline,
//! plus per-route and per-service roll-ups. Nothing here is computed lazily except the
//! derived rates of a [`StatsSnapshot`].
//!
//! All state sits behind one `parking_lot::Mutex`. Every update is a single short
//! critical section, so a running-average update for a route can never interleave with
//! another update of the same route, and `reset()` is atomic from the caller's view.
//!
//! Each update is mirrored to the `metrics` facade so a Prometheus exporter (when
//! installed) sees the same numbers without a second bookkeeping path.

use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Roll-up for one route key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteStats {
    pub count: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
    /// Completed samples folded into `avg_latency_ms`
    #[serde(skip)]
    completed: u64,
}

/// Roll-up for one logical service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub requests: u64,
    pub errors: u64,
    pub circuit_trips: u64,
}

#[derive(Debug, Default)]
struct StatsState {
    requests_total: u64,
    succeeded: u64,
    failed: u64,
    cache_hits: u64,
    aggregated_count: u64,
    transformed_count: u64,
    total_latency_ms: u64,
    per_route: HashMap<String, RouteStats>,
    per_service: HashMap<String, ServiceStats>,
}

/// Point-in-time, read-only view of the collected statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub requests_total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cache_hits: u64,
    pub aggregated_count: u64,
    pub transformed_count: u64,
    pub total_latency_ms: u64,
    /// `cache_hits / requests_total * 100` with two decimals, `"0%"` before any request
    pub cache_hit_rate: String,
    pub success_rate: String,
    /// `total_latency_ms / requests_total`, rounded
    pub average_response_time: u64,
    pub per_route: BTreeMap<String, RouteStats>,
    pub per_service: BTreeMap<String, ServiceStats>,
}

/// Thread-safe statistics collector owned by the gateway context
#[derive(Debug, Default)]
pub struct StatsCollector {
    state: Mutex<StatsState>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unmatched request: counts as failed but never enters `requests_total`
    pub fn record_route_not_found(&self) {
        self.state.lock().failed += 1;
        counter!("gateway_requests_failed_total", "reason" => "route_not_found").increment(1);
    }

    /// Matched request entering the pipeline
    pub fn record_request(&self, route: &str) {
        {
            let mut state = self.state.lock();
            state.requests_total += 1;
            state.per_route.entry(route.to_string()).or_default().count += 1;
        }
        counter!("gateway_requests_total", "route" => route.to_string()).increment(1);
    }

    pub fn record_cache_hit(&self, route: &str) {
        self.state.lock().cache_hits += 1;
        counter!("gateway_cache_hits_total", "route" => route.to_string()).increment(1);
    }

    pub fn record_aggregated(&self) {
        self.state.lock().aggregated_count += 1;
    }

    pub fn record_transformed(&self) {
        self.state.lock().transformed_count += 1;
    }

    /// Close out a matched request
    ///
    /// The route average follows `new = (old * (n - 1) + elapsed) / n` where `n` counts
    /// completed samples of that route.
    pub fn record_completion(&self, route: &str, elapsed_ms: u64, success: bool) {
        {
            let mut state = self.state.lock();
            if success {
                state.succeeded += 1;
            } else {
                state.failed += 1;
            }
            state.total_latency_ms += elapsed_ms;

            let route_stats = state.per_route.entry(route.to_string()).or_default();
            if !success {
                route_stats.errors += 1;
            }
            route_stats.completed += 1;
            let n = route_stats.completed as f64;
            route_stats.avg_latency_ms =
                (route_stats.avg_latency_ms * (n - 1.0) + elapsed_ms as f64) / n;
        }

        let outcome = if success { "success" } else { "failure" };
        histogram!(
            "gateway_request_duration_seconds",
            "route" => route.to_string(),
            "outcome" => outcome
        )
        .record(elapsed_ms as f64 / 1000.0);
    }

    /// One logical call towards a service (retries are not counted again)
    pub fn record_service_request(&self, service: &str) {
        self.state
            .lock()
            .per_service
            .entry(service.to_string())
            .or_default()
            .requests += 1;
    }

    pub fn record_service_error(&self, service: &str, kind: &'static str) {
        self.state
            .lock()
            .per_service
            .entry(service.to_string())
            .or_default()
            .errors += 1;
        counter!(
            "gateway_upstream_errors_total",
            "service" => service.to_string(),
            "kind" => kind
        )
        .increment(1);
    }

    pub fn record_circuit_trip(&self, service: &str) {
        self.state
            .lock()
            .per_service
            .entry(service.to_string())
            .or_default()
            .circuit_trips += 1;
        counter!("gateway_circuit_trips_total", "service" => service.to_string()).increment(1);
    }

    /// Take a consistent snapshot with derived rates
    pub fn snapshot(&self) -> StatsSnapshot {
        let state = self.state.lock();
        let total = state.requests_total;

        StatsSnapshot {
            requests_total: total,
            succeeded: state.succeeded,
            failed: state.failed,
            cache_hits: state.cache_hits,
            aggregated_count: state.aggregated_count,
            transformed_count: state.transformed_count,
            total_latency_ms: state.total_latency_ms,
            cache_hit_rate: format_rate(state.cache_hits, total),
            success_rate: format_rate(state.succeeded, total),
            average_response_time: if total == 0 {
                0
            } else {
                (state.total_latency_ms as f64 / total as f64).round() as u64
            },
            per_route: state
                .per_route
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            per_service: state
                .per_service
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Zero every counter and clear both keyed maps
    pub fn reset(&self) {
        *self.state.lock() = StatsState::default();
    }
}

fn format_rate(part: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", part as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_rates() {
        let snapshot = StatsCollector::new().snapshot();
        assert_eq!(snapshot.cache_hit_rate, "0%");
        assert_eq!(snapshot.success_rate, "0%");
        assert_eq!(snapshot.average_response_time, 0);
    }

    #[test]
    fn test_success_rate_and_reset() {
        let stats = StatsCollector::new();
        for i in 0..10 {
            stats.record_request("GET:/api/search");
            stats.record_completion("GET:/api/search", 10, i >= 3);
        }
        stats.record_service_request("search");
        stats.record_service_error("search", "upstream_error");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests_total, 10);
        assert_eq!(snapshot.success_rate, "70.00%");
        assert_eq!(snapshot.per_route["GET:/api/search"].errors, 3);

        stats.reset();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests_total, 0);
        assert!(snapshot.per_route.is_empty());
        assert!(snapshot.per_service.is_empty());
    }

    #[test]
    fn test_route_running_average() {
        let stats = StatsCollector::new();
        for elapsed in [10, 20, 60] {
            stats.record_request("GET:/a");
            stats.record_completion("GET:/a", elapsed, true);
        }
        let snapshot = stats.snapshot();
        assert!((snapshot.per_route["GET:/a"].avg_latency_ms - 30.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.average_response_time, 30);
        assert_eq!(snapshot.total_latency_ms, 90);
    }

    #[test]
    fn test_cache_hit_rate_has_two_decimals() {
        let stats = StatsCollector::new();
        for _ in 0..3 {
            stats.record_request("GET:/a");
        }
        stats.record_cache_hit("GET:/a");
        assert_eq!(stats.snapshot().cache_hit_rate, "33.33%");
    }

    #[test]
    fn test_route_not_found_only_counts_failed() {
        let stats = StatsCollector::new();
        stats.record_route_not_found();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.requests_total, 0);
        assert!(snapshot.per_route.is_empty());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let stats = std::sync::Arc::new(StatsCollector::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = std::sync::Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record_request("GET:/a");
                        stats.record_completion("GET:/a", 4, true);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests_total, 1000);
        assert_eq!(snapshot.per_route["GET:/a"].count, 1000);
        assert!((snapshot.per_route["GET:/a"].avg_latency_ms - 4.0).abs() < 1e-9);
    }
}
