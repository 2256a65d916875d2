//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): responses written, by status
//! - `cache_lookups_total` (counter): cache lookups, by result (hit/miss/shared)
//! - `cache_entries` (gauge): current cache size
//! - `cache_evictions_total` (counter): entries dropped by the LRU bound
//! - `generator_calls_total` (counter): provider calls, by outcome
//! - `generator_duration_seconds` (histogram): provider latency
//! - `active_connections` (gauge): connections being handled
//! - `rate_limited_total` (counter): requests refused with 429
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder it is a no-op
//! - The Prometheus exporter is only started when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_response(status: u16) {
    ::metrics::counter!("http_requests_total", "status" => status.to_string()).increment(1);
}

/// `result` is one of `hit`, `miss` or `shared`.
pub fn record_cache_lookup(result: &'static str) {
    ::metrics::counter!("cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    ::metrics::gauge!("cache_entries").set(entries as f64);
}

pub fn record_cache_evictions(count: usize) {
    ::metrics::counter!("cache_evictions_total").increment(count as u64);
}

pub fn record_generation(outcome: &'static str, started: Instant) {
    ::metrics::counter!("generator_calls_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("generator_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("rate_limited_total").increment(1);
}

pub fn record_active_connections(active: u64) {
    ::metrics::gauge!("active_connections").set(active as f64);
}
