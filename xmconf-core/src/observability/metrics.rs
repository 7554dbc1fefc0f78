//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters

use metrics::{counter, describe_counter};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    // Cache metrics
    describe_counter!("xmconf_cache_refresh_total", "Directory scans performed by the config cache");
    describe_counter!(
        "xmconf_cache_parse_failures_total",
        "Configuration files skipped during a scan because they failed to parse"
    );
    describe_counter!(
        "xmconf_cache_reaped_total",
        "Cache entries removed because their file disappeared"
    );
    describe_counter!("xmconf_cache_lookup_total", "Cache lookups (by result: hit, miss)");

    // Store metrics
    describe_counter!(
        "xmconf_store_writes_total",
        "Configuration files written by the store (by operation)"
    );
    describe_counter!(
        "xmconf_store_write_failures_total",
        "Failed configuration file writes (by operation)"
    );
}

/// Record a persisted definition.
pub fn record_write(operation: &'static str, ok: bool) {
    if ok {
        counter!("xmconf_store_writes_total", "operation" => operation).increment(1);
    } else {
        counter!("xmconf_store_write_failures_total", "operation" => operation).increment(1);
    }
}
