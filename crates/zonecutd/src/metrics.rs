use axum::{http::StatusCode, routing};
use prometheus::{
    opts, register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::net::SocketAddr;

use zonecut_resolver::metrics::Metrics;

pub const RESPONSE_TIME_BUCKETS: &[f64] = &[
    0.0010, // 1   ms
    0.0050, // 5   ms
    0.0100, // 10  ms
    0.0250, // 25  ms
    0.0500, // 50  ms
    0.1000, // 100 ms
    0.2500, // 250 ms
    0.5000, // 500 ms
    1.0000, // 1    s
    2.5000, // 2.5  s
    5.0000, // 5    s
    10.000, // 10   s
];

pub const OUTCOME_ANSWER: &str = "answer";
pub const OUTCOME_CACHED: &str = "cached";
pub const OUTCOME_NAME_ERROR: &str = "name_error";
pub const OUTCOME_FAILURE: &str = "failure";
pub const OUTCOME_INVALID: &str = "invalid";

pub static ZONECUT_REQUESTS_TOTAL: std::sync::LazyLock<IntCounterVec> =
    std::sync::LazyLock::new(|| {
        register_int_counter_vec!(
            opts!(
                "zonecut_requests_total",
                "Total number of requests received, by outcome."
            ),
            &["outcome"]
        )
        .unwrap()
    });

pub static ZONECUT_RESPONSE_TIME_SECONDS: std::sync::LazyLock<Histogram> =
    std::sync::LazyLock::new(|| {
        register_histogram!(
            "zonecut_response_time_seconds",
            "Response time of requests, whether valid or invalid.",
            RESPONSE_TIME_BUCKETS.to_vec()
        )
        .unwrap()
    });

pub static ZONECUT_CACHE_HIT_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "zonecut_cache_hit_total",
            "Total number of requests answered from the cache."
        ))
        .unwrap()
    });

pub static ZONECUT_CACHE_MISS_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "zonecut_cache_miss_total",
            "Total number of requests which needed network queries."
        ))
        .unwrap()
    });

pub static ZONECUT_NAMESERVER_HIT_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "zonecut_nameserver_hit_total",
            "Total number of hits when calling an upstream nameserver."
        ))
        .unwrap()
    });

pub static ZONECUT_NAMESERVER_MISS_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "zonecut_nameserver_miss_total",
            "Total number of misses when calling an upstream nameserver."
        ))
        .unwrap()
    });

pub static ZONECUT_ZONE_CUTS_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "zonecut_zone_cuts_total",
            "Total number of zone cuts discovered."
        ))
        .unwrap()
    });

pub static ZONECUT_SKIPPED_LABELS_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "zonecut_skipped_labels_total",
            "Total number of labels not queried because they are known not to be zone cuts."
        ))
        .unwrap()
    });

pub static ZONECUT_NAME_ERRORS_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter!(opts!(
            "zonecut_name_errors_total",
            "Total number of name errors received from upstream nameservers."
        ))
        .unwrap()
    });

pub static CACHE_SIZE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge!(opts!("cache_size", "Number of names in the cache.")).unwrap()
});

/// Add the counters of one resolution to the Prometheus metrics.
pub fn record_resolution(metrics: &Metrics) {
    ZONECUT_CACHE_HIT_TOTAL.inc_by(metrics.cache_hits);
    ZONECUT_CACHE_MISS_TOTAL.inc_by(metrics.cache_misses);
    ZONECUT_NAMESERVER_HIT_TOTAL.inc_by(metrics.nameserver_hits);
    ZONECUT_NAMESERVER_MISS_TOTAL.inc_by(metrics.nameserver_misses);
    ZONECUT_ZONE_CUTS_TOTAL.inc_by(metrics.zone_cuts);
    ZONECUT_SKIPPED_LABELS_TOTAL.inc_by(metrics.skipped_labels);
    ZONECUT_NAME_ERRORS_TOTAL.inc_by(metrics.name_errors);
}

async fn get_metrics() -> (StatusCode, String) {
    match TextEncoder::new().encode_to_string(&prometheus::gather()) {
        Ok(metrics_str) => (StatusCode::OK, metrics_str),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub async fn serve_prometheus_endpoint_task(address: SocketAddr) -> std::io::Result<()> {
    let app = axum::Router::new().route("/metrics", routing::get(get_metrics));
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
