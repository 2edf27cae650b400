// Metrics and observability module
// This file handles collection and reporting of upstream call latency,
// route query outcomes, hop failures and sanity-filter rejections
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

pub static REQ_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "aggr_request_latency_seconds",
        "latency for upstream calls",
        &["service", "method"]
    )
    .unwrap()
});

pub static REQ_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aggr_request_errors_total",
        "errors by upstream",
        &["service", "method"]
    )
    .unwrap()
});

pub static ROUTE_QUERIES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aggr_route_queries_total",
        "route queries by outcome",
        &["outcome"]
    )
    .unwrap()
});

pub static QUERY_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "aggr_route_query_seconds",
        "end-to-end route query latency"
    )
    .unwrap()
});

pub static HOP_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aggr_hop_failures_total",
        "hop quotes that produced no amount",
        &["venue", "reason"]
    )
    .unwrap()
});

pub static SANITY_REJECTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aggr_sanity_rejections_total",
        "quotes rejected by the plausibility filter",
        &["venue"]
    )
    .unwrap()
});

/// Render the default registry in the Prometheus text format.
pub fn render() -> String {
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
