use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

pub static REMOTE_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "remote_requests_total",
        "Feature service requests by operation and outcome",
        &["op", "outcome"]
    )
    .unwrap()
});

pub static REMOTE_REQUEST_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "remote_request_seconds",
        "Feature service request latency",
        &["op"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

pub static VOCABULARY_REFRESH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vocabulary_refresh_total",
        "Vocabulary field refreshes by result",
        &["field", "result"]
    )
    .unwrap()
});

pub static GEOMETRY_BATCHES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "geometry_batches_total",
        "Per-layer geometry batches by result",
        &["result"]
    )
    .unwrap()
});

pub static FEATURE_QUERIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feature_queries_total",
        "Feature queries by entity kind and outcome",
        &["kind", "outcome"]
    )
    .unwrap()
});
