use crate::metrics::{REMOTE_REQUESTS_TOTAL, REMOTE_REQUEST_SECONDS};
use crate::traits::{FeatureQuery, FeatureService};
use std::time::Duration;
use stormquery_core::{FeatureCollection, RemoteError, Result};
use tracing::warn;

/// Single choke point for remote calls: bounds the call by `timeout` and
/// records latency and outcome under `op`.
pub async fn bounded_query(
    service: &dyn FeatureService,
    op: &'static str,
    layer_url: &str,
    query: &FeatureQuery,
    timeout: Duration,
) -> Result<FeatureCollection> {
    let timer = REMOTE_REQUEST_SECONDS.with_label_values(&[op]).start_timer();
    let res = match tokio::time::timeout(timeout, service.query(layer_url, query)).await {
        Ok(r) => r,
        Err(_) => Err(RemoteError::Timeout(timeout.as_secs())),
    };
    timer.observe_duration();
    let outcome = match &res {
        Ok(_) => "ok",
        Err(RemoteError::Timeout(_)) => "timeout",
        Err(RemoteError::Service { .. }) => "service_error",
        Err(_) => "error",
    };
    REMOTE_REQUESTS_TOTAL
        .with_label_values(&[op, outcome])
        .inc();
    if let Err(e) = &res {
        warn!(op, layer = layer_url, error = %e, "remote query failed");
    }
    res
}
