use crate::call::bounded_query;
use crate::traits::{FeatureQuery, FeatureService};
use std::time::Duration;
use stormquery_core::{CapPolicy, EntityEndpoint, Feature, FilterCriteria, QueryPredicate, Result};
use tracing::debug;

/// Primary-layer rows in service order, truncated to the cap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrimaryRows {
    pub features: Vec<Feature>,
    pub limit_exceeded: bool,
}

/// Row cap for a request. Filtered lookups use the caller limit or the
/// endpoint's default; category scans and permitted unfiltered scans are
/// raised to the larger policy caps. Nothing exceeds `caps.max`.
pub fn effective_cap(criteria: &FilterCriteria, endpoint: &EntityEndpoint, caps: &CapPolicy) -> usize {
    let base = criteria.limit.unwrap_or(endpoint.default_cap);
    let cap = if criteria.category.is_active() && endpoint.categories.is_some() {
        base.max(caps.category)
    } else if criteria.allow_unfiltered && !criteria.has_filters() {
        base.max(caps.unfiltered)
    } else {
        base
    };
    cap.min(caps.max).max(1)
}

/// Runs `predicate` against the primary layer asking for `cap + 1` rows so
/// truncation can be detected without a count query.
pub async fn execute(
    service: &dyn FeatureService,
    layer_url: &str,
    predicate: QueryPredicate,
    cap: usize,
    out_sr: u32,
    timeout: Duration,
) -> Result<PrimaryRows> {
    let q = FeatureQuery::features(predicate, out_sr).with_record_count(cap.saturating_add(1));
    let fc = bounded_query(service, "primary", layer_url, &q, timeout).await?;
    let mut features = fc.features;
    let limit_exceeded = features.len() > cap;
    features.truncate(cap);
    debug!(layer = layer_url, cap, rows = features.len(), limit_exceeded, "primary query");
    Ok(PrimaryRows {
        features,
        limit_exceeded,
    })
}
