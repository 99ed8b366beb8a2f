use crate::assemble::assemble;
use crate::call::bounded_query;
use crate::executor::{effective_cap, execute};
use crate::geometry::{plan, resolve_batch};
use crate::metrics::FEATURE_QUERIES_TOTAL;
use crate::traits::{FeatureQuery, FeatureService, OutFields};
use crate::vocab::{Clock, SystemClock, VocabularyCache};
use std::collections::BTreeMap;
use std::sync::Arc;
use stormquery_core::{
    BuildError, Condition, EntityEndpoint, EntityKind, FeatureCollection, FieldName,
    FilterCriteria, NotFoundReason, PredicateBuilder, QueryPredicate, QueryResult,
    ServiceConfig,
};
use stormquery_core::util::normalize_term;
use tracing::{debug, info, warn};

/// Composed query layer: vocabulary, predicate building, the primary
/// query, batched geometry and assembly. No method returns an error; every
/// failure ends as a not-found result or `None`.
pub struct FeatureQueryService {
    config: ServiceConfig,
    service: Arc<dyn FeatureService>,
    vocabulary: Option<VocabularyCache>,
}

impl FeatureQueryService {
    pub fn new(config: ServiceConfig, service: Arc<dyn FeatureService>) -> Self {
        Self::with_clock(config, service, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ServiceConfig,
        service: Arc<dyn FeatureService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let vocabulary = config.vocabulary_layer().map(|layer| {
            VocabularyCache::new(
                service.clone(),
                layer,
                config.vocabulary.ttl,
                config.request_timeout,
                clock,
            )
        });
        Self {
            config,
            service,
            vocabulary,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn vocabulary_cache(&self) -> Option<&VocabularyCache> {
        self.vocabulary.as_ref()
    }

    /// Sorted distinct values per field. Fields are answered empty when no
    /// vocabulary layer is configured.
    pub async fn resolve_vocabulary(&self, fields: &[FieldName]) -> BTreeMap<String, Vec<String>> {
        match &self.vocabulary {
            Some(cache) => cache.get(fields).await,
            None => fields
                .iter()
                .map(|f| (f.as_str().to_string(), Vec::new()))
                .collect(),
        }
    }

    pub async fn query(&self, criteria: &FilterCriteria) -> QueryResult {
        let kind = criteria.kind;
        let Some(endpoint) = self.config.endpoint(kind) else {
            info!(kind = kind.as_str(), "no endpoint configured");
            return finish(kind, QueryResult::not_found(NotFoundReason::NotConfigured));
        };

        let builder = PredicateBuilder::new(kind, endpoint)
            .with_aliases(&self.config.jurisdiction_aliases);
        let wanted: Vec<FieldName> = builder
            .vocabulary_fields(criteria)
            .into_iter()
            .filter(|f| self.config.vocabulary.fields.contains(f))
            .collect();
        let vocab = if wanted.is_empty() {
            BTreeMap::new()
        } else {
            self.resolve_vocabulary(&wanted).await
        };

        let predicate = match builder.with_vocabulary(&vocab).build(criteria) {
            Ok(p) => p,
            Err(BuildError::NoFilters) => {
                info!(kind = kind.as_str(), "no filters provided, skipping remote query");
                return finish(kind, QueryResult::not_found(NotFoundReason::NoFilters));
            }
        };
        let cap = effective_cap(criteria, endpoint, &self.config.caps);
        let result = self.run(endpoint, predicate, cap).await;
        finish(kind, result)
    }

    /// Projects whose name contains `name`.
    pub async fn search_by_name(&self, name: &str) -> QueryResult {
        let kind = EntityKind::Project;
        let Some(endpoint) = self.config.endpoint(kind) else {
            return finish(kind, QueryResult::not_found(NotFoundReason::NotConfigured));
        };
        let (Some(field), Some(term)) = (&endpoint.name_field, normalize_term(Some(name))) else {
            return finish(kind, QueryResult::not_found(NotFoundReason::NoFilters));
        };
        let predicate = QueryPredicate::from_conditions(vec![Condition::ContainsIgnoreCase {
            field: field.clone(),
            value: term,
        }]);
        let result = self.run(endpoint, predicate, self.config.caps.name_search).await;
        finish(kind, result)
    }

    async fn run(&self, endpoint: &EntityEndpoint, predicate: QueryPredicate, cap: usize) -> QueryResult {
        let timeout = self.config.request_timeout;
        let out_sr = self.config.out_sr;
        let rows = match execute(
            self.service.as_ref(),
            &endpoint.layer_url,
            predicate,
            cap,
            out_sr,
            timeout,
        )
        .await
        {
            Ok(rows) => rows,
            Err(_) => return QueryResult::not_found(NotFoundReason::RemoteUnavailable),
        };

        let geometry = match &endpoint.id_field {
            Some(id_field) => {
                let targets = plan(endpoint, &rows.features);
                if targets.is_empty() {
                    Default::default()
                } else {
                    resolve_batch(self.service.as_ref(), id_field, &targets, out_sr, timeout).await
                }
            }
            None => Default::default(),
        };
        let matches = assemble(endpoint, rows.features, &geometry);
        QueryResult::from_matches(matches, rows.limit_exceeded)
    }

    /// Municipality outline whose name contains `name`.
    pub async fn jurisdiction_boundary(&self, name: &str) -> Option<FeatureCollection> {
        let b = self.config.boundaries.as_ref()?;
        let term = normalize_term(Some(name))?;
        let predicate = QueryPredicate::from_conditions(vec![Condition::ContainsIgnoreCase {
            field: b.name_field.clone(),
            value: term,
        }]);
        let mut q = FeatureQuery::features(predicate, self.config.out_sr);
        q.out_fields = OutFields::Only(vec![b.name_field.as_str().to_string()]);
        self.boundary(&b.municipalities_url, &q, b.timeout).await
    }

    pub async fn county_boundary(&self) -> Option<FeatureCollection> {
        let b = self.config.boundaries.as_ref()?;
        let url = b.county_url.as_deref()?;
        let q = FeatureQuery::features(QueryPredicate::new(), self.config.out_sr);
        self.boundary(url, &q, b.timeout).await
    }

    async fn boundary(
        &self,
        url: &str,
        q: &FeatureQuery,
        timeout: std::time::Duration,
    ) -> Option<FeatureCollection> {
        match bounded_query(self.service.as_ref(), "boundary", url, q, timeout).await {
            Ok(fc) if !fc.is_empty() => Some(fc),
            Ok(_) => {
                debug!(layer = url, "boundary query matched nothing");
                None
            }
            Err(e) => {
                warn!(layer = url, error = %e, "boundary unavailable");
                None
            }
        }
    }
}

fn finish(kind: EntityKind, result: QueryResult) -> QueryResult {
    let outcome = match result.reason {
        None => "found",
        Some(NotFoundReason::NoFilters) => "no_filters",
        Some(NotFoundReason::NoMatches) => "no_matches",
        Some(NotFoundReason::RemoteUnavailable) => "remote_unavailable",
        Some(NotFoundReason::NotConfigured) => "not_configured",
    };
    FEATURE_QUERIES_TOTAL
        .with_label_values(&[kind.as_str(), outcome])
        .inc();
    result
}
