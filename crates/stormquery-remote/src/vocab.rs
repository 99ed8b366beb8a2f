//! TTL cache of distinct field values.
//!
//! The snapshot is an immutable map swapped in whole after each refresh.
//! Refreshes are serialized by an async mutex; a caller that waited on it
//! rechecks freshness before fetching, so concurrent misses cost one round
//! trip per field.

use crate::call::bounded_query;
use crate::metrics::VOCABULARY_REFRESH_TOTAL;
use crate::traits::{FeatureQuery, FeatureService};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use stormquery_core::{FieldName, Result};
use tracing::{debug, warn};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyField {
    pub field: String,
    pub values: Vec<String>,
    pub refreshed_at: DateTime<Utc>,
}

impl VocabularyField {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match now.signed_duration_since(self.refreshed_at).to_std() {
            Ok(age) => age < ttl,
            // clock went backwards
            Err(_) => true,
        }
    }
}

type Snapshot = Arc<BTreeMap<String, VocabularyField>>;

pub struct VocabularyCache {
    service: Arc<dyn FeatureService>,
    layer_url: String,
    ttl: Duration,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Snapshot>,
    refresh: tokio::sync::Mutex<()>,
}

impl VocabularyCache {
    pub fn new(
        service: Arc<dyn FeatureService>,
        layer_url: impl Into<String>,
        ttl: Duration,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service,
            layer_url: layer_url.into(),
            ttl,
            timeout,
            clock,
            snapshot: RwLock::new(Arc::new(BTreeMap::new())),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<BTreeMap<String, VocabularyField>> {
        self.snapshot.read().clone()
    }

    fn stale<'f>(&self, snap: &Snapshot, fields: &'f [FieldName]) -> Vec<&'f FieldName> {
        let now = self.clock.now();
        let mut seen = BTreeSet::new();
        fields
            .iter()
            .filter(|f| seen.insert(f.as_str().to_string()))
            .filter(|f| {
                snap.get(f.as_str())
                    .map(|v| !v.is_fresh(now, self.ttl))
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Sorted distinct values per requested field. Never fails: a field
    /// whose refresh fails keeps its previous values, or is empty if it has
    /// never loaded.
    pub async fn get(&self, fields: &[FieldName]) -> BTreeMap<String, Vec<String>> {
        let snap = self.snapshot();
        if self.stale(&snap, fields).is_empty() {
            return view(&snap, fields);
        }

        let _guard = self.refresh.lock().await;
        let snap = self.snapshot();
        let stale = self.stale(&snap, fields);
        if stale.is_empty() {
            return view(&snap, fields);
        }

        let fetched =
            futures::future::join_all(stale.iter().map(|f| self.fetch(f))).await;
        let now = self.clock.now();
        let mut next = (*snap).clone();
        for (field, res) in stale.iter().zip(fetched) {
            match res {
                Ok(values) => {
                    debug!(field = field.as_str(), count = values.len(), "vocabulary refreshed");
                    VOCABULARY_REFRESH_TOTAL
                        .with_label_values(&[field.as_str(), "ok"])
                        .inc();
                    next.insert(
                        field.as_str().to_string(),
                        VocabularyField {
                            field: field.as_str().to_string(),
                            values,
                            refreshed_at: now,
                        },
                    );
                }
                Err(e) => {
                    let warm = next.contains_key(field.as_str());
                    warn!(field = field.as_str(), warm, error = %e, "vocabulary refresh failed");
                    VOCABULARY_REFRESH_TOTAL
                        .with_label_values(&[field.as_str(), "error"])
                        .inc();
                }
            }
        }
        let next = Arc::new(next);
        *self.snapshot.write() = next.clone();
        view(&next, fields)
    }

    async fn fetch(&self, field: &FieldName) -> Result<Vec<String>> {
        let q = FeatureQuery::distinct_values(field.as_str());
        let fc = bounded_query(
            self.service.as_ref(),
            "distinct",
            &self.layer_url,
            &q,
            self.timeout,
        )
        .await?;
        let values: BTreeSet<String> = fc
            .features
            .iter()
            .filter_map(|f| field.lookup(&f.properties))
            .filter_map(|v| match v {
                JsonValue::String(s) => Some(s.trim().to_string()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect();
        Ok(values.into_iter().collect())
    }
}

fn view(snap: &Snapshot, fields: &[FieldName]) -> BTreeMap<String, Vec<String>> {
    fields
        .iter()
        .map(|f| {
            let values = snap
                .get(f.as_str())
                .map(|v| v.values.clone())
                .unwrap_or_default();
            (f.as_str().to_string(), values)
        })
        .collect()
}
