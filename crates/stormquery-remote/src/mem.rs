use crate::traits::{FeatureQuery, FeatureService, OutFields, RequestMethod};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stormquery_core::{
    Attributes, ConfigError, Feature, FeatureCollection, RemoteError, Result,
};

/// One request as the in-memory service saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub layer_url: String,
    pub method: RequestMethod,
    pub where_clause: String,
    pub distinct: bool,
    pub record_count: Option<usize>,
}

/// Fixture-backed feature service. Evaluates predicates locally, records
/// every call and can be told to fail or stall per layer.
#[derive(Clone, Default)]
pub struct InMemoryFeatureService {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    layers: HashMap<String, Vec<Feature>>,
    failures: HashMap<String, RemoteError>,
    delays: HashMap<String, Duration>,
    calls: Vec<RecordedCall>,
}

#[derive(Deserialize)]
struct Fixture {
    layers: BTreeMap<String, FeatureCollection>,
}

fn layer_key(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

impl InMemoryFeatureService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"layers": {"<layer url>": <FeatureCollection>, ...}}`.
    pub fn from_fixture_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let raw = std::fs::read(path)?;
        let fixture: Fixture = serde_json::from_slice(&raw)?;
        let svc = Self::new();
        for (url, fc) in fixture.layers {
            svc.insert_layer(&url, fc.features);
        }
        Ok(svc)
    }

    pub fn insert_layer(&self, url: &str, features: Vec<Feature>) {
        self.inner.write().layers.insert(layer_key(url), features);
    }

    pub fn fail_layer(&self, url: &str, err: RemoteError) {
        self.inner.write().failures.insert(layer_key(url), err);
    }

    pub fn clear_failure(&self, url: &str) {
        self.inner.write().failures.remove(&layer_key(url));
    }

    pub fn delay_layer(&self, url: &str, delay: Duration) {
        self.inner.write().delays.insert(layer_key(url), delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.read().calls.clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        let key = layer_key(url);
        self.inner
            .read()
            .calls
            .iter()
            .filter(|c| c.layer_url == key)
            .count()
    }

    pub fn reset_calls(&self) {
        self.inner.write().calls.clear();
    }

    fn answer(&self, key: &str, q: &FeatureQuery) -> Result<FeatureCollection> {
        let inner = self.inner.read();
        if let Some(err) = inner.failures.get(key) {
            return Err(err.clone());
        }
        let Some(rows) = inner.layers.get(key) else {
            return Err(RemoteError::Service {
                code: 400,
                message: format!("Invalid URL: {key}"),
            });
        };
        let hits = rows.iter().filter(|f| q.predicate.matches(&f.properties));
        let mut out: Vec<Feature> = Vec::new();
        if q.distinct {
            for f in hits {
                let projected = project(&f.properties, &q.out_fields);
                if !out.iter().any(|seen| seen.properties == projected) {
                    out.push(Feature::new(projected, None));
                }
            }
        } else {
            for f in hits {
                let geometry = if q.return_geometry {
                    f.geometry.clone()
                } else {
                    None
                };
                out.push(Feature::new(project(&f.properties, &q.out_fields), geometry));
            }
        }
        if let Some(n) = q.record_count {
            out.truncate(n);
        }
        Ok(FeatureCollection::new(out))
    }
}

fn project(props: &Attributes, fields: &OutFields) -> Attributes {
    match fields {
        OutFields::All => props.clone(),
        OutFields::Only(names) => props
            .iter()
            .filter(|(k, _)| names.iter().any(|n| n.eq_ignore_ascii_case(k)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

#[async_trait::async_trait]
impl FeatureService for InMemoryFeatureService {
    async fn query(&self, layer_url: &str, query: &FeatureQuery) -> Result<FeatureCollection> {
        let key = layer_key(layer_url);
        let delay = {
            let mut inner = self.inner.write();
            inner.calls.push(RecordedCall {
                layer_url: key.clone(),
                method: query.method,
                where_clause: query.predicate.to_where(),
                distinct: query.distinct,
                record_count: query.record_count,
            });
            inner.delays.get(&key).copied()
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.answer(&key, query)
    }
}
