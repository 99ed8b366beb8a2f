use stormquery_core::{FeatureCollection, QueryPredicate, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum OutFields {
    All,
    Only(Vec<String>),
}

impl OutFields {
    pub fn to_param(&self) -> String {
        match self {
            OutFields::All => "*".to_string(),
            OutFields::Only(fields) => fields.join(","),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    /// Form-encoded body; used for identifier batches whose where clause can
    /// outgrow a URL.
    PostForm,
}

/// One `/query` request against a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    pub predicate: QueryPredicate,
    pub out_fields: OutFields,
    pub return_geometry: bool,
    /// Distinct projection of `out_fields`, answered in Esri JSON.
    pub distinct: bool,
    pub out_sr: u32,
    pub record_count: Option<usize>,
    pub method: RequestMethod,
}

impl FeatureQuery {
    pub fn features(predicate: QueryPredicate, out_sr: u32) -> Self {
        Self {
            predicate,
            out_fields: OutFields::All,
            return_geometry: true,
            distinct: false,
            out_sr,
            record_count: None,
            method: RequestMethod::Get,
        }
    }

    pub fn distinct_values(field: &str) -> Self {
        Self {
            predicate: QueryPredicate::new(),
            out_fields: OutFields::Only(vec![field.to_string()]),
            return_geometry: false,
            distinct: true,
            out_sr: 4326,
            record_count: None,
            method: RequestMethod::Get,
        }
    }

    pub fn with_record_count(mut self, n: usize) -> Self {
        self.record_count = Some(n);
        self
    }

    pub fn via_post(mut self) -> Self {
        self.method = RequestMethod::PostForm;
        self
    }
}

/// Read-only access to a feature service. Implementations return every
/// failure as a `RemoteError`; callers decide how far it degrades.
#[async_trait::async_trait]
pub trait FeatureService: Send + Sync + 'static {
    async fn query(&self, layer_url: &str, query: &FeatureQuery) -> Result<FeatureCollection>;
}

#[async_trait::async_trait]
impl<T: FeatureService + ?Sized> FeatureService for std::sync::Arc<T> {
    async fn query(&self, layer_url: &str, query: &FeatureQuery) -> Result<FeatureCollection> {
        (**self).query(layer_url, query).await
    }
}
