//! HTTP surface for the query layer. Not-found outcomes are ordinary 200
//! responses with `found: false`; only malformed requests get 4xx.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use stormquery_core::{FeatureCollection, FieldName, FilterCriteria, QueryResult};
use stormquery_remote::FeatureQueryService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<FeatureQueryService>,
}

impl AppState {
    pub fn new(queries: FeatureQueryService) -> Self {
        Self {
            queries: Arc::new(queries),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/query", post(query))
        .route("/v1/vocabulary", post(vocabulary))
        .route("/v1/projects/search", get(search_projects))
        .route("/v1/boundary/jurisdiction", get(jurisdiction_boundary))
        .route("/v1/boundary/county", get(county_boundary))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    #[serde(flatten)]
    result: QueryResult,
    total_returned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jurisdiction_boundary: Option<FeatureCollection>,
}

impl QueryResponse {
    fn new(result: QueryResult, jurisdiction_boundary: Option<FeatureCollection>) -> Self {
        Self {
            total_returned: result.matches.len(),
            message: result.reason.map(|r| r.message()),
            result,
            jurisdiction_boundary,
        }
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn query(State(app): State<AppState>, Json(criteria): Json<FilterCriteria>) -> impl IntoResponse {
    let criteria = criteria.with_default_category();
    let boundary = async {
        match criteria.jurisdiction.as_deref() {
            Some(name) => app.queries.jurisdiction_boundary(name).await,
            None => None,
        }
    };
    let (result, boundary) = futures::join!(app.queries.query(&criteria), boundary);
    // an outline is only useful next to matches
    let boundary = boundary.filter(|_| result.found);
    Json(QueryResponse::new(result, boundary))
}

#[derive(Debug, Deserialize)]
struct VocabularyRequest {
    #[serde(default)]
    fields: Vec<FieldName>,
}

#[derive(Debug, Serialize)]
struct VocabularyResponse {
    vocabulary: BTreeMap<String, Vec<String>>,
}

async fn vocabulary(
    State(app): State<AppState>,
    Json(req): Json<VocabularyRequest>,
) -> impl IntoResponse {
    let fields = if req.fields.is_empty() {
        app.queries.config().vocabulary.fields.clone()
    } else {
        req.fields
    };
    let vocabulary = app.queries.resolve_vocabulary(&fields).await;
    Json(VocabularyResponse { vocabulary })
}

#[derive(Debug, Deserialize)]
struct NameParams {
    #[serde(default)]
    name: String,
}

async fn search_projects(
    State(app): State<AppState>,
    Query(params): Query<NameParams>,
) -> impl IntoResponse {
    let result = app.queries.search_by_name(&params.name).await;
    Json(QueryResponse::new(result, None))
}

fn boundary_response(fc: Option<FeatureCollection>) -> axum::response::Response {
    match fc {
        Some(fc) => (StatusCode::OK, Json(fc)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response(),
    }
}

async fn jurisdiction_boundary(
    State(app): State<AppState>,
    Query(params): Query<NameParams>,
) -> impl IntoResponse {
    boundary_response(app.queries.jurisdiction_boundary(&params.name).await)
}

async fn county_boundary(State(app): State<AppState>) -> impl IntoResponse {
    boundary_response(app.queries.county_boundary().await)
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    let _ = encoder.encode(&metric_families, &mut buf);
    (StatusCode::OK, String::from_utf8(buf).unwrap_or_default())
}
