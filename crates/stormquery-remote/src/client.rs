use crate::traits::{FeatureQuery, FeatureService, RequestMethod};
use serde_json::Value as JsonValue;
use std::time::Duration;
use stormquery_core::{Attributes, Feature, FeatureCollection, RemoteError, Result};
use tracing::debug;

/// ArcGIS FeatureServer `/query` client.
#[derive(Clone)]
pub struct ArcGisClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl ArcGisClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("http client init failed: {e}")))?;
        Ok(Self { http, timeout })
    }

    fn map_err(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.timeout.as_secs())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Request parameters in wire order.
pub fn query_params(q: &FeatureQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("where", q.predicate.to_where()),
        ("outFields", q.out_fields.to_param()),
        ("returnGeometry", q.return_geometry.to_string()),
    ];
    if q.distinct {
        params.push(("returnDistinctValues", "true".to_string()));
        params.push(("returnExceededLimitFeatures", "true".to_string()));
        params.push(("f", "json".to_string()));
    } else {
        params.push(("outSR", q.out_sr.to_string()));
        params.push(("f", "geojson".to_string()));
    }
    if let Some(n) = q.record_count {
        params.push(("resultRecordCount", n.to_string()));
    }
    params
}

/// Decodes a `/query` response body. The service reports some failures with
/// HTTP 200 and an `error` object, so both signals are checked.
pub fn decode_envelope(status: u16, body: &[u8]) -> Result<FeatureCollection> {
    let ok_status = (200..300).contains(&status);
    let doc: JsonValue = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) if !ok_status => return Err(RemoteError::Status(status)),
        Err(e) => return Err(RemoteError::Decode(e.to_string())),
    };
    if let Some(err) = doc.get("error") {
        return Err(RemoteError::Service {
            code: err
                .get("code")
                .and_then(JsonValue::as_i64)
                .unwrap_or(status as i64),
            message: err
                .get("message")
                .and_then(JsonValue::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    if !ok_status {
        return Err(RemoteError::Status(status));
    }
    let Some(features) = doc.get("features").and_then(JsonValue::as_array) else {
        return Err(RemoteError::Decode("response has no features array".into()));
    };
    let features = features.iter().map(decode_feature).collect();
    Ok(FeatureCollection::new(features))
}

// GeoJSON features carry `properties`; Esri JSON (distinct queries) carries
// `attributes` and an Esri geometry we never request.
fn decode_feature(v: &JsonValue) -> Feature {
    let props = v
        .get("properties")
        .or_else(|| v.get("attributes"))
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_else(Attributes::new);
    let geometry = if v.get("properties").is_some() {
        v.get("geometry").cloned()
    } else {
        None
    };
    Feature::new(props, geometry)
}

#[async_trait::async_trait]
impl FeatureService for ArcGisClient {
    async fn query(&self, layer_url: &str, query: &FeatureQuery) -> Result<FeatureCollection> {
        let url = format!("{}/query", layer_url.trim_end_matches('/'));
        let params = query_params(query);
        debug!(layer = layer_url, where_clause = %params[0].1, "feature query");
        let req = match query.method {
            RequestMethod::Get => self.http.get(&url).query(&params),
            RequestMethod::PostForm => self.http.post(&url).form(&params),
        };
        let resp = req.send().await.map_err(|e| self.map_err(e))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| self.map_err(e))?;
        decode_envelope(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stormquery_core::{Condition, FieldName, QueryPredicate};

    fn predicate() -> QueryPredicate {
        QueryPredicate::from_conditions(vec![Condition::EqualsIgnoreCase {
            field: FieldName::new("status").unwrap(),
            value: "Submitted".into(),
        }])
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn feature_query_params() {
        let q = FeatureQuery::features(predicate(), 4326).with_record_count(51);
        let p = query_params(&q);
        assert_eq!(param(&p, "where"), Some("UPPER(status) = UPPER('Submitted')"));
        assert_eq!(param(&p, "outFields"), Some("*"));
        assert_eq!(param(&p, "returnGeometry"), Some("true"));
        assert_eq!(param(&p, "outSR"), Some("4326"));
        assert_eq!(param(&p, "f"), Some("geojson"));
        assert_eq!(param(&p, "resultRecordCount"), Some("51"));
        assert_eq!(param(&p, "returnDistinctValues"), None);
    }

    #[test]
    fn distinct_query_params() {
        let p = query_params(&FeatureQuery::distinct_values("ProjectStatus"));
        assert_eq!(param(&p, "where"), Some("1=1"));
        assert_eq!(param(&p, "outFields"), Some("ProjectStatus"));
        assert_eq!(param(&p, "returnGeometry"), Some("false"));
        assert_eq!(param(&p, "returnDistinctValues"), Some("true"));
        assert_eq!(param(&p, "returnExceededLimitFeatures"), Some("true"));
        assert_eq!(param(&p, "f"), Some("json"));
    }

    #[test]
    fn error_key_fails_even_with_ok_status() {
        let body = br#"{"error": {"code": 400, "message": "Invalid query"}}"#;
        assert_eq!(
            decode_envelope(200, body),
            Err(RemoteError::Service {
                code: 400,
                message: "Invalid query".into()
            })
        );
    }

    #[test]
    fn http_status_fails_without_error_key() {
        assert_eq!(decode_envelope(503, b"<html>down</html>"), Err(RemoteError::Status(503)));
        assert_eq!(
            decode_envelope(500, br#"{"features": []}"#),
            Err(RemoteError::Status(500))
        );
        assert!(matches!(decode_envelope(200, b"not json"), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn decodes_geojson_and_esri_json() {
        let geo = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"project_id":4},
             "geometry":{"type":"Point","coordinates":[-87.9,42.4]}}]}"#;
        let fc = decode_envelope(200, geo).unwrap();
        assert_eq!(fc.features[0].properties["project_id"], 4);
        assert!(fc.first_geometry().is_some());

        let esri = br#"{"features":[{"attributes":{"status":"Submitted"}},
            {"attributes":{"status":"Approved"}}]}"#;
        let fc = decode_envelope(200, esri).unwrap();
        assert_eq!(fc.features.len(), 2);
        assert_eq!(fc.features[1].properties["status"], "Approved");
        assert!(fc.features[1].geometry.is_none());
    }
}
