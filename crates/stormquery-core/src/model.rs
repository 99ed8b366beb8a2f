use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

pub type Attributes = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default = "Feature::tag")]
    pub r#type: String,
    #[serde(default)]
    pub properties: Attributes,
    #[serde(default)]
    pub geometry: Option<JsonValue>,
}

impl Feature {
    fn tag() -> String {
        "Feature".to_string()
    }

    pub fn new(properties: Attributes, geometry: Option<JsonValue>) -> Self {
        Self {
            r#type: Self::tag(),
            properties,
            geometry: geometry.filter(|g| !g.is_null()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default = "FeatureCollection::tag")]
    pub r#type: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    fn tag() -> String {
        "FeatureCollection".to_string()
    }

    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            r#type: Self::tag(),
            features,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Geometry of the first feature, if that feature carries one.
    pub fn first_geometry(&self) -> Option<&JsonValue> {
        self.features.first().and_then(|f| f.geometry.as_ref())
    }
}

/// Record identifier as the service returns it: usually an integer, text on
/// some layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    pub fn from_json(v: &JsonValue) -> Option<Self> {
        match v {
            JsonValue::Number(n) => n.as_i64().map(RecordId::Int).or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| RecordId::Int(f as i64))
            }),
            JsonValue::String(s) if !s.trim().is_empty() => Some(RecordId::Text(s.trim().into())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// One assembled match. `geometry` is the best geometry found anywhere:
/// secondary layer first, then the representative point, else null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRecord {
    pub id: Option<RecordId>,
    pub attributes: Attributes,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub representative_point: Option<JsonValue>,
    #[serde(default)]
    pub rep_point_geojson: Option<FeatureCollection>,
    #[serde(default)]
    pub geometry_geojson: Option<FeatureCollection>,
    pub geometry: Option<JsonValue>,
}

impl MatchedRecord {
    /// The collection a map should draw: full geometry when resolved,
    /// otherwise the representative point.
    pub fn geojson(&self) -> Option<&FeatureCollection> {
        self.geometry_geojson
            .as_ref()
            .or(self.rep_point_geojson.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    NoFilters,
    NoMatches,
    RemoteUnavailable,
    NotConfigured,
}

impl NotFoundReason {
    pub fn message(&self) -> &'static str {
        match self {
            NotFoundReason::NoFilters => "No filters provided.",
            NotFoundReason::NoMatches => "No records matched the filters.",
            NotFoundReason::RemoteUnavailable => "The feature service could not be reached.",
            NotFoundReason::NotConfigured => "No endpoint is configured for this entity kind.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub found: bool,
    pub matches: Vec<MatchedRecord>,
    pub limit_exceeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<NotFoundReason>,
}

impl QueryResult {
    pub fn not_found(reason: NotFoundReason) -> Self {
        Self {
            found: false,
            matches: Vec::new(),
            limit_exceeded: false,
            reason: Some(reason),
        }
    }

    pub fn from_matches(matches: Vec<MatchedRecord>, limit_exceeded: bool) -> Self {
        if matches.is_empty() {
            return Self::not_found(NotFoundReason::NoMatches);
        }
        Self {
            found: true,
            matches,
            limit_exceeded,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_from_json() {
        assert_eq!(RecordId::from_json(&json!(42)), Some(RecordId::Int(42)));
        assert_eq!(RecordId::from_json(&json!(42.0)), Some(RecordId::Int(42)));
        assert_eq!(RecordId::from_json(&json!(" P-7 ")), Some(RecordId::Text("P-7".into())));
        assert_eq!(RecordId::from_json(&json!(4.5)), None);
        assert_eq!(RecordId::from_json(&json!(null)), None);
        assert_eq!(RecordId::from_json(&json!("")), None);
    }

    #[test]
    fn feature_collection_parses_geojson() {
        let fc: FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"project_id": 1}, "geometry": null},
                {"type": "Feature", "properties": {"project_id": 2},
                 "geometry": {"type": "Point", "coordinates": [-88.0, 42.3]}}
            ]
        }))
        .unwrap();
        assert_eq!(fc.features.len(), 2);
        assert!(fc.features[0].geometry.is_none());
        // first feature has no geometry, so there is nothing to resolve from it
        assert!(fc.first_geometry().is_none());
    }

    #[test]
    fn not_found_result_is_empty() {
        let r = QueryResult::from_matches(Vec::new(), true);
        assert!(!r.found);
        assert!(r.matches.is_empty());
        assert!(!r.limit_exceeded);
        assert_eq!(r.reason, Some(NotFoundReason::NoMatches));
    }
}
