//! Batched secondary-geometry lookup.
//!
//! Records are grouped by the layer their discriminator names and each layer
//! gets a single `id IN (...)` query, so N matches over L layers cost L calls.

use crate::call::bounded_query;
use crate::metrics::GEOMETRY_BATCHES_TOTAL;
use crate::traits::{FeatureQuery, FeatureService};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use stormquery_core::{
    Condition, EntityEndpoint, Feature, FeatureCollection, FieldName, Literal, QueryPredicate,
    RecordId,
};
use tracing::{debug, warn};

/// A record that needs geometry from `layer_url`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryTarget<'a> {
    pub id: RecordId,
    pub layer_url: &'a str,
}

/// Discriminator value of a primary row, as text.
pub fn discriminator(endpoint: &EntityEndpoint, row: &Feature) -> Option<String> {
    let field = endpoint.geometry.discriminator_field()?;
    field
        .lookup(&row.properties)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn record_id(endpoint: &EntityEndpoint, row: &Feature) -> Option<RecordId> {
    let field = endpoint.id_field.as_ref()?;
    field.lookup(&row.properties).and_then(RecordId::from_json)
}

/// Rows with an identifier and a recognised geometry layer. Others keep
/// their representative point.
pub fn plan<'a>(endpoint: &'a EntityEndpoint, rows: &[Feature]) -> Vec<GeometryTarget<'a>> {
    rows.iter()
        .filter_map(|row| {
            let id = record_id(endpoint, row)?;
            let disc = discriminator(endpoint, row);
            let layer_url = endpoint.geometry.layer_for(disc.as_deref())?;
            Some(GeometryTarget { id, layer_url })
        })
        .collect()
}

/// Fetches geometry for every target, one POST per distinct layer, all
/// layers concurrently. A failing layer leaves its records out of the map.
pub async fn resolve_batch(
    service: &dyn FeatureService,
    id_field: &FieldName,
    targets: &[GeometryTarget<'_>],
    out_sr: u32,
    timeout: Duration,
) -> HashMap<RecordId, FeatureCollection> {
    let mut by_layer: BTreeMap<&str, Vec<RecordId>> = BTreeMap::new();
    for t in targets {
        let ids = by_layer.entry(t.layer_url).or_default();
        if !ids.contains(&t.id) {
            ids.push(t.id.clone());
        }
    }

    let batches = by_layer.iter().map(|(layer, ids)| async move {
        let predicate = QueryPredicate::from_conditions(vec![Condition::InSet {
            field: id_field.clone(),
            values: ids.iter().map(Literal::from).collect(),
        }]);
        let q = FeatureQuery::features(predicate, out_sr).via_post();
        let res = bounded_query(service, "geometry", layer, &q, timeout).await;
        (*layer, ids, res)
    });
    let results = futures::future::join_all(batches).await;

    let mut merged: HashMap<RecordId, FeatureCollection> = HashMap::new();
    for (layer, ids, res) in results {
        let fc = match res {
            Ok(fc) => {
                GEOMETRY_BATCHES_TOTAL.with_label_values(&["ok"]).inc();
                fc
            }
            Err(e) => {
                GEOMETRY_BATCHES_TOTAL.with_label_values(&["error"]).inc();
                warn!(layer, records = ids.len(), error = %e, "geometry batch failed, using representative points");
                continue;
            }
        };
        // keyed by text so a layer answering "5" for a primary 5 still lines up
        let wanted: HashMap<String, &RecordId> = ids.iter().map(|id| (id.to_string(), id)).collect();
        debug!(layer, records = ids.len(), features = fc.features.len(), "geometry batch");
        for f in fc.features {
            let Some(id) = id_field.lookup(&f.properties).and_then(RecordId::from_json) else {
                continue;
            };
            if let Some(primary) = wanted.get(&id.to_string()) {
                merged.entry((*primary).clone()).or_default().features.push(f);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: serde_json::Value) -> Feature {
        Feature::new(v.as_object().cloned().unwrap(), None)
    }

    #[test]
    fn plan_skips_rows_without_id_or_known_layer() {
        let ep = EntityEndpoint::lake_county_projects("https://x.test");
        let rows = vec![
            row(json!({"project_id": 1, "Geometry": "Polygon"})),
            row(json!({"project_id": 2, "Geometry": "Multipatch"})),
            row(json!({"project_id": 3})),
            row(json!({"Geometry": "Point"})),
            row(json!({"project_id": 5.0, "Geometry": " polyline "})),
        ];
        let targets = plan(&ep, &rows);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, RecordId::Int(1));
        assert!(targets[0].layer_url.ends_with("/29"));
        assert_eq!(targets[1].id, RecordId::Int(5));
        assert!(targets[1].layer_url.ends_with("/23"));
    }

    #[test]
    fn fixed_geometry_layer_ignores_discriminator() {
        let ep = EntityEndpoint::pre_applications("https://x.test/98", "https://x.test/99");
        let targets = plan(&ep, &[row(json!({"preapp_id": "PA-1"}))]);
        assert_eq!(targets[0].id, RecordId::Text("PA-1".into()));
        assert_eq!(targets[0].layer_url, "https://x.test/99");
    }

    #[tokio::test]
    async fn text_ids_on_geometry_layer_match_numeric_primary_ids() {
        let svc = crate::InMemoryFeatureService::new();
        svc.insert_layer(
            "https://x.test/29",
            vec![
                Feature::new(
                    json!({"project_id": "5"}).as_object().cloned().unwrap(),
                    Some(json!({"type": "Point", "coordinates": [5.0, 5.0]})),
                ),
                Feature::new(
                    json!({"project_id": "6"}).as_object().cloned().unwrap(),
                    Some(json!({"type": "Point", "coordinates": [6.0, 6.0]})),
                ),
            ],
        );
        let id_field = FieldName::new("project_id").unwrap();
        let targets = [GeometryTarget {
            id: RecordId::Int(5),
            layer_url: "https://x.test/29",
        }];
        let merged = resolve_batch(&svc, &id_field, &targets, 4326, Duration::from_secs(5)).await;
        assert_eq!(merged.len(), 1);
        let fc = &merged[&RecordId::Int(5)];
        assert_eq!(fc.features.len(), 1);
        assert_eq!(
            fc.first_geometry(),
            Some(&json!({"type": "Point", "coordinates": [5.0, 5.0]}))
        );
    }
}
