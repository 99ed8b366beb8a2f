use crate::geometry::{discriminator, record_id};
use std::collections::HashMap;
use stormquery_core::{EntityEndpoint, Feature, FeatureCollection, MatchedRecord, RecordId};

/// Builds matches in primary-row order. Geometry falls back from the
/// resolved secondary geometry to the representative point, then to null.
pub fn assemble(
    endpoint: &EntityEndpoint,
    rows: Vec<Feature>,
    geometry: &HashMap<RecordId, FeatureCollection>,
) -> Vec<MatchedRecord> {
    rows.into_iter()
        .map(|row| {
            let id = record_id(endpoint, &row);
            let disc = discriminator(endpoint, &row);
            let rep_point = row.geometry.clone();
            let rep_point_geojson = rep_point
                .as_ref()
                .map(|g| FeatureCollection::new(vec![Feature::new(row.properties.clone(), Some(g.clone()))]));
            let geometry_geojson = id
                .as_ref()
                .and_then(|id| geometry.get(id))
                .filter(|fc| !fc.is_empty())
                .cloned();
            let resolved = geometry_geojson
                .as_ref()
                .and_then(|fc| fc.first_geometry().cloned())
                .or_else(|| rep_point.clone());
            MatchedRecord {
                id,
                attributes: row.properties,
                discriminator: disc,
                representative_point: rep_point,
                rep_point_geojson,
                geometry_geojson,
                geometry: resolved,
            }
        })
        .collect()
}
