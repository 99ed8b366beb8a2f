#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use stormquery_core::{EntityEndpoint, Feature, RecordId, ServiceConfig};
use stormquery_remote::{FeatureQueryService, InMemoryFeatureService};

pub const BASE: &str = "https://fs.test";

pub fn layer(n: u32) -> String {
    format!("{BASE}/SMCAllProjectLayers/FeatureServer/{n}")
}

pub fn preapp_points() -> String {
    format!("{BASE}/PreApps/FeatureServer/0")
}

pub fn preapp_shapes() -> String {
    format!("{BASE}/PreApps/FeatureServer/1")
}

pub fn concern_points() -> String {
    format!("{BASE}/CIRS/FeatureServer/0")
}

pub fn municipalities() -> String {
    format!("{BASE}/LakeCounty_TaxDistricts/FeatureServer/10")
}

pub fn county() -> String {
    format!("{BASE}/LakeCounty_PoliticalBoundaries/FeatureServer/2")
}

pub fn config() -> ServiceConfig {
    let mut cfg = ServiceConfig::lake_county(BASE);
    cfg.pre_applications = Some(EntityEndpoint::pre_applications(
        &preapp_points(),
        &preapp_shapes(),
    ));
    cfg.concerns = Some(EntityEndpoint::concerns(&concern_points()));
    cfg
}

pub fn point(x: f64, y: f64) -> Value {
    json!({"type": "Point", "coordinates": [x, y]})
}

pub fn square(x: f64) -> Value {
    json!({"type": "Polygon", "coordinates": [[[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 0.0]]]})
}

pub fn feature(props: Value, geometry: Option<Value>) -> Feature {
    Feature::new(props.as_object().cloned().unwrap_or_default(), geometry)
}

/// Five normal projects (1-5), two studies (6, 7) and two flood audits
/// (8, 9). Project 9 is flagged as a study but labelled a flood audit.
pub fn projects() -> Vec<Feature> {
    let rows = [
        json!({"project_id": 1, "Name": "Gages Lake Dredging", "status": "Submitted", "ProjectStatus": "Under Review",
               "jurisdiction": "Grayslake", "Geometry": "Polygon", "projectsubtype": "Capital", "is_study": 0, "projecttype": "WMB"}),
        json!({"project_id": 2, "Name": "Des Plaines Levee", "status": "Approved", "ProjectStatus": "Complete",
               "jurisdiction": "Gurnee", "Geometry": "Polyline", "projectsubtype": null, "is_study": null, "projecttype": "SIRF"}),
        json!({"project_id": 3, "Name": "Zion Culvert", "status": "Submitted", "ProjectStatus": "Under Review",
               "jurisdiction": "Zion", "Geometry": "Point", "projectsubtype": "Capital", "is_study": 0, "projecttype": "WMB"}),
        json!({"project_id": 4, "Name": "North Chicago Storm Sewer", "status": "Approved", "ProjectStatus": "Funded",
               "jurisdiction": "North Chicago", "Geometry": "Polygon", "projectsubtype": null, "is_study": 0, "projecttype": "WDO"}),
        json!({"project_id": 5, "Name": "Wadsworth Wetland", "status": "Submitted", "ProjectStatus": "Design",
               "jurisdiction": "Wadsworth", "Geometry": null, "projectsubtype": "Capital", "is_study": null, "projecttype": "WMB"}),
        json!({"project_id": 6, "Name": "Mill Creek Study", "status": "Approved", "ProjectStatus": "Complete",
               "jurisdiction": "Gurnee", "Geometry": "Polygon", "projectsubtype": "Study", "is_study": 1, "projecttype": "WMB"}),
        json!({"project_id": 7, "Name": "Buffalo Creek Study", "status": "Submitted", "ProjectStatus": "Design",
               "jurisdiction": "Wauconda", "Geometry": "Point", "projectsubtype": null, "is_study": 1, "projecttype": "WMB"}),
        json!({"project_id": 8, "Name": "Gurnee Flood Audit", "status": "Approved", "ProjectStatus": "Complete",
               "jurisdiction": "Gurnee", "Geometry": "Polygon", "projectsubtype": "Flood Audit", "is_study": 0, "projecttype": "FA"}),
        json!({"project_id": 9, "Name": "Zion Flood Audit", "status": "Submitted", "ProjectStatus": "Design",
               "jurisdiction": "Zion", "Geometry": "Point", "projectsubtype": "Flood Audit", "is_study": 1, "projecttype": "FA"}),
    ];
    rows.into_iter()
        .enumerate()
        .map(|(i, r)| feature(r, Some(point(-88.0 + i as f64 * 0.01, 42.3))))
        .collect()
}

pub fn areas() -> Vec<Feature> {
    vec![
        feature(json!({"project_id": 1, "part": "a"}), Some(square(1.0))),
        feature(json!({"project_id": 4}), Some(square(4.0))),
        feature(json!({"project_id": 1, "part": "b"}), Some(square(1.5))),
        feature(json!({"project_id": 6}), Some(square(6.0))),
        feature(json!({"project_id": 8}), Some(square(8.0))),
    ]
}

pub fn points() -> Vec<Feature> {
    vec![
        feature(json!({"project_id": 3}), Some(point(3.0, 3.0))),
        feature(json!({"project_id": 7}), Some(point(7.0, 7.0))),
        feature(json!({"project_id": 9}), Some(point(9.0, 9.0))),
    ]
}

pub fn lines() -> Vec<Feature> {
    vec![feature(
        json!({"project_id": 2}),
        Some(json!({"type": "LineString", "coordinates": [[0.0, 0.0], [2.0, 2.0]]})),
    )]
}

pub fn fixture() -> InMemoryFeatureService {
    let svc = InMemoryFeatureService::new();
    svc.insert_layer(&layer(30), projects());
    svc.insert_layer(&layer(29), areas());
    svc.insert_layer(&layer(27), points());
    svc.insert_layer(&layer(23), lines());
    svc
}

pub fn query_service(svc: &InMemoryFeatureService) -> FeatureQueryService {
    FeatureQueryService::new(config(), Arc::new(svc.clone()))
}

pub fn ids(result: &stormquery_core::QueryResult) -> Vec<RecordId> {
    result.matches.iter().filter_map(|m| m.id.clone()).collect()
}

pub fn int_ids(ns: &[i64]) -> Vec<RecordId> {
    ns.iter().map(|n| RecordId::Int(*n)).collect()
}
