//! Static service configuration.
//!
//! Everything here is fixed at construction: layer URLs, field names, caps
//! and timeouts. `ServiceConfig::default()` targets the Lake County SMC
//! ArcGIS service.

use crate::errors::ConfigError;
use crate::predicate::FieldName;
use crate::query::EntityKind;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const SMC_API_BASE: &str = "https://services3.arcgis.com/HESxeTbDliKKvec2/arcgis/rest/services";

/// Secondary geometry layers a record can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryLayer {
    Polygon,
    Point,
    Line,
}

impl GeometryLayer {
    /// `Polyline` and `Line` are both used for the line layer.
    pub fn from_discriminator(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.eq_ignore_ascii_case("polygon") {
            Some(GeometryLayer::Polygon)
        } else if v.eq_ignore_ascii_case("point") {
            Some(GeometryLayer::Point)
        } else if v.eq_ignore_ascii_case("polyline") || v.eq_ignore_ascii_case("line") {
            Some(GeometryLayer::Line)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometrySource {
    /// The primary layer's point is the only geometry.
    #[default]
    None,
    /// Every record's full geometry lives in one layer.
    Fixed { layer_url: String },
    /// A discriminator attribute names the layer.
    Discriminated {
        field: FieldName,
        layers: BTreeMap<GeometryLayer, String>,
    },
}

impl GeometrySource {
    pub fn discriminator_field(&self) -> Option<&FieldName> {
        match self {
            GeometrySource::Discriminated { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Layer holding the record's geometry; `None` for absent or unknown
    /// discriminators.
    pub fn layer_for(&self, discriminator: Option<&str>) -> Option<&str> {
        match self {
            GeometrySource::None => None,
            GeometrySource::Fixed { layer_url } => Some(layer_url.as_str()),
            GeometrySource::Discriminated { layers, .. } => discriminator
                .and_then(GeometryLayer::from_discriminator)
                .and_then(|l| layers.get(&l))
                .map(String::as_str),
        }
    }

    fn urls(&self) -> Vec<&str> {
        match self {
            GeometrySource::None => Vec::new(),
            GeometrySource::Fixed { layer_url } => vec![layer_url.as_str()],
            GeometrySource::Discriminated { layers, .. } => {
                layers.values().map(String::as_str).collect()
            }
        }
    }
}

/// Field names backing each criteria filter. A filter whose field is not
/// declared for a kind is ignored for that kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterFields {
    pub status: Option<FieldName>,
    pub project_status: Option<FieldName>,
    pub project_types: Option<FieldName>,
    pub jurisdiction: Option<FieldName>,
    pub project_partners: Option<FieldName>,
    pub subshed: Option<FieldName>,
    pub category_report: Option<FieldName>,
    pub problem: Option<FieldName>,
    pub frequency_problem: Option<FieldName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFields {
    pub subtype_field: FieldName,
    pub study_flag_field: FieldName,
    pub flood_audit_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub field: FieldName,
    pub value: String,
}

fn default_cap() -> usize {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEndpoint {
    pub layer_url: String,
    #[serde(default)]
    pub id_field: Option<FieldName>,
    #[serde(default)]
    pub name_field: Option<FieldName>,
    #[serde(default)]
    pub geometry: GeometrySource,
    #[serde(default)]
    pub filters: FilterFields,
    #[serde(default)]
    pub categories: Option<CategoryFields>,
    #[serde(default)]
    pub archived: Option<Exclusion>,
    #[serde(default = "default_cap")]
    pub default_cap: usize,
}

impl EntityEndpoint {
    /// Projects: representative points (layer 30) with areas, points and
    /// lines in layers 29, 27 and 23.
    pub fn lake_county_projects(base: &str) -> Self {
        let layer = |n: u32| format!("{}/SMCAllProjectLayers/FeatureServer/{}", base, n);
        let layers = BTreeMap::from([
            (GeometryLayer::Polygon, layer(29)),
            (GeometryLayer::Point, layer(27)),
            (GeometryLayer::Line, layer(23)),
        ]);
        Self {
            layer_url: layer(30),
            id_field: Some(FieldName::from_static("project_id")),
            name_field: Some(FieldName::from_static("Name")),
            geometry: GeometrySource::Discriminated {
                field: FieldName::from_static("Geometry"),
                layers,
            },
            filters: FilterFields {
                status: Some(FieldName::from_static("status")),
                project_status: Some(FieldName::from_static("ProjectStatus")),
                project_types: Some(FieldName::from_static("projecttype")),
                jurisdiction: Some(FieldName::from_static("jurisdiction")),
                project_partners: Some(FieldName::from_static("ProjectPartners")),
                subshed: Some(FieldName::from_static("Subshed")),
                ..FilterFields::default()
            },
            categories: Some(CategoryFields {
                subtype_field: FieldName::from_static("projectsubtype"),
                study_flag_field: FieldName::from_static("is_study"),
                flood_audit_label: "Flood Audit".to_string(),
            }),
            archived: None,
            default_cap: 50,
        }
    }

    /// Pre-applications: a point layer plus one layer with their polygons
    /// and lines, keyed by `preapp_id`.
    pub fn pre_applications(points_url: &str, geometry_url: &str) -> Self {
        Self {
            layer_url: points_url.to_string(),
            id_field: Some(FieldName::from_static("preapp_id")),
            name_field: None,
            geometry: GeometrySource::Fixed {
                layer_url: geometry_url.to_string(),
            },
            filters: FilterFields {
                jurisdiction: Some(FieldName::from_static("jurisdiction")),
                subshed: Some(FieldName::from_static("Subshed")),
                ..FilterFields::default()
            },
            categories: None,
            archived: Some(Exclusion {
                field: FieldName::from_static("status"),
                value: "Archived".to_string(),
            }),
            default_cap: 200,
        }
    }

    /// Concerns (CIRS): point geometry only.
    pub fn concerns(points_url: &str) -> Self {
        Self {
            layer_url: points_url.to_string(),
            id_field: None,
            name_field: None,
            geometry: GeometrySource::None,
            filters: FilterFields {
                jurisdiction: Some(FieldName::from_static("jurisdiction")),
                category_report: Some(FieldName::from_static("category_report")),
                problem: Some(FieldName::from_static("problem")),
                frequency_problem: Some(FieldName::from_static("frequency_problem")),
                ..FilterFields::default()
            },
            categories: None,
            archived: Some(Exclusion {
                field: FieldName::from_static("status_CIRS"),
                value: "Archived".to_string(),
            }),
            default_cap: 200,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Layer the distinct values are read from; the project layer when unset.
    pub layer_url: Option<String>,
    pub fields: Vec<FieldName>,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ttl: Duration,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            layer_url: None,
            fields: vec![
                FieldName::from_static("status"),
                FieldName::from_static("ProjectStatus"),
                FieldName::from_static("jurisdiction"),
            ],
            ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapPolicy {
    pub name_search: usize,
    pub category: usize,
    pub unfiltered: usize,
    /// Ceiling for any single primary query, caller limits included.
    pub max: usize,
}

impl Default for CapPolicy {
    fn default() -> Self {
        Self {
            name_search: 10,
            category: 1000,
            unfiltered: 200,
            max: 5000,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    pub municipalities_url: String,
    pub name_field: FieldName,
    #[serde(default)]
    pub county_url: Option<String>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "BoundaryConfig::default_timeout")]
    pub timeout: Duration,
}

impl BoundaryConfig {
    fn default_timeout() -> Duration {
        Duration::from_secs(15)
    }

    pub fn lake_county(base: &str) -> Self {
        Self {
            municipalities_url: format!("{}/LakeCounty_TaxDistricts/FeatureServer/10", base),
            name_field: FieldName::from_static("NAME"),
            county_url: Some(format!(
                "{}/LakeCounty_PoliticalBoundaries/FeatureServer/2",
                base
            )),
            timeout: Self::default_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub projects: Option<EntityEndpoint>,
    pub pre_applications: Option<EntityEndpoint>,
    pub concerns: Option<EntityEndpoint>,
    pub vocabulary: VocabularyConfig,
    pub caps: CapPolicy,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    pub out_sr: u32,
    pub jurisdiction_aliases: BTreeMap<String, String>,
    pub boundaries: Option<BoundaryConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::lake_county(SMC_API_BASE)
    }
}

impl ServiceConfig {
    /// Project and boundary layers under `base`. Pre-application and
    /// concern layers have no public default and must be configured.
    pub fn lake_county(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            projects: Some(EntityEndpoint::lake_county_projects(base)),
            pre_applications: None,
            concerns: None,
            vocabulary: VocabularyConfig::default(),
            caps: CapPolicy::default(),
            request_timeout: Duration::from_secs(30),
            out_sr: 4326,
            jurisdiction_aliases: BTreeMap::from([(
                "chicago".to_string(),
                "North Chicago".to_string(),
            )]),
            boundaries: Some(BoundaryConfig::lake_county(base)),
        }
    }

    pub fn endpoint(&self, kind: EntityKind) -> Option<&EntityEndpoint> {
        match kind {
            EntityKind::Project => self.projects.as_ref(),
            EntityKind::PreApplication => self.pre_applications.as_ref(),
            EntityKind::Concern => self.concerns.as_ref(),
        }
    }

    pub fn vocabulary_layer(&self) -> Option<&str> {
        self.vocabulary
            .layer_url
            .as_deref()
            .or_else(|| self.projects.as_ref().map(|p| p.layer_url.as_str()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in [
            EntityKind::Project,
            EntityKind::PreApplication,
            EntityKind::Concern,
        ] {
            let Some(ep) = self.endpoint(kind) else {
                continue;
            };
            check_url(kind.as_str(), &ep.layer_url)?;
            for url in ep.geometry.urls() {
                check_url(kind.as_str(), url)?;
            }
            if kind.requires_archived_exclusion() && ep.archived.is_none() {
                return Err(ConfigError::MissingExclusion(kind.as_str()));
            }
        }
        if let Some(url) = &self.vocabulary.layer_url {
            check_url("vocabulary", url)?;
        }
        if let Some(b) = &self.boundaries {
            check_url("boundaries", &b.municipalities_url)?;
            if let Some(url) = &b.county_url {
                check_url("boundaries", url)?;
            }
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path)?;
        let cfg: ServiceConfig = serde_json::from_slice(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads `STORMQUERY_CONFIG` when set, otherwise the defaults, then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var("STORMQUERY_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => match std::env::var("STORMQUERY_BASE_URL") {
                Ok(base) => Self::lake_county(&base),
                Err(_) => Self::default(),
            },
        };
        if let Some(secs) = std::env::var("STORMQUERY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = std::env::var("STORMQUERY_VOCAB_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            cfg.vocabulary.ttl = Duration::from_secs(secs);
        }
        if let (Ok(points), Ok(shapes)) = (
            std::env::var("STORMQUERY_PREAPP_POINTS_URL"),
            std::env::var("STORMQUERY_PREAPP_GEOMETRY_URL"),
        ) {
            cfg.pre_applications = Some(EntityEndpoint::pre_applications(&points, &shapes));
        }
        if let Ok(url) = std::env::var("STORMQUERY_CONCERNS_URL") {
            cfg.concerns = Some(EntityEndpoint::concerns(&url));
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn check_url(owner: &'static str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(owner, url.to_string()))
    }
}
