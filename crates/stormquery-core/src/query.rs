use crate::util::normalize_term;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    Project,
    PreApplication,
    Concern,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::PreApplication => "pre_application",
            EntityKind::Concern => "concern",
        }
    }

    /// Kinds whose queries always exclude archived records.
    pub fn requires_archived_exclusion(&self) -> bool {
        matches!(self, EntityKind::PreApplication | EntityKind::Concern)
    }
}

/// Business-rule partition of project records. Unknown labels deserialize
/// to `Unfiltered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Category {
    #[default]
    Unfiltered,
    Projects,
    Studies,
    FloodAudits,
}

impl Category {
    pub fn parse(label: &str) -> Option<Self> {
        let l = label.trim().to_lowercase().replace(['-', ' '], "_");
        match l.as_str() {
            "" | "all" | "unfiltered" | "default" => Some(Category::Unfiltered),
            "project" | "projects" => Some(Category::Projects),
            "study" | "studies" => Some(Category::Studies),
            "flood_audit" | "flood_audits" => Some(Category::FloodAudits),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Category::Unfiltered)
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Category::parse(&s).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub kind: EntityKind,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_status: Option<String>,
    #[serde(default)]
    pub project_types: Vec<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub project_partners: Option<String>,
    #[serde(default)]
    pub subshed: Option<String>,
    #[serde(default)]
    pub category_report: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub frequency_problem: Option<String>,
    #[serde(default)]
    pub allow_unfiltered: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FilterCriteria {
    pub fn projects() -> Self {
        Self::default()
    }

    pub fn pre_applications() -> Self {
        Self {
            kind: EntityKind::PreApplication,
            ..Self::default()
        }
    }

    pub fn concerns() -> Self {
        Self {
            kind: EntityKind::Concern,
            ..Self::default()
        }
    }

    /// True when any attribute filter (not the category) carries a value.
    pub fn has_filters(&self) -> bool {
        [
            &self.status,
            &self.project_status,
            &self.jurisdiction,
            &self.project_partners,
            &self.subshed,
            &self.category_report,
            &self.problem,
            &self.frequency_problem,
        ]
        .iter()
        .any(|v| normalize_term(v.as_deref()).is_some())
            || self.project_types.iter().any(|t| !t.trim().is_empty())
    }

    /// A bare project listing means the normal-records tab: promote it to
    /// the projects category instead of treating it as a missing filter.
    pub fn with_default_category(mut self) -> Self {
        if self.kind == EntityKind::Project
            && !self.category.is_active()
            && !self.allow_unfiltered
            && !self.has_filters()
        {
            self.category = Category::Projects;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_labels() {
        assert_eq!(Category::parse("Projects"), Some(Category::Projects));
        assert_eq!(Category::parse("study"), Some(Category::Studies));
        assert_eq!(Category::parse("flood audit"), Some(Category::FloodAudits));
        assert_eq!(Category::parse("Flood-Audits"), Some(Category::FloodAudits));
        assert_eq!(Category::parse("bogus"), None);
    }

    #[test]
    fn criteria_deserialize_with_defaults() {
        let c: FilterCriteria = serde_json::from_value(json!({
            "kind": "pre_application",
            "jurisdiction": "Zion",
            "category": "whatever"
        }))
        .unwrap();
        assert_eq!(c.kind, EntityKind::PreApplication);
        assert_eq!(c.category, Category::Unfiltered);
        assert!(c.has_filters());
        assert!(!c.allow_unfiltered);
    }

    #[test]
    fn blank_filters_do_not_count() {
        let c = FilterCriteria {
            status: Some("  ".into()),
            project_types: vec!["".into(), " ".into()],
            ..FilterCriteria::projects()
        };
        assert!(!c.has_filters());
    }

    #[test]
    fn bare_project_listing_defaults_to_projects_category() {
        let c = FilterCriteria::projects().with_default_category();
        assert_eq!(c.category, Category::Projects);

        let filtered = FilterCriteria {
            jurisdiction: Some("Wadsworth".into()),
            ..FilterCriteria::projects()
        }
        .with_default_category();
        assert_eq!(filtered.category, Category::Unfiltered);

        let open = FilterCriteria {
            allow_unfiltered: true,
            ..FilterCriteria::projects()
        }
        .with_default_category();
        assert_eq!(open.category, Category::Unfiltered);

        let preapps = FilterCriteria::pre_applications().with_default_category();
        assert_eq!(preapps.category, Category::Unfiltered);
    }
}
