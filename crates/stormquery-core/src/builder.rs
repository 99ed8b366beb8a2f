use crate::config::{CategoryFields, EntityEndpoint};
use crate::errors::BuildError;
use crate::predicate::{BoolExpr, Condition, FieldName, Literal, QueryPredicate};
use crate::query::{Category, EntityKind, FilterCriteria};
use crate::resolve::{apply_alias, resolve_term};
use crate::util::normalize_term;
use std::collections::BTreeMap;
use tracing::debug;

/// Composite condition for a category. The three categories partition every
/// record whose study flag is null, 0 or 1: a record flagged as a study but
/// labelled as a flood audit counts as a flood audit.
pub fn category_condition(fields: &CategoryFields, category: Category) -> Option<Condition> {
    let sub = &fields.subtype_field;
    let study = &fields.study_flag_field;
    let label = Literal::Text(fields.flood_audit_label.clone());
    let not_flood_audit = BoolExpr::Or(vec![
        BoolExpr::IsNull(sub.clone()),
        BoolExpr::NotEq(sub.clone(), label.clone()),
    ]);
    let expr = match category {
        Category::Unfiltered => return None,
        Category::Projects => BoolExpr::And(vec![
            not_flood_audit,
            BoolExpr::Or(vec![
                BoolExpr::IsNull(study.clone()),
                BoolExpr::Eq(study.clone(), Literal::Int(0)),
            ]),
        ]),
        Category::Studies => BoolExpr::And(vec![
            BoolExpr::Eq(study.clone(), Literal::Int(1)),
            not_flood_audit,
        ]),
        Category::FloodAudits => BoolExpr::Eq(sub.clone(), label),
    };
    Some(Condition::Composite { expr })
}

pub struct PredicateBuilder<'a> {
    kind: EntityKind,
    endpoint: &'a EntityEndpoint,
    aliases: Option<&'a BTreeMap<String, String>>,
    vocabulary: Option<&'a BTreeMap<String, Vec<String>>>,
}

impl<'a> PredicateBuilder<'a> {
    pub fn new(kind: EntityKind, endpoint: &'a EntityEndpoint) -> Self {
        Self {
            kind,
            endpoint,
            aliases: None,
            vocabulary: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &'a BTreeMap<String, String>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: &'a BTreeMap<String, Vec<String>>) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    fn equality_filters<'c>(
        &self,
        c: &'c FilterCriteria,
    ) -> Vec<(&'a FieldName, &'c Option<String>)> {
        let endpoint: &'a EntityEndpoint = self.endpoint;
        let f = &endpoint.filters;
        [(&f.status, &c.status), (&f.project_status, &c.project_status)]
            .into_iter()
            .filter_map(|(field, value)| field.as_ref().map(|field| (field, value)))
            .collect()
    }

    fn containment_filters<'c>(
        &self,
        c: &'c FilterCriteria,
    ) -> Vec<(&'a FieldName, &'c Option<String>)> {
        let endpoint: &'a EntityEndpoint = self.endpoint;
        let f = &endpoint.filters;
        [
            (&f.jurisdiction, &c.jurisdiction),
            (&f.project_partners, &c.project_partners),
            (&f.subshed, &c.subshed),
            (&f.category_report, &c.category_report),
            (&f.problem, &c.problem),
            (&f.frequency_problem, &c.frequency_problem),
        ]
        .into_iter()
        .filter_map(|(field, value)| field.as_ref().map(|field| (field, value)))
        .collect()
    }

    /// Fields whose vocabulary the equality filters in `criteria` resolve
    /// against.
    pub fn vocabulary_fields(&self, criteria: &FilterCriteria) -> Vec<FieldName> {
        self.equality_filters(criteria)
            .into_iter()
            .filter(|(_, v)| normalize_term(v.as_deref()).is_some())
            .map(|(field, _)| field.clone())
            .collect()
    }

    fn resolve_equality(&self, field: &FieldName, term: &str) -> String {
        match self.vocabulary.and_then(|v| v.get(field.as_str())) {
            Some(values) => resolve_term(term, values),
            None => term.to_string(),
        }
    }

    pub fn build(&self, criteria: &FilterCriteria) -> Result<QueryPredicate, BuildError> {
        let mut p = QueryPredicate::new();

        if let Some(ex) = &self.endpoint.archived {
            p.push(Condition::Composite {
                expr: BoolExpr::NotEq(ex.field.clone(), Literal::Text(ex.value.clone())),
            });
        }

        match &self.endpoint.categories {
            Some(fields) => {
                if let Some(c) = category_condition(fields, criteria.category) {
                    p.push(c);
                }
            }
            None if criteria.category.is_active() => {
                debug!(kind = self.kind.as_str(), "category ignored for kind");
            }
            None => {}
        }

        if let Some(field) = &self.endpoint.filters.project_types {
            let values: Vec<Literal> = criteria
                .project_types
                .iter()
                .filter_map(|t| normalize_term(Some(t)))
                .map(Literal::Text)
                .collect();
            if !values.is_empty() {
                p.push(Condition::InSet {
                    field: field.clone(),
                    values,
                });
            }
        }

        for (field, value) in self.equality_filters(criteria) {
            if let Some(term) = normalize_term(value.as_deref()) {
                p.push(Condition::EqualsIgnoreCase {
                    field: field.clone(),
                    value: self.resolve_equality(field, &term),
                });
            }
        }

        for (field, value) in self.containment_filters(criteria) {
            if let Some(term) = normalize_term(value.as_deref()) {
                let term = if Some(field) == self.endpoint.filters.jurisdiction.as_ref() {
                    match self.aliases {
                        Some(a) => apply_alias(&term, a),
                        None => term,
                    }
                } else {
                    term
                };
                p.push(Condition::ContainsIgnoreCase {
                    field: field.clone(),
                    value: term,
                });
            }
        }

        if p.is_empty() && !criteria.allow_unfiltered {
            return Err(BuildError::NoFilters);
        }
        Ok(p)
    }
}
