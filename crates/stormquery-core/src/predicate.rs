//! Structured where-clause tree.
//!
//! Predicates are built as data and only rendered to the service's SQL-92
//! subset by [`QueryPredicate::to_where`]. The same tree can be evaluated
//! against an attribute map, which is what the in-memory service does.

use crate::errors::ConfigError;
use crate::model::Attributes;
use crate::util::{escape_like, is_field_identifier, quote_literal, LIKE_ESCAPE};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldName(String);

impl FieldName {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if is_field_identifier(&name) {
            Ok(Self(name))
        } else {
            Err(ConfigError::InvalidField(name))
        }
    }

    /// For compile-time field names in preset configurations.
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(is_field_identifier(name));
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attribute lookup. The service treats field names case-insensitively,
    /// so fall back to a case-insensitive match.
    pub fn lookup<'a>(&self, attrs: &'a Attributes) -> Option<&'a JsonValue> {
        attrs
            .get(&self.0)
            .or_else(|| {
                attrs
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&self.0))
                    .map(|(_, v)| v)
            })
            .filter(|v| !v.is_null())
    }
}

impl TryFrom<String> for FieldName {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldName::new(value)
    }
}

impl TryFrom<&str> for FieldName {
    type Error = ConfigError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        FieldName::new(value)
    }
}

impl From<FieldName> for String {
    fn from(f: FieldName) -> Self {
        f.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Text(String),
}

impl Literal {
    fn to_sql(&self) -> String {
        match self {
            Literal::Int(n) => n.to_string(),
            Literal::Text(s) => quote_literal(s),
        }
    }

    fn matches(&self, v: &JsonValue) -> bool {
        match (self, v) {
            (Literal::Int(n), JsonValue::Number(x)) => {
                x.as_i64() == Some(*n) || x.as_f64() == Some(*n as f64)
            }
            (Literal::Int(n), JsonValue::String(s)) => s.trim().parse::<i64>().ok() == Some(*n),
            (Literal::Text(t), JsonValue::String(s)) => s == t,
            (Literal::Text(t), JsonValue::Number(x)) => x.to_string() == *t,
            _ => false,
        }
    }
}

impl From<&crate::model::RecordId> for Literal {
    fn from(id: &crate::model::RecordId) -> Self {
        match id {
            crate::model::RecordId::Int(n) => Literal::Int(*n),
            crate::model::RecordId::Text(s) => Literal::Text(s.clone()),
        }
    }
}

/// Boolean expression with SQL null semantics: comparisons against a missing
/// or null attribute are false, only `IsNull` matches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolExpr {
    IsNull(FieldName),
    Eq(FieldName, Literal),
    NotEq(FieldName, Literal),
    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
}

impl BoolExpr {
    fn is_compound(&self) -> bool {
        matches!(self, BoolExpr::And(_) | BoolExpr::Or(_))
    }

    fn to_sql(&self) -> String {
        match self {
            BoolExpr::IsNull(f) => format!("{} IS NULL", f),
            BoolExpr::Eq(f, v) => format!("{} = {}", f, v.to_sql()),
            BoolExpr::NotEq(f, v) => format!("{} <> {}", f, v.to_sql()),
            BoolExpr::And(items) if items.is_empty() => "1=1".to_string(),
            BoolExpr::Or(items) if items.is_empty() => "1=0".to_string(),
            BoolExpr::And(items) => join_nested(items, " AND "),
            BoolExpr::Or(items) => join_nested(items, " OR "),
        }
    }

    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            BoolExpr::IsNull(f) => f.lookup(attrs).is_none(),
            BoolExpr::Eq(f, v) => f.lookup(attrs).map(|x| v.matches(x)).unwrap_or(false),
            BoolExpr::NotEq(f, v) => f.lookup(attrs).map(|x| !v.matches(x)).unwrap_or(false),
            BoolExpr::And(items) => items.iter().all(|e| e.matches(attrs)),
            BoolExpr::Or(items) => items.iter().any(|e| e.matches(attrs)),
        }
    }
}

fn join_nested(items: &[BoolExpr], sep: &str) -> String {
    items
        .iter()
        .map(|e| {
            if e.is_compound() {
                format!("({})", e.to_sql())
            } else {
                e.to_sql()
            }
        })
        .collect::<Vec<_>>()
        .join(sep)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    EqualsIgnoreCase { field: FieldName, value: String },
    ContainsIgnoreCase { field: FieldName, value: String },
    InSet { field: FieldName, values: Vec<Literal> },
    Composite { expr: BoolExpr },
}

impl Condition {
    pub fn to_sql(&self) -> String {
        match self {
            Condition::EqualsIgnoreCase { field, value } => {
                format!("UPPER({}) = UPPER({})", field, quote_literal(value))
            }
            Condition::ContainsIgnoreCase { field, value } => match escape_like(value) {
                None => format!(
                    "UPPER({}) LIKE UPPER({})",
                    field,
                    quote_literal(&format!("%{}%", value))
                ),
                Some(escaped) => format!(
                    "UPPER({}) LIKE UPPER({}) ESCAPE {}",
                    field,
                    quote_literal(&format!("%{}%", escaped)),
                    quote_literal(&LIKE_ESCAPE.to_string())
                ),
            },
            Condition::InSet { values, .. } if values.is_empty() => "1=0".to_string(),
            Condition::InSet { field, values } => {
                let list = values
                    .iter()
                    .map(Literal::to_sql)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{} IN ({})", field, list)
            }
            Condition::Composite { expr } if expr.is_compound() => format!("({})", expr.to_sql()),
            Condition::Composite { expr } => expr.to_sql(),
        }
    }

    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            Condition::EqualsIgnoreCase { field, value } => field
                .lookup(attrs)
                .and_then(as_text)
                .map(|s| s.to_uppercase() == value.to_uppercase())
                .unwrap_or(false),
            Condition::ContainsIgnoreCase { field, value } => field
                .lookup(attrs)
                .and_then(as_text)
                .map(|s| s.to_uppercase().contains(&value.to_uppercase()))
                .unwrap_or(false),
            Condition::InSet { field, values } => field
                .lookup(attrs)
                .map(|x| values.iter().any(|v| v.matches(x)))
                .unwrap_or(false),
            Condition::Composite { expr } => expr.matches(attrs),
        }
    }
}

fn as_text(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Conditions ANDed together. An empty predicate renders as `1=1`; callers
/// must opt in before running one (see the predicate builder).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryPredicate {
    conditions: Vec<Condition>,
}

impl QueryPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conditions(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn push(&mut self, c: Condition) {
        self.conditions.push(c);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn to_where(&self) -> String {
        if self.conditions.is_empty() {
            return "1=1".to_string();
        }
        self.conditions
            .iter()
            .map(Condition::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub fn matches(&self, attrs: &Attributes) -> bool {
        self.conditions.iter().all(|c| c.matches(attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(s: &str) -> FieldName {
        FieldName::new(s).unwrap()
    }

    fn attrs(v: JsonValue) -> Attributes {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn renders_case_insensitive_operators() {
        let p = QueryPredicate::from_conditions(vec![
            Condition::EqualsIgnoreCase {
                field: field("status"),
                value: "Submitted".into(),
            },
            Condition::ContainsIgnoreCase {
                field: field("jurisdiction"),
                value: "O'Plaine".into(),
            },
        ]);
        assert_eq!(
            p.to_where(),
            "UPPER(status) = UPPER('Submitted') AND UPPER(jurisdiction) LIKE UPPER('%O''Plaine%')"
        );
    }

    #[test]
    fn renders_in_set_and_nested_composites() {
        let c = Condition::InSet {
            field: field("projecttype"),
            values: vec![Literal::Text("WMB".into()), Literal::Text("SIRF".into())],
        };
        assert_eq!(c.to_sql(), "projecttype IN ('WMB','SIRF')");

        let ids = Condition::InSet {
            field: field("project_id"),
            values: vec![Literal::Int(3), Literal::Int(9)],
        };
        assert_eq!(ids.to_sql(), "project_id IN (3,9)");

        let composite = Condition::Composite {
            expr: BoolExpr::And(vec![
                BoolExpr::Or(vec![
                    BoolExpr::IsNull(field("projectsubtype")),
                    BoolExpr::NotEq(field("projectsubtype"), Literal::Text("Flood Audit".into())),
                ]),
                BoolExpr::Eq(field("is_study"), Literal::Int(1)),
            ]),
        };
        assert_eq!(
            composite.to_sql(),
            "((projectsubtype IS NULL OR projectsubtype <> 'Flood Audit') AND is_study = 1)"
        );
    }

    #[test]
    fn empty_predicate_is_unscoped() {
        let p = QueryPredicate::new();
        assert!(p.is_empty());
        assert_eq!(p.to_where(), "1=1");
        assert!(p.matches(&attrs(json!({"anything": 1}))));
    }

    #[test]
    fn null_semantics_follow_sql() {
        let ne = BoolExpr::NotEq(field("status"), Literal::Text("Archived".into()));
        assert!(!ne.matches(&attrs(json!({"status": null}))));
        assert!(!ne.matches(&attrs(json!({}))));
        assert!(ne.matches(&attrs(json!({"status": "Active"}))));
        assert!(!ne.matches(&attrs(json!({"status": "Archived"}))));

        let is_null = BoolExpr::IsNull(field("projectsubtype"));
        assert!(is_null.matches(&attrs(json!({"projectsubtype": null}))));
        assert!(is_null.matches(&attrs(json!({}))));
    }

    #[test]
    fn like_wildcards_in_terms_match_literally() {
        let c = Condition::ContainsIgnoreCase {
            field: field("subshed"),
            value: "Mill_Creek 100%".into(),
        };
        assert_eq!(
            c.to_sql(),
            "UPPER(subshed) LIKE UPPER('%Mill\\_Creek 100\\%%') ESCAPE '\\'"
        );
        assert!(c.matches(&attrs(json!({"subshed": "Upper Mill_Creek 100% reach"}))));
        assert!(!c.matches(&attrs(json!({"subshed": "Mill-Creek 1000"}))));
    }

    #[test]
    fn case_insensitive_matching_and_field_lookup() {
        let c = Condition::ContainsIgnoreCase {
            field: field("Jurisdiction"),
            value: "chicago".into(),
        };
        assert!(c.matches(&attrs(json!({"jurisdiction": "North Chicago"}))));
        assert!(!c.matches(&attrs(json!({"jurisdiction": "Zion"}))));

        let eq = Condition::EqualsIgnoreCase {
            field: field("status"),
            value: "under review".into(),
        };
        assert!(eq.matches(&attrs(json!({"status": "Under Review"}))));
        assert!(!eq.matches(&attrs(json!({"status": "Under Review 2"}))));
    }

    #[test]
    fn numeric_literals_match_numbers_and_numeric_text() {
        let c = Condition::InSet {
            field: field("project_id"),
            values: vec![Literal::Int(7)],
        };
        assert!(c.matches(&attrs(json!({"project_id": 7}))));
        assert!(c.matches(&attrs(json!({"project_id": 7.0}))));
        assert!(c.matches(&attrs(json!({"project_id": "7"}))));
        assert!(!c.matches(&attrs(json!({"project_id": 8}))));
    }

    #[test]
    fn field_names_reject_injection() {
        assert!(FieldName::new("status").is_ok());
        assert!(FieldName::new("status = 1 OR 1").is_err());
        let parsed: Result<FieldName, _> = serde_json::from_value(json!("bad name"));
        assert!(parsed.is_err());
    }
}
