//! Analysis schema and partial / aggregated analysis records.
//!
//! Every schema field declares how it merges across partial analyses:
//!
//! - [`FieldKind::Scalar`]: one value from a closed set (e.g. risk level)
//! - [`FieldKind::Set`]: deduplicated, unordered tags
//! - [`FieldKind::List`]: accumulated free text, order preserved
//!
//! Model output is coerced into a record by dispatching on the declared
//! kind, never on the JSON container type the model happened to emit.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// Placeholder for scalar fields with no usable value.
pub const UNKNOWN: &str = "unknown";

/// Merge kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// One value from a closed set.
    Scalar,
    /// Unordered set of strings.
    Set,
    /// Ordered list of strings.
    List,
}

/// Declaration of one schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// JSON key of the field.
    pub name: String,
    /// How the field merges.
    pub kind: FieldKind,
    /// Allowed values for scalar fields (empty = any value).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
    /// Description given to the model.
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    /// Declares a scalar field with a closed value set.
    #[must_use]
    pub fn scalar(name: &str, allowed: &[&str], description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Scalar,
            allowed: allowed.iter().map(|s| (*s).to_string()).collect(),
            description: description.to_string(),
        }
    }

    /// Declares a set field.
    #[must_use]
    pub fn set(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Set,
            allowed: Vec::new(),
            description: description.to_string(),
        }
    }

    /// Declares a list field.
    #[must_use]
    pub fn list(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::List,
            allowed: Vec::new(),
            description: description.to_string(),
        }
    }

    /// Maps a raw scalar to its canonical allowed spelling.
    ///
    /// Comma-separated input is split so already-merged values stay valid.
    /// Values outside the allowed set are dropped; an empty result is
    /// [`UNKNOWN`].
    pub(crate) fn normalize_scalar(&self, raw: &str) -> String {
        let mut kept: BTreeSet<String> = BTreeSet::new();
        for part in raw.split(',').map(str::trim) {
            if part.is_empty() || part.eq_ignore_ascii_case(UNKNOWN) {
                continue;
            }
            if self.allowed.is_empty() {
                kept.insert(part.to_string());
            } else if let Some(canonical) =
                self.allowed.iter().find(|a| a.eq_ignore_ascii_case(part))
            {
                kept.insert(canonical.clone());
            }
        }
        if kept.is_empty() {
            UNKNOWN.to_string()
        } else {
            kept.into_iter().collect::<Vec<_>>().join(", ")
        }
    }
}

/// A merged or partial field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scalar value (or `", "`-joined set of scalar values after merging).
    Scalar(String),
    /// Deduplicated, sorted tags.
    Set(BTreeSet<String>),
    /// Ordered free-text items.
    List(Vec<String>),
}

impl FieldValue {
    /// Empty value for a field kind.
    #[must_use]
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Scalar => Self::Scalar(UNKNOWN.to_string()),
            FieldKind::Set => Self::Set(BTreeSet::new()),
            FieldKind::List => Self::List(Vec::new()),
        }
    }

    /// Scalar value, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a set or list (empty for scalars).
    #[must_use]
    pub fn items(&self) -> Vec<&str> {
        match self {
            Self::Scalar(_) => Vec::new(),
            Self::Set(items) => items.iter().map(String::as_str).collect(),
            Self::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// One successful partial analysis, keyed by schema field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisRecord {
    /// Field values.
    pub fields: BTreeMap<String, FieldValue>,
}

impl AnalysisRecord {
    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Marker left in place of a unit whose call failed after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMarker {
    /// Last error message.
    pub error: String,
    /// Start of the raw model output, when the failure was a parse error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

impl ErrorMarker {
    /// Maximum characters kept from the raw output.
    pub const EXCERPT_CHARS: usize = 200;

    /// Builds a marker from the last error of a unit.
    #[must_use]
    pub fn from_error(error: &AgentError) -> Self {
        Self {
            error: error.to_string(),
            raw_excerpt: error.raw_excerpt(Self::EXCERPT_CHARS),
        }
    }
}

/// Result of one unit of work: a record or an error marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialAnalysis {
    /// Successful record.
    Record(AnalysisRecord),
    /// Failed unit.
    Error(ErrorMarker),
}

impl PartialAnalysis {
    /// Returns `true` for error markers.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A schema-shaped record merged from many partial analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedAnalysis {
    /// Merged field values, one per schema field.
    pub fields: BTreeMap<String, FieldValue>,
    /// Partials that contributed (non-error).
    pub contributing: usize,
    /// Partials skipped because they were error markers.
    pub skipped: usize,
}

impl AggregatedAnalysis {
    /// Returns a merged field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The merged fields as a flat JSON object matching the schema.
    #[must_use]
    pub fn fields_json(&self) -> Value {
        serde_json::to_value(&self.fields).unwrap_or(Value::Null)
    }
}

/// Ordered set of field declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSchema {
    /// Field declarations, in prompt order.
    pub fields: Vec<FieldSpec>,
}

impl AnalysisSchema {
    /// Creates a schema, rejecting empty or duplicate field names.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Validation`] if the schema is empty or a field
    /// name is blank or repeated.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, AgentError> {
        if fields.is_empty() {
            return Err(AgentError::Validation {
                message: "analysis schema has no fields".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(AgentError::Validation {
                    message: "analysis schema field with empty name".to_string(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(AgentError::Validation {
                    message: format!("duplicate schema field: {}", field.name),
                });
            }
        }
        Ok(Self { fields })
    }

    /// Parses a schema from its JSON form (`{"fields": [...]}`).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Validation`] on malformed JSON or an invalid schema.
    pub fn from_json_str(json: &str) -> Result<Self, AgentError> {
        let parsed: Self = serde_json::from_str(json).map_err(|e| AgentError::Validation {
            message: format!("invalid schema JSON: {e}"),
        })?;
        Self::new(parsed.fields)
    }

    /// Default schema for company / pitch-deck analysis.
    #[must_use]
    pub fn company_default() -> Self {
        Self {
            fields: vec![
                FieldSpec::scalar(
                    "risk_level",
                    &["low", "medium", "high"],
                    "Overall investment risk suggested by this text",
                ),
                FieldSpec::scalar(
                    "funding_stage",
                    &[
                        "pre-seed", "seed", "series-a", "series-b", "series-c", "growth", "public",
                    ],
                    "Funding stage of the company",
                ),
                FieldSpec::scalar(
                    "business_model",
                    &["b2b", "b2c", "b2b2c", "marketplace", "saas", "hardware", "services"],
                    "Primary business model",
                ),
                FieldSpec::set("industries", "Industries or verticals the company operates in"),
                FieldSpec::set("technologies", "Technologies, platforms or techniques used"),
                FieldSpec::set("target_customers", "Customer segments served"),
                FieldSpec::list("key_facts", "Concrete facts: figures, dates, names, claims"),
                FieldSpec::list("team_highlights", "Founders, key hires, relevant experience"),
                FieldSpec::list("traction_signals", "Revenue, users, growth, partnerships"),
                FieldSpec::list("red_flags", "Inconsistencies, risks, missing information"),
            ],
        }
    }

    /// Schema used to merge topic-targeted extraction results.
    #[must_use]
    pub fn topic_sections() -> Self {
        Self {
            fields: vec![
                FieldSpec::set("covered_topics", "Topics with a successful extraction"),
                FieldSpec::list("sections", "Extracted text per topic"),
            ],
        }
    }

    /// Returns the declaration of a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Record with every field empty (`"unknown"` scalars, empty sets/lists).
    #[must_use]
    pub fn empty_record(&self) -> AnalysisRecord {
        AnalysisRecord {
            fields: self
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldValue::empty(f.kind)))
                .collect(),
        }
    }

    /// Describes the expected JSON object for a prompt.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::from("{\n");
        for (i, field) in self.fields.iter().enumerate() {
            let shape = match field.kind {
                FieldKind::Scalar if field.allowed.is_empty() => "\"<string>\"".to_string(),
                FieldKind::Scalar => {
                    let mut opts: Vec<String> =
                        field.allowed.iter().map(|a| format!("\"{a}\"")).collect();
                    opts.push(format!("\"{UNKNOWN}\""));
                    opts.join(" | ")
                }
                FieldKind::Set | FieldKind::List => "[\"<string>\", ...]".to_string(),
            };
            let sep = if i + 1 == self.fields.len() { "" } else { "," };
            let _ = writeln!(
                out,
                "  \"{}\": {shape}{sep}  // {}",
                field.name, field.description
            );
        }
        out.push('}');
        out
    }

    /// Converts a model-produced JSON object into a record.
    ///
    /// Missing fields become empty values; keys not in the schema are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ResponseParse`] if `value` is not a JSON object.
    pub fn record_from_json(&self, value: &Value) -> Result<AnalysisRecord, AgentError> {
        let Some(object) = value.as_object() else {
            return Err(AgentError::ResponseParse {
                message: format!("expected a JSON object, got {}", json_type(value)),
                content: value.to_string(),
            });
        };

        let fields = self
            .fields
            .iter()
            .map(|spec| {
                let raw = object.get(&spec.name).unwrap_or(&Value::Null);
                let parsed = match spec.kind {
                    FieldKind::Scalar => {
                        FieldValue::Scalar(spec.normalize_scalar(&scalar_text(raw)))
                    }
                    FieldKind::Set => FieldValue::Set(string_items(raw).into_iter().collect()),
                    FieldKind::List => FieldValue::List(string_items(raw)),
                };
                (spec.name.clone(), parsed)
            })
            .collect();

        Ok(AnalysisRecord { fields })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn string_items(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        other => vec![other.to_string()],
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json_dispatches_on_declared_kind() {
        let schema = AnalysisSchema::company_default();
        let record = schema
            .record_from_json(&json!({
                "risk_level": "HIGH",
                "industries": "fintech",
                "key_facts": ["Founded 2019", "  ", "ARR $2M"],
                "unexpected": 1
            }))
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            record.get("risk_level").and_then(FieldValue::as_scalar),
            Some("high")
        );
        assert_eq!(
            record.get("industries").map(FieldValue::items),
            Some(vec!["fintech"])
        );
        assert_eq!(
            record.get("key_facts").map(FieldValue::items),
            Some(vec!["Founded 2019", "ARR $2M"])
        );
        assert_eq!(
            record.get("funding_stage").and_then(FieldValue::as_scalar),
            Some(UNKNOWN)
        );
        assert!(record.get("unexpected").is_none());
    }

    #[test]
    fn test_scalar_outside_allowed_set_is_unknown() {
        let schema = AnalysisSchema::company_default();
        let record = schema
            .record_from_json(&json!({"risk_level": "catastrophic"}))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(
            record.get("risk_level").and_then(FieldValue::as_scalar),
            Some(UNKNOWN)
        );
    }

    #[test]
    fn test_record_from_non_object_is_parse_error() {
        let schema = AnalysisSchema::company_default();
        let result = schema.record_from_json(&json!(["risk_level"]));
        assert!(matches!(result, Err(AgentError::ResponseParse { .. })));
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        let result = AnalysisSchema::new(vec![
            FieldSpec::set("tags", ""),
            FieldSpec::list("tags", ""),
        ]);
        assert!(result.is_err());
        assert!(AnalysisSchema::new(Vec::new()).is_err());
    }

    #[test]
    fn test_schema_from_json() {
        let json = r#"{"fields": [
            {"name": "stage", "kind": "scalar", "allowed": ["seed", "series-a"]},
            {"name": "tags", "kind": "set"},
            {"name": "notes", "kind": "list", "description": "free text"}
        ]}"#;
        let schema = AnalysisSchema::from_json_str(json).unwrap_or_else(|_| unreachable!());
        assert_eq!(schema.fields.len(), 3);
        assert_eq!(
            schema.field("stage").map(|f| f.kind),
            Some(FieldKind::Scalar)
        );
        assert_eq!(schema.field("notes").map(|f| f.kind), Some(FieldKind::List));
    }

    #[test]
    fn test_describe_lists_every_field() {
        let schema = AnalysisSchema::company_default();
        let described = schema.describe();
        for field in &schema.fields {
            assert!(described.contains(&format!("\"{}\"", field.name)));
        }
        assert!(described.contains("\"low\" | \"medium\" | \"high\" | \"unknown\""));
    }

    #[test]
    fn test_error_marker_keeps_excerpt() {
        let err = AgentError::ResponseParse {
            message: "bad".to_string(),
            content: "not json at all".to_string(),
        };
        let marker = ErrorMarker::from_error(&err);
        assert_eq!(marker.raw_excerpt.as_deref(), Some("not json at all"));
        assert!(marker.error.contains("bad"));
    }

    #[test]
    fn test_aggregated_fields_json_is_flat() {
        let schema = AnalysisSchema::topic_sections();
        let agg = AggregatedAnalysis {
            fields: schema.empty_record().fields,
            contributing: 0,
            skipped: 2,
        };
        let json = agg.fields_json();
        assert_eq!(json["covered_topics"], json!([]));
        assert_eq!(json["sections"], json!([]));
    }
}
