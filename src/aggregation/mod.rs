//! Merging of partial analyses into one schema-shaped record.
//!
//! Merge rules follow each field's declared [`FieldKind`]:
//!
//! | Kind   | Rule                                                               |
//! |--------|--------------------------------------------------------------------|
//! | scalar | distinct known values, sorted, `", "`-joined; `"unknown"` if none  |
//! | set    | union, blanks dropped, sorted                                      |
//! | list   | concatenation in input order, blanks dropped, first occurrence wins|
//!
//! Error markers contribute nothing. Merging never fails.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::core::{
    AggregatedAnalysis, AnalysisRecord, AnalysisSchema, FieldKind, FieldSpec, FieldValue,
    PartialAnalysis,
};

/// Merges partial analyses according to `schema`.
///
/// The result has exactly one value per schema field. For list fields the
/// order of `partials` decides the item order; callers pass partials sorted
/// by unit index.
#[must_use]
pub fn merge(partials: &[PartialAnalysis], schema: &AnalysisSchema) -> AggregatedAnalysis {
    let records: Vec<&AnalysisRecord> = partials
        .iter()
        .filter_map(|p| match p {
            PartialAnalysis::Record(r) => Some(r),
            PartialAnalysis::Error(_) => None,
        })
        .collect();
    let skipped = partials.len() - records.len();

    let fields: BTreeMap<String, FieldValue> = schema
        .fields
        .iter()
        .map(|spec| (spec.name.clone(), merge_field(spec, &records)))
        .collect();

    debug!(
        contributing = records.len(),
        skipped,
        fields = fields.len(),
        "merged partial analyses"
    );

    AggregatedAnalysis {
        fields,
        contributing: records.len(),
        skipped,
    }
}

fn merge_field(spec: &FieldSpec, records: &[&AnalysisRecord]) -> FieldValue {
    let values = records.iter().filter_map(|r| r.get(&spec.name));

    match spec.kind {
        FieldKind::Scalar => {
            let joined = values
                .filter_map(FieldValue::as_scalar)
                .collect::<Vec<_>>()
                .join(",");
            FieldValue::Scalar(spec.normalize_scalar(&joined))
        }
        FieldKind::Set => FieldValue::Set(
            values
                .flat_map(FieldValue::items)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<BTreeSet<_>>(),
        ),
        FieldKind::List => {
            let mut seen = HashSet::new();
            FieldValue::List(
                values
                    .flat_map(FieldValue::items)
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && seen.insert(*s))
                    .map(str::to_string)
                    .collect(),
            )
        }
    }
}

/// Converts a merged analysis back into a partial record, so aggregates can
/// be merged again (e.g. across documents).
#[must_use]
pub fn as_partial(aggregated: &AggregatedAnalysis) -> PartialAnalysis {
    PartialAnalysis::Record(AnalysisRecord {
        fields: aggregated.fields.clone(),
    })
}
