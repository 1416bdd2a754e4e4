//! JSON Schema generation for gc-core input and output types.
//!
//! Downstream tooling validates training artifacts, rate tables and event
//! streams against these schemas, and consumes bin records and verdicts.
//!
//! # Usage
//!
//! ```bash
//! # List available schema types
//! gc-core schema --list
//!
//! # Generate schema for a specific type
//! gc-core schema BinRecord
//!
//! # Generate all schemas
//! gc-core schema --all
//! ```

use schemars::schema_for;
use serde_json::Value;
use std::collections::BTreeMap;

pub use crate::catalog::{BinId, BinRecord, Provenance, TrainingArtifact};
pub use crate::classifier::ClassifierModel;
pub use crate::curve::CurvePoints;
pub use crate::evaluate::{EvaluationStats, EventVerdict, VerdictReason};
pub use crate::features::EventFeatures;
pub use crate::optimize::OptimizationTrial;
pub use crate::rates::RateTable;

/// Available schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        // Inputs
        ("TrainingArtifact", "Per-bin classifier and efficiency curves"),
        ("ClassifierModel", "Serialized classifier of a training artifact"),
        ("CurvePoints", "Sampled (threshold, efficiency) pairs"),
        ("RateTable", "Tabulated on/off rates for sensitivity optimization"),
        ("EventFeatures", "One reconstructed event"),
        // Resolution outputs
        ("BinId", "Grid coordinates of a bin"),
        ("Provenance", "How a bin's threshold was obtained"),
        ("BinRecord", "Resolved state of one bin"),
        (
            "OptimizationTrial",
            "One source strength tried by the sensitivity optimizer",
        ),
        // Evaluation outputs
        ("VerdictReason", "Why an event was accepted or rejected"),
        ("EventVerdict", "Accept/reject verdict for one event"),
        ("EvaluationStats", "Verdict counters for an evaluation run"),
    ]
}

/// Generate JSON Schema for a type by name.
///
/// Returns the schema as a serde_json::Value, or None if the type is unknown.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "TrainingArtifact" => schema_for!(TrainingArtifact),
        "ClassifierModel" => schema_for!(ClassifierModel),
        "CurvePoints" => schema_for!(CurvePoints),
        "RateTable" => schema_for!(RateTable),
        "EventFeatures" => schema_for!(EventFeatures),
        "BinId" => schema_for!(BinId),
        "Provenance" => schema_for!(Provenance),
        "BinRecord" => schema_for!(BinRecord),
        "OptimizationTrial" => schema_for!(OptimizationTrial),
        "VerdictReason" => schema_for!(VerdictReason),
        "EventVerdict" => schema_for!(EventVerdict),
        "EvaluationStats" => schema_for!(EvaluationStats),
        _ => return None,
    };

    serde_json::to_value(schema).ok()
}

/// Generate all schemas as a map from type name to schema.
pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    let mut schemas = BTreeMap::new();
    for (name, _desc) in available_schemas() {
        if let Some(schema) = generate_schema(name) {
            schemas.insert(name.to_string(), schema);
        }
    }
    schemas
}

/// Schema output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

/// Format a schema value for output.
pub fn format_schema(schema: &Value, format: SchemaFormat) -> String {
    let rendered = match format {
        SchemaFormat::Json => serde_json::to_string_pretty(schema),
        SchemaFormat::JsonCompact => serde_json::to_string(schema),
    };
    rendered.unwrap_or_else(|_| "{}".to_string())
}
