//! The validation capability consumed by the resolution loop.
//!
//! An engine validates one document against one schema in a single pass
//! and reports, alongside structural errors, every referenced schema
//! identifier it could not find among the known schemas. It never fetches
//! anything itself.

use std::sync::Arc;

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{Draft, Retrieve, Uri};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::registry::SchemaSnapshot;
use crate::types::{json_type_name, normalize_id, SchemaError, ValidationOutcome};

/// Raw result of one engine pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineReport {
    pub errors: Vec<SchemaError>,
    /// Referenced identifiers absent from the snapshot, normalized and
    /// without duplicates.
    pub missing: Vec<String>,
}

impl EngineReport {
    pub fn valid(&self) -> bool {
        self.errors.is_empty() && self.missing.is_empty()
    }

    /// Missing identifiers win over structural errors: a pass with
    /// unresolved references says nothing reliable about validity.
    pub fn into_outcome(self) -> ValidationOutcome {
        if !self.missing.is_empty() {
            ValidationOutcome::Missing(self.missing)
        } else if !self.errors.is_empty() {
            ValidationOutcome::Invalid(self.errors)
        } else {
            ValidationOutcome::Valid
        }
    }
}

pub trait ValidationEngine: Send + Sync {
    fn validate_multiple(&self, data: &Value, schema: &Value, known: &SchemaSnapshot)
        -> EngineReport;
}

/// Draft-04 engine backed by the `jsonschema` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaEngine;

impl JsonSchemaEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Serves `$ref` targets from a registry snapshot.
///
/// Unknown targets are recorded and answered with an empty schema so the
/// compile pass carries on and reports every missing identifier at once.
struct SnapshotRetriever {
    known: SchemaSnapshot,
    missing: Arc<Mutex<Vec<String>>>,
}

impl Retrieve for SnapshotRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let id = normalize_id(uri.as_str());
        if let Some(document) = self.known.get(&id) {
            return Ok(document.content.clone());
        }
        let mut missing = self.missing.lock();
        if !missing.contains(&id) {
            missing.push(id);
        }
        Ok(json!({}))
    }
}

impl ValidationEngine for JsonSchemaEngine {
    fn validate_multiple(
        &self,
        data: &Value,
        schema: &Value,
        known: &SchemaSnapshot,
    ) -> EngineReport {
        let missing = Arc::new(Mutex::new(Vec::new()));

        let mut options = jsonschema::options();
        options.with_draft(Draft::Draft4);
        options.with_retriever(SnapshotRetriever {
            known: known.clone(),
            missing: Arc::clone(&missing),
        });

        let errors = match options.build(schema) {
            Ok(validator) => validator
                .iter_errors(data)
                .map(|error| to_schema_error(error, schema))
                .collect(),
            Err(e) => vec![SchemaError {
                message: e.to_string(),
                data_path: String::new(),
                schema_path: e.schema_path.to_string(),
            }],
        };

        let missing = std::mem::take(&mut *missing.lock());
        if missing.is_empty() {
            EngineReport {
                errors,
                missing,
            }
        } else {
            EngineReport {
                errors: Vec::new(),
                missing,
            }
        }
    }
}

fn to_schema_error(error: jsonschema::ValidationError<'_>, schema: &Value) -> SchemaError {
    SchemaError {
        message: describe(&error, schema),
        data_path: error.instance_path.to_string(),
        schema_path: error.schema_path.to_string(),
    }
}

/// Message text in the classic draft-04 wording where one exists.
fn describe(error: &jsonschema::ValidationError<'_>, schema: &Value) -> String {
    match &error.kind {
        ValidationErrorKind::Type { kind } => {
            let expected = match kind {
                TypeKind::Single(expected) => expected.to_string(),
                TypeKind::Multiple(types) => declared_types(error, schema).unwrap_or_else(|| {
                    (*types)
                        .into_iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join("/")
                }),
            };
            format!(
                "Invalid type: {} (expected {})",
                json_type_name(&error.instance),
                expected
            )
        }
        ValidationErrorKind::Required { property } => match property.as_str() {
            Some(name) => format!("Missing required property: {name}"),
            None => format!("Missing required property: {property}"),
        },
        _ => error.to_string(),
    }
}

/// The `type` array as written, when the keyword is reachable from the root
/// schema without following a `$ref`.
fn declared_types(error: &jsonschema::ValidationError<'_>, schema: &Value) -> Option<String> {
    let names = schema
        .pointer(&error.schema_path.to_string())?
        .as_array()?
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()?;
    Some(names.join("/"))
}
