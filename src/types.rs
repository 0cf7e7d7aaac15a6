//! Core types shared by the loader, registry and validation loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of the draft-04 meta-schema every admitted schema must satisfy.
pub const META_SCHEMA_ID: &str = "http://json-schema.org/draft-04/schema";

/// Default timeout for outgoing fetches (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on resolve-and-retry rounds per validation.
pub const DEFAULT_MAX_ROUNDS: usize = 32;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize a schema identifier for registry keys.
///
/// Drops the fragment, so `http://host/s#` and `http://host/s` name the same
/// document.
pub fn normalize_id(id: &str) -> String {
    match id.find('#') {
        Some(idx) => id[..idx].to_string(),
        None => id.to_string(),
    }
}

/// The identifier a schema declares for itself (`id`, then `$id`), normalized.
pub fn declared_id(schema: &Value) -> Option<String> {
    schema
        .get("id")
        .or_else(|| schema.get("$id"))
        .and_then(Value::as_str)
        .map(normalize_id)
        .filter(|id| !id.is_empty())
}

/// A JSON Schema admitted into the registry.
///
/// Immutable once registered; re-admission under the same identifier
/// replaces the whole document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDocument {
    /// Identifier the document is registered under, if any.
    pub id: Option<String>,
    /// The raw schema.
    pub content: Value,
}

impl SchemaDocument {
    pub fn new(id: Option<String>, content: Value) -> Self {
        Self { id, content }
    }

    /// True for the bootstrap meta-schema.
    pub fn is_meta_schema(&self) -> bool {
        self.id.as_deref() == Some(META_SCHEMA_ID)
    }
}

/// Single validation error with data and schema location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaError {
    /// Human-readable error message.
    pub message: String,
    /// JSON Pointer (RFC 6901) into the validated document.
    pub data_path: String,
    /// JSON Pointer into the schema that produced the error.
    pub schema_path: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.data_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.data_path, self.message)
        }
    }
}

/// Result of one non-recursive validation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<SchemaError>),
    /// Schema identifiers the engine could not resolve. Takes precedence
    /// over structural errors found in the same pass.
    Missing(Vec<String>),
}

/// Options for remote resolution.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Per-request timeout used by the HTTP transport.
    pub timeout: Duration,
    /// Maximum resolve-and-retry rounds before a validation is abandoned.
    pub max_rounds: usize,
    /// User agent sent with every fetch.
    pub user_agent: String,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_rounds: DEFAULT_MAX_ROUNDS,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fetch timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the round cap. Values below 1 are raised to 1.
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
