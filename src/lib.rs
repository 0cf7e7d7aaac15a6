//! JSON Schema validation with on-demand remote resolution
//!
//! Validates JSON documents against JSON Schemas (draft-04) where either side
//! may be given inline or only by URL. Schemas referenced through `$ref`
//! that are not yet known are fetched, checked against the meta-schema,
//! registered, and validation is retried until nothing is missing.
//!
//! # Example
//!
//! ```
//! use json_schema_remote::{RemoteValidator, ValidateError};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let validator = RemoteValidator::new().unwrap();
//!
//! let schema = json!({
//!     "properties": {
//!         "intKey": { "type": "integer" },
//!         "stringKey": { "type": "string" }
//!     }
//! });
//!
//! validator
//!     .validate(json!({ "intKey": 1, "stringKey": "one" }), schema.clone())
//!     .await
//!     .unwrap();
//!
//! let err = validator
//!     .validate(json!({ "intKey": 1, "stringKey": false }), schema)
//!     .await
//!     .unwrap_err();
//! assert!(matches!(err, ValidateError::ValidationFailed { .. }));
//! assert_eq!(err.errors()[0].message, "Invalid type: boolean (expected string)");
//! # });
//! ```
//!
//! # Resolution
//!
//! | Reference | Handling |
//! |-----------|----------|
//! | object or array | used as-is |
//! | `http://`, `https://` or `ftp://` URL | fetched; overlapping fetches of one URL are shared |
//! | anything else | `LoadError::InvalidInput` |
//!
//! Registered schemas live in the [`RemoteValidator`] that fetched them and
//! are reused by every later call until [`RemoteValidator::drop_schemas`].

mod cache;
mod engine;
mod error;
mod loader;
mod registry;
mod remote;
mod transport;
mod types;
mod validator;

pub use cache::{FetchResult, RequestCache};
pub use engine::{EngineReport, JsonSchemaEngine, ValidationEngine};
pub use error::{LoadError, TransportError, ValidateError};
pub use loader::{classify, default_logger, is_url, parse_body, FetchLogger, Loader, Reference};
pub use registry::{SchemaRegistry, SchemaSnapshot, DRAFT04_META_SCHEMA};
pub use remote::{RemoteValidator, RemoteValidatorBuilder};
pub use transport::{OfflineTransport, Transport, TransportResponse};
pub use types::{
    declared_id, json_type_name, normalize_id, SchemaDocument, SchemaError, ValidationOutcome,
    ValidatorOptions, DEFAULT_MAX_ROUNDS, DEFAULT_TIMEOUT, META_SCHEMA_ID,
};
pub use validator::RecursiveValidator;

#[cfg(feature = "remote")]
pub use transport::HttpTransport;
