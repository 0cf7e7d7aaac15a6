//! Error types for loading and validation.

use std::sync::Arc;

use thiserror::Error;

use crate::types::SchemaError;

/// Failure reported by a [`Transport`](crate::Transport).
///
/// Cloneable so a single failed fetch can be handed, unchanged, to every
/// caller waiting on it.
#[derive(Debug, Clone)]
pub struct TransportError {
    inner: Arc<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            inner: Arc::from(err.into()),
        }
    }

    /// The underlying transport error.
    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.inner
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Errors while turning a reference into a concrete document.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("No valid {expected}: expected a URL or a structured document")]
    InvalidInput { expected: &'static str },

    #[error("could not load {url}: HTTP status {status}")]
    RemoteLoad { url: String, status: u16 },

    #[error("could not parse response from {url}: {message}")]
    InvalidBody { url: String, message: String },

    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The schema itself failed the meta-schema.
    #[error("No valid JSON Schema")]
    InvalidSchema { errors: Vec<SchemaError> },

    /// The data failed the target schema.
    #[error("JSON Schema Validation error")]
    ValidationFailed { errors: Vec<SchemaError> },

    #[error("possibly faulty schema: {id} was reported missing but is already registered")]
    FaultySchemaCycle { id: String },

    #[error("gave up resolving referenced schemas after {rounds} rounds")]
    ResolutionLimit { rounds: usize },

    #[error("schema declares no id and none was given")]
    MissingId,
}

impl ValidateError {
    /// Per-location error details, empty for kinds that carry none.
    pub fn errors(&self) -> &[SchemaError] {
        match self {
            ValidateError::InvalidSchema { errors } | ValidateError::ValidationFailed { errors } => {
                errors
            }
            _ => &[],
        }
    }
}
