//! Schema registry keyed by schema identifier.
//!
//! Every entry satisfies the draft-04 meta-schema, which is itself present
//! from construction on and is never validated against itself. Admissions
//! are stamped with a monotonically increasing generation so callers can
//! tell whether an entry existed when they took a [`SchemaSnapshot`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::engine::ValidationEngine;
use crate::error::ValidateError;
use crate::types::{
    declared_id, normalize_id, SchemaDocument, SchemaError, ValidationOutcome, META_SCHEMA_ID,
};

#[derive(Debug, Clone)]
struct Entry {
    document: Arc<SchemaDocument>,
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, Entry>,
    generation: u64,
}

/// Immutable point-in-time view of the registry.
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    generation: u64,
    schemas: Arc<HashMap<String, Arc<SchemaDocument>>>,
}

impl SchemaSnapshot {
    /// Registry generation the snapshot was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: &str) -> Option<&SchemaDocument> {
        self.schemas.get(id).map(|document| document.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
    meta: Arc<SchemaDocument>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Create a registry holding only the meta-schema.
    pub fn new() -> Self {
        let meta = Arc::new(SchemaDocument::new(
            Some(META_SCHEMA_ID.to_string()),
            draft04_meta_schema(),
        ));
        Self {
            inner: RwLock::new(Inner {
                entries: bootstrap_entries(&meta),
                generation: 0,
            }),
            meta,
        }
    }

    pub fn meta_schema(&self) -> Arc<SchemaDocument> {
        Arc::clone(&self.meta)
    }

    /// Validate `schema` against the meta-schema and store it.
    ///
    /// The document is stored under `explicit_id` when given, else under the
    /// identifier it declares; with neither it is returned without being
    /// stored. Re-admitting an identifier replaces the previous entry.
    /// Admitting under the meta-schema identifier returns the bootstrap
    /// document unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidSchema` with the meta-schema errors.
    pub fn admit(
        &self,
        engine: &dyn ValidationEngine,
        schema: Value,
        explicit_id: Option<&str>,
    ) -> Result<Arc<SchemaDocument>, ValidateError> {
        let id = explicit_id
            .map(normalize_id)
            .filter(|id| !id.is_empty())
            .or_else(|| declared_id(&schema));

        if id.as_deref() == Some(META_SCHEMA_ID) {
            return Ok(self.meta_schema());
        }

        let report = engine.validate_multiple(&schema, &self.meta.content, &self.snapshot());
        match report.into_outcome() {
            ValidationOutcome::Valid => {}
            ValidationOutcome::Invalid(errors) => {
                return Err(ValidateError::InvalidSchema { errors });
            }
            ValidationOutcome::Missing(ids) => {
                let errors = ids
                    .into_iter()
                    .map(|id| SchemaError {
                        message: format!("Unresolved meta-schema reference: {id}"),
                        data_path: String::new(),
                        schema_path: String::new(),
                    })
                    .collect();
                return Err(ValidateError::InvalidSchema { errors });
            }
        }

        let document = Arc::new(SchemaDocument::new(id.clone(), schema));
        if let Some(id) = id {
            let mut inner = self.inner.write();
            inner.generation += 1;
            let generation = inner.generation;
            debug!(id = %id, generation, "schema admitted");
            inner.entries.insert(
                id,
                Entry {
                    document: Arc::clone(&document),
                    generation,
                },
            );
        }
        Ok(document)
    }

    /// Look up a schema. Never performs I/O.
    pub fn lookup(&self, id: &str) -> Option<Arc<SchemaDocument>> {
        self.inner
            .read()
            .entries
            .get(&normalize_id(id))
            .map(|entry| Arc::clone(&entry.document))
    }

    /// Generation at which `id` was admitted, if present.
    pub fn generation_of(&self, id: &str) -> Option<u64> {
        self.inner
            .read()
            .entries
            .get(&normalize_id(id))
            .map(|entry| entry.generation)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().entries.contains_key(&normalize_id(id))
    }

    /// Number of registered schemas, the meta-schema included.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn snapshot(&self) -> SchemaSnapshot {
        let inner = self.inner.read();
        SchemaSnapshot {
            generation: inner.generation,
            schemas: Arc::new(
                inner
                    .entries
                    .iter()
                    .map(|(id, entry)| (id.clone(), Arc::clone(&entry.document)))
                    .collect(),
            ),
        }
    }

    /// Drop everything except the meta-schema.
    ///
    /// The generation counter keeps counting, so snapshots taken before the
    /// reset still compare correctly against later admissions.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.entries = bootstrap_entries(&self.meta);
        debug!(generation = inner.generation, "schema registry reset");
    }
}

fn bootstrap_entries(meta: &Arc<SchemaDocument>) -> HashMap<String, Entry> {
    let mut entries = HashMap::new();
    entries.insert(
        META_SCHEMA_ID.to_string(),
        Entry {
            document: Arc::clone(meta),
            generation: 0,
        },
    );
    entries
}

/// The JSON Schema draft-04 core meta-schema.
pub const DRAFT04_META_SCHEMA: &str = include_str!("../schema/draft-04.json");

fn draft04_meta_schema() -> Value {
    serde_json::from_str(DRAFT04_META_SCHEMA)
        .expect("embedded draft-04 meta-schema must be valid JSON")
}
