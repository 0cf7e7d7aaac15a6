//! Recursive validation: validate, fetch whatever was missing, retry.

use std::collections::HashSet;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::ValidationEngine;
use crate::error::{LoadError, ValidateError};
use crate::loader::{is_url, Loader};
use crate::registry::SchemaRegistry;
use crate::types::{normalize_id, SchemaDocument, ValidationOutcome, ValidatorOptions};

/// Drives one validation to completion against shared registry state.
pub struct RecursiveValidator<'a> {
    registry: &'a SchemaRegistry,
    engine: &'a dyn ValidationEngine,
    loader: &'a Loader,
    options: &'a ValidatorOptions,
}

impl<'a> RecursiveValidator<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        engine: &'a dyn ValidationEngine,
        loader: &'a Loader,
        options: &'a ValidatorOptions,
    ) -> Self {
        Self {
            registry,
            engine,
            loader,
            options,
        }
    }

    /// Validate `data` against an admitted `schema`, resolving missing
    /// referenced schemas until the engine reports none.
    ///
    /// Each round re-validates from scratch, since a newly registered schema
    /// can make further references reachable.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` / `InvalidSchema` when the engine reports errors
    ///   (the latter when `schema` is the meta-schema)
    /// - `FaultySchemaCycle` when a schema the engine already had is reported
    ///   missing, or one this call resolved is reported missing again while
    ///   still registered
    /// - `ResolutionLimit` after `max_rounds` rounds
    /// - any load or admission error from resolving a missing schema
    pub async fn run(&self, data: &Value, schema: &SchemaDocument) -> Result<(), ValidateError> {
        let mut resolved: HashSet<String> = HashSet::new();

        for round in 1..=self.options.max_rounds {
            let snapshot = self.registry.snapshot();
            let report = self
                .engine
                .validate_multiple(data, &schema.content, &snapshot);

            match report.into_outcome() {
                ValidationOutcome::Valid => {
                    debug!(round, "validation passed");
                    return Ok(());
                }
                ValidationOutcome::Invalid(errors) => {
                    debug!(round, errors = errors.len(), "validation failed");
                    return Err(if schema.is_meta_schema() {
                        ValidateError::InvalidSchema { errors }
                    } else {
                        ValidateError::ValidationFailed { errors }
                    });
                }
                ValidationOutcome::Missing(ids) => {
                    debug!(round, missing = ?ids, "resolving missing schemas");
                    let mut pending = Vec::with_capacity(ids.len());
                    for id in ids {
                        let id = normalize_id(&id);
                        // an id dropped by a concurrent reset is fetched again
                        if !resolved.insert(id.clone()) && self.registry.contains(&id) {
                            warn!(id = %id, "schema reported missing again after resolution");
                            return Err(ValidateError::FaultySchemaCycle { id });
                        }
                        pending.push(id);
                    }
                    try_join_all(
                        pending
                            .iter()
                            .map(|id| self.resolve_missing(id, snapshot.generation())),
                    )
                    .await?;
                }
            }
        }

        Err(ValidateError::ResolutionLimit {
            rounds: self.options.max_rounds,
        })
    }

    /// Fetch and admit one missing schema.
    ///
    /// `seen_generation` is the registry generation the engine pass saw. An
    /// entry at or below it was visible to the engine, so reporting it
    /// missing is inconsistent; a newer one was registered concurrently.
    async fn resolve_missing(&self, id: &str, seen_generation: u64) -> Result<(), ValidateError> {
        if let Some(generation) = self.registry.generation_of(id) {
            if generation <= seen_generation {
                warn!(id, "registered schema reported missing");
                return Err(ValidateError::FaultySchemaCycle { id: id.to_string() });
            }
            debug!(id, "schema registered concurrently");
            return Ok(());
        }

        if !is_url(id) {
            return Err(LoadError::InvalidInput {
                expected: "JSON Schema",
            }
            .into());
        }

        let content = self.loader.fetch_json(id, "schema").await?;
        self.registry.admit(self.engine, content, Some(id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineReport, JsonSchemaEngine};
    use crate::error::TransportError;
    use crate::registry::SchemaSnapshot;
    use crate::transport::{Transport, TransportResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct MapTransport {
        bodies: HashMap<String, Value>,
        calls: AtomicUsize,
    }

    impl MapTransport {
        fn with(mut self, url: &str, body: Value) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }
    }

    #[async_trait]
    impl Transport for MapTransport {
        async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.bodies.get(url) {
                Some(body) => Ok(TransportResponse::new(200, body.to_string())),
                None => Ok(TransportResponse::new(404, "")),
            }
        }
    }

    /// Reports a fresh identifier missing on every pass.
    struct EndlessEngine {
        passes: AtomicUsize,
    }

    impl ValidationEngine for EndlessEngine {
        fn validate_multiple(
            &self,
            _data: &Value,
            schema: &Value,
            _known: &SchemaSnapshot,
        ) -> EngineReport {
            if schema.get("description").and_then(Value::as_str) == Some("Core schema meta-schema")
            {
                return EngineReport::default();
            }
            let n = self.passes.fetch_add(1, Ordering::SeqCst);
            EngineReport {
                errors: Vec::new(),
                missing: vec![format!("http://example.com/s{n}")],
            }
        }
    }

    /// Reports one schema missing twice, dropping the registry in between
    /// as a concurrent `drop_schemas` would.
    struct ResettingEngine {
        registry: Arc<SchemaRegistry>,
        passes: AtomicUsize,
    }

    impl ValidationEngine for ResettingEngine {
        fn validate_multiple(
            &self,
            _data: &Value,
            schema: &Value,
            _known: &SchemaSnapshot,
        ) -> EngineReport {
            if schema.get("description").and_then(Value::as_str) == Some("Core schema meta-schema")
            {
                return EngineReport::default();
            }
            match self.passes.fetch_add(1, Ordering::SeqCst) {
                0 => EngineReport {
                    errors: Vec::new(),
                    missing: vec!["http://example.com/a".to_string()],
                },
                1 => {
                    self.registry.reset();
                    EngineReport {
                        errors: Vec::new(),
                        missing: vec!["http://example.com/a".to_string()],
                    }
                }
                _ => EngineReport::default(),
            }
        }
    }

    struct Fixture {
        registry: SchemaRegistry,
        loader: Loader,
        transport: Arc<MapTransport>,
        options: ValidatorOptions,
    }

    impl Fixture {
        fn new(transport: MapTransport) -> Self {
            let transport = Arc::new(transport);
            Self {
                registry: SchemaRegistry::new(),
                loader: Loader::new(transport.clone()),
                transport,
                options: ValidatorOptions::default(),
            }
        }

        async fn run(
            &self,
            engine: &dyn ValidationEngine,
            data: Value,
            schema: Value,
        ) -> Result<(), ValidateError> {
            let schema = self.registry.admit(engine, schema, None)?;
            RecursiveValidator::new(&self.registry, engine, &self.loader, &self.options)
                .run(&data, &schema)
                .await
        }
    }

    #[tokio::test]
    async fn resolves_chained_remote_refs() {
        let fixture = Fixture::new(
            MapTransport::default()
                .with(
                    "http://example.com/point.json",
                    json!({
                        "type": "object",
                        "properties": {
                            "x": { "$ref": "http://example.com/coord.json" },
                            "y": { "$ref": "http://example.com/coord.json" }
                        }
                    }),
                )
                .with("http://example.com/coord.json", json!({ "type": "number" })),
        );

        let schema = json!({
            "properties": { "origin": { "$ref": "http://example.com/point.json#" } }
        });

        fixture
            .run(&JsonSchemaEngine, json!({ "origin": { "x": 1, "y": 2 } }), schema.clone())
            .await
            .unwrap();
        assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 2);
        assert!(fixture.registry.contains("http://example.com/point.json"));
        assert!(fixture.registry.contains("http://example.com/coord.json"));

        let err = fixture
            .run(&JsonSchemaEngine, json!({ "origin": { "x": "1" } }), schema)
            .await
            .unwrap_err();
        assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.to_string(), "JSON Schema Validation error");
        assert_eq!(err.errors()[0].message, "Invalid type: string (expected number)");
    }

    #[tokio::test]
    async fn missing_remote_schema_aborts() {
        let fixture = Fixture::new(MapTransport::default());
        let err = fixture
            .run(
                &JsonSchemaEngine,
                json!({ "a": 1 }),
                json!({ "properties": { "a": { "$ref": "http://example.com/gone.json" } } }),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Load(LoadError::RemoteLoad { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_remote_schema_is_invalid_schema() {
        let fixture = Fixture::new(
            MapTransport::default().with("http://example.com/bad.json", json!({ "type": 7 })),
        );
        let err = fixture
            .run(
                &JsonSchemaEngine,
                json!({ "a": 1 }),
                json!({ "properties": { "a": { "$ref": "http://example.com/bad.json" } } }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ValidateError::InvalidSchema { .. }));
        assert!(!fixture.registry.contains("http://example.com/bad.json"));
    }

    #[tokio::test]
    async fn meta_schema_failures_use_schema_message() {
        let fixture = Fixture::new(MapTransport::default());
        let meta = fixture.registry.meta_schema();
        let err = RecursiveValidator::new(
            &fixture.registry,
            &JsonSchemaEngine,
            &fixture.loader,
            &fixture.options,
        )
        .run(&json!({ "type": 5 }), &meta)
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "No valid JSON Schema");
        assert!(!err.errors().is_empty());
    }

    #[tokio::test]
    async fn round_cap_stops_endless_resolution() {
        let mut transport = MapTransport::default();
        for n in 0..10 {
            transport = transport.with(&format!("http://example.com/s{n}"), json!({}));
        }
        let mut fixture = Fixture::new(transport);
        fixture.options = ValidatorOptions::new().max_rounds(3);

        let engine = EndlessEngine {
            passes: AtomicUsize::new(0),
        };
        let err = fixture
            .run(&engine, json!({}), json!({ "type": "object" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidateError::ResolutionLimit { rounds: 3 }));
        assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_url_missing_id_is_invalid_input() {
        let fixture = Fixture::new(MapTransport::default());
        let err = fixture
            .run(
                &JsonSchemaEngine,
                json!({ "a": 1 }),
                json!({ "properties": { "a": { "$ref": "other.json" } } }),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ValidateError::Load(LoadError::InvalidInput { .. })
        ));
        assert_eq!(fixture.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reset_between_rounds_resolves_again() {
        let transport = Arc::new(MapTransport::default().with("http://example.com/a", json!({})));
        let loader = Loader::new(transport.clone());
        let registry = Arc::new(SchemaRegistry::new());
        let engine = ResettingEngine {
            registry: Arc::clone(&registry),
            passes: AtomicUsize::new(0),
        };
        let options = ValidatorOptions::default();

        let schema = registry
            .admit(&engine, json!({ "type": "object" }), None)
            .unwrap();
        RecursiveValidator::new(&registry, &engine, &loader, &options)
            .run(&json!({}), &schema)
            .await
            .unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(registry.contains("http://example.com/a"));
    }
}
