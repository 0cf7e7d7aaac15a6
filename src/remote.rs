//! The public entry point tying loader, registry and engine together.

use std::sync::Arc;

use futures::future::try_join;
use serde_json::Value;

use crate::engine::{JsonSchemaEngine, ValidationEngine};
use crate::error::{LoadError, TransportError, ValidateError};
use crate::loader::{classify, FetchLogger, Loader, Reference};
use crate::registry::SchemaRegistry;
use crate::transport::Transport;
use crate::types::{declared_id, normalize_id, SchemaDocument, ValidatorOptions};
use crate::validator::RecursiveValidator;

/// Validates documents against schemas that may live behind URLs.
///
/// Owns the schema registry and the in-flight request cache; every call on
/// one instance shares them. Separate instances share nothing.
pub struct RemoteValidator {
    registry: SchemaRegistry,
    loader: Loader,
    engine: Arc<dyn ValidationEngine>,
    options: ValidatorOptions,
}

impl RemoteValidator {
    /// Validator with the HTTP transport, the draft-04 engine and default
    /// options.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    pub fn builder() -> RemoteValidatorBuilder {
        RemoteValidatorBuilder::default()
    }

    /// Validate `data` against `schema`. Either may be an inline document or
    /// a URL string.
    ///
    /// Data and schema are loaded concurrently; the schema is checked
    /// against the meta-schema and registered before validation starts.
    ///
    /// # Errors
    ///
    /// Returns the first load, admission or validation error encountered.
    pub async fn validate(
        &self,
        data: impl Into<Value>,
        schema: impl Into<Value>,
    ) -> Result<(), ValidateError> {
        let data = data.into();
        let schema = schema.into();
        let (data, schema) = try_join(
            async { self.load_data(data).await.map_err(ValidateError::from) },
            self.load_schema(schema),
        )
        .await?;
        self.validate_loaded(&data, &schema).await
    }

    /// Load a data document from a URL or an inline value.
    ///
    /// # Errors
    ///
    /// See [`Loader::load_data`].
    pub async fn load_data(&self, source: impl Into<Value>) -> Result<Value, LoadError> {
        self.loader.load_data(source.into()).await
    }

    /// Load a schema from a URL or an inline value and admit it.
    ///
    /// A URL already registered is served from the registry without I/O.
    /// Remote schemas are registered under their URL.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::Load` for input or fetch failures and
    /// `ValidateError::InvalidSchema` if the schema fails the meta-schema.
    pub async fn load_schema(
        &self,
        source: impl Into<Value>,
    ) -> Result<Arc<SchemaDocument>, ValidateError> {
        match classify(source.into(), "JSON Schema")? {
            Reference::Inline(schema) => self.registry.admit(self.engine.as_ref(), schema, None),
            Reference::Remote(url) => {
                let id = normalize_id(&url);
                if let Some(document) = self.registry.lookup(&id) {
                    return Ok(document);
                }
                let schema = self.loader.fetch_json(&url, "schema").await?;
                self.registry
                    .admit(self.engine.as_ref(), schema, Some(&id))
            }
        }
    }

    /// Run the resolve-and-retry loop on documents that are already loaded.
    ///
    /// # Errors
    ///
    /// See [`RecursiveValidator::run`].
    pub async fn validate_loaded(
        &self,
        data: &Value,
        schema: &SchemaDocument,
    ) -> Result<(), ValidateError> {
        RecursiveValidator::new(
            &self.registry,
            self.engine.as_ref(),
            &self.loader,
            &self.options,
        )
        .run(data, schema)
        .await
    }

    /// Register a schema ahead of time so validation never has to fetch it.
    ///
    /// `id` may be omitted when the schema declares one.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::MissingId` if no identifier is available, or
    /// `ValidateError::InvalidSchema` if the schema fails the meta-schema.
    pub fn preload(
        &self,
        id: Option<&str>,
        schema: Value,
    ) -> Result<Arc<SchemaDocument>, ValidateError> {
        if id.map_or(true, |id| normalize_id(id).is_empty()) && declared_id(&schema).is_none() {
            return Err(ValidateError::MissingId);
        }
        self.registry.admit(self.engine.as_ref(), schema, id)
    }

    /// Registered schema for `id`. Never performs I/O.
    pub fn get_schema(&self, id: &str) -> Option<Arc<SchemaDocument>> {
        self.registry.lookup(id)
    }

    /// Forget every registered schema except the meta-schema.
    pub fn drop_schemas(&self) {
        self.registry.reset();
    }

    /// Replace the sink that reports outgoing fetches.
    pub fn set_logging_function<F>(&self, logger: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.loader.set_logger(Arc::new(logger));
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Number of fetches currently in flight.
    pub fn pending_fetches(&self) -> usize {
        self.loader.cache().in_flight()
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }
}

impl std::fmt::Debug for RemoteValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteValidator")
            .field("schemas", &self.registry.len())
            .field("loader", &self.loader)
            .field("options", &self.options)
            .finish()
    }
}

/// Builder for [`RemoteValidator`].
#[derive(Default)]
pub struct RemoteValidatorBuilder {
    transport: Option<Arc<dyn Transport>>,
    engine: Option<Arc<dyn ValidationEngine>>,
    logger: Option<FetchLogger>,
    options: ValidatorOptions,
}

impl RemoteValidatorBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn ValidationEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn logger(mut self, logger: FetchLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the validator. Without an explicit transport the HTTP transport
    /// is used, or an offline one when the `remote` feature is disabled.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the default HTTP client cannot be built.
    pub fn build(self) -> Result<RemoteValidator, TransportError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.options)?,
        };
        let loader = Loader::new(transport);
        if let Some(logger) = self.logger {
            loader.set_logger(logger);
        }
        Ok(RemoteValidator {
            registry: SchemaRegistry::new(),
            loader,
            engine: self
                .engine
                .unwrap_or_else(|| Arc::new(JsonSchemaEngine::new())),
            options: self.options,
        })
    }
}

#[cfg(feature = "remote")]
fn default_transport(options: &ValidatorOptions) -> Result<Arc<dyn Transport>, TransportError> {
    Ok(Arc::new(crate::transport::HttpTransport::new(options)?))
}

#[cfg(not(feature = "remote"))]
fn default_transport(_options: &ValidatorOptions) -> Result<Arc<dyn Transport>, TransportError> {
    Ok(Arc::new(crate::transport::OfflineTransport))
}
