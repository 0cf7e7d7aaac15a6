//! Resource loading: URL detection, fetching and parsing.
//!
//! A reference is either a document already in memory or a URL string.
//! Schema fetches go through the [`RequestCache`] so overlapping loads of
//! one URL share a single network call. Data fetches always hit the
//! transport.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

use crate::cache::{FetchResult, RequestCache};
use crate::error::LoadError;
use crate::transport::{Transport, TransportResponse};

/// Sink for outgoing-fetch diagnostics.
pub type FetchLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// The default sink: an `info` event on the `json_schema_remote::fetch` target.
pub fn default_logger() -> FetchLogger {
    Arc::new(|message| tracing::info!(target: "json_schema_remote::fetch", "{}", message))
}

/// Check if a string is a URL we are willing to fetch.
///
/// Requires an http, https or ftp scheme and a host. No public top-level
/// domain is required, so `http://localhost:8080/s` and
/// `http://schemas/s.json` both count.
pub fn is_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https" | "ftp")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

/// A classified reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Remote(String),
    Inline(Value),
}

/// Decide whether `source` is a remote reference or an inline document.
///
/// `expected` names the document kind for the error message.
///
/// # Errors
///
/// Returns `LoadError::InvalidInput` if `source` is neither a URL string
/// nor an object or array.
pub fn classify(source: Value, expected: &'static str) -> Result<Reference, LoadError> {
    match source {
        Value::String(s) if is_url(&s) => Ok(Reference::Remote(s)),
        value @ (Value::Object(_) | Value::Array(_)) => Ok(Reference::Inline(value)),
        _ => Err(LoadError::InvalidInput { expected }),
    }
}

/// Turn a fetch response into a document.
///
/// # Errors
///
/// Returns `LoadError::RemoteLoad` for non-2xx statuses and
/// `LoadError::InvalidBody` if the body isn't JSON.
pub fn parse_body(url: &str, response: TransportResponse) -> Result<Value, LoadError> {
    if !response.is_success() {
        return Err(LoadError::RemoteLoad {
            url: url.to_string(),
            status: response.status,
        });
    }
    serde_json::from_slice(&response.body).map_err(|e| LoadError::InvalidBody {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Fetches and parses remote documents.
#[derive(Clone)]
pub struct Loader {
    transport: Arc<dyn Transport>,
    cache: RequestCache,
    logger: Arc<RwLock<FetchLogger>>,
}

impl Loader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: RequestCache::new(),
            logger: Arc::new(RwLock::new(default_logger())),
        }
    }

    /// Replace the fetch diagnostics sink.
    pub fn set_logger(&self, logger: FetchLogger) {
        *self.logger.write() = logger;
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Load a data document from a URL or an inline value.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidInput` for a non-URL scalar, or any fetch
    /// error. A remote body that is not an object or array is reported as
    /// `LoadError::InvalidBody`.
    pub async fn load_data(&self, source: Value) -> Result<Value, LoadError> {
        match classify(source, "JSON Object")? {
            Reference::Inline(value) => Ok(value),
            Reference::Remote(url) => {
                let body = self.download(&url, "data").await?;
                if body.is_object() || body.is_array() {
                    Ok(Value::clone(&body))
                } else {
                    Err(LoadError::InvalidBody {
                        url,
                        message: "No valid JSON Object".into(),
                    })
                }
            }
        }
    }

    /// Fetch `url` and parse it as JSON, sharing the fetch with any
    /// concurrent caller asking for the same URL.
    ///
    /// `what` only labels the diagnostic line.
    pub async fn fetch_json(&self, url: &str, what: &'static str) -> Result<Value, LoadError> {
        let body = self
            .cache
            .get_or_fetch(url, || self.download(url, what))
            .await?;
        Ok(Value::clone(&body))
    }

    /// One uncached fetch and parse. Logs before any I/O.
    fn download(&self, url: &str, what: &'static str) -> BoxFuture<'static, FetchResult> {
        let transport = Arc::clone(&self.transport);
        let logger = self.logger.read().clone();
        let url = url.to_string();

        async move {
            logger(&format!("downloading {what} {url}"));
            let response = transport
                .fetch(&url)
                .await
                .map_err(|source| LoadError::Transport {
                    url: url.clone(),
                    source,
                })?;
            parse_body(&url, response).map(Arc::new)
        }
        .boxed()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").field("cache", &self.cache).finish()
    }
}
