//! In-flight fetch de-duplication.
//!
//! At most one fetch per URL is pending at any instant. Callers arriving
//! while it is pending await the same result; the entry is dropped as soon
//! as the fetch settles, so nothing is remembered beyond the overlap. A
//! fetch whose waiters all went away still runs to completion.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::{LoadError, TransportError};

/// Outcome of one fetch-and-parse, shared by every waiter.
pub type FetchResult = Result<Arc<Value>, LoadError>;

type PendingFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Clone, Default)]
pub struct RequestCache {
    pending: Arc<Mutex<HashMap<String, PendingFetch>>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fetches currently pending.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.lock().contains_key(url)
    }

    /// Await the pending fetch for `url`, starting it with `fetch` if none is
    /// pending.
    ///
    /// Lookup and insertion happen under one lock, so two callers can never
    /// both start a fetch for the same URL. The fetch runs as its own task:
    /// it settles and leaves the map even if every waiter is dropped first.
    /// Must be called from within a tokio runtime.
    pub async fn get_or_fetch<F>(&self, url: &str, fetch: F) -> FetchResult
    where
        F: FnOnce() -> BoxFuture<'static, FetchResult>,
    {
        let shared = {
            let mut pending = self.pending.lock();
            match pending.get(url) {
                Some(existing) => {
                    debug!(url, "joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let map = Arc::clone(&self.pending);
                    let key = url.to_string();
                    let inner = fetch();
                    let task = tokio::spawn(async move {
                        let _settle = Settle { pending: map, url: key };
                        inner.await
                    });
                    let owned = url.to_string();
                    let future = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(LoadError::Transport {
                                url: owned,
                                source: TransportError::new(e),
                            })
                        })
                    }
                    .boxed()
                    .shared();
                    pending.insert(url.to_string(), future.clone());
                    future
                }
            }
        };
        shared.await
    }
}

/// Drops the pending entry when the fetch task ends, whether it finished,
/// failed or panicked.
struct Settle {
    pending: Arc<Mutex<HashMap<String, PendingFetch>>>,
    url: String,
}

impl Drop for Settle {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.url);
    }
}

impl std::fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
