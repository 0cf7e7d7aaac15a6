//! Fetching raw bodies over the network.

use async_trait::async_trait;

use crate::error::TransportError;
#[cfg(feature = "remote")]
use crate::types::ValidatorOptions;

/// Status and body of a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of remote documents.
///
/// Implementations report transport-level failures only; HTTP error
/// statuses come back as ordinary responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// HTTP/HTTPS transport backed by `reqwest`.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl HttpTransport {
    /// Build a client with the configured timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the underlying client cannot be built.
    pub fn new(options: &ValidatorOptions) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(TransportError::new)?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(TransportError::new)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::new)?;
        Ok(TransportResponse::new(status, body.to_vec()))
    }
}

/// Transport that refuses every fetch. Used when remote loading is compiled out.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
        Err(TransportError::new(format!(
            "remote loading is disabled, refusing to fetch {url}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(TransportResponse::new(200, "{}").is_success());
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(304, "").is_success());
        assert!(!TransportResponse::new(404, "").is_success());
    }

    #[tokio::test]
    async fn offline_transport_refuses() {
        let err = OfflineTransport
            .fetch("http://example.com/schema")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("http://example.com/schema"));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[tokio::test]
        async fn http_transport_returns_status_and_body() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/schema.json")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"type":"object"}"#)
                .expect(1)
                .create_async()
                .await;

            let transport = HttpTransport::new(&ValidatorOptions::default()).unwrap();
            let response = transport
                .fetch(&format!("{}/schema.json", server.url()))
                .await
                .unwrap();

            mock.assert_async().await;
            assert_eq!(response.status, 200);
            assert_eq!(response.body, br#"{"type":"object"}"#.to_vec());
        }

        #[tokio::test]
        async fn http_transport_passes_error_status_through() {
            let mut server = mockito::Server::new_async().await;
            let _mock = server
                .mock("GET", "/gone")
                .with_status(404)
                .create_async()
                .await;

            let transport = HttpTransport::new(&ValidatorOptions::default()).unwrap();
            let response = transport
                .fetch(&format!("{}/gone", server.url()))
                .await
                .unwrap();
            assert_eq!(response.status, 404);
            assert!(!response.is_success());
        }

        #[tokio::test]
        async fn http_transport_reports_unreachable_host() {
            let transport = HttpTransport::new(&ValidatorOptions::default()).unwrap();
            let result = transport
                .fetch("http://this-domain-does-not-exist-12345.invalid/schema.json")
                .await;
            assert!(result.is_err());
        }
    }
}
