use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::Client;
use warden::Jwks;

use crate::error::FetchError;

/// A source of JSON Web Key Sets
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetches the current key set, giving up after `timeout`
    async fn fetch(&self, timeout: Duration) -> Result<Jwks, FetchError>;
}

/// A key set published at an HTTP(S) endpoint
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: Client,
    url: String,
}

impl HttpKeySource {
    /// Fetches keys from `url` using `client`
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// The endpoint keys are fetched from
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    /// Performs a single GET; no retries are attempted
    ///
    /// Only a `200 OK` carrying a key set document is accepted. Shared-secret
    /// keys in the document are discarded.
    #[tracing::instrument(skip(self), fields(jwks.url = %self.url))]
    async fn fetch(&self, timeout: Duration) -> Result<Jwks, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(
                http.status_code = status.as_u16(),
                "JWKS fetch failed; unexpected response status"
            );
            return Err(FetchError::UnexpectedStatus(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let jwks = Jwks::from_slice(&body)
            .map_err(|err| {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "JWKS fetch failed; malformed key set");
                err
            })?
            .without_symmetric_keys();

        tracing::debug!(jwks.len = jwks.len(), "JWKS fetched");
        Ok(jwks)
    }
}
