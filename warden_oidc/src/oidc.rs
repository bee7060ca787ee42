//! OpenID Connect discovery

use std::time::Duration;

use http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, FetchError};

/// The parts of an OpenID Connect discovery document needed to verify tokens
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OidcConfiguration {
    issuer: String,
    jwks_uri: String,
}

impl OidcConfiguration {
    /// The issuer the document describes
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Where the issuer publishes its signing keys
    #[must_use]
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }
}

/// Fetches the discovery document from
/// `{issuer}/.well-known/openid-configuration`
///
/// # Errors
///
/// The document cannot be fetched, does not parse, or names another issuer.
/// Trailing `/` characters are ignored when comparing issuers.
#[tracing::instrument(skip(client))]
pub async fn fetch_oidc_configuration(
    client: &Client,
    issuer: &str,
    timeout: Duration,
) -> Result<OidcConfiguration, DiscoveryError> {
    let expected = issuer.trim_end_matches('/');
    let uri = format!("{expected}/.well-known/openid-configuration");

    let response = client
        .get(&uri)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))?;

    let status = response.status();
    if status != StatusCode::OK {
        tracing::warn!(
            http.status_code = status.as_u16(),
            "OIDC discovery failed; unexpected response status"
        );
        return Err(FetchError::UnexpectedStatus(status).into());
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))?;

    let document: OidcConfiguration =
        serde_json::from_slice(&body).map_err(DiscoveryError::Malformed)?;

    if document.issuer.trim_end_matches('/') != expected {
        tracing::warn!(
            oidc.issuer = %document.issuer,
            "OIDC discovery failed; document names another issuer"
        );
        return Err(DiscoveryError::IssuerMismatch {
            expected: expected.to_owned(),
            actual: document.issuer,
        });
    }

    tracing::debug!(jwks.url = %document.jwks_uri, "OIDC configuration discovered");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;
    use tracing_test::traced_test;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn serve(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn discovers_key_set_location() -> Result<()> {
        let server = MockServer::start().await;
        let issuer = format!("{}/", server.uri());
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": server.uri(),
                "jwks_uri": format!("{}/keys", server.uri()),
                "response_types_supported": ["code"],
            })))
            .mount(&server)
            .await;

        let config = fetch_oidc_configuration(&Client::new(), &issuer, TIMEOUT).await?;
        assert_eq!(config.jwks_uri(), format!("{}/keys", server.uri()));
        assert_eq!(config.issuer(), server.uri());
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn issuer_must_match() {
        let server = serve(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": "https://elsewhere.example",
            "jwks_uri": "https://elsewhere.example/keys",
        })))
        .await;

        let err = fetch_oidc_configuration(&Client::new(), &server.uri(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::IssuerMismatch { .. }), "{:?}", err);
        assert!(logs_contain("document names another issuer"));
    }

    #[tokio::test]
    async fn failures_are_reported() {
        let server = serve(ResponseTemplate::new(404)).await;
        let err = fetch_oidc_configuration(&Client::new(), &server.uri(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                DiscoveryError::Unavailable(FetchError::UnexpectedStatus(s))
                    if s == StatusCode::NOT_FOUND
            ),
            "{:?}",
            err
        );

        let server = serve(ResponseTemplate::new(200).set_body_json(json!({"issuer": 1}))).await;
        let err = fetch_oidc_configuration(&Client::new(), &server.uri(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Malformed(_)), "{:?}", err);
    }
}
