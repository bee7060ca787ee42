//! Errors raised while obtaining keys and configuring an authority

use std::{sync::Arc, time::Duration};

use http::StatusCode;
use thiserror::Error;
use warden::{
    error::{KeySelectionError, MalformedJwks, VerifyError},
    jwa,
};

/// A key set could not be obtained from its source
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be completed
    #[error("key set request failed")]
    Request(#[source] reqwest::Error),

    /// The source did not answer in time
    #[error("key set request timed out after {0:?}")]
    Timeout(Duration),

    /// The source answered with a status other than `200 OK`
    #[error("key set endpoint responded with {0}")]
    UnexpectedStatus(StatusCode),

    /// The source answered with something other than a key set
    #[error(transparent)]
    MalformedKeySet(#[from] MalformedJwks),

    /// The task performing the fetch ended without producing a result
    #[error("key set refresh was aborted")]
    Aborted,
}

impl FetchError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Request(err)
        }
    }
}

/// No verification key could be produced for a token
#[derive(Debug, Clone, Error)]
pub enum KeyLookupError {
    /// The key set could not be fetched and no fresh copy is held
    #[error("key set unavailable")]
    KeySetUnavailable(#[source] Arc<FetchError>),

    /// No key in the set is usable with the token
    #[error("no matching key found")]
    NoMatchingKey,

    /// Several keys are usable with the token and none is preferred
    #[error("{count} keys match; refusing to choose between them")]
    MultipleMatchingKeys {
        /// How many keys matched
        count: usize,
    },

    /// The single matching key cannot be used with the token's algorithm
    #[error("matching key rejected")]
    Rejected(#[from] VerifyError),
}

impl From<KeySelectionError> for KeyLookupError {
    fn from(err: KeySelectionError) -> Self {
        match err {
            KeySelectionError::NoMatchingKey => Self::NoMatchingKey,
            KeySelectionError::MultipleMatchingKeys { count } => {
                Self::MultipleMatchingKeys { count }
            }
        }
    }
}

/// OpenID Connect discovery failed
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The discovery document could not be fetched
    #[error("discovery document unavailable")]
    Unavailable(#[from] FetchError),

    /// The discovery document is not valid
    #[error("malformed discovery document")]
    Malformed(#[source] serde_json::Error),

    /// The discovery document names a different issuer
    #[error("discovery document names issuer {actual:?}, expected {expected:?}")]
    IssuerMismatch {
        /// The configured issuer
        expected: String,
        /// The issuer named by the document
        actual: String,
    },
}

/// The authority configuration cannot be used
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A URL could not be parsed
    #[error("invalid {field} URL")]
    InvalidUrl {
        /// Which setting holds the URL
        field: &'static str,
        /// Why it could not be parsed
        #[source]
        source: http::uri::InvalidUri,
    },

    /// A URL does not use HTTP(S) or has no host
    #[error("{field} URL {url:?} must be an absolute http or https URL")]
    UnsupportedUrl {
        /// Which setting holds the URL
        field: &'static str,
        /// The offending URL
        url: String,
    },

    /// No algorithm is allowed, so no token could ever be accepted
    #[error("at least one algorithm must be allowed")]
    NoAlgorithms,

    /// A shared-secret algorithm is allowed
    #[error("symmetric algorithm {0} cannot be verified with published keys")]
    SymmetricAlgorithm(jwa::Algorithm),

    /// The HTTP client could not be built
    #[error("unable to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// OpenID Connect discovery failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
