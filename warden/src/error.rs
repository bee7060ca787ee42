//! Common errors

#![allow(missing_copy_implementations)]

use std::error::Error as StdError;

use thiserror::Error;

use crate::jwa;

/// The provided name could not be matched with supported algorithms
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

impl UnknownAlgorithm {
    /// The unrecognized algorithm name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.alg
    }
}

#[inline]
pub(crate) fn unknown_algorithm(alg: impl Into<String>) -> UnknownAlgorithm {
    UnknownAlgorithm { alg: alg.into() }
}

/// The token names an algorithm that is not on the allow-list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("algorithm '{alg}' is not allowed")]
pub struct AlgorithmNotAllowed {
    alg: String,
}

impl AlgorithmNotAllowed {
    /// The algorithm named in the token header
    #[must_use]
    pub fn name(&self) -> &str {
        &self.alg
    }
}

pub(crate) fn algorithm_not_allowed(alg: impl Into<String>) -> AlgorithmNotAllowed {
    AlgorithmNotAllowed { alg: alg.into() }
}

/// The key was rejected while being constructed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key rejected: {reason}")]
pub struct KeyRejected {
    reason: &'static str,
}

pub(crate) const fn key_rejected(reason: &'static str) -> KeyRejected {
    KeyRejected { reason }
}

/// The key set document does not have the shape of a JWKS
#[derive(Debug, Error)]
#[error("malformed JWKS: {reason}")]
pub struct MalformedJwks {
    reason: &'static str,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

pub(crate) fn malformed_jwks(reason: &'static str) -> MalformedJwks {
    MalformedJwks {
        reason,
        source: None,
    }
}

pub(crate) fn malformed_jwks_with(
    reason: &'static str,
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedJwks {
    MalformedJwks {
        reason,
        source: Some(source.into()),
    }
}

/// The JWT is malformed and cannot be parsed out into header, payload, and signature sections
#[derive(Debug, Error)]
#[error("malformed JWT: {reason}")]
pub struct MalformedJwt {
    reason: &'static str,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl MalformedJwt {
    /// A short description of what is wrong with the token
    #[must_use]
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

pub(crate) fn malformed_jwt(reason: &'static str) -> MalformedJwt {
    MalformedJwt {
        reason,
        source: None,
    }
}

pub(crate) fn malformed_jwt_with(
    reason: &'static str,
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedJwt {
    MalformedJwt {
        reason,
        source: Some(source.into()),
    }
}

/// The JWT payload is not a JSON object
#[derive(Debug, Error)]
#[error("malformed JWT claims")]
pub struct MalformedClaims {
    #[from]
    source: serde_json::Error,
}

pub(crate) fn malformed_claims(source: serde_json::Error) -> MalformedClaims {
    MalformedClaims { source }
}

/// No single key could be selected from a key set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum KeySelectionError {
    /// No key in the set is usable with the token
    #[error("no matching key found")]
    NoMatchingKey,

    /// Several keys are usable with the token and none is preferred
    #[error("{count} keys match; refusing to choose between them")]
    MultipleMatchingKeys {
        /// How many keys matched
        count: usize,
    },
}

impl KeySelectionError {
    /// Whether no key matched at all
    #[must_use]
    pub fn is_no_matching_key(&self) -> bool {
        matches!(self, Self::NoMatchingKey)
    }

    /// Whether several keys matched
    #[must_use]
    pub fn is_multiple_matching_keys(&self) -> bool {
        matches!(self, Self::MultipleMatchingKeys { .. })
    }
}

/// An error occurring while verifying a signature with a key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The key cannot structurally be used with the algorithm
    #[error("key cannot be used with '{alg}': {reason}")]
    InvalidKeyType {
        /// The requested algorithm
        alg: jwa::Algorithm,
        /// Why the key was refused
        reason: &'static str,
    },

    /// The key is too weak to be trusted with the algorithm
    #[error("'{alg}' requires a modulus of at least 2048 bits, key has {bits}")]
    InsecureKey {
        /// The requested algorithm
        alg: jwa::Algorithm,
        /// The size of the key's modulus in bits
        bits: usize,
    },

    /// The algorithm is recognized but cannot be used for verification
    #[error("'{alg}' is not supported for verification")]
    UnsupportedAlgorithm {
        /// The requested algorithm
        alg: jwa::Algorithm,
    },

    /// The signature did not match
    #[error("signature mismatch")]
    SignatureMismatch,
}

impl VerifyError {
    /// Whether the key is structurally incompatible with the algorithm
    #[must_use]
    pub fn is_invalid_key_type(&self) -> bool {
        matches!(self, Self::InvalidKeyType { .. })
    }

    /// Whether the key was refused for being too small
    #[must_use]
    pub fn is_insecure_key(&self) -> bool {
        matches!(self, Self::InsecureKey { .. })
    }

    /// Whether the algorithm cannot be verified at all
    #[must_use]
    pub fn is_unsupported_algorithm(&self) -> bool {
        matches!(self, Self::UnsupportedAlgorithm { .. })
    }

    /// Whether the error is due to a signature mismatch
    #[must_use]
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Self::SignatureMismatch)
    }
}

pub(crate) const fn invalid_key_type(alg: jwa::Algorithm, reason: &'static str) -> VerifyError {
    VerifyError::InvalidKeyType { alg, reason }
}

pub(crate) const fn unsupported_algorithm(alg: jwa::Algorithm) -> VerifyError {
    VerifyError::UnsupportedAlgorithm { alg }
}

/// An error occurring when validating the claims of a JWT
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsRejected {
    /// The `typ` header does not name the expected media type
    #[error("unexpected \"typ\" header {actual:?}, expected {expected:?}")]
    InvalidType {
        /// The configured media type
        expected: String,
        /// The media type found in the header, if any
        actual: Option<String>,
    },

    /// A required claim is missing
    #[error("required {0} claim missing")]
    MissingRequiredClaim(String),

    /// A claim is present but does not have the expected JSON type
    #[error("{claim} claim must be {expected}")]
    MalformedClaim {
        /// The claim name
        claim: &'static str,
        /// A description of the acceptable JSON type
        expected: &'static str,
    },

    /// The token issuer is not acceptable
    #[error("invalid issuer {actual:?}")]
    InvalidIssuer {
        /// The issuer found in the token
        actual: String,
    },

    /// The token subject is not acceptable
    #[error("invalid subject {actual:?}")]
    InvalidSubject {
        /// The subject found in the token
        actual: String,
    },

    /// The token audience is not acceptable
    #[error("invalid audience")]
    InvalidAudience,

    /// The token is expired according to the `exp` claim
    #[error("token expired")]
    TokenExpired,

    /// The token was issued longer ago than the maximum token age allows
    #[error("token exceeds the maximum age")]
    TokenTooOld,

    /// The token is not yet valid according to the `nbf` claim
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// The `iat` claim lies in the future
    #[error("token issued in the future")]
    TokenIssuedInFuture,
}

impl ClaimsRejected {
    /// Whether the token is past its lifetime, by `exp` or by maximum age
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::TokenTooOld)
    }

    /// The missing claim, if this error is about a missing claim
    #[must_use]
    pub fn missing_claim(&self) -> Option<&str> {
        match self {
            Self::MissingRequiredClaim(name) => Some(name),
            _ => None,
        }
    }
}

/// An error occurring while verifying a JWT
#[derive(Debug, Error)]
pub enum JwtVerifyError {
    /// The JWT is structurally invalid
    #[error(transparent)]
    MalformedToken(#[from] MalformedJwt),

    /// The JWT payload is not a JSON object
    #[error(transparent)]
    MalformedClaims(#[from] MalformedClaims),

    /// The JWT header names an algorithm that is not on the allow-list
    #[error(transparent)]
    AlgorithmNotAllowed(#[from] AlgorithmNotAllowed),

    /// The JWT signature was rejected by the key
    #[error("token rejected by key")]
    SignatureRejected(#[from] VerifyError),

    /// The JWT was rejected by the claims validator
    #[error("token rejected by claims validator")]
    ClaimsRejected(#[from] ClaimsRejected),
}
