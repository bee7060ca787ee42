use std::{fmt, sync::Arc};

use http::StatusCode;
use reqwest::Client;
use thiserror::Error;
use warden::{
    error::{
        AlgorithmNotAllowed, ClaimsRejected, JwtVerifyError, MalformedClaims, MalformedJwt,
        VerifyError,
    },
    jwt::CoreValidator,
    ClaimSet, JwtRef,
};
use warden_clock::{Clock, System};

use crate::{
    cache::KeyCache,
    config::AuthorityConfig,
    error::{ConfigError, KeyLookupError},
    oidc,
    resolver::KeyResolver,
    source::HttpKeySource,
};

/// The reason a token was refused, without any of the details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Category {
    /// The `Authorization` value is not a bearer token
    MalformedAuthorization,
    /// The token is not a well-formed compact JWT
    MalformedToken,
    /// The claims are not a JSON object or a claim has the wrong type
    MalformedClaims,
    /// The token's algorithm is not allowed
    AlgorithmNotAllowed,
    /// The key set could not be obtained
    KeySetUnavailable,
    /// No key matches the token
    NoMatchingKey,
    /// Several keys match the token
    MultipleMatchingKeys,
    /// The matching key cannot be used with the token's algorithm
    InvalidKeyType,
    /// The matching key is too weak
    InsecureKey,
    /// The token's algorithm cannot be verified
    UnsupportedAlgorithm,
    /// The signature does not match
    SignatureMismatch,
    /// A required claim is missing
    MissingClaim,
    /// The token has expired or is too old
    TokenExpired,
    /// The token is not valid yet
    TokenNotYetValid,
    /// The token claims to be issued in the future
    TokenIssuedInFuture,
    /// A claim or header does not have the expected value
    ClaimMismatch,
}

impl Category {
    /// A short, stable name for the category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedAuthorization => "malformed_authorization",
            Self::MalformedToken => "malformed_token",
            Self::MalformedClaims => "malformed_claims",
            Self::AlgorithmNotAllowed => "algorithm_not_allowed",
            Self::KeySetUnavailable => "key_set_unavailable",
            Self::NoMatchingKey => "no_matching_key",
            Self::MultipleMatchingKeys => "multiple_matching_keys",
            Self::InvalidKeyType => "invalid_key_type",
            Self::InsecureKey => "insecure_key",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::SignatureMismatch => "signature_mismatch",
            Self::MissingClaim => "missing_claim",
            Self::TokenExpired => "token_expired",
            Self::TokenNotYetValid => "token_not_yet_valid",
            Self::TokenIssuedInFuture => "token_issued_in_future",
            Self::ClaimMismatch => "claim_mismatch",
        }
    }

    /// Whether the failure lies with the key set rather than the token
    ///
    /// Callers may prefer to answer these with a server error.
    #[must_use]
    pub const fn is_key_set_unavailable(self) -> bool {
        matches!(self, Self::KeySetUnavailable)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ClaimsRejected> for Category {
    fn from(err: &ClaimsRejected) -> Self {
        match err {
            ClaimsRejected::MissingRequiredClaim(_) => Self::MissingClaim,
            ClaimsRejected::MalformedClaim { .. } => Self::MalformedClaims,
            ClaimsRejected::TokenExpired | ClaimsRejected::TokenTooOld => Self::TokenExpired,
            ClaimsRejected::TokenNotYetValid => Self::TokenNotYetValid,
            ClaimsRejected::TokenIssuedInFuture => Self::TokenIssuedInFuture,
            ClaimsRejected::InvalidType { .. }
            | ClaimsRejected::InvalidIssuer { .. }
            | ClaimsRejected::InvalidSubject { .. }
            | ClaimsRejected::InvalidAudience => Self::ClaimMismatch,
        }
    }
}

impl From<&VerifyError> for Category {
    fn from(err: &VerifyError) -> Self {
        match err {
            VerifyError::InvalidKeyType { .. } => Self::InvalidKeyType,
            VerifyError::InsecureKey { .. } => Self::InsecureKey,
            VerifyError::UnsupportedAlgorithm { .. } => Self::UnsupportedAlgorithm,
            VerifyError::SignatureMismatch => Self::SignatureMismatch,
        }
    }
}

/// The step of verification at which a token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Extracting the token from the `Authorization` value
    Extraction,
    /// Parsing the token header
    Parsing,
    /// Checking the algorithm and selecting a key
    KeySelection,
    /// Checking the signature
    Signature,
    /// Decoding and validating the claims
    Claims,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Extraction => "extraction",
            Self::Parsing => "parsing",
            Self::KeySelection => "key selection",
            Self::Signature => "signature",
            Self::Claims => "claims",
        })
    }
}

/// The detailed reason a token was refused
///
/// This is what gets logged; callers are only given an [`Unauthorized`].
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The `Authorization` value is not a bearer token
    #[error("malformed authorization: {0}")]
    MalformedAuthorization(&'static str),

    /// The token is not a well-formed compact JWT
    #[error(transparent)]
    MalformedToken(#[from] MalformedJwt),

    /// The token payload is not a JSON object
    #[error(transparent)]
    MalformedClaims(#[from] MalformedClaims),

    /// The token names an algorithm that is not allowed
    #[error(transparent)]
    AlgorithmNotAllowed(#[from] AlgorithmNotAllowed),

    /// No key could be produced for the token
    #[error("key lookup failed")]
    KeyLookup(#[from] KeyLookupError),

    /// The key refused the signature
    #[error("signature rejected")]
    Signature(#[from] VerifyError),

    /// The claims were refused
    #[error("claims rejected")]
    Claims(#[from] ClaimsRejected),
}

impl AuthorityError {
    /// The category reported to callers
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::MalformedAuthorization(_) => Category::MalformedAuthorization,
            Self::MalformedToken(_) => Category::MalformedToken,
            Self::MalformedClaims(_) => Category::MalformedClaims,
            Self::AlgorithmNotAllowed(_) => Category::AlgorithmNotAllowed,
            Self::KeyLookup(KeyLookupError::KeySetUnavailable(_)) => Category::KeySetUnavailable,
            Self::KeyLookup(KeyLookupError::NoMatchingKey) => Category::NoMatchingKey,
            Self::KeyLookup(KeyLookupError::MultipleMatchingKeys { .. }) => {
                Category::MultipleMatchingKeys
            }
            Self::KeyLookup(KeyLookupError::Rejected(err)) | Self::Signature(err) => err.into(),
            Self::Claims(err) => err.into(),
        }
    }

    /// The step at which the token was refused
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::MalformedAuthorization(_) => Stage::Extraction,
            Self::MalformedToken(_) => Stage::Parsing,
            Self::AlgorithmNotAllowed(_) | Self::KeyLookup(_) => Stage::KeySelection,
            Self::Signature(_) => Stage::Signature,
            Self::MalformedClaims(_) | Self::Claims(_) => Stage::Claims,
        }
    }
}

impl From<JwtVerifyError> for AuthorityError {
    fn from(err: JwtVerifyError) -> Self {
        match err {
            JwtVerifyError::MalformedToken(err) => err.into(),
            JwtVerifyError::MalformedClaims(err) => err.into(),
            JwtVerifyError::AlgorithmNotAllowed(err) => err.into(),
            JwtVerifyError::SignatureRejected(err) => err.into(),
            JwtVerifyError::ClaimsRejected(err) => err.into(),
        }
    }
}

/// A token was refused
///
/// Only the broad category is disclosed; the details are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unauthorized: {category}")]
pub struct Unauthorized {
    category: Category,
}

impl Unauthorized {
    /// Why the token was refused
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// The HTTP status to answer with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl From<&AuthorityError> for Unauthorized {
    fn from(err: &AuthorityError) -> Self {
        Self {
            category: err.category(),
        }
    }
}

struct Inner<R, C> {
    resolver: R,
    validator: CoreValidator,
    clock: C,
}

/// Verifies bearer tokens with keys produced by a [`KeyResolver`]
///
/// Cloning produces another handle to the same authority.
pub struct Authority<R, C = System> {
    inner: Arc<Inner<R, C>>,
}

impl<R, C> Clone for Authority<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: fmt::Debug, C> fmt::Debug for Authority<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authority")
            .field("resolver", &self.inner.resolver)
            .field("validator", &self.inner.validator)
            .finish_non_exhaustive()
    }
}

impl<R> Authority<R, System>
where
    R: KeyResolver,
{
    /// Constructs an authority checking claims against the system clock
    pub fn new(resolver: R, validator: CoreValidator) -> Self {
        Self::with_clock(resolver, validator, System)
    }
}

impl Authority<KeyCache<HttpKeySource>, System> {
    /// Constructs an authority fetching keys from the configured key set URL
    ///
    /// No request is made until the first token is verified.
    ///
    /// # Errors
    ///
    /// The configuration is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &AuthorityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = http_client()?;
        Ok(Self::remote(client, config.jwks_url(), config))
    }

    /// Constructs an authority fetching keys from the key set URL named in
    /// the issuer's OpenID Connect discovery document
    ///
    /// An explicitly configured key set URL takes precedence over the
    /// discovered one, but the discovery document is still checked.
    ///
    /// # Errors
    ///
    /// The configuration is invalid, the HTTP client cannot be built, or
    /// discovery fails.
    pub async fn discover(config: &AuthorityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = http_client()?;

        let discovered = oidc::fetch_oidc_configuration(
            &client,
            config.issuer().as_str(),
            config.cache_config().fetch_timeout(),
        )
        .await?;

        let jwks_url = match config.jwks_url_override() {
            Some(url) => url.to_owned(),
            None => discovered.jwks_uri().to_owned(),
        };
        Ok(Self::remote(client, jwks_url, config))
    }

    fn remote(client: Client, jwks_url: String, config: &AuthorityConfig) -> Self {
        tracing::debug!(jwks.url = %jwks_url, "configuring remote key set");
        let source = HttpKeySource::new(client, jwks_url);
        let cache = KeyCache::new(source, config.cache_config());
        Self::new(cache, config.validator())
    }
}

fn http_client() -> Result<Client, ConfigError> {
    Client::builder()
        .user_agent(concat!("warden_oidc/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ConfigError::Client)
}

impl<R, C> Authority<R, C>
where
    R: KeyResolver,
    C: Clock + Send + Sync,
{
    /// Constructs an authority checking claims against `clock`
    pub fn with_clock(resolver: R, validator: CoreValidator, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver,
                validator,
                clock,
            }),
        }
    }

    /// The key resolver
    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.inner.resolver
    }

    /// The claims validator
    #[must_use]
    pub fn validator(&self) -> &CoreValidator {
        &self.inner.validator
    }

    /// Verifies the bearer token in an `Authorization` header value
    ///
    /// # Errors
    ///
    /// The value does not hold a bearer token, or the token is refused.
    #[tracing::instrument(
        skip_all,
        fields(jwt.alg = tracing::field::Empty, jwk.kid = tracing::field::Empty)
    )]
    pub async fn verify(&self, authorization: &str) -> Result<ClaimSet, Unauthorized> {
        let outcome = match extract_bearer(authorization) {
            Ok(token) => self.authenticate(token).await,
            Err(err) => Err(err),
        };

        outcome.map_err(|err| reject(&err))
    }

    /// Verifies a token already extracted from its transport
    ///
    /// # Errors
    ///
    /// The token is refused.
    #[tracing::instrument(
        skip_all,
        fields(jwt.alg = tracing::field::Empty, jwk.kid = tracing::field::Empty)
    )]
    pub async fn verify_token(&self, token: &JwtRef) -> Result<ClaimSet, Unauthorized> {
        self.authenticate(token).await.map_err(|err| reject(&err))
    }

    async fn authenticate(&self, token: &JwtRef) -> Result<ClaimSet, AuthorityError> {
        let decomposed = token.decompose()?;
        let header = decomposed.header();

        let span = tracing::Span::current();
        span.record("jwt.alg", header.algorithm());
        if let Some(kid) = header.kid() {
            span.record("jwk.kid", kid.as_str());
        }

        let alg = self.inner.validator.check_algorithm(header)?;
        let key = self.inner.resolver.resolve(alg, header.kid()).await?;

        decomposed.verify_signature(alg, &*key)?;

        let claims = decomposed.claims()?;
        self.inner
            .validator
            .validate_with_clock(header, &claims, &self.inner.clock)?;

        tracing::trace!("token verified");
        Ok(claims)
    }
}

fn extract_bearer(authorization: &str) -> Result<&JwtRef, AuthorityError> {
    let (scheme, token) = authorization
        .trim()
        .split_once(|c: char| c.is_ascii_whitespace())
        .ok_or(AuthorityError::MalformedAuthorization(
            "expected a scheme and a token",
        ))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthorityError::MalformedAuthorization(
            "authorization scheme is not Bearer",
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthorityError::MalformedAuthorization("bearer token is empty"));
    }
    if token.contains(char::is_whitespace) {
        return Err(AuthorityError::MalformedAuthorization(
            "bearer token contains whitespace",
        ));
    }

    Ok(JwtRef::from_str(token))
}

fn reject(err: &AuthorityError) -> Unauthorized {
    let category = err.category();
    let stage = err.stage();
    let error: &dyn std::error::Error = err;

    match category {
        Category::AlgorithmNotAllowed | Category::KeySetUnavailable => {
            tracing::warn!(error, %stage, %category, "token rejected");
        }
        Category::InvalidKeyType | Category::InsecureKey | Category::UnsupportedAlgorithm => {
            tracing::error!(error, %stage, %category, "token rejected; check the key set");
        }
        _ => {
            tracing::debug!(error, %stage, %category, "token rejected");
        }
    }

    err.into()
}
