//! Configuration of an [`Authority`](crate::Authority) backed by a remote
//! key set

use std::time::Duration;

use http::Uri;
use serde::Deserialize;
use warden::{
    jwa::Algorithm,
    jwt::{Audience, CoreValidator, Issuer, IssuerRef},
};

use crate::{cache::KeyCacheConfig, error::ConfigError};

/// Everything needed to verify tokens from one issuer
///
/// Can be deserialized; durations are given in whole seconds:
///
/// ```
/// # use warden_oidc::AuthorityConfig;
/// let config: AuthorityConfig = serde_json::from_str(r#"{
///     "issuer": "https://issuer.example/",
///     "audience": ["api", "admin"],
///     "algorithms": ["RS256", "ES256"],
///     "clock_tolerance_secs": 30
/// }"#)?;
///
/// assert_eq!(config.issuer().as_str(), "https://issuer.example");
/// assert_eq!(config.jwks_url(), "https://issuer.example/.well-known/jwks.json");
/// assert!(config.validate().is_ok());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "AuthorityConfigDto")]
#[must_use]
pub struct AuthorityConfig {
    issuer: Issuer,
    jwks_url: Option<String>,
    audiences: Vec<Audience>,
    algorithms: Vec<Algorithm>,
    clock_tolerance: Duration,
    max_token_age: Option<Duration>,
    required_claims: Vec<String>,
    typ: Option<String>,
    cache: KeyCacheConfig,
}

impl AuthorityConfig {
    /// Configuration for tokens from `issuer`, accepting `RS256` with no
    /// clock tolerance and default key caching
    ///
    /// A trailing `/` on the issuer is removed.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: normalize_issuer(issuer.into()),
            jwks_url: None,
            audiences: Vec::new(),
            algorithms: vec![Algorithm::RS256],
            clock_tolerance: Duration::ZERO,
            max_token_age: None,
            required_claims: Vec::new(),
            typ: None,
            cache: KeyCacheConfig::default(),
        }
    }

    /// Fetches keys from `url` instead of the issuer's well-known location
    pub fn with_jwks_url(self, url: impl Into<String>) -> Self {
        Self {
            jwks_url: Some(url.into()),
            ..self
        }
    }

    /// Accepts tokens addressed to `audience`
    pub fn add_audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(Audience::new(audience.into()));
        self
    }

    /// Replaces the allowed algorithms
    pub fn with_algorithms<I: IntoIterator<Item = Algorithm>>(self, algorithms: I) -> Self {
        Self {
            algorithms: algorithms.into_iter().collect(),
            ..self
        }
    }

    /// Tolerates this much clock skew in time-based claims
    pub fn with_clock_tolerance(self, clock_tolerance: Duration) -> Self {
        Self {
            clock_tolerance,
            ..self
        }
    }

    /// Refuses tokens issued longer ago than `max_token_age`
    pub fn with_max_token_age(self, max_token_age: Duration) -> Self {
        Self {
            max_token_age: Some(max_token_age),
            ..self
        }
    }

    /// Requires the named claim to be present
    pub fn require_claim(mut self, name: impl Into<String>) -> Self {
        self.required_claims.push(name.into());
        self
    }

    /// Requires the `typ` header to name this media type
    pub fn require_type(self, typ: impl Into<String>) -> Self {
        Self {
            typ: Some(typ.into()),
            ..self
        }
    }

    /// Replaces the key caching parameters
    pub fn with_cache_config(self, cache: KeyCacheConfig) -> Self {
        Self { cache, ..self }
    }

    /// The expected issuer, without a trailing `/`
    #[must_use]
    pub fn issuer(&self) -> &IssuerRef {
        &self.issuer
    }

    /// Where keys are fetched from
    #[must_use]
    pub fn jwks_url(&self) -> String {
        match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!("{}/.well-known/jwks.json", self.issuer),
        }
    }

    /// The key set URL, if one was given explicitly
    #[must_use]
    pub fn jwks_url_override(&self) -> Option<&str> {
        self.jwks_url.as_deref()
    }

    /// The accepted audiences
    #[must_use]
    pub fn audiences(&self) -> &[Audience] {
        &self.audiences
    }

    /// The allowed algorithms
    #[must_use]
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// The tolerated clock skew
    #[must_use]
    pub fn clock_tolerance(&self) -> Duration {
        self.clock_tolerance
    }

    /// The maximum token age, if any
    #[must_use]
    pub fn max_token_age(&self) -> Option<Duration> {
        self.max_token_age
    }

    /// Claims that must be present
    #[must_use]
    pub fn required_claims(&self) -> &[String] {
        &self.required_claims
    }

    /// The expected `typ` header, if any
    #[must_use]
    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }

    /// The key caching parameters
    pub fn cache_config(&self) -> KeyCacheConfig {
        self.cache
    }

    /// A claims validator enforcing this configuration
    #[must_use]
    pub fn validator(&self) -> CoreValidator {
        let mut validator = CoreValidator::default()
            .extend_approved_algorithms(self.algorithms.iter().copied())
            .require_issuer(self.issuer.clone())
            .extend_allowed_audiences(self.audiences.iter().cloned())
            .with_leeway(self.clock_tolerance);

        if let Some(max_age) = self.max_token_age {
            validator = validator.with_max_age(max_age);
        }

        for claim in &self.required_claims {
            validator = validator.require_claim(claim.as_str());
        }

        if let Some(typ) = &self.typ {
            validator = validator.require_type(typ.as_str());
        }

        validator
    }

    /// Checks that the configuration can be used
    ///
    /// # Errors
    ///
    /// * The issuer or key set URL is not an absolute `http` or `https` URL
    /// * No algorithm is allowed
    /// * A shared-secret algorithm is allowed
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("issuer", self.issuer.as_str())?;
        check_url("jwks_url", &self.jwks_url())?;

        if self.algorithms.is_empty() {
            return Err(ConfigError::NoAlgorithms);
        }

        if let Some(&alg) = self.algorithms.iter().find(|alg| alg.is_symmetric()) {
            return Err(ConfigError::SymmetricAlgorithm(alg));
        }

        Ok(())
    }
}

fn normalize_issuer(issuer: String) -> Issuer {
    let trimmed = issuer.trim_end_matches('/');
    if trimmed.len() == issuer.len() {
        Issuer::new(issuer)
    } else {
        Issuer::new(trimmed.to_owned())
    }
}

fn check_url(field: &'static str, url: &str) -> Result<(), ConfigError> {
    let uri: Uri = url
        .parse()
        .map_err(|source| ConfigError::InvalidUrl { field, source })?;

    let supported = matches!(uri.scheme_str(), Some("http" | "https")) && uri.authority().is_some();
    if supported {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedUrl {
            field,
            url: url.to_owned(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthorityConfigDto {
    issuer: String,
    #[serde(default)]
    jwks_url: Option<String>,
    #[serde(default)]
    audience: Option<OneOrMany>,
    #[serde(default)]
    algorithms: Option<Vec<Algorithm>>,
    #[serde(default)]
    clock_tolerance_secs: u64,
    #[serde(default)]
    max_token_age_secs: Option<u64>,
    #[serde(default)]
    required_claims: Vec<String>,
    #[serde(default)]
    typ: Option<String>,
    #[serde(default)]
    jwks_max_age_secs: Option<u64>,
    #[serde(default)]
    jwks_cooldown_secs: Option<u64>,
    #[serde(default)]
    jwks_fetch_timeout_secs: Option<u64>,
}

impl From<AuthorityConfigDto> for AuthorityConfig {
    fn from(dto: AuthorityConfigDto) -> Self {
        let mut cache = KeyCacheConfig::default();
        if let Some(secs) = dto.jwks_max_age_secs {
            cache = cache.with_max_age(Duration::from_secs(secs));
        }
        if let Some(secs) = dto.jwks_cooldown_secs {
            cache = cache.with_cooldown(Duration::from_secs(secs));
        }
        if let Some(secs) = dto.jwks_fetch_timeout_secs {
            cache = cache.with_fetch_timeout(Duration::from_secs(secs));
        }

        let audiences = match dto.audience {
            None => Vec::new(),
            Some(OneOrMany::One(aud)) => vec![aud],
            Some(OneOrMany::Many(auds)) => auds,
        };

        Self {
            issuer: normalize_issuer(dto.issuer),
            jwks_url: dto.jwks_url,
            audiences: audiences.into_iter().map(Audience::new).collect(),
            algorithms: dto.algorithms.unwrap_or_else(|| vec![Algorithm::RS256]),
            clock_tolerance: Duration::from_secs(dto.clock_tolerance_secs),
            max_token_age: dto.max_token_age_secs.map(Duration::from_secs),
            required_claims: dto.required_claims,
            typ: dto.typ,
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults() {
        let config = AuthorityConfig::new("https://issuer.example/");

        assert_eq!(config.issuer().as_str(), "https://issuer.example");
        assert_eq!(
            config.jwks_url(),
            "https://issuer.example/.well-known/jwks.json"
        );
        assert_eq!(config.algorithms(), &[Algorithm::RS256]);
        assert_eq!(config.clock_tolerance(), Duration::ZERO);
        assert_eq!(config.max_token_age(), None);
        assert_eq!(config.cache_config(), KeyCacheConfig::default());
        assert_eq!(config.cache_config().max_age(), Duration::from_secs(600));
        assert_eq!(config.cache_config().cooldown(), Duration::from_secs(30));
        assert_eq!(config.cache_config().fetch_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() -> Result<()> {
        let config: AuthorityConfig = serde_json::from_value(json!({
            "issuer": "https://issuer.example//",
            "audience": "api",
        }))?;

        assert_eq!(config, AuthorityConfig::new("https://issuer.example").add_audience("api"));
        Ok(())
    }

    #[test]
    fn deserializes_every_field() -> Result<()> {
        let config: AuthorityConfig = serde_json::from_value(json!({
            "issuer": "https://issuer.example",
            "jwks_url": "https://keys.example/jwks",
            "audience": ["api", "admin"],
            "algorithms": ["ES256", "EdDSA"],
            "clock_tolerance_secs": 30,
            "max_token_age_secs": 3600,
            "required_claims": ["scope"],
            "typ": "at+jwt",
            "jwks_max_age_secs": 300,
            "jwks_cooldown_secs": 10,
            "jwks_fetch_timeout_secs": 2,
        }))?;

        let expected = AuthorityConfig::new("https://issuer.example")
            .with_jwks_url("https://keys.example/jwks")
            .add_audience("api")
            .add_audience("admin")
            .with_algorithms([Algorithm::ES256, Algorithm::EdDSA])
            .with_clock_tolerance(Duration::from_secs(30))
            .with_max_token_age(Duration::from_secs(3600))
            .require_claim("scope")
            .require_type("at+jwt")
            .with_cache_config(
                KeyCacheConfig::default()
                    .with_max_age(Duration::from_secs(300))
                    .with_cooldown(Duration::from_secs(10))
                    .with_fetch_timeout(Duration::from_secs(2)),
            );

        assert_eq!(config, expected);
        assert_eq!(config.jwks_url(), "https://keys.example/jwks");
        assert_eq!(config.jwks_url_override(), Some("https://keys.example/jwks"));
        Ok(())
    }

    #[test]
    fn unknown_fields_are_refused() {
        let parsed = serde_json::from_value::<AuthorityConfig>(json!({
            "issuer": "https://issuer.example",
            "audiences": ["api"],
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn unusable_urls_are_refused() {
        let cases = [
            AuthorityConfig::new("not a url"),
            AuthorityConfig::new("issuer.example"),
            AuthorityConfig::new("ftp://issuer.example"),
            AuthorityConfig::new("https://issuer.example").with_jwks_url("/jwks"),
        ];

        for config in cases {
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::InvalidUrl { .. } | ConfigError::UnsupportedUrl { .. })
                ),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn algorithm_list_is_checked() {
        let none = AuthorityConfig::new("https://issuer.example").with_algorithms(Vec::new());
        assert!(matches!(none.validate(), Err(ConfigError::NoAlgorithms)));

        let hmac = AuthorityConfig::new("https://issuer.example")
            .with_algorithms([Algorithm::RS256, Algorithm::HS256]);
        assert!(matches!(
            hmac.validate(),
            Err(ConfigError::SymmetricAlgorithm(Algorithm::HS256))
        ));
    }

    #[test]
    fn validator_reflects_configuration() {
        let config = AuthorityConfig::new("https://issuer.example")
            .with_algorithms([Algorithm::ES256, Algorithm::PS256]);

        assert_eq!(
            config.validator().approved_algorithms(),
            &[Algorithm::ES256, Algorithm::PS256]
        );
    }
}
