use std::time::Duration;

use serde_json::Value;
use warden_clock::{Clock, System};

use super::{Audience, ClaimSet, Header, Issuer, Subject};
use crate::{error, jwa};

/// A core validator for JWTs
///
/// The default validator approves no algorithms, expects no particular
/// issuer, subject or audience, and allows no clock skew. `exp` and `nbf`
/// are always enforced when present.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct CoreValidator {
    approved_algorithms: Vec<jwa::Algorithm>,
    leeway: Duration,
    issuers: Vec<Issuer>,
    subject: Option<Subject>,
    allowed_audiences: Vec<Audience>,
    max_age: Option<Duration>,
    required_claims: Vec<String>,
    typ: Option<String>,
}

impl CoreValidator {
    /// Allows a grace period for token validation
    ///
    /// Applies on either side of the "not before", "expires" and
    /// "issued at" claims.
    #[inline]
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Allows a grace period (in seconds) for token validation
    #[inline]
    pub fn with_leeway_secs(self, leeway: u64) -> Self {
        self.with_leeway(Duration::from_secs(leeway))
    }

    /// Approves a single algorithm
    #[inline]
    pub fn add_approved_algorithm(self, alg: jwa::Algorithm) -> Self {
        let mut this = self;
        this.approved_algorithms.push(alg);
        this
    }

    /// Approves multiple algorithms
    #[inline]
    pub fn extend_approved_algorithms<I: IntoIterator<Item = jwa::Algorithm>>(
        self,
        algs: I,
    ) -> Self {
        let mut this = self;
        this.approved_algorithms.extend(algs);
        this
    }

    /// Require that tokens specify a particular issuer
    ///
    /// May be called repeatedly to accept any of several issuers.
    #[inline]
    pub fn require_issuer(self, issuer: Issuer) -> Self {
        let mut this = self;
        this.issuers.push(issuer);
        this
    }

    /// Accepts any of several issuers
    #[inline]
    pub fn extend_issuers<I: IntoIterator<Item = Issuer>>(self, issuers: I) -> Self {
        let mut this = self;
        this.issuers.extend(issuers);
        this
    }

    /// Require that tokens carry exactly this subject
    #[inline]
    pub fn require_subject(self, subject: Subject) -> Self {
        Self {
            subject: Some(subject),
            ..self
        }
    }

    /// Adds a single audience to the set of allowed audiences
    #[inline]
    pub fn add_allowed_audience(self, audience: Audience) -> Self {
        let mut this = self;
        this.allowed_audiences.push(audience);
        this
    }

    /// Adds multiple audiences to the set of allowed audiences
    #[inline]
    pub fn extend_allowed_audiences<I: IntoIterator<Item = Audience>>(self, auds: I) -> Self {
        let mut this = self;
        this.allowed_audiences.extend(auds);
        this
    }

    /// Rejects tokens issued longer ago than `max_age`
    ///
    /// Tokens are then required to carry an `iat` claim.
    #[inline]
    pub fn with_max_age(self, max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            ..self
        }
    }

    /// Requires that a claim be present
    #[inline]
    pub fn require_claim(self, name: impl Into<String>) -> Self {
        let mut this = self;
        this.required_claims.push(name.into());
        this
    }

    /// Requires that the `typ` header names this media type
    ///
    /// Comparison ignores case and an `application/` prefix.
    #[inline]
    pub fn require_type(self, typ: impl Into<String>) -> Self {
        Self {
            typ: Some(typ.into()),
            ..self
        }
    }

    /// The approved algorithms
    #[must_use]
    pub fn approved_algorithms(&self) -> &[jwa::Algorithm] {
        &self.approved_algorithms
    }

    /// Checks that the token's algorithm is approved
    ///
    /// # Errors
    ///
    /// The algorithm is unknown, `none`, or not on the allow-list.
    pub fn check_algorithm(
        &self,
        header: &Header,
    ) -> Result<jwa::Algorithm, error::AlgorithmNotAllowed> {
        let name = header.algorithm();

        match name.parse::<jwa::Algorithm>() {
            Ok(alg) if self.approved_algorithms.contains(&alg) => Ok(alg),
            _ => Err(error::algorithm_not_allowed(name)),
        }
    }

    /// Validates the header and claims against the system clock
    ///
    /// # Errors
    ///
    /// The first failed check, in the order described on
    /// [`validate_with_clock`](Self::validate_with_clock).
    pub fn validate(
        &self,
        header: &Header,
        claims: &ClaimSet,
    ) -> Result<(), error::ClaimsRejected> {
        self.validate_with_clock(header, claims, &System)
    }

    /// Validates the header and claims against the provided clock
    ///
    /// Checks run in this order: `typ`; presence of `iss`, `sub`, `aud` and
    /// `iat` when they are expected, then of the required claims; issuer;
    /// subject; audience; `iat` type; `nbf`; `exp`; maximum age.
    ///
    /// # Errors
    ///
    /// The first check to fail.
    pub fn validate_with_clock<C: Clock>(
        &self,
        header: &Header,
        claims: &ClaimSet,
        clock: &C,
    ) -> Result<(), error::ClaimsRejected> {
        self.check_type(header)?;
        self.check_presence(claims)?;

        if let Some(iss) = string_claim(claims, "iss")? {
            // Only the configured issuer is normalized; the token's must match it exactly
            if !self.issuers.is_empty()
                && !self
                    .issuers
                    .iter()
                    .any(|expected| expected.as_str().trim_end_matches('/') == iss)
            {
                return Err(error::ClaimsRejected::InvalidIssuer {
                    actual: iss.to_owned(),
                });
            }
        }

        if let Some(sub) = string_claim(claims, "sub")? {
            if let Some(expected) = &self.subject {
                if expected.as_str() != sub {
                    return Err(error::ClaimsRejected::InvalidSubject {
                        actual: sub.to_owned(),
                    });
                }
            }
        }

        if let Some(auds) = audience_claim(claims)? {
            if !self.allowed_audiences.is_empty()
                && !auds
                    .iter()
                    .any(|a| self.allowed_audiences.iter().any(|e| e.as_str() == *a))
            {
                return Err(error::ClaimsRejected::InvalidAudience);
            }
        }

        let now = clock.now().0 as f64;
        let leeway = self.leeway.as_secs_f64();

        let iat = time_claim(claims, "iat")?;

        if let Some(nbf) = time_claim(claims, "nbf")? {
            if nbf > now + leeway {
                return Err(error::ClaimsRejected::TokenNotYetValid);
            }
        }

        if let Some(exp) = time_claim(claims, "exp")? {
            if exp <= now - leeway {
                return Err(error::ClaimsRejected::TokenExpired);
            }
        }

        if let (Some(max_age), Some(iat)) = (self.max_age, iat) {
            let age = now - iat;
            if age < -leeway {
                return Err(error::ClaimsRejected::TokenIssuedInFuture);
            }
            if age - leeway > max_age.as_secs_f64() {
                return Err(error::ClaimsRejected::TokenTooOld);
            }
        }

        Ok(())
    }

    fn check_type(&self, header: &Header) -> Result<(), error::ClaimsRejected> {
        let Some(expected) = &self.typ else {
            return Ok(());
        };

        match header.typ() {
            Some(actual) if normalize_media_type(actual) == normalize_media_type(expected) => {
                Ok(())
            }
            actual => Err(error::ClaimsRejected::InvalidType {
                expected: expected.clone(),
                actual: actual.map(str::to_owned),
            }),
        }
    }

    fn check_presence(&self, claims: &ClaimSet) -> Result<(), error::ClaimsRejected> {
        let expected = [
            ("iss", !self.issuers.is_empty()),
            ("sub", self.subject.is_some()),
            ("aud", !self.allowed_audiences.is_empty()),
            ("iat", self.max_age.is_some()),
        ];

        let implied = expected
            .iter()
            .filter(|(_, wanted)| *wanted)
            .map(|(name, _)| *name);

        let configured = self.required_claims.iter().map(String::as_str);

        match implied.chain(configured).find(|name| !claims.contains(name)) {
            Some(missing) => Err(error::ClaimsRejected::MissingRequiredClaim(
                missing.to_owned(),
            )),
            None => Ok(()),
        }
    }
}

fn normalize_media_type(typ: &str) -> String {
    let lower = typ.to_ascii_lowercase();
    match lower.strip_prefix("application/") {
        Some(rest) => rest.to_owned(),
        None => lower,
    }
}

fn string_claim<'a>(
    claims: &'a ClaimSet,
    name: &'static str,
) -> Result<Option<&'a str>, error::ClaimsRejected> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(error::ClaimsRejected::MalformedClaim {
            claim: name,
            expected: "a string",
        }),
    }
}

fn audience_claim(claims: &ClaimSet) -> Result<Option<Vec<&str>>, error::ClaimsRejected> {
    const MALFORMED: error::ClaimsRejected = error::ClaimsRejected::MalformedClaim {
        claim: "aud",
        expected: "a string or an array of strings",
    };

    match claims.get("aud") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(aud)) => Ok(Some(vec![aud.as_str()])),
        Some(Value::Array(auds)) => auds
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or(MALFORMED),
        Some(_) => Err(MALFORMED),
    }
}

fn time_claim(
    claims: &ClaimSet,
    name: &'static str,
) -> Result<Option<f64>, error::ClaimsRejected> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(error::ClaimsRejected::MalformedClaim {
            claim: name,
            expected: "a number",
        }),
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;
    use warden_clock::{TestClock, UnixTime};

    use super::*;
    use crate::jwa::Algorithm;

    const NOW: u64 = 1_700_000_000;

    fn clock() -> TestClock {
        TestClock::new(UnixTime(NOW))
    }

    fn header(value: Value) -> Result<Header> {
        Ok(Header::from_slice(value.to_string().as_bytes())?)
    }

    fn claims(value: Value) -> Result<ClaimSet> {
        Ok(serde_json::from_value(value)?)
    }

    fn check(
        validator: &CoreValidator,
        value: Value,
    ) -> Result<Result<(), error::ClaimsRejected>> {
        let header = header(json!({"alg": "RS256"}))?;
        Ok(validator.validate_with_clock(&header, &claims(value)?, &clock()))
    }

    fn full() -> CoreValidator {
        CoreValidator::default()
            .add_approved_algorithm(Algorithm::RS256)
            .require_issuer(Issuer::from_static("https://issuer.example/"))
            .add_allowed_audience(Audience::from_static("api"))
    }

    #[test]
    fn algorithm_allow_list() -> Result<()> {
        let validator = CoreValidator::default()
            .extend_approved_algorithms([Algorithm::RS256, Algorithm::ES256]);

        let es256 = header(json!({"alg": "ES256"}))?;
        assert_eq!(validator.check_algorithm(&es256)?, Algorithm::ES256);
        for alg in ["PS256", "HS256", "none", "None", "rs256", "A128KW"] {
            let err = validator
                .check_algorithm(&header(json!({"alg": alg}))?)
                .unwrap_err();
            assert_eq!(err.name(), alg);
        }
        Ok(())
    }

    #[test]
    fn empty_allow_list_refuses_everything() -> Result<()> {
        let validator = CoreValidator::default();
        assert!(validator.check_algorithm(&header(json!({"alg": "RS256"}))?).is_err());
        Ok(())
    }

    #[test]
    fn expiry_boundary() -> Result<()> {
        let validator = CoreValidator::default();

        let expired: Result<(), _> = Err(error::ClaimsRejected::TokenExpired);
        assert_eq!(check(&validator, json!({"exp": NOW}))?, expired);
        assert_eq!(check(&validator, json!({"exp": NOW - 1}))?, expired);
        assert_eq!(check(&validator, json!({"exp": NOW + 1}))?, Ok(()));
        Ok(())
    }

    #[test]
    fn expiry_with_leeway() -> Result<()> {
        let validator = CoreValidator::default().with_leeway_secs(30);

        assert_eq!(check(&validator, json!({"exp": NOW - 29}))?, Ok(()));
        assert_eq!(
            check(&validator, json!({"exp": NOW - 30}))?,
            Err(error::ClaimsRejected::TokenExpired)
        );
        Ok(())
    }

    #[test]
    fn fractional_times_are_honored() -> Result<()> {
        let validator = CoreValidator::default();

        assert_eq!(check(&validator, json!({"exp": NOW as f64 + 0.5}))?, Ok(()));
        assert_eq!(
            check(&validator, json!({"nbf": NOW as f64 + 0.5}))?,
            Err(error::ClaimsRejected::TokenNotYetValid)
        );
        Ok(())
    }

    #[test]
    fn not_before() -> Result<()> {
        let validator = CoreValidator::default().with_leeway_secs(5);

        assert_eq!(check(&validator, json!({"nbf": NOW + 5}))?, Ok(()));
        assert_eq!(
            check(&validator, json!({"nbf": NOW + 6}))?,
            Err(error::ClaimsRejected::TokenNotYetValid)
        );
        Ok(())
    }

    #[test]
    fn time_claims_must_be_numbers() -> Result<()> {
        let validator = CoreValidator::default();

        for claim in ["exp", "nbf", "iat"] {
            let err = check(&validator, json!({ claim: "tomorrow" }))?.unwrap_err();
            assert_eq!(
                err,
                error::ClaimsRejected::MalformedClaim {
                    claim,
                    expected: "a number"
                }
            );
        }
        Ok(())
    }

    #[test]
    fn issuer_must_match_exactly() -> Result<()> {
        let validator = full();

        assert_eq!(
            check(&validator, json!({"iss": "https://issuer.example", "aud": "api"}))?,
            Ok(())
        );
        assert_eq!(
            check(&validator, json!({"iss": "https://issuer.example/", "aud": "api"}))?,
            Err(error::ClaimsRejected::InvalidIssuer {
                actual: "https://issuer.example/".into()
            })
        );
        assert_eq!(
            check(&validator, json!({"iss": "https://other.example", "aud": "api"}))?,
            Err(error::ClaimsRejected::InvalidIssuer {
                actual: "https://other.example".into()
            })
        );
        Ok(())
    }

    #[test]
    fn any_of_several_issuers() -> Result<()> {
        let validator = CoreValidator::default().extend_issuers([
            Issuer::from_static("https://a.example"),
            Issuer::from_static("https://b.example"),
        ]);

        assert_eq!(check(&validator, json!({"iss": "https://b.example"}))?, Ok(()));
        assert!(check(&validator, json!({"iss": "https://c.example"}))?.is_err());
        Ok(())
    }

    #[test]
    fn audience_arrays_match_by_intersection() -> Result<()> {
        let validator = full();
        let iss = "https://issuer.example";

        assert_eq!(
            check(&validator, json!({"iss": iss, "aud": ["other", "api"]}))?,
            Ok(())
        );
        assert_eq!(
            check(&validator, json!({"iss": iss, "aud": ["other", "more"]}))?,
            Err(error::ClaimsRejected::InvalidAudience)
        );
        assert_eq!(
            check(&validator, json!({"iss": iss, "aud": []}))?,
            Err(error::ClaimsRejected::InvalidAudience)
        );
        assert!(matches!(
            check(&validator, json!({"iss": iss, "aud": ["api", 3]}))?,
            Err(error::ClaimsRejected::MalformedClaim { claim: "aud", .. })
        ));
        Ok(())
    }

    #[test]
    fn presence_is_checked_before_values() -> Result<()> {
        let validator = full().require_claim("scope");

        // The wrong issuer is not reported because `aud` is missing
        let err = check(&validator, json!({"iss": "https://wrong.example"}))?.unwrap_err();
        assert_eq!(err.missing_claim(), Some("aud"));

        let err = check(&validator, json!({"aud": "api"}))?.unwrap_err();
        assert_eq!(err.missing_claim(), Some("iss"));

        let complete = json!({"iss": "https://issuer.example", "aud": "api"});
        let err = check(&validator, complete)?.unwrap_err();
        assert_eq!(err.missing_claim(), Some("scope"));

        let err = check(&validator, json!({"iss": null, "aud": "api", "scope": "x"}))?.unwrap_err();
        assert_eq!(err.missing_claim(), Some("iss"));
        Ok(())
    }

    #[test]
    fn subject_must_match_exactly() -> Result<()> {
        let validator = CoreValidator::default().require_subject(Subject::from_static("svc"));

        assert_eq!(check(&validator, json!({"sub": "svc"}))?, Ok(()));
        assert_eq!(
            check(&validator, json!({"sub": "SVC"}))?,
            Err(error::ClaimsRejected::InvalidSubject { actual: "SVC".into() })
        );
        assert_eq!(check(&validator, json!({}))?.unwrap_err().missing_claim(), Some("sub"));
        Ok(())
    }

    #[test]
    fn max_age_in_both_directions() -> Result<()> {
        let validator = CoreValidator::default()
            .with_max_age(Duration::from_secs(300))
            .with_leeway_secs(10);

        assert_eq!(check(&validator, json!({"iat": NOW - 310}))?, Ok(()));
        assert_eq!(
            check(&validator, json!({"iat": NOW - 311}))?,
            Err(error::ClaimsRejected::TokenTooOld)
        );
        assert_eq!(check(&validator, json!({"iat": NOW + 10}))?, Ok(()));
        assert_eq!(
            check(&validator, json!({"iat": NOW + 11}))?,
            Err(error::ClaimsRejected::TokenIssuedInFuture)
        );
        assert_eq!(check(&validator, json!({}))?.unwrap_err().missing_claim(), Some("iat"));
        assert!(error::ClaimsRejected::TokenTooOld.is_expired());
        Ok(())
    }

    #[test]
    fn type_header_comparison() -> Result<()> {
        let validator = CoreValidator::default().require_type("at+jwt");
        let claims = claims(json!({}))?;

        for typ in ["at+jwt", "AT+JWT", "application/at+jwt", "Application/At+JWT"] {
            let header = header(json!({"alg": "RS256", "typ": typ}))?;
            let result = validator.validate_with_clock(&header, &claims, &clock());
            assert_eq!(result, Ok(()), "{}", typ);
        }

        let wrong = header(json!({"alg": "RS256", "typ": "JWT"}))?;
        assert!(matches!(
            validator.validate_with_clock(&wrong, &claims, &clock()),
            Err(error::ClaimsRejected::InvalidType { .. })
        ));

        let missing = header(json!({"alg": "RS256"}))?;
        assert_eq!(
            validator.validate_with_clock(&missing, &claims, &clock()),
            Err(error::ClaimsRejected::InvalidType {
                expected: "at+jwt".into(),
                actual: None
            })
        );
        Ok(())
    }
}
