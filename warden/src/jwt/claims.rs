use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};

use super::{AudienceRef, IssuerRef, SubjectRef};
use crate::error;

/// The claims carried by a JWT payload
///
/// Accessors for the registered claims are lenient: a claim of the wrong
/// JSON type reads as absent. Validation by a
/// [`CoreValidator`](super::CoreValidator) is where ill-typed claims are
/// rejected.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Any claim, by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether the claim is present with a non-null value
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        !matches!(self.0.get(name), None | Some(Value::Null))
    }

    /// The `iss` claim
    #[must_use]
    pub fn iss(&self) -> Option<&IssuerRef> {
        self.str_claim("iss").map(IssuerRef::from_str)
    }

    /// The `sub` claim
    #[must_use]
    pub fn sub(&self) -> Option<&SubjectRef> {
        self.str_claim("sub").map(SubjectRef::from_str)
    }

    /// The `aud` claim, whether it is a single string or an array
    #[must_use]
    pub fn aud(&self) -> Vec<&AudienceRef> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => vec![AudienceRef::from_str(aud)],
            Some(Value::Array(auds)) => auds
                .iter()
                .filter_map(Value::as_str)
                .map(AudienceRef::from_str)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The `exp` claim, in seconds since the epoch
    #[must_use]
    pub fn exp(&self) -> Option<f64> {
        self.0.get("exp").and_then(Value::as_f64)
    }

    /// The `nbf` claim, in seconds since the epoch
    #[must_use]
    pub fn nbf(&self) -> Option<f64> {
        self.0.get("nbf").and_then(Value::as_f64)
    }

    /// The `iat` claim, in seconds since the epoch
    #[must_use]
    pub fn iat(&self) -> Option<f64> {
        self.0.get("iat").and_then(Value::as_f64)
    }

    /// A view of all claims
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Takes ownership of all claims
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Deserializes the claims into a caller-defined type
    ///
    /// # Errors
    ///
    /// The claims do not fit the shape of `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, error::MalformedClaims> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(error::malformed_claims)
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}
