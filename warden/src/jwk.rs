//! Implementations of the JSON Web Keys (JWK) standard
//!
//! The specifications for JSON Web Keys can be found in [RFC7517][].
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use aliri_braid::braid;
use serde::Deserialize;

use crate::{
    error, jwa,
    jws::{Verifier, VerifyingKey},
};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to JWK identifier ([`KeyId`])")]
pub struct KeyId;

/// An identified JSON Web Key
///
/// Only public key material is retained. Private members that may be
/// present in a published document (`d`, `p`, `q`, …) are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JwkDto")]
#[must_use]
pub struct Jwk {
    key_id: Option<KeyId>,
    usage: Option<jwa::Usage>,
    operations: Option<Vec<jwa::KeyOperation>>,
    algorithm: Option<jwa::Algorithm>,
    key: Key,
}

impl Jwk {
    /// Wraps key material without any metadata
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key_id: None,
            usage: None,
            operations: None,
            algorithm: None,
            key: key.into(),
        }
    }

    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> Option<&KeyIdRef> {
        self.key_id.as_deref()
    }

    /// The intended usage of the key
    #[must_use]
    pub fn usage(&self) -> Option<jwa::Usage> {
        self.usage
    }

    /// The operations the key is restricted to
    #[must_use]
    pub fn operations(&self) -> Option<&[jwa::KeyOperation]> {
        self.operations.as_deref()
    }

    /// The algorithm to be used with this JWK
    #[must_use]
    pub fn algorithm(&self) -> Option<jwa::Algorithm> {
        self.algorithm
    }

    /// The key material
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The key type (`kty`)
    #[must_use]
    pub fn key_type(&self) -> jwa::KeyType {
        self.key.key_type()
    }

    /// Sets the key ID
    pub fn with_key_id(self, kid: impl Into<KeyId>) -> Self {
        Self {
            key_id: Some(kid.into()),
            ..self
        }
    }

    /// Sets the key's usage
    pub fn with_usage(self, usage: jwa::Usage) -> Self {
        Self {
            usage: Some(usage),
            ..self
        }
    }

    /// Restricts the key to the given operations
    pub fn with_operations(self, ops: impl IntoIterator<Item = jwa::KeyOperation>) -> Self {
        Self {
            operations: Some(ops.into_iter().collect()),
            ..self
        }
    }

    /// Restricts the key to a single algorithm
    pub fn with_algorithm(self, alg: jwa::Algorithm) -> Self {
        Self {
            algorithm: Some(alg),
            ..self
        }
    }

    /// Whether the declared `use` and `key_ops` allow signature verification
    ///
    /// `use` must be `sig` when present and `key_ops` must contain `verify`.
    #[must_use]
    pub fn permits_verification(&self) -> bool {
        let usage_ok = match self.usage {
            Some(usage) => usage == jwa::Usage::Signing,
            None => true,
        };

        let ops_ok = match &self.operations {
            Some(ops) => ops.contains(&jwa::KeyOperation::Verify),
            None => true,
        };

        usage_ok && ops_ok
    }

    /// Whether this key may be selected to verify a token signed with `alg`
    /// and carrying the (optional) key ID `kid`
    ///
    /// The checks are, in order: the key type implied by the algorithm, the
    /// key ID if the token names one, the key's own algorithm if it declares
    /// one, the key's declared usage and operations, and finally the curve
    /// for elliptic and Edwards-curve algorithms.
    #[must_use]
    pub fn is_candidate(&self, alg: jwa::Algorithm, kid: Option<&KeyIdRef>) -> bool {
        if self.key_type() != alg.key_type() {
            return false;
        }

        if let Some(kid) = kid {
            if self.key_id() != Some(kid) {
                return false;
            }
        }

        if let Some(key_alg) = self.algorithm {
            if key_alg != alg {
                return false;
            }
        }

        if !self.permits_verification() {
            return false;
        }

        match &self.key {
            Key::EllipticCurve(k) => jwa::ec::Curve::for_algorithm(alg) == Some(k.curve()),
            Key::OctetKeyPair(k) => k.curve().is_edwards(),
            Key::Rsa(_) | Key::Symmetric(_) => true,
        }
    }
}

impl Verifier for Jwk {
    type Error = error::VerifyError;

    fn can_verify(&self, alg: jwa::Algorithm) -> bool {
        VerifyingKey::import(self, alg).is_ok()
    }

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        VerifyingKey::import(self, alg)?.verify(alg, data, signature)
    }
}

#[derive(Deserialize)]
struct JwkDto {
    #[serde(rename = "kid", default)]
    key_id: Option<KeyId>,

    #[serde(rename = "use", default)]
    usage: Option<jwa::Usage>,

    #[serde(rename = "key_ops", default)]
    operations: Option<Vec<jwa::KeyOperation>>,

    #[serde(rename = "alg", default)]
    algorithm: Option<jwa::Algorithm>,

    #[serde(flatten)]
    key: Key,
}

impl TryFrom<JwkDto> for Jwk {
    type Error = error::KeyRejected;

    fn try_from(dto: JwkDto) -> Result<Self, Self::Error> {
        if let Some(alg) = dto.algorithm {
            if alg.key_type() != dto.key.key_type() {
                return Err(error::key_rejected("declared algorithm does not fit key type"));
            }
        }

        Ok(Self {
            key_id: dto.key_id,
            usage: dto.usage,
            operations: dto.operations,
            algorithm: dto.algorithm,
            key: dto.key,
        })
    }
}

/// Key material, discriminated by the JWK `kty` member
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(tag = "kty")]
#[non_exhaustive]
pub enum Key {
    /// RSA
    #[serde(rename = "RSA")]
    Rsa(jwa::rsa::PublicKey),

    /// Elliptic curve cryptography
    #[serde(rename = "EC")]
    EllipticCurve(jwa::ec::PublicKey),

    /// Octet key pair (Edwards or Montgomery curve)
    #[serde(rename = "OKP")]
    OctetKeyPair(jwa::okp::PublicKey),

    /// Shared secret
    #[serde(rename = "oct")]
    Symmetric(jwa::oct::SharedKey),
}

impl Key {
    /// The key type (`kty`)
    #[must_use]
    pub fn key_type(&self) -> jwa::KeyType {
        match self {
            Self::Rsa(_) => jwa::KeyType::Rsa,
            Self::EllipticCurve(_) => jwa::KeyType::EllipticCurve,
            Self::OctetKeyPair(_) => jwa::KeyType::OctetKeyPair,
            Self::Symmetric(_) => jwa::KeyType::Symmetric,
        }
    }
}

impl From<jwa::rsa::PublicKey> for Key {
    fn from(key: jwa::rsa::PublicKey) -> Self {
        Self::Rsa(key)
    }
}

impl From<jwa::ec::PublicKey> for Key {
    fn from(key: jwa::ec::PublicKey) -> Self {
        Self::EllipticCurve(key)
    }
}

impl From<jwa::okp::PublicKey> for Key {
    fn from(key: jwa::okp::PublicKey) -> Self {
        Self::OctetKeyPair(key)
    }
}

impl From<jwa::oct::SharedKey> for Key {
    fn from(key: jwa::oct::SharedKey) -> Self {
        Self::Symmetric(key)
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::jwa::{Algorithm, KeyOperation, Usage};

    const RSA_JWK: &str = include_str!("../data/rsa/jwk-2048.json");

    fn ec_key(curve: jwa::ec::Curve) -> Result<Jwk> {
        let size = curve.coordinate_size();
        Ok(Jwk::new(jwa::ec::PublicKey::from_coordinates(
            curve,
            vec![1; size],
            vec![2; size],
        )?))
    }

    #[test]
    fn deserializes_rsa_with_metadata() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(RSA_JWK)?;

        assert_eq!(jwk.key_type(), jwa::KeyType::Rsa);
        assert_eq!(jwk.key_id(), Some(KeyIdRef::from_str("rsa-2048")));
        assert_eq!(jwk.usage(), Some(Usage::Signing));
        assert_eq!(jwk.algorithm(), Some(Algorithm::RS256));
        match jwk.key() {
            Key::Rsa(k) => assert_eq!(k.modulus_bits(), 2048),
            other => panic!("unexpected key {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn rejects_algorithm_for_wrong_key_type() {
        const DATA: &str = r#"{
            "kty": "OKP",
            "crv": "Ed25519",
            "alg": "RS256",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"
        }"#;

        assert!(serde_json::from_str::<Jwk>(DATA).is_err());
    }

    #[test]
    fn rejects_missing_members() {
        assert!(serde_json::from_str::<Jwk>(r#"{"kty": "RSA", "e": "AQAB"}"#).is_err());
        assert!(serde_json::from_str::<Jwk>(r#"{"kty": "EC", "crv": "P-256"}"#).is_err());
        assert!(serde_json::from_str::<Jwk>(r#"{"kty": "OKP", "x": "AAAA"}"#).is_err());
        assert!(serde_json::from_str::<Jwk>(r#"{"kty": "oct"}"#).is_err());
    }

    #[test]
    fn usage_and_operations_gate_verification() -> Result<()> {
        let base = ec_key(jwa::ec::Curve::P256)?;

        assert!(base.permits_verification());
        assert!(base.clone().with_usage(Usage::Signing).permits_verification());
        assert!(!base.clone().with_usage(Usage::Encryption).permits_verification());
        assert!(base
            .clone()
            .with_operations([KeyOperation::Sign, KeyOperation::Verify])
            .permits_verification());
        assert!(!base
            .with_operations([KeyOperation::Sign])
            .permits_verification());
        Ok(())
    }

    #[test]
    fn candidate_requires_matching_curve() -> Result<()> {
        let p256 = ec_key(jwa::ec::Curve::P256)?;

        assert!(p256.is_candidate(Algorithm::ES256, None));
        assert!(!p256.is_candidate(Algorithm::ES384, None));
        assert!(!p256.is_candidate(Algorithm::RS256, None));
        Ok(())
    }

    #[test]
    fn candidate_requires_matching_key_id_when_token_names_one() -> Result<()> {
        let anonymous = ec_key(jwa::ec::Curve::P256)?;
        let named = anonymous.clone().with_key_id("a");

        let kid = KeyIdRef::from_str("a");
        assert!(named.is_candidate(Algorithm::ES256, Some(kid)));
        assert!(!anonymous.is_candidate(Algorithm::ES256, Some(kid)));
        assert!(!named.is_candidate(Algorithm::ES256, Some(KeyIdRef::from_str("b"))));
        assert!(named.is_candidate(Algorithm::ES256, None));
        Ok(())
    }

    #[test]
    fn candidate_honors_declared_algorithm() -> Result<()> {
        let key = Jwk::new(jwa::rsa::PublicKey::from_components(
            vec![0xc3; 256],
            vec![1, 0, 1],
        )?)
        .with_algorithm(Algorithm::PS256);

        assert!(key.is_candidate(Algorithm::PS256, None));
        assert!(!key.is_candidate(Algorithm::RS256, None));
        Ok(())
    }

    #[test]
    fn edwards_keys_are_candidates_only_for_eddsa() -> Result<()> {
        let ed = Jwk::new(jwa::okp::PublicKey::from_bytes(
            jwa::okp::Curve::Ed25519,
            vec![9; 32],
        )?);
        let x = Jwk::new(jwa::okp::PublicKey::from_bytes(
            jwa::okp::Curve::X25519,
            vec![9; 32],
        )?);

        assert!(ed.is_candidate(Algorithm::EdDSA, None));
        assert!(!x.is_candidate(Algorithm::EdDSA, None));
        Ok(())
    }
}
