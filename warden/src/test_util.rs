//! Signing fixtures for tests
//!
//! These keys exist so that verification can be exercised end to end.
//! They panic on misuse and must never be used to issue real tokens.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use ring::{
    rand::SystemRandom,
    signature::{self, EcdsaKeyPair, Ed25519KeyPair, KeyPair, RsaKeyPair},
};
use serde_json::{json, Value};

use crate::{b64, jwa::Algorithm, jwk, Jwk, Jwt};

const RSA_PKCS8: &[u8] = include_bytes!("../data/rsa/private-2048.pk8");
const RSA_PUBLIC_JWK: &str = include_str!("../data/rsa/jwk-2048.json");
const RSA_1024_PUBLIC_JWK: &str = include_str!("../data/rsa/jwk-1024.json");

#[derive(Debug)]
enum Signer {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
    Ed25519(Ed25519KeyPair),
}

/// A private key able to sign test tokens, along with its public JWK
#[derive(Clone, Debug)]
pub struct TestKey {
    alg: Algorithm,
    kid: Option<String>,
    signer: Arc<Signer>,
}

impl TestKey {
    /// The fixed 2048-bit RSA key, for one of the RS* or PS* algorithms
    pub fn rsa(alg: Algorithm) -> Self {
        assert_eq!(alg.key_type(), crate::jwa::KeyType::Rsa, "{} is not an RSA algorithm", alg);

        let pair = RsaKeyPair::from_pkcs8(RSA_PKCS8).expect("fixture RSA key is valid PKCS#8");
        Self::from_signer(alg, Signer::Rsa(pair))
    }

    /// A freshly generated ECDSA key for ES256 or ES384
    pub fn ecdsa(alg: Algorithm) -> Self {
        let signing = match alg {
            Algorithm::ES256 => &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            Algorithm::ES384 => &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
            other => panic!("no ECDSA signing support for {}", other),
        };

        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(signing, &rng).expect("key generation succeeds");
        let pair = EcdsaKeyPair::from_pkcs8(signing, pkcs8.as_ref(), &rng)
            .expect("generated key is valid PKCS#8");

        Self::from_signer(alg, Signer::Ecdsa(pair))
    }

    /// A freshly generated Ed25519 key
    pub fn ed25519() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("key generation succeeds");
        let pair =
            Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("generated key is valid PKCS#8");

        Self::from_signer(Algorithm::EdDSA, Signer::Ed25519(pair))
    }

    fn from_signer(alg: Algorithm, signer: Signer) -> Self {
        Self {
            alg,
            kid: None,
            signer: Arc::new(signer),
        }
    }

    /// Sets the key ID published in the JWK and placed in token headers
    #[must_use]
    pub fn with_kid(self, kid: impl Into<String>) -> Self {
        Self {
            kid: Some(kid.into()),
            ..self
        }
    }

    /// The algorithm this key signs with
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.alg
    }

    /// The public JWK as JSON, declaring `use: sig` and the key's algorithm
    #[must_use]
    pub fn public_jwk(&self) -> Value {
        let mut jwk = match &*self.signer {
            Signer::Rsa(_) => {
                let fixture: Value =
                    serde_json::from_str(RSA_PUBLIC_JWK).expect("fixture JWK is valid JSON");
                json!({ "kty": "RSA", "n": fixture["n"], "e": fixture["e"] })
            }
            Signer::Ecdsa(pair) => {
                let point = pair.public_key().as_ref();
                let (x, y) = point[1..].split_at((point.len() - 1) / 2);
                let crv = if self.alg == Algorithm::ES256 { "P-256" } else { "P-384" };
                json!({ "kty": "EC", "crv": crv, "x": b64::encode(x), "y": b64::encode(y) })
            }
            Signer::Ed25519(pair) => json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "x": b64::encode(pair.public_key().as_ref()),
            }),
        };

        jwk["use"] = json!("sig");
        jwk["alg"] = json!(self.alg.name());
        if let Some(kid) = &self.kid {
            jwk["kid"] = json!(kid);
        }

        jwk
    }

    /// The public JWK
    pub fn jwk(&self) -> Jwk {
        serde_json::from_value(self.public_jwk()).expect("public JWK deserializes")
    }

    /// The key ID, if set
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.kid.as_deref().map(jwk::KeyIdRef::from_str)
    }

    /// The header this key places on tokens by default
    #[must_use]
    pub fn header(&self) -> Value {
        let mut header = json!({ "alg": self.alg.name(), "typ": "JWT" });
        if let Some(kid) = &self.kid {
            header["kid"] = json!(kid);
        }
        header
    }

    /// Signs the claims under the default header
    pub fn sign(&self, claims: &Value) -> Jwt {
        self.sign_with_header(&self.header(), claims)
    }

    /// Signs the claims under an arbitrary header
    ///
    /// The header's `alg` is not consulted; the key always signs with its
    /// own algorithm.
    pub fn sign_with_header(&self, header: &Value, claims: &Value) -> Jwt {
        let message = format!(
            "{}.{}",
            b64::encode(header.to_string().as_bytes()),
            b64::encode(claims.to_string().as_bytes())
        );

        let signature = self.sign_raw(message.as_bytes());
        Jwt::new(format!("{}.{}", message, b64::encode(&signature)))
    }

    /// Produces a raw signature over arbitrary data
    #[must_use]
    pub fn sign_raw(&self, data: &[u8]) -> Vec<u8> {
        let rng = SystemRandom::new();

        match &*self.signer {
            Signer::Rsa(pair) => {
                let padding: &'static dyn signature::RsaEncoding = match self.alg {
                    Algorithm::RS256 => &signature::RSA_PKCS1_SHA256,
                    Algorithm::RS384 => &signature::RSA_PKCS1_SHA384,
                    Algorithm::RS512 => &signature::RSA_PKCS1_SHA512,
                    Algorithm::PS256 => &signature::RSA_PSS_SHA256,
                    Algorithm::PS384 => &signature::RSA_PSS_SHA384,
                    Algorithm::PS512 => &signature::RSA_PSS_SHA512,
                    other => panic!("not an RSA algorithm: {}", other),
                };

                let mut sig = vec![0; pair.public().modulus_len()];
                pair.sign(padding, &rng, data, &mut sig)
                    .expect("RSA signing succeeds");
                sig
            }
            Signer::Ecdsa(pair) => pair
                .sign(&rng, data)
                .expect("ECDSA signing succeeds")
                .as_ref()
                .to_vec(),
            Signer::Ed25519(pair) => pair.sign(data).as_ref().to_vec(),
        }
    }
}

/// A key set document publishing the given keys
#[must_use]
pub fn jwks(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.public_jwk()).collect::<Vec<_>>() })
}

/// A public JWK for a 1024-bit RSA key, too small to be trusted
#[must_use]
pub fn rsa_1024_public_jwk() -> Value {
    serde_json::from_str(RSA_1024_PUBLIC_JWK).expect("fixture JWK is valid JSON")
}
