//! Implementations of the JSON Web Signature (JWS) standard
//!
//! The specifications for this standard can be found in [RFC7515][].
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515

use std::{error::Error as StdError, fmt};

use ring::signature::{RsaParameters, RsaPublicKeyComponents, UnparsedPublicKey};

use crate::{error, jwa, jwk, Jwk};

/// A JWS verifier
pub trait Verifier {
    /// The error returned on a failure to verify
    type Error: StdError + Send + Sync + 'static;

    /// Whether the specific algorithm provided is compatible
    /// with this verifier
    fn can_verify(&self, alg: jwa::Algorithm) -> bool;

    /// Attempts to verify the data against the signature using the
    /// specified algorithm
    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Public key material in the form consumed by the signature backend
pub(crate) enum Material {
    Rsa {
        params: &'static RsaParameters,
        modulus: Vec<u8>,
        exponent: Vec<u8>,
    },
    Unparsed(UnparsedPublicKey<Vec<u8>>),
}

impl Material {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), ring::error::Unspecified> {
        match self {
            Self::Rsa {
                params,
                modulus,
                exponent,
            } => RsaPublicKeyComponents {
                n: modulus.as_slice(),
                e: exponent.as_slice(),
            }
            .verify(params, data, signature),
            Self::Unparsed(key) => key.verify(data, signature),
        }
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Rsa { modulus, .. } => f
                .debug_struct("Rsa")
                .field("modulus_len", &modulus.len())
                .finish_non_exhaustive(),
            Self::Unparsed(_) => f.write_str("Unparsed"),
        }
    }
}

/// A key prepared for verifying signatures with a single algorithm
///
/// Preparing a key performs every structural check once, so a prepared
/// key can be reused for many tokens.
pub struct VerifyingKey {
    alg: jwa::Algorithm,
    material: Material,
}

impl VerifyingKey {
    /// Prepares a JWK for verifying signatures made with `alg`
    ///
    /// # Errors
    ///
    /// * [`UnsupportedAlgorithm`](error::VerifyError::UnsupportedAlgorithm)
    ///   if `alg` is symmetric or cannot be verified by this crate
    /// * [`InvalidKeyType`](error::VerifyError::InvalidKeyType) if the key
    ///   is of the wrong type or curve for `alg`, or its declared usage,
    ///   operations or algorithm forbid this use
    /// * [`InsecureKey`](error::VerifyError::InsecureKey) if an RSA modulus
    ///   is smaller than 2048 bits
    pub fn import(key: &Jwk, alg: jwa::Algorithm) -> Result<Self, error::VerifyError> {
        if alg.is_symmetric() {
            return Err(error::unsupported_algorithm(alg));
        }

        if !key.permits_verification() {
            return Err(error::invalid_key_type(alg, "key is not usable for verification"));
        }

        if let Some(declared) = key.algorithm() {
            if declared != alg {
                return Err(error::invalid_key_type(alg, "key is restricted to another algorithm"));
            }
        }

        let material = match key.key() {
            jwk::Key::Rsa(k) if alg.key_type() == jwa::KeyType::Rsa => k.import(alg)?,
            jwk::Key::EllipticCurve(k) if alg.key_type() == jwa::KeyType::EllipticCurve => {
                k.import(alg)?
            }
            jwk::Key::OctetKeyPair(k) if alg.key_type() == jwa::KeyType::OctetKeyPair => {
                k.import(alg)?
            }
            other => {
                tracing::trace!(kty = %other.key_type(), %alg, "key type does not fit algorithm");
                return Err(error::invalid_key_type(alg, "key type does not fit algorithm"));
            }
        };

        Ok(Self { alg, material })
    }

    /// The algorithm this key was prepared for
    #[must_use]
    pub fn algorithm(&self) -> jwa::Algorithm {
        self.alg
    }
}

impl Verifier for VerifyingKey {
    type Error = error::VerifyError;

    fn can_verify(&self, alg: jwa::Algorithm) -> bool {
        self.alg == alg
    }

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        if alg != self.alg {
            return Err(error::invalid_key_type(alg, "key was prepared for another algorithm"));
        }

        self.material
            .verify(data, signature)
            .map_err(|_| error::VerifyError::SignatureMismatch)
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("alg", &self.alg)
            .field("material", &self.material)
            .finish()
    }
}

/// Verifies `signature` over `data` with a JWK in one step
///
/// # Errors
///
/// The key cannot be used with `alg` (see [`VerifyingKey::import`]) or the
/// signature does not match.
pub fn verify(
    alg: jwa::Algorithm,
    key: &Jwk,
    signature: &[u8],
    data: &[u8],
) -> Result<(), error::VerifyError> {
    key.verify(alg, data, signature)
}
