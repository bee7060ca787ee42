//! Octet key pair (Edwards and Montgomery curve) keys, per [RFC8037][]
//!
//! [RFC8037]: https://tools.ietf.org/html/rfc8037

use std::fmt;

use ring::signature::{self, UnparsedPublicKey};
use serde::Deserialize;

use crate::{b64, error, jwa::Algorithm, jws::Material};

/// A named octet key pair curve
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize)]
pub enum Curve {
    /// Ed25519 signatures
    Ed25519,
    /// Ed448 signatures
    Ed448,
    /// X25519 key agreement
    X25519,
    /// X448 key agreement
    X448,
}

impl Curve {
    /// Whether the curve is used for Edwards-curve signatures
    #[must_use]
    pub const fn is_edwards(self) -> bool {
        matches!(self, Self::Ed25519 | Self::Ed448)
    }

    /// Size in bytes of a public key on this curve
    #[must_use]
    pub const fn public_key_size(self) -> usize {
        match self {
            Self::Ed25519 | Self::X25519 => 32,
            Self::Ed448 => 57,
            Self::X448 => 56,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Octet key pair public key
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(try_from = "PublicKeyDto")]
#[must_use]
pub struct PublicKey {
    curve: Curve,
    x: Vec<u8>,
}

impl PublicKey {
    /// Constructs a public key from its encoded form
    ///
    /// # Errors
    ///
    /// The key does not have the exact size required by the curve.
    pub fn from_bytes(curve: Curve, x: impl Into<Vec<u8>>) -> Result<Self, error::KeyRejected> {
        let x = x.into();
        if x.len() != curve.public_key_size() {
            return Err(error::key_rejected("OKP key size does not match curve"));
        }

        Ok(Self { curve, x })
    }

    /// The curve this key belongs to
    #[must_use]
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// The encoded public key
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.x
    }

    pub(crate) fn import(&self, alg: Algorithm) -> Result<Material, error::VerifyError> {
        if alg != Algorithm::EdDSA {
            return Err(error::invalid_key_type(alg, "OKP key"));
        }

        match self.curve {
            Curve::Ed25519 => Ok(Material::Unparsed(UnparsedPublicKey::new(
                &signature::ED25519,
                self.x.clone(),
            ))),
            Curve::Ed448 => Err(error::unsupported_algorithm(alg)),
            Curve::X25519 | Curve::X448 => {
                Err(error::invalid_key_type(alg, "key agreement curve"))
            }
        }
    }
}

impl TryFrom<PublicKeyDto> for PublicKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_bytes(dto.curve, dto.x)
    }
}

#[derive(Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "crv")]
    curve: Curve,

    #[serde(deserialize_with = "b64::deserialize")]
    x: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    #[test]
    fn only_ed25519_is_verifiable() -> Result<()> {
        let ed25519 = PublicKey::from_bytes(Curve::Ed25519, vec![7; 32])?;
        let ed448 = PublicKey::from_bytes(Curve::Ed448, vec![7; 57])?;
        let x25519 = PublicKey::from_bytes(Curve::X25519, vec![7; 32])?;

        assert!(ed25519.import(Algorithm::EdDSA).is_ok());
        assert!(ed448
            .import(Algorithm::EdDSA)
            .unwrap_err()
            .is_unsupported_algorithm());
        assert!(x25519
            .import(Algorithm::EdDSA)
            .unwrap_err()
            .is_invalid_key_type());
        assert!(ed25519
            .import(Algorithm::ES256)
            .unwrap_err()
            .is_invalid_key_type());
        Ok(())
    }

    #[test]
    fn size_is_checked_per_curve() {
        assert!(PublicKey::from_bytes(Curve::Ed25519, vec![7; 57]).is_err());
        assert!(PublicKey::from_bytes(Curve::Ed448, vec![7; 57]).is_ok());
    }
}
