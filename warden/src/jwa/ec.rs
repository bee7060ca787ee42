//! ECC JSON Web Algorithm implementations

use std::fmt;

use ring::signature::{self, UnparsedPublicKey};
use serde::Deserialize;

use crate::{b64, error, jwa::Algorithm, jws::Material};

/// A named ECC curve
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize)]
pub enum Curve {
    /// The P-256 curve (prime256v1/secp256r1)
    #[serde(rename = "P-256")]
    P256,

    /// The P-384 curve (secp384r1)
    #[serde(rename = "P-384")]
    P384,

    /// The P-521 curve (secp521r1)
    #[serde(rename = "P-521")]
    P521,
}

impl Curve {
    /// The curve mandated by an ECDSA algorithm
    #[must_use]
    pub const fn for_algorithm(alg: Algorithm) -> Option<Self> {
        match alg {
            Algorithm::ES256 => Some(Self::P256),
            Algorithm::ES384 => Some(Self::P384),
            Algorithm::ES512 => Some(Self::P521),
            _ => None,
        }
    }

    /// Size in bytes of a single affine coordinate on this curve
    #[must_use]
    pub const fn coordinate_size(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        })
    }
}

/// Elliptic curve public key
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(try_from = "PublicKeyDto")]
#[must_use]
pub struct PublicKey {
    curve: Curve,
    x: Vec<u8>,
    y: Vec<u8>,
}

impl PublicKey {
    /// Constructs a public key from its affine coordinates
    ///
    /// # Errors
    ///
    /// A coordinate does not have the exact size required by the curve.
    pub fn from_coordinates(
        curve: Curve,
        x: impl Into<Vec<u8>>,
        y: impl Into<Vec<u8>>,
    ) -> Result<Self, error::KeyRejected> {
        let x = x.into();
        let y = y.into();
        let size = curve.coordinate_size();

        if x.len() != size || y.len() != size {
            return Err(error::key_rejected("EC coordinate size does not match curve"));
        }

        Ok(Self { curve, x, y })
    }

    /// The curve this key lies on
    #[must_use]
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// The key as an uncompressed SEC1 point
    #[must_use]
    pub fn to_uncompressed_point(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.x.len() + self.y.len());
        point.push(0x04);
        point.extend_from_slice(&self.x);
        point.extend_from_slice(&self.y);
        point
    }

    pub(crate) fn import(&self, alg: Algorithm) -> Result<Material, error::VerifyError> {
        match Curve::for_algorithm(alg) {
            Some(required) if required == self.curve => {}
            Some(_) => return Err(error::invalid_key_type(alg, "EC key on the wrong curve")),
            None => return Err(error::invalid_key_type(alg, "EC key")),
        }

        let verification: &'static signature::EcdsaVerificationAlgorithm = match self.curve {
            Curve::P256 => &signature::ECDSA_P256_SHA256_FIXED,
            Curve::P384 => &signature::ECDSA_P384_SHA384_FIXED,
            Curve::P521 => return Err(error::unsupported_algorithm(alg)),
        };

        Ok(Material::Unparsed(UnparsedPublicKey::new(
            verification,
            self.to_uncompressed_point(),
        )))
    }
}

impl TryFrom<PublicKeyDto> for PublicKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_coordinates(dto.curve, dto.x, dto.y)
    }
}

#[derive(Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "crv")]
    curve: Curve,

    #[serde(deserialize_with = "b64::deserialize")]
    x: Vec<u8>,

    #[serde(deserialize_with = "b64::deserialize")]
    y: Vec<u8>,
}
