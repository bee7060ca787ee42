//! RSA JSON Web Algorithm implementations

use ring::signature::{self, RsaParameters};
use serde::Deserialize;

use crate::{b64, error, jwa::Algorithm, jws::Material};

/// The smallest modulus accepted for verification
pub const MIN_MODULUS_BITS: usize = 2048;

/// The largest modulus the verification backend handles
pub const MAX_MODULUS_BITS: usize = 8192;

/// RSA public key components
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(try_from = "PublicKeyDto")]
#[must_use]
pub struct PublicKey {
    /// The public modulus, big-endian without leading zeros
    modulus: Vec<u8>,

    /// The public exponent, big-endian without leading zeros
    exponent: Vec<u8>,
}

impl PublicKey {
    /// Constructs a public key from the modulus and exponent
    ///
    /// Leading zero octets are tolerated and stripped. The size of the
    /// modulus is not checked here; undersized keys are refused when they
    /// are used to verify.
    ///
    /// # Errors
    ///
    /// The modulus or exponent is zero.
    pub fn from_components(
        modulus: impl Into<Vec<u8>>,
        exponent: impl Into<Vec<u8>>,
    ) -> Result<Self, error::KeyRejected> {
        let modulus = strip_leading_zeros(modulus.into());
        let exponent = strip_leading_zeros(exponent.into());

        if modulus.is_empty() {
            return Err(error::key_rejected("RSA modulus must not be zero"));
        }

        if exponent.is_empty() {
            return Err(error::key_rejected("RSA exponent must not be zero"));
        }

        Ok(Self { modulus, exponent })
    }

    /// The public key's modulus
    #[must_use]
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// The public key's exponent
    #[must_use]
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    /// The size of the modulus in bits
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        match self.modulus.first() {
            Some(&top) => (self.modulus.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
            None => 0,
        }
    }

    pub(crate) fn import(&self, alg: Algorithm) -> Result<Material, error::VerifyError> {
        let params =
            verification_params(alg).ok_or_else(|| error::invalid_key_type(alg, "RSA key"))?;

        let bits = self.modulus_bits();
        if bits < MIN_MODULUS_BITS {
            return Err(error::VerifyError::InsecureKey { alg, bits });
        }

        if bits > MAX_MODULUS_BITS {
            return Err(error::invalid_key_type(alg, "RSA modulus larger than 8192 bits"));
        }

        Ok(Material::Rsa {
            params,
            modulus: self.modulus.clone(),
            exponent: self.exponent.clone(),
        })
    }
}

fn verification_params(alg: Algorithm) -> Option<&'static RsaParameters> {
    let params = match alg {
        Algorithm::RS256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        Algorithm::RS384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        Algorithm::RS512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        Algorithm::PS256 => &signature::RSA_PSS_2048_8192_SHA256,
        Algorithm::PS384 => &signature::RSA_PSS_2048_8192_SHA384,
        Algorithm::PS512 => &signature::RSA_PSS_2048_8192_SHA512,
        _ => return None,
    };

    Some(params)
}

fn strip_leading_zeros(mut raw: Vec<u8>) -> Vec<u8> {
    let zeros = raw.iter().take_while(|&&b| b == 0).count();
    raw.drain(..zeros);
    raw
}

impl TryFrom<PublicKeyDto> for PublicKey {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_components(dto.modulus, dto.exponent)
    }
}

#[derive(Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "n", deserialize_with = "b64::deserialize")]
    modulus: Vec<u8>,

    #[serde(rename = "e", deserialize_with = "b64::deserialize")]
    exponent: Vec<u8>,
}
