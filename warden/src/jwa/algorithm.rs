use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error;

/// JSON Web Signature algorithms
///
/// Every registered digital signature algorithm is recognized, including
/// the symmetric ones, so that a token naming one can be rejected with a
/// precise reason instead of being treated as unknown.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Algorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512
    PS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// ECDSA using P-521 and SHA-512
    ES512,
    /// Edwards-curve digital signatures
    EdDSA,
}

/// The family of key an algorithm operates with (the JWK `kty`)
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum KeyType {
    /// `RSA`
    Rsa,
    /// `EC`
    EllipticCurve,
    /// `OKP`
    OctetKeyPair,
    /// `oct`
    Symmetric,
}

impl KeyType {
    /// The registered `kty` value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::EllipticCurve => "EC",
            Self::OctetKeyPair => "OKP",
            Self::Symmetric => "oct",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Algorithm {
    /// All recognized algorithms
    pub const ALL: [Algorithm; 13] = [
        Self::HS256,
        Self::HS384,
        Self::HS512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
        Self::ES256,
        Self::ES384,
        Self::ES512,
        Self::EdDSA,
    ];

    /// The registered name of the algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::EdDSA => "EdDSA",
        }
    }

    /// The key type this algorithm requires
    #[must_use]
    pub const fn key_type(self) -> KeyType {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => KeyType::Symmetric,
            Self::RS256
            | Self::RS384
            | Self::RS512
            | Self::PS256
            | Self::PS384
            | Self::PS512 => KeyType::Rsa,
            Self::ES256 | Self::ES384 | Self::ES512 => KeyType::EllipticCurve,
            Self::EdDSA => KeyType::OctetKeyPair,
        }
    }

    /// Whether the algorithm relies on a shared secret
    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        matches!(self.key_type(), KeyType::Symmetric)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&'_ str> for Algorithm {
    type Error = error::UnknownAlgorithm;

    #[inline]
    fn try_from(value: &'_ str) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.name() == value)
            .ok_or_else(|| error::unknown_algorithm(value))
    }
}

impl FromStr for Algorithm {
    type Err = error::UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        Self::try_from(name.as_ref()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    #[test]
    fn names_round_trip() -> Result<()> {
        for alg in Algorithm::ALL {
            assert_eq!(alg.name().parse::<Algorithm>()?, alg);
        }
        Ok(())
    }

    #[test]
    fn none_and_lowercase_are_unknown() {
        assert!("none".parse::<Algorithm>().is_err());
        assert!("rs256".parse::<Algorithm>().is_err());
        assert!("RSA-OAEP".parse::<Algorithm>().is_err());
    }

    #[test]
    fn families() {
        assert_eq!(Algorithm::PS384.key_type(), KeyType::Rsa);
        assert_eq!(Algorithm::ES512.key_type(), KeyType::EllipticCurve);
        assert_eq!(Algorithm::EdDSA.key_type(), KeyType::OctetKeyPair);
        assert!(Algorithm::HS256.is_symmetric());
        assert!(!Algorithm::RS256.is_symmetric());
    }

    #[test]
    fn deserializes_from_json_string() -> Result<()> {
        let algs: Vec<Algorithm> = serde_json::from_str(r#"["RS256", "EdDSA"]"#)?;
        assert_eq!(algs, vec![Algorithm::RS256, Algorithm::EdDSA]);
        assert!(serde_json::from_str::<Algorithm>(r#""none""#).is_err());
        Ok(())
    }
}
