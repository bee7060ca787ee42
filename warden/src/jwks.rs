use serde::Deserialize;

use crate::{error, jwa, jwk, Jwk};

/// A JSON Web Key Set (JWKS)
///
/// Keys are kept in document order. Key IDs are not guaranteed to be
/// unique within a set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Jwks {
    #[serde(deserialize_with = "deserialize_keys")]
    keys: Vec<Jwk>,
}

impl Jwks {
    /// Parses a key set document
    ///
    /// The document must be a JSON object with a `keys` array in which every
    /// element is a JSON object. Elements describing keys that cannot be
    /// understood (unknown `kty` or curve, invalid members) are skipped.
    ///
    /// # Errors
    ///
    /// The document does not have the shape of a key set.
    pub fn from_slice(document: &[u8]) -> Result<Self, error::MalformedJwks> {
        let value: serde_json::Value = serde_json::from_slice(document)
            .map_err(|e| error::malformed_jwks_with("not valid JSON", e))?;

        let keys = value
            .as_object()
            .ok_or_else(|| error::malformed_jwks("document is not a JSON object"))?
            .get("keys")
            .ok_or_else(|| error::malformed_jwks("document has no \"keys\" member"))?
            .as_array()
            .ok_or_else(|| error::malformed_jwks("\"keys\" is not an array"))?;

        if !keys.iter().all(serde_json::Value::is_object) {
            return Err(error::malformed_jwks("\"keys\" contains a non-object element"));
        }

        Self::deserialize(value).map_err(|e| error::malformed_jwks_with("invalid key set", e))
    }

    /// Adds a key to the set
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// A view of the keys in this set
    #[must_use]
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// The number of keys in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drops any shared-secret keys from the set
    ///
    /// A set published by a remote identity provider has no business
    /// carrying symmetric keys.
    #[must_use]
    pub fn without_symmetric_keys(self) -> Self {
        let (keys, dropped): (Vec<_>, Vec<_>) = self
            .keys
            .into_iter()
            .partition(|k| k.key_type() != jwa::KeyType::Symmetric);

        if !dropped.is_empty() {
            tracing::warn!(jwks.dropped = dropped.len(), "ignoring symmetric keys in JWKS");
        }

        Self { keys }
    }

    /// Iterates over the keys (with their positions) that are usable with
    /// a token signed with `alg` and naming the key ID `kid`
    pub fn candidates<'a: 'k, 'k>(
        &'a self,
        alg: jwa::Algorithm,
        kid: Option<&'k jwk::KeyIdRef>,
    ) -> impl Iterator<Item = (usize, &'a Jwk)> + 'k {
        self.keys
            .iter()
            .enumerate()
            .filter(move |(_, k)| k.is_candidate(alg, kid))
    }

    /// Selects the single key usable with the token
    ///
    /// # Errors
    ///
    /// No key matches, or more than one key matches. An ambiguous match is
    /// never resolved by picking one of the candidates.
    pub fn select(
        &self,
        alg: jwa::Algorithm,
        kid: Option<&jwk::KeyIdRef>,
    ) -> Result<(usize, &Jwk), error::KeySelectionError> {
        let mut candidates = self.candidates(alg, kid);

        let first = candidates
            .next()
            .ok_or(error::KeySelectionError::NoMatchingKey)?;

        let others = candidates.count();
        if others > 0 {
            return Err(error::KeySelectionError::MultipleMatchingKeys { count: others + 1 });
        }

        Ok(first)
    }
}

impl FromIterator<Jwk> for Jwks {
    fn from_iter<I: IntoIterator<Item = Jwk>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct MaybeJwksVisitor;

    impl<'de> serde::de::Visitor<'de> for MaybeJwksVisitor {
        type Value = Vec<Jwk>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a list of JWK objects")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or_default());
            let mut index = 0_usize;

            while let Some(value) = seq.next_element()? {
                match value {
                    MaybeJwk::Jwk(jwk) => values.push(jwk),
                    MaybeJwk::Unknown(key) => {
                        tracing::warn!(
                            jwks.idx = index,
                            jwk.kid = ?key.kid,
                            jwk.kty = ?key.kty,
                            jwk.alg = ?key.alg,
                            "ignoring unusable JWK"
                        );
                    }
                }
                index += 1;
            }

            Ok(values)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeJwk {
        Jwk(Jwk),
        Unknown(JwkLike),
    }

    #[derive(Deserialize)]
    struct JwkLike {
        #[serde(default)]
        kid: Option<serde_json::Value>,
        #[serde(default)]
        kty: Option<serde_json::Value>,
        #[serde(default)]
        alg: Option<serde_json::Value>,
    }

    deserializer.deserialize_seq(MaybeJwksVisitor)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use tracing_test::traced_test;

    use super::*;
    use crate::jwa::Algorithm;

    const MIXED: &str = include_str!("../data/jwks.json");

    const JWKS_WITH_UNKNOWN_ALG: &str = r#"
        {
            "keys": [
                {
                    "kid": "1",
                    "kty": "RSA",
                    "use": "enc",
                    "alg": "RSA-OAEP",
                    "n": "AQAB",
                    "e": "AQAB"
                }
            ]
        }
    "#;

    const JWKS_WITH_NOTHING: &str = r#"
        {
            "keys": [
                {}
            ]
        }
    "#;

    fn p256(kid: &str) -> Result<Jwk> {
        Ok(Jwk::new(jwa::ec::PublicKey::from_coordinates(
            jwa::ec::Curve::P256,
            vec![1; 32],
            vec![2; 32],
        )?)
        .with_key_id(kid))
    }

    #[test]
    #[traced_test]
    fn decodes_mixed_jwks_skipping_unknown_keys() -> Result<()> {
        let jwks = Jwks::from_slice(MIXED.as_bytes())?;

        let types: Vec<_> = jwks.keys().iter().map(Jwk::key_type).collect();
        assert_eq!(
            types,
            vec![
                jwa::KeyType::Rsa,
                jwa::KeyType::EllipticCurve,
                jwa::KeyType::OctetKeyPair,
                jwa::KeyType::Symmetric,
            ]
        );
        assert!(logs_contain("ignoring unusable JWK"));
        Ok(())
    }

    #[test]
    #[traced_test]
    fn drops_symmetric_keys() -> Result<()> {
        let jwks = Jwks::from_slice(MIXED.as_bytes())?.without_symmetric_keys();

        assert_eq!(jwks.len(), 3);
        assert!(jwks
            .keys()
            .iter()
            .all(|k| k.key_type() != jwa::KeyType::Symmetric));
        Ok(())
    }

    #[test]
    #[traced_test]
    fn deserializes_jwks_with_unknown_alg() -> Result<()> {
        let jwks = Jwks::from_slice(JWKS_WITH_UNKNOWN_ALG.as_bytes())?;
        assert!(jwks.is_empty());
        Ok(())
    }

    #[test]
    #[traced_test]
    fn deserialize_jwks_with_nothing() -> Result<()> {
        let jwks = Jwks::from_slice(JWKS_WITH_NOTHING.as_bytes())?;
        assert!(jwks.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_documents_without_key_array() {
        for doc in [
            r#"[]"#,
            r#"{}"#,
            r#"{"keys": {}}"#,
            r#"{"keys": [1]}"#,
            r#"{"keys": [{}, "x"]}"#,
            r#"not json"#,
        ] {
            assert!(Jwks::from_slice(doc.as_bytes()).is_err(), "{}", doc);
        }
    }

    #[test]
    fn selects_single_candidate() -> Result<()> {
        let jwks: Jwks = vec![p256("a")?, p256("b")?].into_iter().collect();

        let (idx, key) = jwks.select(Algorithm::ES256, Some(jwk::KeyIdRef::from_str("b")))?;
        assert_eq!(idx, 1);
        assert_eq!(key.key_id(), Some(jwk::KeyIdRef::from_str("b")));
        Ok(())
    }

    #[test]
    fn ambiguous_key_id_is_refused() -> Result<()> {
        let jwks: Jwks = vec![p256("dup")?, p256("dup")?].into_iter().collect();

        let err = jwks
            .select(Algorithm::ES256, Some(jwk::KeyIdRef::from_str("dup")))
            .unwrap_err();
        assert_eq!(
            err,
            error::KeySelectionError::MultipleMatchingKeys { count: 2 }
        );
        Ok(())
    }

    #[test]
    fn no_key_id_with_several_keys_is_ambiguous() -> Result<()> {
        let jwks: Jwks = vec![p256("a")?, p256("b")?].into_iter().collect();

        assert!(jwks
            .select(Algorithm::ES256, None)
            .unwrap_err()
            .is_multiple_matching_keys());
        Ok(())
    }

    #[test]
    fn wrong_family_finds_nothing() -> Result<()> {
        let jwks: Jwks = vec![p256("a")?].into_iter().collect();

        assert!(jwks
            .select(Algorithm::RS256, None)
            .unwrap_err()
            .is_no_matching_key());
        assert!(jwks
            .select(Algorithm::ES256, Some(jwk::KeyIdRef::from_str("z")))
            .unwrap_err()
            .is_no_matching_key());
        Ok(())
    }
}
