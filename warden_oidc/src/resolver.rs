use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use warden::{
    jwa::Algorithm,
    jwk::KeyIdRef,
    jws::VerifyingKey,
    Jwks,
};
use warden_clock::UnixTime;

use crate::error::KeyLookupError;

/// Produces the key that verifies a token
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolves the single key usable with a token signed with `alg` and
    /// naming the key ID `kid`
    async fn resolve(
        &self,
        alg: Algorithm,
        kid: Option<&KeyIdRef>,
    ) -> Result<Arc<VerifyingKey>, KeyLookupError>;
}

#[async_trait]
impl<R> KeyResolver for Arc<R>
where
    R: KeyResolver + ?Sized,
{
    async fn resolve(
        &self,
        alg: Algorithm,
        kid: Option<&KeyIdRef>,
    ) -> Result<Arc<VerifyingKey>, KeyLookupError> {
        (**self).resolve(alg, kid).await
    }
}

/// A key set along with the keys already prepared from it
#[derive(Debug)]
pub(crate) struct KeyRing {
    keys: Jwks,
    fetched_at: UnixTime,
    prepared: Mutex<HashMap<(usize, Algorithm), Arc<VerifyingKey>>>,
}

impl KeyRing {
    pub(crate) fn new(keys: Jwks, fetched_at: UnixTime) -> Self {
        Self {
            keys,
            fetched_at,
            prepared: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn keys(&self) -> &Jwks {
        &self.keys
    }

    pub(crate) fn fetched_at(&self) -> UnixTime {
        self.fetched_at
    }

    /// Selects the single matching key and prepares it, reusing an earlier
    /// preparation for the same key and algorithm
    pub(crate) fn select(
        &self,
        alg: Algorithm,
        kid: Option<&KeyIdRef>,
    ) -> Result<Arc<VerifyingKey>, KeyLookupError> {
        let (idx, jwk) = self.keys.select(alg, kid)?;

        let mut prepared = self.prepared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = prepared.get(&(idx, alg)) {
            return Ok(Arc::clone(key));
        }

        let key = Arc::new(VerifyingKey::import(jwk, alg)?);
        prepared.insert((idx, alg), Arc::clone(&key));
        Ok(key)
    }
}

/// A fixed, locally held key set
#[derive(Debug, Clone)]
pub struct LocalKeys {
    ring: Arc<KeyRing>,
}

impl LocalKeys {
    /// Resolves keys from `keys`
    pub fn new(keys: Jwks) -> Self {
        Self {
            // Never refreshed, so the fetch time is irrelevant
            ring: Arc::new(KeyRing::new(keys, UnixTime(0))),
        }
    }

    /// The held key set
    #[must_use]
    pub fn keys(&self) -> &Jwks {
        self.ring.keys()
    }
}

#[async_trait]
impl KeyResolver for LocalKeys {
    async fn resolve(
        &self,
        alg: Algorithm,
        kid: Option<&KeyIdRef>,
    ) -> Result<Arc<VerifyingKey>, KeyLookupError> {
        self.ring.select(alg, kid)
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use warden::{error::VerifyError, test_util::TestKey, Jwk};

    use super::*;

    fn local(keys: Vec<Jwk>) -> LocalKeys {
        LocalKeys::new(keys.into_iter().collect())
    }

    #[tokio::test]
    async fn resolves_and_memoizes() -> Result<()> {
        let key = TestKey::ecdsa(Algorithm::ES256).with_kid("a");
        let resolver = local(vec![key.jwk()]);

        let first = resolver.resolve(Algorithm::ES256, key.kid()).await?;
        let second = resolver.resolve(Algorithm::ES256, key.kid()).await?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.ring.fetched_at(), UnixTime(0));
        Ok(())
    }

    #[tokio::test]
    async fn selection_failures_are_reported() {
        let a = TestKey::ed25519().with_kid("same").jwk();
        let b = TestKey::ed25519().with_kid("same").jwk();
        let resolver = local(vec![a, b]);

        assert!(matches!(
            resolver.resolve(Algorithm::EdDSA, None).await,
            Err(KeyLookupError::MultipleMatchingKeys { count: 2 })
        ));
        assert!(matches!(
            resolver.resolve(Algorithm::ES256, None).await,
            Err(KeyLookupError::NoMatchingKey)
        ));
    }

    #[tokio::test]
    async fn weak_keys_are_rejected() -> Result<()> {
        let weak: Jwk = serde_json::from_value(warden::test_util::rsa_1024_public_jwk())?;
        let resolver = Arc::new(local(vec![weak]));

        assert!(matches!(
            resolver.resolve(Algorithm::RS256, None).await,
            Err(KeyLookupError::Rejected(VerifyError::InsecureKey { bits: 1024, .. }))
        ));
        Ok(())
    }
}
