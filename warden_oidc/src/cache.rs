use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use warden::{jwa::Algorithm, jwk::KeyIdRef, jws::VerifyingKey, Jwks};
use warden_clock::{Clock, System, UnixTime};

use crate::{
    error::{FetchError, KeyLookupError},
    resolver::{KeyResolver, KeyRing},
    source::KeySource,
};

/// Timing parameters of a [`KeyCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct KeyCacheConfig {
    max_age: Duration,
    cooldown: Duration,
    fetch_timeout: Duration,
}

impl Default for KeyCacheConfig {
    /// Keys are fresh for 10 minutes, reloads for an unknown key are
    /// suppressed for 30 seconds, and fetches give up after 5 seconds
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(600),
            cooldown: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl KeyCacheConfig {
    /// How long a fetched key set is used before it is fetched again
    pub fn with_max_age(self, max_age: Duration) -> Self {
        Self { max_age, ..self }
    }

    /// How long after a fetch a token naming an unknown key does not cause
    /// another fetch; also how long a failed fetch is remembered
    pub fn with_cooldown(self, cooldown: Duration) -> Self {
        Self { cooldown, ..self }
    }

    /// How long a single fetch may take
    pub fn with_fetch_timeout(self, fetch_timeout: Duration) -> Self {
        Self {
            fetch_timeout,
            ..self
        }
    }

    /// How long a fetched key set is used
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// How long reloads are suppressed after a fetch
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// How long a single fetch may take
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }
}

type Refresh = Shared<BoxFuture<'static, Result<Arc<KeyRing>, Arc<FetchError>>>>;

struct Inner<S, C> {
    source: S,
    clock: C,
    config: KeyCacheConfig,
    current: ArcSwapOption<KeyRing>,
    in_flight: Mutex<Option<Refresh>>,
    last_failure: Mutex<Option<(UnixTime, Arc<FetchError>)>>,
}

/// A key set fetched from a [`KeySource`] and kept fresh on demand
///
/// At most one fetch is outstanding at any time; every caller needing new
/// keys waits on that same fetch. The fetch runs on its own task, so a
/// caller giving up does not abandon it. New key sets replace the old one
/// atomically and are never modified in place.
///
/// Cloning produces another handle to the same cache.
pub struct KeyCache<S, C = System> {
    inner: Arc<Inner<S, C>>,
}

impl<S, C> Clone for KeyCache<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C> fmt::Debug for KeyCache<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let current = self.inner.current.load_full();
        f.debug_struct("KeyCache")
            .field("config", &self.inner.config)
            .field("keys", &current.as_ref().map(|ring| ring.keys().len()))
            .field("fetched_at", &current.as_ref().map(|ring| ring.fetched_at()))
            .finish_non_exhaustive()
    }
}

impl<S> KeyCache<S, System>
where
    S: KeySource + 'static,
{
    /// Constructs an empty cache; keys are fetched on first use
    pub fn new(source: S, config: KeyCacheConfig) -> Self {
        Self::with_clock(source, config, System)
    }
}

impl<S, C> KeyCache<S, C>
where
    S: KeySource + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Constructs an empty cache that tells time with `clock`
    pub fn with_clock(source: S, config: KeyCacheConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                clock,
                config,
                current: ArcSwapOption::empty(),
                in_flight: Mutex::new(None),
                last_failure: Mutex::new(None),
            }),
        }
    }

    /// The cache's timing parameters
    pub fn config(&self) -> KeyCacheConfig {
        self.inner.config
    }

    /// A copy of the key set currently held, if any
    #[must_use]
    pub fn keys(&self) -> Option<Jwks> {
        self.inner
            .current
            .load_full()
            .map(|ring| ring.keys().clone())
    }

    /// Produces the single key usable with a token signed with `alg` and
    /// naming the key ID `kid`
    ///
    /// A missing or stale key set is fetched first. If no key matches and
    /// the key set was not fetched within the cooldown, the key set is
    /// fetched once more before giving up.
    ///
    /// # Errors
    ///
    /// * [`KeySetUnavailable`](KeyLookupError::KeySetUnavailable) if a
    ///   needed fetch fails
    /// * [`NoMatchingKey`](KeyLookupError::NoMatchingKey) or
    ///   [`MultipleMatchingKeys`](KeyLookupError::MultipleMatchingKeys) if
    ///   selection fails
    /// * [`Rejected`](KeyLookupError::Rejected) if the matching key cannot
    ///   be used with `alg`
    ///
    /// # Panics
    ///
    /// Fetches are spawned onto the Tokio runtime, so this panics if a fetch
    /// is needed outside of one.
    pub async fn get_key(
        &self,
        alg: Algorithm,
        kid: Option<&KeyIdRef>,
    ) -> Result<Arc<VerifyingKey>, KeyLookupError> {
        let ring = match self.inner.current.load_full() {
            Some(ring) if self.inner.is_fresh(&ring) => ring,
            _ => self
                .refresh(false)
                .await
                .map_err(KeyLookupError::KeySetUnavailable)?,
        };

        match ring.select(alg, kid) {
            Err(KeyLookupError::NoMatchingKey) => {}
            outcome => return outcome,
        }

        if self.inner.is_cooling_down(&ring) {
            tracing::debug!(
                jwt.alg = %alg,
                jwk.kid = kid.map(KeyIdRef::as_str),
                "no matching key; key set was fetched too recently to reload"
            );
            return Err(KeyLookupError::NoMatchingKey);
        }

        tracing::debug!(
            jwt.alg = %alg,
            jwk.kid = kid.map(KeyIdRef::as_str),
            "no matching key; reloading key set"
        );

        let ring = match self.inner.current.load_full() {
            Some(latest) if !Arc::ptr_eq(&latest, &ring) => latest,
            _ => self
                .refresh(false)
                .await
                .map_err(KeyLookupError::KeySetUnavailable)?,
        };

        ring.select(alg, kid)
    }

    /// Fetches the key set now, ignoring freshness and any recent failure
    ///
    /// If a fetch is already under way, waits for that one instead.
    ///
    /// # Errors
    ///
    /// The fetch fails. Any previously held key set is kept.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub async fn force_reload(&self) -> Result<(), KeyLookupError> {
        self.refresh(true)
            .await
            .map(drop)
            .map_err(KeyLookupError::KeySetUnavailable)
    }

    /// Keeps the key set warm by reloading it every `interval` from a
    /// background task
    ///
    /// The task runs until it is aborted through the returned handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn_refresh(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await;

            loop {
                timer.tick().await;
                if let Err(error) = this.refresh(false).await {
                    let error: &dyn std::error::Error = &*error;
                    tracing::debug!(
                        error,
                        "background JWKS refresh failed; retrying next interval"
                    );
                }
            }
        })
    }

    async fn refresh(&self, force: bool) -> Result<Arc<KeyRing>, Arc<FetchError>> {
        let refresh = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match &*in_flight {
                Some(refresh) => refresh.clone(),
                None => {
                    if !force {
                        if let Some(err) = self.inner.recent_failure() {
                            tracing::debug!("JWKS fetch failed recently; not retrying yet");
                            return Err(err);
                        }
                    }

                    let refresh = Inner::spawn_fetch(&self.inner);
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }
}

impl<S, C> Inner<S, C>
where
    S: KeySource + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn age(&self, ring: &KeyRing) -> Duration {
        self.clock
            .now()
            .saturating_duration_since(ring.fetched_at())
    }

    fn is_fresh(&self, ring: &KeyRing) -> bool {
        self.age(ring) < self.config.max_age
    }

    fn is_cooling_down(&self, ring: &KeyRing) -> bool {
        self.age(ring) < self.config.cooldown
    }

    fn recent_failure(&self) -> Option<Arc<FetchError>> {
        let now = self.clock.now();
        let last_failure = self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match &*last_failure {
            Some((at, err)) if now.saturating_duration_since(*at) < self.config.cooldown => {
                Some(Arc::clone(err))
            }
            _ => None,
        }
    }

    fn spawn_fetch(this: &Arc<Self>) -> Refresh {
        let task = tokio::spawn({
            let this = Arc::clone(this);
            async move { this.fetch_and_publish().await }
        });

        let this = Arc::clone(this);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let error: &dyn std::error::Error = &join_err;
                    tracing::error!(error, "JWKS fetch task ended abnormally");
                    this.finish_fetch();
                    Err(Arc::new(FetchError::Aborted))
                }
            }
        }
        .boxed()
        .shared()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_and_publish(&self) -> Result<Arc<KeyRing>, Arc<FetchError>> {
        tracing::debug!("refreshing JWKS");

        let timeout = self.config.fetch_timeout;
        let fetched = tokio::time::timeout(timeout, self.source.fetch(timeout))
            .await
            .unwrap_or(Err(FetchError::Timeout(timeout)));

        let outcome = match fetched {
            Ok(keys) => {
                let ring = Arc::new(KeyRing::new(keys, self.clock.now()));
                self.current.store(Some(Arc::clone(&ring)));
                *self
                    .last_failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = None;

                tracing::info!(jwks.len = ring.keys().len(), "JWKS refreshed");
                Ok(ring)
            }
            Err(err) => {
                let err = Arc::new(err);
                {
                    let error: &dyn std::error::Error = &*err;
                    tracing::warn!(error, "JWKS refresh failed; keeping previous key set");
                }
                *self
                    .last_failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) =
                    Some((self.clock.now(), Arc::clone(&err)));
                Err(err)
            }
        };

        self.finish_fetch();
        outcome
    }

    fn finish_fetch(&self) {
        *self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl<S, C> KeyResolver for KeyCache<S, C>
where
    S: KeySource + 'static,
    C: Clock + Send + Sync + 'static,
{
    async fn resolve(
        &self,
        alg: Algorithm,
        kid: Option<&KeyIdRef>,
    ) -> Result<Arc<VerifyingKey>, KeyLookupError> {
        self.get_key(alg, kid).await
    }
}
