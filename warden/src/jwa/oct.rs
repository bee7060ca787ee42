//! Symmetric (`oct`) keys
//!
//! Shared secrets are modeled so that a key set containing one parses
//! cleanly, but they are never usable for verification.

use std::fmt;

use serde::Deserialize;

use crate::b64;

/// A shared secret
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[must_use]
pub struct SharedKey {
    #[serde(rename = "k", deserialize_with = "b64::deserialize")]
    secret: Vec<u8>,
}

impl SharedKey {
    /// Wraps the provided secret
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Length of the secret in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.secret.len()
    }

    /// Whether the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SharedKey { secret }")
    }
}
