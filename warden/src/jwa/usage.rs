use serde::Deserialize;

/// The intended use for a JWK (the `use` member)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[must_use]
pub enum Usage {
    /// The key is intended for signing and verification
    #[serde(rename = "sig")]
    Signing,

    /// The key is intended for encryption
    #[serde(rename = "enc")]
    Encryption,

    /// Any other, unregistered use
    #[serde(other)]
    Other,
}

/// An operation a JWK may be used for (an entry of the `key_ops` member)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyOperation {
    /// Compute a signature or MAC
    Sign,
    /// Verify a signature or MAC
    Verify,
    /// Encrypt content
    Encrypt,
    /// Decrypt content and validate decryption
    Decrypt,
    /// Encrypt a key
    WrapKey,
    /// Decrypt a key and validate decryption
    UnwrapKey,
    /// Derive a key
    DeriveKey,
    /// Derive bits not to be used as a key
    DeriveBits,
    /// Any other, unregistered operation
    #[serde(other)]
    Other,
}
