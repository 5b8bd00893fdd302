//! Byte layouts of the artifacts that leave this crate.
//!
//! ```text
//! WrappedPrivateKey := Ciphertext(n) || AuthTag(TAG_LEN) || IV(IV_LEN)
//! ```
//!
//! Everything crosses the storage or network boundary as standard, padded
//! base64.
use std::fmt;

use sealkey_crypto::{self as crypto, CryptoError};

use crate::Result;

pub use sealkey_crypto::{IV_LEN, TAG_LEN};

/// Shortest blob that can hold a non-empty ciphertext.
pub const MIN_WRAPPED_LEN: usize = 1 + TAG_LEN + IV_LEN;

/// Binds one wrapping-key derivation to one wrapped private key. Not secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    pub async fn generate(len: usize) -> Result<Self> {
        Ok(Salt(crypto::random_bytes(len).await?))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Salt(bytes)
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        Ok(Salt(base64::decode(text)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::encode(&self.0)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_base64())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct WrappedPrivateKey(Vec<u8>);

impl WrappedPrivateKey {
    /// Appends the IV to the `ciphertext || tag` blob returned by the provider.
    pub fn assemble(mut ciphertext_and_tag: Vec<u8>, iv: &[u8; IV_LEN]) -> Self {
        ciphertext_and_tag.extend_from_slice(iv);
        WrappedPrivateKey(ciphertext_and_tag)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        WrappedPrivateKey(bytes)
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        Ok(WrappedPrivateKey(base64::decode(text)?))
    }

    /// Returns `(ciphertext || tag, iv)`.
    pub fn split(&self) -> Result<(&[u8], &[u8; IV_LEN])> {
        if self.0.len() < MIN_WRAPPED_LEN {
            return Err(CryptoError::MalformedInput(format!(
                "wrapped key must be at least {MIN_WRAPPED_LEN} bytes, got {}",
                self.0.len()
            ))
            .into());
        }
        let (body, iv) = self.0.split_at(self.0.len() - IV_LEN);
        let iv = <&[u8; IV_LEN]>::try_from(iv)
            .map_err(|_| CryptoError::InternalError("IV slice has wrong length".into()))?;
        Ok((body, iv))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        base64::encode(&self.0)
    }
}

impl fmt::Debug for WrappedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedPrivateKey({} bytes)", self.0.len())
    }
}
