//! Narrow async interface over the platform cryptography.
//!
//! Natively the operations are backed by the RustCrypto crates, in the browser
//! by `SubtleCrypto`. Both backends produce identical bytes for every exported
//! artifact (SPKI public keys, `r || s` signatures, AES-GCM wrapped JWKs), so a
//! key wrapped on one side can be unwrapped on the other.
//!
//! Key handles are opaque: secret material never leaves a handle except
//! encrypted, through [`wrap_signing_key`].
use std::fmt;

mod base;
mod error;

pub use error::{CryptoError, Result};

/// SHA-256 digest length.
pub const HASH_SIZE: usize = 256 / 8;

/// AES-GCM nonce length.
pub const IV_LEN: usize = 96 / 8;
/// AES-GCM authentication tag length, appended to every ciphertext.
pub const TAG_LEN: usize = 128 / 8;
/// AES-256 key length produced by the HKDF step.
pub const WRAPPING_KEY_LEN: usize = 256 / 8;
/// Shortest caller key material accepted by [`import_master_secret`].
pub const MIN_MASTER_SECRET_LEN: usize = 16;

/// Caller-held key material, usable only as key-derivation input.
pub struct MasterSecret(base::MasterSecret);

/// AES-256-GCM key restricted to wrapping and unwrapping signing keys.
pub struct WrappingKey(base::WrappingKey);

/// ECDSA P-256 private key, sign only.
#[derive(Clone)]
pub struct SigningKey(base::SigningKey);

/// ECDSA P-256 public key, verify only.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(base::VerifyingKey);

pub struct SigningKeyPair {
    pub private: SigningKey,
    pub public: VerifyingKey,
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

impl fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WrappingKey(..)")
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerifyingKey(P-256)")
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("private", &self.private)
            .field("public", &self.public)
            .finish()
    }
}

pub async fn random_bytes(len: usize) -> Result<Vec<u8>> {
    base::random_bytes(len).await
}

pub async fn import_master_secret(key_data: &[u8]) -> Result<MasterSecret> {
    if key_data.len() < MIN_MASTER_SECRET_LEN {
        return Err(CryptoError::MalformedInput(format!(
            "master secret must be at least {} bytes, got {}",
            MIN_MASTER_SECRET_LEN,
            key_data.len()
        )));
    }
    base::import_master_secret(key_data).await.map(MasterSecret)
}

// P-256
pub async fn generate_pair() -> Result<SigningKeyPair> {
    let (private, public) = base::generate_pair().await?;
    Ok(SigningKeyPair {
        private: SigningKey(private),
        public: VerifyingKey(public),
    })
}

pub async fn import_pub_key(key_data: &[u8]) -> Result<VerifyingKey> {
    base::import_pub_key(key_data).await.map(VerifyingKey)
}

/// SPKI DER encoding of the public key.
pub async fn export_public_key(key: &VerifyingKey) -> Result<Vec<u8>> {
    base::export_public_key(&key.0).await
}

pub async fn public_key_of(key: &SigningKey) -> Result<VerifyingKey> {
    base::public_key_of(&key.0).await.map(VerifyingKey)
}

pub async fn sign(key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
    base::sign(&key.0, data).await
}

pub async fn verify(key: &VerifyingKey, signature: &[u8], data: &[u8]) -> bool {
    base::verify(&key.0, signature, data).await
}

// HKDF-SHA256 + AES-256-GCM
pub async fn derive_wrapping_key(master: &MasterSecret, salt: &[u8], info: &[u8]) -> Result<WrappingKey> {
    base::derive_wrapping_key(&master.0, salt, info).await.map(WrappingKey)
}

/// Encrypts the JWK form of `key`, returns `ciphertext || tag`.
///
/// Only keys fresh from [`generate_pair`] can be wrapped, keys returned by
/// [`unwrap_signing_key`] are not extractable and fail with
/// [`CryptoError::MalformedInput`].
///
/// The caller owns the IV and must never reuse one under the same wrapping key.
pub async fn wrap_signing_key(key: &SigningKey, wrapping_key: &WrappingKey, iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    base::wrap_signing_key(&key.0, &wrapping_key.0, iv).await
}

/// Inverse of [`wrap_signing_key`].
///
/// Fails with [`CryptoError::AuthenticationFailure`] when the tag does not
/// match, whatever the cause.
pub async fn unwrap_signing_key(wrapped: &[u8], wrapping_key: &WrappingKey, iv: &[u8; IV_LEN]) -> Result<SigningKey> {
    if wrapped.len() < TAG_LEN {
        return Err(CryptoError::AuthenticationFailure);
    }
    base::unwrap_signing_key(wrapped, &wrapping_key.0, iv).await.map(SigningKey)
}

// SHA2
pub async fn sha2_hash(context: &[u8], data: &[u8]) -> Result<[u8; HASH_SIZE]> {
    base::sha2_hash(context, data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ttest;

    const MASTER: [u8; 32] = [0x5a; 32];
    const SALT: [u8; 32] = [0x01; 32];
    const INFO: &[u8] = b"sealkey-crypto.tests";

    async fn wrapping_key(master: &[u8], salt: &[u8]) -> WrappingKey {
        let master = import_master_secret(master).await.unwrap();
        derive_wrapping_key(&master, salt, INFO).await.unwrap()
    }

    #[ttest]
    async fn sign_verify() {
        let pair = generate_pair().await.unwrap();
        let signature = sign(&pair.private, b"data").await.unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify(&pair.public, &signature, b"data").await);
        assert!(!verify(&pair.public, &signature, b"other").await);
        assert!(!verify(&pair.public, &signature[..63], b"data").await);
    }

    #[ttest]
    async fn public_key_export_import() {
        let pair = generate_pair().await.unwrap();
        let exported = export_public_key(&pair.public).await.unwrap();
        let imported = import_pub_key(&exported).await.unwrap();

        let signature = sign(&pair.private, b"payload").await.unwrap();
        assert!(verify(&imported, &signature, b"payload").await);
    }

    #[ttest]
    async fn import_garbage_public_key() {
        let err = import_pub_key(&[4u8; 10]).await.unwrap_err();
        assert!(matches!(err, CryptoError::MalformedInput(_)));
    }

    #[ttest]
    async fn short_master_secret_rejected() {
        let err = import_master_secret(&[0u8; MIN_MASTER_SECRET_LEN - 1]).await.unwrap_err();
        assert!(matches!(err, CryptoError::MalformedInput(_)));
    }

    #[ttest]
    async fn wrap_unwrap() {
        let pair = generate_pair().await.unwrap();
        let kw = wrapping_key(&MASTER, &SALT).await;
        let iv = [7u8; IV_LEN];

        let wrapped = wrap_signing_key(&pair.private, &kw, &iv).await.unwrap();
        let restored = unwrap_signing_key(&wrapped, &kw, &iv).await.unwrap();

        let signature = sign(&restored, b"after unwrap").await.unwrap();
        assert!(verify(&pair.public, &signature, b"after unwrap").await);
    }

    #[ttest]
    async fn unwrapped_key_cannot_be_wrapped_again() {
        let pair = generate_pair().await.unwrap();
        let kw = wrapping_key(&MASTER, &SALT).await;
        let iv = [5u8; IV_LEN];

        let wrapped = wrap_signing_key(&pair.private, &kw, &iv).await.unwrap();
        let restored = unwrap_signing_key(&wrapped, &kw, &iv).await.unwrap();

        let other = wrapping_key(&MASTER, &[0x03; 32]).await;
        let err = wrap_signing_key(&restored, &other, &[6u8; IV_LEN]).await.unwrap_err();
        assert!(matches!(err, CryptoError::MalformedInput(_)));
    }

    #[ttest]
    async fn derivation_is_deterministic() {
        let pair = generate_pair().await.unwrap();
        let iv = [9u8; IV_LEN];

        let wrapped = wrap_signing_key(&pair.private, &wrapping_key(&MASTER, &SALT).await, &iv).await.unwrap();
        let again = wrap_signing_key(&pair.private, &wrapping_key(&MASTER, &SALT).await, &iv).await.unwrap();
        assert_eq!(wrapped, again);
    }

    #[ttest]
    async fn unwrap_with_other_salt_fails() {
        let pair = generate_pair().await.unwrap();
        let iv = [3u8; IV_LEN];
        let wrapped = wrap_signing_key(&pair.private, &wrapping_key(&MASTER, &SALT).await, &iv).await.unwrap();

        let other = wrapping_key(&MASTER, &[0x02; 32]).await;
        let err = unwrap_signing_key(&wrapped, &other, &iv).await.unwrap_err();
        assert_eq!(err, CryptoError::AuthenticationFailure);
    }

    #[ttest]
    async fn unwrap_with_other_iv_fails() {
        let pair = generate_pair().await.unwrap();
        let kw = wrapping_key(&MASTER, &SALT).await;
        let wrapped = wrap_signing_key(&pair.private, &kw, &[1u8; IV_LEN]).await.unwrap();

        let err = unwrap_signing_key(&wrapped, &kw, &[2u8; IV_LEN]).await.unwrap_err();
        assert_eq!(err, CryptoError::AuthenticationFailure);
    }

    #[ttest]
    async fn derived_public_key_matches() {
        let pair = generate_pair().await.unwrap();
        let derived = public_key_of(&pair.private).await.unwrap();

        assert_eq!(
            export_public_key(&derived).await.unwrap(),
            export_public_key(&pair.public).await.unwrap(),
        );
    }

    #[ttest]
    async fn random_bytes_len() {
        let a = random_bytes(32).await.unwrap();
        let b = random_bytes(32).await.unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(random_bytes(0).await.unwrap().is_empty());
    }

    #[ttest]
    async fn sha2_known_vector() {
        // SHA-256("abc")
        let hash = sha2_hash(b"a", b"bc").await.unwrap();
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
