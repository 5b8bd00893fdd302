//! Signing-key lifecycle for the end-to-end-encrypted client.
//!
//! A P-256 signing key is generated once per identity, its private half is
//! wrapped with AES-256-GCM under a key derived (HKDF-SHA256) from the
//! caller's master secret and a per-key random salt. Only the wrapped key,
//! the salt and the public key are meant to be stored; the live private key
//! is rebuilt on demand with [`SigningKeyManager::restore_signing_key`].
//!
//! Losing either the master secret or the salt makes the private key
//! unrecoverable.
pub mod config;
mod error;
pub mod format;
mod manager;

pub use error::{KeyError, Result};
pub use manager::{
    derive_public_key_from_private_key, export_public_key_string, import_public_key_string,
    public_key_fingerprint, sign, sign_text, unwrap_private_key, verify, verify_text, wrap_private_key,
    GeneratedSigningKey, SigningKeyManager, StoredSigningKey,
};

pub use sealkey_crypto::{import_master_secret, CryptoError, MasterSecret, SigningKey, VerifyingKey, WrappingKey};
