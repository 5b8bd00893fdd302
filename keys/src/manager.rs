use sealkey_crypto::{self as crypto, CryptoError, MasterSecret, SigningKey, VerifyingKey, WrappingKey, IV_LEN};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::{SigningKeyConfig, MIN_SALT_LEN},
    format::{Salt, WrappedPrivateKey},
    Result,
};

const FINGERPRINT_CONTEXT: &[u8] = b"sealkey.keys.public-key-fingerprint";

/// Output of [`SigningKeyManager::generate_signing_key_material`].
///
/// Everything except `private_key` and `public_key` is base64 text meant for
/// storage or transmission.
#[derive(Debug)]
pub struct GeneratedSigningKey {
    pub private_key: SigningKey,
    pub public_key: VerifyingKey,
    pub public_key_string: String,
    pub wrapped_private_key: String,
    pub salt: String,
}

impl GeneratedSigningKey {
    pub fn to_stored(&self) -> StoredSigningKey {
        StoredSigningKey {
            public_key: self.public_key_string.clone(),
            wrapped_private_key: self.wrapped_private_key.clone(),
            salt: self.salt.clone(),
        }
    }
}

/// The durable part of a signing key, safe to persist next to user data.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct StoredSigningKey {
    pub public_key: String,
    pub wrapped_private_key: String,
    pub salt: String,
}

#[derive(Clone, Debug, Default)]
pub struct SigningKeyManager {
    config: SigningKeyConfig,
}

impl SigningKeyManager {
    pub fn new(config: SigningKeyConfig) -> Result<Self> {
        config.validate()?;
        Ok(SigningKeyManager { config })
    }

    pub fn config(&self) -> &SigningKeyConfig {
        &self.config
    }

    pub async fn generate_signing_key_material(&self, master: &MasterSecret) -> Result<GeneratedSigningKey> {
        let pair = crypto::generate_pair().await?;
        let salt = Salt::generate(self.config.salt_len).await?;
        let wrapper = self.derive_key_wrapper(master, &salt).await?;
        let wrapped = wrap_private_key(&pair.private, &wrapper).await?;
        let public_key_string = export_public_key_string(&pair.public).await?;
        debug!(wrapped_len = wrapped.len(), "Generated signing key material");

        Ok(GeneratedSigningKey {
            private_key: pair.private,
            public_key: pair.public,
            public_key_string,
            wrapped_private_key: wrapped.to_base64(),
            salt: salt.to_base64(),
        })
    }

    /// Deterministic for a given master secret, salt and context label.
    ///
    /// Any salt of at least [`MIN_SALT_LEN`] bytes is accepted, stored salts
    /// keep working after `salt_len` changes.
    pub async fn derive_key_wrapper(&self, master: &MasterSecret, salt: &Salt) -> Result<WrappingKey> {
        if salt.len() < MIN_SALT_LEN {
            return Err(CryptoError::DerivationFailure(format!(
                "salt must be at least {MIN_SALT_LEN} bytes, got {}",
                salt.len()
            ))
            .into());
        }
        let key = crypto::derive_wrapping_key(master, salt.as_bytes(), self.config.context_label.as_bytes()).await?;
        Ok(key)
    }

    /// Rebuilds the live private key from its stored form.
    pub async fn restore_signing_key(&self, master: &MasterSecret, stored: &StoredSigningKey) -> Result<SigningKey> {
        let salt = Salt::from_base64(&stored.salt)?;
        let wrapped = WrappedPrivateKey::from_base64(&stored.wrapped_private_key)?;
        let wrapper = self.derive_key_wrapper(master, &salt).await?;
        unwrap_private_key(&wrapped, &wrapper).await
    }
}

/// Wraps under a freshly generated IV, see [`crate::format`] for the layout.
pub async fn wrap_private_key(key: &SigningKey, wrapper: &WrappingKey) -> Result<WrappedPrivateKey> {
    let iv_bytes = crypto::random_bytes(IV_LEN).await?;
    let iv = <[u8; IV_LEN]>::try_from(iv_bytes.as_slice())
        .map_err(|_| CryptoError::GenerationFailure("short IV".into()))?;

    let ciphertext_and_tag = crypto::wrap_signing_key(key, wrapper, &iv).await?;
    Ok(WrappedPrivateKey::assemble(ciphertext_and_tag, &iv))
}

pub async fn unwrap_private_key(wrapped: &WrappedPrivateKey, wrapper: &WrappingKey) -> Result<SigningKey> {
    let (ciphertext_and_tag, iv) = wrapped.split()?;
    crypto::unwrap_signing_key(ciphertext_and_tag, wrapper, iv).await.map_err(|e| {
        if e == CryptoError::AuthenticationFailure {
            warn!("Wrapped signing key failed authentication");
        }
        e.into()
    })
}

pub async fn derive_public_key_from_private_key(key: &SigningKey) -> Result<VerifyingKey> {
    Ok(crypto::public_key_of(key).await?)
}

pub async fn export_public_key_string(key: &VerifyingKey) -> Result<String> {
    Ok(base64::encode(crypto::export_public_key(key).await?))
}

pub async fn import_public_key_string(text: &str) -> Result<VerifyingKey> {
    let der = base64::decode(text)?;
    Ok(crypto::import_pub_key(&der).await?)
}

/// Hex SHA-256 of the exported public key, for display and lookups.
pub async fn public_key_fingerprint(key: &VerifyingKey) -> Result<String> {
    let exported = crypto::export_public_key(key).await?;
    let hash = crypto::sha2_hash(FINGERPRINT_CONTEXT, &exported).await?;
    Ok(hex::encode(hash))
}

pub async fn sign(key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
    Ok(crypto::sign(key, data).await?)
}

pub async fn verify(key: &VerifyingKey, signature: &[u8], data: &[u8]) -> bool {
    crypto::verify(key, signature, data).await
}

/// Signs the UTF-8 bytes of `text`, returns the signature as base64.
pub async fn sign_text(key: &SigningKey, text: &str) -> Result<String> {
    let signature = crypto::sign(key, text.as_bytes()).await?;
    Ok(base64::encode(signature))
}

pub async fn verify_text(key: &VerifyingKey, signature: &str, text: &str) -> Result<bool> {
    let signature = base64::decode(signature)?;
    Ok(crypto::verify(key, &signature, text.as_bytes()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyError;

    async fn master() -> MasterSecret {
        crypto::import_master_secret(&[0x42; 32]).await.unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn wrong_salt_length_is_derivation_failure() {
        let manager = SigningKeyManager::default();
        let salt = Salt::from_bytes(vec![0; 8]);

        let err = manager.derive_key_wrapper(&master().await, &salt).await.unwrap_err();
        assert!(matches!(err, KeyError::Crypto(CryptoError::DerivationFailure(_))));
    }

    #[test_log::test(tokio::test)]
    async fn restore_after_salt_len_change() {
        let master = master().await;
        let generated = SigningKeyManager::default().generate_signing_key_material(&master).await.unwrap();

        let manager = SigningKeyManager::new(SigningKeyConfig {
            salt_len: 48,
            ..Default::default()
        })
        .unwrap();
        let restored = manager.restore_signing_key(&master, &generated.to_stored()).await.unwrap();

        let signature = sign(&restored, b"still here").await.unwrap();
        assert!(verify(&generated.public_key, &signature, b"still here").await);

        let regenerated = manager.generate_signing_key_material(&master).await.unwrap();
        assert_eq!(Salt::from_base64(&regenerated.salt).unwrap().len(), 48);
    }

    #[test_log::test(tokio::test)]
    async fn restored_key_cannot_be_rewrapped() {
        let manager = SigningKeyManager::default();
        let master = master().await;
        let generated = manager.generate_signing_key_material(&master).await.unwrap();
        let restored = manager.restore_signing_key(&master, &generated.to_stored()).await.unwrap();

        let salt = Salt::from_bytes(vec![0x07; MIN_SALT_LEN]);
        let wrapper = manager.derive_key_wrapper(&master, &salt).await.unwrap();
        let err = wrap_private_key(&restored, &wrapper).await.unwrap_err();
        assert!(matches!(err, KeyError::Crypto(CryptoError::MalformedInput(_))));
    }

    #[test_log::test(tokio::test)]
    async fn wrapped_layout() {
        let manager = SigningKeyManager::default();
        let generated = manager.generate_signing_key_material(&master().await).await.unwrap();

        let salt = Salt::from_base64(&generated.salt).unwrap();
        assert_eq!(salt.len(), manager.config().salt_len);

        let wrapped = WrappedPrivateKey::from_base64(&generated.wrapped_private_key).unwrap();
        let (body, _iv) = wrapped.split().unwrap();
        assert_eq!(body.len() + IV_LEN, wrapped.len());
        assert!(body.len() > crypto::TAG_LEN);
    }

    #[test_log::test(tokio::test)]
    async fn fresh_iv_per_wrap() {
        let manager = SigningKeyManager::default();
        let master = master().await;
        let generated = manager.generate_signing_key_material(&master).await.unwrap();
        let salt = Salt::from_base64(&generated.salt).unwrap();
        let wrapper = manager.derive_key_wrapper(&master, &salt).await.unwrap();

        let a = wrap_private_key(&generated.private_key, &wrapper).await.unwrap();
        let b = wrap_private_key(&generated.private_key, &wrapper).await.unwrap();
        assert_ne!(a.split().unwrap().1, b.split().unwrap().1);
        assert_ne!(a, b);
    }

    #[test_log::test(tokio::test)]
    async fn text_signatures() {
        let pair = crypto::generate_pair().await.unwrap();
        let signature = sign_text(&pair.private, "hello").await.unwrap();

        assert!(verify_text(&pair.public, &signature, "hello").await.unwrap());
        assert!(!verify_text(&pair.public, &signature, "hellO").await.unwrap());

        let err = verify_text(&pair.public, "%%%", "hello").await.unwrap_err();
        assert!(matches!(err, KeyError::Encoding(_)));
    }

    #[test_log::test(tokio::test)]
    async fn fingerprint_is_stable() {
        let pair = crypto::generate_pair().await.unwrap();
        let text = export_public_key_string(&pair.public).await.unwrap();
        let imported = import_public_key_string(&text).await.unwrap();

        let a = public_key_fingerprint(&pair.public).await.unwrap();
        let b = public_key_fingerprint(&imported).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn stored_json_shape() {
        let stored = StoredSigningKey {
            public_key: "cHVi".into(),
            wrapped_private_key: "d3JhcA==".into(),
            salt: "c2FsdA==".into(),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["wrapped_private_key"], "d3JhcA==");

        let back: StoredSigningKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }
}
