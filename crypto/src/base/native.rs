use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use p256::{
    ecdsa::{signature::{Signer, Verifier}, Signature, SigningKey as RawSigningKey},
    pkcs8::{DecodePublicKey, EncodePublicKey},
    SecretKey,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{CryptoError, Result, HASH_SIZE, IV_LEN, WRAPPING_KEY_LEN};

pub use p256::ecdsa::VerifyingKey;

#[derive(Clone)]
pub struct SigningKey {
    raw: RawSigningKey,
    // Only freshly generated keys may be wrapped, unwrapped ones stay sealed
    extractable: bool,
}

pub struct MasterSecret(Zeroizing<Vec<u8>>);

pub struct WrappingKey(Aes256Gcm);

pub async fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::GenerationFailure(e.to_string()))?;
    Ok(buf)
}

pub async fn import_master_secret(key_data: &[u8]) -> Result<MasterSecret> {
    Ok(MasterSecret(Zeroizing::new(key_data.to_vec())))
}

pub async fn generate_pair() -> Result<(SigningKey, VerifyingKey)> {
    let raw = RawSigningKey::random(&mut OsRng);
    let public = raw.verifying_key().clone();
    Ok((SigningKey { raw, extractable: true }, public))
}

pub async fn import_pub_key(key_data: &[u8]) -> Result<VerifyingKey> {
    VerifyingKey::from_public_key_der(key_data)
        .map_err(|e| CryptoError::MalformedInput(format!("invalid SPKI public key: {e}")))
}

pub async fn export_public_key(key: &VerifyingKey) -> Result<Vec<u8>> {
    let doc = key
        .to_public_key_der()
        .map_err(|e| CryptoError::InternalError(e.to_string()))?;
    Ok(doc.as_bytes().to_vec())
}

// The curve point is part of the private key, no export round trip needed here.
pub async fn public_key_of(key: &SigningKey) -> Result<VerifyingKey> {
    Ok(key.raw.verifying_key().clone())
}

pub async fn sign(key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
    let s: Signature = key.raw.sign(data);
    Ok(s.to_bytes().to_vec())
}

pub async fn verify(key: &VerifyingKey, signature: &[u8], data: &[u8]) -> bool {
    Signature::from_slice(signature)
        .and_then(|signature| key.verify(data, &signature))
        .is_ok()
}

pub async fn derive_wrapping_key(master: &MasterSecret, salt: &[u8], info: &[u8]) -> Result<WrappingKey> {
    let hk = Hkdf::<Sha256>::new(Some(salt), &master.0);
    let mut okm = Zeroizing::new([0u8; WRAPPING_KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| CryptoError::DerivationFailure(e.to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(&okm[..])
        .map_err(|e| CryptoError::DerivationFailure(e.to_string()))?;
    Ok(WrappingKey(cipher))
}

pub async fn wrap_signing_key(key: &SigningKey, wrapping_key: &WrappingKey, iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    if !key.extractable {
        return Err(CryptoError::MalformedInput("signing key is not extractable".into()));
    }
    let secret = SecretKey::from(key.raw.as_nonzero_scalar());
    // Same plaintext WebCrypto produces for wrapKey("jwk", ...)
    let jwk = secret.to_jwk_string();

    wrapping_key
        .0
        .encrypt(Nonce::from_slice(iv), jwk.as_bytes())
        .map_err(|_| CryptoError::InternalError("AES-GCM encryption failed".into()))
}

pub async fn unwrap_signing_key(wrapped: &[u8], wrapping_key: &WrappingKey, iv: &[u8; IV_LEN]) -> Result<SigningKey> {
    let plaintext = wrapping_key
        .0
        .decrypt(Nonce::from_slice(iv), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    let jwk = core::str::from_utf8(&plaintext)
        .map_err(|_| CryptoError::MalformedInput("unwrapped key is not UTF-8".into()))?;
    let secret = SecretKey::from_jwk_str(jwk)
        .map_err(|_| CryptoError::MalformedInput("unwrapped key is not a P-256 JWK".into()))?;
    Ok(SigningKey {
        raw: RawSigningKey::from(secret),
        extractable: false,
    })
}

pub async fn sha2_hash(context: &[u8], data: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let mut hasher = Sha256::new();

    hasher.update(context);
    hasher.update(data);
    let mut res_data = [0u8; HASH_SIZE];
    res_data.copy_from_slice(&hasher.finalize());
    Ok(res_data)
}

#[doc(hidden)]
#[cfg(test)]
pub use tokio::test as ttest;
