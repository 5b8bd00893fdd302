use std::iter::once;

use js_sys::{Array, ArrayBuffer, Object, Reflect, Uint8Array, JSON};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{window, Crypto, CryptoKey, SubtleCrypto};

use crate::{
    error::{CryptoError, Result},
    HASH_SIZE, IV_LEN, WRAPPING_KEY_LEN,
};

// getRandomValues refuses requests larger than this
const MAX_RANDOM_CHUNK: usize = 65536;

fn crypto() -> Result<Crypto> {
    window()
        .ok_or_else(|| CryptoError::ProviderUnavailable("No window object found".into()))?
        .crypto()
        .map_err(|_| CryptoError::ProviderUnavailable("Could not find crypto instance".into()))
}

fn subtle() -> Result<SubtleCrypto> {
    crypto().map(|c| c.subtle())
}

trait ToErrInner<T> {
    fn map_err_internal(self) -> core::result::Result<T, CryptoError>;
    fn map_err_with(self, f: fn(String) -> CryptoError) -> core::result::Result<T, CryptoError>;
}
impl<T> ToErrInner<T> for core::result::Result<T, JsValue> {
    fn map_err_internal(self) -> core::result::Result<T, CryptoError> {
        self.map_err_with(CryptoError::InternalError)
    }

    fn map_err_with(self, f: fn(String) -> CryptoError) -> core::result::Result<T, CryptoError> {
        self.map_err(|x| f(format!("{:?}", x)))
    }
}

fn js_object(entries: &[(&str, JsValue)]) -> Result<Object> {
    let o = Object::new();
    for (key, value) in entries {
        Reflect::set(&o, &JsValue::from_str(key), value).map_err_internal()?;
    }
    Ok(o)
}

fn usages(names: &[&str]) -> Array {
    names.iter().map(|x| JsValue::from_str(x)).collect()
}

fn ecdsa_algorithm() -> Result<Object> {
    js_object(&[
        ("name", "ECDSA".into()),
        ("namedCurve", "P-256".into()),
    ])
}

fn sign_params() -> Result<Object> {
    js_object(&[
        ("name", "ECDSA".into()),
        ("hash", "SHA-256".into()),
    ])
}

fn aes_gcm_params(iv: &[u8; IV_LEN]) -> Result<Object> {
    js_object(&[
        ("name", "AES-GCM".into()),
        ("iv", Uint8Array::from(&iv[..]).into()),
    ])
}

async fn buffer_result(promise: js_sys::Promise, f: fn(String) -> CryptoError) -> Result<Vec<u8>> {
    let buffer: ArrayBuffer = JsFuture::from(promise).await.map_err_with(f)?.unchecked_into();
    Ok(Uint8Array::new(&buffer).to_vec())
}

pub struct MasterSecret(CryptoKey);

pub struct WrappingKey(CryptoKey);

// The browser cannot compute a public key from a private CryptoKey, so both
// halves travel together.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    private: CryptoKey,
    public: CryptoKey,
}

#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(CryptoKey);

pub async fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let crypto = crypto()?;
    let mut buf = vec![0u8; len];
    for chunk in buf.chunks_mut(MAX_RANDOM_CHUNK) {
        crypto
            .get_random_values_with_u8_array(chunk)
            .map_err_with(CryptoError::GenerationFailure)?;
    }
    Ok(buf)
}

pub async fn import_master_secret(key_data: &[u8]) -> Result<MasterSecret> {
    let key_data = Uint8Array::from(key_data);
    let promise = subtle()?
        .import_key_with_str("raw", &key_data, "HKDF", false, &usages(&["deriveKey"]))
        .map_err_with(CryptoError::MalformedInput)?;
    let key = JsFuture::from(promise).await.map_err_with(CryptoError::MalformedInput)?;
    Ok(MasterSecret(key.unchecked_into()))
}

pub async fn generate_pair() -> Result<(SigningKey, VerifyingKey)> {
    // Extractable so that wrapKey can serialize it, the handle itself never exports it.
    let promise = subtle()?
        .generate_key_with_object(&ecdsa_algorithm()?, true, &usages(&["sign", "verify"]))
        .map_err_with(CryptoError::ProviderUnavailable)?;
    let pair = JsFuture::from(promise).await.map_err_with(CryptoError::GenerationFailure)?;

    let private: CryptoKey = Reflect::get(&pair, &"privateKey".into()).map_err_internal()?.unchecked_into();
    let public: CryptoKey = Reflect::get(&pair, &"publicKey".into()).map_err_internal()?.unchecked_into();

    Ok((
        SigningKey { private, public: public.clone() },
        VerifyingKey(public),
    ))
}

pub async fn import_pub_key(key_data: &[u8]) -> Result<VerifyingKey> {
    let key_data = Uint8Array::from(key_data);
    let promise = subtle()?
        .import_key_with_object("spki", &key_data, &ecdsa_algorithm()?, true, &usages(&["verify"]))
        .map_err_with(CryptoError::MalformedInput)?;
    let res = JsFuture::from(promise).await.map_err_with(CryptoError::MalformedInput)?;
    Ok(VerifyingKey(res.unchecked_into()))
}

pub async fn export_public_key(key: &VerifyingKey) -> Result<Vec<u8>> {
    let promise = subtle()?.export_key("spki", &key.0).map_err_internal()?;
    buffer_result(promise, CryptoError::InternalError).await
}

pub async fn public_key_of(key: &SigningKey) -> Result<VerifyingKey> {
    Ok(VerifyingKey(key.public.clone()))
}

pub async fn sign(key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
    // Safety: the first step of sign requires copying the buffer.
    let data: Uint8Array = unsafe { Uint8Array::view(data) };
    let promise = subtle()?
        .sign_with_object_and_buffer_source(&sign_params()?, &key.private, &data)
        .map_err_with(CryptoError::MalformedInput)?;
    buffer_result(promise, CryptoError::InternalError).await
}

pub async fn verify(key: &VerifyingKey, signature: &[u8], data: &[u8]) -> bool {
    let (subtle, params) = match (subtle(), sign_params()) {
        (Ok(s), Ok(p)) => (s, p),
        _ => return false,
    };
    // Safety: the first step of verify requires copying the buffers.
    let signature: Uint8Array = unsafe { Uint8Array::view(signature) };
    let data: Uint8Array = unsafe { Uint8Array::view(data) };
    let promise = match subtle.verify_with_object_and_buffer_source_and_buffer_source(&params, &key.0, &signature, &data) {
        Ok(x) => x,
        Err(_) => return false,
    };
    match JsFuture::from(promise).await {
        Ok(x) => x.as_bool().unwrap_or(false),
        Err(_) => false,
    }
}

pub async fn derive_wrapping_key(master: &MasterSecret, salt: &[u8], info: &[u8]) -> Result<WrappingKey> {
    let algorithm = js_object(&[
        ("name", "HKDF".into()),
        ("hash", "SHA-256".into()),
        ("salt", Uint8Array::from(salt).into()),
        ("info", Uint8Array::from(info).into()),
    ])?;
    let derived_type = js_object(&[
        ("name", "AES-GCM".into()),
        ("length", JsValue::from((WRAPPING_KEY_LEN * 8) as u32)),
    ])?;

    // Unwrapping goes through decrypt so the public half can be recovered
    // from the JWK before the private key is imported as non-extractable.
    let promise = subtle()?
        .derive_key_with_object_and_object(&algorithm, &master.0, &derived_type, false, &usages(&["wrapKey", "decrypt"]))
        .map_err_with(CryptoError::DerivationFailure)?;
    let key = JsFuture::from(promise).await.map_err_with(CryptoError::DerivationFailure)?;
    Ok(WrappingKey(key.unchecked_into()))
}

pub async fn wrap_signing_key(key: &SigningKey, wrapping_key: &WrappingKey, iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    let promise = subtle()?
        .wrap_key_with_object("jwk", &key.private, &wrapping_key.0, &aes_gcm_params(iv)?)
        .map_err_with(CryptoError::MalformedInput)?;
    // Rejected for unwrapped (non-extractable) keys
    buffer_result(promise, CryptoError::MalformedInput).await
}

pub async fn unwrap_signing_key(wrapped: &[u8], wrapping_key: &WrappingKey, iv: &[u8; IV_LEN]) -> Result<SigningKey> {
    let subtle = subtle()?;
    let data = Uint8Array::from(wrapped);
    let promise = subtle
        .decrypt_with_object_and_buffer_source(&aes_gcm_params(iv)?, &wrapping_key.0, &data)
        .map_err_internal()?;
    let plaintext = buffer_result(promise, |_| CryptoError::AuthenticationFailure).await?;
    let jwk_text = String::from_utf8(plaintext)
        .map_err(|_| CryptoError::MalformedInput("unwrapped key is not UTF-8".into()))?;

    let private_jwk = parse_jwk(&jwk_text)?;
    let promise = subtle
        .import_key_with_object("jwk", &private_jwk, &ecdsa_algorithm()?, false, &usages(&["sign"]))
        .map_err_with(CryptoError::MalformedInput)?;
    let private = JsFuture::from(promise).await.map_err_with(CryptoError::MalformedInput)?;

    let public = public_from_private_jwk(&subtle, &jwk_text).await?;

    Ok(SigningKey {
        private: private.unchecked_into(),
        public,
    })
}

fn parse_jwk(text: &str) -> Result<Object> {
    let value = JSON::parse(text).map_err_with(CryptoError::MalformedInput)?;
    value
        .dyn_into::<Object>()
        .map_err(|_| CryptoError::MalformedInput("unwrapped key is not a JWK object".into()))
}

// Strip the private scalar and narrow the allowed operations, what is left is
// the public JWK of the same curve point.
async fn public_from_private_jwk(subtle: &SubtleCrypto, jwk_text: &str) -> Result<CryptoKey> {
    let jwk = parse_jwk(jwk_text)?;
    Reflect::delete_property(&jwk, &"d".into()).map_err_internal()?;
    let key_ops: Array = once("verify").map(JsValue::from).collect();
    Reflect::set(&jwk, &"key_ops".into(), &key_ops).map_err_internal()?;

    let promise = subtle
        .import_key_with_object("jwk", &jwk, &ecdsa_algorithm()?, true, &usages(&["verify"]))
        .map_err_with(CryptoError::MalformedInput)?;
    let key = JsFuture::from(promise).await.map_err_with(CryptoError::MalformedInput)?;
    Ok(key.unchecked_into())
}

pub async fn sha2_hash(context: &[u8], data: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let mut input = Vec::with_capacity(context.len() + data.len());
    input.extend_from_slice(context);
    input.extend_from_slice(data);

    let input = Uint8Array::from(&input[..]);
    let promise = subtle()?
        .digest_with_str_and_buffer_source("SHA-256", &input)
        .map_err_internal()?;
    let hashed = buffer_result(promise, CryptoError::InternalError).await?;

    let mut res_data = [0u8; HASH_SIZE];
    res_data.copy_from_slice(&hashed);
    Ok(res_data)
}

#[doc(hidden)]
#[cfg(test)]
pub use wasm_bindgen_test::wasm_bindgen_test as ttest;

#[cfg(test)]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);
