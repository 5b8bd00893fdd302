use sealkey_crypto::CryptoError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("Invalid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl KeyError {
    /// Wrong master secret, wrong salt or tampered wrapped key.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, KeyError::Crypto(CryptoError::AuthenticationFailure))
    }
}

pub type Result<T> = core::result::Result<T, KeyError>;
