use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CryptoError {
    #[error("Crypto provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Key or randomness generation failed: {0}")]
    GenerationFailure(String),
    #[error("Key derivation failed: {0}")]
    DerivationFailure(String),
    // Wrong wrapping key, wrong IV or tampered bytes, never distinguishable
    #[error("Authentication failed while unwrapping key")]
    AuthenticationFailure,
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Unknown internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = core::result::Result<T, CryptoError>;
