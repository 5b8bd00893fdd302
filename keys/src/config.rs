use serde::{Deserialize, Serialize};

use crate::{KeyError, Result};

pub const DEFAULT_CONTEXT_LABEL: &str = "sealkey.keys.ecdsa-wrapping-key.v1";
pub const DEFAULT_SALT_LEN: usize = 32;
pub const MIN_SALT_LEN: usize = 16;

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningKeyConfig {
    // HKDF info, separates this key from anything else derived from the
    // same master secret. Changing it orphans every stored key.
    pub context_label: String,

    // Length of the random salt generated for each new key (in bytes),
    // stored salts of other lengths still derive
    pub salt_len: usize,
}

impl Default for SigningKeyConfig {
    fn default() -> Self {
        Self {
            context_label: DEFAULT_CONTEXT_LABEL.to_owned(),
            salt_len: DEFAULT_SALT_LEN,
        }
    }
}

impl SigningKeyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.context_label.is_empty() {
            return Err(KeyError::InvalidConfig("context_label must not be empty".into()));
        }
        if self.salt_len < MIN_SALT_LEN {
            return Err(KeyError::InvalidConfig(format!(
                "salt_len must be at least {MIN_SALT_LEN} bytes, got {}",
                self.salt_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SigningKeyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_short_salt_and_empty_label() {
        let config = SigningKeyConfig {
            salt_len: 8,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(KeyError::InvalidConfig(_))));

        let config = SigningKeyConfig {
            context_label: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(KeyError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: SigningKeyConfig = serde_json::from_str(r#"{ "salt_len": 48 }"#).unwrap();
        assert_eq!(config.salt_len, 48);
        assert_eq!(config.context_label, DEFAULT_CONTEXT_LABEL);
    }
}
