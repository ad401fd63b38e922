//! Ticket configuration.
//!
//! The authentication key is never compiled in. It comes from a JSON config
//! or from the environment:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `TAPTICKET_KEY` | hex-encoded key, at least 16 bytes |
//! | `TAPTICKET_PASSPHRASE` | passphrase, used when `TAPTICKET_KEY` is unset |
//! | `TAPTICKET_SAFE_MODE` | `0`/`false`/`off` writes to the real OTP and lock pages |

use std::fmt;

use serde::Deserialize;
use tapticket_core::MacKey;

use crate::error::{Result, TicketError};

/// Environment variable holding a hex key.
pub const ENV_KEY: &str = "TAPTICKET_KEY";

/// Environment variable holding a passphrase.
pub const ENV_PASSPHRASE: &str = "TAPTICKET_PASSPHRASE";

/// Environment variable toggling safe mode.
pub const ENV_SAFE_MODE: &str = "TAPTICKET_SAFE_MODE";

/// Where the authentication key comes from.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// No key configured. Building a key fails.
    #[default]
    None,
    /// Hex-encoded key bytes.
    Hex(String),
    /// Passphrase stretched into a key.
    Passphrase(String),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::None => write!(f, "None"),
            KeySource::Hex(_) => write!(f, "Hex(redacted)"),
            KeySource::Passphrase(_) => write!(f, "Passphrase(redacted)"),
        }
    }
}

/// Configuration for a [`Ticket`](crate::Ticket).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TicketConfig {
    /// Authentication key material.
    pub key: KeySource,
    /// Emulate the OTP and lock pages instead of writing them.
    pub safe_mode: bool,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            key: KeySource::None,
            safe_mode: true,
        }
    }
}

impl TicketConfig {
    /// Configuration with a hex key and safe mode on.
    pub fn with_hex_key(hex: impl Into<String>) -> Self {
        Self {
            key: KeySource::Hex(hex.into()),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TicketError::Config(e.to_string()))
    }

    /// Apply environment variable overrides to existing configuration.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(hex) = lookup(ENV_KEY) {
            self.key = KeySource::Hex(hex);
        } else if let Some(passphrase) = lookup(ENV_PASSPHRASE) {
            self.key = KeySource::Passphrase(passphrase);
        }

        if let Some(val) = lookup(ENV_SAFE_MODE) {
            self.safe_mode = parse_flag(&val).ok_or_else(|| {
                TicketError::Config(format!("{} must be a boolean, got {:?}", ENV_SAFE_MODE, val))
            })?;
        }
        Ok(())
    }

    /// Resolve the configured key material.
    pub fn build_key(&self) -> Result<MacKey> {
        match &self.key {
            KeySource::None => Err(TicketError::Config(format!(
                "no authentication key configured; set {} or {}",
                ENV_KEY, ENV_PASSPHRASE
            ))),
            KeySource::Hex(hex) => Ok(MacKey::from_hex(hex)?),
            KeySource::Passphrase(passphrase) => Ok(MacKey::from_passphrase(passphrase)?),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tapticket_core::CoreError;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_is_safe_and_keyless() {
        let config = TicketConfig::default();
        assert!(config.safe_mode);
        assert!(matches!(config.build_key(), Err(TicketError::Config(_))));
    }

    #[test]
    fn test_env_hex_key_wins_over_passphrase() {
        let mut config = TicketConfig::default();
        config
            .apply_overrides(lookup(&[(ENV_KEY, HEX_KEY), (ENV_PASSPHRASE, "ignored")]))
            .unwrap();

        assert_eq!(config.key, KeySource::Hex(HEX_KEY.into()));
        assert_eq!(config.build_key().unwrap().to_hex(), HEX_KEY);
    }

    #[test]
    fn test_env_passphrase() {
        let mut config = TicketConfig::default();
        config
            .apply_overrides(lookup(&[(ENV_PASSPHRASE, "correct horse")]))
            .unwrap();

        let key = config.build_key().unwrap();
        assert_eq!(key, MacKey::from_passphrase("correct horse").unwrap());
        assert_eq!(key.as_bytes().len(), 32);
    }

    #[test]
    fn test_env_safe_mode() {
        let mut config = TicketConfig::default();
        config
            .apply_overrides(lookup(&[(ENV_SAFE_MODE, "False")]))
            .unwrap();
        assert!(!config.safe_mode);

        config.apply_overrides(lookup(&[(ENV_SAFE_MODE, "1")])).unwrap();
        assert!(config.safe_mode);

        let err = config
            .apply_overrides(lookup(&[(ENV_SAFE_MODE, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, TicketError::Config(_)));
    }

    #[test]
    fn test_short_key_rejected() {
        let config = TicketConfig::with_hex_key("0011");
        assert!(matches!(
            config.build_key(),
            Err(TicketError::Core(CoreError::InvalidKey(_)))
        ));
    }

    #[test]
    fn test_from_json() {
        let config = TicketConfig::from_json(&format!(
            r#"{{"key": {{"hex": "{}"}}, "safe_mode": false}}"#,
            HEX_KEY
        ))
        .unwrap();
        assert_eq!(config.key, KeySource::Hex(HEX_KEY.into()));
        assert!(!config.safe_mode);

        let config = TicketConfig::from_json(r#"{"key": {"passphrase": "pw"}}"#).unwrap();
        assert!(config.safe_mode);

        assert!(matches!(
            TicketConfig::from_json("{\"key\": 7}"),
            Err(TicketError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = TicketConfig::with_hex_key(HEX_KEY);
        let debug = format!("{:?}", config);
        assert!(!debug.contains(HEX_KEY));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_json_passphrase_stays_redacted() {
        let config = TicketConfig::from_json(r#"{"key": {"passphrase": "open sesame"}}"#).unwrap();
        assert!(config.safe_mode);
        assert_eq!(config.key, KeySource::Passphrase("open sesame".into()));
        assert!(!format!("{:?}", config).contains("open sesame"));
    }
}
