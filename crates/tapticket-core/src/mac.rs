//! Record authentication.
//!
//! Tickets are protected by HMAC-SHA256 under a key shared by issuer and
//! verifier. Only the first [`AUTH_CODE_LEN`] bytes of the code fit on the
//! token (pages 7-8), so that is all that gets stored and compared.
//!
//! The 64-bit truncation is a deliberate trade of security margin for token
//! space.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of the full authentication code.
pub const FULL_CODE_LEN: usize = 32;

/// Bytes of the authentication code stored on the token.
pub const AUTH_CODE_LEN: usize = 8;

/// Shortest accepted key.
pub const MIN_KEY_LEN: usize = 16;

const _: () = assert!(FULL_CODE_LEN >= AUTH_CODE_LEN);

/// Context string for deriving a key from a passphrase.
const PASSPHRASE_CONTEXT: &str = "tapticket 2026-10 record authentication key";

/// Pre-shared key material for the authenticator.
#[derive(Clone, PartialEq, Eq)]
pub struct MacKey(Vec<u8>);

impl MacKey {
    /// Create from raw bytes. At least [`MIN_KEY_LEN`] bytes are required.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.len() < MIN_KEY_LEN {
            return Err(CoreError::InvalidKey(format!(
                "key is {} bytes, need at least {}",
                bytes.len(),
                MIN_KEY_LEN
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    /// Derive a 32-byte key from a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(CoreError::InvalidKey("empty passphrase".into()));
        }
        Ok(Self(blake3::derive_key(PASSPHRASE_CONTEXT, passphrase.as_bytes()).to_vec()))
    }

    /// Generate a new random 32-byte key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes.to_vec())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacKey({} bytes, redacted)", self.0.len())
    }
}

/// The truncated authentication code stored in pages 7-8.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthCode(pub [u8; AUTH_CODE_LEN]);

impl AuthCode {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; AUTH_CODE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; AUTH_CODE_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AuthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthCode({})", self.to_hex())
    }
}

impl AsRef<[u8]> for AuthCode {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Computes and verifies authentication codes over ticket records.
#[derive(Clone)]
pub struct RecordAuthenticator {
    mac: HmacSha256,
}

impl RecordAuthenticator {
    /// Set up the authenticator. A failure here is a configuration error.
    pub fn new(key: &MacKey) -> Result<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// The full-length code over `data`.
    pub fn generate(&self, data: &[u8]) -> [u8; FULL_CODE_LEN] {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }

    /// The code as stored on the token: the first [`AUTH_CODE_LEN`] bytes.
    pub fn auth_code(&self, data: &[u8]) -> AuthCode {
        let full = self.generate(data);
        let mut code = [0u8; AUTH_CODE_LEN];
        code.copy_from_slice(&full[..AUTH_CODE_LEN]);
        AuthCode(code)
    }

    /// Recompute over `data` and compare the leading bytes in constant time.
    pub fn verify(&self, data: &[u8], stored: &AuthCode) -> bool {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_truncated_left(&stored.0).is_ok()
    }
}

impl fmt::Debug for RecordAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordAuthenticator(HMAC-SHA256/64)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> MacKey {
        MacKey::from_bytes([0x42u8; 16]).unwrap()
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(matches!(
            MacKey::from_bytes([0u8; 15]),
            Err(CoreError::InvalidKey(_))
        ));
        assert!(MacKey::from_hex("zz").is_err());
        assert!(MacKey::from_passphrase("").is_err());
    }

    #[test]
    fn test_key_hex_roundtrip() {
        let key = MacKey::generate();
        let recovered = MacKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, recovered);
    }

    #[test]
    fn test_passphrase_derivation_is_deterministic() {
        let k1 = MacKey::from_passphrase("open sesame").unwrap();
        let k2 = MacKey::from_passphrase("open sesame").unwrap();
        let k3 = MacKey::from_passphrase("open sesame!").unwrap();
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1.as_bytes().len(), 32);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = MacKey::from_bytes([0xABu8; 16]).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.to_lowercase().contains("abab"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_auth_code_is_prefix_of_full_code() {
        let auth = RecordAuthenticator::new(&test_key()).unwrap();
        let full = auth.generate(b"record");
        let code = auth.auth_code(b"record");
        assert_eq!(&full[..AUTH_CODE_LEN], code.as_bytes());
    }

    #[test]
    fn test_verify() {
        let auth = RecordAuthenticator::new(&test_key()).unwrap();
        let code = auth.auth_code(b"record");
        assert!(auth.verify(b"record", &code));
        assert!(!auth.verify(b"recorD", &code));
    }

    #[test]
    fn test_wrong_key_fails() {
        let issuer = RecordAuthenticator::new(&test_key()).unwrap();
        let other = RecordAuthenticator::new(&MacKey::from_bytes([0x43u8; 16]).unwrap()).unwrap();
        let code = issuer.auth_code(b"record");
        assert!(!other.verify(b"record", &code));
    }

    proptest! {
        #[test]
        fn test_any_flipped_code_bit_fails(data in prop::collection::vec(any::<u8>(), 0..64), bit in 0usize..64) {
            let auth = RecordAuthenticator::new(&test_key()).unwrap();
            let mut code = auth.auth_code(&data);
            code.0[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!auth.verify(&data, &code));
        }
    }
}
