//! Golden test vectors for the record authentication code.
//!
//! Each vector fixes a token UID, a key and ticket terms, and records the
//! canonical signed bytes and the 8-byte code stored in pages 7-8. Readers
//! and issuers built elsewhere must reproduce these exactly.

use serde::Serialize;
use tapticket_core::{MacKey, TicketRecord};

use crate::fixtures::issued_image;

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Token UID.
    pub uid: [u8; 7],
    /// Authentication key.
    pub key: &'static [u8],
    /// Expiry time in minutes.
    pub expiry_time: u32,
    /// Allowed uses.
    pub allowed_uses: u32,
    /// Expected canonical bytes of pages 0-6 (hex).
    pub expected_signed_bytes: &'static str,
    /// Expected stored authentication code (hex).
    pub expected_auth_code: &'static str,
}

const KEY_5A: [u8; 32] = [0x5A; 32];
const KEY_COUNTING: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
];
const KEY_11: [u8; 32] = [0x11; 32];

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "default uid, ten uses",
            uid: [0x04, 0x8A, 0x1C, 0x52, 0xE2, 0x3B, 0x80],
            key: &KEY_5A,
            expiry_time: 29_043_200,
            allowed_uses: 10,
            expected_signed_bytes:
                "048a1c1a52e23b800b4800000000000054494b5401bb2a000000000a",
            expected_auth_code: "50475ab39eee92ac",
        },
        GoldenVector {
            name: "zero uid, single use",
            uid: [0x00; 7],
            key: &KEY_COUNTING,
            expiry_time: 0,
            allowed_uses: 1,
            expected_signed_bytes:
                "0000008800000000004800000000000054494b540000000000000001",
            expected_auth_code: "bc98d65a35435ff7",
        },
        GoldenVector {
            name: "maximum terms",
            uid: [0x04, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            key: &KEY_11,
            expiry_time: u32::MAX,
            allowed_uses: 32,
            expected_signed_bytes:
                "04ffff8cffffffff004800000000000054494b54ffffffff00000020",
            expected_auth_code: "7496698c801945b0",
        },
    ]
}

/// Compute the signed bytes and authentication code for a vector.
pub fn compute_vector(vector: &GoldenVector) -> (String, String) {
    let key = MacKey::from_bytes(vector.key).expect("golden key length");
    let image = issued_image(vector.uid, &key, vector.expiry_time, vector.allowed_uses);
    let record = TicketRecord::from_image(&image);
    (hex::encode(record.signed_bytes()), record.auth_code.to_hex())
}

/// Check every golden vector.
///
/// Returns `(name, matches, computed auth code)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let (signed, code) = compute_vector(v);
            let matches = signed == v.expected_signed_bytes && code == v.expected_auth_code;
            (v.name.to_string(), matches, code)
        })
        .collect()
}

/// All vectors as pretty-printed JSON, for sharing with other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, code) in verify_all_vectors() {
            assert!(matches, "vector '{}' computed {}", name, code);
        }
    }

    #[test]
    fn test_vectors_json_round_trips_names() {
        let json = vectors_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let names: Vec<&str> = parsed
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["default uid, ten uses", "zero uid, single use", "maximum terms"]);
    }

    #[test]
    fn test_different_keys_different_codes() {
        let vectors = all_vectors();
        let mut v = vectors[0].clone();
        v.key = &KEY_11;
        assert_ne!(compute_vector(&v).1, vectors[0].expected_auth_code);
    }
}
