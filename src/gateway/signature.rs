//! Digest and HMAC helpers shared by the provider adapters.
//!
//! Every comparison of a provider-supplied digest goes through [`digest_matches`],
//! which is constant time and case-insensitive on hex input.

use crate::error::{CheckoutError, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt::Write;

type HmacSha256 = Hmac<Sha256>;

/// Separator between the digest and the salt index in an `X-VERIFY` header.
pub const SALT_INDEX_SEPARATOR: &str = "###";

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

pub fn sha256_hex(data: &[u8]) -> String {
    to_hex(&Sha256::digest(data))
}

pub fn hmac_sha256_hex(secret: &[u8], data: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CheckoutError::Validation(format!("Unusable HMAC key: {}", e)))?;
    mac.update(data);
    Ok(to_hex(&mac.finalize().into_bytes()))
}

/// Salted checksum header: `sha256hex(payload + salt_key) + "###" + salt_index`.
pub fn salted_checksum(payload: &str, salt_key: &str, salt_index: &str) -> String {
    let digest = sha256_hex(format!("{}{}", payload, salt_key).as_bytes());
    format!("{}{}{}", digest, SALT_INDEX_SEPARATOR, salt_index)
}

/// Constant-time comparison of two hex digests.
pub fn digest_matches(expected: &str, provided: &str) -> bool {
    let provided = provided.trim().to_ascii_lowercase();
    constant_time_eq::constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

/// Checks a salted checksum header, including its salt index.
pub fn verify_salted_checksum(
    payload: &str,
    salt_key: &str,
    salt_index: &str,
    header: &str,
) -> bool {
    let Some((digest, index)) = header.trim().rsplit_once(SALT_INDEX_SEPARATOR) else {
        return false;
    };
    if index != salt_index {
        return false;
    }
    let expected = sha256_hex(format!("{}{}", payload, salt_key).as_bytes());
    digest_matches(&expected, digest)
}
