//! Shared-secret strength checks for the HS256 fallback scheme

use crate::error::{AuthError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

const MIN_SECRET_LENGTH: usize = 32; // 256 bits
const RECOMMENDED_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS: f64 = 4.0;
const STRONG_ENTROPY_BITS: f64 = 5.0;
const MAX_PATTERN_RUN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    /// Refused at startup
    Weak,
    /// Accepted with a warning
    Acceptable,
    Strong,
}

/// Classify a shared secret.
///
/// A secret is weak when it is shorter than 32 bytes, has a Shannon entropy
/// under 4 bits per byte, or contains a run of four repeated or ascending
/// bytes (`aaaa`, `1234`).
pub fn validate_secret_strength(secret: &str) -> SecretStrength {
    let bytes = secret.as_bytes();

    if bytes.len() < MIN_SECRET_LENGTH {
        return SecretStrength::Weak;
    }

    let entropy = shannon_entropy(bytes);
    if entropy < MIN_ENTROPY_BITS || has_obvious_patterns(bytes) {
        return SecretStrength::Weak;
    }

    if bytes.len() >= RECOMMENDED_SECRET_LENGTH && entropy >= STRONG_ENTROPY_BITS {
        SecretStrength::Strong
    } else {
        SecretStrength::Acceptable
    }
}

/// Refuse weak secrets before they are turned into keys
pub fn ensure_usable_secret(secret: &str) -> Result<SecretStrength> {
    match validate_secret_strength(secret) {
        SecretStrength::Weak => Err(AuthError::InvalidKey(format!(
            "shared secret is too weak (need at least {} bytes of non-patterned data)",
            MIN_SECRET_LENGTH
        ))),
        strength => Ok(strength),
    }
}

fn shannon_entropy(data: &[u8]) -> f64 {
    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    let len = data.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn has_obvious_patterns(data: &[u8]) -> bool {
    let mut repeated = 1;
    let mut ascending = 1;

    for pair in data.windows(2) {
        repeated = if pair[0] == pair[1] { repeated + 1 } else { 1 };
        ascending = if pair[1] as i16 - pair[0] as i16 == 1 {
            ascending + 1
        } else {
            1
        };

        if repeated >= MAX_PATTERN_RUN || ascending >= MAX_PATTERN_RUN {
            return true;
        }
    }

    false
}

/// Random secret for development setups, base64url encoded
pub fn generate_secure_secret(length: usize) -> Result<String> {
    if length < MIN_SECRET_LENGTH {
        return Err(AuthError::InvalidKey(format!(
            "secret length must be at least {} bytes",
            MIN_SECRET_LENGTH
        )));
    }

    let mut buffer = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut buffer);
    Ok(URL_SAFE_NO_PAD.encode(&buffer))
}
