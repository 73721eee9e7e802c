//! Legacy XOR stream cipher
//!
//! Envelope format: `base64({checksum}|{payload})`
//! - checksum: first 8 characters of `hash_string(plaintext)`
//! - payload: each UTF-16 code unit of the plaintext XOR-ed with the
//!   cycled characters of `hash_string(key)`, one byte per unit
//!
//! Plaintext units whose XOR result does not fit in one byte cannot be
//! carried by the envelope; such plaintexts are returned unencrypted.

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, warn};

/// Length of the checksum prefix
const CHECKSUM_LEN: usize = 8;

/// Separator between checksum and payload
const SEPARATOR: u8 = b'|';

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 32-bit rolling string hash rendered in base 36.
///
/// For every UTF-16 code unit: `hash = (hash << 5) - hash + unit`, wrapped
/// to a signed 32-bit value. The result is the absolute value of the final
/// hash in lowercase base 36 (`"0"` for the empty string).
pub fn hash_string(input: &str) -> String {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    to_base36(i64::from(hash).unsigned_abs())
}

/// Integrity checksum stored in front of the payload
pub fn checksum(plaintext: &str) -> String {
    hash_string(plaintext).chars().take(CHECKSUM_LEN).collect()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    // Only ASCII digits were pushed.
    String::from_utf8_lossy(&digits).into_owned()
}

/// Encrypt `plaintext` under `key`.
///
/// Empty plaintext or key, and plaintexts the envelope cannot carry, come
/// back unchanged. Callers must rely on a record's `encrypted` flag rather
/// than assume the result is ciphertext.
pub fn encrypt(plaintext: &str, key: &str) -> String {
    if plaintext.is_empty() || key.is_empty() {
        return plaintext.to_string();
    }

    match seal(plaintext, key) {
        Some(envelope) => envelope,
        None => {
            warn!("Plaintext contains characters outside the cipher range, leaving it unencrypted");
            plaintext.to_string()
        }
    }
}

fn seal(plaintext: &str, key: &str) -> Option<String> {
    let keystream = hash_string(key).into_bytes();
    let checksum = checksum(plaintext);

    let mut envelope = Vec::with_capacity(checksum.len() + 1 + plaintext.len());
    envelope.extend_from_slice(checksum.as_bytes());
    envelope.push(SEPARATOR);

    for (i, unit) in plaintext.encode_utf16().enumerate() {
        let mixed = unit ^ u16::from(keystream[i % keystream.len()]);
        envelope.push(u8::try_from(mixed).ok()?);
    }

    Some(STANDARD.encode(envelope))
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// Returns an empty string when the input is empty, is not an envelope
/// (legacy plaintext, bad base64, missing separator), or when the checksum
/// does not match, which is what a wrong key produces.
pub fn decrypt(ciphertext: &str, key: &str) -> String {
    if ciphertext.is_empty() || key.is_empty() {
        return String::new();
    }

    open(ciphertext, key).unwrap_or_default()
}

fn open(ciphertext: &str, key: &str) -> Option<String> {
    let envelope = match STANDARD.decode(ciphertext) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Ciphertext is not a valid envelope: {}", e);
            return None;
        }
    };

    let split = envelope.iter().position(|&b| b == SEPARATOR)?;
    let (expected, payload) = (&envelope[..split], &envelope[split + 1..]);

    let keystream = hash_string(key).into_bytes();
    let plaintext: String = payload
        .iter()
        .enumerate()
        .map(|(i, &b)| char::from(b ^ keystream[i % keystream.len()]))
        .collect();

    if checksum(&plaintext).as_bytes() != expected {
        debug!("Checksum mismatch, wrong key or corrupt data");
        return None;
    }

    Some(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_string_known_values() {
        assert_eq!(hash_string(""), "0");
        assert_eq!(hash_string("a"), "2p");
        assert_eq!(hash_string("hello"), "1n1e4y");
        assert_eq!(hash_string("correct-key"), "o7rngc");
        assert_eq!(hash_string("Hello, World!"), "osc9p1");
    }

    #[test]
    fn test_encrypt_matches_existing_ciphertext() {
        assert_eq!(encrypt("hello", "key"), "MW4xZTR5fFpcGQJd");
        assert_eq!(encrypt("alice", "correct-key"), "MWpiOGcwfA5bGw0C");
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let samples = [
            "alice",
            "p@ss",
            "Hello, World!",
            "x",
            "a much longer passphrase than the keystream",
        ];
        for plaintext in samples {
            let encrypted = encrypt(plaintext, "master-passphrase");
            assert_ne!(encrypted, plaintext);
            assert_eq!(decrypt(&encrypted, "master-passphrase"), plaintext);
        }
    }

    #[test]
    fn test_payload_byte_equal_to_separator() {
        // 'M' ^ '1' == '|', so the payload starts with the separator byte.
        let encrypted = encrypt("M", "hello");
        assert_eq!(encrypted, "MjV8fA==");
        assert_eq!(STANDARD.decode(&encrypted).unwrap(), b"25||");
        assert_eq!(decrypt(&encrypted, "hello"), "M");

        let encrypted = encrypt("Mail", "hello");
        assert_eq!(encrypted, "MWY4aWZ8fA9YCQ==");
        assert_eq!(STANDARD.decode(&encrypted).unwrap(), b"1f8if||\x0fX\t");
        assert_eq!(decrypt(&encrypted, "hello"), "Mail");
    }

    #[test]
    fn test_latin1_roundtrip() {
        let encrypted = encrypt("café", "key");
        assert_eq!(decrypt(&encrypted, "key"), "café");
    }

    #[test]
    fn test_wrong_key_returns_empty() {
        let encrypted = encrypt("p@ss", "correct-key");
        assert_eq!(decrypt(&encrypted, "wrong-key"), "");

        let encrypted = encrypt("alice", "correct-key");
        assert_eq!(decrypt(&encrypted, "wrong-key"), "");
    }

    #[test]
    fn test_empty_inputs_pass_through() {
        assert_eq!(encrypt("", "key"), "");
        assert_eq!(encrypt("secret", ""), "secret");
        assert_eq!(decrypt("", "key"), "");
        assert_eq!(decrypt("MW4xZTR5fFpcGQJd", ""), "");
    }

    #[test]
    fn test_unrepresentable_plaintext_is_returned_unchanged() {
        let plaintext = "密碼";
        assert_eq!(encrypt(plaintext, "key"), plaintext);
    }

    #[test]
    fn test_non_envelope_input_is_undecryptable() {
        // legacy plaintext, not base64
        assert_eq!(decrypt("plain password!", "key"), "");
        // valid base64 without a separator
        assert_eq!(decrypt(&STANDARD.encode("no separator"), "key"), "");
    }

    #[test]
    fn test_flipped_payload_fails_checksum() {
        let encrypted = encrypt("secret-password", "master");
        let envelope = STANDARD.decode(&encrypted).unwrap();
        let start = envelope.iter().position(|&b| b == SEPARATOR).unwrap() + 1;

        for pos in start..envelope.len() {
            for bit in 0..8 {
                let mut tampered = envelope.clone();
                tampered[pos] ^= 1 << bit;
                assert_eq!(decrypt(&STANDARD.encode(&tampered), "master"), "");
            }
        }
    }

    #[test]
    fn test_checksum_is_hash_prefix() {
        assert_eq!(checksum("hello"), "1n1e4y");
        assert!(checksum("anything at all").len() <= CHECKSUM_LEN);
    }
}
