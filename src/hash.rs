//! Hash based sharding of hosted zones.
//!
//! Hosted records and distributed email records are spread over a tree of
//! single character labels. The labels are taken from the SHA-1 digest of
//! the sharded string, read as an unsigned big-endian integer and written
//! in base 36 with lowercase digits.

use ring::digest;

/// The digits of base 36.
const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Returns the shard suffix of the given depth for a string.
///
/// The first `level` characters of the base-36 digest become one label
/// each, in reverse order and each preceded by a dot. For `"test"` this is
/// `".j"`, `".r.j"`, and `".w.r.j"` for levels one, two, and three.
///
/// # Panics
///
/// The function panics if `level` is not 1, 2, or 3.
pub fn hash(level: u8, value: &str) -> String {
    assert!(
        (1..=3).contains(&level),
        "shard level must be 1, 2, or 3, not {level}"
    );
    let digits = base36_digest(value);
    let shards = &digits.as_bytes()[..usize::from(level).min(digits.len())];
    let mut res = String::with_capacity(shards.len() * 2);
    for &ch in shards.iter().rev() {
        res.push('.');
        res.push(char::from(ch));
    }
    res
}

/// Returns a domain followed by its three level shard suffix.
pub fn domain_and_hash(domain: &str) -> String {
    format!("{domain}{}", hash(3, domain))
}

/// Returns the SHA-1 digest of a string in base 36.
fn base36_digest(value: &str) -> String {
    let digest = digest::digest(
        &digest::SHA1_FOR_LEGACY_USE_ONLY,
        value.as_bytes(),
    );
    to_base36(digest.as_ref())
}

/// Converts an unsigned big-endian integer into base 36.
///
/// There are no leading zeros. Zero itself is `"0"`.
fn to_base36(bytes: &[u8]) -> String {
    let mut number: Vec<u8> =
        bytes.iter().copied().skip_while(|&b| b == 0).collect();
    let mut digits = Vec::new();
    while !number.is_empty() {
        // One round of long division by 36.
        let mut rem = 0u32;
        for byte in number.iter_mut() {
            let acc = (rem << 8) | u32::from(*byte);
            *byte = (acc / 36) as u8;
            rem = acc % 36;
        }
        digits.push(DIGITS[rem as usize]);
        let zeros = number.iter().take_while(|&&b| b == 0).count();
        number.drain(..zeros);
    }
    if digits.is_empty() {
        digits.push(b'0');
    }
    digits.iter().rev().map(|&b| char::from(b)).collect()
}

//============ Tests =========================================================
