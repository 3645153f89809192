// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reversible masking of integer ids.
//!
//! [`IntObfuscator`] XORs an id with a key and then moves every bit to a new
//! position taken from a fixed permutation table. It keeps sequential ids from
//! being enumerated by looking at consecutive values.
//!
//! # This is not encryption
//!
//! The permutation table is a public constant and XOR is linear, so a single
//! known `(plaintext, ciphertext)` pair reveals the key:
//!
//! ```
//! use idworker::IntObfuscator;
//!
//! let secret = IntObfuscator::new(0x1234_5678_1234_5678);
//! let code = secret.obfuscate(42);
//! let key = IntObfuscator::recover_key(42, code);
//! assert_eq!(key, secret.key());
//! ```
//!
//! Never use it to protect confidential values.

/// Key used when the caller passes `0`. It is documented and therefore not secret.
pub const DEFAULT_KEY: i64 = 0x5a5a_5a5a_5a5a_5a5a;

/// Bit `i` of the input moves to bit `PERMUTATION[i]` of the output.
pub const PERMUTATION: [u8; 64] = [
    7, 22, 13, 8, 30, 24, 17, 2, //
    28, 19, 11, 29, 5, 20, 15, 31, //
    0, 12, 25, 21, 4, 10, 16, 1, //
    27, 23, 6, 14, 9, 3, 26, 18, //
    45, 58, 41, 50, 62, 56, 49, 34, //
    60, 51, 43, 61, 37, 52, 47, 63, //
    32, 44, 57, 53, 36, 42, 48, 33, //
    59, 55, 38, 46, 40, 35, 54, 39, //
];

/// Inverse of [`PERMUTATION`]: `INVERSE_PERMUTATION[PERMUTATION[i]] == i`.
pub const INVERSE_PERMUTATION: [u8; 64] = invert(&PERMUTATION);

const fn invert(table: &[u8; 64]) -> [u8; 64] {
    let mut inverse = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        inverse[table[i] as usize] = i as u8;
        i += 1;
    }
    inverse
}

/// Move bit `i` of `value` to bit `table[i]`.
#[inline]
pub fn permute_bits(value: u64, table: &[u8; 64]) -> u64 {
    table
        .iter()
        .enumerate()
        .fold(0, |acc, (i, &to)| acc | (((value >> i) & 1) << to))
}

/// Masks and unmasks integer ids with a fixed key.
///
/// Both directions are total over `i64` and need no synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntObfuscator {
    key: i64,
}

impl IntObfuscator {
    /// Create an obfuscator. A `key` of `0` is replaced by [`DEFAULT_KEY`].
    pub fn new(key: i64) -> Self {
        let key = if key == 0 { DEFAULT_KEY } else { key };
        Self { key }
    }

    /// The key in use, after the zero substitution.
    pub fn key(&self) -> i64 {
        self.key
    }

    /// Mask `id`: XOR with the key, then permute the bits.
    pub fn obfuscate(&self, id: i64) -> i64 {
        permute_bits((id ^ self.key) as u64, &PERMUTATION) as i64
    }

    /// Undo [`obfuscate`](Self::obfuscate).
    pub fn deobfuscate(&self, code: i64) -> i64 {
        permute_bits(code as u64, &INVERSE_PERMUTATION) as i64 ^ self.key
    }

    /// Recover the key that maps `plaintext` to `ciphertext`.
    pub fn recover_key(plaintext: i64, ciphertext: i64) -> i64 {
        permute_bits(ciphertext as u64, &INVERSE_PERMUTATION) as i64 ^ plaintext
    }
}

impl Default for IntObfuscator {
    fn default() -> Self {
        Self::new(DEFAULT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const KEY: i64 = 0x1234_5678_1234_5678;
    const EDGES: [i64; 5] = [0, 1, -1, i64::MIN, i64::MAX];

    #[test]
    fn test_tables_are_inverse() {
        let mut seen = [false; 64];
        for (i, &to) in PERMUTATION.iter().enumerate() {
            assert!(!seen[to as usize], "position {} used twice", to);
            seen[to as usize] = true;
            assert_eq!(INVERSE_PERMUTATION[to as usize] as usize, i);
        }
    }

    #[test]
    fn test_permute_single_bits() {
        for (i, &to) in PERMUTATION.iter().enumerate() {
            assert_eq!(permute_bits(1 << i, &PERMUTATION), 1 << to);
        }
        assert_eq!(permute_bits(u64::MAX, &PERMUTATION), u64::MAX);
        assert_eq!(permute_bits(0, &INVERSE_PERMUTATION), 0);
    }

    #[test]
    fn test_round_trip_edges() {
        for key in [KEY, 0xABCD_EF01, 0xFFFF_FFFF, 0, -1] {
            let obfuscator = IntObfuscator::new(key);
            for value in EDGES.into_iter().chain([100, -100, 123_456_789, -123_456_789]) {
                let code = obfuscator.obfuscate(value);
                assert_eq!(obfuscator.deobfuscate(code), value, "key {:#x}", key);
            }
        }
    }

    #[test]
    fn test_round_trip_random() {
        let mut rng = rand::rng();
        let obfuscator = IntObfuscator::new(rng.random());
        for _ in 0..10_000 {
            let value: i64 = rng.random();
            assert_eq!(obfuscator.deobfuscate(obfuscator.obfuscate(value)), value);
        }
    }

    #[test]
    fn test_masks_value() {
        let obfuscator = IntObfuscator::new(KEY);
        for value in [1, 100, 1000, 10_000, 123_456_789, -1, -100] {
            assert_ne!(obfuscator.obfuscate(value), value);
        }
    }

    #[test]
    fn test_default_key() {
        assert_eq!(IntObfuscator::new(0).key(), DEFAULT_KEY);
        assert_eq!(IntObfuscator::default(), IntObfuscator::new(0));
        assert_eq!(IntObfuscator::new(KEY).key(), KEY);
    }

    #[test]
    fn test_different_keys_differ() {
        let a = IntObfuscator::new(0x1111_1111_1111_1111);
        let b = IntObfuscator::new(0x2222_2222_2222_2222);
        assert_ne!(a.obfuscate(123_456_789), b.obfuscate(123_456_789));
    }

    #[test]
    fn test_known_plaintext_recovers_key() {
        let target = IntObfuscator::new(KEY);
        let plaintext = 123_456_789;
        let ciphertext = target.obfuscate(plaintext);

        let guess = IntObfuscator::recover_key(plaintext, ciphertext);
        assert_eq!(guess, KEY);

        let cracked = IntObfuscator::new(guess);
        assert_eq!(cracked.obfuscate(999_999), target.obfuscate(999_999));
    }
}
