// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Base62 short ids.

use crate::error::Error;

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const BASE: u64 = ALPHABET.len() as u64;

/// Encode `id` in base62, most significant digit first.
pub fn encode_base62(mut id: u64) -> String {
    if id == 0 {
        return "0".to_owned();
    }
    // u64::MAX needs 11 digits
    let mut digits = Vec::with_capacity(11);
    while id > 0 {
        digits.push(ALPHABET[(id % BASE) as usize]);
        id /= BASE;
    }
    digits.iter().rev().map(|&b| b as char).collect()
}

/// Decode a string produced by [`encode_base62`].
pub fn decode_base62(short_id: &str) -> Result<u64, Error> {
    if short_id.is_empty() {
        return Err(Error::InvalidShortId(short_id.to_owned()));
    }
    short_id.bytes().try_fold(0u64, |acc, b| {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'z' => b - b'a' + 10,
            b'A'..=b'Z' => b - b'A' + 36,
            _ => return Err(Error::InvalidShortId(short_id.to_owned())),
        };
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(|| Error::InvalidShortId(short_id.to_owned()))
    })
}
