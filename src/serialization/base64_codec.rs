//! Block-oriented Base64 with the standard alphabet and `=` padding.
//!
//! Decoding is lenient about padding: `=` decodes as zero wherever it appears, and
//! decoded output is always `(len / 4) * 3` bytes, padding included. Callers that know the real
//! payload length (as the compressed envelope does) simply ignore the trailing bytes.

use std::{error, fmt};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const PAD: u8 = b'=';

/// Errors that can happen while decoding Base64 text.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Base64Error {
    /// The input length is not a non-zero multiple of 4.
    InvalidLength(usize),
    /// A byte outside the Base64 alphabet was found.
    InvalidSymbol {
        /// Offset of the byte in the input.
        offset: usize,
        /// The offending byte.
        symbol: u8,
    },
}

impl Base64Error {
    /// The failure kind. Always `InvalidArgument`.
    pub fn kind(&self) -> crate::ErrorKind {
        crate::ErrorKind::InvalidArgument
    }
}

impl fmt::Display for Base64Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Base64Error::InvalidLength(len) => write!(
                f,
                "Base64 input length {} is not a non-zero multiple of 4",
                len
            ),
            Base64Error::InvalidSymbol { offset, symbol } => write!(
                f,
                "Invalid Base64 symbol 0x{:02x} at offset {}",
                symbol, offset
            ),
        }
    }
}

impl error::Error for Base64Error {}

/// Length of the Base64 text for `decoded_len` bytes of input.
pub fn encoded_len(decoded_len: usize) -> usize {
    (decoded_len + 2) / 3 * 4
}

/// Length of the bytes decoded from `encoded_len` bytes of Base64 text.
pub fn decoded_len(encoded_len: usize) -> usize {
    (encoded_len / 4) * 3
}

/// Encode `input` as Base64.
pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(input.len()));
    encode_into(input, &mut out);
    out
}

/// Encode `input` as Base64, appending to `out`.
pub fn encode_into(input: &[u8], out: &mut String) {
    out.reserve(encoded_len(input.len()));

    let mut blocks = input.chunks_exact(3);
    for block in &mut blocks {
        let value = (u32::from(block[0]) << 16) | (u32::from(block[1]) << 8) | u32::from(block[2]);
        push_symbols(out, value, 4);
    }

    match blocks.remainder() {
        [a, b] => {
            let value = (u32::from(*a) << 16) | (u32::from(*b) << 8);
            push_symbols(out, value, 3);
            out.push(PAD as char);
        }
        [a] => {
            push_symbols(out, u32::from(*a) << 16, 2);
            out.push(PAD as char);
            out.push(PAD as char);
        }
        _ => {}
    }
}

/// Push the top `count` 6-bit symbols of a 24-bit value.
#[inline]
fn push_symbols(out: &mut String, value: u32, count: usize) {
    for i in 0..count {
        let shift = 18 - 6 * i;
        let index = ((value >> shift) & 0x3F) as usize;
        out.push(ALPHABET[index] as char);
    }
}

/// Decode Base64 text into a new vector.
pub fn decode<T: AsRef<[u8]> + ?Sized>(input: &T) -> Result<Vec<u8>, Base64Error> {
    let mut out = Vec::new();
    decode_into(input.as_ref(), &mut out)?;
    Ok(out)
}

/// Decode Base64 text into `out`, replacing its contents.
///
/// `out` is resized to exactly `decoded_len(input.len())`, reusing its allocation. On error,
/// `out` is left empty.
pub fn decode_into(input: &[u8], out: &mut Vec<u8>) -> Result<(), Base64Error> {
    out.clear();
    if input.len() < 4 || input.len() % 4 != 0 {
        return Err(Base64Error::InvalidLength(input.len()));
    }

    out.resize(decoded_len(input.len()), 0);

    for (block_index, block) in input.chunks_exact(4).enumerate() {
        let mut value: u32 = 0;
        for (i, &symbol) in block.iter().enumerate() {
            let sextet = match symbol_value(symbol) {
                Some(v) => v,
                None => {
                    out.clear();
                    let offset = block_index * 4 + i;
                    return Err(Base64Error::InvalidSymbol { offset, symbol });
                }
            };
            value |= u32::from(sextet) << (18 - 6 * i);
        }

        let j = block_index * 3;
        out[j] = (value >> 16) as u8;
        out[j + 1] = (value >> 8) as u8;
        out[j + 2] = value as u8;
    }

    Ok(())
}

#[inline]
fn symbol_value(symbol: u8) -> Option<u8> {
    match symbol {
        b'A'..=b'Z' => Some(symbol - b'A'),
        b'a'..=b'z' => Some(symbol - b'a' + 26),
        b'0'..=b'9' => Some(symbol - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        PAD => Some(0),
        _ => None,
    }
}
