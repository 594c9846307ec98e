//! Run-length codec for label sequences.
//!
//! A run of length one is written as the value itself. A longer run is
//! written as the value followed by `-(length - 1)`. Values are never
//! negative, so the sign marks a run length.
//!
//! ```
//! # use label_fusion::rle;
//! let tokens = rle::encode(&[2u8, 2, 2, 2, 7]);
//! assert_eq!(tokens, vec![2, -3, 7]);
//! assert_eq!(rle::decode(&tokens).unwrap(), vec![2, 2, 2, 2, 7]);
//! ```

use crate::error::{Error, Result};

pub type Token = i32;

const TOKEN_BYTES: usize = std::mem::size_of::<Token>();

/// Longest run a single value/marker pair can describe.
const MAX_RUN_LENGTH: usize = Token::MAX as usize + 1;

pub fn encode<T>(data: &[T]) -> Vec<Token>
where
    T: Copy + PartialEq + Into<u16>,
{
    let mut tokens = Vec::new();
    let mut remaining = data;

    while let Some(&value) = remaining.first() {
        let run = remaining
            .iter()
            .take(MAX_RUN_LENGTH)
            .take_while(|&&v| v == value)
            .count();

        let literal: u16 = value.into();
        tokens.push(Token::from(literal));
        if run > 1 {
            tokens.push(-((run - 1) as Token));
        }
        remaining = &remaining[run..];
    }

    tokens
}

/// Exact inverse of [`encode`].
///
/// # Errors
///
/// Returns [`Error::MalformedRleStream`] when a run marker has no value in
/// front of it or a value does not fit the output type.
pub fn decode(tokens: &[Token]) -> Result<Vec<u16>> {
    decode_as(tokens)
}

/// [`decode`] into any type the values convert to, such as label codes.
pub fn decode_as<T>(tokens: &[Token]) -> Result<Vec<T>>
where
    T: Copy + TryFrom<Token>,
{
    let mut decoded = Vec::new();
    let mut position = 0;

    while position < tokens.len() {
        let token = tokens[position];
        if token < 0 {
            return Err(Error::MalformedRleStream {
                position,
                reason: format!("run marker {token} without a value"),
            });
        }
        let value = T::try_from(token).map_err(|_| Error::MalformedRleStream {
            position,
            reason: format!("value {token} is out of range"),
        })?;

        let repeat = match tokens.get(position + 1) {
            Some(&marker) if marker < 0 => {
                position += 1;
                1 + marker.unsigned_abs() as usize
            }
            _ => 1,
        };
        decoded.extend(std::iter::repeat_n(value, repeat));
        position += 1;
    }

    Ok(decoded)
}

/// Serialize tokens as little-endian 32-bit integers.
pub fn to_bytes(tokens: &[Token]) -> Vec<u8> {
    tokens.iter().flat_map(|token| token.to_le_bytes()).collect()
}

/// Parse the output of [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Token>> {
    if bytes.len() % TOKEN_BYTES != 0 {
        return Err(Error::MalformedRleStream {
            position: bytes.len() / TOKEN_BYTES,
            reason: format!(
                "{} bytes is not a whole number of {TOKEN_BYTES}-byte tokens",
                bytes.len()
            ),
        });
    }

    Ok(bytes
        .chunks_exact(TOKEN_BYTES)
        .map(|chunk| Token::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
