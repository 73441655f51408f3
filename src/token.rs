//! Session token generation.
//!
//! Tokens are drawn from [`ALPHABET`] using the operating system's CSPRNG.
//! Each position consumes one random byte: the high bit is masked off and the
//! remaining 7-bit value is reduced modulo the alphabet size. Since 128 is not
//! a multiple of 73, the first 55 characters are picked with probability
//! 2/128 and the last 18 with 1/128. The bias costs well under one bit of
//! entropy per character and is kept so tokens stay compatible with the
//! issuing scheme used by earlier deployments.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::Error;

/// Characters a token may contain.
pub const ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_";

/// Length of the tokens issued by [`session::start`](crate::session::start).
pub const SESSION_TOKEN_LEN: usize = 32;

/// Generates a random token of exactly `length` characters from [`ALPHABET`].
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when `length` is zero.
pub fn generate_token(length: usize) -> Result<String, Error> {
    if length == 0 {
        return Err(Error::InvalidArgument("token length must be greater than zero"));
    }

    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);

    Ok(bytes
        .into_iter()
        .map(|b| ALPHABET[usize::from(b & 0x7F) % ALPHABET.len()] as char)
        .collect())
}
