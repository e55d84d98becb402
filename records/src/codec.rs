//! Reversible line obfuscation.
//!
//! DESIGN
//! ======
//! A plaintext line is XORed byte-for-byte against a fixed keystream derived
//! from the installation secret, then base64-wrapped so the token is newline
//! free and safe to append to a text file. This deters casual reading of the
//! log; it is not encryption.
//!
//! EDGE CASES
//! ==========
//! Lines longer than [`KEYSTREAM_LEN`] bytes are truncated before XOR. The cut
//! backs off to a UTF-8 character boundary so the shortened line still decodes
//! as text. Decoding a token produced with another keystream yields garbage
//! rather than an error; callers validate the decoded fields.

use std::fmt;
use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

/// Length of the derived keystream, and the maximum plaintext line length.
pub const KEYSTREAM_LEN: usize = 192;

const FINGERPRINT_BYTES: usize = 16;

/// Error returned by [`Keystream::decode_line`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The token is not valid base64.
    #[error("invalid base64 token: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The de-obfuscated bytes are not UTF-8 (wrong key or damaged line).
    #[error("decoded line is not valid UTF-8")]
    InvalidUtf8,
}

/// Secret-derived keystream used to obfuscate log lines.
#[derive(Clone, PartialEq, Eq)]
pub struct Keystream {
    bytes: [u8; KEYSTREAM_LEN],
}

impl Keystream {
    /// Derive the keystream from an installation secret.
    ///
    /// The SHA-256 digest of the secret is repeated until [`KEYSTREAM_LEN`]
    /// bytes are filled, so the same secret always yields the same keystream.
    #[must_use]
    pub fn derive(secret: &[u8]) -> Self {
        let digest = Sha256::digest(secret);
        let mut bytes = [0u8; KEYSTREAM_LEN];
        for (slot, byte) in bytes.iter_mut().zip(digest.iter().cycle()) {
            *slot = *byte;
        }
        Self { bytes }
    }

    /// Maximum number of plaintext bytes one token can carry.
    #[must_use]
    pub fn max_line_len(&self) -> usize {
        self.bytes.len()
    }

    /// Short hex digest identifying this keystream without revealing it.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        let mut out = String::with_capacity(FINGERPRINT_BYTES * 2);
        for b in &digest[..FINGERPRINT_BYTES] {
            let _ = write!(out, "{b:02x}");
        }
        out
    }

    /// Obfuscate one plaintext line into a base64 token.
    #[must_use]
    pub fn encode_line(&self, plaintext: &str) -> String {
        let text = truncate_on_char_boundary(plaintext, self.max_line_len());
        let masked = self.apply(text.as_bytes());
        BASE64.encode(masked)
    }

    /// Reverse [`Keystream::encode_line`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Base64`] when the token is not base64 and
    /// [`CodecError::InvalidUtf8`] when the unmasked bytes are not text.
    pub fn decode_line(&self, token: &str) -> Result<String, CodecError> {
        let masked = BASE64.decode(token.trim())?;
        String::from_utf8(self.apply(&masked)).map_err(|_| CodecError::InvalidUtf8)
    }

    // XOR against the keystream prefix; input beyond the keystream is dropped.
    fn apply(&self, input: &[u8]) -> Vec<u8> {
        input
            .iter()
            .zip(self.bytes.iter())
            .map(|(byte, key)| byte ^ key)
            .collect()
    }
}

impl fmt::Debug for Keystream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keystream")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

fn truncate_on_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
