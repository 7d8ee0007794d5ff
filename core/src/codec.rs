//! Two-layer Base64 obfuscation for payload fields.
//!
//! # Design
//! Every obfuscated field is the standard (padded) Base64 encoding of the
//! standard Base64 encoding of the value's UTF-8 bytes. The transform is
//! deterministic and trivially reversible: it hides values from casual
//! inspection of traffic and offers no confidentiality or integrity.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Failure to reverse [`encode`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The input itself is not valid Base64.
    #[error("outer layer is not valid base64: {0}")]
    Outer(base64::DecodeError),

    /// The outer layer decoded, but its payload is not valid Base64.
    #[error("inner layer is not valid base64: {0}")]
    Inner(base64::DecodeError),

    /// Both layers decoded, but the recovered bytes are not UTF-8.
    #[error("decoded payload is not valid UTF-8")]
    Utf8,
}

/// Obfuscate `text` for transport.
pub fn encode(text: &str) -> String {
    let first = STANDARD.encode(text.as_bytes());
    STANDARD.encode(first.as_bytes())
}

/// Recover the text that [`encode`] produced `encoded` from.
pub fn decode(encoded: &str) -> Result<String, DecodeError> {
    let first = STANDARD.decode(encoded).map_err(DecodeError::Outer)?;
    let second = STANDARD.decode(&first).map_err(DecodeError::Inner)?;
    String::from_utf8(second).map_err(|_| DecodeError::Utf8)
}
