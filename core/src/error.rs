//! Error types for the tier admin API client.
//!
//! # Design
//! The dispatcher folds every transport failure and non-2xx status into a
//! single `Request` variant, carrying the server's `error` message when the
//! body has one. Domain functions add `Auth` for a login reply without the
//! success marker and `InvalidField` for decoded values that do not parse as
//! their semantic type. Nothing in this crate retries.

use thiserror::Error;

use crate::codec::DecodeError;
use crate::session::StorageError;

/// Message used when a failed response carries no `error` field.
pub const GENERIC_FAILURE: &str = "request failed";

/// Errors returned by the dispatcher and the domain API functions.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An obfuscated field could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The HTTP exchange failed: transport error (no status) or a non-2xx
    /// status, with the server's message when one was sent.
    #[error("{message}")]
    Request {
        status: Option<u16>,
        message: String,
    },

    /// The login reply did not carry the success marker and data.
    #[error("login failed")]
    Auth,

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response payload did not have the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A decoded field did not parse as its semantic type.
    #[error("field `{field}` has invalid value {value:?}")]
    InvalidField { field: &'static str, value: String },

    /// The session store could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// HTTP status of a `Request` error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => *status,
            _ => None,
        }
    }
}
