//! Client core for the tier administration API.
//!
//! # Overview
//! Talks to the tier/settings backend on behalf of the admin front end:
//! obfuscates and de-obfuscates payload fields, attaches the session's
//! bearer token, and validates the response envelope before handing typed
//! values back to callers. Also carries the front end's static route table.
//!
//! # Design
//! - `codec` is the double-Base64 field transform; it is obfuscation only.
//! - `Session` owns the persisted token and profile and is shared with the
//!   dispatcher via `Arc`.
//! - `Dispatcher` builds `HttpRequest` values and parses `HttpResponse`
//!   values; a `Transport` performs the round-trip in between.
//! - `AdminClient` pairs dispatcher calls with the codec on a fixed field
//!   list per resource.

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod routes;
pub mod session;
pub mod transport;
pub mod types;

pub use client::AdminClient;
pub use codec::DecodeError;
pub use config::ClientConfig;
pub use dispatcher::{ApiResponse, Dispatcher};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestOptions};
pub use session::{FileStorage, MemoryStorage, Session, Storage, StorageError};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{
    EncodedSettings, EncodedSettingsUpdate, EncodedTier, LoginPayload, LoginResult, Settings,
    SettingsUpdate, Tier, TierInput, UserProfile,
};
