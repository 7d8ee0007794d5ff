//! Client configuration.
//!
//! Values come from the environment (`TIER_ADMIN_API_URL`,
//! `TIER_ADMIN_SESSION_FILE`) or from any lookup function, with defaults
//! for local development against the mock server.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000/api";
pub const BASE_URL_VAR: &str = "TIER_ADMIN_API_URL";
pub const SESSION_FILE_VAR: &str = "TIER_ADMIN_SESSION_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, including the path prefix (e.g. `/api`). No trailing slash.
    pub base_url: String,
    /// Where to persist the session; `None` keeps it in memory.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_file: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_file: None,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        let base_url = get(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_file: get(SESSION_FILE_VAR).map(PathBuf::from),
        }
    }
}
