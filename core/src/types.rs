//! Domain and wire DTOs for the tier admin API.
//!
//! # Design
//! Read paths come in pairs: an `Encoded*` struct that mirrors the wire shape
//! (every field an obfuscated string) and a plain struct with semantic types.
//! Write paths for tiers are plain JSON; write paths for credentials and
//! settings carry obfuscated strings.

use serde::{Deserialize, Serialize};

use crate::codec;

/// The signed-in user's profile as returned by the server.
///
/// Every field defaults so that partial records still parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: i64,
    pub linux_do_id: i64,
    pub username: String,
    pub name: String,
    pub trust_level: i64,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Result of a successful admin or OAuth login, already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub token: String,
    pub user: UserProfile,
}

/// Admin login request body; both fields are obfuscated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

/// Login reply payload before decoding.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EncodedLogin {
    pub token: String,
    pub user: String,
}

/// A subscription-like plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: i64,
    pub name: String,
    pub quota: i64,
    pub required_level: i64,
    pub daily_limit: i64,
    pub stock: i64,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A tier as it travels on the wire: one obfuscated string per field.
/// Extra or missing fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodedTier {
    pub id: String,
    pub name: String,
    pub quota: String,
    pub required_level: String,
    pub daily_limit: String,
    pub stock: String,
    pub is_active: String,
    pub sort_order: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Create/update payload for a tier. Stock is derived server-side and is not
/// part of the payload. Sent as plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierInput {
    pub name: String,
    pub quota: i64,
    #[serde(default)]
    pub required_level: i64,
    #[serde(default)]
    pub daily_limit: i64,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_active: bool,
}

/// Global settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub global_enabled: bool,
    pub announcement: String,
    pub order_expire_minutes: i64,
}

/// Settings reply payload before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSettings {
    pub global_enabled: String,
    pub announcement: String,
    pub order_expire_minutes: String,
}

/// Partial settings update. Only the fields that are `Some` are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub global_enabled: Option<bool>,
    #[serde(default)]
    pub announcement: Option<String>,
    #[serde(default)]
    pub order_expire_minutes: Option<i64>,
}

/// Wire form of [`SettingsUpdate`]: present fields obfuscated, absent fields
/// omitted from the JSON entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_enabled: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub announcement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_expire_minutes: Option<String>,
}

impl SettingsUpdate {
    /// Stringify and obfuscate every present field.
    pub fn encode(&self) -> EncodedSettingsUpdate {
        EncodedSettingsUpdate {
            global_enabled: self.global_enabled.map(|v| codec::encode(&v.to_string())),
            announcement: self.announcement.as_deref().map(codec::encode),
            order_expire_minutes: self
                .order_expire_minutes
                .map(|v| codec::encode(&v.to_string())),
        }
    }
}
