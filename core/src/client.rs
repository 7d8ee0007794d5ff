//! Typed API functions for auth, tiers and settings.
//!
//! # Design
//! Each operation is a pure codec step plus a dispatcher call. The pure
//! steps (`login_payload`, `parse_login`, `decode_tiers`, `decode_settings`,
//! `SettingsUpdate::encode`) are free functions so they can be checked
//! without a transport. `AdminClient` chains them with the dispatcher and
//! propagates every error unchanged.
//!
//! Tier reads are decoded field by field, but tier writes go out as plain
//! JSON. The server's expectations for encoded tier writes are unknown, so
//! this asymmetry is kept as is.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::form_urlencoded;

use crate::codec;
use crate::config::ClientConfig;
use crate::dispatcher::{ApiResponse, Dispatcher};
use crate::error::ApiError;
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{
    EncodedLogin, EncodedSettings, EncodedTier, LoginPayload, LoginResult, Settings, SettingsUpdate,
    Tier, TierInput, UserProfile,
};

/// Obfuscate admin credentials for the login request.
pub fn login_payload(username: &str, password: &str) -> LoginPayload {
    LoginPayload {
        username: codec::encode(username),
        password: codec::encode(password),
    }
}

/// Decode the token and the JSON user profile of a login reply.
pub fn parse_login(response: ApiResponse) -> Result<LoginResult, ApiError> {
    let data = response.into_data().ok_or(ApiError::Auth)?;
    let encoded: EncodedLogin = from_data(data)?;
    let token = codec::decode(&encoded.token)?;
    let user_json = codec::decode(&encoded.user)?;
    let user = serde_json::from_str(&user_json).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    Ok(LoginResult { token, user })
}

/// Decode every field of a wire tier and coerce it to its semantic type.
pub fn decode_tier(tier: &EncodedTier) -> Result<Tier, ApiError> {
    Ok(Tier {
        id: decode_int("id", &tier.id)?,
        name: codec::decode(&tier.name)?,
        quota: decode_int("quota", &tier.quota)?,
        required_level: decode_int("required_level", &tier.required_level)?,
        daily_limit: decode_int("daily_limit", &tier.daily_limit)?,
        stock: decode_int("stock", &tier.stock)?,
        is_active: decode_bool(&tier.is_active)?,
        sort_order: decode_int("sort_order", &tier.sort_order)?,
        created_at: codec::decode(&tier.created_at)?,
        updated_at: codec::decode(&tier.updated_at)?,
    })
}

/// Decode a tier list reply. A reply without success/data is an empty list.
pub fn decode_tiers(response: ApiResponse) -> Result<Vec<Tier>, ApiError> {
    let Some(data) = response.into_data() else {
        return Ok(Vec::new());
    };
    let encoded: Vec<EncodedTier> = from_data(data)?;
    encoded.iter().map(decode_tier).collect()
}

/// Decode a settings reply. A reply without success/data is `None`.
pub fn decode_settings(response: ApiResponse) -> Result<Option<Settings>, ApiError> {
    let Some(data) = response.into_data() else {
        return Ok(None);
    };
    let encoded: EncodedSettings = from_data(data)?;
    Ok(Some(Settings {
        global_enabled: decode_bool(&encoded.global_enabled)?,
        announcement: codec::decode(&encoded.announcement)?,
        order_expire_minutes: decode_int("order_expire_minutes", &encoded.order_expire_minutes)?,
    }))
}

fn decode_int(field: &'static str, encoded: &str) -> Result<i64, ApiError> {
    let value = codec::decode(encoded)?;
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidField { field, value })
}

fn decode_bool(encoded: &str) -> Result<bool, ApiError> {
    Ok(codec::decode(encoded)? == "true")
}

fn from_data<D: DeserializeOwned>(data: Value) -> Result<D, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Async client for the tier admin API.
pub struct AdminClient<T> {
    dispatcher: Dispatcher<T>,
}

impl<T: Transport> AdminClient<T> {
    pub fn new(config: &ClientConfig, session: Arc<Session>, transport: T) -> Self {
        Self {
            dispatcher: Dispatcher::new(&config.base_url, session, transport),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    pub fn session(&self) -> &Session {
        self.dispatcher.session()
    }

    /// Sign in with admin credentials. Does not touch the session; see
    /// [`Session::start`].
    pub async fn admin_login(&self, username: &str, password: &str) -> Result<LoginResult, ApiError> {
        let payload = login_payload(username, password);
        let response = self.dispatcher.post("/auth/admin/login", &payload).await?;
        parse_login(response)
    }

    /// External login URL, returned verbatim.
    pub async fn oauth_url(&self) -> Result<String, ApiError> {
        let data = self
            .dispatcher
            .get("/auth/login")
            .await?
            .into_data()
            .ok_or_else(|| ApiError::Deserialization("login URL reply has no data".to_string()))?;
        data.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Deserialization("login URL reply has no `url`".to_string()))
    }

    /// Complete the external login with the `code` and `state` the provider
    /// redirected back with.
    pub async fn oauth_callback(&self, code: &str, state: &str) -> Result<LoginResult, ApiError> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("code", code)
            .append_pair("state", state)
            .finish();
        let path = format!("/auth/callback?{query}");
        let response = self.dispatcher.get(&path).await?;
        parse_login(response)
    }

    /// Invalidate the session server-side. The local session is untouched.
    pub async fn logout(&self) -> Result<Value, ApiError> {
        Ok(self.dispatcher.post_empty("/auth/logout").await?.into_body())
    }

    /// Server logout followed by clearing the local session. The session is
    /// cleared even when the server call fails; that failure is still
    /// returned.
    pub async fn sign_out(&self) -> Result<Value, ApiError> {
        let result = self.logout().await;
        self.session().clear()?;
        result
    }

    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let data = self
            .dispatcher
            .get("/user/me")
            .await?
            .into_data()
            .ok_or_else(|| ApiError::Deserialization("user reply has no data".to_string()))?;
        from_data(data)
    }

    /// Active tiers, as shown to regular users.
    pub async fn user_tiers(&self) -> Result<Vec<Tier>, ApiError> {
        decode_tiers(self.dispatcher.get("/tiers").await?)
    }

    /// All tiers, admin view.
    pub async fn tiers(&self) -> Result<Vec<Tier>, ApiError> {
        decode_tiers(self.dispatcher.get("/admin/tiers").await?)
    }

    pub async fn create_tier(&self, input: &TierInput) -> Result<Value, ApiError> {
        Ok(self.dispatcher.post("/admin/tiers", input).await?.into_body())
    }

    pub async fn update_tier(&self, id: i64, input: &TierInput) -> Result<Value, ApiError> {
        let path = format!("/admin/tiers/{id}");
        Ok(self.dispatcher.put(&path, input).await?.into_body())
    }

    pub async fn delete_tier(&self, id: i64) -> Result<Value, ApiError> {
        let path = format!("/admin/tiers/{id}");
        Ok(self.dispatcher.delete(&path).await?.into_body())
    }

    pub async fn settings(&self) -> Result<Option<Settings>, ApiError> {
        decode_settings(self.dispatcher.get("/admin/settings").await?)
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<Value, ApiError> {
        let encoded = update.encode();
        Ok(self.dispatcher.put("/admin/settings", &encoded).await?.into_body())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn encoded_tier() -> EncodedTier {
        EncodedTier {
            id: codec::encode("1"),
            name: codec::encode("档位A"),
            quota: codec::encode("100"),
            required_level: codec::encode("2"),
            daily_limit: codec::encode("0"),
            stock: codec::encode("5"),
            is_active: codec::encode("true"),
            sort_order: codec::encode("10"),
            created_at: codec::encode("2025-01-01 10:00:00"),
            updated_at: codec::encode("2025-01-02 11:30:00"),
        }
    }

    #[test]
    fn login_payload_encodes_both_credentials() {
        let payload = login_payload("admin", "secret");
        assert_eq!(payload.username, "WVdSdGFXND0=");
        assert_eq!(payload.password, "YzJWamNtVjA=");
    }

    #[test]
    fn parse_login_decodes_token_and_user() {
        let response = ApiResponse::Success {
            data: Some(json!({
                "token": codec::encode("tok123"),
                "user": codec::encode(r#"{"id":1}"#),
            })),
        };
        let login = parse_login(response).unwrap();
        assert_eq!(login.token, "tok123");
        assert_eq!(login.user, UserProfile { id: 1, ..Default::default() });
    }

    #[test]
    fn parse_login_without_success_is_auth_error() {
        let err = parse_login(ApiResponse::Failure { error: None }).unwrap_err();
        assert!(matches!(err, ApiError::Auth));
        let err = parse_login(ApiResponse::Success { data: None }).unwrap_err();
        assert!(matches!(err, ApiError::Auth));
    }

    #[test]
    fn parse_login_rejects_plain_token() {
        let response = ApiResponse::Success {
            data: Some(json!({ "token": "not base64!", "user": codec::encode("{}") })),
        };
        assert!(matches!(parse_login(response).unwrap_err(), ApiError::Decode(_)));
    }

    #[test]
    fn decode_tier_coerces_every_field() {
        let tier = decode_tier(&encoded_tier()).unwrap();
        assert_eq!(
            tier,
            Tier {
                id: 1,
                name: "档位A".to_string(),
                quota: 100,
                required_level: 2,
                daily_limit: 0,
                stock: 5,
                is_active: true,
                sort_order: 10,
                created_at: "2025-01-01 10:00:00".to_string(),
                updated_at: "2025-01-02 11:30:00".to_string(),
            }
        );
    }

    #[test]
    fn decode_tier_treats_anything_but_true_as_false() {
        let mut wire = encoded_tier();
        wire.is_active = codec::encode("TRUE");
        assert!(!decode_tier(&wire).unwrap().is_active);
    }

    #[test]
    fn decode_tier_rejects_non_numeric_integer() {
        let mut wire = encoded_tier();
        wire.quota = codec::encode("lots");
        let err = decode_tier(&wire).unwrap_err();
        assert!(matches!(err, ApiError::InvalidField { field: "quota", value } if value == "lots"));
    }

    #[test]
    fn decode_tiers_empty_on_missing_markers() {
        assert!(decode_tiers(ApiResponse::Success { data: Some(json!([])) }).unwrap().is_empty());
        assert!(decode_tiers(ApiResponse::Failure { error: None }).unwrap().is_empty());
        assert!(decode_tiers(ApiResponse::Success { data: None }).unwrap().is_empty());
    }

    #[test]
    fn decode_tiers_rejects_non_list_data() {
        let err = decode_tiers(ApiResponse::Success { data: Some(json!({"id": "x"})) }).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn decode_settings_coerces_fields() {
        let response = ApiResponse::Success {
            data: Some(json!({
                "global_enabled": codec::encode("false"),
                "announcement": codec::encode("Welcome 公告"),
                "order_expire_minutes": codec::encode("15"),
            })),
        };
        let settings = decode_settings(response).unwrap().unwrap();
        assert_eq!(
            settings,
            Settings {
                global_enabled: false,
                announcement: "Welcome 公告".to_string(),
                order_expire_minutes: 15,
            }
        );
    }

    #[test]
    fn decode_settings_none_without_data() {
        assert!(decode_settings(ApiResponse::Failure { error: None }).unwrap().is_none());
    }
}
