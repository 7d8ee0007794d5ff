use std::{
    collections::{BTreeMap, HashMap, HashSet},
    env,
    sync::Arc,
};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Double Base64, as the backend applies it to response fields.
pub fn double_encode(text: &str) -> String {
    STANDARD.encode(STANDARD.encode(text.as_bytes()).as_bytes())
}

/// Reverse of [`double_encode`]; `None` on malformed input.
pub fn double_decode(encoded: &str) -> Option<String> {
    let first = STANDARD.decode(encoded).ok()?;
    let second = STANDARD.decode(first).ok()?;
    String::from_utf8(second).ok()
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub admin_username: String,
    pub admin_password: String,
    pub oauth_client_id: String,
    pub oauth_redirect_uri: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            oauth_client_id: "mock-client".to_string(),
            oauth_redirect_uri: "http://127.0.0.1:5173/callback".to_string(),
        }
    }
}

impl MockConfig {
    /// Defaults overridden by `ADMIN_USERNAME` / `ADMIN_PASSWORD`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            admin_username: env::var("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
            ..defaults
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
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

impl Tier {
    fn encoded(&self) -> Value {
        json!({
            "id": double_encode(&self.id.to_string()),
            "name": double_encode(&self.name),
            "quota": double_encode(&self.quota.to_string()),
            "required_level": double_encode(&self.required_level.to_string()),
            "daily_limit": double_encode(&self.daily_limit.to_string()),
            "stock": double_encode(&self.stock.to_string()),
            "is_active": double_encode(&self.is_active.to_string()),
            "sort_order": double_encode(&self.sort_order.to_string()),
            "created_at": double_encode(&self.created_at),
            "updated_at": double_encode(&self.updated_at),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub linux_do_id: i64,
    pub username: String,
    pub name: String,
    pub trust_level: i64,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct TierRequest {
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

impl TierRequest {
    fn validate(&self) -> Result<(), ApiFailure> {
        if self.name.trim().is_empty() {
            return Err(ApiFailure::bad_request("name is required"));
        }
        if self.quota < 1 {
            return Err(ApiFailure::bad_request("quota must be at least 1"));
        }
        if !(0..=4).contains(&self.required_level) {
            return Err(ApiFailure::bad_request("required_level must be between 0 and 4"));
        }
        if self.daily_limit < 0 {
            return Err(ApiFailure::bad_request("daily_limit must not be negative"));
        }
        Ok(())
    }
}

/// Settings update with every present field double-encoded. Empty strings
/// count as absent.
#[derive(Deserialize, Default)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub global_enabled: String,
    #[serde(default)]
    pub announcement: String,
    #[serde(default)]
    pub order_expire_minutes: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub global_enabled: bool,
    pub announcement: String,
    pub order_expire_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_enabled: true,
            announcement: String::new(),
            order_expire_minutes: 15,
        }
    }
}

#[derive(Default)]
struct Store {
    tiers: BTreeMap<i64, Tier>,
    next_tier_id: i64,
    users: HashMap<String, User>,
    next_user_id: i64,
    sessions: HashMap<String, String>,
    oauth_states: HashSet<String>,
    settings: Settings,
}

impl Store {
    /// Create or refresh the user keyed by `username`.
    fn upsert_user(&mut self, linux_do_id: i64, username: &str, name: &str, trust_level: i64, is_admin: bool) -> User {
        let now = timestamp();
        if let Some(user) = self.users.get_mut(username) {
            user.name = name.to_string();
            user.trust_level = trust_level;
            user.updated_at = now;
            return user.clone();
        }
        self.next_user_id += 1;
        let user = User {
            id: self.next_user_id,
            linux_do_id,
            username: username.to_string(),
            name: name.to_string(),
            trust_level,
            is_admin,
            created_at: now.clone(),
            updated_at: now,
        };
        self.users.insert(username.to_string(), user.clone());
        user
    }

    fn issue_token(&mut self, user: &User) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), user.username.clone());
        token
    }
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    config: Arc<MockConfig>,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            config: Arc::new(config),
        }
    }
}

/// Failure envelope: `{ "success": false, "error": message }`.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "success": false, "error": self.message }))).into_response()
    }
}

impl From<JsonRejection> for ApiFailure {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("invalid parameters: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiFailure {
    fn from(_: PathRejection) -> Self {
        Self::bad_request("invalid tier id")
    }
}

fn success(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
}

/// The user behind a valid bearer token.
pub struct Caller(pub User);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(&parts.headers).ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "not signed in"))?;
        let store = state.store.read().await;
        store
            .sessions
            .get(token)
            .and_then(|username| store.users.get(username))
            .cloned()
            .map(Caller)
            .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "invalid token"))
    }
}

/// A [`Caller`] with admin rights.
pub struct Admin(pub User);

impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Caller(user) = Caller::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiFailure::new(StatusCode::FORBIDDEN, "admin privileges required"));
        }
        Ok(Admin(user))
    }
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let api = Router::new()
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/login", get(oauth_login))
        .route("/auth/callback", get(oauth_callback))
        .route("/auth/logout", post(logout))
        .route("/user/me", get(me))
        .route("/tiers", get(user_tiers))
        .route("/admin/tiers", get(admin_tiers).post(create_tier))
        .route("/admin/tiers/{id}", put(update_tier).delete(delete_tier))
        .route("/admin/settings", get(get_settings).put(update_settings));
    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .with_state(AppState::new(config))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, MockConfig::from_env()).await
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

async fn not_found() -> ApiFailure {
    ApiFailure::new(StatusCode::NOT_FOUND, "not found")
}

fn login_reply(user: &User, token: &str) -> Json<Value> {
    let user_json = serde_json::to_string(user).unwrap_or_default();
    success(json!({
        "message": "signed in",
        "token": double_encode(token),
        "user": double_encode(&user_json),
    }))
}

async fn admin_login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiFailure> {
    let Json(req) = payload.map_err(|_| ApiFailure::bad_request("invalid request parameters"))?;
    let username =
        double_decode(&req.username).ok_or_else(|| ApiFailure::bad_request("username could not be decoded"))?;
    let password =
        double_decode(&req.password).ok_or_else(|| ApiFailure::bad_request("password could not be decoded"))?;

    if username != state.config.admin_username || password != state.config.admin_password {
        tracing::warn!(%username, "rejected admin login");
        return Err(ApiFailure::new(StatusCode::UNAUTHORIZED, "invalid username or password"));
    }

    let mut store = state.store.write().await;
    let user = store.upsert_user(0, &username, "Administrator", 4, true);
    let token = store.issue_token(&user);
    tracing::info!(user_id = user.id, "admin signed in");
    Ok(login_reply(&user, &token))
}

async fn oauth_login(State(state): State<AppState>) -> Json<Value> {
    let oauth_state = Uuid::new_v4().simple().to_string();
    state.store.write().await.oauth_states.insert(oauth_state.clone());
    let url = format!(
        "https://connect.linux.do/oauth2/authorize?client_id={}&response_type=code&redirect_uri={}&state={}",
        state.config.oauth_client_id, state.config.oauth_redirect_uri, oauth_state
    );
    success(json!({ "url": url }))
}

/// Any non-empty `code` is accepted and maps to a regular user named after it.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<Value>, ApiFailure> {
    let mut store = state.store.write().await;
    if !store.oauth_states.remove(&query.state) {
        return Err(ApiFailure::bad_request("invalid state parameter"));
    }
    if query.code.is_empty() {
        return Err(ApiFailure::bad_request("missing authorization code"));
    }
    let username = format!("linuxdo_{}", query.code);
    let user = store.upsert_user(10_000, &username, &query.code, 1, false);
    let token = store.issue_token(&user);
    tracing::info!(user_id = user.id, "oauth user signed in");
    Ok(login_reply(&user, &token))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    if let Some(token) = bearer(&headers) {
        state.store.write().await.sessions.remove(token);
    }
    success(json!({ "message": "signed out" }))
}

async fn me(Caller(user): Caller) -> Json<Value> {
    success(serde_json::to_value(user).unwrap_or_default())
}

async fn user_tiers(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    let mut tiers: Vec<&Tier> = store.tiers.values().filter(|t| t.is_active).collect();
    tiers.sort_by_key(|t| (t.sort_order, t.id));
    success(tiers.into_iter().map(Tier::encoded).collect())
}

async fn admin_tiers(_: Admin, State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    let mut tiers: Vec<&Tier> = store.tiers.values().collect();
    tiers.sort_by_key(|t| (t.sort_order, t.id));
    success(tiers.into_iter().map(Tier::encoded).collect())
}

async fn create_tier(
    _: Admin,
    State(state): State<AppState>,
    payload: Result<Json<TierRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiFailure> {
    let Json(req) = payload?;
    req.validate()?;

    let mut store = state.store.write().await;
    store.next_tier_id += 1;
    let now = timestamp();
    let tier = Tier {
        id: store.next_tier_id,
        name: req.name,
        quota: req.quota,
        required_level: req.required_level,
        daily_limit: req.daily_limit,
        stock: 0,
        is_active: req.is_active,
        sort_order: req.sort_order,
        created_at: now.clone(),
        updated_at: now,
    };
    tracing::info!(tier_id = tier.id, "tier created");
    let id = double_encode(&tier.id.to_string());
    store.tiers.insert(tier.id, tier);
    Ok(success(json!({ "message": "tier created", "id": id })))
}

async fn update_tier(
    _: Admin,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<TierRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiFailure> {
    let Path(id) = path?;
    let Json(req) = payload?;
    req.validate()?;

    let mut store = state.store.write().await;
    let tier = store
        .tiers
        .get_mut(&id)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "tier not found"))?;
    tier.name = req.name;
    tier.quota = req.quota;
    tier.required_level = req.required_level;
    tier.daily_limit = req.daily_limit;
    tier.sort_order = req.sort_order;
    tier.is_active = req.is_active;
    tier.updated_at = timestamp();
    tracing::info!(tier_id = id, "tier updated");
    Ok(success(json!({ "message": "tier updated", "id": double_encode(&id.to_string()) })))
}

async fn delete_tier(
    _: Admin,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiFailure> {
    let Path(id) = path?;
    let mut store = state.store.write().await;
    store
        .tiers
        .remove(&id)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, "tier not found"))?;
    tracing::info!(tier_id = id, "tier deleted");
    Ok(success(json!({ "message": "tier deleted", "id": double_encode(&id.to_string()) })))
}

async fn get_settings(_: Admin, State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    let settings = &store.settings;
    success(json!({
        "global_enabled": double_encode(&settings.global_enabled.to_string()),
        "announcement": double_encode(&settings.announcement),
        "order_expire_minutes": double_encode(&settings.order_expire_minutes.to_string()),
    }))
}

async fn update_settings(
    _: Admin,
    State(state): State<AppState>,
    payload: Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiFailure> {
    let Json(req) = payload?;
    let decode = |field: &str, value: &str| {
        double_decode(value).ok_or_else(|| ApiFailure::bad_request(format!("{field} could not be decoded")))
    };

    let global_enabled = match req.global_enabled.as_str() {
        "" => None,
        v => Some(decode("global_enabled", v)? == "true"),
    };
    let announcement = match req.announcement.as_str() {
        "" => None,
        v => Some(decode("announcement", v)?),
    };
    let order_expire_minutes = match req.order_expire_minutes.as_str() {
        "" => None,
        v => {
            let minutes: i64 = decode("order_expire_minutes", v)?
                .parse()
                .map_err(|_| ApiFailure::bad_request("order_expire_minutes is not a number"))?;
            if minutes < 1 {
                return Err(ApiFailure::bad_request("order expiry must be at least one minute"));
            }
            Some(minutes)
        }
    };

    let mut store = state.store.write().await;
    if let Some(v) = global_enabled {
        store.settings.global_enabled = v;
    }
    if let Some(v) = announcement {
        store.settings.announcement = v;
    }
    if let Some(v) = order_expire_minutes {
        store.settings.order_expire_minutes = v;
    }
    tracing::info!("settings updated");
    Ok(success(json!({ "message": "settings updated" })))
}
