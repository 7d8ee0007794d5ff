//! Domain API functions driven through a recording transport.
//!
//! Each test queues the server's reply, calls one `AdminClient` method and
//! then checks both the decoded result and the request that went out.

mod common;

use serde_json::json;
use tier_admin_core::codec::encode;
use tier_admin_core::{ApiError, HttpMethod, SettingsUpdate, TierInput, UserProfile};

use common::{body_json, client, BASE_URL};

#[tokio::test]
async fn admin_login_encodes_credentials_and_decodes_reply() {
    let (client, transport) = client(Some("stale"));
    transport.reply(
        200,
        json!({
            "success": true,
            "data": {
                "message": "ok",
                "token": encode("tok123"),
                "user": encode(r#"{"id":1}"#),
            }
        }),
    );

    let login = client.admin_login("admin", "secret").await.unwrap();
    assert_eq!(login.token, "tok123");
    assert_eq!(login.user, UserProfile { id: 1, ..Default::default() });

    let req = transport.last_request();
    assert_eq!(req.method, HttpMethod::Post);
    assert_eq!(req.url, format!("{BASE_URL}/auth/admin/login"));
    assert!(req.header("authorization").is_none());
    assert_eq!(
        body_json(&req),
        json!({ "username": encode("admin"), "password": encode("secret") })
    );
}

#[tokio::test]
async fn admin_login_without_success_marker_is_auth_error() {
    let (client, transport) = client(None);
    transport.reply(200, json!({ "success": false }));
    let err = client.admin_login("admin", "wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::Auth));
}

#[tokio::test]
async fn admin_login_rejected_status_is_request_error() {
    let (client, transport) = client(None);
    transport.reply(401, json!({ "success": false, "error": "invalid username or password" }));
    let err = client.admin_login("admin", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Request { status: Some(401), ref message } if message == "invalid username or password"
    ));
}

#[tokio::test]
async fn login_result_can_start_the_session() {
    let (client, transport) = client(None);
    transport.reply(
        200,
        json!({ "success": true, "data": { "token": encode("t"), "user": encode(r#"{"id":3,"is_admin":true}"#) } }),
    );
    let login = client.admin_login("a", "b").await.unwrap();
    client.session().start(&login).unwrap();

    transport.reply(200, json!({ "success": true, "data": { "id": 3 } }));
    client.current_user().await.unwrap();
    assert_eq!(transport.last_request().header("authorization"), Some("Bearer t"));
}

#[tokio::test]
async fn current_user_sends_token() {
    let (client, transport) = client(Some("abc"));
    transport.reply(
        200,
        json!({ "success": true, "data": { "id": 9, "username": "test_user", "trust_level": 2, "is_admin": false } }),
    );
    let user = client.current_user().await.unwrap();
    assert_eq!(user.username, "test_user");
    assert_eq!(user.trust_level, 2);

    let req = transport.last_request();
    assert_eq!(req.url, format!("{BASE_URL}/user/me"));
    assert_eq!(req.header("authorization"), Some("Bearer abc"));
}

#[tokio::test]
async fn oauth_url_is_returned_verbatim() {
    let (client, transport) = client(None);
    let url = "https://connect.example/oauth2/authorize?client_id=x&state=y";
    transport.reply(200, json!({ "success": true, "data": { "url": url } }));
    assert_eq!(client.oauth_url().await.unwrap(), url);
    assert_eq!(transport.last_request().url, format!("{BASE_URL}/auth/login"));
}

#[tokio::test]
async fn oauth_callback_skips_token_and_decodes_login() {
    let (client, transport) = client(Some("old"));
    transport.reply(
        200,
        json!({ "success": true, "data": { "token": encode("fresh"), "user": encode(r#"{"id":5,"username":"linux"}"#) } }),
    );
    let login = client.oauth_callback("c0de", "st/ate &x=1").await.unwrap();
    assert_eq!(login.token, "fresh");
    assert_eq!(login.user.username, "linux");

    let req = transport.last_request();
    assert_eq!(req.url, format!("{BASE_URL}/auth/callback?code=c0de&state=st%2Fate+%26x%3D1"));
    assert!(req.header("authorization").is_none());
}

#[tokio::test]
async fn user_tiers_decodes_every_field() {
    let (client, transport) = client(Some("abc"));
    transport.reply(
        200,
        json!({
            "success": true,
            "data": [{
                "id": encode("1"),
                "name": encode("档位A"),
                "quota": encode("100"),
                "required_level": encode("2"),
                "daily_limit": encode("0"),
                "stock": encode("5"),
                "is_active": encode("true"),
                "sort_order": encode("10"),
                "created_at": encode("2025-01-01 10:00:00"),
                "updated_at": encode("2025-01-02 11:30:00"),
            }]
        }),
    );
    let tiers = client.user_tiers().await.unwrap();
    assert_eq!(tiers.len(), 1);
    assert_eq!(tiers[0].name, "档位A");
    assert_eq!(tiers[0].quota, 100);
    assert!(tiers[0].is_active);
    assert_eq!(transport.last_request().url, format!("{BASE_URL}/tiers"));
}

#[tokio::test]
async fn user_tiers_empty_list_and_failure_are_empty() {
    let (client, transport) = client(Some("abc"));
    transport.reply(200, json!({ "success": true, "data": [] }));
    transport.reply(200, json!({ "success": false }));
    assert!(client.user_tiers().await.unwrap().is_empty());
    assert!(client.user_tiers().await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_tiers_hit_admin_path() {
    let (client, transport) = client(Some("abc"));
    transport.reply(200, json!({ "success": true, "data": [] }));
    client.tiers().await.unwrap();
    assert_eq!(transport.last_request().url, format!("{BASE_URL}/admin/tiers"));
}

#[tokio::test]
async fn tier_writes_are_sent_unencoded() {
    let (client, transport) = client(Some("abc"));
    let input = TierInput {
        name: "Gold ✨".to_string(),
        quota: 500,
        required_level: 3,
        daily_limit: 1,
        sort_order: 2,
        is_active: true,
    };
    let reply = json!({ "success": true, "data": { "message": "created", "id": encode("4") } });
    transport.reply(200, reply.clone());
    transport.reply(200, json!({ "success": true, "data": { "message": "updated" } }));
    transport.reply(200, json!({ "success": true, "data": { "message": "deleted" } }));

    assert_eq!(client.create_tier(&input).await.unwrap(), reply);
    client.update_tier(4, &input).await.unwrap();
    client.delete_tier(4).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, format!("{BASE_URL}/admin/tiers"));
    assert_eq!(body_json(&requests[0])["name"], "Gold ✨");
    assert_eq!(body_json(&requests[0])["quota"], 500);

    assert_eq!(requests[1].method, HttpMethod::Put);
    assert_eq!(requests[1].url, format!("{BASE_URL}/admin/tiers/4"));
    assert_eq!(body_json(&requests[1])["is_active"], true);

    assert_eq!(requests[2].method, HttpMethod::Delete);
    assert_eq!(requests[2].url, format!("{BASE_URL}/admin/tiers/4"));
    assert!(requests[2].body.is_none());
}

#[tokio::test]
async fn settings_are_decoded() {
    let (client, transport) = client(Some("abc"));
    transport.reply(
        200,
        json!({ "success": true, "data": {
            "global_enabled": encode("true"),
            "announcement": encode("hi"),
            "order_expire_minutes": encode("30"),
        } }),
    );
    let settings = client.settings().await.unwrap().unwrap();
    assert!(settings.global_enabled);
    assert_eq!(settings.announcement, "hi");
    assert_eq!(settings.order_expire_minutes, 30);
}

#[tokio::test]
async fn settings_without_data_is_none() {
    let (client, transport) = client(Some("abc"));
    transport.reply(200, json!({ "success": true }));
    assert!(client.settings().await.unwrap().is_none());
}

#[tokio::test]
async fn update_settings_sends_only_present_fields() {
    let (client, transport) = client(Some("abc"));
    transport.reply(200, json!({ "success": true, "data": { "message": "saved" } }));
    let update = SettingsUpdate {
        announcement: Some("hi".to_string()),
        ..Default::default()
    };
    client.update_settings(&update).await.unwrap();

    let req = transport.last_request();
    assert_eq!(req.method, HttpMethod::Put);
    assert_eq!(req.url, format!("{BASE_URL}/admin/settings"));
    assert_eq!(body_json(&req), json!({ "announcement": encode("hi") }));
}

#[tokio::test]
async fn transport_failure_is_request_error_without_status() {
    let (client, transport) = client(Some("abc"));
    transport.fail("connection refused");
    let err = client.tiers().await.unwrap_err();
    assert!(matches!(err, ApiError::Request { status: None, .. }));
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn sign_out_clears_session_even_when_server_fails() {
    let (client, transport) = client(Some("abc"));
    client
        .session()
        .set_user_profile(&UserProfile { id: 1, ..Default::default() })
        .unwrap();
    transport.reply(500, json!({ "success": false, "error": "boom" }));

    let err = client.sign_out().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(client.session().token().unwrap().is_none());
    assert!(client.session().user_profile().unwrap().is_none());

    let req = transport.last_request();
    assert_eq!(req.url, format!("{BASE_URL}/auth/logout"));
    assert_eq!(req.header("authorization"), Some("Bearer abc"));
    assert!(req.body.is_none());
}

#[tokio::test]
async fn malformed_tier_envelope_is_an_error_not_an_empty_list() {
    let (client, transport) = client(Some("abc"));
    transport.reply(
        200,
        json!({ "success": true, "data": [], "error": { "code": 0 } }),
    );
    let err = client.tiers().await.unwrap_err();
    assert!(matches!(err, ApiError::Deserialization(_)), "{err:?}");
}

#[tokio::test]
async fn tier_with_unknown_wire_field_is_rejected() {
    let (client, transport) = client(Some("abc"));
    transport.reply(
        200,
        json!({
            "success": true,
            "data": [{
                "id": encode("1"),
                "name": encode("档位A"),
                "quota": encode("100"),
                "required_level": encode("2"),
                "daily_limit": encode("0"),
                "stock": encode("5"),
                "is_active": encode("true"),
                "sort_order": encode("10"),
                "created_at": encode("2025-01-01 10:00:00"),
                "updated_at": encode("2025-01-02 11:30:00"),
                "price": 10,
            }]
        }),
    );
    let err = client.tiers().await.unwrap_err();
    assert!(matches!(err, ApiError::Deserialization(_)), "{err:?}");
}
