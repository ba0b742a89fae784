//! Integration tests for the identity token lifecycle.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reip::core::clock::{ManualClock, SharedClock};
use reip::core::http::build_client;
use reip::core::token::{LOGIN_PATH, TokenManager};
use reip::storage::secrets::Service;
use reip::test_utils::*;
use reip::PortalError;

use common::logger::TestLogger;

fn token_manager(server: &MockServer, clock: Arc<ManualClock>) -> TokenManager {
    let store = make_test_credential_store(&server.uri());
    let creds = store.get(Service::Identity).expect("identity configured").clone();
    let client = build_client(Duration::from_secs(5)).expect("client build");
    let clock: SharedClock = clock;
    TokenManager::new(creds, client, clock, &make_test_config())
}

async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(body_partial_json(json!({"username": "agent"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(make_test_login_response(token)))
        .mount(server)
        .await;
}

async fn login_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map_or(0, |r| r.iter().filter(|r| r.url.path() == LOGIN_PATH).count())
}

#[tokio::test]
async fn live_token_is_reused() {
    let log = TestLogger::new("live_token_is_reused");

    let server = MockServer::start().await;
    mount_token(&server, &make_test_jwt(42, test_now() + TimeDelta::hours(2))).await;
    let clock = make_test_clock();
    let tokens = token_manager(&server, clock.clone());

    let first = tokens.get_valid_token().await.unwrap();
    clock.advance(TimeDelta::minutes(30));
    let second = tokens.get_valid_token().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(tokens.login_count(), 1);
    assert_eq!(login_calls(&server).await, 1);
    log.finish_ok();
}

#[tokio::test]
async fn expiry_comes_from_the_token_claims() {
    let server = MockServer::start().await;
    let exp = test_now() + TimeDelta::hours(2);
    mount_token(&server, &make_test_jwt(42, exp)).await;
    let tokens = token_manager(&server, make_test_clock());

    let token = tokens.get_valid_token().await.unwrap();

    assert_eq!(token.expiry, exp);
    assert_eq!(token.issued_at, test_now());
}

#[tokio::test]
async fn token_near_expiry_is_refreshed() {
    let server = MockServer::start().await;
    mount_token(&server, &make_test_jwt(42, test_now() + TimeDelta::minutes(10))).await;
    let clock = make_test_clock();
    let tokens = token_manager(&server, clock.clone());

    tokens.get_valid_token().await.unwrap();
    // Inside the refresh skew but before the actual expiry.
    clock.advance(TimeDelta::minutes(9) + TimeDelta::seconds(30));
    tokens.get_valid_token().await.unwrap();

    assert_eq!(tokens.login_count(), 2);
}

#[tokio::test]
async fn opaque_token_falls_back_to_configured_ttl() {
    let server = MockServer::start().await;
    mount_token(&server, "opaque-token-value").await;
    let tokens = token_manager(&server, make_test_clock());

    let token = tokens.get_valid_token().await.unwrap();
    let session = tokens.session().unwrap();

    assert_eq!(token.expiry, test_now() + TimeDelta::hours(1));
    assert_eq!(session.user_id, "jane");
}

#[tokio::test]
async fn session_carries_the_numeric_user_id() {
    let server = MockServer::start().await;
    mount_token(&server, &make_test_jwt(42, test_now() + TimeDelta::hours(2))).await;
    let tokens = token_manager(&server, make_test_clock());

    assert!(tokens.session().is_none());
    tokens.get_valid_token().await.unwrap();

    assert_eq!(tokens.session().unwrap(), make_test_session("42"));
}

#[tokio::test]
async fn invalidate_forces_a_new_login() {
    let server = MockServer::start().await;
    mount_token(&server, &make_test_jwt(42, test_now() + TimeDelta::hours(2))).await;
    let tokens = token_manager(&server, make_test_clock());

    tokens.get_valid_token().await.unwrap();
    tokens.invalidate();
    tokens.get_valid_token().await.unwrap();

    assert_eq!(login_calls(&server).await, 2);
}

#[tokio::test]
async fn wrong_password_is_rejected_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "[jwt_auth] incorrect_password",
            "message": "The password you entered is incorrect."
        })))
        .mount(&server)
        .await;
    let tokens = token_manager(&server, make_test_clock());

    let err = tokens.get_valid_token().await.unwrap_err();

    assert!(matches!(err, PortalError::AuthRejected { .. }));
    assert_eq!(login_calls(&server).await, 1);
    assert_eq!(tokens.login_count(), 0);
    assert!(tokens.session().is_none());
}

#[tokio::test]
async fn unreachable_identity_service_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let tokens = token_manager(&server, make_test_clock());

    let err = tokens.get_valid_token().await.unwrap_err();

    assert!(matches!(err, PortalError::AuthUnavailable { .. }));
    assert_eq!(login_calls(&server).await, 3);
}

#[tokio::test]
async fn login_response_without_token_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_email": "x@y.z"})))
        .mount(&server)
        .await;
    let tokens = token_manager(&server, make_test_clock());

    let err = tokens.get_valid_token().await.unwrap_err();

    assert!(matches!(err, PortalError::ParseResponse { .. }));
}

#[tokio::test]
async fn login_returning_an_expired_token_is_unavailable() {
    let (log, capture) = TestLogger::with_capture("login_returning_an_expired_token_is_unavailable");

    let server = MockServer::start().await;
    mount_token(&server, &make_test_jwt(42, test_now() - TimeDelta::minutes(5))).await;
    let tokens = token_manager(&server, make_test_clock());

    let err = tokens.get_valid_token().await.unwrap_err();

    assert!(matches!(err, PortalError::AuthUnavailable { .. }));
    assert!(tokens.session().is_none());
    assert_eq!(tokens.login_count(), 0);
    capture.assert_logged_at_level(tracing::Level::WARN, "Login returned an expired token");
    log.finish_ok();
}

#[tokio::test]
async fn login_returning_a_token_inside_the_skew_is_unavailable() {
    let server = MockServer::start().await;
    mount_token(&server, &make_test_jwt(42, test_now() + TimeDelta::seconds(30))).await;
    let tokens = token_manager(&server, make_test_clock());

    let err = tokens.refresh().await.unwrap_err();

    assert!(matches!(err, PortalError::AuthUnavailable { .. }));
    assert_eq!(login_calls(&server).await, 1);
}

#[tokio::test]
async fn login_never_logs_the_password_or_token() {
    let (log, capture) = TestLogger::with_capture("login_never_logs_the_password_or_token");

    let server = MockServer::start().await;
    mount_token(&server, &make_test_jwt(42, test_now() + TimeDelta::hours(2))).await;
    let tokens = token_manager(&server, make_test_clock());
    tokens.get_valid_token().await.unwrap();

    capture.assert_field_logged("user_id", "42");
    capture.assert_never_logged("hunter2-password");
    capture.assert_never_logged("test-signature");
    log.finish_ok();
}
