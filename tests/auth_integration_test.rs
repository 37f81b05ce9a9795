//! Signup, login, token refresh and profile management over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn signup_creates_a_customer_and_returns_tokens() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            Some(json!({ "email": "Ada@Example.com", "password": "secret1", "role": "admin" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "customer");
    assert_eq!(body["user"]["isActive"], true);
    assert!(body["user"].get("passwordHash").is_none());

    let token = body["token"].as_str().expect("access token");
    let (status, profile) = app
        .call(Method::GET, "/api/auth/profile", None, Some(token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "ada@example.com");
}

#[tokio::test]
async fn duplicate_signup_is_a_bad_request() {
    let app = TestApp::new().await;
    let body = json!({ "email": "ada@example.com", "password": "secret1" });

    let (status, _) = app
        .call(Method::POST, "/api/auth/signup", Some(body.clone()), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            Some(json!({ "email": "ADA@example.com", "password": "secret1" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn signup_validates_input() {
    let app = TestApp::new().await;

    for body in [
        json!({ "email": "not-an-email", "password": "secret1" }),
        json!({ "email": "ada@example.com", "password": "short" }),
        json!({ "email": "ada@example.com" }),
    ] {
        let (status, _) = app
            .call(Method::POST, "/api/auth/signup", Some(body.clone()), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn login_failures_share_one_message() {
    let app = TestApp::new().await;
    let blocked = app.customer("blocked@example.com").await;
    app.customer("ada@example.com").await;
    app.state
        .services
        .accounts
        .set_active(blocked.id(), false)
        .await
        .unwrap();

    for (email, password) in [
        ("nobody@example.com", PASSWORD),
        ("ada@example.com", "wrong-password"),
        ("blocked@example.com", PASSWORD),
    ] {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{email}");
        assert_eq!(body["error"], "Invalid credentials");
    }

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "ADA@example.com", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn refresh_exchanges_only_refresh_tokens() {
    let app = TestApp::new().await;
    let (_, session) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            Some(json!({ "email": "ada@example.com", "password": "secret1" })),
            None,
        )
        .await;

    let (status, refreshed) = app
        .call(
            Method::POST,
            "/api/auth/refresh",
            Some(json!({ "refreshToken": session["refreshToken"] })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(refreshed["token"].as_str().is_some());

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/refresh",
            Some(json!({ "refreshToken": session["token"] })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A refresh token is not a bearer credential.
    let refresh = session["refreshToken"].as_str().unwrap();
    let (status, _) = app
        .call(Method::GET, "/api/auth/profile", None, Some(refresh))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivation_takes_effect_on_the_next_request() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let ada = app.customer("ada@example.com").await;

    let (status, _) = app
        .call(Method::GET, "/api/auth/profile", None, Some(&ada.token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/users/{}/block", ada.id()),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User blocked successfully");
    assert_eq!(body["user"]["isActive"], false);

    let (status, _) = app
        .call(Method::GET, "/api/auth/profile", None, Some(&ada.token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.call(
        Method::PUT,
        &format!("/api/users/{}/unblock", ada.id()),
        None,
        Some(&admin.token),
    )
    .await;
    let (status, _) = app
        .call(Method::GET, "/api/auth/profile", None, Some(&ada.token))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn profile_update_touches_only_allowed_fields() {
    let app = TestApp::new().await;
    let ada = app.customer("ada@example.com").await;

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/auth/profile",
            Some(json!({ "address": "1 Market St", "role": "admin", "isActive": false })),
            Some(&ada.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["address"], "1 Market St");
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "customer");
    assert_eq!(body["isActive"], true);
}

#[tokio::test]
async fn profile_email_change_must_stay_unique() {
    let app = TestApp::new().await;
    let ada = app.customer("ada@example.com").await;
    app.customer("grace@example.com").await;

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/auth/profile",
            Some(json!({ "email": "grace@example.com" })),
            Some(&ada.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "email already in use");

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/auth/profile",
            Some(json!({ "email": "Lovelace@Example.com" })),
            Some(&ada.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "lovelace@example.com");
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
    let app = TestApp::new().await;
    let ada = app.customer("ada@example.com").await;

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/auth/password",
            Some(json!({ "currentPassword": "nope", "newPassword": "better-secret" })),
            Some(&ada.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Current password is incorrect");

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/auth/password",
            Some(json!({ "currentPassword": PASSWORD, "newPassword": "better-secret" })),
            Some(&ada.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password updated successfully");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "ada@example.com", "password": "better-secret" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_forged_tokens() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No authentication token provided");

    let (status, body) = app
        .call(Method::POST, "/api/auth/logout", None, Some("not.a.jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid authentication token");
}
