mod common;

use acge_common::auth::Role;
use acge_common::db::models::User;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::*;
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

fn login_request(email: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(json!({ "email": email, "password": password })))
        .unwrap()
}

#[tokio::test]
async fn health_is_served_without_auth() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn login_sets_cookie_and_redirects_by_role() {
    let admin = user("admin@acge.test", "correct-horse", Role::Admin);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![admin.clone()]])
        .into_connection();

    let response = app(db)
        .oneshot(login_request("  Admin@ACGE.test ", "correct-horse"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("auth-token="));
    assert!(cookie.contains("HttpOnly"));

    let body = read_json(response).await;
    assert_eq!(body["redirect_to"], "/dashboard");
    assert_eq!(body["user"]["email"], "admin@acge.test");
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let secretary = user("sec@acge.test", "right-password", Role::Secretaire);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![secretary]])
        .into_connection();

    let response = app(db)
        .oneshot(login_request("sec@acge.test", "wrong-password"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn unknown_email_and_inactive_user_look_alike() {
    let mut inactive = user("gone@acge.test", "right-password", Role::Ordonnateur);
    inactive.is_active = false;

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<User>::new()])
        .append_query_results([vec![inactive]])
        .into_connection();
    let app = app(db);

    let unknown = app
        .clone()
        .oneshot(login_request("nobody@acge.test", "whatever"))
        .await
        .unwrap();
    let disabled = app
        .oneshot(login_request("gone@acge.test", "right-password"))
        .await
        .unwrap();

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(disabled.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(unknown).await, read_json(disabled).await);
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(
            Request::post("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn me_requires_a_session() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_accepts_bearer_token() {
    let agent = user("ac@acge.test", "password-ac", Role::AgentComptable);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![agent.clone()]])
        .into_connection();

    let response = app(db)
        .oneshot(
            Request::get("/api/auth/me")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", token_for(agent.id, Role::AgentComptable)),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["id"], agent.id.to_string());
    assert_eq!(body["redirect_to"], "/ac-dashboard");
}

#[tokio::test]
async fn me_for_deleted_user_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<User>::new()])
        .into_connection();

    let response = app(db)
        .oneshot(
            authed("GET", "/api/auth/me", Uuid::new_v4(), Role::Secretaire)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let mut token = token_for(Uuid::new_v4(), Role::Admin);
    token.push('x');

    let response = app(db)
        .oneshot(
            Request::get("/api/users")
                .header(header::COOKIE, format!("auth-token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn user_administration_is_admin_only() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(
            authed("GET", "/api/users", Uuid::new_v4(), Role::ControleurBudgetaire)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reset_password_generates_one_when_absent() {
    let admin_id = Uuid::new_v4();
    let target = Uuid::new_v4();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([sea_orm::MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let response = app(db)
        .oneshot(
            authed("POST", &format!("/api/users/{}/reset-password", target), admin_id, Role::Admin)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["user_id"], target.to_string());
    assert_eq!(body["generated_password"].as_str().map(str::len), Some(16));
}

#[tokio::test]
async fn admin_cannot_deactivate_themselves() {
    let admin_id = Uuid::new_v4();
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let response = app(db)
        .oneshot(
            authed("PUT", &format!("/api/users/{}", admin_id), admin_id, Role::Admin)
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(json!({ "is_active": false })))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
