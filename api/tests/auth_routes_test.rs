mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use db::models::user::{Model as UserModel, UserRole};
use helpers::make_test_app;
use serde_json::{Value, json};
use tower::ServiceExt;

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(res: axum::http::Response<Body>) -> Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn register_creates_a_customer_and_returns_a_token() {
    let (app, _state) = make_test_app().await;

    let req = json_request(
        "/api/auth/register",
        json!({
            "name": "Amira",
            "email": "amira@test.com",
            "password": "password123"
        }),
    );

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["role"], "customer");
    assert!(!body["data"]["token"].as_str().unwrap().is_empty());
    assert!(!body["data"]["expires_at"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let (app, state) = make_test_app().await;
    UserModel::create(state.db(), "A", "taken@test.com", "password123", UserRole::Customer)
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "/api/auth/register",
            json!({ "name": "B", "email": "taken@test.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(json_request(
            "/api/auth/register",
            json!({ "name": "B", "email": "not-an-email", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(json_request(
            "/api/auth/register",
            json!({ "name": "B", "email": "ok@test.com", "password": "short" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_verifies_the_password() {
    let (app, state) = make_test_app().await;
    UserModel::create(state.db(), "A", "a@test.com", "password123", UserRole::Customer)
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "/api/auth/login",
            json!({ "email": "a@test.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["data"]["email"], "a@test.com");

    let res = app
        .oneshot(json_request(
            "/api/auth/login",
            json!({ "email": "a@test.com", "password": "wrong-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_and_resolves_the_token() {
    let (app, state) = make_test_app().await;
    let user = UserModel::create(state.db(), "A", "a@test.com", "password123", UserRole::Admin)
        .await
        .unwrap();
    let (token, _) = api::auth::generate_jwt(user.id, user.is_admin());

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["data"]["id"], user.id);
    assert_eq!(body["data"]["role"], "admin");

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
