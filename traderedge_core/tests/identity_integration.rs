//! Integration tests for the Identity Service client against an in-process
//! mock backend.

use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};
use std::time::Duration;
use traderedge_core::config::IdentityConfig;
use traderedge_core::identity::{IdentityClient, IdentityError, LoginRequest, RegisterRequest};
use traderedge_core::store::Plan;

async fn register(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"msg": "Email already registered"})),
        );
    }
    let name = format!(
        "{} {}",
        body["firstName"].as_str().unwrap_or_default(),
        body["lastName"].as_str().unwrap_or_default()
    );
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "access_token": "jwt-register",
            "user": {
                "id": "user_1767225600000_k3j2h1g0f",
                "name": name,
                "email": body["email"],
                "plan_type": body["plan_type"],
            }
        })),
    )
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["password"].as_str() {
        Some("correct-password-123") => (
            StatusCode::OK,
            Json(json!({
                "message": "Login successful",
                "access_token": "jwt-login",
                "user": {
                    "id": "user_42",
                    "name": "Ken Thompson",
                    "email": body["email"],
                    "plan_type": "professional",
                }
            })),
        ),
        Some("explode") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"msg": "Server error during login"})),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"msg": "Invalid credentials"})),
        ),
    }
}

/// Helper to start the mock identity backend; returns a client for it
async fn spawn_identity_backend() -> IdentityClient {
    let app = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    IdentityClient::new(&IdentityConfig {
        base_url: format!("http://{addr}/api/"),
        request_timeout: Duration::from_secs(5),
    })
    .expect("Failed to build identity client")
}

fn registration(email: &str) -> RegisterRequest {
    RegisterRequest {
        first_name: "Ken".to_string(),
        last_name: "Thompson".to_string(),
        email: email.to_string(),
        password: "a-long-enough-password".to_string(),
        plan_type: Some(Plan::Kickstarter),
    }
}

#[tokio::test]
async fn test_register_success() {
    let client = spawn_identity_backend().await;
    let session = client.register(&registration("ken@example.com")).await.unwrap();

    assert_eq!(session.access_token, "jwt-register");
    assert_eq!(session.user.name, "Ken Thompson");
    assert_eq!(session.user.email, "ken@example.com");
    assert_eq!(session.user.plan(), Plan::Kickstarter);
}

#[tokio::test]
async fn test_register_duplicate_is_rejected_with_message() {
    let client = spawn_identity_backend().await;
    let err = client
        .register(&registration("taken@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(&err, IdentityError::Rejected(msg) if msg == "Email already registered"));
    assert_eq!(err.client_message(), "Email already registered");
}

#[tokio::test]
async fn test_register_short_password_never_sent() {
    // Unroutable base URL: reaching the network would fail differently
    let client = IdentityClient::new(&IdentityConfig {
        base_url: "http://127.0.0.1:9/api".to_string(),
        request_timeout: Duration::from_secs(1),
    })
    .unwrap();
    let request = RegisterRequest {
        password: "too-short".to_string(),
        ..registration("ken@example.com")
    };

    assert!(matches!(
        client.register(&request).await,
        Err(IdentityError::Validation(_))
    ));
}

#[tokio::test]
async fn test_login_outcomes() {
    let client = spawn_identity_backend().await;

    let session = client
        .login(&LoginRequest {
            email: "ken@example.com".to_string(),
            password: "correct-password-123".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(session.access_token, "jwt-login");
    assert_eq!(session.user.plan(), Plan::Basic);

    let rejected = client
        .login(&LoginRequest {
            email: "ken@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(rejected, IdentityError::Rejected(_)));

    let fault = client
        .login(&LoginRequest {
            email: "ken@example.com".to_string(),
            password: "explode".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(fault, IdentityError::Server(500)));
    assert_eq!(
        fault.client_message(),
        "Identity service error, please try again later"
    );
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let client = IdentityClient::new(&IdentityConfig {
        base_url: "http://127.0.0.1:9/api".to_string(),
        request_timeout: Duration::from_secs(2),
    })
    .unwrap();

    let err = client
        .login(&LoginRequest {
            email: "ken@example.com".to_string(),
            password: "whatever-password".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::Transport(_)));
    assert_eq!(err.client_message(), "Could not reach the identity service");
}
