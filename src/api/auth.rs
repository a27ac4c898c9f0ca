//! Session endpoints.
//!
//! Sessions are issued and validated by the backend; this side only carries
//! the cookie around.

use crate::api::client::{ApiClient, RequestConfig};
use crate::api::error::ApiError;
use crate::api::types::LoginRequest;
use crate::request::ApiRequest;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const VALIDATE_PATH: &str = "/auth/validate";

/// Ask the backend whether the current session cookie is valid.
///
/// Any failure (401, network, malformed body) counts as "not valid".
pub async fn check_auth(client: &ApiClient) -> bool {
  match client.request(Method::GET, VALIDATE_PATH, None, None).await {
    Ok(_) => true,
    Err(e) => {
      debug!(error = ?e, "session check failed");
      false
    }
  }
}

/// Post credentials through `request`, so its state reflects the attempt.
pub async fn login(request: &ApiRequest, credentials: &LoginRequest) -> Result<Value, ApiError> {
  let body = serde_json::to_value(credentials)
    .map_err(|e| ApiError::raw(None, format!("failed to encode credentials: {}", e)))?;
  let config = RequestConfig::new().with_header(CONTENT_TYPE, "application/json");

  let result = request
    .request(Method::POST, LOGIN_PATH, Some(body), Some(config))
    .await;
  if result.is_ok() {
    info!(email = %credentials.email, "logged in");
  }
  result
}

pub async fn logout(request: &ApiRequest) -> Result<Value, ApiError> {
  let result = request.request(Method::POST, LOGOUT_PATH, None, None).await;
  if result.is_ok() {
    info!("logged out");
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{unused_base_url, MockBackend};
  use axum::http::{HeaderMap, StatusCode};
  use axum::routing::{get, post};
  use axum::{Json, Router};
  use serde_json::json;

  async fn validate_backend(status: StatusCode, body: &'static str) -> MockBackend {
    MockBackend::start(Router::new().route(
      VALIDATE_PATH,
      get(move || async move { (status, body) }),
    ))
    .await
  }

  #[tokio::test]
  async fn test_check_auth_true_on_success() {
    let backend = validate_backend(StatusCode::OK, r#"{"valid":true}"#).await;
    assert!(check_auth(&backend.client()).await);
  }

  #[tokio::test]
  async fn test_check_auth_true_on_empty_success() {
    let backend = validate_backend(StatusCode::NO_CONTENT, "").await;
    assert!(check_auth(&backend.client()).await);
  }

  #[tokio::test]
  async fn test_check_auth_false_on_unauthorized() {
    let backend = validate_backend(StatusCode::UNAUTHORIZED, r#"{"message":"Unauthorized"}"#).await;
    assert!(!check_auth(&backend.client()).await);

    let backend = validate_backend(StatusCode::FORBIDDEN, "").await;
    assert!(!check_auth(&backend.client()).await);
  }

  #[tokio::test]
  async fn test_check_auth_false_on_network_failure() {
    let client = ApiClient::from_base_url(unused_base_url().await, None).unwrap();
    assert!(!check_auth(&client).await);
  }

  #[tokio::test]
  async fn test_check_auth_false_on_malformed_body() {
    let backend = validate_backend(StatusCode::OK, "<html>login page</html>").await;
    assert!(!check_auth(&backend.client()).await);
  }

  #[tokio::test]
  async fn test_login_posts_json_and_keeps_cookie() {
    let backend = MockBackend::start(
      Router::new()
        .route(
          LOGIN_PATH,
          post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let json_header = headers
              .get("content-type")
              .and_then(|v| v.to_str().ok())
              .is_some_and(|v| v.starts_with("application/json"));
            if json_header && body["email"] == "admin@example.com" && body["remember"] == true {
              (
                StatusCode::OK,
                [("set-cookie", "token=t0k; Path=/; HttpOnly")],
                Json(json!({"message": "Login successful"})),
              )
            } else {
              (
                StatusCode::UNAUTHORIZED,
                [("x-reason", "bad-credentials")],
                Json(json!({"message": "Invalid credentials"})),
              )
            }
          }),
        )
        .route(
          VALIDATE_PATH,
          get(|headers: HeaderMap| async move {
            let has_token = headers
              .get("cookie")
              .and_then(|v| v.to_str().ok())
              .is_some_and(|v| v.contains("token=t0k"));
            if has_token {
              StatusCode::OK
            } else {
              StatusCode::UNAUTHORIZED
            }
          }),
        ),
    )
    .await;

    let client = backend.client();
    let request = ApiRequest::new(client.clone());
    let credentials = LoginRequest {
      email: "admin@example.com".to_string(),
      password: "secret".to_string(),
      remember: true,
    };

    assert!(!check_auth(&client).await);
    let body = login(&request, &credentials).await.unwrap();
    assert_eq!(body["message"], "Login successful");
    assert!(check_auth(&client).await);
  }

  #[tokio::test]
  async fn test_login_failure_surfaces_server_message() {
    let backend = MockBackend::start(Router::new().route(
      LOGIN_PATH,
      post(|| async {
        (
          StatusCode::UNAUTHORIZED,
          Json(json!({"message": "Invalid email or password"})),
        )
      }),
    ))
    .await;

    let request = ApiRequest::new(backend.client());
    let credentials = LoginRequest {
      email: "admin@example.com".to_string(),
      password: "wrong".to_string(),
      remember: false,
    };

    let err = login(&request, &credentials).await.unwrap_err();
    assert_eq!(err.message(), "Invalid email or password");
    assert_eq!(request.error().as_deref(), Some("Invalid email or password"));
    assert!(!request.is_loading());
  }

  #[tokio::test]
  async fn test_logout_goes_through_request_state() {
    let backend = MockBackend::start(
      Router::new().route(LOGOUT_PATH, post(|| async { StatusCode::NO_CONTENT })),
    )
    .await;

    let request = ApiRequest::new(backend.client());
    assert_eq!(logout(&request).await.unwrap(), Value::Null);
    assert!(request.state().is_success());
  }
}
