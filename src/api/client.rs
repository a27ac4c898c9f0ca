use crate::api::error::ApiError;
use crate::cache::QueryParams;
use crate::config::ApiConfig;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Per-call options layered on top of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
  pub headers: HeaderMap,
  pub query: QueryParams,
  /// Overrides the client-wide timeout for this call only
  pub timeout: Option<Duration>,
}

impl RequestConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_query(mut self, query: QueryParams) -> Self {
    self.query = query;
    self
  }

  pub fn with_header(mut self, name: reqwest::header::HeaderName, value: &'static str) -> Self {
    self
      .headers
      .insert(name, reqwest::header::HeaderValue::from_static(value));
    self
  }
}

/// HTTP client for the admin backend.
///
/// Session cookies set by the backend are kept in the client's cookie store
/// and sent back on every request; there is no other credential.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid backend URL {}: {}", config.base_url, e))?;
    Self::from_base_url(base_url, config.timeout_secs.map(Duration::from_secs))
  }

  pub fn from_base_url(base_url: Url, timeout: Option<Duration>) -> Result<Self> {
    if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
      return Err(eyre!("Backend URL must be an http(s) URL: {}", base_url));
    }

    let mut builder = reqwest::Client::builder().cookie_store(true);
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Build a URL under the base URL from raw path segments.
  ///
  /// Each segment is percent-encoded on its own, so an id containing `/`
  /// stays a single segment.
  pub fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Url {
    let mut url = self.base_url.clone();
    url.set_query(None);
    if let Ok(mut path) = url.path_segments_mut() {
      path
        .pop_if_empty()
        .extend(segments.iter().map(AsRef::as_ref).filter(|s| !s.is_empty()));
    }
    url
  }

  /// Resolve a `/`-separated path (optionally with a query string) against the base URL.
  pub fn resolve(&self, path: &str) -> Url {
    let (path, query) = match path.split_once('?') {
      Some((path, query)) => (path, Some(query)),
      None => (path, None),
    };
    let segments: Vec<&str> = path.split('/').collect();
    let mut url = self.endpoint(&segments);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
      url.set_query(Some(query));
    }
    url
  }

  /// Perform a request against a path relative to the base URL.
  pub async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
    config: Option<&RequestConfig>,
  ) -> std::result::Result<Value, ApiError> {
    self.send(method, self.resolve(path), body, config).await
  }

  /// Perform a request against a fully built URL.
  ///
  /// Returns the parsed JSON body on 2xx (`Value::Null` for an empty body).
  pub async fn send(
    &self,
    method: Method,
    url: Url,
    body: Option<&Value>,
    config: Option<&RequestConfig>,
  ) -> std::result::Result<Value, ApiError> {
    let mut request = self.http.request(method.clone(), url.clone());

    if let Some(config) = config {
      if !config.query.is_empty() {
        request = request.query(&config.query);
      }
      request = request.headers(config.headers.clone());
      if let Some(timeout) = config.timeout {
        request = request.timeout(timeout);
      }
    }

    if let Some(body) = body {
      request = request.json(body);
    }

    debug!(%method, %url, "backend request");

    let response = request.send().await.map_err(|e| {
      warn!(%method, %url, error = %e, "backend unreachable");
      ApiError::from(e)
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| {
      warn!(%method, %url, error = %e, "failed to read response body");
      ApiError::from(e)
    })?;

    if !status.is_success() {
      let err = ApiError::from_response(status, &bytes);
      warn!(%method, %url, %status, message = err.message(), "backend returned an error");
      return Err(err);
    }

    parse_body(status, &bytes)
  }
}

fn parse_body(status: StatusCode, bytes: &[u8]) -> std::result::Result<Value, ApiError> {
  if bytes.iter().all(u8::is_ascii_whitespace) {
    return Ok(Value::Null);
  }
  serde_json::from_slice(bytes)
    .map_err(|e| ApiError::raw(Some(status), format!("malformed response body: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::error::FALLBACK_MESSAGE;
  use crate::testing::{unused_base_url, MockBackend};
  use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
  use axum::routing::{get, post};
  use axum::{Json, Router};
  use serde_json::json;

  fn client_for(base: &str) -> ApiClient {
    ApiClient::from_base_url(Url::parse(base).unwrap(), None).unwrap()
  }

  #[test]
  fn test_endpoint_keeps_base_path() {
    let client = client_for("https://be.example.com/api/");
    assert_eq!(
      client.endpoint(&["offices", "7"]).as_str(),
      "https://be.example.com/api/offices/7"
    );

    let client = client_for("https://be.example.com/api");
    assert_eq!(
      client.resolve("/auth/validate").as_str(),
      "https://be.example.com/api/auth/validate"
    );
  }

  #[test]
  fn test_endpoint_encodes_segments() {
    let client = client_for("https://be.example.com");
    assert_eq!(
      client.endpoint(&["offices", "a/b c"]).as_str(),
      "https://be.example.com/offices/a%2Fb%20c"
    );
  }

  #[test]
  fn test_resolve_keeps_query_string() {
    let client = client_for("https://be.example.com");
    assert_eq!(
      client.resolve("/offices?page=1&limit=10").as_str(),
      "https://be.example.com/offices?page=1&limit=10"
    );
  }

  #[test]
  fn test_rejects_non_http_base() {
    assert!(ApiClient::from_base_url(Url::parse("mailto:admin@example.com").unwrap(), None).is_err());
    assert!(ApiClient::from_base_url(Url::parse("ftp://example.com").unwrap(), None).is_err());
  }

  #[tokio::test]
  async fn test_success_returns_parsed_body() {
    let backend = MockBackend::start(Router::new().route(
      "/offices",
      get(|| async { Json(json!({"data": [], "pagination": {"totalItems": 0}})) }),
    ))
    .await;

    let body = backend
      .client()
      .request(Method::GET, "/offices", None, None)
      .await
      .unwrap();
    assert_eq!(body["pagination"]["totalItems"], 0);
  }

  #[tokio::test]
  async fn test_empty_success_body_is_null() {
    let backend = MockBackend::start(
      Router::new().route("/auth/logout", post(|| async { AxumStatus::NO_CONTENT })),
    )
    .await;

    let body = backend
      .client()
      .request(Method::POST, "/auth/logout", None, None)
      .await
      .unwrap();
    assert_eq!(body, Value::Null);
  }

  #[tokio::test]
  async fn test_structured_error_carries_message() {
    let backend = MockBackend::start(Router::new().route(
      "/offices",
      post(|| async {
        (
          AxumStatus::UNPROCESSABLE_ENTITY,
          Json(json!({"message": "Name already taken"})),
        )
      }),
    ))
    .await;

    let err = backend
      .client()
      .request(Method::POST, "/offices", Some(&json!({"name": "HQ"})), None)
      .await
      .unwrap_err();
    assert_eq!(
      err,
      ApiError::Structured {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        message: "Name already taken".to_string(),
      }
    );
  }

  #[tokio::test]
  async fn test_per_request_timeout() {
    let backend = MockBackend::start(Router::new().route(
      "/offices",
      get(|| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Json(json!({"data": []}))
      }),
    ))
    .await;

    let config = RequestConfig {
      timeout: Some(Duration::from_millis(20)),
      ..RequestConfig::default()
    };
    let err = backend
      .client()
      .request(Method::GET, "/offices", None, Some(&config))
      .await
      .unwrap_err();
    assert!(!err.is_structured());
    assert_eq!(err.message(), FALLBACK_MESSAGE);
  }

  #[tokio::test]
  async fn test_malformed_success_body_is_raw_error() {
    let backend = MockBackend::start(
      Router::new().route("/auth/validate", get(|| async { "definitely not json" })),
    )
    .await;

    let err = backend
      .client()
      .request(Method::GET, "/auth/validate", None, None)
      .await
      .unwrap_err();
    assert!(!err.is_structured());
    assert_eq!(err.status(), Some(StatusCode::OK));
  }

  #[tokio::test]
  async fn test_network_failure_is_raw_error() {
    let client = ApiClient::from_base_url(unused_base_url().await, None).unwrap();
    let err = client
      .request(Method::GET, "/offices", None, None)
      .await
      .unwrap_err();
    assert_eq!(err.status(), None);
    assert_eq!(err.message(), FALLBACK_MESSAGE);
  }

  #[tokio::test]
  async fn test_config_query_and_headers_are_sent() {
    let backend = MockBackend::start(Router::new().route(
      "/shifts",
      get(
        |headers: AxumHeaders, axum::extract::RawQuery(query): axum::extract::RawQuery| async move {
          Json(json!({
            "query": query,
            "client": headers.get("x-client").and_then(|v| v.to_str().ok()),
          }))
        },
      ),
    ))
    .await;

    let mut query = QueryParams::new();
    query.insert("page".to_string(), "2".to_string());
    query.insert("limit".to_string(), "20".to_string());
    let config = RequestConfig::new()
      .with_query(query)
      .with_header(reqwest::header::HeaderName::from_static("x-client"), "officeshift");

    let body = backend
      .client()
      .request(Method::GET, "/shifts", None, Some(&config))
      .await
      .unwrap();
    assert_eq!(body["query"], "limit=20&page=2");
    assert_eq!(body["client"], "officeshift");
  }

  #[tokio::test]
  async fn test_cookies_are_sent_back() {
    let backend = MockBackend::start(
      Router::new()
        .route(
          "/auth/login",
          post(|| async { ([("set-cookie", "session=abc123; Path=/")], Json(json!({}))) }),
        )
        .route(
          "/auth/validate",
          get(|headers: AxumHeaders| async move {
            let cookie = headers
              .get("cookie")
              .and_then(|v| v.to_str().ok())
              .unwrap_or_default();
            if cookie.contains("session=abc123") {
              (AxumStatus::OK, Json(json!({"valid": true})))
            } else {
              (AxumStatus::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})))
            }
          }),
        ),
    )
    .await;

    let client = backend.client();
    assert!(client
      .request(Method::GET, "/auth/validate", None, None)
      .await
      .is_err());
    client
      .request(Method::POST, "/auth/login", Some(&json!({})), None)
      .await
      .unwrap();
    assert!(client
      .request(Method::GET, "/auth/validate", None, None)
      .await
      .is_ok());
  }
}
