//! Typed failure shape for backend calls.

use reqwest::StatusCode;
use serde_json::Value;

/// Message shown when a failure carries no usable message of its own.
pub const FALLBACK_MESSAGE: &str = "An error occurred. Please try again.";

/// A failed backend call.
///
/// `Structured` means the server answered with an error status and a
/// `{ "message": ... }` body. Everything else (no response at all, an error
/// status without a message, a body that is not JSON) is `Raw`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  #[error("{message}")]
  Structured { status: StatusCode, message: String },

  #[error("{}", FALLBACK_MESSAGE)]
  Raw {
    status: Option<StatusCode>,
    reason: String,
  },
}

impl ApiError {
  pub fn raw(status: Option<StatusCode>, reason: impl Into<String>) -> Self {
    Self::Raw {
      status,
      reason: reason.into(),
    }
  }

  /// Build the error for a non-2xx response from its (possibly empty) body.
  pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
    let message = serde_json::from_slice::<Value>(body)
      .ok()
      .as_ref()
      .and_then(|v| v.get("message"))
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|m| !m.is_empty())
      .map(String::from);

    match message {
      Some(message) => Self::Structured { status, message },
      None => Self::raw(
        Some(status),
        format!("{} without an error message", status),
      ),
    }
  }

  /// Human-readable message for display.
  pub fn message(&self) -> &str {
    match self {
      Self::Structured { message, .. } => message,
      Self::Raw { .. } => FALLBACK_MESSAGE,
    }
  }

  pub fn status(&self) -> Option<StatusCode> {
    match self {
      Self::Structured { status, .. } => Some(*status),
      Self::Raw { status, .. } => *status,
    }
  }

  /// Whether the server supplied its own message.
  pub fn is_structured(&self) -> bool {
    matches!(self, Self::Structured { .. })
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    Self::raw(e.status(), e.to_string())
  }
}
