//! Serde types matching the backend's wire format.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Backend-assigned record identifier.
///
/// The backend may send ids as strings or numbers; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RecordId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

impl From<String> for RecordId {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl From<u64> for RecordId {
  fn from(n: u64) -> Self {
    Self(n.to_string())
  }
}

impl<'de> Deserialize<'de> for RecordId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Text(String),
      Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Text(s) => Self(s),
      Raw::Number(n) => Self(n.to_string()),
    })
  }
}

/// Accept `1.5` as well as `"1.5"` (decimal columns often arrive as strings).
pub fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Number(f64),
    Text(String),
  }

  match Raw::deserialize(deserializer)? {
    Raw::Number(n) => Ok(n),
    Raw::Text(s) => s
      .trim()
      .parse()
      .map_err(|_| serde::de::Error::custom(format!("expected a number, got {:?}", s))),
  }
}

// ============================================================================
// List endpoint envelope
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  #[serde(default)]
  pub total_items: u64,
  #[serde(default)]
  pub total_pages: u64,
  /// Anything else the backend reports (current page, limit, ...)
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  #[serde(default = "Vec::new")]
  pub data: Vec<T>,
  #[serde(default)]
  pub pagination: Pagination,
}

impl<T> Page<T> {
  /// Number of pages, never less than one
  pub fn page_count(&self, page_size: u64) -> u64 {
    let from_total = if page_size == 0 {
      1
    } else {
      self.pagination.total_items.div_ceil(page_size)
    };
    self.pagination.total_pages.max(from_total).max(1)
  }
}

// ============================================================================
// Auth endpoints
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub email: String,
  pub password: String,
  pub remember: bool,
}
