//! Cache keys: a resource name plus its query parameters.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters sent with a list request.
///
/// A `BTreeMap` keeps parameters sorted, so logically equal parameter sets
/// always serialize (and hash) the same way.
pub type QueryParams = BTreeMap<String, String>;

/// Identifies one cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  resource: String,
  params: QueryParams,
}

impl QueryKey {
  pub fn new(resource: impl Into<String>, params: QueryParams) -> Self {
    Self {
      resource: resource.into(),
      params,
    }
  }

  pub fn resource(&self) -> &str {
    &self.resource
  }

  pub fn params(&self) -> &QueryParams {
    &self.params
  }

  /// Parameters as a URL query string (no leading `?`).
  pub fn query_string(&self) -> String {
    url::form_urlencoded::Serializer::new(String::new())
      .extend_pairs(self.params.iter())
      .finish()
  }

  /// SHA256 hash for stable, fixed-length map keys
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.resource.as_bytes());
    hasher.update(b"?");
    hasher.update(self.query_string().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.params.is_empty() {
      write!(f, "{}", self.resource)
    } else {
      write!(f, "{}?{}", self.resource, self.query_string())
    }
  }
}

/// Build `QueryParams` from anything displayable.
///
/// ```ignore
/// let params = query_params([("page", 1), ("limit", 10)]);
/// ```
pub fn query_params<K, V, I>(pairs: I) -> QueryParams
where
  K: Into<String>,
  V: ToString,
  I: IntoIterator<Item = (K, V)>,
{
  pairs
    .into_iter()
    .map(|(k, v)| (k.into(), v.to_string()))
    .collect()
}
