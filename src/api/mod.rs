//! Backend REST API: HTTP client, error shape, wire types and session endpoints.

pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, RequestConfig};
pub use error::ApiError;
pub use types::{Page, RecordId};
