//! Client-side query cache shared by every view.
//!
//! This module provides a resource-agnostic cache that:
//! - Stores the last server response per (resource, params) key
//! - Runs at most one fetch per key, later callers attach to it
//! - Marks a resource's entries stale when a mutation on it succeeds

mod key;
mod layer;
mod traits;

pub use key::{query_params, QueryKey, QueryParams};
pub use layer::QueryCache;
pub use traits::{CacheResult, CacheSource, EntryStatus};
