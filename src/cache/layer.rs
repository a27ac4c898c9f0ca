//! Shared query cache with in-flight de-duplication.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

use super::key::QueryKey;
use super::traits::{CacheResult, CacheSource, EntryStatus};
use crate::api::ApiError;

type FetchResult = Result<Value, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type CachedFetch = Result<CacheResult<Value>, ApiError>;

enum EntryState {
  /// A fetch is running; later callers await the same future unless it was
  /// superseded by an invalidation
  Loading {
    generation: u64,
    fetch: SharedFetch,
    superseded: bool,
  },
  /// Last server response for this key
  Ready {
    data: Value,
    cached_at: DateTime<Utc>,
    stale: bool,
  },
}

struct CacheEntry {
  key: QueryKey,
  state: EntryState,
}

enum Lookup {
  Hit(Value, DateTime<Utc>),
  Attach(SharedFetch),
  /// Start a fetch once the superseded one settles
  After(SharedFetch),
  Miss,
}

#[derive(Default)]
struct CacheInner {
  entries: Mutex<HashMap<String, CacheEntry>>,
  next_generation: AtomicU64,
}

/// Process-wide cache of query results keyed by (resource, params).
///
/// Cloning is cheap and every clone sees the same entries. Entries only go
/// stale through [`QueryCache::invalidate`]; there is no time-based expiry.
#[derive(Clone, Default)]
pub struct QueryCache {
  inner: Arc<CacheInner>,
}

impl QueryCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Return the cached value for `key`, or run `fetcher` to produce it.
  ///
  /// 1. Fresh entry: returned without calling `fetcher`
  /// 2. Fetch already in flight: attach to it, `fetcher` is not called
  /// 3. Missing or stale: `fetcher` runs in a spawned task which writes the
  ///    entry when it settles, so dropping this future never cancels it
  /// 4. In flight but invalidated: a new fetch starts after the old one
  ///    settles, keeping one request per key on the wire
  ///
  /// A failed fetch removes the entry and the error goes to every waiter.
  pub async fn fetch<F, Fut>(&self, key: &QueryKey, fetcher: F) -> CachedFetch
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = FetchResult> + Send + 'static,
  {
    let hash = key.cache_hash();

    let (fetch, source) = {
      let mut entries = self.entries();
      let lookup = match entries.get(&hash).map(|e| &e.state) {
        Some(EntryState::Ready {
          data,
          cached_at,
          stale: false,
        }) => Lookup::Hit(data.clone(), *cached_at),
        Some(EntryState::Loading {
          fetch,
          superseded: false,
          ..
        }) => Lookup::Attach(fetch.clone()),
        Some(EntryState::Loading {
          fetch,
          superseded: true,
          ..
        }) => Lookup::After(fetch.clone()),
        _ => Lookup::Miss,
      };

      match lookup {
        Lookup::Hit(data, cached_at) => {
          trace!(%key, "cache hit");
          return Ok(CacheResult::from_cache(data, cached_at));
        }
        Lookup::Attach(fetch) => {
          debug!(%key, "attaching to in-flight fetch");
          (fetch, CacheSource::InFlight)
        }
        Lookup::After(previous) => {
          debug!(%key, "queueing fetch behind an invalidated one");
          let next = fetcher();
          let chained = async move {
            let _ = previous.await;
            next.await
          };
          (self.start(&mut entries, key, hash, chained), CacheSource::Network)
        }
        Lookup::Miss => {
          debug!(%key, "cache miss, fetching");
          (
            self.start(&mut entries, key, hash, fetcher()),
            CacheSource::Network,
          )
        }
      }
    };

    let data = fetch.await?;
    Ok(match source {
      CacheSource::Network => CacheResult::from_network(data),
      _ => CacheResult::in_flight(data),
    })
  }

  fn start<Fut>(
    &self,
    entries: &mut HashMap<String, CacheEntry>,
    key: &QueryKey,
    hash: String,
    fut: Fut,
  ) -> SharedFetch
  where
    Fut: Future<Output = FetchResult> + Send + 'static,
  {
    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
    let fetch = self.spawn_fetch(hash.clone(), generation, fut);
    entries.insert(
      hash,
      CacheEntry {
        key: key.clone(),
        state: EntryState::Loading {
          generation,
          fetch: fetch.clone(),
          superseded: false,
        },
      },
    );
    fetch
  }

  fn spawn_fetch<Fut>(&self, hash: String, generation: u64, fut: Fut) -> SharedFetch
  where
    Fut: Future<Output = FetchResult> + Send + 'static,
  {
    let cache = self.clone();
    let task = tokio::spawn(async move {
      let result = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(ApiError::raw(None, "fetch panicked")),
      };
      cache.complete(&hash, generation, &result);
      result
    });

    async move {
      task
        .await
        .unwrap_or_else(|e| Err(ApiError::raw(None, format!("fetch task failed: {}", e))))
    }
    .boxed()
    .shared()
  }

  /// Settle the Loading entry that started `generation`.
  ///
  /// If the entry was invalidated, replaced or cleared meanwhile, nothing
  /// is written.
  fn complete(&self, hash: &str, generation: u64, result: &FetchResult) {
    let mut entries = self.entries();
    let entry = match entries.get_mut(hash) {
      Some(entry)
        if matches!(entry.state, EntryState::Loading { generation: g, .. } if g == generation) =>
      {
        entry
      }
      _ => {
        debug!("discarding result of a replaced fetch");
        return;
      }
    };

    if matches!(entry.state, EntryState::Loading { superseded: true, .. }) {
      debug!(key = %entry.key, "discarding result of an invalidated fetch");
      entries.remove(hash);
      return;
    }

    match result {
      Ok(data) => {
        trace!(key = %entry.key, "cache entry populated");
        entry.state = EntryState::Ready {
          data: data.clone(),
          cached_at: Utc::now(),
          stale: false,
        };
      }
      Err(e) => {
        debug!(key = %entry.key, error = %e, "fetch failed, clearing entry");
        entries.remove(hash);
      }
    }
  }

  /// Mark every entry of `resource` stale, whatever its params.
  ///
  /// Fetches still in flight for the resource are superseded: their waiters
  /// get the result but it is not cached, and the next fetch of that key
  /// waits for them before sending its own request. Returns the number of
  /// entries touched.
  pub fn invalidate(&self, resource: &str) -> usize {
    let mut entries = self.entries();
    let mut touched = 0;
    for entry in entries.values_mut() {
      if entry.key.resource() != resource {
        continue;
      }
      touched += 1;
      match &mut entry.state {
        EntryState::Ready { stale, .. } => *stale = true,
        EntryState::Loading { superseded, .. } => *superseded = true,
      }
    }
    debug!(resource, touched, "invalidated cache entries");
    touched
  }

  /// Drop every entry. Fetches still in flight settle without writing.
  pub fn clear(&self) {
    self.entries().clear();
  }

  /// Status of the entry for `key`, if any.
  pub fn peek(&self, key: &QueryKey) -> Option<EntryStatus> {
    self
      .entries()
      .get(&key.cache_hash())
      .map(|entry| match entry.state {
        EntryState::Loading { .. } => EntryStatus::Loading,
        EntryState::Ready { stale: false, .. } => EntryStatus::Fresh,
        EntryState::Ready { stale: true, .. } => EntryStatus::Stale,
      })
  }

  /// Last server response stored for `key`, fresh or stale.
  #[cfg(test)]
  pub fn cached(&self, key: &QueryKey) -> Option<Value> {
    match self.entries().get(&key.cache_hash()).map(|e| &e.state) {
      Some(EntryState::Ready { data, .. }) => Some(data.clone()),
      _ => None,
    }
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries().len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
