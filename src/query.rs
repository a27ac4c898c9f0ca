//! View-side handles for async data: `Query<T>` for reads, `Mutation<T>` for writes.
//!
//! Inspired by TanStack Query. Both spawn their future on the runtime and
//! hand the result back over a channel that the owning view drains on each
//! tick. Dropping a handle (or refetching) only stops the result from being
//! applied; the request itself keeps running.
//!
//! # Example
//!
//! ```ignore
//! let offices = offices_api.clone();
//! let mut query = Query::new(move || {
//!     let offices = offices.clone();
//!     async move { offices.fetch_all(params).await.map(|r| r.data) }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use crate::api::ApiError;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// The state of a query or request
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Nothing has been started
  Idle,
  /// Waiting for the backend
  Loading,
  /// Completed successfully
  Success(T),
  /// Failed with a displayable message
  Error(String),
}

impl<T> Default for QueryState<T> {
  fn default() -> Self {
    QueryState::Idle
  }
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Spawn `future` and return the receiving end for its result.
fn spawn_settle<T, Fut>(future: Fut) -> mpsc::UnboundedReceiver<Result<T, ApiError>>
where
  T: Send + 'static,
  Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
  let (tx, rx) = mpsc::unbounded_channel();
  tokio::spawn(async move {
    // Receiver may have been dropped
    let _ = tx.send(future.await);
  });
  rx
}

/// Drain a settle channel into `state`. Returns `true` if the state changed.
fn drain<T>(
  receiver: &mut Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
  state: &mut QueryState<T>,
) -> bool {
  let rx = match receiver {
    Some(rx) => rx,
    None => return false,
  };

  match rx.try_recv() {
    Ok(Ok(data)) => {
      *state = QueryState::Success(data);
      *receiver = None;
      true
    }
    Ok(Err(error)) => {
      *state = QueryState::Error(error.message().to_string());
      *receiver = None;
      true
    }
    Err(mpsc::error::TryRecvError::Empty) => false,
    Err(mpsc::error::TryRecvError::Disconnected) => {
      *state = QueryState::Error("Request was cancelled".to_string());
      *receiver = None;
      true
    }
  }
}

/// Async read with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure, re-run on refetch)
/// - Loading/success/error states
/// - Async result handling via channels
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called each time `fetch()` or `refetch()` starts a request.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already loading.
  ///
  /// A pending result is discarded rather than cancelled.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  pub fn poll(&mut self) -> bool {
    drain(&mut self.receiver, &mut self.state)
  }

  fn start_fetch(&mut self) {
    self.state = QueryState::Loading;
    self.receiver = Some(spawn_settle((self.fetcher)()));
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

/// Async write with state management.
///
/// Unlike a query, each call supplies its own future; one write at a time.
#[derive(Debug)]
pub struct Mutation<T> {
  state: QueryState<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
}

impl<T> Default for Mutation<T> {
  fn default() -> Self {
    Self {
      state: QueryState::Idle,
      receiver: None,
    }
  }
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Start a write. Returns `false` (and drops `future`) if one is already running.
  pub fn mutate<Fut>(&mut self, future: Fut) -> bool
  where
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if self.state.is_loading() {
      return false;
    }
    self.state = QueryState::Loading;
    self.receiver = Some(spawn_settle(future));
    true
  }

  /// Returns `true` exactly once, when the running write settles.
  pub fn poll(&mut self) -> bool {
    drain(&mut self.receiver, &mut self.state)
  }

  pub fn reset(&mut self) {
    self.state = QueryState::Idle;
    self.receiver = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error_uses_display_message() {
    let mut query: Query<i32> = Query::new(|| async {
      Err(ApiError::Structured {
        status: reqwest::StatusCode::FORBIDDEN,
        message: "Forbidden".to_string(),
      })
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Forbidden"));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(42)
      }
    });

    query.fetch();
    query.fetch();
    assert!(query.is_loading());
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_discards_pending() {
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(n)
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch's result is applied
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_mutation_settles_once() {
    let mut mutation = Mutation::new();
    assert!(mutation.mutate(async { Ok("saved") }));
    assert!(mutation.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(mutation.poll());
    assert_eq!(mutation.state(), &QueryState::Success("saved"));
    assert!(!mutation.poll());
  }

  #[tokio::test]
  async fn test_mutation_rejects_overlapping_writes() {
    let mut mutation: Mutation<()> = Mutation::new();
    assert!(mutation.mutate(async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(())
    }));
    assert!(!mutation.mutate(async { Ok(()) }));

    mutation.reset();
    assert_eq!(mutation.state(), &QueryState::Idle);
  }

  #[tokio::test]
  async fn test_mutation_error_message() {
    let mut mutation: Mutation<()> = Mutation::new();
    mutation.mutate(async { Err(ApiError::raw(None, "connection reset")) });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(mutation.poll());
    assert_eq!(
      mutation.state().error(),
      Some(crate::api::error::FALLBACK_MESSAGE)
    );
  }
}
