//! Imperative request handle with observable state, used for login and logout.

use crate::api::{ApiClient, ApiError, RequestConfig};
use crate::query::QueryState;
use reqwest::Method;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct RequestSlot {
  state: QueryState<Value>,
  /// Body of the last successful call, kept across later failures
  last_data: Option<Value>,
}

/// One logical request at a time, with its state readable from anywhere.
///
/// Clones share state, so a view can hand a clone to a spawned task and
/// render from the original. Overlapping calls are not coordinated: whichever
/// settles last decides the final state.
#[derive(Clone)]
pub struct ApiRequest {
  client: ApiClient,
  slot: Arc<Mutex<RequestSlot>>,
}

impl ApiRequest {
  pub fn new(client: ApiClient) -> Self {
    Self {
      client,
      slot: Arc::new(Mutex::new(RequestSlot::default())),
    }
  }

  fn slot(&self) -> MutexGuard<'_, RequestSlot> {
    lock(&self.slot)
  }

  pub fn state(&self) -> QueryState<Value> {
    self.slot().state.clone()
  }

  pub fn is_loading(&self) -> bool {
    self.slot().state.is_loading()
  }

  pub fn error(&self) -> Option<String> {
    self.slot().state.error().map(String::from)
  }

  /// Body of the most recent successful call.
  pub fn data(&self) -> Option<Value> {
    self.slot().last_data.clone()
  }

  /// Back to `Idle`, forgetting any error.
  pub fn reset(&self) {
    self.slot().state = QueryState::Idle;
  }

  /// Run one request, tracking it in this handle's state.
  ///
  /// The error returned is the same one recorded (as its message) in the state.
  pub async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    config: Option<RequestConfig>,
  ) -> Result<Value, ApiError> {
    let in_flight = InFlight::begin(&self.slot);

    let result = self
      .client
      .request(method, path, body.as_ref(), config.as_ref())
      .await;

    match &result {
      Ok(data) => in_flight.succeed(data.clone()),
      Err(e) => in_flight.fail(e.message().to_string()),
    }
    result
  }
}

fn lock(slot: &Mutex<RequestSlot>) -> MutexGuard<'_, RequestSlot> {
  slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the slot Loading for its lifetime.
///
/// If dropped without settling (the request future was dropped), a slot
/// still showing Loading goes back to Idle.
struct InFlight<'a> {
  slot: &'a Mutex<RequestSlot>,
  settled: bool,
}

impl<'a> InFlight<'a> {
  fn begin(slot: &'a Mutex<RequestSlot>) -> Self {
    lock(slot).state = QueryState::Loading;
    Self {
      slot,
      settled: false,
    }
  }

  fn succeed(mut self, data: Value) {
    let mut slot = lock(self.slot);
    slot.last_data = Some(data.clone());
    slot.state = QueryState::Success(data);
    self.settled = true;
  }

  fn fail(mut self, message: String) {
    lock(self.slot).state = QueryState::Error(message);
    self.settled = true;
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if self.settled {
      return;
    }
    let mut slot = lock(self.slot);
    if slot.state.is_loading() {
      slot.state = QueryState::Idle;
    }
  }
}
