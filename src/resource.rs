//! Generic data access for one backend collection.

use crate::api::{ApiClient, ApiError, Page, RecordId, RequestConfig};
use crate::cache::{CacheResult, QueryCache, QueryKey, QueryParams};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// List/create/update/delete for the collection at `/{name}`.
///
/// Reads go through the shared [`QueryCache`]; every successful write marks
/// all cached lists of this collection stale, whatever params they were
/// fetched with. Failed writes leave the cache alone.
pub struct ResourceApi<T> {
  name: Arc<str>,
  client: ApiClient,
  cache: QueryCache,
  _record: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceApi<T> {
  fn clone(&self) -> Self {
    Self {
      name: Arc::clone(&self.name),
      client: self.client.clone(),
      cache: self.cache.clone(),
      _record: PhantomData,
    }
  }
}

impl<T> ResourceApi<T>
where
  T: Serialize + DeserializeOwned + Send + 'static,
{
  pub fn new(name: impl Into<String>, client: ApiClient, cache: QueryCache) -> Self {
    Self {
      name: Arc::from(name.into()),
      client,
      cache,
      _record: PhantomData,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Cache key a `fetch_all(params)` call reads and writes.
  pub fn key(&self, params: QueryParams) -> QueryKey {
    QueryKey::new(self.name.as_ref(), params)
  }

  fn collection_url(&self) -> Url {
    self.client.endpoint(&[self.name.as_ref()])
  }

  fn item_url(&self, id: &RecordId) -> Url {
    self.client.endpoint(&[self.name.as_ref(), id.as_str()])
  }

  /// `GET /{name}?{params}`, served from the cache when fresh.
  ///
  /// A body that does not decode as a page of `T` fails the fetch, so the
  /// entry is dropped instead of cached.
  pub async fn fetch_all(&self, params: QueryParams) -> Result<CacheResult<Page<T>>, ApiError> {
    let key = self.key(params);
    let client = self.client.clone();
    let url = self.collection_url();
    let config = RequestConfig::new().with_query(key.params().clone());
    let name = Arc::clone(&self.name);
    debug!(%key, status = ?self.cache.peek(&key), "list requested");

    let result = self
      .cache
      .fetch(&key, move || async move {
        let body = client.send(Method::GET, url, None, Some(&config)).await?;
        decode_page::<T>(&name, &body)?;
        Ok(body)
      })
      .await?;

    result.try_map(|body| decode_page(&self.name, &body))
  }

  /// Mark every cached list of this collection stale.
  pub fn invalidate(&self) -> usize {
    self.cache.invalidate(&self.name)
  }

  /// `POST /{name}`
  pub async fn create(&self, payload: &T) -> Result<Value, ApiError> {
    let body = encode(payload)?;
    self
      .mutate(Method::POST, self.collection_url(), Some(body))
      .await
  }

  /// `PUT /{name}/{id}`
  pub async fn update(&self, id: &RecordId, payload: &T) -> Result<Value, ApiError> {
    let body = encode(payload)?;
    self.mutate(Method::PUT, self.item_url(id), Some(body)).await
  }

  /// `DELETE /{name}/{id}`
  pub async fn delete(&self, id: &RecordId) -> Result<Value, ApiError> {
    self.mutate(Method::DELETE, self.item_url(id), None).await
  }

  async fn mutate(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, ApiError> {
    let response = self
      .client
      .send(method.clone(), url, body.as_ref(), None)
      .await?;

    let touched = self.cache.invalidate(&self.name);
    info!(resource = %self.name, %method, invalidated = touched, "write succeeded");
    Ok(response)
  }
}

fn decode_page<T: DeserializeOwned>(name: &str, body: &Value) -> Result<Page<T>, ApiError> {
  Page::<T>::deserialize(body).map_err(|e| {
    warn!(resource = name, error = %e, "undecodable list response");
    ApiError::raw(None, format!("unexpected {} list response: {}", name, e))
  })
}

fn encode<T: Serialize>(payload: &T) -> Result<Value, ApiError> {
  serde_json::to_value(payload)
    .map_err(|e| ApiError::raw(None, format!("failed to encode payload: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{query_params, CacheSource, EntryStatus};
  use crate::records::Office;
  use crate::testing::{Hits, MockBackend};
  use axum::extract::{Path, RawQuery, State};
  use axum::http::StatusCode;
  use axum::routing::{get, put};
  use axum::{Json, Router};
  use serde_json::json;
  use std::sync::Mutex;
  use std::time::Duration;

  #[derive(Clone, Default)]
  struct Backend {
    hits: Hits,
    queries: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
  }

  fn office_page() -> Value {
    json!({
      "data": [{"id": "1", "name": "HQ", "latitude": 1.0, "longitude": 2.0, "radius": 50}],
      "pagination": {"totalItems": 1, "totalPages": 1}
    })
  }

  async fn list(State(b): State<Backend>, RawQuery(query): RawQuery) -> Json<Value> {
    b.hits.record("GET /offices");
    b.queries.lock().unwrap().push(query.unwrap_or_default());
    tokio::time::sleep(Duration::from_millis(20)).await;
    Json(office_page())
  }

  async fn create(State(b): State<Backend>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    b.hits.record("POST /offices");
    if body["name"] == "" {
      return (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"message": "Name is required"})),
      );
    }
    b.bodies.lock().unwrap().push(body.clone());
    let mut created = body;
    created["id"] = json!("2");
    (StatusCode::CREATED, Json(created))
  }

  async fn update(
    State(b): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
  ) -> Json<Value> {
    b.hits.record(&format!("PUT /offices/{}", id));
    b.bodies.lock().unwrap().push(body.clone());
    Json(body)
  }

  async fn remove(State(b): State<Backend>, Path(id): Path<String>) -> StatusCode {
    b.hits.record(&format!("DELETE /offices/{}", id));
    StatusCode::NO_CONTENT
  }

  async fn start() -> (MockBackend, Backend, ResourceApi<Office>, QueryCache) {
    let state = Backend::default();
    let router = Router::new()
      .route("/offices", get(list).post(create))
      .route("/offices/:id", put(update).delete(remove))
      .with_state(state.clone());
    let backend = MockBackend::start(router).await;
    let cache = QueryCache::new();
    let offices = ResourceApi::new("offices", backend.client(), cache.clone());
    (backend, state, offices, cache)
  }

  fn hq() -> Office {
    Office {
      id: None,
      name: "HQ".to_string(),
      latitude: 1.0,
      longitude: 2.0,
      radius: 50.0,
    }
  }

  fn first_page() -> QueryParams {
    query_params([("page", 1), ("limit", 10)])
  }

  #[tokio::test]
  async fn test_fetch_all_populates_cache_with_payload() {
    let (_backend, state, offices, cache) = start().await;

    let result = offices.fetch_all(first_page()).await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.data.len(), 1);
    assert_eq!(result.data.data[0].id, Some(RecordId::from("1")));
    assert_eq!(result.data.data[0].name, "HQ");
    assert_eq!(result.data.pagination.total_items, 1);

    let key = QueryKey::new("offices", query_params([("limit", 10), ("page", 1)]));
    assert_eq!(cache.peek(&key), Some(EntryStatus::Fresh));
    assert_eq!(cache.cached(&key), Some(office_page()));
    assert_eq!(state.queries.lock().unwrap().as_slice(), ["limit=10&page=1"]);
  }

  #[tokio::test]
  async fn test_repeat_fetch_all_hits_cache() {
    let (_backend, state, offices, _cache) = start().await;

    offices.fetch_all(first_page()).await.unwrap();
    let again = offices.fetch_all(first_page()).await.unwrap();
    assert_eq!(again.source, CacheSource::Cache);
    assert_eq!(state.hits.get("GET /offices"), 1);
  }

  #[tokio::test]
  async fn test_concurrent_fetch_all_makes_one_call() {
    let (_backend, state, offices, _cache) = start().await;

    let (a, b) = tokio::join!(offices.fetch_all(first_page()), offices.fetch_all(first_page()));
    assert_eq!(a.unwrap().data, b.unwrap().data);
    assert_eq!(state.hits.get("GET /offices"), 1);
  }

  #[tokio::test]
  async fn test_create_then_fetch_all_refetches() {
    let (_backend, state, offices, cache) = start().await;

    offices.fetch_all(first_page()).await.unwrap();
    let created = offices.create(&hq()).await.unwrap();
    assert_eq!(created["id"], "2");
    assert_eq!(cache.peek(&offices.key(first_page())), Some(EntryStatus::Stale));

    let refetched = offices.fetch_all(first_page()).await.unwrap();
    assert_eq!(refetched.source, CacheSource::Network);
    assert_eq!(state.hits.get("GET /offices"), 2);

    // Unassigned id is not sent
    let sent = state.bodies.lock().unwrap()[0].clone();
    assert_eq!(
      sent,
      json!({"name": "HQ", "latitude": 1.0, "longitude": 2.0, "radius": 50.0})
    );
  }

  #[tokio::test]
  async fn test_update_and_delete_invalidate_every_page() {
    let (_backend, state, offices, cache) = start().await;
    let page_one = first_page();
    let page_two = query_params([("page", 2), ("limit", 10)]);
    let searched = query_params([("page", "1"), ("limit", "10"), ("keyword", "hq")]);

    for params in [&page_one, &page_two, &searched] {
      offices.fetch_all(params.clone()).await.unwrap();
    }

    offices.update(&RecordId::from("1"), &hq()).await.unwrap();
    assert_eq!(state.hits.get("PUT /offices/1"), 1);
    for params in [&page_one, &page_two, &searched] {
      assert_eq!(cache.peek(&offices.key(params.clone())), Some(EntryStatus::Stale));
    }

    for params in [&page_one, &page_two, &searched] {
      offices.fetch_all(params.clone()).await.unwrap();
    }
    offices.delete(&RecordId::from(1u64)).await.unwrap();
    assert_eq!(state.hits.get("DELETE /offices/1"), 1);
    for params in [&page_one, &page_two, &searched] {
      assert_eq!(cache.peek(&offices.key(params.clone())), Some(EntryStatus::Stale));
    }
  }

  #[tokio::test]
  async fn test_failed_create_keeps_cache_and_propagates_error() {
    let (_backend, _state, offices, cache) = start().await;
    offices.fetch_all(first_page()).await.unwrap();

    let invalid = Office {
      name: String::new(),
      ..hq()
    };
    let err = offices.create(&invalid).await.unwrap_err();
    assert_eq!(err.message(), "Name is required");
    assert_eq!(err.status(), Some(reqwest::StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(cache.peek(&offices.key(first_page())), Some(EntryStatus::Fresh));
  }

  #[tokio::test]
  async fn test_undecodable_list_is_not_cached() {
    let hits = Hits::default();
    let router = Router::new()
      .route(
        "/offices",
        get(|State(hits): State<Hits>| async move {
          hits.record("GET /offices");
          if hits.get("GET /offices") == 1 {
            // Rows missing their coordinates, no pagination
            Json(json!({"data": [{"id": "1", "name": "HQ"}]}))
          } else {
            Json(office_page())
          }
        }),
      )
      .with_state(hits.clone());
    let backend = MockBackend::start(router).await;
    let cache = QueryCache::new();
    let offices: ResourceApi<Office> = ResourceApi::new("offices", backend.client(), cache.clone());

    let err = offices.fetch_all(first_page()).await.unwrap_err();
    assert!(!err.is_structured());
    assert_eq!(err.message(), crate::api::error::FALLBACK_MESSAGE);
    assert_eq!(cache.peek(&offices.key(first_page())), None);

    let retried = offices.fetch_all(first_page()).await.unwrap();
    assert_eq!(retried.source, CacheSource::Network);
    assert_eq!(retried.data.data[0].name, "HQ");
    assert_eq!(hits.get("GET /offices"), 2);
    assert_eq!(cache.peek(&offices.key(first_page())), Some(EntryStatus::Fresh));
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let (_backend, state, offices, _cache) = start().await;

    offices.fetch_all(first_page()).await.unwrap();
    assert_eq!(offices.invalidate(), 1);
    let again = offices.fetch_all(first_page()).await.unwrap();
    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(state.hits.get("GET /offices"), 2);
  }

  #[tokio::test]
  async fn test_other_resources_are_untouched() {
    let (backend, _state, offices, cache) = start().await;
    let shifts: ResourceApi<Value> = ResourceApi::new("shifts", backend.client(), cache.clone());
    let shift_key = shifts.key(first_page());

    cache
      .fetch(&shift_key, || async { Ok(json!({"data": []})) })
      .await
      .unwrap();
    offices.create(&hq()).await.unwrap();

    assert_eq!(cache.peek(&shift_key), Some(EntryStatus::Fresh));
  }
}
