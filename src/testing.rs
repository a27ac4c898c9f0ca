//! Test helpers: an in-process fake backend on an ephemeral port.

use crate::api::ApiClient;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use url::Url;

pub struct MockBackend {
  pub base_url: Url,
  handle: JoinHandle<()>,
}

impl MockBackend {
  pub async fn start(router: Router) -> Self {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
      .await
      .expect("bind mock backend");
    let addr = listener.local_addr().expect("mock backend address");
    let handle = tokio::spawn(async move {
      let _ = axum::serve(listener, router).await;
    });

    Self {
      base_url: Url::parse(&format!("http://{}/", addr)).expect("mock backend url"),
      handle,
    }
  }

  pub fn client(&self) -> ApiClient {
    ApiClient::from_base_url(self.base_url.clone(), None).expect("mock backend client")
  }
}

impl Drop for MockBackend {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// A base URL nothing is listening on.
pub async fn unused_base_url() -> Url {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
    .await
    .expect("bind probe listener");
  let addr = listener.local_addr().expect("probe address");
  drop(listener);
  Url::parse(&format!("http://{}/", addr)).expect("unused url")
}

/// Per-route hit counter shared with mock handlers.
#[derive(Clone, Default)]
pub struct Hits(Arc<Mutex<HashMap<String, usize>>>);

impl Hits {
  pub fn record(&self, route: &str) {
    *self
      .0
      .lock()
      .expect("hits lock")
      .entry(route.to_string())
      .or_default() += 1;
  }

  pub fn get(&self, route: &str) -> usize {
    self
      .0
      .lock()
      .expect("hits lock")
      .get(route)
      .copied()
      .unwrap_or(0)
  }
}
