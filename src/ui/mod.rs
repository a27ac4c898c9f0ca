pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::api::ApiClient;
use crate::app::App;
use crate::cache::QueryCache;
use crate::records::{Office, Record, Shift};
use crate::resource::ResourceApi;
use ratatui::prelude::*;
use ratatui::widgets::TableState;
use std::time::{Duration, Instant};
use view::View;
use views::{LoginView, ResourceListView};

/// How long a notification stays in the footer
const FLASH_TTL: Duration = Duration::from_secs(4);

/// Everything a view needs to talk to the backend, shared by all views
#[derive(Clone)]
pub struct AppContext {
  pub client: ApiClient,
  pub cache: QueryCache,
  pub page_size: usize,
  pub login_email: Option<String>,
}

impl AppContext {
  pub fn resource<R: Record>(&self) -> ResourceApi<R> {
    ResourceApi::new(R::RESOURCE, self.client.clone(), self.cache.clone())
  }

  /// Landing view after login
  pub fn dashboard(&self) -> Box<dyn View> {
    self.offices()
  }

  pub fn offices(&self) -> Box<dyn View> {
    Box::new(ResourceListView::<Office>::new(self.clone()))
  }

  pub fn shifts(&self) -> Box<dyn View> {
    Box::new(ResourceListView::<Shift>::new(self.clone()))
  }

  pub fn login(&self) -> Box<dyn View> {
    Box::new(LoginView::new(self.clone()))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
  Success,
  Error,
}

/// Short-lived status line notification
#[derive(Debug, Clone)]
pub struct Flash {
  pub message: String,
  pub kind: FlashKind,
  pub shown_at: Instant,
}

impl Flash {
  pub fn success(message: impl Into<String>) -> Self {
    Self::new(message.into(), FlashKind::Success)
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(message.into(), FlashKind::Error)
  }

  fn new(message: String, kind: FlashKind) -> Self {
    Self {
      message,
      kind,
      shown_at: Instant::now(),
    }
  }

  pub fn is_visible(&self) -> bool {
    self.shown_at.elapsed() < FLASH_TTL
  }
}

/// Clamp a table selection to `len` rows, selecting the first row when
/// nothing is selected
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    Some(_) => {}
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app.title(), &app.shortcuts());

  app.render_view(frame, chunks[1]);

  let flash = app.flash();
  renderfns::draw_footer(frame, chunks[2], &app.view_breadcrumb(), flash.as_ref());
}
