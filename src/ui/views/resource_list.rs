use crate::api::{Page, RecordId};
use crate::cache::QueryParams;
use crate::config::PAGE_SIZES;
use crate::query::{Mutation, Query, QueryState};
use crate::records::Record;
use crate::resource::ResourceApi;
use crate::ui::components::{
  ConfirmDialog, FormEvent, KeyResult, RecordForm, SearchEvent, SearchInput,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{AppContext, Flash};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
  Create,
  Update,
  Delete,
}

impl WriteKind {
  fn done(self) -> &'static str {
    match self {
      WriteKind::Create => "added",
      WriteKind::Update => "updated",
      WriteKind::Delete => "deleted",
    }
  }

  fn verb(self) -> &'static str {
    match self {
      WriteKind::Create | WriteKind::Update => "save",
      WriteKind::Delete => "delete",
    }
  }
}

enum Modal<R> {
  Form {
    form: RecordForm,
    /// Record being edited; `None` when adding
    editing: Option<R>,
  },
  ConfirmDelete {
    dialog: ConfirmDialog,
    id: RecordId,
  },
}

/// Paginated, searchable table of one record type with add/edit/delete.
pub struct ResourceListView<R: Record> {
  api: ResourceApi<R>,
  page: u64,
  page_size: usize,
  keyword: String,
  query: Query<Page<R>>,
  /// Last page that loaded, kept on screen while the next one loads
  current: Option<Page<R>>,
  table_state: TableState,
  search: SearchInput,
  modal: Option<Modal<R>>,
  write: Mutation<Value>,
  write_kind: Option<WriteKind>,
  flash: Option<Flash>,
}

impl<R: Record> ResourceListView<R> {
  pub fn new(context: AppContext) -> Self {
    let api = context.resource::<R>();
    let page_size = context.page_size;
    let mut view = Self {
      query: Self::build_query(&api, Self::params_for(1, page_size, "")),
      api,
      page: 1,
      page_size,
      keyword: String::new(),
      current: None,
      table_state: TableState::default(),
      search: SearchInput::new(),
      modal: None,
      write: Mutation::new(),
      write_kind: None,
      flash: None,
    };
    view.query.fetch();
    view
  }

  fn plural() -> String {
    format!("{}s", R::LABEL)
  }

  fn params_for(page: u64, page_size: usize, keyword: &str) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("page".to_string(), page.to_string());
    params.insert("limit".to_string(), page_size.to_string());
    if !keyword.is_empty() {
      params.insert("keyword".to_string(), keyword.to_string());
    }
    params
  }

  fn build_query(api: &ResourceApi<R>, params: QueryParams) -> Query<Page<R>> {
    let api = api.clone();
    Query::new(move || {
      let api = api.clone();
      let params = params.clone();
      async move { api.fetch_all(params).await.map(|result| result.data) }
    })
  }

  /// Fetch the current page/size/keyword, replacing any pending fetch
  fn reload(&mut self) {
    let params = Self::params_for(self.page, self.page_size, &self.keyword);
    debug!(resource = R::RESOURCE, ?params, "loading page");
    self.query = Self::build_query(&self.api, params);
    self.query.fetch();
  }

  fn rows(&self) -> &[R] {
    self.current.as_ref().map(|p| p.data.as_slice()).unwrap_or(&[])
  }

  fn page_count(&self) -> u64 {
    self
      .current
      .as_ref()
      .map(|p| p.page_count(self.page_size as u64))
      .unwrap_or(1)
  }

  fn selected(&self) -> Option<&R> {
    self.table_state.selected().and_then(|i| self.rows().get(i))
  }

  fn next_page_size(&self) -> usize {
    let at = PAGE_SIZES.iter().position(|&s| s == self.page_size);
    match at {
      Some(i) => PAGE_SIZES[(i + 1) % PAGE_SIZES.len()],
      None => PAGE_SIZES[0],
    }
  }

  // ==========================================================================
  // Writes
  // ==========================================================================

  fn open_add(&mut self) {
    let form = RecordForm::add(format!("Add {}", R::LABEL), R::form_fields());
    self.modal = Some(Modal::Form {
      form,
      editing: None,
    });
  }

  fn open_edit(&mut self) {
    let Some(record) = self.selected().cloned() else {
      return;
    };
    let form = RecordForm::edit(
      format!("Edit {}", R::LABEL),
      R::form_fields(),
      record.form_values(),
    );
    self.modal = Some(Modal::Form {
      form,
      editing: Some(record),
    });
  }

  fn open_delete(&mut self) {
    let Some(id) = self.selected().and_then(|r| r.id().cloned()) else {
      return;
    };
    let dialog = ConfirmDialog::new(
      format!("Delete {}", R::LABEL),
      format!("Are you sure you want to delete this {}?", R::LABEL.to_lowercase()),
    );
    self.modal = Some(Modal::ConfirmDelete { dialog, id });
  }

  fn form_mut(&mut self) -> Option<&mut RecordForm> {
    match &mut self.modal {
      Some(Modal::Form { form, .. }) => Some(form),
      _ => None,
    }
  }

  fn submit_form(&mut self, values: Vec<String>) {
    let editing = match &self.modal {
      Some(Modal::Form { editing, .. }) => editing.clone(),
      _ => return,
    };

    let record = match R::from_form(&values, editing.as_ref()) {
      Ok(record) => record,
      Err(message) => {
        if let Some(form) = self.form_mut() {
          form.set_error(message);
        }
        return;
      }
    };

    let api = self.api.clone();
    let (kind, started) = match editing {
      Some(existing) => {
        let Some(id) = existing.id().cloned() else {
          if let Some(form) = self.form_mut() {
            form.set_error(format!("This {} has no id", R::LABEL.to_lowercase()));
          }
          return;
        };
        let started = self
          .write
          .mutate(async move { api.update(&id, &record).await });
        (WriteKind::Update, started)
      }
      None => {
        let started = self
          .write
          .mutate(async move { api.create(&record).await });
        (WriteKind::Create, started)
      }
    };

    if started {
      self.write_kind = Some(kind);
      if let Some(form) = self.form_mut() {
        form.set_saving();
      }
    }
  }

  fn start_delete(&mut self, id: RecordId) {
    let api = self.api.clone();
    if self.write.mutate(async move { api.delete(&id).await }) {
      self.write_kind = Some(WriteKind::Delete);
    }
  }

  fn settle_write(&mut self) {
    let Some(kind) = self.write_kind.take() else {
      self.write.reset();
      return;
    };

    match self.write.state().clone() {
      QueryState::Success(_) => {
        self.flash = Some(Flash::success(format!(
          "{} {} successfully",
          R::LABEL,
          kind.done()
        )));
        self.modal = None;
        // Deleting the only row of a later page would leave it empty
        if kind == WriteKind::Delete && self.rows().len() == 1 && self.page > 1 {
          self.page -= 1;
        }
        self.reload();
      }
      QueryState::Error(message) => {
        let message = format!(
          "Failed to {} {}: {}",
          kind.verb(),
          R::LABEL.to_lowercase(),
          message
        );
        if let Some(form) = self.form_mut() {
          form.set_error(message.clone());
        }
        self.flash = Some(Flash::error(message));
      }
      QueryState::Idle | QueryState::Loading => {}
    }
    self.write.reset();
  }

  // ==========================================================================
  // Keys
  // ==========================================================================

  fn handle_modal(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.modal.as_mut()? {
      Modal::Form { form, .. } => match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => self.submit_form(values),
        KeyResult::Event(FormEvent::Cancelled) => self.modal = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      },
      Modal::ConfirmDelete { dialog, id } => match dialog.handle_key(key) {
        KeyResult::Event(true) => {
          let id = id.clone();
          self.modal = None;
          self.start_delete(id);
        }
        KeyResult::Event(false) => self.modal = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      },
    }
    Some(ViewAction::None)
  }

  fn handle_search(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.search.handle_key(key, &self.keyword) {
      KeyResult::Event(SearchEvent::Submitted(keyword)) => {
        if keyword != self.keyword {
          self.keyword = keyword;
          self.page = 1;
          self.reload();
        }
        Some(ViewAction::None)
      }
      KeyResult::Event(SearchEvent::Cancelled) | KeyResult::Handled => Some(ViewAction::None),
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('n') | KeyCode::Right => {
        if self.page < self.page_count() {
          self.page += 1;
          self.reload();
        }
      }
      KeyCode::Char('p') | KeyCode::Left => {
        if self.page > 1 {
          self.page -= 1;
          self.reload();
        }
      }
      KeyCode::Char('s') => {
        self.page_size = self.next_page_size();
        self.page = 1;
        self.reload();
      }
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        self.api.invalidate();
        self.query.refetch();
      }
      KeyCode::Char('a') => self.open_add(),
      KeyCode::Char('e') | KeyCode::Enter => self.open_edit(),
      KeyCode::Char('d') | KeyCode::Delete => self.open_delete(),
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }

  // ==========================================================================
  // Rendering
  // ==========================================================================

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.rows().len();
    ensure_valid_selection(&mut self.table_state, len);

    let total = self
      .current
      .as_ref()
      .map(|p| p.pagination.total_items)
      .unwrap_or(0);
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} (loading...) ", Self::plural()),
      QueryState::Error(e) => format!(" {} (error: {}) ", Self::plural(), e),
      _ => format!(" {} ({}) ", Self::plural(), total),
    };

    let mut footer = format!(
      " page {}/{} · {} per page ",
      self.page,
      self.page_count(),
      self.page_size
    );
    if !self.keyword.is_empty() {
      footer.push_str(&format!("· search: {} ", self.keyword));
    }

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .title_bottom(Line::from(footer).right_aligned())
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.rows().is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        format!("Failed to load {}. Press 'r' to retry.", R::RESOURCE)
      } else if !self.keyword.is_empty() {
        format!("No {} match \"{}\".", R::RESOURCE, self.keyword)
      } else {
        format!("No {} yet. Press 'a' to add one.", R::RESOURCE)
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let columns = R::columns();
    let header = Row::new(
      columns
        .iter()
        .map(|c| Cell::from(c.title).style(Style::default().fg(Color::Yellow).bold())),
    );

    let rows: Vec<Row> = self
      .rows()
      .iter()
      .map(|record| {
        Row::new(
          record
            .cells()
            .into_iter()
            .zip(columns)
            .map(|(text, column)| Cell::from(truncate(&text, column.width as usize))),
        )
      })
      .collect();

    let widths: Vec<Constraint> = columns
      .iter()
      .map(|c| Constraint::Length(c.width))
      .collect();

    let table = Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

impl<R: Record> View for ResourceListView<R> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_modal(key)
      .or_else(|| self.handle_search(key))
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
    self.search.render_overlay(frame, area);
    match &self.modal {
      Some(Modal::Form { form, .. }) => form.render(frame, area),
      Some(Modal::ConfirmDelete { dialog, .. }) => dialog.render(frame, area),
      None => {}
    }
  }

  fn breadcrumb_label(&self) -> String {
    Self::plural()
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.poll() {
      match self.query.state().clone() {
        QueryState::Success(page) => {
          let count = page.page_count(self.page_size as u64);
          self.current = Some(page);
          let len = self.rows().len();
          ensure_valid_selection(&mut self.table_state, len);
          // The page we asked for no longer exists (rows were removed)
          if self.page > count {
            self.page = count;
            self.reload();
          }
        }
        QueryState::Error(message) => {
          self.flash = Some(Flash::error(format!(
            "Failed to load {}: {}",
            R::RESOURCE,
            message
          )));
        }
        QueryState::Idle | QueryState::Loading => {}
      }
    }

    if self.write.poll() {
      self.settle_write();
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.modal.is_some()
  }

  fn flash(&self) -> Option<&Flash> {
    self.flash.as_ref().filter(|f| f.is_visible())
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("a", "add").with_priority(20),
      ShortcutInfo::new("e", "edit").with_priority(21),
      ShortcutInfo::new("d", "delete").with_priority(22),
      ShortcutInfo::new("/", "search").with_priority(30),
      ShortcutInfo::new("n/p", "page").with_priority(40),
      ShortcutInfo::new("s", "page size").with_priority(41),
      ShortcutInfo::new("r", "refresh").with_priority(50),
    ]
  }
}
