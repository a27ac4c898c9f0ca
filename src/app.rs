use crate::api::auth;
use crate::commands::{Action, Command};
use crate::event::{Event, EventHandler};
use crate::request::ApiRequest;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::SplashView;
use crate::ui::{self, AppContext, Flash};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Main application state
pub struct App {
  context: AppContext,
  title: String,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` palette, available whenever the current view is not taking text
  command: CommandInput,

  /// Logout call; its state is polled on each tick
  logout: ApiRequest,
  logging_out: bool,

  /// App-level notification (commands, logout)
  flash: Option<Flash>,

  should_quit: bool,
}

impl App {
  /// Starts on the splash view, which routes to login or the dashboard.
  pub fn new(context: AppContext, title: String) -> Self {
    let splash: Box<dyn View> = Box::new(SplashView::new(context.clone()));
    Self::with_root(context, title, splash)
  }

  fn with_root(context: AppContext, title: String, root: Box<dyn View>) -> Self {
    Self {
      logout: ApiRequest::new(context.client.clone()),
      context,
      title,
      view_stack: vec![root],
      command: CommandInput::new(),
      logging_out: false,
      flash: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    info!("quitting");
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Resize => {}
    }
  }

  fn tick(&mut self) {
    if let Some(view) = self.view_stack.last_mut() {
      let action = view.tick();
      self.apply(action);
    }
    self.poll_logout();
  }

  fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let view_owns_keys = self.current_view().is_some_and(|v| v.captures_input());
    if self.command.is_active() || !view_owns_keys {
      self.command.set_signed_in(self.has_session());
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(command)) => {
          self.execute_command(command);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          if !input.is_empty() {
            self.flash = Some(Flash::error(format!("Unknown command: {}", input)));
          }
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Reset(view) => self.view_stack = vec![view],
    }
  }

  fn has_session(&self) -> bool {
    self.current_view().is_some_and(|v| v.requires_session())
  }

  fn execute_command(&mut self, command: &Command) {
    if command.needs_session && !self.has_session() {
      self.flash = Some(Flash::error("Sign in first"));
      return;
    }
    match command.action {
      Action::Quit => self.should_quit = true,
      Action::Offices => self.apply(ViewAction::Reset(self.context.offices())),
      Action::Shifts => self.apply(ViewAction::Reset(self.context.shifts())),
      Action::Logout => self.start_logout(),
    }
  }

  fn start_logout(&mut self) {
    if self.logging_out {
      return;
    }
    self.logging_out = true;
    let request = self.logout.clone();
    tokio::spawn(async move {
      if let Err(e) = auth::logout(&request).await {
        warn!(error = %e, "logout failed");
      }
    });
  }

  fn poll_logout(&mut self) {
    if !self.logging_out {
      return;
    }

    if self.logout.state().is_success() {
      // Nothing cached belongs to the next session
      self.context.cache.clear();
      self.view_stack = vec![self.context.login()];
      self.flash = Some(Flash::success("Logged out"));
    } else if let Some(message) = self.logout.error() {
      self.flash = Some(Flash::error(format!("Logout failed: {}", message)));
    } else {
      return;
    }

    self.logging_out = false;
    self.logout.reset();
  }

  // Accessors for UI rendering

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .current_view()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn render_view(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, area);
    }
    self.command.render_overlay(frame, area);
  }

  /// Newest visible notification, app-level or from the current view
  pub fn flash(&self) -> Option<Flash> {
    let own = self.flash.as_ref().filter(|f| f.is_visible());
    let view = self.current_view().and_then(|v| v.flash());
    match (own, view) {
      (Some(a), Some(b)) if a.shown_at >= b.shown_at => Some(a.clone()),
      (Some(_), Some(b)) => Some(b.clone()),
      (a, b) => a.or(b).cloned(),
    }
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    let mut crumbs: Vec<String> = self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect();
    if self.logging_out {
      crumbs.push("Logging out...".to_string());
    }
    crumbs
  }
}
