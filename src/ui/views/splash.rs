use crate::api::auth::check_auth;
use crate::query::{Query, QueryState};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::AppContext;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tracing::info;

/// Startup guard: checks the session once, then routes to the dashboard or login
pub struct SplashView {
  context: AppContext,
  session: Query<bool>,
}

impl SplashView {
  pub fn new(context: AppContext) -> Self {
    let client = context.client.clone();
    let mut session = Query::new(move || {
      let client = client.clone();
      async move { Ok(check_auth(&client).await) }
    });
    session.fetch();

    Self { context, session }
  }
}

impl View for SplashView {
  fn handle_key(&mut self, _key: KeyEvent) -> ViewAction {
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = Paragraph::new("Checking session...")
      .alignment(Alignment::Center)
      .style(Style::default().fg(Color::DarkGray))
      .block(block);
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Starting".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.session.poll();
    match self.session.state() {
      QueryState::Success(true) => {
        info!("existing session is valid");
        ViewAction::Reset(self.context.dashboard())
      }
      // check_auth never fails; anything else settled means no session
      QueryState::Success(false) | QueryState::Error(_) => {
        info!("no valid session, showing login");
        ViewAction::Reset(self.context.login())
      }
      QueryState::Idle | QueryState::Loading => ViewAction::None,
    }
  }

  fn requires_session(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![ShortcutInfo::new("ctrl-c", "quit")]
  }
}
