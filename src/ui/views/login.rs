use crate::api::auth::{check_auth, login};
use crate::api::types::LoginRequest;
use crate::query::{Query, QueryState};
use crate::request::ApiRequest;
use crate::ui::components::TextInput;
use crate::ui::renderfns::centered_rect;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::AppContext;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Email,
  Password,
  Remember,
}

impl Field {
  fn next(self) -> Self {
    match self {
      Field::Email => Field::Password,
      Field::Password => Field::Remember,
      Field::Remember => Field::Email,
    }
  }

  fn previous(self) -> Self {
    match self {
      Field::Email => Field::Remember,
      Field::Password => Field::Email,
      Field::Remember => Field::Password,
    }
  }
}

/// Email/password sign-in.
///
/// Also re-checks the session on open, so a still-valid cookie skips
/// straight to the dashboard.
pub struct LoginView {
  context: AppContext,
  email: TextInput,
  password: TextInput,
  remember: bool,
  focus: Field,
  request: ApiRequest,
  session: Query<bool>,
  /// Client-side validation message
  invalid: Option<&'static str>,
}

impl LoginView {
  pub fn new(context: AppContext) -> Self {
    let client = context.client.clone();
    let mut session = Query::new(move || {
      let client = client.clone();
      async move { Ok(check_auth(&client).await) }
    });
    session.fetch();

    let (email, focus) = match &context.login_email {
      Some(email) => (TextInput::with_value(email.clone()), Field::Password),
      None => (TextInput::new(), Field::Email),
    };

    Self {
      request: ApiRequest::new(context.client.clone()),
      context,
      email,
      password: TextInput::new(),
      remember: false,
      focus,
      session,
      invalid: None,
    }
  }

  fn submit(&mut self) {
    let email = self.email.value().trim().to_string();
    if email.is_empty() {
      self.invalid = Some("Please input your email!");
      self.focus = Field::Email;
      return;
    }
    if self.password.is_empty() {
      self.invalid = Some("Please input your password!");
      self.focus = Field::Password;
      return;
    }
    self.invalid = None;

    let credentials = LoginRequest {
      email,
      password: self.password.value().to_string(),
      remember: self.remember,
    };
    let request = self.request.clone();
    tokio::spawn(async move {
      if let Err(e) = login(&request, &credentials).await {
        warn!(error = %e, email = %credentials.email, "login failed");
      }
    });
  }

  fn field_line(&self, field: Field, label: &str, value: String) -> Vec<Line<'static>> {
    let focused = self.focus == field;
    let label_style = if focused {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    let mut value = vec![Span::raw("  "), Span::raw(value)];
    if focused {
      value.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    vec![
      Line::styled(label.to_string(), label_style),
      Line::from(value),
    ]
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.request.is_loading() {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
      KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.previous(),
      KeyCode::Enter => self.submit(),
      KeyCode::Char(' ') if self.focus == Field::Remember => self.remember = !self.remember,
      _ => {
        let input = match self.focus {
          Field::Email => &mut self.email,
          Field::Password => &mut self.password,
          Field::Remember => return ViewAction::None,
        };
        input.handle_key(key);
      }
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let modal = centered_rect(area, 50, 12);
    frame.render_widget(Clear, modal);

    let block = Block::default()
      .title(" Sign in ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let mut lines = Vec::new();
    lines.extend(self.field_line(Field::Email, "Email", self.email.value().to_string()));
    lines.extend(self.field_line(Field::Password, "Password", self.password.masked()));

    let check = if self.remember { "[x]" } else { "[ ]" };
    let remember_style = if self.focus == Field::Remember {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    lines.push(Line::styled(format!("{} Remember me", check), remember_style));
    lines.push(Line::raw(""));

    let status = match (self.invalid, self.request.state()) {
      (_, QueryState::Loading) => {
        Line::styled("Signing in...", Style::default().fg(Color::Yellow))
      }
      (Some(message), _) => Line::styled(message, Style::default().fg(Color::Red)),
      (None, QueryState::Error(message)) => Line::styled(message, Style::default().fg(Color::Red)),
      _ => Line::styled(
        "Enter: sign in  Tab: next field  Space: toggle",
        Style::default().fg(Color::DarkGray),
      ),
    };
    lines.push(status);

    frame.render_widget(Paragraph::new(lines).block(block), modal);
  }

  fn breadcrumb_label(&self) -> String {
    "Login".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.session.poll();
    if matches!(self.session.state(), QueryState::Success(true)) || self.request.state().is_success()
    {
      return ViewAction::Reset(self.context.dashboard());
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn requires_session(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "sign in").with_priority(10),
      ShortcutInfo::new("ctrl-c", "quit").with_priority(90),
    ]
  }
}
