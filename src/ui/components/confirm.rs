use super::KeyResult;
use crate::ui::renderfns::centered_rect;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Yes/no prompt. Emits `true` on y/Enter, `false` on n/Esc.
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
  title: String,
  message: String,
}

impl ConfirmDialog {
  pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      message: message.into(),
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<bool> {
    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => KeyResult::Event(true),
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => KeyResult::Event(false),
      _ => KeyResult::Handled,
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let modal = centered_rect(area, 50, 6);
    frame.render_widget(Clear, modal);

    let block = Block::default()
      .title(format!(" {} ", self.title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red));

    let lines = vec![
      Line::raw(self.message.clone()),
      Line::raw(""),
      Line::from(vec![
        Span::styled("<y>", Style::default().fg(Color::Cyan)),
        Span::styled(" yes   ", Style::default().fg(Color::DarkGray)),
        Span::styled("<n>", Style::default().fg(Color::Cyan)),
        Span::styled(" no", Style::default().fg(Color::DarkGray)),
      ]),
    ];

    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      modal,
    );
  }
}
