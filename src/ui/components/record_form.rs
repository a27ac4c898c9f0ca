use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::records::{FieldKind, FormField};
use crate::ui::renderfns::centered_rect;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Raw values, one per field
  Submitted(Vec<String>),
  Cancelled,
}

/// Modal add/edit form over a fixed list of fields.
///
/// Tab/Down and BackTab/Up move between fields, Enter submits, Esc cancels.
#[derive(Debug, Clone)]
pub struct RecordForm {
  title: String,
  fields: &'static [FormField],
  inputs: Vec<TextInput>,
  focus: usize,
  editing: bool,
  error: Option<String>,
  saving: bool,
}

impl RecordForm {
  /// Empty form for a new record
  pub fn add(title: impl Into<String>, fields: &'static [FormField]) -> Self {
    Self::build(title.into(), fields, vec![TextInput::new(); fields.len()], false)
  }

  /// Form prefilled with a record's current values
  pub fn edit(title: impl Into<String>, fields: &'static [FormField], values: Vec<String>) -> Self {
    let inputs = (0..fields.len())
      .map(|i| TextInput::with_value(values.get(i).cloned().unwrap_or_default()))
      .collect();
    Self::build(title.into(), fields, inputs, true)
  }

  fn build(
    title: String,
    fields: &'static [FormField],
    inputs: Vec<TextInput>,
    editing: bool,
  ) -> Self {
    Self {
      title,
      fields,
      inputs,
      focus: 0,
      editing,
      error: None,
      saving: false,
    }
  }

  pub fn is_editing(&self) -> bool {
    self.editing
  }

  /// Show a validation or server error under the fields
  pub fn set_error(&mut self, message: impl Into<String>) {
    self.error = Some(message.into());
    self.saving = false;
  }

  pub fn set_saving(&mut self) {
    self.error = None;
    self.saving = true;
  }

  pub fn values(&self) -> Vec<String> {
    self.inputs.iter().map(|i| i.value().to_string()).collect()
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if self.saving {
      // Input is frozen until the write settles
      return KeyResult::Handled;
    }

    let count = self.inputs.len();
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.focus = (self.focus + 1) % count.max(1);
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus = (self.focus + count.max(1) - 1) % count.max(1);
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(input) = self.inputs.get_mut(self.focus) else {
      return KeyResult::NotHandled;
    };
    match input.handle_key(key) {
      InputResult::Submitted(_) => KeyResult::Event(FormEvent::Submitted(self.values())),
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let height = self.fields.len() as u16 * 2 + 5;
    let modal = centered_rect(area, 60, height);

    frame.render_widget(Clear, modal);

    let block = Block::default()
      .title(format!(" {} ", self.title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));

    let mut lines = Vec::new();
    for (i, (field, input)) in self.fields.iter().zip(&self.inputs).enumerate() {
      let focused = i == self.focus;
      let label_style = if focused {
        Style::default().fg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::White)
      };
      let hint = match field.kind {
        FieldKind::Time => " (HH:MM)",
        _ => "",
      };
      lines.push(Line::from(vec![
        Span::styled(field.label, label_style),
        Span::styled(hint, Style::default().fg(Color::DarkGray)),
      ]));

      let mut value = vec![Span::raw("  "), Span::raw(input.value().to_string())];
      if focused {
        value.push(Span::styled("_", Style::default().fg(Color::Yellow)));
      }
      lines.push(Line::from(value));
    }

    lines.push(Line::raw(""));
    let footer = if self.saving {
      Line::styled("Saving...", Style::default().fg(Color::Yellow))
    } else if let Some(error) = &self.error {
      Line::styled(error.clone(), Style::default().fg(Color::Red))
    } else if self.editing {
      Line::styled(
        "Enter: save  Esc: cancel  (blank keeps current value)",
        Style::default().fg(Color::DarkGray),
      )
    } else {
      Line::styled("Enter: save  Esc: cancel", Style::default().fg(Color::DarkGray))
    };
    lines.push(footer);

    frame.render_widget(Paragraph::new(lines).block(block), modal);
  }
}
