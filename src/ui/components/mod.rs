mod command_input;
mod confirm;
mod input;
mod record_form;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use confirm::ConfirmDialog;
pub use input::TextInput;
pub use record_form::{FormEvent, RecordForm};
pub use search_input::{SearchEvent, SearchInput};

/// What a modal component did with a key.
///
/// `NotHandled` lets the owning view fall through to its own bindings;
/// `Event` carries the component's outcome (a submitted form, a confirmed
/// delete, a chosen command).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  Handled,
  Event(T),
  NotHandled,
}
