//! `:` palette commands and their matching.

use std::iter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Offices,
  Shifts,
  Logout,
  Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Command {
  pub action: Action,
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Hidden from suggestions and refused until someone is signed in
  pub needs_session: bool,
}

pub const COMMANDS: &[Command] = &[
  Command {
    action: Action::Offices,
    name: "offices",
    aliases: &["o", "office"],
    description: "Manage offices",
    needs_session: true,
  },
  Command {
    action: Action::Shifts,
    name: "shifts",
    aliases: &["s", "shift"],
    description: "Manage shifts",
    needs_session: true,
  },
  Command {
    action: Action::Logout,
    name: "logout",
    aliases: &["signout"],
    description: "End the session",
    needs_session: true,
  },
  Command {
    action: Action::Quit,
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit officeshift",
    needs_session: false,
  },
];

impl Command {
  fn words(&self) -> impl Iterator<Item = &'static str> {
    iter::once(self.name).chain(self.aliases.iter().copied())
  }

  /// Lower is better: exact, then prefix, then substring, with the name
  /// ahead of its aliases on each tier.
  fn rank(&self, input: &str) -> Option<u8> {
    self
      .words()
      .enumerate()
      .filter_map(|(i, word)| {
        let tier = if word == input {
          0
        } else if word.starts_with(input) {
          1
        } else if word.contains(input) {
          2
        } else {
          return None;
        };
        Some(tier * 2 + u8::from(i > 0))
      })
      .min()
  }
}

/// Command whose name or alias is exactly `input`, session or not.
pub fn lookup(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS.iter().find(|c| c.words().any(|w| w == input))
}

/// Palette suggestions for `input`, best match first.
pub fn suggestions(input: &str, signed_in: bool) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter(|c| signed_in || !c.needs_session)
    .filter_map(|c| {
      if input.is_empty() {
        Some((0, c))
      } else {
        c.rank(&input).map(|r| (r, c))
      }
    })
    .collect();
  ranked.sort_by_key(|(rank, _)| *rank);
  ranked.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(input: &str, signed_in: bool) -> Vec<&'static str> {
    suggestions(input, signed_in).iter().map(|c| c.name).collect()
  }

  #[test]
  fn test_empty_input_lists_everything_in_order() {
    assert_eq!(names("", true), vec!["offices", "shifts", "logout", "quit"]);
  }

  #[test]
  fn test_signed_out_only_offers_quit() {
    assert_eq!(names("", false), vec!["quit"]);
    assert!(names("off", false).is_empty());
  }

  #[test]
  fn test_alias_beats_substring() {
    // "o" is an alias of offices and a substring of logout
    assert_eq!(names("o", true), vec!["offices", "logout"]);
  }

  #[test]
  fn test_prefix_and_substring() {
    assert_eq!(names("log", true)[0], "logout");
    assert_eq!(names("fic", true), vec!["offices"]);
    assert_eq!(names("  SHI ", true), vec!["shifts"]);
  }

  #[test]
  fn test_no_match() {
    assert!(names("zzz", true).is_empty());
  }

  #[test]
  fn test_lookup_is_exact_and_ignores_session() {
    assert_eq!(lookup("signout").map(|c| c.action), Some(Action::Logout));
    assert_eq!(lookup("Shifts").map(|c| c.needs_session), Some(true));
    assert!(lookup("shi").is_none());
  }
}
