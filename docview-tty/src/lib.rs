use std::io::{self, Write};

use docview_core::{Command, ExternalRef};

mod console;

pub use console::{ConsolePermissions, ConsolePicker, ConsolePresenter, ConsolePrompts, Prompt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Command(Command),
    Invalid(String),
    None,
}

/// Turns console lines into viewer commands.
///
/// A line made only of digits is kept as a count prefix for the next command, so `3`
/// followed by `n` behaves like `3n`.
#[derive(Debug, Default)]
pub struct InputMapper {
    pending_count: Option<usize>,
    pending_digits: String,
}

impl InputMapper {
    /// Larger prefixes are clamped; they only ever wrap around the match set.
    const MAX_COUNT: usize = 99_999;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_line(&mut self, line: &str) -> UiEvent {
        let line = line.trim();
        if line.is_empty() {
            return UiEvent::None;
        }

        if let Some(query) = line.strip_prefix('/') {
            self.reset_count();
            return UiEvent::Command(Command::Search {
                query: query.to_owned(),
            });
        }

        let digits_end = line
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(line.len());
        for digit in line[..digits_end].chars().filter_map(|c| c.to_digit(10)) {
            self.push_digit(digit as usize);
        }
        let rest = line[digits_end..].trim();
        if rest.is_empty() {
            return UiEvent::None;
        }

        let (word, argument) = match rest.split_once(char::is_whitespace) {
            Some((word, argument)) => (word, argument.trim()),
            None => (rest, ""),
        };

        let command = match (word, argument) {
            ("n", "") => Command::NextMatch {
                count: self.take_count(),
            },
            ("N", "") | ("p", "") => Command::PreviousMatch {
                count: self.take_count(),
            },
            ("x", "") => Command::CloseSearch,
            ("o", "") => Command::PickDocument,
            ("b", "") => Command::OpenBundled,
            ("?", "") => Command::ShowStatus,
            ("q", "") | ("quit", "") => Command::Quit,
            ("G", "") => Command::GotoPage { page: usize::MAX },
            ("g", "") => match self.pending_count.take() {
                Some(page) => Command::GotoPage {
                    page: page.saturating_sub(1),
                },
                None => return self.invalid(line),
            },
            ("g", page) => match page.parse::<usize>() {
                Ok(page) => Command::GotoPage {
                    page: page.saturating_sub(1),
                },
                Err(_) => return self.invalid(line),
            },
            ("open", reference) if !reference.is_empty() => match ExternalRef::parse(reference) {
                Some(reference) => Command::OpenReference { reference },
                None => return self.invalid(line),
            },
            _ => return self.invalid(line),
        };
        self.reset_count();
        UiEvent::Command(command)
    }

    /// Digits typed so far that have not been consumed by a command.
    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }

    fn invalid(&mut self, line: &str) -> UiEvent {
        self.reset_count();
        UiEvent::Invalid(line.to_owned())
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current
            .saturating_mul(10)
            .saturating_add(digit)
            .min(Self::MAX_COUNT);
        self.pending_count = Some(next);
        self.pending_digits = next.to_string();
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }
}

pub const HELP: &str = "\
/text  search        n  next match      N, p  previous match   x  close search
o      pick document open <path|url>     b  bundled document    g <page>, G  jump
?      status        q  quit             a number before n/N/p/g repeats or picks the page";

pub fn write_help<W: Write>(writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", HELP)?;
    writer.flush()
}
