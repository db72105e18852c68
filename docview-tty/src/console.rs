//! Console stand-ins for the platform services the viewer talks to: the permission
//! prompt, the document chooser and the title/notice area.
//!
//! Prompts are answered on stdin. Whoever reads stdin checks [`ConsolePrompts::take`]
//! before mapping a line to a command and posts the task returned by
//! [`ConsolePrompts::answer`].

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;

use crossterm::style::{Attribute, Print, SetAttribute};
use docview_core::{
    ActivityOutcome, ExternalRef, FilePicker, Notice, Permission, PermissionPolicy,
    PermissionStatus, PermissionSubsystem, PickerError, Presenter, QueueHandle, RequestCode,
    Task,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Permission {
        permission: Permission,
        code: RequestCode,
    },
    PickDocument {
        code: RequestCode,
    },
}

#[derive(Debug, Default)]
struct PromptState {
    pending: Option<Prompt>,
    granted: HashSet<Permission>,
}

#[derive(Debug, Clone, Default)]
pub struct ConsolePrompts {
    state: Arc<Mutex<PromptState>>,
}

impl ConsolePrompts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only one prompt is outstanding at a time; a newer one replaces the older.
    pub fn arm(&self, prompt: Prompt) {
        let replaced = self.state.lock().pending.replace(prompt);
        if let Some(replaced) = replaced {
            debug!(?replaced, ?prompt, "prompt superseded");
        }
    }

    pub fn take(&self) -> Option<Prompt> {
        self.state.lock().pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn is_granted(&self, permission: Permission) -> bool {
        self.state.lock().granted.contains(&permission)
    }

    /// Converts the line typed in reply to `prompt` into the task that answers it.
    pub fn answer(&self, prompt: Prompt, line: &str) -> Task {
        let line = line.trim();
        match prompt {
            Prompt::Permission { permission, code } => {
                let granted = matches!(line.to_ascii_lowercase().as_str(), "y" | "yes");
                if granted {
                    self.state.lock().granted.insert(permission);
                }
                Task::PermissionResult { code, granted }
            }
            Prompt::PickDocument { code } => {
                let outcome = if line.is_empty() {
                    ActivityOutcome::Cancelled
                } else {
                    match ExternalRef::parse(line) {
                        Some(reference) => ActivityOutcome::Picked(reference),
                        None => {
                            warn!(input = line, "not a usable document reference");
                            ActivityOutcome::Cancelled
                        }
                    }
                };
                Task::ActivityResult { code, outcome }
            }
        }
    }
}

/// Grants or denies according to the configured policy, asking on the console when
/// the policy says so.
pub struct ConsolePermissions<W> {
    policy: PermissionPolicy,
    prompts: ConsolePrompts,
    queue: QueueHandle,
    writer: W,
}

impl<W: Write + Send> ConsolePermissions<W> {
    pub fn new(
        policy: PermissionPolicy,
        prompts: ConsolePrompts,
        queue: QueueHandle,
        writer: W,
    ) -> Self {
        Self {
            policy,
            prompts,
            queue,
            writer,
        }
    }

    fn ask(&mut self, permission: Permission) -> io::Result<()> {
        write!(self.writer, "allow {}? [y/N] ", permission)?;
        self.writer.flush()
    }
}

impl<W: Write + Send> PermissionSubsystem for ConsolePermissions<W> {
    fn check(&self, permission: Permission) -> PermissionStatus {
        if self.policy == PermissionPolicy::Granted || self.prompts.is_granted(permission) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    fn request(&mut self, permission: Permission, code: RequestCode) {
        match self.policy {
            PermissionPolicy::Granted | PermissionPolicy::Denied => {
                let granted = self.policy == PermissionPolicy::Granted;
                self.queue.post(Task::PermissionResult { code, granted });
            }
            PermissionPolicy::Ask => {
                self.prompts.arm(Prompt::Permission { permission, code });
                if let Err(err) = self.ask(permission) {
                    warn!(?err, %permission, "failed to show permission prompt");
                }
            }
        }
    }
}

/// Asks for a path or URL on the console.
pub struct ConsolePicker<W> {
    enabled: bool,
    prompts: ConsolePrompts,
    writer: W,
}

impl<W: Write + Send> ConsolePicker<W> {
    pub fn new(enabled: bool, prompts: ConsolePrompts, writer: W) -> Self {
        Self {
            enabled,
            prompts,
            writer,
        }
    }
}

impl<W: Write + Send> FilePicker for ConsolePicker<W> {
    fn launch(&mut self, mime_type: &str, code: RequestCode) -> Result<(), PickerError> {
        if !self.enabled {
            return Err(PickerError::Unavailable);
        }
        write!(
            self.writer,
            "open which {} document? (path or URL, empty to cancel) ",
            mime_type
        )
        .and_then(|()| self.writer.flush())
        .map_err(|err| PickerError::Failed(err.to_string()))?;
        self.prompts.arm(Prompt::PickDocument { code });
        Ok(())
    }
}

pub struct ConsolePresenter<W> {
    writer: W,
}

impl<W: Write + Send> ConsolePresenter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    fn print_styled(&mut self, attribute: Attribute, content: &str) -> io::Result<()> {
        crossterm::execute!(
            self.writer,
            SetAttribute(attribute),
            Print(content),
            SetAttribute(Attribute::Reset),
            Print("\n")
        )
    }

    fn report(&mut self, result: io::Result<()>) {
        if let Err(err) = result {
            warn!(?err, "console write failed");
        }
    }
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn set_title(&mut self, title: &str) {
        let result = self.print_styled(Attribute::Bold, title);
        self.report(result);
    }

    fn set_search_controls_visible(&mut self, visible: bool) {
        let line = if visible {
            "[search: n next, N previous, x close]"
        } else {
            "[search closed]"
        };
        let result = self.print_styled(Attribute::Dim, line);
        self.report(result);
    }

    fn show_notice(&mut self, notice: &Notice) {
        let result = self.print_styled(Attribute::Reverse, &notice.to_string());
        self.report(result);
    }
}
