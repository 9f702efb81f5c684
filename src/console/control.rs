//! Console control
//!
//! Hosts a [`ProcessSession`] and renders its activity into a
//! [`ConsoleBuffer`]. Process events arrive on background threads but are
//! only applied to the display from the owner thread, in [`ConsoleControl::pump`].

use std::collections::VecDeque;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::buffer::{ConsoleBuffer, TextKind};
use super::dispatch::{DispatchHandle, Dispatcher};
use super::keys::{ConsoleKey, Key, KeyOutcome, Modifiers};
use super::severity::Severity;
use crate::core::process::{ProcessEvent, ProcessSession, SessionError, StartInfo};

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("A process is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, ControlError>;

/// Behaviour switches of a console control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleOptions {
    /// Write start/exit banners into the console
    pub show_diagnostics: bool,
    /// Let the user type once a process is running
    pub input_enabled: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            show_diagnostics: false,
            input_enabled: true,
        }
    }
}

/// Notifications for the embedding application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// Process output (stdout or stderr) was received
    Output(String),
    /// A line was sent to the process
    Input(String),
    /// The process exited with this code
    Exited(i32),
}

/// Display state; only touched on the owner thread
#[derive(Debug)]
pub struct ConsoleView {
    pub buffer: ConsoleBuffer,
    pub read_only: bool,
    /// Last submitted line, used to drop the child's echo of it
    last_input: Option<String>,
}

impl ConsoleView {
    fn new() -> Self {
        Self {
            buffer: ConsoleBuffer::new(),
            read_only: true,
            last_input: None,
        }
    }

    /// Whether `output` is just the echo of the last submitted line
    fn is_echo(&self, output: &str) -> bool {
        let Some(last) = self.last_input.as_deref() else {
            return false;
        };
        if last.is_empty() {
            return false;
        }
        let trimmed = output
            .strip_suffix("\r\n")
            .or_else(|| output.strip_suffix('\n'))
            .unwrap_or(output);
        output == last || trimmed == last
    }

    /// Append output unless it duplicates the last input
    pub fn write_output(&mut self, output: &str, kind: TextKind) -> bool {
        if self.is_echo(output) {
            debug!("dropping echoed input");
            return false;
        }
        self.buffer.append(output, kind);
        true
    }
}

/// Posts output to a console from any thread
#[derive(Clone)]
pub struct ConsoleWriter {
    handle: DispatchHandle<ConsoleView>,
}

impl ConsoleWriter {
    /// Queue output; it shows up on the owner's next `pump`
    pub fn write_output(&self, output: impl Into<String>, kind: TextKind) -> bool {
        let output = output.into();
        self.handle.post(move |view| {
            view.write_output(&output, kind);
        })
    }
}

/// A console that runs one process at a time
pub struct ConsoleControl {
    view: ConsoleView,
    dispatcher: Dispatcher<ConsoleView>,
    session: ProcessSession,
    options: ConsoleOptions,
    is_running: bool,
    /// Program of the current/last process, kept for the exit banner
    last_file_name: Option<PathBuf>,
    events: VecDeque<ConsoleEvent>,
}

impl Default for ConsoleControl {
    fn default() -> Self {
        Self::new(ConsoleOptions::default())
    }
}

impl ConsoleControl {
    /// Create a control owned by the calling thread
    pub fn new(options: ConsoleOptions) -> Self {
        Self {
            view: ConsoleView::new(),
            dispatcher: Dispatcher::new(),
            session: ProcessSession::new(),
            options,
            is_running: false,
            last_file_name: None,
            events: VecDeque::new(),
        }
    }

    pub fn options(&self) -> ConsoleOptions {
        self.options
    }

    pub fn set_show_diagnostics(&mut self, show: bool) {
        self.options.show_diagnostics = show;
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        self.options.input_enabled = enabled;
    }

    pub fn buffer(&self) -> &ConsoleBuffer {
        &self.view.buffer
    }

    pub fn is_read_only(&self) -> bool {
        self.view.read_only
    }

    /// Mirrors the session's running state
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// The session currently attached
    pub fn session(&self) -> &ProcessSession {
        &self.session
    }

    pub fn process_file_name(&self) -> Option<PathBuf> {
        self.session.file_name()
    }

    pub fn process_arguments(&self) -> Option<String> {
        self.session.arguments()
    }

    /// Handle for writing output from other threads
    pub fn writer(&self) -> ConsoleWriter {
        ConsoleWriter {
            handle: self.dispatcher.handle(),
        }
    }

    /// Events raised since the last call
    pub fn take_events(&mut self) -> Vec<ConsoleEvent> {
        self.events.drain(..).collect()
    }

    /// Run a process from a file name and an argument string
    pub fn start_process(&mut self, file_name: impl Into<PathBuf>, arguments: &str) -> Result<()> {
        self.start_process_with(StartInfo::new(file_name, arguments))
    }

    /// Run a process from a full [`StartInfo`]
    pub fn start_process_with(&mut self, info: StartInfo) -> Result<()> {
        // Settle the previous session before it is replaced
        self.pump();
        if self.session.is_running() {
            warn!(file = %info.file_name.display(), "refusing to start, a process is already running");
            return Err(ControlError::AlreadyRunning);
        }

        if self.options.show_diagnostics {
            let file = info.file_name.display();
            self.write_output(&format!("Preparing to run {}", file), TextKind::Diagnostic);
            if info.arguments.is_empty() {
                self.write_output(".\n", TextKind::Diagnostic);
            } else {
                self.write_output(
                    &format!(" with arguments {}.\n", info.arguments),
                    TextKind::Diagnostic,
                );
            }
        }

        let mut session = ProcessSession::new();
        let started = session.start_with(info.clone());
        self.session = session;
        if let Err(e) = started {
            error!("Could not start {}: {}", info.file_name.display(), e);
            return Err(e.into());
        }

        info!(file = %info.file_name.display(), "console attached to process");
        self.last_file_name = Some(info.file_name);
        if self.options.input_enabled {
            self.view.read_only = false;
        }
        self.is_running = true;
        Ok(())
    }

    /// Kill the running process, if any
    pub fn stop_process(&mut self) {
        self.session.stop();
        self.is_running = self.session.is_running();
    }

    /// Remove all text
    pub fn clear_output(&mut self) {
        self.view.buffer.clear();
    }

    /// Append output to the console.
    ///
    /// Output equal to the last submitted line is dropped so a child that
    /// echoes its input does not show it twice. Other threads write through
    /// [`ConsoleControl::writer`].
    pub fn write_output(&mut self, output: &str, kind: TextKind) {
        self.view.write_output(output, kind);
    }

    /// Send a line to the process, optionally echoing it into the console
    pub fn write_input(&mut self, input: &str, echo: bool) -> Result<()> {
        if echo {
            self.view.buffer.append(input, TextKind::Input);
        }
        self.view.last_input = Some(input.to_string());
        self.session.write_input(input)?;
        self.events.push_back(ConsoleEvent::Input(input.to_string()));
        Ok(())
    }

    /// Apply queued work and process events. Call from the owner thread.
    ///
    /// Returns how many items were handled, so callers know when to redraw.
    pub fn pump(&mut self) -> usize {
        let mut handled = self.dispatcher.drain(&mut self.view);

        for event in self.session.drain_events() {
            handled += 1;
            match event {
                ProcessEvent::Output(text) => {
                    let kind = TextKind::Output(Severity::classify(&text));
                    self.view.write_output(&text, kind);
                    self.events.push_back(ConsoleEvent::Output(text));
                }
                ProcessEvent::Error(text) => {
                    self.view.write_output(&text, TextKind::StdErr);
                    self.events.push_back(ConsoleEvent::Output(text));
                }
                // The control raises its own input events in write_input
                ProcessEvent::Input(_) => {}
                ProcessEvent::Exited(code) => self.on_exit(code),
            }
        }
        handled
    }

    fn on_exit(&mut self, code: i32) {
        if self.options.show_diagnostics {
            let name = self
                .last_file_name
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "Process".to_string());
            self.view.write_output(
                &format!("\n{} exited with code {}.", name, code),
                TextKind::Diagnostic,
            );
        }
        self.view.read_only = true;
        self.is_running = false;
        self.events.push_back(ConsoleEvent::Exited(code));
    }

    /// Paste text at the caret
    pub fn paste(&mut self, text: &str) -> KeyOutcome {
        if self.view.read_only || self.view.buffer.caret_in_history() {
            return KeyOutcome::Swallowed;
        }
        if self.view.buffer.insert_str(text) {
            KeyOutcome::Edited
        } else {
            KeyOutcome::Swallowed
        }
    }

    /// Route a key press through the console's editing rules
    pub fn handle_key(&mut self, key: ConsoleKey) -> KeyOutcome {
        let buffer = &mut self.view.buffer;

        if key.is_copy() {
            return match buffer.selected_text() {
                Some(text) => KeyOutcome::Copy(text),
                None => KeyOutcome::Swallowed,
            };
        }

        if key.is_arrow() {
            let extend = key.shift();
            match key.key {
                Key::Left => buffer.move_left(extend),
                Key::Right => buffer.move_right(extend),
                Key::Up => buffer.move_up(extend),
                Key::Down => buffer.move_down(extend),
                _ => {}
            }
            return KeyOutcome::Moved;
        }

        // History is read-only, whatever the key
        if buffer.caret_in_history() {
            return KeyOutcome::Swallowed;
        }

        match key.key {
            Key::Home => {
                buffer.move_home(key.shift());
                return KeyOutcome::Moved;
            }
            Key::End => {
                buffer.move_end(key.shift());
                return KeyOutcome::Moved;
            }
            Key::Char('a') | Key::Char('A') if key.mods.contains(Modifiers::CTRL) => {
                buffer.select_all();
                return KeyOutcome::Moved;
            }
            _ => {}
        }

        if self.view.read_only {
            return match key.key {
                Key::Char(_) | Key::Enter | Key::Backspace | Key::Delete | Key::Tab => {
                    KeyOutcome::Swallowed
                }
                _ => KeyOutcome::Ignored,
            };
        }

        let edited = match key.key {
            Key::Enter => {
                let upto = buffer.selection_start();
                let line = buffer.commit_input(upto);
                // Not echoed: the buffer already shows what was typed
                if let Err(e) = self.write_input(&line, false) {
                    error!("Failed to send input: {}", e);
                }
                return KeyOutcome::Submitted(line);
            }
            Key::Backspace => buffer.backspace(),
            Key::Delete => buffer.delete(),
            Key::Tab => buffer.insert_str("\t"),
            Key::Char(ch) if !key.mods.intersects(Modifiers::CTRL | Modifiers::ALT) => {
                let mut tmp = [0u8; 4];
                buffer.insert_str(ch.encode_utf8(&mut tmp))
            }
            _ => return KeyOutcome::Ignored,
        };

        if edited {
            KeyOutcome::Edited
        } else {
            KeyOutcome::Swallowed
        }
    }
}
