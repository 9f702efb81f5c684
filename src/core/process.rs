//! Process session
//!
//! Spawns one child process with all three standard streams piped and turns
//! its activity into [`ProcessEvent`]s on a channel. The consumer drains the
//! channel from a single thread (see `console::ConsoleControl::pump`).
//!
//! A session runs at most one process. Once that process has exited the
//! session is spent; create a new one to run something else.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::stream::{spawn_reader, CancelToken, StreamSource};

/// Line terminator appended to every input line
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// How often the exit watcher polls the child
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long readers may keep draining after the child has exited.
/// A stream still open after that belongs to some other process that
/// inherited it.
const READER_GRACE: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session has already been started")]
    AlreadyStarted,

    #[error("Invalid argument string '{arguments}': {reason}")]
    InvalidArguments { arguments: String, reason: String },

    #[error("Failed to start process {file}: {source}")]
    Spawn {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write to process input: {0}")]
    Write(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Events raised by a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One or more complete lines from stdout
    Output(String),
    /// A chunk of stderr text, unbuffered
    Error(String),
    /// A line written to the child's stdin
    Input(String),
    /// The child exited; `-1` when no code is available (killed by a signal)
    Exited(i32),
}

/// Everything needed to launch a process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartInfo {
    /// Program to run
    pub file_name: PathBuf,
    /// Argument string, split with shell-word rules (no shell is involved)
    pub arguments: String,
    /// Working directory; defaults to the program's own directory
    pub working_dir: Option<PathBuf>,
}

impl StartInfo {
    pub fn new(file_name: impl Into<PathBuf>, arguments: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            arguments: arguments.into(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Working directory the child will start in, if any is forced
    pub fn resolved_working_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.working_dir {
            return Some(dir.clone());
        }
        self.file_name
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// Split the argument string into argv entries
    pub fn argv(&self) -> Result<Vec<String>> {
        shell_words::split(&self.arguments).map_err(|e| SessionError::InvalidArguments {
            arguments: self.arguments.clone(),
            reason: e.to_string(),
        })
    }

    fn display_name(&self) -> String {
        self.file_name.display().to_string()
    }
}

/// A wrapper around one external process and its redirected streams
pub struct ProcessSession {
    /// Child handle, shared with the exit watcher
    child: Arc<Mutex<Option<Child>>>,
    /// Writer for the child's stdin
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    /// Set while the child is alive
    running: Arc<AtomicBool>,
    /// Raised by `stop`/`dispose` and by the exit watcher; readers stop
    /// delivering once raised
    cancel: CancelToken,
    /// Set once `start` spawned something
    started: bool,
    /// Name and arguments of the attached process
    metadata: Arc<Mutex<Option<(PathBuf, String)>>>,
    pid: Option<u32>,
    events_tx: Sender<ProcessEvent>,
    events_rx: Receiver<ProcessEvent>,
    watcher: Option<JoinHandle<()>>,
}

impl Default for ProcessSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSession {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            child: Arc::new(Mutex::new(None)),
            stdin: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancelToken::new(),
            started: false,
            metadata: Arc::new(Mutex::new(None)),
            pid: None,
            events_tx,
            events_rx,
            watcher: None,
        }
    }

    /// Start a process from a file name and an argument string
    pub fn start(&mut self, file_name: impl Into<PathBuf>, arguments: &str) -> Result<()> {
        self.start_with(StartInfo::new(file_name, arguments))
    }

    /// Start a process from a full [`StartInfo`]
    pub fn start_with(&mut self, info: StartInfo) -> Result<()> {
        if self.started {
            warn!(file = %info.display_name(), "session already used, refusing to start again");
            return Err(SessionError::AlreadyStarted);
        }

        let mut command = Command::new(&info.file_name);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = info.resolved_working_dir() {
            command.current_dir(dir);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            // Windows programs parse their own command line
            if !info.arguments.is_empty() {
                command.raw_arg(&info.arguments);
            }
            command.creation_flags(CREATE_NO_WINDOW);
        }
        #[cfg(not(windows))]
        {
            let argv = info.argv().map_err(|e| {
                error!("{}", e);
                e
            })?;
            command.args(&argv);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!(
                    "Failed to start process {} with arguments '{}': {}",
                    info.display_name(),
                    info.arguments,
                    source
                );
                return Err(SessionError::Spawn {
                    file: info.display_name(),
                    source,
                });
            }
        };

        self.started = true;
        self.pid = Some(child.id());
        info!(pid = child.id(), file = %info.display_name(), args = %info.arguments, "process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        *lock(&self.stdin) = child.stdin.take();
        *lock(&self.metadata) = Some((info.file_name.clone(), info.arguments.clone()));
        *lock(&self.child) = Some(child);
        self.running.store(true, Ordering::SeqCst);

        // Readers
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = stdout {
            match spawn_reader(out, StreamSource::Stdout, self.events_tx.clone(), self.cancel.clone()) {
                Ok(handle) => readers.push(handle),
                Err(e) => error!("Failed to spawn stdout reader: {}", e),
            }
        }
        if let Some(err) = stderr {
            match spawn_reader(err, StreamSource::Stderr, self.events_tx.clone(), self.cancel.clone()) {
                Ok(handle) => readers.push(handle),
                Err(e) => error!("Failed to spawn stderr reader: {}", e),
            }
        }

        // Exit watcher
        let watch = ExitWatch {
            child: self.child.clone(),
            stdin: self.stdin.clone(),
            running: self.running.clone(),
            metadata: self.metadata.clone(),
            cancel: self.cancel.clone(),
            tx: self.events_tx.clone(),
        };
        match thread::Builder::new()
            .name("consolectl-exit".to_string())
            .spawn(move || watch.run(readers))
        {
            Ok(handle) => self.watcher = Some(handle),
            Err(e) => {
                // Without a watcher nobody would ever reap the child
                error!("Failed to spawn exit watcher: {}", e);
                self.kill_child();
                self.running.store(false, Ordering::SeqCst);
            }
        }

        Ok(())
    }

    /// Forcibly terminate the child. No-op when nothing is running.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        info!(pid = ?self.pid, "stopping process");
        self.cancel.cancel();
        self.kill_child();
        self.running.store(false, Ordering::SeqCst);
    }

    fn kill_child(&self) {
        if let Some(child) = lock(&self.child).as_mut() {
            if let Err(e) = child.kill() {
                // Already exited between the check and the kill
                debug!("kill failed: {}", e);
            }
        }
    }

    /// Write a line to the child's stdin. Ignored when nothing is running.
    pub fn write_input(&self, line: &str) -> Result<()> {
        if !self.is_running() {
            debug!("write_input ignored, process not running");
            return Ok(());
        }

        {
            let mut guard = lock(&self.stdin);
            let Some(stdin) = guard.as_mut() else {
                return Ok(());
            };
            stdin
                .write_all(line.as_bytes())
                .and_then(|_| stdin.write_all(LINE_ENDING.as_bytes()))
                .and_then(|_| stdin.flush())
                .map_err(SessionError::Write)?;
        }

        let _ = self.events_tx.send(ProcessEvent::Input(line.to_string()));
        Ok(())
    }

    /// Whether a child is attached and still alive
    pub fn is_running(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        // A poisoned or missing handle counts as not running
        match self.child.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(child) => matches!(child.try_wait(), Ok(None)),
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Whether `start` has spawned a process on this session
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Program of the attached process; cleared once it exits
    pub fn file_name(&self) -> Option<PathBuf> {
        lock(&self.metadata).as_ref().map(|(file, _)| file.clone())
    }

    /// Argument string of the attached process; cleared once it exits
    pub fn arguments(&self) -> Option<String> {
        lock(&self.metadata).as_ref().map(|(_, args)| args.clone())
    }

    /// OS process id of the child, if one was spawned
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next pending event, without blocking
    pub fn try_recv_event(&self) -> Option<ProcessEvent> {
        match self.events_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// All pending events, without blocking
    pub fn drain_events(&self) -> Vec<ProcessEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv_event() {
            events.push(event);
        }
        events
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ProcessEvent> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Tear everything down. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.cancel.cancel();
        if self.running.load(Ordering::SeqCst) {
            self.kill_child();
        }
        self.running.store(false, Ordering::SeqCst);
        lock(&self.stdin).take();

        // The watcher reaps the child; only join it when that is already done
        if let Some(handle) = self.watcher.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// State handed to the exit watcher thread
struct ExitWatch {
    child: Arc<Mutex<Option<Child>>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    running: Arc<AtomicBool>,
    metadata: Arc<Mutex<Option<(PathBuf, String)>>>,
    cancel: CancelToken,
    tx: Sender<ProcessEvent>,
}

impl ExitWatch {
    fn run(self, readers: Vec<JoinHandle<()>>) {
        let code = loop {
            let status = {
                let mut guard = lock(&self.child);
                match guard.as_mut() {
                    Some(child) => child.try_wait(),
                    None => return,
                }
            };
            match status {
                Ok(Some(status)) => break status.code().unwrap_or(-1),
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => {
                    warn!("Failed to query child status: {}", e);
                    break -1;
                }
            }
        };

        info!(code, "process exited");
        self.running.store(false, Ordering::SeqCst);

        // Let the readers drain what the child wrote, then close the gate so
        // nothing arrives after the exit event
        let deadline = Instant::now() + READER_GRACE;
        let mut detached = 0;
        for reader in readers {
            while !reader.is_finished() && Instant::now() < deadline {
                thread::sleep(EXIT_POLL_INTERVAL);
            }
            if reader.is_finished() {
                let _ = reader.join();
            } else {
                detached += 1;
            }
        }
        if detached > 0 {
            debug!(detached, "streams still held open by another process");
        }
        self.cancel.cancel();
        let _ = self.tx.send(ProcessEvent::Exited(code));

        // Release handles; the session cannot be restarted
        lock(&self.stdin).take();
        lock(&self.child).take();
        lock(&self.metadata).take();
    }
}

/// Lock a mutex, recovering the data if a thread panicked while holding it
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
