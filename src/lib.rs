//! consolectl - an embeddable console that hosts a child process
//!
//! A console control runs one process at a time with its standard streams
//! redirected. Output is classified and colored, the user types into an
//! editable input line after it, and everything already written is
//! read-only history.
//!
//! # Layers
//!
//! - [`core`]: `ProcessSession`, the process wrapper with reader threads
//! - [`console`]: `ConsoleControl`, the document model and editing rules
//! - [`ui`]: crossterm front end (renderer, key mapping, prompt)
//! - [`config`]: `~/.consolectl/config.toml` and color schemes
//!
//! # Example
//!
//! ```no_run
//! use consolectl::console::{ConsoleControl, ConsoleOptions};
//!
//! let mut console = ConsoleControl::new(ConsoleOptions {
//!     show_diagnostics: true,
//!     input_enabled: true,
//! });
//! console.start_process("ping", "-c 1 localhost")?;
//! while console.is_running() {
//!     console.pump();
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! print!("{}", console.buffer().text());
//! # Ok::<(), consolectl::console::ControlError>(())
//! ```

pub mod config;
pub mod console;
pub mod core;
pub mod ui;

pub use crate::console::{ConsoleControl, ConsoleEvent, ConsoleOptions};
pub use crate::core::{ProcessEvent, ProcessSession, StartInfo};
