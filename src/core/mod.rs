//! Core process plumbing.
//!
//! - **process**: `ProcessSession`, one child process with piped stdio
//! - **stream**: reader threads, UTF-8 decoding and stdout line grouping
//!
//! # Architecture
//!
//! ```text
//! ProcessSession
//! ├── stdin writer (write_input)
//! ├── stdout reader thread ──► LineCoalescer ──┐
//! ├── stderr reader thread ────────────────────┼──► mpsc channel ──► consumer
//! └── exit watcher (reaps, then drains) ───────┘
//! ```

pub mod process;
pub mod stream;

pub use process::{ProcessEvent, ProcessSession, SessionError, StartInfo};
pub use stream::StreamSource;
