//! Console control components.
//!
//! - **buffer**: document model with a read-only history and an editable input line
//! - **severity**: marker-based classification of process output
//! - **keys**: toolkit-neutral key events
//! - **dispatch**: owner-thread task queue
//! - **control**: `ConsoleControl`, tying a `ProcessSession` to a buffer

pub mod buffer;
pub mod control;
pub mod dispatch;
pub mod keys;
pub mod severity;

pub use buffer::{ConsoleBuffer, Segment, TextKind};
pub use control::{ConsoleControl, ConsoleEvent, ConsoleOptions, ConsoleWriter, ControlError};
pub use dispatch::{DispatchHandle, Dispatcher};
pub use keys::{ConsoleKey, Key, KeyOutcome, Modifiers};
pub use severity::Severity;
