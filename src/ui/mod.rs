//! User interface rendering and input handling.
//!
//! This module provides the terminal front end for a console control:
//!
//! - **renderer**: Lays out and draws the console with a status bar
//! - **keymapper**: Keyboard input to console keys and application actions
//! - **prompt**: Program/arguments form for starting a new process

pub mod keymapper;
pub mod prompt;
pub mod renderer;

pub use keymapper::*;
pub use prompt::{NewProcessPrompt, PromptField, PromptOutcome};
pub use renderer::*;
