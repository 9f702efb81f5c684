//! Configuration and color scheme management for consolectl.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.consolectl/config.toml`
//! - Built-in color schemes mapping each kind of console text to a color
//!
//! # Configuration File
//!
//! ```toml
//! # Command started with F2 (optional)
//! shell = "/bin/bash"
//!
//! # Write "Preparing to run ..." / "... exited" banners
//! show_diagnostics = true
//!
//! # Allow typing into the console while a process runs
//! input_enabled = true
//!
//! # Color scheme: default, solarized-dark, monokai, nord
//! color_scheme = "nord"
//!
//! [status_bar]
//! visible = true
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::console::{ConsoleOptions, Severity, TextKind};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Command started by the "start shell" action
    pub shell: Option<String>,
    /// Write start/exit banners
    pub show_diagnostics: bool,
    /// Allow typing while a process runs
    pub input_enabled: bool,
    /// Color scheme name
    pub color_scheme: String,
    /// Status bar settings
    pub status_bar: StatusBarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            show_diagnostics: false,
            input_enabled: true,
            color_scheme: "default".to_string(),
            status_bar: StatusBarConfig::default(),
        }
    }
}

/// Status bar configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusBarConfig {
    pub visible: bool,
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self { visible: true }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => match fs::read_to_string(&path) {
                Ok(content) => Self::parse(&content),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Parse TOML text; malformed input yields the defaults
    pub fn parse(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed config: {}", e);
                Self::default()
            }
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        let dir = config_dir()?;
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }

    /// Shell for the "start shell" action
    pub fn shell_command(&self) -> String {
        if let Some(shell) = &self.shell {
            return shell.clone();
        }
        default_shell()
    }

    /// Console options derived from this config
    pub fn console_options(&self) -> ConsoleOptions {
        ConsoleOptions {
            show_diagnostics: self.show_diagnostics,
            input_enabled: self.input_enabled,
        }
    }

    /// Get the color scheme
    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

#[cfg(windows)]
fn default_shell() -> String {
    "cmd.exe".to_string()
}

#[cfg(not(windows))]
fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Color scheme definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,

    // Console text
    pub output: Color,
    pub error: Color,
    pub warning: Color,
    pub debug: Color,
    pub verbose: Color,
    pub stderr: Color,
    pub diagnostic: Color,
    pub input: Color,

    // Selection colors
    pub selection_bg: Color,
    pub selection_fg: Color,

    // Status bar colors
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub status_running_bg: Color,
    pub status_running_fg: Color,

    // Prompt dialog colors
    pub prompt_bg: Color,
    pub prompt_fg: Color,
    pub prompt_field_bg: Color,
    pub prompt_border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Default color scheme
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),

            output: Color::new(255, 255, 255),
            error: Color::new(255, 0, 0),
            warning: Color::new(255, 165, 0),
            debug: Color::new(122, 122, 122),
            verbose: Color::new(156, 156, 156),
            stderr: Color::new(255, 0, 0),
            diagnostic: Color::new(0, 255, 0),
            input: Color::new(255, 255, 255),

            selection_bg: Color::new(255, 255, 255),
            selection_fg: Color::new(0, 0, 0),

            status_bar_bg: Color::new(40, 40, 40),
            status_bar_fg: Color::new(180, 180, 180),
            status_running_bg: Color::new(0, 100, 0),
            status_running_fg: Color::new(255, 255, 255),

            prompt_bg: Color::new(0, 0, 139),
            prompt_fg: Color::new(255, 255, 255),
            prompt_field_bg: Color::new(0, 0, 80),
            prompt_border: Color::new(100, 100, 255),
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),

            output: Color::new(147, 161, 161),
            error: Color::new(220, 50, 47),
            warning: Color::new(203, 75, 22),
            debug: Color::new(88, 110, 117),
            verbose: Color::new(101, 123, 131),
            stderr: Color::new(220, 50, 47),
            diagnostic: Color::new(133, 153, 0),
            input: Color::new(238, 232, 213),

            selection_bg: Color::new(38, 139, 210),
            selection_fg: Color::new(253, 246, 227),

            status_bar_bg: Color::new(7, 54, 66),
            status_bar_fg: Color::new(147, 161, 161),
            status_running_bg: Color::new(133, 153, 0),
            status_running_fg: Color::new(0, 43, 54),

            prompt_bg: Color::new(0, 43, 54),
            prompt_fg: Color::new(147, 161, 161),
            prompt_field_bg: Color::new(7, 54, 66),
            prompt_border: Color::new(38, 139, 210),
        }
    }

    /// Monokai scheme
    pub fn monokai() -> Self {
        Self {
            name: "monokai".to_string(),

            output: Color::new(248, 248, 242),
            error: Color::new(249, 38, 114),
            warning: Color::new(253, 151, 31),
            debug: Color::new(117, 113, 94),
            verbose: Color::new(150, 150, 140),
            stderr: Color::new(249, 38, 114),
            diagnostic: Color::new(166, 226, 46),
            input: Color::new(102, 217, 239),

            selection_bg: Color::new(73, 72, 62),
            selection_fg: Color::new(248, 248, 242),

            status_bar_bg: Color::new(60, 60, 54),
            status_bar_fg: Color::new(248, 248, 242),
            status_running_bg: Color::new(166, 226, 46),
            status_running_fg: Color::new(39, 40, 34),

            prompt_bg: Color::new(39, 40, 34),
            prompt_fg: Color::new(248, 248, 242),
            prompt_field_bg: Color::new(60, 60, 54),
            prompt_border: Color::new(166, 226, 46),
        }
    }

    /// Nord scheme
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),

            output: Color::new(216, 222, 233),
            error: Color::new(191, 97, 106),
            warning: Color::new(235, 203, 139),
            debug: Color::new(76, 86, 106),
            verbose: Color::new(147, 161, 181),
            stderr: Color::new(191, 97, 106),
            diagnostic: Color::new(163, 190, 140),
            input: Color::new(136, 192, 208),

            selection_bg: Color::new(76, 86, 106),
            selection_fg: Color::new(236, 239, 244),

            status_bar_bg: Color::new(59, 66, 82),
            status_bar_fg: Color::new(216, 222, 233),
            status_running_bg: Color::new(163, 190, 140),
            status_running_fg: Color::new(46, 52, 64),

            prompt_bg: Color::new(46, 52, 64),
            prompt_fg: Color::new(216, 222, 233),
            prompt_field_bg: Color::new(59, 66, 82),
            prompt_border: Color::new(136, 192, 208),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "monokai" => Self::monokai(),
            "nord" => Self::nord(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec!["default", "solarized-dark", "monokai", "nord"]
    }

    /// Foreground color for a kind of console text
    pub fn color_for(&self, kind: TextKind) -> Color {
        match kind {
            TextKind::Output(Severity::Error) => self.error,
            TextKind::Output(Severity::Warning) => self.warning,
            TextKind::Output(Severity::Debug) => self.debug,
            TextKind::Output(Severity::Verbose) => self.verbose,
            TextKind::Output(Severity::Normal) => self.output,
            TextKind::StdErr => self.stderr,
            TextKind::Diagnostic => self.diagnostic,
            TextKind::Input => self.input,
        }
    }
}

/// Directory holding the config file and the log
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".consolectl"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
