//! consolectl - run a program inside a full-screen console
//!
//! The sample front end for the console control: the program's output is
//! shown with severity colors, and a line typed after the last output is
//! sent to its standard input on Enter.
//!
//! # Quick Start
//!
//! ```text
//! consolectl                   # Start empty, press F2 for a shell
//! consolectl -d -- ping -c 3 localhost
//! consolectl -s pwsh.exe       # Use PowerShell for F2
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | F2 | Start shell |
//! | F3 | Run a program |
//! | F4 | Stop the process |
//! | F5 | Clear output |
//! | F10 / Ctrl+Q | Quit |
//! | PageUp/PageDown | Scroll |
//! | Ctrl+C | Copy selection |

use std::env;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use consolectl::config::{self, ColorScheme, Config};
use consolectl::console::{ConsoleControl, KeyOutcome, TextKind};
use consolectl::ui::{AppAction, KeyInput, KeyMapper, NewProcessPrompt, PromptOutcome, Renderer};

/// Command line options
#[derive(Debug, Default)]
struct Options {
    /// Shell for F2, overriding config.toml
    shell: Option<String>,
    diagnostics: bool,
    no_input: bool,
    /// Program and argument string to run at startup
    command: Option<(String, String)>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("consolectl {}", VERSION);
}

fn print_help() {
    eprintln!("consolectl {} - Run a program inside a console control", VERSION);
    eprintln!();
    eprintln!("Usage: consolectl [OPTIONS] [-- <PROGRAM> [ARGS...]]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --diagnostics     Show start/exit banners");
    eprintln!("  --no-input            Do not accept typed input");
    eprintln!("  -s, --shell <CMD>     Shell started with F2");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  F2                    Start shell");
    eprintln!("  F3                    Run a program");
    eprintln!("  F4                    Stop the process");
    eprintln!("  F5                    Clear output");
    eprintln!("  F10, Ctrl+Q           Quit");
    eprintln!("  PageUp/PageDown       Scroll");
    eprintln!("  Shift+Arrows          Select text");
    eprintln!("  Ctrl+C                Copy selection");
    eprintln!();
    eprintln!("Configuration: ~/.consolectl/config.toml");
    eprintln!();
    eprintln!("Color schemes: {}", ColorScheme::list().join(", "));
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    parse_args_from(&args[1..])
}

fn parse_args_from(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-d" | "--diagnostics" => {
                options.diagnostics = true;
            }
            "--no-input" => {
                options.no_input = true;
            }
            "-s" | "--shell" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing shell argument".to_string());
                }
                options.shell = Some(args[i].clone());
            }
            "--" => {
                let rest = &args[i + 1..];
                let Some((program, program_args)) = rest.split_first() else {
                    return Err("Missing program after --".to_string());
                };
                options.command = Some((program.clone(), join_args(program_args)));
                break;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Rebuild an argument string the child's platform will split back apart
fn join_args(args: &[String]) -> String {
    if cfg!(windows) {
        args.iter().map(|arg| quote_windows_arg(arg)).collect::<Vec<_>>().join(" ")
    } else {
        shell_words::join(args)
    }
}

/// Quote one argument for the MSVC runtime's command line parser.
///
/// Backslashes are literal unless they come before a `"`, so only those
/// runs (and a run at the end of a quoted argument) are doubled.
fn quote_windows_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0;
    for ch in arg.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                quoted.push_str(&"\\".repeat(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            c => {
                quoted.push_str(&"\\".repeat(backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }
    quoted.push_str(&"\\".repeat(backslashes * 2));
    quoted.push('"');
    quoted
}

fn init_logging() {
    let log_path = config::config_dir()
        .map(|dir| dir.join("consolectl.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("consolectl.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("CONSOLECTL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("consolectl {} starting...", VERSION);

    let mut config = Config::load();
    if options.diagnostics {
        config.show_diagnostics = true;
    }
    if options.no_input {
        config.input_enabled = false;
    }
    if let Some(shell) = &options.shell {
        config.shell = Some(shell.clone());
    }

    let result = run(config, options.command);
    if let Err(e) = &result {
        error!("consolectl failed: {:#}", e);
    }
    info!("consolectl exiting");
    result
}

/// State of the running sample
struct App {
    console: ConsoleControl,
    renderer: Renderer,
    prompt: Option<NewProcessPrompt>,
    shell: String,
    quit: bool,
}

fn run(config: Config, command: Option<(String, String)>) -> anyhow::Result<()> {
    let mut renderer = Renderer::with_color_scheme(config.get_color_scheme());
    renderer.status_bar_visible = config.status_bar.visible;
    renderer.init()?;

    let mut app = App {
        console: ConsoleControl::new(config.console_options()),
        renderer,
        prompt: None,
        shell: config.shell_command(),
        quit: false,
    };

    if let Some((program, args)) = command {
        app.start(&program, &args);
    }

    let result = run_main_loop(&mut app);
    app.console.stop_process();
    app.renderer.cleanup()?;
    result
}

fn run_main_loop(app: &mut App) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);
    let mut dirty = true;

    while !app.quit {
        if app.console.pump() > 0 {
            dirty = true;
        }
        for event in app.console.take_events() {
            debug!(?event, "console event");
        }

        if dirty {
            app.renderer.render(&app.console, app.prompt.as_ref())?;
            dirty = false;
        }

        if !event::poll(poll_timeout)? {
            continue;
        }
        match event::read()? {
            Event::Key(key_event) => {
                // Only process key press events
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }
                app.handle_key(&key_event);
                dirty = true;
            }
            Event::Paste(text) => {
                match app.prompt.as_mut() {
                    Some(prompt) => prompt.paste(&text),
                    None => {
                        if app.console.paste(&text) == KeyOutcome::Edited {
                            app.renderer.reset_scroll();
                        }
                    }
                }
                dirty = true;
            }
            Event::Resize(cols, rows) => {
                debug!("Resize: {}x{}", cols, rows);
                dirty = true;
            }
            _ => {}
        }
    }
    Ok(())
}

impl App {
    fn handle_key(&mut self, key_event: &KeyEvent) {
        if let Some(prompt) = self.prompt.as_mut() {
            match prompt.handle_key(key_event) {
                PromptOutcome::Pending => {}
                PromptOutcome::Cancelled => self.prompt = None,
                PromptOutcome::Submit { file, arguments } => {
                    self.prompt = None;
                    self.start(&file, &arguments);
                }
            }
            return;
        }

        match KeyMapper::map(key_event) {
            KeyInput::App(action) => self.execute(action),
            KeyInput::Console(key) => match self.console.handle_key(key) {
                KeyOutcome::Copy(text) => copy_to_clipboard(&text),
                KeyOutcome::Moved | KeyOutcome::Edited | KeyOutcome::Submitted(_) => {
                    self.renderer.reset_scroll();
                }
                KeyOutcome::Ignored | KeyOutcome::Swallowed => {}
            },
            KeyInput::Unmapped => {}
        }
    }

    fn execute(&mut self, action: AppAction) {
        match action {
            AppAction::StartShell => {
                // Program paths may hold backslashes, so only split at whitespace
                let shell = self.shell.trim().to_string();
                let (program, args) = shell
                    .split_once(char::is_whitespace)
                    .map(|(program, args)| (program, args.trim()))
                    .unwrap_or((shell.as_str(), ""));
                self.start(program, args);
            }
            AppAction::NewProcess => {
                let file = self
                    .console
                    .process_file_name()
                    .map(|p| p.display().to_string());
                self.prompt = Some(NewProcessPrompt::new(file, self.console.process_arguments()));
            }
            AppAction::StopProcess => self.console.stop_process(),
            AppAction::ClearOutput => {
                self.console.clear_output();
                self.renderer.reset_scroll();
            }
            AppAction::ScrollUp => {
                let (_, rows) = Renderer::size().unwrap_or((80, 24));
                let page = self.renderer.text_rows(rows).saturating_sub(1).max(1);
                self.renderer.scroll_up(page);
            }
            AppAction::ScrollDown => {
                let (_, rows) = Renderer::size().unwrap_or((80, 24));
                let page = self.renderer.text_rows(rows).saturating_sub(1).max(1);
                self.renderer.scroll_down(page);
            }
            AppAction::Quit => self.quit = true,
        }
    }

    fn start(&mut self, program: &str, args: &str) {
        info!("Starting {} {}", program, args);
        if let Err(e) = self.console.start_process(program, args) {
            self.console
                .write_output(&format!("Could not start {}: {}\n", program, e), TextKind::Diagnostic);
        }
        self.renderer.reset_scroll();
    }
}

fn copy_to_clipboard(text: &str) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text.to_string()) {
                warn!("Failed to copy to clipboard: {}", e);
            }
        }
        Err(e) => warn!("Clipboard unavailable: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags() {
        let options = parse_args_from(&args(&["-d", "--no-input", "-s", "pwsh.exe"])).unwrap();
        assert!(options.diagnostics);
        assert!(options.no_input);
        assert_eq!(options.shell.as_deref(), Some("pwsh.exe"));
        assert!(options.command.is_none());
    }

    #[test]
    fn test_parse_trailing_command() {
        let options = parse_args_from(&args(&["--", "ping", "-c", "1", "my host"])).unwrap();
        let expected = if cfg!(windows) { "-c 1 \"my host\"" } else { "-c 1 'my host'" };
        assert_eq!(options.command, Some(("ping".to_string(), expected.to_string())));
    }

    #[test]
    fn test_quote_windows_arg() {
        assert_eq!(quote_windows_arg("plain"), "plain");
        assert_eq!(quote_windows_arg(r"C:\dir\file.txt"), r"C:\dir\file.txt");
        assert_eq!(quote_windows_arg(""), r#""""#);
        assert_eq!(quote_windows_arg("my host"), r#""my host""#);
        assert_eq!(quote_windows_arg(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote_windows_arg(r"C:\my dir\"), r#""C:\my dir\\""#);
        assert_eq!(quote_windows_arg(r#"a\"b"#), r#""a\\\"b""#);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args_from(&args(&["-s"])).is_err());
        assert!(parse_args_from(&args(&["--"])).is_err());
        assert!(parse_args_from(&args(&["--bogus"])).is_err());
    }
}
