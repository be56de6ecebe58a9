//! Line-oriented user output.
//!
//! Fetch and add operations report progress through fixed one-line messages
//! (`cloning '<url>' with branch '<branch>'`, `adding dependency '<name>'`,
//! ...). External tooling matches on these lines, so they are kept apart from
//! `tracing` diagnostics and written verbatim to the shell's sink. The sink is
//! stderr by default and can be swapped for an in-memory buffer.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Status types for CLI summary messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Added,
    Updated,
    Resolved,
    Warning,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Added => "Added",
            Status::Updated => "Updated",
            Status::Resolved => "Resolved",
            Status::Warning => "warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Added | Status::Updated | Status::Resolved => "\x1b[1;32m",
            Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

enum Sink {
    Stderr,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

/// Destination for user-facing lines. Cheap to share behind an `Arc`.
pub struct Shell {
    sink: Sink,
    use_color: bool,
    quiet: bool,
}

impl Shell {
    /// Shell writing to stderr.
    pub fn new(color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };

        Shell {
            sink: Sink::Stderr,
            use_color,
            quiet: false,
        }
    }

    /// Shell collecting everything into a buffer that the caller can read back.
    pub fn capture() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let shell = Shell {
            sink: Sink::Buffer(Arc::clone(&buffer)),
            use_color: false,
            quiet: false,
        };
        (shell, buffer)
    }

    /// Suppress status messages. Contract lines are still written.
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Write one contract line, exactly as given, followed by a newline.
    pub fn line(&self, msg: impl Display) {
        self.write_raw(&format!("{}\n", msg));
    }

    /// Print a `{status:>12} {message}` summary line.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.quiet && status != Status::Error {
            return;
        }

        let text = status.as_str();
        let prefix = if self.use_color {
            format!("{}{:>12}\x1b[0m", status.color_code(), text)
        } else {
            format!("{:>12}", text)
        };
        self.write_raw(&format!("{} {}\n", prefix, msg));
    }

    /// Print a warning message.
    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    fn write_raw(&self, s: &str) {
        match &self.sink {
            Sink::Stderr => {
                let mut err = io::stderr().lock();
                let _ = err.write_all(s.as_bytes());
                let _ = err.flush();
            }
            Sink::Buffer(buf) => {
                if let Ok(mut buf) = buf.lock() {
                    buf.extend_from_slice(s.as_bytes());
                }
            }
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ColorChoice::Auto)
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sink = match self.sink {
            Sink::Stderr => "stderr",
            Sink::Buffer(_) => "buffer",
        };
        f.debug_struct("Shell")
            .field("sink", &sink)
            .field("use_color", &self.use_color)
            .field("quiet", &self.quiet)
            .finish()
    }
}

/// Read a capture buffer as a string.
#[cfg(test)]
pub fn captured(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    buffer
        .lock()
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}
