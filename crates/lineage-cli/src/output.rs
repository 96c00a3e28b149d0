//! Terminal styling for command reports
//!
//! Reports go to stdout, the `error:` line to stderr. Both streams share one
//! color decision.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Pick the color mode for this run
///
/// A set `NO_COLOR` wins over `--color`; an absent or unknown flag value
/// leaves the decision to TTY detection.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

fn paint(stream: &mut StandardStream, text: &str, color: Option<Color>, bold: bool) {
    let mut spec = ColorSpec::new();
    spec.set_fg(color).set_bold(bold);
    let _ = stream.set_color(&spec);
    let _ = stream.write_all(text.as_bytes());
    let _ = stream.reset();
}

/// Report writer over stdout and stderr
///
/// Write failures (a closed pipe, say) are ignored.
pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    /// Headline verb such as `Scanned`
    pub fn success(&mut self, text: &str) {
        paint(&mut self.stdout, text, Some(Color::Green), true);
    }

    pub fn warning(&mut self, text: &str) {
        paint(&mut self.stdout, text, Some(Color::Yellow), true);
    }

    /// Class and unit names
    pub fn info(&mut self, text: &str) {
        paint(&mut self.stdout, text, Some(Color::Cyan), false);
    }

    /// Labels and checksums
    pub fn dim(&mut self, text: &str) {
        paint(&mut self.stdout, text, Some(Color::White), false);
    }

    pub fn bold(&mut self, text: &str) {
        paint(&mut self.stdout, text, None, true);
    }

    pub fn plain(&mut self, text: &str) {
        let _ = self.stdout.write_all(text.as_bytes());
    }

    pub fn newline(&mut self) {
        self.plain("\n");
    }

    /// One `label value` report line, labels aligned to a column
    pub fn field(&mut self, label: &str, value: &str) {
        self.dim(&format!("{:<14}", label));
        self.plain(value);
        self.newline();
    }

    pub fn stderr_error(&mut self, text: &str) {
        paint(&mut self.stderr, text, Some(Color::Red), true);
    }

    pub fn stderr_plain(&mut self, text: &str) {
        let _ = self.stderr.write_all(text.as_bytes());
    }
}
