//! CLI output formatting utilities.
//!
//! The final status line goes to stderr as `[OK] ...` or `[ERR] ...`, colored
//! when the terminal supports it. Machine-readable output (classpaths) goes to stdout.

use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

pub mod tags {
  pub const OK: &str = "[OK]";
  pub const ERR: &str = "[ERR]";
}

pub fn print_ok(message: &str) {
  eprintln!(
    "{} {}",
    tags::OK.if_supports_color(Stream::Stderr, |s| s.green()),
    message
  );
}

pub fn print_err(message: &str) {
  eprintln!(
    "{} {}",
    tags::ERR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Whole milliseconds are enough for a build summary.
pub fn format_elapsed(elapsed: Duration) -> String {
  humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}
