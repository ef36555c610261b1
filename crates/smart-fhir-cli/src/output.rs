//! User-facing messages on stderr.
//!
//! stdout carries nothing but FHIR JSON so it can be piped; diagnostics go
//! through `tracing` instead.

use owo_colors::OwoColorize;
use std::env;
use std::fmt::Display;

/// How chatty the CLI is. Errors and their hints ignore this.
#[derive(Debug, Clone, Copy)]
pub enum OutputLevel {
    Normal,
    /// `--quiet`: only errors
    Quiet,
    /// `--verbose`: also debug logging
    Verbose,
}

impl OutputLevel {
    pub fn show_user(&self) -> bool {
        !matches!(self, Self::Quiet)
    }
}

fn colors_disabled() -> bool {
    env::var("NO_COLOR").is_ok()
        || env::var("TERM").is_ok_and(|t| t == "dumb")
        || !atty::is(atty::Stream::Stderr)
}

/// Pick the styled rendering unless colors are off
fn paint(plain: &str, styled: impl Display) -> String {
    if colors_disabled() {
        plain.to_string()
    } else {
        styled.to_string()
    }
}

#[derive(Clone, Copy)]
enum Label {
    Warning,
    Error,
    Hint,
}

fn labelled(label: Label, msg: &str) {
    let line = match label {
        Label::Warning => format!(
            "{} {}",
            paint("Warning:", "Warning:".yellow().bold()),
            paint(msg, msg.yellow())
        ),
        Label::Error => format!(
            "{} {}",
            paint("Error:", "Error:".red().bold()),
            paint(msg, msg.red())
        ),
        Label::Hint => format!(
            "{} {}",
            paint("Hint:", "Hint:".blue().bold()),
            paint(msg, msg.blue())
        ),
    };
    eprintln!("{line}");
}

pub fn heading(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        eprintln!("{}", paint(msg, msg.bold()));
    }
}

pub fn note(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        eprintln!("{msg}");
    }
}

/// One `name: value` line of a session or config listing
pub fn field(name: &str, value: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        eprintln!("  {} {value}", paint(&format!("{name}:"), format!("{name}:").dimmed()));
    }
}

pub fn success(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        eprintln!("{}", paint(msg, msg.green()));
    }
}

/// Announce a step in flight, e.g. "Opening browser for sign-in…"
pub fn progress(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        let msg = format!("{}…", msg.trim_end_matches('…'));
        eprintln!("{}", paint(&msg, msg.cyan()));
    }
}

pub fn warning(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        labelled(Label::Warning, msg);
    }
}

/// Always shown, even with `--quiet`
pub fn error(msg: &str, _output_level: OutputLevel) {
    labelled(Label::Error, msg);
}

/// Error followed by a recovery hint; both always shown
pub fn error_with_suggestion(msg: &str, suggestion: &str, _output_level: OutputLevel) {
    labelled(Label::Error, msg);
    labelled(Label::Hint, suggestion);
}

pub fn format_patient(patient: &str) -> String {
    paint(patient, patient.magenta().bold())
}

/// Authorization and logout URLs the user may have to open by hand
pub fn format_url(url: &str) -> String {
    paint(url, url.cyan().underline())
}

/// A command the user can type, in backticks
pub fn format_command(cmd: &str) -> String {
    format!("`{}`", paint(cmd, cmd.yellow().bold()))
}
