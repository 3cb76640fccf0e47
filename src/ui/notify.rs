//! User-facing notifications.
//!
//! Data-access code only returns errors. Whoever owns the UI decides whether
//! to show them, through a [`Notifier`] for its toolkit.

use std::io::{self, Write};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Info,
}

/// Displays a titled message to the user and blocks until it is dismissed
pub trait Notifier {
    /// What the dialog is positioned against, e.g. a parent window
    type Anchor: ?Sized;

    fn show(&self, anchor: &Self::Anchor, title: &str, message: &str, severity: Severity);
}

pub fn notify_error<N: Notifier + ?Sized>(
    notifier: &N,
    anchor: &N::Anchor,
    title: &str,
    message: &str,
) {
    notifier.show(anchor, title, message, Severity::Error);
}

pub fn notify_success<N: Notifier + ?Sized>(
    notifier: &N,
    anchor: &N::Anchor,
    title: &str,
    message: &str,
) {
    notifier.show(anchor, title, message, Severity::Info);
}

/// Writes notifications as text lines, for terminals and headless runs
pub struct ConsoleNotifier<W> {
    out: Mutex<W>,
}

impl ConsoleNotifier<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> ConsoleNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write> Notifier for ConsoleNotifier<W> {
    type Anchor = ();

    fn show(&self, _anchor: &(), title: &str, message: &str, severity: Severity) {
        let label = match severity {
            Severity::Error => "error",
            Severity::Info => "info",
        };
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Nowhere left to report a failed write
        let _ = writeln!(out, "[{}] {}: {}", label, title, message).and_then(|()| out.flush());
    }
}
