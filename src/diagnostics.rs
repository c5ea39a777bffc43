//! Leveled diagnostic output injected into every component.
//!
//! Components report through a [`Diagnostics`] sink instead of calling a
//! global logger, so the minimum severity is decided once per run by whoever
//! builds the sink and tests can observe exactly what was reported.

use log::Level;
use std::cell::RefCell;

/// Receiver of diagnostic messages.
pub trait Diagnostics {
    /// Records one message at the given severity.
    fn report(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.report(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.report(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.report(Level::Warn, message);
    }
}

/// Forwards every message to the `log` facade.
#[derive(Debug, Default)]
pub struct LogDiagnostics;

impl LogDiagnostics {
    pub fn new() -> Self {
        Self
    }
}

impl Diagnostics for LogDiagnostics {
    fn report(&self, level: Level, message: &str) {
        log::log!(target: "sheetgen", level, "{message}");
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: RefCell<Vec<(Level, String)>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, oldest first.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.borrow().clone()
    }

    /// Messages recorded at exactly `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn report(&self, level: Level, message: &str) {
        self.entries.borrow_mut().push((level, message.to_string()));
    }
}
