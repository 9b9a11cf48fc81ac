//! Per-run outcome aggregation.

use serde::Serialize;

/// Outcome of a job across many symbols.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<R> {
    /// Reports for symbols that completed.
    pub completed: Vec<R>,
    /// Symbols aborted by a read failure, with the error message.
    pub failed: Vec<(String, String)>,
}

impl<R> Default for RunSummary<R> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<R> RunSummary<R> {
    /// Record a per-symbol result.
    pub fn record(&mut self, symbol: &str, result: crate::Result<R>) {
        match result {
            Ok(report) => self.completed.push(report),
            Err(e) => self.failed.push((symbol.to_string(), e.to_string())),
        }
    }

    /// Whether every symbol completed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
