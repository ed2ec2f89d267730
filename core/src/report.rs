//! End-of-run summary.

use std::fmt;

/// Per-run counters. Recoverable failures show up here and in the log,
/// never in the exit status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub notebooks: usize,
    pub notebooks_skipped: usize,
    pub cells_scanned: usize,
    pub cells_with_issues: usize,
    pub issues: usize,
    pub rewrites: usize,
    pub fallbacks: usize,
    pub rejected: usize,
    pub service_errors: usize,
    pub patches_applied: usize,
    pub patch_failures: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    changed: Vec<String>,
    pub stats: RunStats,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a notebook (repository-relative path) with an accepted change.
    pub fn record_changed(&mut self, notebook: impl Into<String>) {
        let notebook = notebook.into();
        if !self.changed.contains(&notebook) {
            self.changed.push(notebook);
        }
    }

    pub fn changed(&self) -> &[String] {
        &self.changed
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changed.is_empty() {
            return writeln!(f, "👍  No deprecated API usage needed changes; nothing to do.");
        }
        writeln!(f, "🎉 Notebooks updated:")?;
        for path in &self.changed {
            writeln!(f, " • {path}")?;
        }
        writeln!(f, "Review and commit these changes when ready.")
    }
}
