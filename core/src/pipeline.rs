//! The migration run: notebooks one at a time, cells one at a time.
//!
//! Per cell:
//!
//! ```text
//! unscanned -> scanned(no issue)                      terminal
//!           -> scanned(issue) -> requested -> validated -> applied
//!                                          -> rejected  -> unchanged
//! ```
//!
//! A service error also ends the cell as unchanged. Every cell is visited
//! once; there are no retries.

use crate::apply::ChangeApplier;
use crate::client::TextGenerator;
use crate::config::MigrateConfig;
use crate::config::OutputMode;
use crate::config::ScanStrategy;
use crate::error::Result;
use crate::notebook::Notebook;
use crate::notebook::discover_notebooks;
use crate::notebook::relative_path;
use crate::prompt::build_request;
use crate::report::RunReport;
use crate::report::RunStats;
use crate::scanner::CellRef;
use crate::scanner::scan;
use crate::scanner::warning_issues;
use crate::validate::ChangeResult;
use crate::validate::validate_diff;
use crate::validate::validate_rewrite;
use crate::warnings::CapturedWarning;
use crate::warnings::KernelRunner;
use nbmigrate_apply_patch::PatchRunner;
use std::path::Path;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Terminal state of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    NoIssue,
    Applied,
    Unchanged,
}

pub struct Migrator<G> {
    config: MigrateConfig,
    generator: G,
    applier: ChangeApplier,
    kernel: KernelRunner,
}

impl<G: TextGenerator> Migrator<G> {
    pub fn new(config: MigrateConfig, generator: G) -> Self {
        let patch = PatchRunner::new(&config.repo_root)
            .with_program(&config.patch_program)
            .with_dry_run(config.dry_run);
        let kernel = KernelRunner::nbconvert(config.exec_timeout);
        Self {
            applier: ChangeApplier::new(patch),
            kernel,
            config,
            generator,
        }
    }

    /// Replace the notebook executor used by [`ScanStrategy::Dynamic`].
    pub fn with_kernel(mut self, kernel: KernelRunner) -> Self {
        self.kernel = kernel;
        self
    }

    /// Process every notebook under the repository root.
    ///
    /// Only failing to list the repository is an error; problems with a
    /// single notebook or cell are logged and counted.
    pub async fn run(&self) -> Result<RunReport> {
        let root = &self.config.repo_root;
        let notebooks = discover_notebooks(root)?;
        info!(
            "scanning {} notebook(s) under {} ({} mode, {} scan)",
            notebooks.len(),
            root.display(),
            self.config.mode,
            self.config.scan
        );

        let mut report = RunReport::new();
        for path in notebooks {
            let rel = relative_path(root, &path);
            report.stats.notebooks += 1;
            match self.process_notebook(&path, &rel, &mut report.stats).await {
                Ok(true) => report.record_changed(rel),
                Ok(false) => {}
                Err(e) => {
                    report.stats.notebooks_skipped += 1;
                    warn!("skipping {rel}: {e}");
                }
            }
        }
        Ok(report)
    }

    /// Returns whether at least one change was accepted for the notebook.
    pub async fn process_notebook(&self, path: &Path, rel: &str, stats: &mut RunStats) -> Result<bool> {
        let mut notebook = Notebook::load(path)?;

        let warnings = match self.config.scan {
            ScanStrategy::Static => Vec::new(),
            ScanStrategy::Dynamic => {
                let warnings = self
                    .kernel
                    .collect_warnings(path, self.config.exec_timeout)
                    .await;
                info!("{rel} -> {} warning(s) captured", warnings.len());
                for w in &warnings {
                    debug!("   • {w}");
                }
                if warnings.is_empty() {
                    return Ok(false);
                }
                warnings
            }
        };

        let cells: Vec<(usize, String)> = notebook
            .code_cells()
            .map(|(index, cell)| (index, cell.source().to_string()))
            .collect();

        let mut changed = false;
        for (index, text) in cells {
            let cell = CellRef::new(rel, index);
            let outcome = self
                .process_cell(&mut notebook, &cell, &text, &warnings, stats)
                .await?;
            changed |= outcome == CellOutcome::Applied;
        }

        if notebook.is_dirty() {
            if self.config.dry_run {
                info!("dry run: not writing {rel}");
            } else {
                notebook.save()?;
                info!("wrote {rel}");
            }
        }
        Ok(changed)
    }

    async fn process_cell(
        &self,
        notebook: &mut Notebook,
        cell: &CellRef,
        text: &str,
        warnings: &[CapturedWarning],
        stats: &mut RunStats,
    ) -> Result<CellOutcome> {
        stats.cells_scanned += 1;
        let issues = match self.config.scan {
            ScanStrategy::Static => scan(text, &self.config.rules, cell),
            ScanStrategy::Dynamic => warning_issues(text, warnings, cell),
        };
        if issues.is_empty() {
            return Ok(CellOutcome::NoIssue);
        }
        stats.cells_with_issues += 1;
        stats.issues += issues.len();
        debug!("{cell}: {} issue(s)", issues.len());

        let request = build_request(self.config.mode, &cell.notebook, text, &issues);
        let response = match self
            .generator
            .generate(&request.instruction, &request.context)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                stats.service_errors += 1;
                warn!("{cell}: rewrite request failed, skipping cell: {e}");
                return Ok(CellOutcome::Unchanged);
            }
        };

        match self.config.mode {
            OutputMode::InPlace => match validate_rewrite(text, &response, &issues) {
                ChangeResult::ValidatedRewrite(fixed) => {
                    stats.rewrites += 1;
                    self.applier.apply_in_place(notebook, cell.index, &fixed)?;
                    info!("→ {cell} rewritten");
                    Ok(CellOutcome::Applied)
                }
                ChangeResult::ValidatedFallback(fixed) => {
                    stats.fallbacks += 1;
                    self.applier.apply_in_place(notebook, cell.index, &fixed)?;
                    warn!("{cell}: model output rejected, applied fallback substitution");
                    Ok(CellOutcome::Applied)
                }
                ChangeResult::Rejected { reason } => {
                    stats.rejected += 1;
                    warn!("{cell}: {reason}; leaving cell unchanged");
                    Ok(CellOutcome::Unchanged)
                }
            },
            OutputMode::Diff => match validate_diff(&response, &cell.notebook) {
                ChangeResult::ValidatedRewrite(diff) | ChangeResult::ValidatedFallback(diff) => {
                    debug!("{cell}: normalized diff\n{diff}");
                    match self.applier.apply_diff(&diff).await {
                        Ok(_) => {
                            stats.patches_applied += 1;
                            info!("✅ {cell}: patch applied");
                            Ok(CellOutcome::Applied)
                        }
                        Err(e) => {
                            stats.patch_failures += 1;
                            warn!("⚠️  {cell}: patch not applied, manual review required: {e}");
                            Ok(CellOutcome::Unchanged)
                        }
                    }
                }
                ChangeResult::Rejected { reason } => {
                    stats.rejected += 1;
                    warn!("{cell}: {reason}; ignored");
                    Ok(CellOutcome::Unchanged)
                }
            },
        }
    }
}
