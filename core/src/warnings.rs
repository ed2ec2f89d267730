//! Runtime deprecation warnings, harvested by executing a notebook.
//!
//! The notebook is run by an external kernel runner (`jupyter nbconvert`
//! by default) with `PYTHONWARNINGS=always`. Warnings printed to the cells'
//! stderr streams are parsed out of the executed document. Failures and
//! timeouts only cost the warnings that were not captured.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use tracing::warn;

const DEPRECATION_CATEGORIES: &[&str] = &[
    "DeprecationWarning",
    "FutureWarning",
    "PendingDeprecationWarning",
];

lazy_static! {
    /// `path/to/file.py:12: FutureWarning: message`, location optional.
    #[allow(clippy::expect_used)]
    static ref WARNING_LINE: Regex =
        Regex::new(r"(?m)^(?:.*?:\d+: )?([A-Za-z_]*Warning): (.+?)\r?$").expect("warning regex compiles");
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapturedWarning {
    pub category: String,
    pub message: String,
}

impl CapturedWarning {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn is_deprecation(&self) -> bool {
        DEPRECATION_CATEGORIES.contains(&self.category.as_str())
            || self.message.to_lowercase().contains("deprecated")
    }
}

impl fmt::Display for CapturedWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Extract `Category: message` warnings from stderr text, deduplicated in
/// first-seen order.
pub fn parse_warning_text(text: &str) -> Vec<CapturedWarning> {
    let mut found = Vec::new();
    for caps in WARNING_LINE.captures_iter(text) {
        let warning = CapturedWarning::new(&caps[1], caps[2].trim());
        if !found.contains(&warning) {
            found.push(warning);
        }
    }
    found
}

/// Warnings from the stderr stream outputs of an executed notebook.
pub fn warnings_from_executed_notebook(json: &str) -> Vec<CapturedWarning> {
    let document: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            debug!("executed notebook output is not JSON: {e}");
            return Vec::new();
        }
    };

    let mut stderr = String::new();
    let cells = document
        .get("cells")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for cell in cells {
        let outputs = cell
            .get("outputs")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for output in outputs {
            let is_stderr = output.get("output_type").and_then(Value::as_str) == Some("stream")
                && output.get("name").and_then(Value::as_str) == Some("stderr");
            if !is_stderr {
                continue;
            }
            match output.get("text") {
                Some(Value::String(s)) => stderr.push_str(s),
                Some(Value::Array(lines)) => {
                    lines.iter().filter_map(Value::as_str).for_each(|l| stderr.push_str(l));
                }
                _ => {}
            }
            if !stderr.ends_with('\n') {
                stderr.push('\n');
            }
        }
    }
    parse_warning_text(&stderr)
}

/// External process that executes a notebook and prints the executed
/// document on stdout.
#[derive(Debug, Clone)]
pub struct KernelRunner {
    program: String,
    args: Vec<String>,
}

impl KernelRunner {
    /// `jupyter nbconvert --to notebook --execute --stdout`, errors allowed
    /// so one failing cell does not hide later warnings.
    pub fn nbconvert(cell_timeout: Duration) -> Self {
        Self {
            program: "jupyter".to_string(),
            args: vec![
                "nbconvert".to_string(),
                "--to".to_string(),
                "notebook".to_string(),
                "--execute".to_string(),
                "--stdout".to_string(),
                "--allow-errors".to_string(),
                format!("--ExecutePreprocessor.timeout={}", cell_timeout.as_secs()),
            ],
        }
    }

    /// Custom runner; the notebook path is appended as the last argument.
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Execute `notebook` and collect its deprecation-related output.
    ///
    /// Never fails: spawn errors, non-zero exits and timeouts are logged and
    /// whatever was captured is returned.
    pub async fn collect_warnings(&self, notebook: &Path, timeout: Duration) -> Vec<CapturedWarning> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(notebook)
            .env("PYTHONWARNINGS", "always")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("execution error in {}: failed to run `{}`: {e}", notebook.display(), self.program);
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    "execution of {} abandoned after {}s",
                    notebook.display(),
                    timeout.as_secs()
                );
                return Vec::new();
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                "execution error in {} (status {:?}): {}",
                notebook.display(),
                output.status.code(),
                stderr.lines().last().unwrap_or_default()
            );
        }

        let mut warnings = warnings_from_executed_notebook(&String::from_utf8_lossy(&output.stdout));
        for w in parse_warning_text(&String::from_utf8_lossy(&output.stderr)) {
            if !warnings.contains(&w) {
                warnings.push(w);
            }
        }
        debug!("{} -> {} warning(s) captured", notebook.display(), warnings.len());
        warnings
    }
}
