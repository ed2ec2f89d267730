//! Run configuration.
//!
//! Everything the pipeline needs is gathered into [`MigrateConfig`] and
//! [`ServiceConfig`] once at startup and passed in explicitly; nothing is
//! read from the environment after that.

use crate::error::MigrateError;
use crate::error::Result;
use crate::rules::RuleSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";
pub const REPO_ROOT_ENV: &str = "CONTENT_REPO";
pub const MODEL_ENV: &str = "MISTRAL_MODEL";
pub const ENDPOINT_ENV: &str = "MISTRAL_ENDPOINT";
pub const EXEC_TIMEOUT_ENV: &str = "EXEC_TIMEOUT";

pub const DEFAULT_MODEL: &str = "mistral-small";
pub const DEFAULT_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PATCH_PROGRAM: &str = "patch";

/// What the model is asked to return and how it is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Full corrected snippet, stored into the cell.
    #[default]
    InPlace,
    /// Unified diff, applied with the external patch program.
    Diff,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::InPlace => write!(f, "in-place"),
            OutputMode::Diff => write!(f, "diff"),
        }
    }
}

/// Where issues come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStrategy {
    /// Match the rule table against cell text.
    #[default]
    Static,
    /// Execute the notebook and attribute captured warnings to cells.
    Dynamic,
}

impl fmt::Display for ScanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStrategy::Static => write!(f, "static"),
            ScanStrategy::Dynamic => write!(f, "dynamic"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub repo_root: PathBuf,
    pub mode: OutputMode,
    pub scan: ScanStrategy,
    pub rules: RuleSet,
    pub exec_timeout: Duration,
    pub patch_program: String,
    /// Do everything except writing notebooks; patches run with `--dry-run`.
    pub dry_run: bool,
}

impl MigrateConfig {
    pub fn new(repo_root: impl Into<PathBuf>, rules: RuleSet) -> Self {
        Self {
            repo_root: repo_root.into(),
            mode: OutputMode::default(),
            scan: ScanStrategy::default(),
            rules,
            exec_timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            patch_program: DEFAULT_PATCH_PROGRAM.to_string(),
            dry_run: false,
        }
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scan(mut self, scan: ScanStrategy) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn with_patch_program(mut self, program: impl Into<String>) -> Self {
        self.patch_program = program.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Connection settings for the text-generation service.
#[derive(Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl ServiceConfig {
    /// Fails with [`MigrateError::MissingCredential`] when no usable key is
    /// present; this is checked before any other work starts.
    pub fn new(api_key: Option<String>, model: Option<String>, endpoint: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(MigrateError::MissingCredential {
                env_var: API_KEY_ENV,
            })?;
        Ok(Self {
            api_key,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: endpoint
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }
}

// Keep the key out of logs.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
