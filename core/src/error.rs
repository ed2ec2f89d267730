//! Error types for the migration pipeline.
//!
//! Only [`MigrateError::MissingCredential`] and [`MigrateError::InvalidRule`]
//! stop a run. Everything else is scoped to one notebook or one cell: the
//! pipeline logs it and moves on.

use nbmigrate_apply_patch::PatchError;
use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("{env_var} missing; export it then retry")]
    MissingCredential { env_var: &'static str },

    #[error("invalid deprecation rule `{pattern}`: {reason}")]
    InvalidRule { pattern: String, reason: String },

    #[error("invalid notebook {}: {reason}", path.display())]
    InvalidNotebook { path: PathBuf, reason: String },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse rules file {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}

impl MigrateError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Errors that abort the whole run rather than one notebook.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::InvalidRule { .. } | Self::Toml { .. }
        )
    }
}

/// Failures talking to the text-generation service.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode service response: {0}")]
    Decode(String),

    #[error("service returned no completion")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}
