use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatchError>;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("invalid patch format: {0}")]
    InvalidPatch(String),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("patch application failed (exit status {status:?}): {stderr}")]
    ApplicationFailed { status: Option<i32>, stderr: String },

    #[error("{context}: {source}")]
    IoError {
        context: String,
        #[source]
        source: io::Error,
    },
}

// Manual PartialEq implementation since io::Error doesn't implement PartialEq
impl PartialEq for PatchError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PatchError::InvalidPatch(a), PatchError::InvalidPatch(b)) => a == b,
            (
                PatchError::Spawn {
                    program: p1,
                    source: s1,
                },
                PatchError::Spawn {
                    program: p2,
                    source: s2,
                },
            ) => p1 == p2 && s1.kind() == s2.kind(),
            (
                PatchError::ApplicationFailed {
                    status: a1,
                    stderr: e1,
                },
                PatchError::ApplicationFailed {
                    status: a2,
                    stderr: e2,
                },
            ) => a1 == a2 && e1 == e2,
            (
                PatchError::IoError {
                    context: c1,
                    source: s1,
                },
                PatchError::IoError {
                    context: c2,
                    source: s2,
                },
            ) => c1 == c2 && s1.to_string() == s2.to_string(),
            _ => false,
        }
    }
}
