//! Unified-diff handling for model-generated patches.
//!
//! Model output is rarely a clean patch: it arrives wrapped in markdown
//! fences, preceded by chatter, and with file headers pointing at whatever
//! path the model saw in its prompt. [`sanitize_diff`] turns that into a
//! diff that `patch -p1` accepts against the repository root, and
//! [`PatchRunner`] pipes it into the external patch program.

pub mod error;
mod runner;
mod sanitize;

pub use error::PatchError;
pub use error::Result;
pub use runner::PatchOutcome;
pub use runner::PatchRunner;
pub use sanitize::DIFF_HEADER;
pub use sanitize::is_unified_diff;
pub use sanitize::sanitize_diff;
