//! Writing accepted changes.

use crate::error::Result;
use crate::notebook::Notebook;
use nbmigrate_apply_patch::PatchError;
use nbmigrate_apply_patch::PatchOutcome;
use nbmigrate_apply_patch::PatchRunner;

#[derive(Debug, Clone)]
pub struct ChangeApplier {
    patch: PatchRunner,
}

impl ChangeApplier {
    pub fn new(patch: PatchRunner) -> Self {
        Self { patch }
    }

    /// Store accepted text into code cell `index`; marks the notebook dirty
    /// when the text differs. Disk is untouched until [`Notebook::save`].
    pub fn apply_in_place(&self, notebook: &mut Notebook, index: usize, text: &str) -> Result<bool> {
        notebook.replace_source(index, text)
    }

    /// Pipe an accepted diff into the patch program. A non-zero exit is
    /// returned as [`PatchError::ApplicationFailed`]; nothing is retried.
    pub async fn apply_diff(&self, diff: &str) -> std::result::Result<PatchOutcome, PatchError> {
        self.patch.apply(diff).await
    }
}
