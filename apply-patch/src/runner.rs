use crate::error::PatchError;
use crate::error::Result;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// How much of the patch program's stderr is kept in error reports.
const STDERR_EXCERPT_CHARS: usize = 200;

/// Output of a successful patch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub stdout: String,
}

/// Pipes unified diffs into an external patch program.
///
/// Defaults to `patch -p1 --forward`, run from the repository root so the
/// `a/<path>` / `b/<path>` headers resolve with one stripped component.
#[derive(Debug, Clone)]
pub struct PatchRunner {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    dry_run: bool,
}

impl PatchRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "patch".to_string(),
            args: vec!["-p1".to_string(), "--forward".to_string()],
            working_dir: working_dir.into(),
            dry_run: false,
        }
    }

    /// Replace the program, keeping the default `-p1 --forward` arguments.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Ask the patch program to check the diff without touching files.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn apply(&self, diff: &str) -> Result<PatchOutcome> {
        if diff.trim().is_empty() {
            return Err(PatchError::InvalidPatch("empty diff".to_string()));
        }

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if self.dry_run {
            command.arg("--dry-run");
        }
        command
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %self.program, args = ?self.args, dry_run = self.dry_run, "spawning patch program");
        let mut child = command.spawn().map_err(|source| PatchError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(diff.as_bytes()).await {
                Ok(()) => {}
                // The program exited without reading; its status says why.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(source) => {
                    return Err(PatchError::IoError {
                        context: "failed to write diff to patch stdin".to_string(),
                        source,
                    });
                }
            }
            // Closing stdin lets the program see EOF.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| PatchError::IoError {
                context: format!("failed to wait for `{}`", self.program),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // GNU patch reports rejected hunks on stdout.
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(PatchError::ApplicationFailed {
                status: output.status.code(),
                stderr: detail.chars().take(STDERR_EXCERPT_CHARS).collect(),
            });
        }

        Ok(PatchOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
