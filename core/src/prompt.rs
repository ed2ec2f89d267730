//! Instructions sent to the text-generation service.

use crate::config::OutputMode;
use crate::scanner::Issue;

const IN_PLACE_ROLE: &str = "You are a senior Python maintainer updating course notebooks. \
Given deprecated API usages and the exact code that contains them, return ONLY the full \
corrected code for the snippet. No markdown, no commentary, no triple backticks.";

const DIFF_ROLE: &str = "Return *only* a valid UNIX unified diff (starting with '---' and '+++'). \
No commentary, no Markdown, no triple backticks. Target file path must match exactly.";

/// The two-part message exchange for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRequest {
    /// Fixed role instruction demanding the output format.
    pub instruction: String,
    /// Task instruction: file, rule mapping, snippet.
    pub context: String,
}

pub fn build_request(mode: OutputMode, target: &str, snippet: &str, issues: &[Issue]) -> RewriteRequest {
    let instruction = match mode {
        OutputMode::InPlace => IN_PLACE_ROLE,
        OutputMode::Diff => DIFF_ROLE,
    };

    let mapping = issues
        .iter()
        .map(|i| format!("- {}  →  {}", i.rule.pattern(), i.rule.replacement()))
        .collect::<Vec<_>>()
        .join("\n");

    let closing = match mode {
        OutputMode::InPlace => "Return the corrected code now.",
        OutputMode::Diff => "Produce the patch now.",
    };

    let cell = issues
        .first()
        .map(|i| format!("Cell: {}\n", i.cell.index))
        .unwrap_or_default();

    RewriteRequest {
        instruction: instruction.to_string(),
        context: format!(
            "File: {target}\n{cell}\nDeprecated mapping:\n{mapping}\n\nProblematic snippet:\n```\n{snippet}\n```\n\n{closing}"
        ),
    }
}
