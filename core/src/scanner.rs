//! Pattern scanning: decides which cells are worth a model call.

use crate::rules::DeprecationRule;
use crate::rules::RuleSet;
use crate::warnings::CapturedWarning;
use std::fmt;
use std::sync::Arc;

/// Location of a cell: repository-relative notebook path plus cell index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub notebook: String,
    pub index: usize,
}

impl CellRef {
    pub fn new(notebook: impl Into<String>, index: usize) -> Self {
        Self {
            notebook: notebook.into(),
            index,
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[cell {}]", self.notebook, self.index)
    }
}

/// A rule that matched a cell.
#[derive(Debug, Clone)]
pub struct Issue {
    pub rule: Arc<DeprecationRule>,
    pub cell: CellRef,
}

/// One issue per matching rule, in rule order. Empty means "skip this cell".
pub fn scan(text: &str, rules: &RuleSet, cell: &CellRef) -> Vec<Issue> {
    rules
        .iter()
        .filter(|rule| rule.is_match(text))
        .map(|rule| Issue {
            rule: Arc::clone(rule),
            cell: cell.clone(),
        })
        .collect()
}

/// Issues for the runtime warnings that plausibly come from `text`.
///
/// A warning is attributed to a cell when any token of its message longer
/// than three characters appears verbatim in the cell.
pub fn warning_issues(text: &str, warnings: &[CapturedWarning], cell: &CellRef) -> Vec<Issue> {
    warnings
        .iter()
        .filter(|w| w.is_deprecation() && code_mentions_warning(text, w))
        .map(|w| Issue {
            rule: Arc::new(DeprecationRule::literal(
                w.to_string(),
                "equivalent code that no longer triggers this warning",
            )),
            cell: cell.clone(),
        })
        .collect()
}

const TOKEN_TRIM: &[char] = &['\'', '"', '`', ',', '.', '(', ')', '[', ']', ':', ';', '\n', ' '];

fn code_mentions_warning(code: &str, warning: &CapturedWarning) -> bool {
    warning
        .message
        .split_whitespace()
        .map(|t| t.trim_matches(TOKEN_TRIM))
        .filter(|t| t.chars().count() > 3 && *t != warning.category)
        .any(|t| code.contains(t))
}
