//! Acceptance checks for model output.
//!
//! Cell text is only ever replaced by text that comes out of
//! [`validate_rewrite`] as a validated variant; anything else leaves the
//! original in place.

use crate::scanner::Issue;
use nbmigrate_apply_patch::is_unified_diff;
use nbmigrate_apply_patch::sanitize_diff;
use tracing::debug;
use tree_sitter::Node;
use tree_sitter::Parser;
use tree_sitter_python::LANGUAGE as PYTHON;

/// Outcome of one rewrite attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeResult {
    /// The model's answer, accepted as is.
    ValidatedRewrite(String),
    /// The model's answer was unusable; a rule's deterministic fallback was.
    ValidatedFallback(String),
    /// Nothing usable; the cell stays unchanged.
    Rejected { reason: String },
}

/// Whether `code` parses as Python 3 without syntax errors.
///
/// IPython line magics (`%timeit`, `!pip`) are blanked out first since they
/// are legal in notebook cells but not in Python. The grammar also accepts
/// Python 2 `print`/`exec` statements, which are rejected here.
pub fn is_valid_python(code: &str) -> bool {
    if code.trim().is_empty() {
        return false;
    }

    let lang = PYTHON.into();
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&lang) {
        debug!("failed to load python grammar: {e}");
        return false;
    }

    let masked = mask_magics(code);
    match parser.parse(&masked, None) {
        Some(tree) => {
            let root = tree.root_node();
            if root.has_error() {
                return false;
            }
            match python2_statement(root) {
                Some(kind) => {
                    debug!("rejecting python 2 syntax ({kind})");
                    false
                }
                None => true,
            }
        }
        None => false,
    }
}

const PYTHON2_STATEMENTS: &[&str] = &["print_statement", "exec_statement"];

fn python2_statement(root: Node<'_>) -> Option<&'static str> {
    let mut cursor = root.walk();
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if let Some(kind) = PYTHON2_STATEMENTS.iter().copied().find(|k| *k == node.kind()) {
            return Some(kind);
        }
        pending.extend(node.children(&mut cursor));
    }
    None
}

/// Lexical state carried from one physical line to the next.
#[derive(Debug, Default)]
struct LineState {
    /// Open `(`, `[` and `{`.
    depth: usize,
    /// Previous line ended with a backslash.
    continued: bool,
    /// Inside a triple-quoted string opened with this quote character.
    triple: Option<char>,
}

impl LineState {
    /// A magic is only recognised where a new logical line begins.
    fn at_statement_start(&self) -> bool {
        self.depth == 0 && !self.continued && self.triple.is_none()
    }

    fn advance(&mut self, line: &str) {
        let chars: Vec<char> = line.trim_end_matches(['\n', '\r']).chars().collect();
        let mut quote: Option<char> = None;
        let mut i = 0;
        self.continued = false;
        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = self.triple {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                    self.triple = None;
                    i += 3;
                    continue;
                }
            } else if let Some(q) = quote {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == q {
                    quote = None;
                }
            } else {
                match c {
                    '#' => break,
                    '\'' | '"' => {
                        if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                            self.triple = Some(c);
                            i += 3;
                            continue;
                        }
                        quote = Some(c);
                    }
                    '(' | '[' | '{' => self.depth += 1,
                    ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                    '\\' if i + 1 == chars.len() => self.continued = true,
                    _ => {}
                }
            }
            i += 1;
        }
    }
}

fn is_magic(trimmed: &str) -> bool {
    trimmed.starts_with('%') || (trimmed.starts_with('!') && !trimmed.starts_with("!="))
}

fn mask_magics(code: &str) -> String {
    let mut state = LineState::default();
    code.split_inclusive('\n')
        .map(|line| {
            let trimmed = line.trim_start();
            if state.at_statement_start() && is_magic(trimmed) {
                let indent = &line[..line.len() - trimmed.len()];
                let newline = if line.ends_with('\n') { "\n" } else { "" };
                return format!("{indent}pass{newline}");
            }
            state.advance(line);
            line.to_string()
        })
        .collect()
}

/// Drop a markdown fence wrapped around the whole response, if any.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return response;
    };
    let Some(body_start) = rest.find('\n') else {
        return response;
    };
    let body = &rest[body_start + 1..];
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim_end_matches(['\n', '\r']),
        None => response,
    }
}

/// In-place mode: accept the model's answer, else a rule fallback, else
/// reject. A candidate equal to `original` up to surrounding whitespace is
/// not a change.
pub fn validate_rewrite(original: &str, response: &str, issues: &[Issue]) -> ChangeResult {
    let candidate = strip_code_fence(response);

    let reason = if candidate.trim().is_empty() {
        "empty response".to_string()
    } else if candidate.trim() == original.trim() {
        "response identical to the original".to_string()
    } else if is_valid_python(candidate) {
        return ChangeResult::ValidatedRewrite(candidate.to_string());
    } else {
        "response is not valid Python".to_string()
    };

    for issue in issues {
        let Some(fallback) = issue.rule.fallback() else {
            continue;
        };
        let fixed = fallback.apply(original);
        if fixed != original && is_valid_python(&fixed) {
            debug!(rule = issue.rule.pattern(), "using fallback substitution ({reason})");
            return ChangeResult::ValidatedFallback(fixed);
        }
    }

    ChangeResult::Rejected {
        reason: format!("{reason}; no fallback applies"),
    }
}

/// Diff mode: normalize the answer and accept it only if it is a diff.
pub fn validate_diff(response: &str, file_rel: &str) -> ChangeResult {
    let diff = sanitize_diff(response, file_rel);
    if is_unified_diff(&diff) {
        ChangeResult::ValidatedRewrite(diff)
    } else {
        ChangeResult::Rejected {
            reason: "response does not start with a unified diff header".to_string(),
        }
    }
}
