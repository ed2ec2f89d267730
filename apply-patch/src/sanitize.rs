use lazy_static::lazy_static;
use regex::NoExpand;
use regex::Regex;

/// Marker every accepted diff must start with.
pub const DIFF_HEADER: &str = "---";

lazy_static! {
    /// Opening fences may carry a language tag (```diff, ```PATCH, ...).
    #[allow(clippy::expect_used)]
    static ref FENCE: Regex =
        Regex::new(r"(?i)```[a-z]*[ \t]*(\r?\n)?").expect("fence regex compiles");
    #[allow(clippy::expect_used)]
    static ref OLD_FILE_HEADER: Regex = Regex::new(r"(?m)^--- .*$").expect("header regex compiles");
    #[allow(clippy::expect_used)]
    static ref NEW_FILE_HEADER: Regex =
        Regex::new(r"(?m)^\+\+\+ .*$").expect("header regex compiles");
}

/// Normalize a model response into a unified diff targeting `file_rel`.
///
/// Steps, in order:
/// 1. drop markdown fences
/// 2. drop everything before the first line that starts with `---`
/// 3. remove common indentation
/// 4. point the first `---`/`+++` headers at `a/<file_rel>` and `b/<file_rel>`
///
/// The result is stable under a second application.
pub fn sanitize_diff(raw: &str, file_rel: &str) -> String {
    let unfenced = FENCE.replace_all(raw, "");
    let unfenced = unfenced.replace("```", "");
    let trimmed = unfenced.trim_matches(|c| c == '\n' || c == '\r');

    let body = textwrap::dedent(skip_to_first_header(trimmed));
    // Only strip newlines: a trailing " " is a blank context line.
    let body = body.trim_matches(|c| c == '\n' || c == '\r');
    if body.trim().is_empty() {
        return String::new();
    }

    let old_header = format!("--- a/{file_rel}");
    let new_header = format!("+++ b/{file_rel}");
    let with_old = OLD_FILE_HEADER.replacen(body, 1, NoExpand(&old_header));
    let mut normalized = NEW_FILE_HEADER
        .replacen(&with_old, 1, NoExpand(&new_header))
        .into_owned();

    // `patch` complains about a missing newline on the last hunk line.
    if !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

/// True when `diff` starts with a unified-diff file header.
pub fn is_unified_diff(diff: &str) -> bool {
    diff.starts_with(DIFF_HEADER)
}

fn skip_to_first_header(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with(DIFF_HEADER) {
            return &text[offset..];
        }
        offset += line.len();
    }
    text
}
