//! Deprecated-pattern table.
//!
//! A [`RuleSet`] is built once at startup, either from the built-in table or
//! from a TOML file, and shared read-only for the rest of the run.

use crate::error::MigrateError;
use crate::error::Result;
use regex::Regex;
use regex::RegexBuilder;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// How a rule recognizes its pattern in cell text. Always case-insensitive.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Lowercased needle for substring search.
    Literal(String),
    Regex(Regex),
}

impl Matcher {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Literal(needle) => text.to_lowercase().contains(needle.as_str()),
            Matcher::Regex(re) => re.is_match(text),
        }
    }
}

/// Deterministic rewrite used when the model's answer is unusable.
#[derive(Debug, Clone)]
pub struct Fallback {
    find: Regex,
    replace: String,
}

impl Fallback {
    pub fn new(pattern: &str, replace: impl Into<String>) -> Result<Self> {
        Ok(Self {
            find: compile(pattern, pattern)?,
            replace: replace.into(),
        })
    }

    /// Apply the substitution everywhere in `text`. `$1`-style group
    /// references in the replacement are expanded.
    pub fn apply(&self, text: &str) -> String {
        self.find.replace_all(text, self.replace.as_str()).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct DeprecationRule {
    pattern: String,
    replacement: String,
    matcher: Matcher,
    fallback: Option<Fallback>,
}

impl DeprecationRule {
    /// Rule matched by plain substring search on `pattern`.
    pub fn literal(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            matcher: Matcher::Literal(pattern.to_lowercase()),
            pattern,
            replacement: replacement.into(),
            fallback: None,
        }
    }

    /// Rule whose display `pattern` is detected with the regex `detect`.
    pub fn regex(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        detect: &str,
    ) -> Result<Self> {
        let pattern = pattern.into();
        Ok(Self {
            matcher: Matcher::Regex(compile(&pattern, detect)?),
            pattern,
            replacement: replacement.into(),
            fallback: None,
        })
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn fallback(&self) -> Option<&Fallback> {
        self.fallback.as_ref()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

fn compile(pattern: &str, regex: &str) -> Result<Regex> {
    RegexBuilder::new(regex)
        .case_insensitive(true)
        .build()
        .map_err(|e| MigrateError::InvalidRule {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    pattern: String,
    replacement: String,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default)]
    fallback: Option<FallbackEntry>,
}

#[derive(Debug, Deserialize)]
struct FallbackEntry {
    regex: String,
    replace: String,
}

impl TryFrom<RuleEntry> for DeprecationRule {
    type Error = MigrateError;

    fn try_from(entry: RuleEntry) -> Result<Self> {
        if entry.pattern.trim().is_empty() {
            return Err(MigrateError::InvalidRule {
                pattern: entry.pattern,
                reason: "pattern is empty".to_string(),
            });
        }
        let rule = match entry.regex.as_deref() {
            Some(detect) => DeprecationRule::regex(entry.pattern, entry.replacement, detect)?,
            None => DeprecationRule::literal(entry.pattern, entry.replacement),
        };
        match entry.fallback {
            Some(fb) => Ok(rule.with_fallback(Fallback::new(&fb.regex, fb.replace)?)),
            None => Ok(rule),
        }
    }
}

/// Ordered, immutable collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<DeprecationRule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<DeprecationRule>) -> Self {
        Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        }
    }

    /// pandas / scikit-learn deprecations seen in course notebooks.
    ///
    /// Cells hold instances (`df.ix[0]`), not class names, so the method
    /// rules detect the member access rather than `DataFrame.ix` verbatim.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(vec![
            DeprecationRule::regex(
                "DataFrame.ix",
                "DataFrame.loc / DataFrame.iloc",
                r"\.ix\[",
            )?
            .with_fallback(Fallback::new(r"\.ix\[", ".loc[")?),
            DeprecationRule::regex("Series.ravel(", "Series.to_numpy()", r"\.ravel\(")?,
            DeprecationRule::regex("freq='Q'", "freq='QE'", r#"freq\s*=\s*['"]Q['"]"#)?,
            DeprecationRule::regex(
                "pandas.Panel",
                "xarray.Dataset or a MultiIndex DataFrame",
                r"\b(pandas|pd)\.Panel\b",
            )?,
            DeprecationRule::literal(
                "sklearn.model_selection.cross_val_score",
                "sklearn.model_selection.cross_validate",
            ),
        ]))
    }

    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        let file: RuleFile = toml::from_str(content).map_err(|source| MigrateError::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        let rules = file
            .rules
            .into_iter()
            .map(DeprecationRule::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| MigrateError::io(format!("failed to read {}", path.display()), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeprecationRule>> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
