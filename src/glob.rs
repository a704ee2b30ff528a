//! Glob expressions used for include/exclude filtering.
//!
//! A [`GlobExpr`] maps glob patterns to a [`GlobValue`]. It is compiled once
//! into a [`ParsedExpression`], a small immutable clause list that is shared
//! by every walker thread and evaluated without locking.
use crate::error::{Result, SearchError};
use globset::{GlobBuilder, GlobMatcher};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BASENAME_VAR: &str = "$(basename)";

/// Value side of a glob expression entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GlobValue {
    /// `true` enables the pattern, `false` disables it.
    Enabled(bool),
    /// Matches only when a sibling named by `when` exists, e.g.
    /// `{"**/*.js": {"when": "$(basename).ts"}}`.
    Sibling { when: String },
}

/// Mapping of glob pattern to enabled state. Key order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobExpr(BTreeMap<String, GlobValue>);

impl GlobExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an expression enabling every pattern in `patterns`.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut expr = Self::new();
        for pattern in patterns {
            expr.insert(pattern, GlobValue::Enabled(true));
        }
        expr
    }

    pub fn insert(&mut self, pattern: impl Into<String>, value: GlobValue) {
        self.0.insert(pattern.into(), value);
    }

    pub fn when(mut self, pattern: impl Into<String>, sibling: impl Into<String>) -> Self {
        self.insert(
            pattern,
            GlobValue::Sibling {
                when: sibling.into(),
            },
        );
        self
    }

    /// Merges `other` into `self`; entries of `other` win on key clashes.
    pub fn extend(&mut self, other: &GlobExpr) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| matches!(v, GlobValue::Enabled(false)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GlobValue)> {
        self.0.iter()
    }
}

#[derive(Debug)]
enum Clause {
    Glob(GlobMatcher),
    Negated(GlobMatcher),
    Sibling { glob: GlobMatcher, when: String },
}

/// Compiled form of a [`GlobExpr`].
#[derive(Debug)]
pub struct ParsedExpression {
    clauses: Vec<Clause>,
}

fn compile(pattern: &str) -> std::result::Result<GlobMatcher, globset::Error> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()?;
    Ok(glob.compile_matcher())
}

impl ParsedExpression {
    pub fn parse(expr: &GlobExpr) -> Result<Self> {
        let mut clauses = Vec::new();
        for (pattern, value) in expr.iter() {
            let (negated, body) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern.as_str()),
            };
            let body = body.trim_start_matches("./");
            if body.is_empty() {
                return Err(SearchError::invalid(format!("empty glob pattern '{pattern}'")));
            }
            let clause = match value {
                GlobValue::Enabled(false) => continue,
                GlobValue::Enabled(true) => {
                    let glob = compile(body).map_err(|e| {
                        SearchError::invalid(format!("bad glob '{pattern}': {e}"))
                    })?;
                    if negated {
                        Clause::Negated(glob)
                    } else {
                        Clause::Glob(glob)
                    }
                }
                GlobValue::Sibling { when } => {
                    if negated {
                        return Err(SearchError::invalid(format!(
                            "sibling clause cannot be negated: '{pattern}'"
                        )));
                    }
                    let glob = compile(body).map_err(|e| {
                        SearchError::invalid(format!("bad glob '{pattern}': {e}"))
                    })?;
                    Clause::Sibling {
                        glob,
                        when: when.clone(),
                    }
                }
            };
            clauses.push(clause);
        }
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True if any clause matches `relative_path` (`/`-separated).
    ///
    /// `siblings` lists the names next to the path; it is only called when a
    /// sibling clause needs it, and at most once per call.
    pub fn matches(&self, relative_path: &str, siblings: Option<&dyn Fn() -> Vec<String>>) -> bool {
        let path = relative_path.trim_start_matches('/');
        let mut sibling_names: Option<Vec<String>> = None;

        self.clauses.iter().any(|clause| match clause {
            Clause::Glob(glob) => glob.is_match(path),
            Clause::Negated(glob) => !glob.is_match(path),
            Clause::Sibling { glob, when } => {
                if !glob.is_match(path) {
                    return false;
                }
                let Some(list) = siblings else {
                    return false;
                };
                let names = sibling_names.get_or_insert_with(list);
                let wanted = sibling_name(path, when);
                names.iter().any(|n| *n == wanted)
            }
        })
    }
}

/// `when` with `$(basename)` replaced by the file name minus its extension.
fn sibling_name(path: &str, when: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    when.replace(BASENAME_VAR, stem)
}

/// One-shot evaluation of `expr` against `relative_path`.
///
/// Patterns that fail to compile never match.
pub fn matches(
    relative_path: &str,
    expr: &GlobExpr,
    siblings: Option<&dyn Fn() -> Vec<String>>,
) -> bool {
    match ParsedExpression::parse(expr) {
        Ok(parsed) => parsed.matches(relative_path, siblings),
        Err(e) => {
            warn!("Ignoring unparsable glob expression: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_name_strips_last_extension() {
        assert_eq!(sibling_name("src/app.test.js", "$(basename).ts"), "app.test.ts");
        assert_eq!(sibling_name("Makefile", "$(basename).bak"), "Makefile.bak");
        assert_eq!(sibling_name(".env", "$(basename).local"), ".env.local");
    }

    #[test]
    fn disabled_entries_are_dropped() {
        let mut expr = GlobExpr::new();
        expr.insert("**/*.rs", GlobValue::Enabled(false));
        assert!(expr.is_empty());
        let parsed = ParsedExpression::parse(&expr).unwrap();
        assert!(parsed.is_empty());
        assert!(!parsed.matches("src/main.rs", None));
    }

    #[test]
    fn sibling_lister_called_at_most_once() {
        use std::cell::Cell;
        let expr = GlobExpr::new()
            .when("**/*.js", "$(basename).ts")
            .when("dir/*.js", "$(basename).tsx");
        let parsed = ParsedExpression::parse(&expr).unwrap();
        let calls = Cell::new(0);
        let lister = || {
            calls.set(calls.get() + 1);
            vec!["a.tsx".to_string()]
        };
        assert!(parsed.matches("dir/a.js", Some(&lister)));
        assert!(calls.get() <= 1);
    }
}
