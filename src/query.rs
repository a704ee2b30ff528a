//! Search queries and the builder that normalizes caller options into them.
use crate::config::Config;
use crate::error::{Result, SearchError};
use crate::glob::{GlobExpr, ParsedExpression};
use crate::processor::FileEncoding;
use crate::search::pattern::ContentMatcher;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result ceiling applied when a query leaves `max_results` unset.
pub const DEFAULT_MAX_RESULTS: usize = 10_000;

/// Content pattern of a text search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternInfo {
    pub pattern: String,
    pub is_reg_exp: bool,
    pub is_case_sensitive: bool,
    pub is_word_match: bool,
    pub is_multiline: bool,
}

impl PatternInfo {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn regex(mut self, yes: bool) -> Self {
        self.is_reg_exp = yes;
        self
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.is_case_sensitive = yes;
        self
    }

    pub fn word_match(mut self, yes: bool) -> Self {
        self.is_word_match = yes;
        self
    }

    pub fn multiline(mut self, yes: bool) -> Self {
        self.is_multiline = yes;
        self
    }
}

/// A single, immutable search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSearch {
    pub root_folders: Vec<PathBuf>,
    pub extra_files: Vec<PathBuf>,
    pub file_pattern: Option<String>,
    pub include_pattern: Option<GlobExpr>,
    pub exclude_pattern: Option<GlobExpr>,
    pub content_pattern: Option<PatternInfo>,
    pub max_results: Option<usize>,
    pub max_filesize: Option<u64>,
    pub file_encoding: Option<String>,
    pub cache_key: Option<String>,
}

impl RawSearch {
    pub fn is_text_search(&self) -> bool {
        self.content_pattern.is_some()
    }

    /// Checks the invariants every engine relies on. Never touches the
    /// filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.root_folders.is_empty() && self.extra_files.is_empty() {
            return Err(SearchError::invalid(
                "query has no root folders and no extra files",
            ));
        }
        if let Some(info) = &self.content_pattern {
            ContentMatcher::new(info)?;
        }
        for expr in [&self.include_pattern, &self.exclude_pattern].into_iter().flatten() {
            ParsedExpression::parse(expr)?;
        }
        if let Some(label) = &self.file_encoding {
            FileEncoding::from_label(label)?;
        }
        if self.max_results == Some(0) {
            return Err(SearchError::invalid("max_results must be positive"));
        }
        Ok(())
    }
}

/// High-level request options, as a workspace caller knows them.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Workspace roots; always searched first.
    pub folder_resources: Vec<PathBuf>,
    /// Explicitly requested folders outside the workspace.
    pub extra_folder_resources: Vec<PathBuf>,
    /// Individual files searched without walking (e.g. open editors).
    pub extra_file_resources: Vec<PathBuf>,
    pub file_pattern: Option<String>,
    pub include_pattern: Option<GlobExpr>,
    pub exclude_pattern: Option<GlobExpr>,
    pub max_results: Option<usize>,
    pub max_filesize: Option<u64>,
    pub file_encoding: Option<String>,
    pub cache_key: Option<String>,
    pub use_default_excludes: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            folder_resources: Vec::new(),
            extra_folder_resources: Vec::new(),
            extra_file_resources: Vec::new(),
            file_pattern: None,
            include_pattern: None,
            exclude_pattern: None,
            max_results: None,
            max_filesize: None,
            file_encoding: None,
            cache_key: None,
            use_default_excludes: true,
        }
    }
}

impl QueryOptions {
    pub fn for_folder(root: impl Into<PathBuf>) -> Self {
        Self {
            folder_resources: vec![root.into()],
            ..Self::default()
        }
    }
}

/// Translates [`QueryOptions`] into validated [`RawSearch`] values.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    max_results: usize,
    max_filesize: Option<u64>,
    default_excludes: GlobExpr,
    file_encoding: Option<String>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            max_filesize: None,
            default_excludes: GlobExpr::new(),
            file_encoding: None,
        }
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures configuration defaults at build time.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_results: config.search.max_results,
            max_filesize: config.search.max_filesize,
            default_excludes: GlobExpr::from_patterns(config.ignore.exclude.iter().cloned()),
            file_encoding: config.search.encoding.clone(),
        }
    }

    pub fn build_file_query(&self, options: QueryOptions) -> Result<RawSearch> {
        self.build(options, None)
    }

    pub fn build_text_query(
        &self,
        content_pattern: PatternInfo,
        options: QueryOptions,
    ) -> Result<RawSearch> {
        if content_pattern.pattern.is_empty() {
            return Err(SearchError::invalid("text query needs a non-empty pattern"));
        }
        self.build(options, Some(content_pattern))
    }

    fn build(&self, options: QueryOptions, content: Option<PatternInfo>) -> Result<RawSearch> {
        let root_folders = dedup_paths(
            options
                .folder_resources
                .iter()
                .chain(options.extra_folder_resources.iter()),
        );
        let extra_files = dedup_paths(options.extra_file_resources.iter());

        let mut exclude = if options.use_default_excludes {
            self.default_excludes.clone()
        } else {
            GlobExpr::new()
        };
        if let Some(user) = &options.exclude_pattern {
            exclude.extend(user);
        }

        let raw = RawSearch {
            root_folders,
            extra_files,
            file_pattern: options
                .file_pattern
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            include_pattern: options.include_pattern.filter(|e| !e.is_empty()),
            exclude_pattern: Some(exclude).filter(|e| !e.is_empty()),
            content_pattern: content,
            max_results: Some(options.max_results.unwrap_or(self.max_results)),
            max_filesize: options.max_filesize.or(self.max_filesize),
            file_encoding: options.file_encoding.or_else(|| self.file_encoding.clone()),
            cache_key: options.cache_key,
        };
        raw.validate()?;
        Ok(raw)
    }
}

/// Order-preserving de-duplication on lexically normalized paths.
fn dedup_paths<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for path in paths {
        let normalized = normalize(path);
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}
