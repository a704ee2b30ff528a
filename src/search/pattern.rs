//! File-name and content predicates compiled from a query.
use crate::error::{Result, SearchError};
use crate::query::PatternInfo;
use regex::{Regex, RegexBuilder};

/// Case-insensitive fuzzy matcher for quickopen style file patterns.
///
/// Every character of the pattern must occur in the target in order. The
/// target is the basename, or the relative path if the pattern itself
/// contains a separator.
#[derive(Debug, Clone)]
pub struct FilePatternMatcher {
    needle: Vec<char>,
    match_path: bool,
}

impl FilePatternMatcher {
    pub fn new(pattern: &str) -> Self {
        let normalized = pattern.trim().replace('\\', "/");
        Self {
            match_path: normalized.contains('/'),
            needle: normalized
                .chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_lowercase)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        let target = if self.match_path {
            relative_path
        } else {
            relative_path.rsplit('/').next().unwrap_or(relative_path)
        };

        let mut wanted = self.needle.iter().peekable();
        for c in target.chars().flat_map(char::to_lowercase) {
            match wanted.peek() {
                Some(&&w) if w == c => {
                    wanted.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        wanted.peek().is_none()
    }
}

/// Compiled content predicate.
#[derive(Debug, Clone)]
pub struct ContentMatcher {
    regex: Regex,
    multiline: bool,
}

impl ContentMatcher {
    pub fn new(info: &PatternInfo) -> Result<Self> {
        if info.pattern.is_empty() {
            return Err(SearchError::invalid("content pattern is empty"));
        }
        let body = if info.is_reg_exp {
            info.pattern.clone()
        } else {
            regex::escape(&info.pattern)
        };
        let body = if info.is_word_match {
            format!(r"\b(?:{body})\b")
        } else {
            body
        };

        let regex = RegexBuilder::new(&body)
            .case_insensitive(!info.is_case_sensitive)
            .multi_line(info.is_multiline)
            .build()
            .map_err(|e| SearchError::invalid(format!("bad content pattern: {e}")))?;

        Ok(Self {
            regex,
            multiline: info.is_multiline,
        })
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Character ranges of every non-empty match in `line`.
    pub fn find_ranges(&self, line: &str) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut col = 0usize;
        let mut byte = 0usize;
        for m in self.regex.find_iter(line) {
            if m.start() == m.end() {
                continue;
            }
            col += line[byte..m.start()].chars().count();
            let end_col = col + m.as_str().chars().count();
            ranges.push((col, end_col));
            col = end_col;
            byte = m.end();
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pattern: &str) -> PatternInfo {
        PatternInfo::new(pattern)
    }

    #[test]
    fn fuzzy_matches_subsequence_of_basename() {
        let m = FilePatternMatcher::new("opfh");
        assert!(m.matches("src/parts/openFileHandler.ts"));
        assert!(!m.matches("src/parts/handler.ts"));
    }

    #[test]
    fn fuzzy_with_separator_uses_relative_path() {
        let m = FilePatternMatcher::new("parts/open");
        assert!(m.matches("src/parts/openFileHandler.ts"));
        assert!(!m.matches("src/other/openFileHandler.ts"));
    }

    #[test]
    fn ranges_are_character_based() {
        let m = ContentMatcher::new(&info("ü")).unwrap();
        assert_eq!(m.find_ranges("aüb ü"), vec![(1, 2), (4, 5)]);
    }

    #[test]
    fn literal_patterns_are_escaped() {
        let m = ContentMatcher::new(&info("a.c")).unwrap();
        assert!(m.find_ranges("abc").is_empty());
        assert_eq!(m.find_ranges("xa.c"), vec![(1, 4)]);
    }

    #[test]
    fn empty_pattern_is_invalid() {
        let err = ContentMatcher::new(&info("")).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }
}
