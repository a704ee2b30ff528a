use proptest::prelude::*;
use wsearch::glob::{matches, ParsedExpression};
use wsearch::{GlobExpr, GlobValue, SearchError};

fn expr(patterns: &[&str]) -> GlobExpr {
    GlobExpr::from_patterns(patterns.iter().copied())
}

fn no_siblings() -> Option<&'static dyn Fn() -> Vec<String>> {
    None
}

#[cfg(test)]
mod glob_syntax_tests {
    use super::*;

    #[test]
    fn test_star_stays_within_one_segment() {
        let e = expr(&["*.js"]);
        assert!(matches("a.js", &e, no_siblings()));
        assert!(!matches("dir/a.js", &e, no_siblings()));
        assert!(!matches("a.ts", &e, no_siblings()));
    }

    #[test]
    fn test_globstar_crosses_segments() {
        let e = expr(&["**/*.js"]);
        assert!(matches("a.js", &e, no_siblings()));
        assert!(matches("src/deep/nested/a.js", &e, no_siblings()));

        let e = expr(&["src/**"]);
        assert!(matches("src/a/b.txt", &e, no_siblings()));
        assert!(!matches("lib/a.txt", &e, no_siblings()));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let e = expr(&["file?.txt"]);
        assert!(matches("file1.txt", &e, no_siblings()));
        assert!(!matches("file10.txt", &e, no_siblings()));

        let e = expr(&["[abc].rs"]);
        assert!(matches("b.rs", &e, no_siblings()));
        assert!(!matches("d.rs", &e, no_siblings()));
    }

    #[test]
    fn test_brace_alternatives() {
        let e = expr(&["**/*.{js,ts}"]);
        assert!(matches("web/app.ts", &e, no_siblings()));
        assert!(matches("web/app.js", &e, no_siblings()));
        assert!(!matches("web/app.rs", &e, no_siblings()));
    }

    #[test]
    fn test_directory_names_match_at_any_depth() {
        let e = expr(&["**/node_modules"]);
        assert!(matches("node_modules", &e, no_siblings()));
        assert!(matches("packages/web/node_modules", &e, no_siblings()));
        assert!(!matches("packages/web/node_modules_backup", &e, no_siblings()));
    }

    #[test]
    fn test_leading_dot_slash_and_slash_are_ignored() {
        let e = expr(&["./src/*.rs"]);
        assert!(matches("src/main.rs", &e, no_siblings()));
        assert!(matches("/src/main.rs", &e, no_siblings()));
    }

    #[test]
    fn test_any_enabled_pattern_matches() {
        let e = expr(&["**/*.md", "**/*.txt"]);
        assert!(matches("docs/readme.md", &e, no_siblings()));
        assert!(matches("notes.txt", &e, no_siblings()));
        assert!(!matches("main.rs", &e, no_siblings()));
    }
}

#[cfg(test)]
mod glob_value_tests {
    use super::*;

    #[test]
    fn test_disabled_pattern_never_matches() {
        let mut e = GlobExpr::new();
        e.insert("**/*.rs", GlobValue::Enabled(false));
        assert!(!matches("src/main.rs", &e, no_siblings()));
    }

    #[test]
    fn test_negated_pattern_matches_everything_else() {
        let e = expr(&["!**/*.rs"]);
        assert!(matches("notes.txt", &e, no_siblings()));
        assert!(!matches("src/main.rs", &e, no_siblings()));
    }

    #[test]
    fn test_sibling_clause_needs_sibling() {
        let e = GlobExpr::new().when("**/*.js", "$(basename).ts");
        let lister = || vec!["app.js".to_string(), "app.ts".to_string(), "util.js".to_string()];
        assert!(matches("src/app.js", &e, Some(&lister)));
        assert!(!matches("src/util.js", &e, Some(&lister)));
        assert!(!matches("src/app.ts", &e, Some(&lister)));
    }

    #[test]
    fn test_sibling_clause_without_lister_does_not_match() {
        let e = GlobExpr::new().when("**/*.js", "$(basename).ts");
        assert!(!matches("src/app.js", &e, no_siblings()));
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        let e = expr(&["src/[unclosed"]);
        assert!(matches!(
            ParsedExpression::parse(&e),
            Err(SearchError::InvalidQuery(_))
        ));
        assert!(!matches("src/a", &e, no_siblings()));

        let negated_sibling = GlobExpr::new().when("!**/*.js", "$(basename).ts");
        assert!(ParsedExpression::parse(&negated_sibling).is_err());
    }

    #[test]
    fn test_expression_deserializes_from_json() {
        let e: GlobExpr = serde_json::from_str(
            r#"{"**/*.log": true, "**/tmp": false, "**/*.js": {"when": "$(basename).ts"}}"#,
        )
        .unwrap();
        let lister = || vec!["a.ts".to_string()];
        assert!(matches("var/x.log", &e, no_siblings()));
        assert!(!matches("tmp", &e, no_siblings()));
        assert!(matches("a.js", &e, Some(&lister)));
    }
}

fn pattern_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(
        vec!["*.rs", "**/*.md", "src/**", "!**/*.txt", "docs/?.md", "**/{a,b}.js"],
        0..6,
    )
}

fn path_strategy() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(vec![
        "main.rs",
        "src/lib.rs",
        "docs/a.md",
        "notes.txt",
        "web/a.js",
        "web/c.js",
        "src/deep/x.txt",
    ])
}

proptest! {
    #[test]
    fn prop_key_order_is_irrelevant(patterns in pattern_strategy(), path in path_strategy()) {
        let forward = GlobExpr::from_patterns(patterns.iter().copied());
        let backward = GlobExpr::from_patterns(patterns.iter().rev().copied());
        prop_assert_eq!(
            matches(path, &forward, no_siblings()),
            matches(path, &backward, no_siblings())
        );
    }

    #[test]
    fn prop_expression_is_union_of_patterns(patterns in pattern_strategy(), path in path_strategy()) {
        let whole = matches(path, &GlobExpr::from_patterns(patterns.iter().copied()), no_siblings());
        let any = patterns
            .iter()
            .any(|p| matches(path, &GlobExpr::from_patterns([*p]), no_siblings()));
        prop_assert_eq!(whole, any);
    }
}
