use std::path::PathBuf;
use wsearch::{
    Config, GlobExpr, PatternInfo, QueryBuilder, QueryOptions, RawSearch, SearchEngine,
    SearchError, DEFAULT_MAX_RESULTS,
};

fn is_invalid<T>(result: Result<T, SearchError>) -> bool {
    matches!(result, Err(SearchError::InvalidQuery(_)))
}

#[cfg(test)]
mod query_builder_tests {
    use super::*;

    #[test]
    fn test_roots_are_deduplicated_in_order() {
        let options = QueryOptions {
            folder_resources: vec![PathBuf::from("/ws/b"), PathBuf::from("/ws/a/")],
            extra_folder_resources: vec![PathBuf::from("/ws/a"), PathBuf::from("/other")],
            ..QueryOptions::default()
        };
        let raw = QueryBuilder::new().build_file_query(options).unwrap();
        assert_eq!(
            raw.root_folders,
            vec![
                PathBuf::from("/ws/b"),
                PathBuf::from("/ws/a"),
                PathBuf::from("/other")
            ]
        );
    }

    #[test]
    fn test_max_results_defaults() {
        let raw = QueryBuilder::new()
            .build_file_query(QueryOptions::for_folder("/ws"))
            .unwrap();
        assert_eq!(raw.max_results, Some(DEFAULT_MAX_RESULTS));

        let options = QueryOptions {
            max_results: Some(7),
            ..QueryOptions::for_folder("/ws")
        };
        let raw = QueryBuilder::new().build_file_query(options).unwrap();
        assert_eq!(raw.max_results, Some(7));
    }

    #[test]
    fn test_default_excludes_are_merged_with_user_excludes() {
        let builder = QueryBuilder::from_config(&Config::default());
        let options = QueryOptions {
            exclude_pattern: Some(GlobExpr::from_patterns(["**/target"])),
            ..QueryOptions::for_folder("/ws")
        };
        let raw = builder.build_file_query(options).unwrap();
        let exclude = raw.exclude_pattern.unwrap();
        let keys: Vec<&String> = exclude.iter().map(|(k, _)| k).collect();
        assert!(keys.iter().any(|k| k.as_str() == "**/target"));
        assert!(keys.iter().any(|k| k.as_str() == "**/.git"));
        assert!(keys.iter().any(|k| k.as_str() == "**/node_modules"));
    }

    #[test]
    fn test_default_excludes_can_be_disabled() {
        let builder = QueryBuilder::from_config(&Config::default());
        let options = QueryOptions {
            use_default_excludes: false,
            ..QueryOptions::for_folder("/ws")
        };
        let raw = builder.build_file_query(options).unwrap();
        assert!(raw.exclude_pattern.is_none());
    }

    #[test]
    fn test_blank_file_pattern_is_dropped() {
        let options = QueryOptions {
            file_pattern: Some("   ".to_string()),
            ..QueryOptions::for_folder("/ws")
        };
        let raw = QueryBuilder::new().build_file_query(options).unwrap();
        assert!(raw.file_pattern.is_none());
        assert!(!raw.is_text_search());
    }

    #[test]
    fn test_text_query_carries_pattern() {
        let raw = QueryBuilder::new()
            .build_text_query(
                PatternInfo::new("needle").case_sensitive(true),
                QueryOptions::for_folder("/ws"),
            )
            .unwrap();
        assert!(raw.is_text_search());
        assert!(raw.content_pattern.unwrap().is_case_sensitive);
    }
}

#[cfg(test)]
mod query_validation_tests {
    use super::*;

    #[test]
    fn test_empty_roots_are_rejected() {
        assert!(is_invalid(QueryBuilder::new().build_file_query(QueryOptions::default())));
        assert!(is_invalid(SearchEngine::new(RawSearch::default())));
    }

    #[test]
    fn test_extra_files_alone_are_enough() {
        let options = QueryOptions {
            extra_file_resources: vec![PathBuf::from("/ws/open.rs")],
            ..QueryOptions::default()
        };
        assert!(QueryBuilder::new().build_file_query(options).is_ok());
    }

    #[test]
    fn test_empty_text_pattern_is_rejected() {
        let result = QueryBuilder::new()
            .build_text_query(PatternInfo::new(""), QueryOptions::for_folder("/ws"));
        assert!(is_invalid(result));
    }

    #[test]
    fn test_bad_regex_is_rejected() {
        let result = QueryBuilder::new().build_text_query(
            PatternInfo::new("(unclosed").regex(true),
            QueryOptions::for_folder("/ws"),
        );
        assert!(is_invalid(result));

        let literal = QueryBuilder::new().build_text_query(
            PatternInfo::new("(unclosed"),
            QueryOptions::for_folder("/ws"),
        );
        assert!(literal.is_ok());
    }

    #[test]
    fn test_bad_glob_is_rejected() {
        let options = QueryOptions {
            include_pattern: Some(GlobExpr::from_patterns(["src/[oops"])),
            ..QueryOptions::for_folder("/ws")
        };
        assert!(is_invalid(QueryBuilder::new().build_file_query(options)));
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let options = QueryOptions {
            file_encoding: Some("klingon".to_string()),
            ..QueryOptions::for_folder("/ws")
        };
        assert!(is_invalid(QueryBuilder::new().build_file_query(options)));

        let options = QueryOptions {
            file_encoding: Some("UTF-16LE".to_string()),
            ..QueryOptions::for_folder("/ws")
        };
        assert!(QueryBuilder::new().build_file_query(options).is_ok());
    }

    #[test]
    fn test_zero_max_results_is_rejected() {
        let options = QueryOptions {
            max_results: Some(0),
            ..QueryOptions::for_folder("/ws")
        };
        assert!(is_invalid(QueryBuilder::new().build_file_query(options)));
    }

    #[test]
    fn test_validation_never_touches_the_filesystem() {
        let raw = RawSearch {
            root_folders: vec![PathBuf::from("/definitely/not/here")],
            ..RawSearch::default()
        };
        assert!(raw.validate().is_ok());
        assert!(SearchEngine::new(raw).is_ok());
    }

    #[test]
    fn test_raw_search_deserializes_camel_case() {
        let raw: RawSearch = serde_json::from_str(
            r#"{"rootFolders": ["/ws"], "filePattern": "main",
                "contentPattern": {"pattern": "fn", "isWordMatch": true},
                "maxResults": 5}"#,
        )
        .unwrap();
        assert_eq!(raw.root_folders, vec![PathBuf::from("/ws")]);
        assert_eq!(raw.max_results, Some(5));
        assert!(raw.content_pattern.unwrap().is_word_match);
    }
}
