//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wsearch::{FileMatch, RawSearch, SearchEngine, SearchEvent, SearchOutcome};

/// Temporary workspace that is removed when dropped.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `content` at `rel`, creating parent directories.
    pub fn file(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write test file");
        path
    }

    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }

    /// Three folders, five text files; only `beta/two.txt` holds "needle",
    /// on line 2.
    pub fn needle_fixture() -> Self {
        let env = Self::new();
        env.file("alpha/one.txt", "first line\nsecond line\n");
        env.file("alpha/notes.md", "# Notes\nnothing to see\n");
        env.file("beta/two.txt", "haystack\nneedle here\nmore hay\n");
        env.file("gamma/three.txt", "just text\n");
        env.file("gamma/deep/four.txt", "nee dle split apart\n");
        env
    }

    pub fn raw(&self) -> RawSearch {
        RawSearch {
            root_folders: vec![self.root().to_path_buf()],
            ..RawSearch::default()
        }
    }
}

/// Runs `engine` to completion and returns its matches and outcome.
/// Asserts that exactly one `Done` is produced and that it comes last.
pub fn run(engine: &SearchEngine) -> (Vec<FileMatch>, SearchOutcome) {
    let (tx, rx) = crossbeam_channel::unbounded();
    engine.search(&tx);
    drop(tx);

    let mut matches = Vec::new();
    let mut outcome = None;
    for event in rx.iter() {
        assert!(outcome.is_none(), "event after Done: {event:?}");
        match event {
            SearchEvent::Match(m) => matches.push(m),
            SearchEvent::Batch(batch) => matches.extend(batch),
            SearchEvent::Progress(_) => {}
            SearchEvent::Done(o) => outcome = Some(o),
        }
    }
    (matches, outcome.expect("search produced no Done"))
}

pub fn run_raw(raw: RawSearch) -> (Vec<FileMatch>, SearchOutcome) {
    let engine = SearchEngine::new(raw).expect("valid query");
    run(&engine)
}

pub fn file_names(matches: &[FileMatch]) -> Vec<String> {
    let mut names: Vec<String> = matches
        .iter()
        .filter_map(|m| m.path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
