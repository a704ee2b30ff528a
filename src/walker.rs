use ignore::{WalkBuilder, WalkParallel};
use std::fs;
use std::path::Path;

/// Parallel walker over `root`.
///
/// Links are followed; the walker's ancestor check turns directory cycles
/// into `Loop` errors instead of descending again. Hidden files are always
/// visited, and `.gitignore`-style files only apply when requested.
pub fn walk_parallel(root: &Path, threads: usize, respect_ignore_files: bool) -> WalkParallel {
    WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .git_global(respect_ignore_files)
        .git_ignore(respect_ignore_files)
        .git_exclude(respect_ignore_files)
        .ignore(respect_ignore_files)
        .follow_links(true)
        .threads(threads.max(1))
        .build_parallel()
}

/// `path` relative to `root`, always `/`-separated.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    to_slash(rel)
}

pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    let s = if std::path::MAIN_SEPARATOR == '\\' {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    };
    s.trim_start_matches('/').to_string()
}

/// Names of the entries next to `path`. Unreadable parents yield nothing.
pub fn list_siblings(path: &Path) -> Vec<String> {
    let Some(parent) = path.parent() else {
        return Vec::new();
    };
    match fs::read_dir(parent) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
