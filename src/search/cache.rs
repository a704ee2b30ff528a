//! File-list cache for repeated quickopen style file searches
use crate::error::Result;
use crate::query::RawSearch;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

/// A file that passed the glob and size filters of a cached walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub path: PathBuf,
    pub relative: String,
}

/// Everything of a query except the file pattern and limit. Two file
/// queries with equal fingerprints walk exactly the same candidate set.
#[derive(Serialize)]
struct Fingerprint<'a> {
    roots: &'a [PathBuf],
    extra: &'a [PathBuf],
    include: &'a Option<crate::glob::GlobExpr>,
    exclude: &'a Option<crate::glob::GlobExpr>,
    max_filesize: Option<u64>,
}

pub fn fingerprint(raw: &RawSearch) -> Result<String> {
    let fp = Fingerprint {
        roots: &raw.root_folders,
        extra: &raw.extra_files,
        include: &raw.include_pattern,
        exclude: &raw.exclude_pattern,
        max_filesize: raw.max_filesize,
    };
    serde_json::to_string(&fp).map_err(|e| crate::error::SearchError::Internal(e.to_string()))
}

struct Entry {
    fingerprint: String,
    files: Arc<Vec<CachedFile>>,
}

/// LRU of complete candidate lists keyed by the caller's cache key.
pub struct FileListCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl FileListCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached files for `key`, provided the entry was built for the same
    /// fingerprint. A stale entry is evicted.
    pub fn get(&self, key: &str, fingerprint: &str) -> Option<Arc<Vec<CachedFile>>> {
        let mut entries = self.entries.lock();
        let hit = entries
            .get(key)
            .map(|entry| (entry.fingerprint == fingerprint).then(|| entry.files.clone()));
        match hit {
            Some(Some(files)) => Some(files),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, fingerprint: String, files: Vec<CachedFile>) {
        self.entries.lock().put(
            key,
            Entry {
                fingerprint,
                files: Arc::new(files),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
