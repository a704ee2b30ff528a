//! Core search engine: one instance drives exactly one run.
use crate::error::{Result, SearchError};
use crate::glob::ParsedExpression;
use crate::processor::{self, FileEncoding, ScanOutcome};
use crate::query::RawSearch;
use crate::search::cache::CachedFile;
use crate::search::pattern::{ContentMatcher, FilePatternMatcher};
use crate::search::{
    CancellationToken, FileMatch, Progress, SearchComplete, SearchEvent, SearchOutcome, SearchSink,
};
use crate::stats::SearchCounters;
use crate::walker;
use ignore::{DirEntry, WalkState};
use log::{debug, info};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables that are not part of the query itself.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Walker threads; bounded by available parallelism.
    pub threads: usize,
    pub progress_interval: Duration,
    /// Emit progress at least every this many walked files.
    pub progress_every: usize,
    pub respect_ignore_files: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            progress_interval: Duration::from_millis(50),
            progress_every: 100,
            respect_ignore_files: false,
        }
    }
}

pub fn default_threads() -> usize {
    num_cpus::get().clamp(1, 8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => EngineState::Idle,
            1 => EngineState::Running,
            2 => EngineState::Completed,
            3 => EngineState::Cancelled,
            _ => EngineState::Failed,
        }
    }
}

struct CompiledQuery {
    include: Option<ParsedExpression>,
    exclude: Option<ParsedExpression>,
    file_pattern: Option<FilePatternMatcher>,
    content: Option<ContentMatcher>,
    encoding: FileEncoding,
    max_results: Option<usize>,
    max_filesize: Option<u64>,
}

impl CompiledQuery {
    fn compile(raw: &RawSearch) -> Result<Self> {
        raw.validate()?;
        let parse = |expr: &Option<crate::glob::GlobExpr>| -> Result<Option<ParsedExpression>> {
            match expr {
                Some(e) => Ok(Some(ParsedExpression::parse(e)?).filter(|p| !p.is_empty())),
                None => Ok(None),
            }
        };
        Ok(Self {
            include: parse(&raw.include_pattern)?,
            exclude: parse(&raw.exclude_pattern)?,
            file_pattern: raw
                .file_pattern
                .as_deref()
                .map(FilePatternMatcher::new)
                .filter(|m| !m.is_empty()),
            content: raw.content_pattern.as_ref().map(ContentMatcher::new).transpose()?,
            encoding: match &raw.file_encoding {
                Some(label) => FileEncoding::from_label(label)?,
                None => FileEncoding::default(),
            },
            max_results: raw.max_results,
            max_filesize: raw.max_filesize,
        })
    }

    fn is_excluded(&self, relative: &str, path: &Path) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|e| e.matches(relative, Some(&|| walker::list_siblings(path))))
    }

    fn is_included(&self, relative: &str, path: &Path) -> bool {
        self.include
            .as_ref()
            .map_or(true, |e| e.matches(relative, Some(&|| walker::list_siblings(path))))
    }
}

/// Per-run state shared by all workers.
struct RunContext<'a> {
    query: &'a CompiledQuery,
    token: &'a CancellationToken,
    sink: &'a dyn SearchSink,
    recorder: Option<&'a Mutex<Vec<CachedFile>>>,
    counters: SearchCounters,
    stop: AtomicBool,
    /// Canonical paths already reported.
    reported: Mutex<HashSet<PathBuf>>,
    /// Canonical paths already handed to the recorder.
    recorded: Mutex<HashSet<PathBuf>>,
    started: Instant,
    last_progress_ms: AtomicU64,
    progress_interval_ms: u64,
    progress_every: usize,
}

impl RunContext<'_> {
    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire) || self.token.is_cancelled()
    }

    fn already_reported(&self, key: &Path) -> bool {
        self.reported.lock().contains(key)
    }

    /// Emits `file_match` unless the same real file was already reported
    /// through another path.
    fn accept(&self, key: PathBuf, file_match: FileMatch) {
        if self.token.is_cancelled() {
            return;
        }
        if !self.reported.lock().insert(key) {
            debug!(
                "Already reported through another path: {}",
                file_match.path.display()
            );
            return;
        }
        if self.counters.try_reserve_match(self.query.max_results) {
            self.sink.emit(SearchEvent::Match(file_match));
        } else {
            debug!("Result limit reached, stopping walk");
            self.stop.store(true, Ordering::Release);
        }
    }

    fn maybe_progress(&self, path: &Path, walked: usize) {
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_progress_ms.load(Ordering::Relaxed);
        let due = walked % self.progress_every == 0
            || now.saturating_sub(last) >= self.progress_interval_ms;
        if !due
            || self
                .last_progress_ms
                .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            || self.token.is_cancelled()
        {
            return;
        }
        self.sink.emit(SearchEvent::Progress(Progress {
            files_walked: walked,
            files_matched: self.counters.files_matched(),
            current_path: Some(path.to_path_buf()),
        }));
    }
}

/// Walks the query's roots and extra files, emitting matches to a sink.
///
/// `Idle → Running → {Completed, Cancelled, Failed}`; a second `search` call
/// is answered with an internal error and does no I/O.
pub struct SearchEngine {
    raw: RawSearch,
    query: CompiledQuery,
    options: EngineOptions,
    token: CancellationToken,
    state: AtomicU8,
    recorder: Option<Arc<Mutex<Vec<CachedFile>>>>,
}

impl SearchEngine {
    /// Compiles the query. Invalid queries fail here, before any I/O.
    pub fn new(raw: RawSearch) -> Result<Self> {
        let query = CompiledQuery::compile(&raw)?;
        Ok(Self {
            raw,
            query,
            options: EngineOptions::default(),
            token: CancellationToken::new(),
            state: AtomicU8::new(EngineState::Idle as u8),
            recorder: None,
        })
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Records every file passing the glob and size filters, regardless of
    /// the file pattern.
    pub(crate) fn record_candidates(mut self, recorder: Arc<Mutex<Vec<CachedFile>>>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn query(&self) -> &RawSearch {
        &self.raw
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Idempotent; a no-op once the run has finished.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Cancelling search");
        }
        self.token.cancel();
    }

    /// Runs the search on the calling thread (plus the walker pool).
    ///
    /// `sink` receives every match and progress event and then exactly one
    /// `Done`; nothing is emitted after it.
    pub fn search(&self, sink: &dyn SearchSink) {
        if self
            .state
            .compare_exchange(
                EngineState::Idle as u8,
                EngineState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            sink.emit(SearchEvent::Done(SearchOutcome::failed(
                SearchError::Internal("search engine instances are single-use".to_string()),
                SearchComplete {
                    limit_hit: false,
                    stats: Default::default(),
                },
            )));
            return;
        }

        info!(
            "Starting {} search over {} root folder(s) and {} extra file(s)",
            if self.query.content.is_some() { "text" } else { "file" },
            self.raw.root_folders.len(),
            self.raw.extra_files.len()
        );

        let started = Instant::now();
        let ctx = RunContext {
            query: &self.query,
            token: &self.token,
            sink,
            recorder: self.recorder.as_deref(),
            counters: SearchCounters::new(),
            stop: AtomicBool::new(false),
            reported: Mutex::new(HashSet::new()),
            recorded: Mutex::new(HashSet::new()),
            started,
            last_progress_ms: AtomicU64::new(0),
            progress_interval_ms: self.options.progress_interval.as_millis() as u64,
            progress_every: self.options.progress_every.max(1),
        };

        let outcome = self.run(&ctx);
        let complete = SearchComplete {
            limit_hit: ctx.counters.limit_hit(),
            stats: ctx.counters.snapshot(started.elapsed()),
        };
        let (state, outcome) = match outcome {
            Err(e) => (EngineState::Failed, SearchOutcome::failed(e, complete)),
            Ok(()) if self.token.is_cancelled() => (
                EngineState::Cancelled,
                SearchOutcome::failed(SearchError::Cancelled, complete),
            ),
            Ok(()) => (EngineState::Completed, SearchOutcome::completed(complete)),
        };

        info!(
            "Search finished ({:?}): {} walked, {} matched, {} skipped in {:.2?}",
            state,
            outcome.complete.stats.files_walked,
            outcome.complete.stats.files_matched,
            outcome.complete.stats.files_skipped,
            outcome.complete.stats.elapsed
        );
        self.state.store(state as u8, Ordering::Release);
        sink.emit(SearchEvent::Done(outcome));
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<()> {
        if self.token.is_cancelled() {
            return Ok(());
        }
        for root in &self.raw.root_folders {
            match fs::metadata(root) {
                Ok(meta) if meta.is_dir() => {}
                _ => return Err(SearchError::RootNotFound(root.clone())),
            }
        }

        self.raw.extra_files.par_iter().for_each(|path| {
            if ctx.should_stop() {
                return;
            }
            if path.is_file() {
                self.visit_file(ctx, path, &walker::to_slash(path));
            } else {
                debug!("Skipping missing extra file: {}", path.display());
                ctx.counters.skipped();
            }
        });

        for root in &self.raw.root_folders {
            if ctx.should_stop() {
                break;
            }
            self.walk_root(ctx, root);
        }
        Ok(())
    }

    fn walk_root(&self, ctx: &RunContext<'_>, root: &Path) {
        debug!("Walking {}", root.display());
        walker::walk_parallel(root, self.options.threads, self.options.respect_ignore_files)
            .run(|| Box::new(move |entry| self.visit_entry(ctx, root, entry)));
    }

    fn visit_entry(
        &self,
        ctx: &RunContext<'_>,
        root: &Path,
        entry: std::result::Result<DirEntry, ignore::Error>,
    ) -> WalkState {
        if ctx.should_stop() {
            return WalkState::Quit;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Skipping unreadable entry: {err}");
                ctx.counters.skipped();
                return WalkState::Continue;
            }
        };
        if entry.depth() == 0 {
            return WalkState::Continue;
        }
        let Some(file_type) = entry.file_type() else {
            return WalkState::Continue;
        };

        let path = entry.path();
        let relative = walker::relative_path(root, path);
        if file_type.is_dir() {
            ctx.counters.dir_walked();
            if self.query.is_excluded(&relative, path) {
                debug!("Pruning excluded directory: {}", path.display());
                return WalkState::Skip;
            }
            return WalkState::Continue;
        }
        if !file_type.is_file() {
            return WalkState::Continue;
        }

        self.visit_file(ctx, path, &relative);
        if ctx.should_stop() {
            WalkState::Quit
        } else {
            WalkState::Continue
        }
    }

    fn visit_file(&self, ctx: &RunContext<'_>, path: &Path, relative: &str) {
        if ctx.should_stop() {
            return;
        }
        let walked = ctx.counters.file_walked();
        ctx.maybe_progress(path, walked);

        let query = ctx.query;
        if query.is_excluded(relative, path) || !query.is_included(relative, path) {
            return;
        }

        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!("Skipping {}: {e}", path.display());
                ctx.counters.skipped();
                return;
            }
        };
        if query.max_filesize.is_some_and(|max| size > max) {
            debug!("Skipping large file ({size} bytes): {}", path.display());
            ctx.counters.skipped();
            return;
        }

        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(recorder) = ctx.recorder {
            if ctx.recorded.lock().insert(key.clone()) {
                recorder.lock().push(CachedFile {
                    path: path.to_path_buf(),
                    relative: relative.to_string(),
                });
            }
        }
        // A file reached through several paths is claimed by the first path
        // that is accepted, not the first one walked.
        if query.file_pattern.as_ref().is_some_and(|p| !p.matches(relative))
            || ctx.already_reported(&key)
        {
            return;
        }

        let file_match = match &query.content {
            None => FileMatch::file(path.to_path_buf()),
            Some(matcher) => {
                if ctx.should_stop() {
                    return;
                }
                match processor::scan_file(path, matcher, query.encoding, ctx.token) {
                    Ok(ScanOutcome::Lines(lines)) if !lines.is_empty() => {
                        FileMatch::with_lines(path.to_path_buf(), lines)
                    }
                    Ok(ScanOutcome::Lines(_)) => return,
                    Ok(ScanOutcome::Binary) => {
                        ctx.counters.skipped();
                        return;
                    }
                    Err(e) => {
                        debug!("Skipping {}: {e}", path.display());
                        ctx.counters.skipped();
                        return;
                    }
                }
            }
        };
        ctx.accept(key, file_match);
    }
}
