//! Search dispatcher: runs one engine per request and hands the caller a
//! single stream of progress items ending in exactly one `Done`.
use crate::config::Config;
use crate::error::{Result, SearchError};
use crate::query::{QueryBuilder, QueryOptions, RawSearch};
use crate::search::cache::{self, CachedFile, FileListCache};
use crate::search::pattern::FilePatternMatcher;
use crate::search::{
    CancellationToken, EngineOptions, FileMatch, Progress, SearchComplete, SearchEngine,
    SearchEvent, SearchOutcome, SearchSink,
};
use crate::stats::SearchStats;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default bound on undelivered stream items before matches are batched.
pub const MAX_PENDING_ITEMS: usize = 512;

/// Undelivered events of one stream.
///
/// Once more than `max_pending` items wait, every pending match is folded
/// (in order) into one `Batch` and only the newest pending progress item is
/// kept. Matches are never dropped.
struct PendingQueue {
    items: VecDeque<SearchEvent>,
    max_pending: usize,
    done_queued: bool,
    done_delivered: bool,
}

impl PendingQueue {
    fn new(max_pending: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_pending: max_pending.max(2),
            done_queued: false,
            done_delivered: false,
        }
    }

    fn push(&mut self, event: SearchEvent) {
        if self.done_queued {
            return;
        }
        self.done_queued = event.is_done();
        self.items.push_back(event);
        if self.items.len() > self.max_pending && !self.done_queued {
            self.compact();
        }
    }

    fn compact(&mut self) {
        let mut batch = Vec::new();
        let mut latest: Option<Progress> = None;
        let mut done = None;
        for item in self.items.drain(..) {
            match item {
                SearchEvent::Match(m) => batch.push(m),
                SearchEvent::Batch(ms) => batch.extend(ms),
                SearchEvent::Progress(p) => latest = Some(p),
                SearchEvent::Done(o) => done = Some(o),
            }
        }
        debug!("Coalesced {} pending matches into one batch", batch.len());
        if !batch.is_empty() {
            self.items.push_back(SearchEvent::Batch(batch));
        }
        if let Some(p) = latest {
            self.items.push_back(SearchEvent::Progress(p));
        }
        if let Some(o) = done {
            self.items.push_back(SearchEvent::Done(o));
        }
    }

    fn pop(&mut self) -> Option<SearchEvent> {
        let item = self.items.pop_front()?;
        if item.is_done() {
            self.done_delivered = true;
        }
        Some(item)
    }

    fn exhausted(&self) -> bool {
        self.done_delivered
    }
}

struct StreamShared {
    queue: Mutex<PendingQueue>,
    ready: Condvar,
}

impl SearchSink for StreamShared {
    fn emit(&self, event: SearchEvent) {
        self.queue.lock().push(event);
        self.ready.notify_all();
    }
}

/// Consumer side of one search run.
///
/// Dropping the stream before `Done` has been received cancels the search.
pub struct SearchStream {
    shared: Arc<StreamShared>,
    token: CancellationToken,
}

impl SearchStream {
    fn new(max_pending: usize, token: CancellationToken) -> Self {
        Self {
            shared: Arc::new(StreamShared {
                queue: Mutex::new(PendingQueue::new(max_pending)),
                ready: Condvar::new(),
            }),
            token,
        }
    }

    fn sink(&self) -> Arc<StreamShared> {
        self.shared.clone()
    }

    /// Blocks for the next item; `None` once `Done` was delivered.
    pub fn recv(&self) -> Option<SearchEvent> {
        let mut queue = self.shared.queue.lock();
        loop {
            if queue.exhausted() {
                return None;
            }
            if let Some(item) = queue.pop() {
                return Some(item);
            }
            self.shared.ready.wait(&mut queue);
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<SearchEvent> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        loop {
            if queue.exhausted() {
                return None;
            }
            if let Some(item) = queue.pop() {
                return Some(item);
            }
            if self.shared.ready.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop();
            }
        }
    }

    pub fn try_recv(&self) -> Option<SearchEvent> {
        self.shared.queue.lock().pop()
    }

    /// Requests cancellation; the stream still ends with a `Done`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.queue.lock().exhausted()
    }

    /// Drains the stream, flattening batches.
    pub fn collect_all(self) -> (Vec<FileMatch>, SearchOutcome) {
        let mut matches = Vec::new();
        while let Some(event) = self.recv() {
            match event {
                SearchEvent::Match(m) => matches.push(m),
                SearchEvent::Batch(ms) => matches.extend(ms),
                SearchEvent::Progress(_) => {}
                SearchEvent::Done(outcome) => return (matches, outcome),
            }
        }
        // `recv` only returns `None` after `Done`, which returns above.
        let outcome = SearchOutcome::failed(
            SearchError::Internal("stream ended without completion".to_string()),
            SearchComplete {
                limit_hit: false,
                stats: SearchStats::default(),
            },
        );
        (matches, outcome)
    }
}

impl Iterator for SearchStream {
    type Item = SearchEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Drop for SearchStream {
    fn drop(&mut self) {
        if !self.shared.queue.lock().exhausted() {
            self.token.cancel();
        }
    }
}

/// Result of [`SearchService::quick_open`].
#[derive(Debug, Default)]
pub struct QuickOpenResults {
    pub matches: Vec<FileMatch>,
    /// `None` when the search was short-circuited.
    pub stats: Option<SearchStats>,
    pub limit_hit: bool,
}

/// Accepts raw queries and runs each on its own engine thread.
pub struct SearchService {
    options: EngineOptions,
    max_pending: usize,
    builder: QueryBuilder,
    cache: Arc<FileListCache>,
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl SearchService {
    pub fn new(config: &Config) -> Self {
        Self {
            options: config.engine_options(),
            max_pending: config.search.max_pending_items,
            builder: QueryBuilder::from_config(config),
            cache: Arc::new(FileListCache::new(config.search.cache_size)),
        }
    }

    pub fn with_engine_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn file_search(&self, raw: RawSearch) -> Result<SearchStream> {
        if raw.content_pattern.is_some() {
            return Err(SearchError::invalid("file search given a content pattern"));
        }
        match raw.cache_key.clone() {
            Some(key) => self.cached_file_search(raw, key),
            None => self.spawn(SearchEngine::new(raw)?, None),
        }
    }

    pub fn text_search(&self, raw: RawSearch) -> Result<SearchStream> {
        if raw.content_pattern.is_none() {
            return Err(SearchError::invalid("text search needs a content pattern"));
        }
        self.spawn(SearchEngine::new(raw)?, None)
    }

    /// Evicts a cached file list. Returns whether one existed.
    pub fn clear_cache(&self, cache_key: &str) -> bool {
        self.cache.remove(cache_key)
    }

    /// File search for a free-text quickopen value. Empty values return
    /// nothing without starting a search.
    pub fn quick_open(&self, search_value: &str, mut options: QueryOptions) -> Result<QuickOpenResults> {
        let value = search_value.trim();
        if value.is_empty() {
            return Ok(QuickOpenResults::default());
        }
        options.file_pattern = Some(value.to_string());
        let raw = self.builder.build_file_query(options)?;
        let (matches, outcome) = self.file_search(raw)?.collect_all();
        let complete = outcome.into_result()?;
        Ok(QuickOpenResults {
            matches,
            stats: Some(complete.stats),
            limit_hit: complete.limit_hit,
        })
    }

    fn cached_file_search(&self, raw: RawSearch, key: String) -> Result<SearchStream> {
        let fingerprint = cache::fingerprint(&raw)?;
        if let Some(files) = self.cache.get(&key, &fingerprint) {
            debug!("Answering file search from cache '{key}'");
            return Ok(self.replay_cached(&raw, &files));
        }

        let recorder = Arc::new(Mutex::new(Vec::new()));
        let engine = SearchEngine::new(raw)?.record_candidates(recorder.clone());
        let cache = self.cache.clone();
        let store = move |outcome: &SearchOutcome| {
            if outcome.error.is_some() || outcome.complete.limit_hit {
                return;
            }
            let files = std::mem::take(&mut *recorder.lock());
            debug!("Caching {} files under '{key}'", files.len());
            cache.insert(key, fingerprint, files);
        };
        self.spawn(engine, Some(Box::new(store)))
    }

    fn replay_cached(&self, raw: &RawSearch, files: &[CachedFile]) -> SearchStream {
        let started = Instant::now();
        let stream = SearchStream::new(self.max_pending, CancellationToken::new());
        let sink = stream.sink();
        let matcher = raw.file_pattern.as_deref().map(FilePatternMatcher::new);

        let mut stats = SearchStats {
            files_walked: files.len(),
            from_cache: true,
            ..SearchStats::default()
        };
        let mut limit_hit = false;
        for file in files {
            if matcher.as_ref().is_some_and(|m| !m.matches(&file.relative)) {
                continue;
            }
            if raw.max_results.is_some_and(|max| stats.files_matched >= max) {
                limit_hit = true;
                break;
            }
            stats.files_matched += 1;
            sink.emit(SearchEvent::Match(FileMatch::file(file.path.clone())));
        }
        stats.elapsed = started.elapsed();
        sink.emit(SearchEvent::Done(SearchOutcome::completed(SearchComplete {
            limit_hit,
            stats,
        })));
        stream
    }

    #[allow(clippy::type_complexity)]
    fn spawn(
        &self,
        engine: SearchEngine,
        on_done: Option<Box<dyn FnOnce(&SearchOutcome) + Send>>,
    ) -> Result<SearchStream> {
        let engine = engine.with_options(self.options.clone());
        let stream = SearchStream::new(self.max_pending, engine.cancellation_token());
        let sink = stream.sink();

        thread::Builder::new()
            .name("wsearch-engine".to_string())
            .spawn(move || {
                let hook = HookSink {
                    inner: sink,
                    on_done: Mutex::new(on_done),
                };
                engine.search(&hook);
            })
            .map_err(|e| {
                warn!("Failed to spawn search thread: {e}");
                SearchError::Io(e)
            })?;
        Ok(stream)
    }
}

/// Forwards events and runs a completion hook before `Done` is delivered.
struct HookSink {
    inner: Arc<StreamShared>,
    on_done: Mutex<Option<Box<dyn FnOnce(&SearchOutcome) + Send>>>,
}

impl SearchSink for HookSink {
    fn emit(&self, event: SearchEvent) {
        if let SearchEvent::Done(outcome) = &event {
            if let Some(hook) = self.on_done.lock().take() {
                hook(outcome);
            }
        }
        self.inner.emit(event);
    }
}
