//! Search engine, result types and the event stream they travel on
pub mod cache;
pub mod engine;
pub mod pattern;

use crate::error::SearchError;
use crate::stats::SearchStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use engine::{EngineOptions, EngineState, SearchEngine};

/// One matching line inside a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMatch {
    /// 1-based.
    pub line_number: usize,
    pub preview: String,
    /// `(start, end)` character columns into `preview`, end exclusive.
    pub match_ranges: Vec<(usize, usize)>,
}

/// A file accepted by the search. `line_matches` is only set for content
/// searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMatch {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_matches: Option<Vec<LineMatch>>,
}

impl FileMatch {
    pub fn file(path: PathBuf) -> Self {
        Self {
            path,
            line_matches: None,
        }
    }

    pub fn with_lines(path: PathBuf, lines: Vec<LineMatch>) -> Self {
        Self {
            path,
            line_matches: Some(lines),
        }
    }
}

/// Liveness update, independent of match emission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub files_walked: usize,
    pub files_matched: usize,
    pub current_path: Option<PathBuf>,
}

/// Terminal summary of a search run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchComplete {
    pub limit_hit: bool,
    pub stats: SearchStats,
}

/// Terminal value of a run: the stats gathered so far plus the error, if the
/// run did not complete normally. Cancelled runs still carry partial stats.
#[derive(Debug)]
pub struct SearchOutcome {
    pub complete: SearchComplete,
    pub error: Option<SearchError>,
}

impl SearchOutcome {
    pub fn completed(complete: SearchComplete) -> Self {
        Self {
            complete,
            error: None,
        }
    }

    pub fn failed(error: SearchError, complete: SearchComplete) -> Self {
        Self {
            complete,
            error: Some(error),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(SearchError::is_cancellation)
    }

    pub fn into_result(self) -> Result<SearchComplete, SearchError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.complete),
        }
    }
}

/// Items carried by a search stream. An engine only produces `Match`,
/// `Progress` and a final `Done`; `Batch` is formed by the service when the
/// consumer falls behind.
#[derive(Debug)]
pub enum SearchEvent {
    Match(FileMatch),
    Batch(Vec<FileMatch>),
    Progress(Progress),
    Done(SearchOutcome),
}

impl SearchEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, SearchEvent::Done(_))
    }
}

/// Receiver of engine events. Called concurrently from walker threads.
pub trait SearchSink: Send + Sync {
    fn emit(&self, event: SearchEvent);
}

impl SearchSink for crossbeam_channel::Sender<SearchEvent> {
    fn emit(&self, event: SearchEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// Cooperative cancellation flag shared between a search and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
