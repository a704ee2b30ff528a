//! Concurrent workspace search.
//!
//! A [`RawSearch`] built by [`QueryBuilder`] is handed to a [`SearchService`],
//! which runs one [`SearchEngine`] per request and returns a [`SearchStream`]
//! of matches and progress ending in exactly one `Done`.
pub mod cli;
pub mod config;
pub mod error;
pub mod glob;
pub mod output;
pub mod processor;
pub mod progress;
pub mod query;
pub mod search;
pub mod service;
pub mod stats;
pub mod walker;

pub use clap::Parser;
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use error::{Result, SearchError};
pub use glob::{GlobExpr, GlobValue, ParsedExpression};
pub use query::{PatternInfo, QueryBuilder, QueryOptions, RawSearch, DEFAULT_MAX_RESULTS};
pub use search::{
    CancellationToken, EngineOptions, EngineState, FileMatch, LineMatch, Progress,
    SearchComplete, SearchEngine, SearchEvent, SearchOutcome, SearchSink,
};
pub use service::{QuickOpenResults, SearchService, SearchStream, MAX_PENDING_ITEMS};
pub use stats::SearchStats;
