use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Root folder to search; repeatable. Defaults to the current directory.
    #[clap(short = 'r', long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Individual file searched without walking; repeatable.
    #[clap(long = "extra", value_name = "FILE")]
    pub extra_files: Vec<PathBuf>,

    #[clap(short, long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    #[clap(short, long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Do not apply the configured default excludes.
    #[clap(long, value_parser, default_value_t = false)]
    pub no_default_excludes: bool,

    #[clap(long, value_parser)]
    pub max_results: Option<usize>,

    /// Skip files larger than this many bytes.
    #[clap(long, value_parser)]
    pub max_filesize: Option<u64>,

    #[clap(long, value_parser)]
    pub encoding: Option<String>,

    #[clap(long, value_parser)]
    pub threads: Option<usize>,

    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[clap(long, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(long, value_parser, default_value_t = false)]
    pub verbose: bool,

    #[clap(long, value_parser)]
    pub log: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find files whose name fuzzily matches PATTERN; lists all files if empty.
    Files {
        #[clap(default_value = "")]
        pattern: String,
    },
    /// Find lines matching PATTERN in file contents.
    Text {
        pattern: String,

        #[clap(long, value_parser, default_value_t = false)]
        regex: bool,

        #[clap(short = 's', long, value_parser, default_value_t = false)]
        case_sensitive: bool,

        #[clap(short, long, value_parser, default_value_t = false)]
        word: bool,

        #[clap(long, value_parser, default_value_t = false)]
        multiline: bool,

        /// Only match files whose name fuzzily matches this pattern.
        #[clap(long, value_parser)]
        files: Option<String>,
    },
    /// Generate shell completions.
    Completions {
        #[clap(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
