use clap::CommandFactory;
use colored::*;
use env_logger::{Builder, Env, Target};
use is_terminal::IsTerminal;
use log::{info, warn};
use std::fs;
use std::process::ExitCode;
use std::time::Instant;
use wsearch::output::OutputFormatter;
use wsearch::progress::ProgressReporter;
use wsearch::{
    Cli, Commands, Config, GlobExpr, OutputFormat, Parser, PatternInfo, QueryOptions, Result,
    SearchError, SearchEvent, SearchService,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format!("Error: {e}").red());
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    setup_logging(&cli)?;
    let start_time = Instant::now();
    info!("Application started with command: {:?}", cli.command);

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "wsearch", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Falling back to default configuration: {e:#}");
            Config::default()
        }),
    };
    if cli.threads.is_some() {
        config.performance.threads = cli.threads;
    }

    let service = SearchService::new(&config);
    let builder = service.query_builder();
    let mut options = query_options(&cli);

    let stream = match &cli.command {
        Commands::Files { pattern } => {
            options.file_pattern = Some(pattern.clone());
            service.file_search(builder.build_file_query(options)?)?
        }
        Commands::Text {
            pattern,
            regex,
            case_sensitive,
            word,
            multiline,
            files,
        } => {
            let info = PatternInfo::new(pattern.clone())
                .regex(*regex)
                .case_sensitive(*case_sensitive)
                .word_match(*word)
                .multiline(*multiline);
            options.file_pattern = files.clone();
            service.text_search(builder.build_text_query(info, options)?)?
        }
        Commands::Completions { .. } => return Ok(ExitCode::SUCCESS),
    };

    let token = stream.cancellation_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!("Could not install Ctrl-C handler: {e}");
    }

    let formatter = OutputFormatter::new(cli.format);
    let reporter =
        ProgressReporter::new(cli.format == OutputFormat::Text && std::io::stderr().is_terminal());

    let mut outcome = None;
    for event in stream {
        match event {
            SearchEvent::Match(m) => reporter.suspend(|| println!("{}", formatter.format_match(&m))),
            SearchEvent::Batch(batch) => reporter.suspend(|| {
                for m in &batch {
                    println!("{}", formatter.format_match(m));
                }
            }),
            SearchEvent::Progress(p) => reporter.update(&p),
            SearchEvent::Done(o) => outcome = Some(o),
        }
    }

    let outcome = outcome.ok_or_else(|| {
        SearchError::Internal("search stream ended without completion".to_string())
    })?;
    reporter.finish(outcome.error.is_none().then_some(&outcome.complete));

    if outcome.is_cancelled() {
        eprintln!("{}", "Search cancelled".yellow());
        return Ok(ExitCode::from(130));
    }
    let complete = outcome.into_result()?;
    if cli.format == OutputFormat::Json || complete.stats.files_matched > 0 {
        println!("{}", formatter.format_summary(&complete));
    } else {
        println!("{}", "No matches found".yellow());
    }

    info!(
        "Application finished. Total elapsed time: {:.2?}",
        start_time.elapsed()
    );
    Ok(ExitCode::SUCCESS)
}

fn query_options(cli: &Cli) -> QueryOptions {
    let roots = if cli.roots.is_empty() && cli.extra_files.is_empty() {
        vec![std::path::PathBuf::from(".")]
    } else {
        cli.roots.clone()
    };
    QueryOptions {
        folder_resources: roots,
        extra_file_resources: cli.extra_files.clone(),
        include_pattern: Some(GlobExpr::from_patterns(cli.include.iter().cloned())),
        exclude_pattern: Some(GlobExpr::from_patterns(cli.exclude.iter().cloned())),
        max_results: cli.max_results,
        max_filesize: cli.max_filesize,
        file_encoding: cli.encoding.clone(),
        use_default_excludes: !cli.no_default_excludes,
        ..QueryOptions::default()
    }
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)?;
            }
        }
        let log_file = fs::File::create(log_path)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| SearchError::Internal(e.to_string()))?;
    Ok(())
}
