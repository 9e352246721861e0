use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use vdjdb_search::app::{App, BatchSummary, FetchOptions, SnapshotSummary};
use vdjdb_search::cache::SnapshotCache;
use vdjdb_search::config::{ConfigLoader, Settings};
use vdjdb_search::diagnostics::{Diagnostics, TracingDiagnostics};
use vdjdb_search::domain::{Condition, Projection, QuerySpec, ReceptorTable};
use vdjdb_search::error::SearchError;
use vdjdb_search::extract::SnapshotExtractor;
use vdjdb_search::output::{
    Credential, HttpUploadSink, JsonOutput, OutputMode, ResultSink, TsvDirectorySink,
};
use vdjdb_search::release::GithubReleaseClient;
use vdjdb_search::tsv;

#[derive(Parser)]
#[command(name = "vdjdb-search")]
#[command(about = "Query the latest VDJdb release for paired T-cell receptor constructs")]
#[command(version, author)]
struct Cli {
    /// Settings file (defaults to ./vdjdb-search.toml when present)
    #[arg(long, global = true)]
    settings: Option<String>,

    /// Keep only rows whose species column equals this value
    #[arg(long, global = true)]
    species: Option<String>,

    /// Neither read nor write the local snapshot cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download the latest release and refresh the cache")]
    Fetch,
    #[command(about = "Run a single ad hoc query")]
    Find(FindArgs),
    #[command(about = "Run every query of a TOML query file")]
    Batch(BatchArgs),
    #[command(about = "Delete the local snapshot cache")]
    ClearCache,
}

#[derive(Args)]
struct FindArgs {
    /// COLUMN=SUBSTRING, repeatable; all conditions must hold
    #[arg(long = "where", value_name = "COLUMN=SUBSTRING")]
    conditions: Vec<String>,

    /// Keep every annotation column instead of the construct columns
    #[arg(long)]
    all_columns: bool,
}

#[derive(Args)]
struct BatchArgs {
    /// Query file; without it the whole snapshot is returned
    #[arg(long)]
    queries: Option<PathBuf>,

    /// Write each result to <output_dir>/<id>.tsv
    #[arg(long)]
    output: bool,

    /// Upload each result to the configured endpoint
    #[arg(long)]
    upload: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SearchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SearchError) -> u8 {
    match error {
        SearchError::ReleaseNotFound(_)
        | SearchError::MemberNotFound(_)
        | SearchError::QueryConfigRead(_)
        | SearchError::QueryConfigParse(_)
        | SearchError::SettingsRead(_)
        | SearchError::SettingsParse(_)
        | SearchError::MissingCredential(_) => 2,
        SearchError::ReleaseHttp(_)
        | SearchError::ReleaseStatus { .. }
        | SearchError::UploadHttp(_)
        | SearchError::UploadStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut settings = ConfigLoader::load_settings(cli.settings.as_deref())?;
    if cli.species.is_some() {
        settings.species = cli.species.clone();
    }
    if cli.no_cache {
        settings.use_cache = false;
    }

    let diagnostics = TracingDiagnostics;
    match cli.command {
        Commands::Fetch => run_fetch(&settings, output_mode, &diagnostics),
        Commands::Find(args) => run_find(args, &settings, output_mode, &diagnostics),
        Commands::Batch(args) => run_batch(args, &settings, output_mode, &diagnostics),
        Commands::ClearCache => {
            let cache = SnapshotCache::new(settings.cache_path.as_str());
            let removed = cache.clear()?;
            if removed {
                diagnostics.info(&format!("removed {}", cache.path()));
            } else {
                diagnostics.info(&format!("no cache at {}", cache.path()));
            }
            Ok(())
        }
    }
}

fn build_app(settings: &Settings) -> Result<App<GithubReleaseClient>, SearchError> {
    let client = GithubReleaseClient::new(settings.release_url.as_str())?;
    let extractor = SnapshotExtractor::new(settings.members.clone(), settings.species.clone());
    let cache = SnapshotCache::new(settings.cache_path.as_str());
    Ok(App::new(client, extractor, cache))
}

fn fetch_options(settings: &Settings) -> FetchOptions {
    FetchOptions {
        refresh: false,
        use_cache: settings.use_cache,
    }
}

fn run_fetch(
    settings: &Settings,
    output_mode: OutputMode,
    diagnostics: &dyn Diagnostics,
) -> miette::Result<()> {
    let app = build_app(settings)?;
    let options = FetchOptions {
        refresh: true,
        ..fetch_options(settings)
    };
    let snapshot = app.snapshot(options, diagnostics)?;
    let summary = snapshot.summary();
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_snapshot(&summary).into_diagnostic()?,
        OutputMode::Interactive => print_snapshot_summary(&summary),
    }
    Ok(())
}

fn run_find(
    args: FindArgs,
    settings: &Settings,
    output_mode: OutputMode,
    diagnostics: &dyn Diagnostics,
) -> miette::Result<()> {
    let query = args
        .conditions
        .iter()
        .map(|value| value.parse::<Condition>())
        .collect::<Result<QuerySpec, SearchError>>()?;
    let projection = if args.all_columns {
        Projection::Full
    } else {
        Projection::Construct
    };

    let app = build_app(settings)?;
    let snapshot = app.snapshot(fetch_options(settings), diagnostics)?;
    let rows = app.find(&snapshot, &query, projection, diagnostics)?;

    match (output_mode, projection) {
        (OutputMode::Interactive, Projection::Construct) => print_constructs(&rows)?,
        _ => tsv::write_table(std::io::stdout().lock(), &rows)?,
    }
    Ok(())
}

fn run_batch(
    args: BatchArgs,
    settings: &Settings,
    output_mode: OutputMode,
    diagnostics: &dyn Diagnostics,
) -> miette::Result<()> {
    let queries = match &args.queries {
        Some(path) => Some(ConfigLoader::load_queries(path)?),
        None => None,
    };

    let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
    if args.output {
        sinks.push(Box::new(TsvDirectorySink::new(settings.output_dir.as_str())));
    }
    if args.upload {
        let endpoint = settings.upload_endpoint.clone().ok_or_else(|| {
            miette::Report::msg("--upload needs upload_endpoint in the settings file")
        })?;
        let credential = Credential::from_env(&settings.upload_token_env)?;
        sinks.push(Box::new(HttpUploadSink::new(endpoint, credential)?));
    }
    let sink_refs = sinks.iter().map(|sink| sink.as_ref()).collect::<Vec<_>>();

    let app = build_app(settings)?;
    let report = app.run_batch(
        queries.as_ref(),
        fetch_options(settings),
        &sink_refs,
        diagnostics,
    )?;

    let summary = report.summary();
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_batch(&summary).into_diagnostic()?,
        OutputMode::Interactive => print_batch_summary(&summary),
    }

    if let Some(failure) = report.failures.into_iter().next() {
        return Err(failure.error.into());
    }
    Ok(())
}

fn print_constructs(rows: &ReceptorTable) -> Result<(), SearchError> {
    let records = rows.records()?;
    println!(
        "{:<10} {:<5} {:<24} {:<16} {:<16}",
        "complex", "gene", "cdr3", "v", "j"
    );
    for record in &records {
        let complex = if record.is_paired() {
            record.complex_id.as_str()
        } else {
            "-"
        };
        println!(
            "{:<10} {:<5} {:<24} {:<16} {:<16}",
            complex, record.locus, record.cdr3, record.v_segment, record.j_segment
        );
    }
    println!("{} rows", records.len());
    Ok(())
}

fn print_snapshot_summary(summary: &SnapshotSummary) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}VDJdb snapshot{reset}");
    println!("{green}  rows: {}{reset}", summary.rows);
    println!("{green}  columns: {}{reset}", summary.columns);
    let origin = if summary.from_cache { "cache" } else { "release" };
    println!("{cyan}  {origin}: {}{reset}", summary.source);
}

fn print_batch_summary(summary: &BatchSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}VDJdb query summary{reset}");
    for result in &summary.results {
        let color = if result.matches == 0 { yellow } else { green };
        println!("{color}  {}: {} rows{reset}", result.id, result.matches);
        if !result.query.is_empty() {
            println!("{color}    query: {}{reset}", result.query);
        }
        if let Some(path) = &result.output_path {
            println!("{color}    written: {path}{reset}");
        }
    }
    for failure in &summary.failures {
        println!("{red}  {}: {}{reset}", failure.id, failure.error);
    }
}
