use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use scholar_sync::config::{file_config, find_config_file, get_config, load_config, Config};
use scholar_sync::models::{DownloadStatus, LibraryEntry, PaperSource, SearchRequest};
use scholar_sync::store::{ItemId, LibraryFilters, PageView, UiState};
use scholar_sync::sync::{spawn_refresher, IngestSummary, SearchOutcome, SyncEngine, SyncError};
use scholar_sync::ui::{self, BatchProgress, Spinner, Status};
use scholar_sync::HttpLibraryClient;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scholar Sync - search an aggregated paper index and import results into your library
#[derive(Parser, Debug)]
#[command(name = "scholar-sync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search academic papers and sync them into your library", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table if stdout is a terminal, JSON otherwise
    Auto,
    Table,
    Json,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

/// Search providers, for the client-side source filter
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    Semantic,
    #[value(name = "openalex")]
    OpenAlex,
    Arxiv,
    #[value(name = "crossref")]
    CrossRef,
    Core,
}

impl From<SourceArg> for PaperSource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Semantic => PaperSource::Semantic,
            SourceArg::OpenAlex => PaperSource::OpenAlex,
            SourceArg::Arxiv => PaperSource::Arxiv,
            SourceArg::CrossRef => PaperSource::CrossRef,
            SourceArg::Core => PaperSource::Core,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StatusArg {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl From<StatusArg> for DownloadStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => DownloadStatus::Pending,
            StatusArg::Downloading => DownloadStatus::Downloading,
            StatusArg::Completed => DownloadStatus::Completed,
            StatusArg::Failed => DownloadStatus::Failed,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search all providers and optionally add results to the library
    Search {
        /// Search query
        query: String,

        /// Earliest publication year
        #[arg(long)]
        year_start: Option<i32>,

        /// Latest publication year
        #[arg(long)]
        year_end: Option<i32>,

        /// Minimum citations, applied by the server
        #[arg(long)]
        min_citations: Option<u32>,

        /// Show only results with at least this many citations
        #[arg(long)]
        cited_at_least: Option<u32>,

        /// Show only results with a PDF link
        #[arg(long)]
        open_access: bool,

        /// Show only results from this provider
        #[arg(long, value_enum)]
        source: Option<SourceArg>,

        /// Page to display (1-based)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Add a single result to the library by id
        #[arg(long, value_name = "ID")]
        add: Option<String>,

        /// Select results by id (repeatable)
        #[arg(long, value_name = "ID")]
        select: Vec<String>,

        /// Select every result on the displayed page
        #[arg(long)]
        select_page: bool,

        /// Add the selected results to the library
        #[arg(long)]
        ingest_selected: bool,

        /// Add every result passing the filters to the library
        #[arg(long, conflicts_with = "ingest_selected")]
        ingest_all: bool,

        /// Skip the confirmation prompt for --ingest-all
        #[arg(long, short)]
        yes: bool,
    },

    /// List library entries
    Library {
        #[arg(long)]
        tag: Option<String>,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        #[arg(long)]
        min_citations: Option<u32>,

        #[arg(long)]
        year_start: Option<i32>,

        #[arg(long)]
        year_end: Option<i32>,

        /// Free-text filter on title and authors
        #[arg(long)]
        search: Option<String>,
    },

    /// Show download pipeline counters
    Stats,

    /// Re-queue failed or stuck downloads
    RetryDownloads,

    /// Keep refreshing library and download stats until Ctrl-C
    Watch,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Target path (defaults to the user config directory)
        path: Option<PathBuf>,
    },
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = &cli.config {
        load_config(path).with_context(|| format!("loading {}", path.display()))?
    } else if let Some(path) = find_config_file() {
        load_config(&path).with_context(|| format!("loading {}", path.display()))?
    } else {
        get_config()
    };

    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    Ok(config)
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("scholar_sync={}", level)),
    );

    if config.logging.format.as_deref() == Some("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    init_tracing(&cli, &config);

    if let Commands::Config {
        command: ConfigCommands::Init { path },
    } = &cli.command
    {
        let path = match path {
            Some(path) => path.clone(),
            None => dirs::config_dir()
                .context("no user config directory")?
                .join("scholar-sync")
                .join("config.toml"),
        };
        file_config::write_default(&path)?;
        ui::print_status(Status::Success, &format!("Wrote {}", path.display()));
        return Ok(());
    }

    let client = HttpLibraryClient::new(&config.api)?;
    let engine = Arc::new(SyncEngine::new(Arc::new(client), &config));
    let format = cli.output.resolve();

    let result = match &cli.command {
        Commands::Search { .. } => run_search(&cli, &engine, format).await,
        Commands::Library {
            tag,
            status,
            min_citations,
            year_start,
            year_end,
            search,
        } => {
            let filters = LibraryFilters {
                tag: tag.clone(),
                status: status.map(Into::into),
                min_citations: *min_citations,
                year_start: *year_start,
                year_end: *year_end,
                search: search.clone().unwrap_or_default(),
            };
            engine.store().update(|s| s.set_library_filters(filters));
            engine.refresh_library().await.map(|_| {
                let library = engine.store().read(|s| s.library().clone());
                output_library(&library.items, library.total, format);
            })
        }
        Commands::Stats => engine.refresh_download_stats().await.map(|stats| match format {
            OutputFormat::Json => print_json(&stats),
            _ => ui::print_download_stats(&stats),
        }),
        Commands::RetryDownloads => engine.retry_downloads().await.map(|response| {
            if !cli.quiet {
                ui::print_status(Status::Success, &response.message);
            }
        }),
        Commands::Watch => {
            run_watch(&engine, &config).await;
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_search(cli: &Cli, engine: &SyncEngine, format: OutputFormat) -> Result<(), SyncError> {
    let Commands::Search {
        query,
        year_start,
        year_end,
        min_citations,
        cited_at_least,
        open_access,
        source,
        page,
        add,
        select,
        select_page,
        ingest_selected,
        ingest_all,
        yes,
    } = &cli.command
    else {
        return Ok(());
    };

    let mut request = SearchRequest::new(query.clone());
    request.year_start = *year_start;
    request.year_end = *year_end;
    request.min_citations = *min_citations;

    let interactive = !cli.quiet && format == OutputFormat::Table;
    let spinner = interactive.then(|| Spinner::new(&format!("Searching for \"{}\"", query)));
    let started = Instant::now();
    let outcome = engine.search(request).await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    if let SearchOutcome::Applied { already_saved, .. } = outcome? {
        tracing::debug!("{} results already in the library", already_saved);
    }

    let store = engine.store();
    store.update(|s| {
        if cited_at_least.is_some() {
            s.set_min_citations(*cited_at_least);
        }
        if *open_access {
            s.set_open_access(true);
        }
        if let Some(source) = source {
            s.set_source_filter(Some((*source).into()));
        }
        s.set_page(*page);
    });

    if format == OutputFormat::Table {
        let meta = store.read(|s| s.search_meta().cloned());
        ui::print_search_header(query, meta.as_ref(), started.elapsed());
    }
    store.read(|s| output_page(s, &s.page(), format));

    if let Some(id) = add {
        engine.ingest_one(&ItemId::Search(id.clone())).await?;
        if !cli.quiet {
            ui::print_status(Status::Success, &format!("Added {}", id));
        }
    }

    for id in select {
        if store.toggle_selection(id).is_none() {
            ui::print_status(Status::Warning, &format!("No result with id {}", id));
        }
    }
    if *select_page {
        store.select_all_on_page();
    }

    if *ingest_selected {
        let chunks = store.read(|s| {
            scholar_sync::sync::chunk_count(s.selection().len(), engine.chunk_size())
        });
        let summary = run_batch(cli, chunks, |cancel, progress| {
            engine.ingest_selected(cancel, progress)
        })
        .await?;
        finish_batch(cli, &summary, format);
    } else if *ingest_all {
        let prompt = engine.request_ingest_all()?;
        if !*yes && !confirm(&prompt.message) {
            engine.cancel_ingest_all();
            ui::print_status(Status::Info, "Cancelled");
            return Ok(());
        }
        let summary = run_batch(cli, prompt.chunks, |cancel, progress| {
            engine.confirm_ingest_all(cancel, progress)
        })
        .await?;
        finish_batch(cli, &summary, format);
    }

    Ok(())
}

/// Run a batch with a progress bar; Ctrl-C stops it after the current chunk
async fn run_batch<F, Fut>(cli: &Cli, chunks: usize, start: F) -> Result<IngestSummary, SyncError>
where
    F: FnOnce(CancellationToken, Box<dyn Fn(scholar_sync::sync::IngestEvent) + Send + Sync>) -> Fut,
    Fut: std::future::Future<Output = Result<IngestSummary, SyncError>>,
{
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted; stopping after the current batch");
                cancel.cancel();
            }
        })
    };

    let progress = Arc::new(BatchProgress::new(chunks, cli.quiet));
    let sink = {
        let progress = progress.clone();
        Box::new(move |event: scholar_sync::sync::IngestEvent| progress.on_event(&event))
    };
    let result = start(cancel, sink).await;
    progress.finish();
    watcher.abort();
    result
}

fn finish_batch(cli: &Cli, summary: &IngestSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        _ if !cli.quiet => ui::print_summary(summary),
        _ => {}
    }
}

fn confirm(message: &str) -> bool {
    print!("{} [y/N] ", message);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn run_watch(engine: &Arc<SyncEngine>, config: &Config) {
    let cancel = CancellationToken::new();
    let handle = spawn_refresher(engine.clone(), &config.refresh, cancel.clone());
    let mut changes = engine.store().subscribe();

    ui::print_status(Status::Info, "Watching library (Ctrl-C to stop)");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let (total, stats) = engine
                    .store()
                    .read(|s| (s.library().total, s.download_stats().cloned()));
                match stats {
                    Some(stats) => println!(
                        "{} entries · {} pending · {} downloading · {} failed",
                        total, stats.pending, stats.downloading, stats.failed
                    ),
                    None => println!("{} entries", total),
                }
            }
        }
    }

    cancel.cancel();
    if let Err(e) = handle.await {
        tracing::warn!("Refresher task ended abnormally: {}", e);
    }
}

fn report_error(err: &SyncError) {
    ui::print_status(Status::Error, &err.to_string());
    if let Some(suggestion) = err.suggestion() {
        eprintln!("  {}", suggestion.dimmed());
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Could not serialize output: {}", e),
    }
}

fn output_page(state: &UiState, page: &PageView<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let papers: Vec<_> = page.items.iter().map(|item| item.paper()).collect();
            print_json(&papers);
        }
        _ => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["", "Id", "Title", "Authors", "Source", "Year", "Cited"]);

            for item in &page.items {
                let paper = item.paper();
                let marker = if state.is_saved(item) {
                    "✓"
                } else if state.selection().contains(item.id()) {
                    "●"
                } else {
                    ""
                };
                table.add_row(vec![
                    Cell::new(marker),
                    Cell::new(ui::truncate_with_ellipsis(item.id(), 28)),
                    Cell::new(ui::truncate_with_ellipsis(&paper.title, 50))
                        .add_attribute(Attribute::Bold),
                    Cell::new(ui::truncate_with_ellipsis(&paper.author_names(), 30)),
                    Cell::new(format!("{} {}", ui::source_icon(paper.source), paper.source)),
                    Cell::new(paper.year.map(|y| y.to_string()).unwrap_or_default()),
                    Cell::new(paper.citation_count),
                ]);
            }
            println!("{table}");
            println!(
                "Page {}/{} · showing {}-{} of {} · {} selected",
                page.page,
                page.total_pages,
                if page.is_empty() { 0 } else { page.start + 1 },
                page.end,
                page.total_count,
                state.selection().len()
            );
        }
    }
}

fn output_library(entries: &[LibraryEntry], total: u32, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&entries),
        _ => {
            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Id", "Title", "Year", "Cited", "Download", "Tags"]);

            for entry in entries {
                let tags: Vec<&str> = entry.tags.iter().map(|t| t.name.as_str()).collect();
                table.add_row(vec![
                    Cell::new(entry.id),
                    Cell::new(ui::truncate_with_ellipsis(&entry.paper.title, 50)),
                    Cell::new(entry.paper.year.map(|y| y.to_string()).unwrap_or_default()),
                    Cell::new(entry.paper.citation_count),
                    Cell::new(format!(
                        "{} {}",
                        ui::download_status_icon(entry.download_status),
                        entry.download_status
                    )),
                    Cell::new(tags.join(", ")),
                ]);
            }
            println!("{table}");
            println!("{} of {} entries", entries.len(), total);
        }
    }
}
