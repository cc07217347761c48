//! Terminal output helpers for the CLI.
//!
//! Colored status lines, icons, and the spinner/progress bars shown while
//! searches and bulk ingestions run.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::models::{DownloadStats, DownloadStatus, PaperSource, SearchMeta};
use crate::sync::{ChunkOutcome, IngestEvent, IngestSummary};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

pub fn source_icon(source: PaperSource) -> &'static str {
    match source {
        PaperSource::Semantic => "🧠",
        PaperSource::OpenAlex => "🔗",
        PaperSource::Arxiv => "📝",
        PaperSource::CrossRef => "🔗",
        PaperSource::Core => "💎",
        PaperSource::Manual => "✍",
    }
}

pub fn download_status_icon(status: DownloadStatus) -> &'static str {
    match status {
        DownloadStatus::Pending => "○",
        DownloadStatus::Downloading => "↓",
        DownloadStatus::Completed => "✓",
        DownloadStatus::Failed => "✗",
    }
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Search => "🔍",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Search,
}

/// Print a styled status message.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => println!("{} {}", icon.green().bold(), msg),
        Status::Error => eprintln!("{} {}", icon.red().bold(), msg),
        Status::Warning => println!("{} {}", icon.yellow().bold(), msg),
        Status::Info => println!("{} {}", icon.cyan().bold(), msg),
        Status::Search => println!("{} {}", icon.yellow(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print search results header.
pub fn print_search_header(query: &str, meta: Option<&SearchMeta>, duration: Duration) {
    println!();
    println!(
        "{} Search results for: \"{}\"",
        status_icon(Status::Search).yellow().bold(),
        query.cyan().bold()
    );
    let count = meta.map(|m| m.total).unwrap_or_default();
    println!(
        "{} Found {} papers in {:.2}s",
        "─".repeat(30).dimmed(),
        format_number(count as usize).green().bold(),
        duration.as_secs_f64()
    );
    if let Some(meta) = meta {
        println!(
            "{}",
            format!(
                "  semantic {} · openalex {} · arxiv {} · crossref {} · core {} · {} duplicates removed",
                meta.raw_semantic,
                meta.raw_openalex,
                meta.raw_arxiv,
                meta.raw_crossref,
                meta.raw_core,
                meta.duplicates_removed
            )
            .dimmed()
        );
    }
    println!();
}

/// Print the outcome of an ingestion run
pub fn print_summary(summary: &IngestSummary) {
    let status = if summary.cancelled || summary.failed > 0 {
        Status::Warning
    } else {
        Status::Success
    };
    print_status(status, &summary.message());
}

pub fn print_download_stats(stats: &DownloadStats) {
    println!(
        "{} {}  {} {}  {} {}  {} {}  (total {})",
        download_status_icon(DownloadStatus::Pending).white().dimmed(),
        stats.pending,
        download_status_icon(DownloadStatus::Downloading).magenta(),
        stats.downloading,
        download_status_icon(DownloadStatus::Completed).green(),
        stats.completed,
        download_status_icon(DownloadStatus::Failed).red(),
        stats.failed,
        stats.total
    );
    for entry in &stats.failed_entries {
        println!(
            "  {} {}",
            "✗".red(),
            truncate_with_ellipsis(&entry.title, 70)
        );
    }
}

/// Format a number with commas.
pub fn format_number(n: usize) -> String {
    n.to_string()
        .chars()
        .rev()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect()
}

/// Truncate text to at most `max_chars` characters, ending in `...`
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if max_chars <= 3 {
        return "...".to_string();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", truncated.trim_end())
}

fn style(template: &str) -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(template)
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
}

/// Spinner shown while a request is in flight.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(style("{spinner:.cyan} {msg}").tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    pub fn finish_with_success(&self, msg: &str) {
        self.pb.set_style(style("{spinner:.green} {msg}").tick_chars("✓✓"));
        self.pb.finish_with_message(msg.to_string());
    }

    pub fn finish_with_error(&self, msg: &str) {
        self.pb.set_style(style("{spinner:.red} {msg}").tick_chars("✗✗"));
        self.pb.finish_with_message(msg.to_string());
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}

/// Chunk-level progress bar for bulk ingestion
pub struct BatchProgress {
    pb: indicatif::ProgressBar,
}

impl BatchProgress {
    pub fn new(total_chunks: usize, hidden: bool) -> Self {
        let pb = if hidden {
            indicatif::ProgressBar::hidden()
        } else {
            indicatif::ProgressBar::new(total_chunks as u64)
        };
        pb.set_style(
            style("{msg} {bar:40.cyan/blue} {pos}/{len} batches").progress_chars("█▓▒░ "),
        );
        pb.set_message("📥 Adding to library");

        Self { pb }
    }

    pub fn on_event(&self, event: &IngestEvent) {
        match event {
            IngestEvent::ChunkStarted {
                chunk,
                total_chunks,
                size,
            } => {
                self.pb.set_message(format!(
                    "📥 Sending batch {}/{} ({} papers)",
                    chunk, total_chunks, size
                ));
            }
            IngestEvent::ChunkFinished { chunk, outcome, .. } => {
                if let ChunkOutcome::Failed { papers, error } = outcome {
                    self.pb.println(format!(
                        "{} batch {} failed ({} papers): {}",
                        "✗".red(),
                        chunk,
                        papers,
                        error
                    ));
                }
                self.pb.inc(1);
            }
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
