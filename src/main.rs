//! CLI entry point for the ridership comparison tool.
//!
//! Loads the static ridership and metadata datasets for one transit mode,
//! compares two months, and renders the result as a table, JSON, CSV or
//! GeoJSON. The "data last fetched" timestamp is looked up in the background
//! and shown only if it arrives in time.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use ridership_changes::{
    assign::TransitMode,
    compare::{ComparisonSummary, compare},
    config::{AppConfig, DatasetPaths},
    dataset::{MonthBounds, load_metadata, load_ridership},
    fetch::BasicClient,
    freshness::{Freshness, fetch_freshness},
    metadata::MetadataIndex,
    output::{SortOrder, render_table, sort_rows, to_geojson, to_json, write_csv},
    period::YearMonth,
};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Written once when the background lookup succeeds, read when rendering.
static FRESHNESS: OnceLock<Freshness> = OnceLock::new();

const FRESHNESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "ridership_changes")]
#[command(about = "Compare transit ridership between two months", long_about = None)]
struct Cli {
    /// JSON config file with dataset paths (falls back to $RIDERSHIP_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
    Geojson,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare per-route or per-station ridership between two months
    Compare {
        /// Transit mode to compare
        #[arg(short, long, value_enum, default_value_t = TransitMode::Bus)]
        mode: TransitMode,

        /// "From" month (YYYY-MM); defaults to the earliest selectable month
        #[arg(long, value_parser = parse_month)]
        from: Option<YearMonth>,

        /// "To" month (YYYY-MM); defaults to the newest month in the dataset
        #[arg(long, value_parser = parse_month)]
        to: Option<YearMonth>,

        /// Ridership dataset (CSV or JSON), overrides the config file
        #[arg(long)]
        ridership: Option<PathBuf>,

        /// Entity metadata dataset (CSV or JSON), overrides the config file
        #[arg(long)]
        metadata: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        #[arg(short, long, value_enum, default_value_t = SortOrder::Entity)]
        sort: SortOrder,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Freshness source (gist API URL or last_modified.txt URL)
        #[arg(long)]
        freshness_url: Option<String>,
    },
    /// Show the range of months that can be compared
    Months {
        #[arg(short, long, value_enum, default_value_t = TransitMode::Bus)]
        mode: TransitMode,

        #[arg(long)]
        ridership: Option<PathBuf>,
    },
    /// Fetch and show when the datasets were last refreshed
    LastFetched {
        /// Freshness source, overrides the config file
        #[arg(long)]
        url: Option<String>,
    },
}

fn parse_month(s: &str) -> Result<YearMonth, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/ridership_changes.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ridership_changes.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Compare {
            mode,
            from,
            to,
            ridership,
            metadata,
            format,
            sort,
            output,
            freshness_url,
        } => {
            // Started first, awaited last: the comparison never waits on it.
            let freshness = freshness_url
                .or_else(|| config.freshness_url().map(str::to_string))
                .map(spawn_freshness);

            let paths = dataset_paths(&config, mode, ridership, metadata)?;
            let raw = load_ridership(&paths.ridership)?;
            let index = MetadataIndex::build(load_metadata(&paths.metadata)?);
            info!(%mode, entities = index.len(), "Metadata index built");

            let bounds = MonthBounds::from_records(config.earliest_month(), &raw);
            let from = from.unwrap_or(config.earliest_month());
            let to = match (to, bounds) {
                (Some(to), _) => to,
                (None, Some(bounds)) => bounds.latest,
                (None, None) => return Err(anyhow!("no dated records in ridership; pass --to")),
            };
            if let Some(bounds) = bounds {
                for month in [from, to] {
                    if !bounds.contains(month) {
                        warn!(%month, earliest = %bounds.earliest, latest = %bounds.latest, "Month outside the dataset's range");
                    }
                }
            }

            let boardings = mode.assigner(index).assign(&raw);
            let mut rows = compare(&boardings, from, to);
            sort_rows(&mut rows, sort);

            let summary = ComparisonSummary::from_rows(&rows);
            info!(
                entities = summary.entities,
                total_month1 = summary.total_month1,
                total_month2 = summary.total_month2,
                change = %summary.percent_change,
                grew = summary.grew,
                declined = summary.declined,
                new = summary.new,
                "Comparison summary"
            );

            let mut rendered = Vec::new();
            match format {
                Format::Table => rendered.extend(render_table(mode, from, to, &rows).into_bytes()),
                Format::Json => rendered.extend(to_json(mode, from, to, &rows)?.into_bytes()),
                Format::Csv => write_csv(&mut rendered, &rows)?,
                Format::Geojson => {
                    rendered.extend(serde_json::to_string_pretty(&to_geojson(&rows))?.into_bytes())
                }
            }

            if let Some(task) = freshness {
                resolve_freshness(task).await;
            }
            if format == Format::Table {
                if let Some(freshness) = FRESHNESS.get() {
                    writeln!(rendered, "\nData last fetched: {} (Chicago)", freshness.chicago_display())?;
                }
            }

            emit(output.as_deref(), &rendered)?;
        }
        Commands::Months { mode, ridership } => {
            let path = match ridership {
                Some(path) => path,
                None => dataset_paths(&config, mode, None, None)?.ridership,
            };
            let raw = load_ridership(&path)?;
            let bounds = MonthBounds::from_records(config.earliest_month(), &raw)
                .ok_or_else(|| anyhow!("no dated records in {}", path.display()))?;

            info!(%mode, earliest = %bounds.earliest, latest = %bounds.latest, "Selectable months");
            println!("{} {}", bounds.earliest, bounds.latest);
        }
        Commands::LastFetched { url } => {
            let url = url
                .or_else(|| config.freshness_url().map(str::to_string))
                .ok_or_else(|| anyhow!("no freshness URL; pass --url or set freshness_url in the config"))?;
            let freshness = fetch_freshness(&BasicClient::new(), &url).await?;

            println!("Data last fetched: {} (Chicago)", freshness.chicago_display());
            if let Some(month) = freshness.last_month {
                println!("Latest month: {month}");
            }
        }
    }

    Ok(())
}

/// Resolves dataset paths, preferring command-line flags over the config.
fn dataset_paths(
    config: &AppConfig,
    mode: TransitMode,
    ridership: Option<PathBuf>,
    metadata: Option<PathBuf>,
) -> Result<DatasetPaths> {
    let configured = config.datasets(mode);

    let ridership = ridership
        .or_else(|| configured.map(|d| d.ridership.clone()))
        .with_context(|| format!("no {mode} ridership dataset; pass --ridership or configure one"))?;
    let metadata = metadata
        .or_else(|| configured.map(|d| d.metadata.clone()))
        .with_context(|| format!("no {mode} metadata dataset; pass --metadata or configure one"))?;

    Ok(DatasetPaths { ridership, metadata })
}

#[tracing::instrument(skip(url), fields(source = %url))]
fn spawn_freshness(url: String) -> JoinHandle<Result<Freshness>> {
    tokio::spawn(async move { fetch_freshness(&BasicClient::new(), &url).await })
}

/// Waits briefly for the background lookup; failures are logged, not raised.
async fn resolve_freshness(task: JoinHandle<Result<Freshness>>) {
    match tokio::time::timeout(FRESHNESS_TIMEOUT, task).await {
        Ok(Ok(Ok(freshness))) => {
            info!(last_fetched = %freshness.chicago_display(), "Data freshness");
            let _ = FRESHNESS.set(freshness);
        }
        Ok(Ok(Err(e))) => warn!(error = %e, "Freshness lookup failed"),
        Ok(Err(e)) => warn!(error = %e, "Freshness task panicked"),
        Err(_) => warn!(timeout_secs = FRESHNESS_TIMEOUT.as_secs(), "Freshness lookup timed out"),
    }
}

fn emit(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "Output written");
        }
        None => std::io::stdout().write_all(bytes)?,
    }
    Ok(())
}
