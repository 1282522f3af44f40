use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt, bail};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use market_snapshot::analysis::Analyzer;
use market_snapshot::config::{self, AppConfig, SourceKind};
use market_snapshot::model::{Snapshot, Timeframe};
use market_snapshot::signal::RuleThresholds;
use market_snapshot::snapshot::rebuild;
use market_snapshot::source::csv::CsvCandleSource;
use market_snapshot::storage::CandleSource;
use market_snapshot::storage::sqlite::SqliteStorage;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("candle source error")]
    Source,
    #[display("analysis error")]
    Analysis,
    #[display("rebuild failed")]
    Rebuild,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(
    name = "market-snapshot",
    about = "Multi-timeframe technical signal snapshots"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute every snapshot from the configured candle source
    Rebuild,
    /// Print the indicator and signal detail for one symbol as JSON
    Show {
        symbol: String,
        /// Only this timeframe: daily, weekly or monthly
        #[arg(short, long)]
        timeframe: Option<String>,
    },
    /// Print the stored snapshot table
    List,
    /// Load daily candles from a CSV file into the database
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let db_path = config.general.database_path();
    let storage = Arc::new(
        SqliteStorage::open(&db_path)
            .await
            .change_context(AppError::Storage)?,
    );

    match cli.command {
        Command::Rebuild => run_rebuild(&config, storage).await,
        Command::Show { symbol, timeframe } => {
            run_show(&config, storage, &symbol, timeframe.as_deref()).await
        }
        Command::List => run_list(&storage).await,
        Command::Import { path } => run_import(&storage, &path).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_analyzer(config: &AppConfig) -> Result<Analyzer, Report<AppError>> {
    Analyzer::new(config.snapshot.min_candles, RuleThresholds::default())
        .change_context(AppError::Analysis)
}

fn open_source(
    config: &AppConfig,
    storage: Arc<SqliteStorage>,
) -> Result<Arc<dyn CandleSource>, Report<AppError>> {
    match config.source.kind {
        SourceKind::Sqlite => Ok(storage as Arc<dyn CandleSource>),
        SourceKind::Csv => {
            let Some(path) = config.source.csv_path.as_deref() else {
                bail!(AppError::Config);
            };
            let source = CsvCandleSource::open(Path::new(path)).change_context(AppError::Source)?;
            Ok(Arc::new(source) as Arc<dyn CandleSource>)
        }
    }
}

async fn run_rebuild(
    config: &AppConfig,
    storage: Arc<SqliteStorage>,
) -> Result<(), Report<AppError>> {
    let analyzer = Arc::new(build_analyzer(config)?);
    let source = open_source(config, Arc::clone(&storage))?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl+c received, cancelling rebuild");
                cancel.cancel();
            }
        })
    };

    let result = rebuild(
        source.as_ref(),
        storage.as_ref(),
        analyzer,
        config.snapshot.concurrency,
        &cancel,
    )
    .await;
    watcher.abort();

    let summary = result.change_context(AppError::Rebuild)?;
    println!(
        "{} symbols: {} snapshotted, {} skipped",
        summary.symbols, summary.snapshotted, summary.skipped
    );
    Ok(())
}

async fn run_show(
    config: &AppConfig,
    storage: Arc<SqliteStorage>,
    symbol: &str,
    timeframe: Option<&str>,
) -> Result<(), Report<AppError>> {
    let analyzer = build_analyzer(config)?;
    let source = open_source(config, storage)?;
    let series = source
        .load_series(symbol)
        .await
        .change_context(AppError::Source)?;
    if series.is_empty() {
        return Err(Report::new(AppError::Source))
            .attach_with(|| format!("no candles for {symbol}"));
    }

    match timeframe {
        Some(name) => {
            let timeframe: Timeframe = name
                .parse()
                .map_err(Report::new)
                .change_context(AppError::Analysis)?;
            let outcome = analyzer
                .analyze(&series, timeframe)
                .change_context(AppError::Analysis)?;
            let json = serde_json::to_string_pretty(&outcome).change_context(AppError::Runtime)?;
            println!("{json}");
        }
        None => {
            let overview = analyzer
                .overview(&series)
                .change_context(AppError::Analysis)?;
            let json = serde_json::to_string_pretty(&overview).change_context(AppError::Runtime)?;
            println!("{json}");
            println!("recommendation: {}", overview.recommendation);
        }
    }
    Ok(())
}

async fn run_list(storage: &SqliteStorage) -> Result<(), Report<AppError>> {
    let snapshots = storage
        .list_snapshots()
        .await
        .change_context(AppError::Storage)?;

    println!(
        "{:<12} {:>14} {:>16} {:<6} {:<6} {:<7} UPDATED",
        "SYMBOL", "PRICE", "VOLUME", "DAILY", "WEEKLY", "MONTHLY"
    );
    for s in &snapshots {
        println!("{}", format_row(s));
    }
    Ok(())
}

fn format_row(s: &Snapshot) -> String {
    let number = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    format!(
        "{:<12} {:>14} {:>16} {:<6} {:<6} {:<7} {}",
        s.symbol,
        number(s.price),
        number(s.volume_recent),
        s.daily_signal.as_str(),
        s.weekly_signal.as_str(),
        s.monthly_signal.as_str(),
        s.updated_at.to_rfc3339()
    )
}

async fn run_import(storage: &SqliteStorage, path: &Path) -> Result<(), Report<AppError>> {
    let source = CsvCandleSource::open(path).change_context(AppError::Source)?;
    let symbols = source
        .list_symbols()
        .await
        .change_context(AppError::Source)?;

    for symbol in &symbols {
        let candles = source
            .load_series(symbol)
            .await
            .change_context(AppError::Source)?;
        storage
            .upsert_candles(symbol, &candles)
            .await
            .change_context(AppError::Storage)?;
        info!(symbol = %symbol, candles = candles.len(), "imported");
    }

    println!("imported {} symbols from {}", symbols.len(), path.display());
    Ok(())
}
