use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use futures::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::analysis::Analyzer;
use crate::error::RebuildError;
use crate::model::{Candle, SignalValue, Snapshot, Timeframe};
use crate::storage::{CandleSource, SnapshotSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientHistory { required: usize, available: usize },
    /// The source could not return the symbol's candles.
    LoadFailed,
    /// The analysis task panicked or was aborted.
    AnalysisAborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Snapshotted(Snapshot),
    Skipped { symbol: String, reason: SkipReason },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub symbols: usize,
    pub snapshotted: usize,
    pub skipped: usize,
}

/// Rebuild every snapshot from `source` and write them to `sink` in one step.
///
/// Snapshots are built in memory first; the sink is only called once every
/// symbol finished. Failing to list symbols, or cancellation, leaves the sink
/// untouched. A symbol whose candles cannot be loaded is skipped.
///
/// Analysis runs on the blocking pool, up to `concurrency` symbols at once.
pub async fn rebuild(
    source: &dyn CandleSource,
    sink: &dyn SnapshotSink,
    analyzer: Arc<Analyzer>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<RebuildSummary, Report<RebuildError>> {
    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("rebuild", %run_id);

    async move {
        let symbols = source
            .list_symbols()
            .await
            .change_context(RebuildError::Source)?;
        info!(symbols = symbols.len(), "rebuilding snapshots");

        let updated_at = Utc::now();
        let mut outcomes: Vec<SymbolOutcome> = stream::iter(symbols.iter())
            .map(|symbol| build_symbol(source, &analyzer, symbol, updated_at, cancel))
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        if cancel.is_cancelled() {
            return Err(Report::new(RebuildError::Cancelled));
        }

        outcomes.sort_by(|a, b| outcome_symbol(a).cmp(outcome_symbol(b)));

        let mut summary = RebuildSummary {
            symbols: symbols.len(),
            ..RebuildSummary::default()
        };
        let mut snapshots = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Snapshotted(snapshot) => {
                    summary.snapshotted += 1;
                    snapshots.push(snapshot);
                }
                SymbolOutcome::Skipped { symbol, reason } => {
                    summary.skipped += 1;
                    info!(symbol = %symbol, ?reason, "symbol skipped");
                }
            }
        }

        sink.replace_snapshots(snapshots)
            .await
            .change_context(RebuildError::Sink)?;

        info!(
            snapshotted = summary.snapshotted,
            skipped = summary.skipped,
            "snapshots replaced"
        );
        Ok(summary)
    }
    .instrument(span)
    .await
}

fn outcome_symbol(outcome: &SymbolOutcome) -> &str {
    match outcome {
        SymbolOutcome::Snapshotted(snapshot) => &snapshot.symbol,
        SymbolOutcome::Skipped { symbol, .. } => symbol,
    }
}

async fn build_symbol(
    source: &dyn CandleSource,
    analyzer: &Arc<Analyzer>,
    symbol: &str,
    updated_at: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<SymbolOutcome, Report<RebuildError>> {
    if cancel.is_cancelled() {
        return Err(Report::new(RebuildError::Cancelled))
            .attach_with(|| format!("before symbol {symbol}"));
    }

    let skipped = |reason| SymbolOutcome::Skipped {
        symbol: symbol.to_string(),
        reason,
    };

    let series = match source.load_series(symbol).await {
        Ok(series) => series,
        Err(report) => {
            warn!(symbol, error = ?report, "cannot load candles, skipping symbol");
            return Ok(skipped(SkipReason::LoadFailed));
        }
    };

    let analyzer = Arc::clone(analyzer);
    let owned = symbol.to_string();
    let task = tokio::task::spawn_blocking(move || {
        snapshot_symbol(&analyzer, &owned, &series, updated_at)
    });
    match task.await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            warn!(symbol, error = %err, "analysis task failed, skipping symbol");
            Ok(skipped(SkipReason::AnalysisAborted))
        }
    }
}

/// Build one symbol's snapshot from its daily series.
///
/// A timeframe that cannot be analyzed is recorded as `Na` without failing
/// the symbol.
pub fn snapshot_symbol(
    analyzer: &Analyzer,
    symbol: &str,
    series: &[Candle],
    updated_at: DateTime<Utc>,
) -> SymbolOutcome {
    let required = analyzer.min_candles().daily;
    if series.len() < required {
        return SymbolOutcome::Skipped {
            symbol: symbol.to_string(),
            reason: SkipReason::InsufficientHistory {
                required,
                available: series.len(),
            },
        };
    }

    let signal = |timeframe: Timeframe| match analyzer.analyze(series, timeframe) {
        Ok(outcome) => outcome.signal(),
        Err(report) => {
            warn!(
                symbol,
                timeframe = %timeframe,
                error = ?report,
                "timeframe analysis failed, recording N/A"
            );
            SignalValue::Na
        }
    };

    let latest = series.iter().max_by_key(|c| c.date);

    SymbolOutcome::Snapshotted(Snapshot {
        symbol: symbol.to_string(),
        price: latest.and_then(|c| c.close),
        volume_recent: latest.and_then(|c| c.volume),
        daily_signal: signal(Timeframe::Daily),
        weekly_signal: signal(Timeframe::Weekly),
        monthly_signal: signal(Timeframe::Monthly),
        updated_at,
    })
}
