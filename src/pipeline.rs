use crate::error::{Error, Result};
use crate::history::{
    DayCache, HistoryFilter, NormalizerConfig, RecordNormalizer, TimeIndex, TimeWindow,
    WindowLoader,
};
use crate::output::Prediction;
use crate::predictor::{predict_arrival_time, predict_location};
use crate::query::{load_query_file, Query, QueryTarget, QUERY_FILE_PREFIX};
use chrono::{Days, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub historical_root: PathBuf,
    pub test_root: PathBuf,
    /// Hours loaded before midnight of each test day.
    pub day_lookback_hours: u32,
    /// Hours of history each query looks back from its reference time.
    pub query_lookback_hours: u32,
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub days: usize,
    pub query_files: usize,
    pub queries: usize,
    pub rejected: usize,
    pub without_history: usize,
    pub predictions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub predictions: Vec<Prediction>,
    pub summary: RunSummary,
}

/// Builds the index, checks history covers the test days, then answers every
/// query day by day with a freshly loaded day cache.
pub async fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let index = TimeIndex::build(&config.historical_root)?;
    if index.is_empty() {
        warn!(
            "No hour files found under {}; every query will go unanswered",
            config.historical_root.display()
        );
    }
    let test_days = list_test_days(&config.test_root)?;

    check_overlap(
        &config.historical_root,
        index.latest_day(),
        test_days.first().map(|(day, _)| *day),
    )?;

    let loader = WindowLoader::new(RecordNormalizer::new(config.normalizer.clone()));
    let filter = HistoryFilter::new(&config.normalizer.routes);
    let mut output = PipelineOutput::default();

    for (day, folder) in test_days {
        info!("Processing test day {}", day);
        let cache = loader.load(&index, day, config.day_lookback_hours).await;
        output.summary.days += 1;

        for path in list_query_files(&folder)? {
            let batch = match load_query_file(&path, loader.timezone()) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Skipping query file: {}", e);
                    continue;
                }
            };
            debug!(
                "{}: {} queries, {} rejected",
                path.display(),
                batch.queries.len(),
                batch.rejected
            );
            output.summary.query_files += 1;
            output.summary.queries += batch.queries.len();
            output.summary.rejected += batch.rejected;

            for query in &batch.queries {
                match answer_query(&cache, &filter, query, config.query_lookback_hours) {
                    Some(prediction) => output.predictions.push(prediction),
                    None => output.summary.without_history += 1,
                }
            }
        }
    }

    output.summary.predictions = output.predictions.len();
    info!(
        "Answered {} of {} queries over {} days ({} rejected, {} without history)",
        output.summary.predictions,
        output.summary.queries,
        output.summary.days,
        output.summary.rejected,
        output.summary.without_history
    );
    Ok(output)
}

/// `None` when the bus has no pings in the query's lookback window.
pub fn answer_query(
    cache: &DayCache,
    filter: &HistoryFilter<'_>,
    query: &Query,
    lookback_hours: u32,
) -> Option<Prediction> {
    let window = TimeWindow::ending_at(query.reference_time, lookback_hours);
    let history = filter.filter(cache, &query.vehicle_id, &query.route_id, window);
    if history.is_empty() {
        return None;
    }

    match query.target {
        QueryTarget::Time(target) => predict_location(&history, target)
            .map(|(lat, lon)| Prediction::location(query.id.clone(), lat, lon)),
        QueryTarget::Location {
            latitude,
            longitude,
        } => predict_arrival_time(&history, latitude, longitude)
            .map(|timestamp| Prediction::time(query.id.clone(), timestamp)),
    }
}

/// History must reach at least the day before the first test day.
pub fn check_overlap(
    historical_root: &Path,
    latest_history: Option<NaiveDate>,
    earliest_test: Option<NaiveDate>,
) -> Result<()> {
    let Some(earliest) = earliest_test else {
        return Ok(());
    };
    let Some(latest) = latest_history else {
        return Err(Error::EmptyHistory(historical_root.to_path_buf()));
    };
    if latest
        .checked_add_days(Days::new(1))
        .map_or(false, |margin| earliest > margin)
    {
        return Err(Error::NoHistoricalOverlap { latest, earliest });
    }
    Ok(())
}

fn list_test_days(root: &Path) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let mut days = Vec::new();
    for path in list_dir(root)? {
        if !path.is_dir() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match NaiveDate::parse_from_str(name, "%Y-%m-%d") {
            Ok(day) => days.push((day, path)),
            Err(_) => warn!("Skipping test folder {}", path.display()),
        }
    }
    days.sort();
    Ok(days)
}

fn list_query_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<_> = list_dir(folder)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(QUERY_FILE_PREFIX) && n.ends_with(".json"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn list_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect())
}
