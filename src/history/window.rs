use crate::history::{HourKey, PingRecord, RecordNormalizer, TimeIndex, TimeWindow};
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Records loaded for one test day, bucketed by the hour encoded in the file
/// they came from. Replaced wholesale when the next day is processed.
#[derive(Debug, Clone)]
pub struct DayCache {
    day: NaiveDate,
    timezone: Tz,
    buckets: BTreeMap<HourKey, Vec<PingRecord>>,
}

impl DayCache {
    pub fn new(day: NaiveDate, timezone: Tz) -> Self {
        Self {
            day,
            timezone,
            buckets: BTreeMap::new(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn bucket(&self, key: &HourKey) -> Option<&[PingRecord]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn extend(&mut self, key: HourKey, records: Vec<PingRecord>) {
        if records.is_empty() {
            return;
        }
        self.buckets.entry(key).or_default().extend(records);
    }

    pub fn hours(&self) -> usize {
        self.buckets.len()
    }

    pub fn record_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

/// Bulk-loads the files a test day needs. This is the expensive step, so the
/// pipeline calls it once per day and shares the result across queries.
#[derive(Debug, Clone)]
pub struct WindowLoader {
    normalizer: Arc<RecordNormalizer>,
}

impl WindowLoader {
    pub fn new(normalizer: RecordNormalizer) -> Self {
        Self {
            normalizer: Arc::new(normalizer),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.normalizer.config().timezone
    }

    pub async fn load(&self, index: &TimeIndex, day: NaiveDate, hours_before: u32) -> DayCache {
        let tz = self.timezone();
        let mut cache = DayCache::new(day, tz);

        let Some(window) = TimeWindow::for_day(tz, day, hours_before) else {
            warn!("Cannot resolve the calendar day {} in {}", day, tz);
            return cache;
        };

        // A path maps to exactly one hour key, so keying by path deduplicates.
        let mut pending: BTreeMap<PathBuf, HourKey> = BTreeMap::new();
        for key in window.hour_keys(tz) {
            for path in index.files_for(&key).into_iter().flatten() {
                pending.entry(path.clone()).or_insert(key);
            }
        }
        info!(
            "Preloading {} files for test day {} ({}h lookback)",
            pending.len(),
            day,
            hours_before
        );

        let mut tasks = JoinSet::new();
        for (path, key) in pending {
            let normalizer = Arc::clone(&self.normalizer);
            tasks.spawn_blocking(move || {
                let result = normalizer.load_file(&path);
                (key, path, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, path, Ok(records))) => {
                    debug!("Loaded {} pings from {}", records.len(), path.display());
                    cache.extend(key, records);
                }
                Ok((_, _, Err(e))) => warn!("Skipping historical file: {}", e),
                Err(e) => error!("File loading task failed: {}", e),
            }
        }

        info!(
            "Day cache for {} holds {} pings across {} hours",
            cache.day(),
            cache.record_count(),
            cache.hours()
        );
        cache
    }
}
