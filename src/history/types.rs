use chrono::{Datelike, NaiveDate, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

pub const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Routes we keep history for when no `--routes` override is given.
pub const DEFAULT_ROUTES: &[&str] = &[
    "483", "864", "639", "3", "309", "774", "629", "371", "397", "100", "838", "315", "624",
    "388", "918", "665", "328", "497", "878", "355", "138", "606", "457", "550", "803", "917",
    "638", "2336", "399", "298", "867", "553", "565", "422", "756", "186012003", "292", "554",
    "634", "232", "415", "2803", "324", "852", "557", "759", "343", "779", "905", "108",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingRecord {
    pub vehicle_id: String,
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub speed: f64,
}

/// Local calendar hour used to bucket both files and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HourKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl HourKey {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }

    pub fn from_millis(tz: Tz, millis: i64) -> Option<Self> {
        let local = tz.timestamp_millis_opt(millis).single()?;
        Some(Self::new(
            local.year(),
            local.month(),
            local.day(),
            local.hour(),
        ))
    }

    /// Parses an hour stem such as `2024-05-16_08`.
    pub fn parse_stem(stem: &str) -> Option<Self> {
        let (date_part, hour_part) = stem.split_once('_')?;
        if hour_part.contains('_') || hour_part.is_empty() || hour_part.len() > 2 {
            return None;
        }
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        let hour: u32 = hour_part.parse().ok()?;
        if hour > 23 {
            return None;
        }
        Some(Self::new(date.year(), date.month(), date.day(), hour))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// First instant of this hour in `tz`, as epoch milliseconds.
    pub fn start_millis(&self, tz: Tz) -> Option<i64> {
        let naive = self.date()?.and_hms_opt(self.hour, 0, 0)?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    }
}

/// Closed interval `[start, end]` of epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// The window of `hours` ending at `reference`.
    pub fn ending_at(reference: i64, hours: u32) -> Self {
        Self::new(
            reference.saturating_sub(i64::from(hours) * MILLIS_PER_HOUR),
            reference,
        )
    }

    /// The whole local calendar day (00:00:00.000 to 23:59:59.999), extended
    /// backwards by `hours_before`.
    pub fn for_day(tz: Tz, day: NaiveDate, hours_before: u32) -> Option<Self> {
        let midnight = tz
            .from_local_datetime(&day.and_hms_opt(0, 0, 0)?)
            .earliest()?;
        let last = tz
            .from_local_datetime(&day.and_hms_milli_opt(23, 59, 59, 999)?)
            .latest()?;
        Some(Self::new(
            midnight
                .timestamp_millis()
                .saturating_sub(i64::from(hours_before) * MILLIS_PER_HOUR),
            last.timestamp_millis(),
        ))
    }

    pub fn contains(&self, millis: i64) -> bool {
        millis >= self.start && millis <= self.end
    }

    /// Every local hour bucket touched by the window, in order.
    pub fn hour_keys(&self, tz: Tz) -> BTreeSet<HourKey> {
        let mut keys = BTreeSet::new();
        if self.start > self.end {
            return keys;
        }
        let Some(mut cursor) =
            HourKey::from_millis(tz, self.start).and_then(|key| key.start_millis(tz))
        else {
            return keys;
        };
        while cursor <= self.end {
            if let Some(key) = HourKey::from_millis(tz, cursor) {
                keys.insert(key);
            }
            let Some(next) = cursor.checked_add(MILLIS_PER_HOUR) else {
                break;
            };
            cursor = next;
        }
        keys
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteAllowList {
    routes: HashSet<String>,
}

impl RouteAllowList {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            routes: routes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(DEFAULT_ROUTES.iter().copied())
    }

    pub fn permits(&self, route_id: &str) -> bool {
        self.routes.contains(route_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
