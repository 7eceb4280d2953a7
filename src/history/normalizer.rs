use crate::error::Error;
use crate::history::fields::{
    parse_decimal, parse_identifier, parse_millis, parse_number, valid_coordinates,
};
use crate::history::{PingRecord, RouteAllowList};
use chrono::{TimeZone, Timelike};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Half-open `[start, end)` window of local hours in which buses are in service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHours {
    pub start: u32,
    pub end: u32,
}

impl ServiceHours {
    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour < self.end
    }
}

impl Default for ServiceHours {
    fn default() -> Self {
        Self { start: 8, end: 23 }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub routes: RouteAllowList,
    pub service_hours: Option<ServiceHours>,
    pub timezone: Tz,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPing {
    #[serde(rename = "ordem", alias = "vehicle_id")]
    vehicle: Option<Value>,
    #[serde(rename = "linha", alias = "route_id")]
    route: Option<Value>,
    latitude: Option<Value>,
    longitude: Option<Value>,
    #[serde(rename = "datahoraservidor", alias = "timestamp")]
    server_time: Option<Value>,
    #[serde(rename = "datahora")]
    device_time: Option<Value>,
    #[serde(rename = "velocidade", alias = "speed")]
    speed: Option<Value>,
}

/// Turns raw ping dumps into clean [`PingRecord`]s, dropping rows that do not
/// parse or that fall outside the configured routes and service hours.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    config: NormalizerConfig,
}

impl RecordNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn load_file(&self, path: &Path) -> Result<Vec<PingRecord>, Error> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_reader(BufReader::new(file))
            .map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<Vec<PingRecord>, serde_json::Error> {
        let rows: Vec<Value> = serde_json::from_reader(reader)?;
        let total = rows.len();

        let records: Vec<PingRecord> = rows
            .into_iter()
            .filter_map(|row| serde_json::from_value::<RawPing>(row).ok())
            .filter_map(|raw| self.normalize(raw))
            .collect();

        debug!("Kept {} of {} raw pings", records.len(), total);
        Ok(records)
    }

    fn normalize(&self, raw: RawPing) -> Option<PingRecord> {
        let route_id = raw.route.as_ref().and_then(parse_identifier)?;
        if !self.config.routes.permits(&route_id) {
            return None;
        }
        let vehicle_id = raw.vehicle.as_ref().and_then(parse_identifier)?;

        let latitude = raw.latitude.as_ref().and_then(parse_decimal)?;
        let longitude = raw.longitude.as_ref().and_then(parse_decimal)?;
        if !valid_coordinates(latitude, longitude) {
            return None;
        }

        let timestamp = raw
            .server_time
            .as_ref()
            .and_then(parse_millis)
            .or_else(|| raw.device_time.as_ref().and_then(parse_millis))
            .filter(|&ts| ts >= 0)?;

        if let Some(hours) = self.config.service_hours {
            let local = self.config.timezone.timestamp_millis_opt(timestamp).single()?;
            if !hours.contains(local.hour()) {
                return None;
            }
        }

        let speed = raw.speed.as_ref().and_then(parse_number).unwrap_or(0.0);

        Some(PingRecord {
            vehicle_id,
            route_id,
            latitude,
            longitude,
            timestamp,
            speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-05-16 10:00:00 UTC
    const TEN_AM: i64 = 1_715_853_600_000;

    fn normalizer(service_hours: Option<ServiceHours>) -> RecordNormalizer {
        RecordNormalizer::new(NormalizerConfig {
            routes: RouteAllowList::new(["483", "864"]),
            service_hours,
            timezone: chrono_tz::UTC,
        })
    }

    fn parse(normalizer: &RecordNormalizer, json: &str) -> Vec<PingRecord> {
        normalizer.parse_reader(json.as_bytes()).unwrap()
    }

    #[test]
    fn normalizes_locale_coordinates_and_defaults_speed() {
        let json = format!(
            r#"[{{"ordem": "A1", "linha": "483", "latitude": "-22,9", "longitude": "-43.2",
                 "datahoraservidor": "{TEN_AM}", "velocidade": "n/a"}}]"#
        );
        let records = parse(&normalizer(None), &json);

        assert_eq!(
            records,
            vec![PingRecord {
                vehicle_id: "A1".into(),
                route_id: "483".into(),
                latitude: -22.9,
                longitude: -43.2,
                timestamp: TEN_AM,
                speed: 0.0,
            }]
        );
    }

    #[test]
    fn falls_back_to_secondary_timestamp() {
        let json = format!(
            r#"[{{"ordem": "A1", "linha": "483", "latitude": "1", "longitude": "2",
                 "datahoraservidor": null, "datahora": {TEN_AM}, "velocidade": 31}},
                {{"ordem": "A2", "linha": "483", "latitude": "1", "longitude": "2",
                 "datahoraservidor": "garbage", "datahora": "{TEN_AM}"}}]"#
        );
        let records = parse(&normalizer(None), &json);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.timestamp == TEN_AM));
        assert_eq!(records[0].speed, 31.0);
    }

    #[test]
    fn drops_malformed_and_foreign_rows() {
        let json = format!(
            r#"[{{"ordem": "A1", "linha": "483", "latitude": "x", "longitude": "2", "datahora": {TEN_AM}}},
                {{"ordem": "A1", "linha": "483", "latitude": "1", "longitude": "2"}},
                {{"ordem": "A1", "linha": "999", "latitude": "1", "longitude": "2", "datahora": {TEN_AM}}},
                {{"ordem": "A1", "linha": "483", "latitude": "95", "longitude": "2", "datahora": {TEN_AM}}},
                {{"linha": "483", "latitude": "1", "longitude": "2", "datahora": {TEN_AM}}},
                "not an object",
                {{"ordem": "A1", "linha": 864, "latitude": 1, "longitude": 2, "datahora": {TEN_AM}}}]"#
        );
        let records = parse(&normalizer(None), &json);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].route_id, "864");
    }

    #[test]
    fn service_hours_filter_uses_local_hour() {
        let seven_am = TEN_AM - 3 * 60 * 60 * 1000;
        let json = format!(
            r#"[{{"ordem": "A1", "linha": "483", "latitude": "1", "longitude": "2", "datahora": {TEN_AM}}},
                {{"ordem": "A1", "linha": "483", "latitude": "1", "longitude": "2", "datahora": {seven_am}}}]"#
        );

        assert_eq!(parse(&normalizer(Some(ServiceHours::default())), &json).len(), 1);
        assert_eq!(parse(&normalizer(None), &json).len(), 2);
    }

    #[test]
    fn rejects_non_array_documents() {
        assert!(normalizer(None).parse_reader(r#"{"rows": []}"#.as_bytes()).is_err());
    }
}
