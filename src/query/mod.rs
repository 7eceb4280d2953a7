use crate::error::{Error, Result};
use crate::history::fields::{parse_decimal, parse_identifier, parse_millis, valid_coordinates};
use crate::history::HourKey;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Query files are named `treino-YYYY-MM-DD_HH.json`.
pub const QUERY_FILE_PREFIX: &str = "treino-";

/// Opaque query identifier, echoed back verbatim in the output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryId {
    Number(i64),
    Text(String),
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryId::Number(n) => write!(f, "{}", n),
            QueryId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryTarget {
    /// Where is the bus at this time (epoch ms)?
    Time(i64),
    /// When does the bus reach this point?
    Location { latitude: f64, longitude: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub id: QueryId,
    pub vehicle_id: String,
    pub route_id: String,
    /// End of the lookback window, epoch ms.
    pub reference_time: i64,
    pub target: QueryTarget,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueryError {
    #[error("query is not an object with a numeric or string id")]
    Unreadable,
    #[error("query has no id")]
    MissingId,
    #[error("query {0}: missing or invalid {1}")]
    InvalidField(String, &'static str),
    #[error("query {0}: has both a target time and a target location")]
    AmbiguousTarget(String),
    #[error("query {0}: has neither a target time nor a target location")]
    MissingTarget(String),
    #[error("query {0}: latitude and longitude must be given together")]
    PartialLocation(String),
    #[error("query {0}: no reference time and none can be derived from the file name")]
    UnresolvedReferenceTime(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawQuery {
    id: Option<QueryId>,
    #[serde(rename = "ordem", alias = "vehicle_id")]
    vehicle: Option<Value>,
    #[serde(rename = "linha", alias = "route_id")]
    route: Option<Value>,
    reference_time: Option<Value>,
    #[serde(rename = "datahora", alias = "target_time")]
    target_time: Option<Value>,
    latitude: Option<Value>,
    longitude: Option<Value>,
}

fn present(value: &Option<Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

impl Query {
    /// Validates one raw query object. The reference time comes from, in
    /// order: the `reference_time` field, the target time of a time-targeted
    /// query, then `fallback_reference` (the hour in the query file's name).
    pub fn from_value(
        value: Value,
        fallback_reference: Option<i64>,
    ) -> std::result::Result<Self, QueryError> {
        let raw: RawQuery = serde_json::from_value(value).map_err(|_| QueryError::Unreadable)?;
        let id = raw.id.ok_or(QueryError::MissingId)?;
        let label = id.to_string();

        let vehicle_id = raw
            .vehicle
            .as_ref()
            .and_then(parse_identifier)
            .ok_or_else(|| QueryError::InvalidField(label.clone(), "vehicle id"))?;
        let route_id = raw
            .route
            .as_ref()
            .and_then(parse_identifier)
            .ok_or_else(|| QueryError::InvalidField(label.clone(), "route id"))?;

        let has_time = present(&raw.target_time);
        let target = match (has_time, present(&raw.latitude), present(&raw.longitude)) {
            (true, false, false) => {
                let millis = raw
                    .target_time
                    .as_ref()
                    .and_then(parse_millis)
                    .filter(|&t| t >= 0)
                    .ok_or_else(|| QueryError::InvalidField(label.clone(), "target time"))?;
                QueryTarget::Time(millis)
            }
            (false, true, true) => {
                let latitude = raw.latitude.as_ref().and_then(parse_decimal);
                let longitude = raw.longitude.as_ref().and_then(parse_decimal);
                match (latitude, longitude) {
                    (Some(latitude), Some(longitude)) if valid_coordinates(latitude, longitude) => {
                        QueryTarget::Location {
                            latitude,
                            longitude,
                        }
                    }
                    _ => return Err(QueryError::InvalidField(label, "target location")),
                }
            }
            (true, _, _) => return Err(QueryError::AmbiguousTarget(label)),
            (false, false, false) => return Err(QueryError::MissingTarget(label)),
            (false, _, _) => return Err(QueryError::PartialLocation(label)),
        };

        let explicit = if present(&raw.reference_time) {
            let millis = raw
                .reference_time
                .as_ref()
                .and_then(parse_millis)
                .filter(|&t| t >= 0)
                .ok_or_else(|| QueryError::InvalidField(label.clone(), "reference time"))?;
            Some(millis)
        } else {
            None
        };
        let reference_time = explicit
            .or(match target {
                QueryTarget::Time(t) => Some(t),
                QueryTarget::Location { .. } => None,
            })
            .or(fallback_reference)
            .ok_or(QueryError::UnresolvedReferenceTime(label))?;

        Ok(Query {
            id,
            vehicle_id,
            route_id,
            reference_time,
            target,
        })
    }
}

/// Start of the hour encoded in a query file name such as
/// `treino-2024-05-16_08.json`.
pub fn reference_from_file_name(path: &Path, tz: Tz) -> Option<i64> {
    let stem = path.file_stem()?.to_str()?;
    let stem = stem.strip_prefix(QUERY_FILE_PREFIX).unwrap_or(stem);
    HourKey::parse_stem(stem)?.start_millis(tz)
}

#[derive(Debug, Default)]
pub struct QueryBatch {
    pub queries: Vec<Query>,
    pub rejected: usize,
}

pub fn parse_queries<R: Read>(
    reader: R,
    fallback_reference: Option<i64>,
) -> std::result::Result<QueryBatch, serde_json::Error> {
    let rows: Vec<Value> = serde_json::from_reader(reader)?;
    let mut batch = QueryBatch::default();

    for row in rows {
        match Query::from_value(row, fallback_reference) {
            Ok(query) => batch.queries.push(query),
            Err(e) => {
                debug!("Rejected query: {}", e);
                batch.rejected += 1;
            }
        }
    }
    Ok(batch)
}

pub fn load_query_file(path: &Path, tz: Tz) -> Result<QueryBatch> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let fallback = reference_from_file_name(path, tz);
    if fallback.is_none() {
        warn!(
            "Cannot derive an hour from {}; queries without a reference time will be rejected",
            path.display()
        );
    }
    parse_queries(BufReader::new(file), fallback).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn time_query_uses_its_target_as_reference() {
        let query = Query::from_value(
            json!({"id": 7, "ordem": "B1", "linha": "483", "datahora": 1_715_853_600_000_i64}),
            Some(1),
        )
        .unwrap();

        assert_eq!(query.id, QueryId::Number(7));
        assert_eq!(query.target, QueryTarget::Time(1_715_853_600_000));
        assert_eq!(query.reference_time, 1_715_853_600_000);
    }

    #[test]
    fn location_query_falls_back_to_file_hour() {
        let query = Query::from_value(
            json!({"id": "q1", "ordem": "B1", "linha": 483, "latitude": "-22,9", "longitude": "-43,2"}),
            Some(42),
        )
        .unwrap();

        assert_eq!(query.route_id, "483");
        assert_eq!(
            query.target,
            QueryTarget::Location {
                latitude: -22.9,
                longitude: -43.2
            }
        );
        assert_eq!(query.reference_time, 42);
    }

    #[test]
    fn explicit_reference_wins() {
        let query = Query::from_value(
            json!({"id": 1, "ordem": "B1", "linha": "483", "reference_time": 5, "datahora": 10}),
            Some(42),
        )
        .unwrap();
        assert_eq!(query.reference_time, 5);
    }

    #[test]
    fn rejects_malformed_targets() {
        let both = json!({"id": 1, "ordem": "B1", "linha": "483", "datahora": 10, "latitude": 1, "longitude": 2});
        let neither = json!({"id": 2, "ordem": "B1", "linha": "483"});
        let partial = json!({"id": 3, "ordem": "B1", "linha": "483", "latitude": 1});
        let nulls = json!({"id": 4, "ordem": "B1", "linha": "483", "datahora": null, "latitude": null});

        assert_eq!(
            Query::from_value(both, Some(0)),
            Err(QueryError::AmbiguousTarget("1".into()))
        );
        assert_eq!(
            Query::from_value(neither, Some(0)),
            Err(QueryError::MissingTarget("2".into()))
        );
        assert_eq!(
            Query::from_value(partial, Some(0)),
            Err(QueryError::PartialLocation("3".into()))
        );
        assert_eq!(
            Query::from_value(nulls, Some(0)),
            Err(QueryError::MissingTarget("4".into()))
        );
    }

    #[test]
    fn negative_reference_is_rejected() {
        let query = json!({
            "id": 8, "ordem": "B1", "linha": "483",
            "reference_time": "-1e300", "datahora": 10
        });
        assert_eq!(
            Query::from_value(query, Some(0)),
            Err(QueryError::InvalidField("8".into(), "reference time"))
        );
    }

    #[test]
    fn unresolvable_reference_is_rejected() {
        let query = json!({"id": 9, "ordem": "B1", "linha": "483", "latitude": 1, "longitude": 2});
        assert_eq!(
            Query::from_value(query, None),
            Err(QueryError::UnresolvedReferenceTime("9".into()))
        );
    }

    #[test]
    fn reference_hour_from_file_name() {
        let path = PathBuf::from("test/2024-05-16/treino-2024-05-16_10.json");
        assert_eq!(
            reference_from_file_name(&path, chrono_tz::UTC),
            Some(1_715_853_600_000)
        );
        assert_eq!(
            reference_from_file_name(Path::new("treino-latest.json"), chrono_tz::UTC),
            None
        );
    }

    #[test]
    fn batch_counts_rejections() {
        let json = r#"[
            {"id": 1, "ordem": "B1", "linha": "483", "datahora": 10},
            {"id": 2, "ordem": "B1", "linha": "483"},
            {"ordem": "B1", "linha": "483", "datahora": 10},
            {"id": 3, "linha": "483", "datahora": 10}
        ]"#;
        let batch = parse_queries(json.as_bytes(), None).unwrap();

        assert_eq!(batch.queries.len(), 1);
        assert_eq!(batch.rejected, 3);
    }
}
