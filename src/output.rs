use crate::error::{Error, Result};
use crate::query::QueryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// One answer row. On the wire this is a bare array: `[id, lat, lon]` for a
/// position, `[id, timestamp_ms]` for an arrival time. Ground truth uses the
/// same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Location(QueryId, f64, f64),
    Time(QueryId, i64),
}

impl Prediction {
    /// Coordinates are rounded to 5 decimal places (about a meter).
    pub fn location(id: QueryId, latitude: f64, longitude: f64) -> Self {
        Prediction::Location(id, round5(latitude), round5(longitude))
    }

    pub fn time(id: QueryId, timestamp: i64) -> Self {
        Prediction::Time(id, timestamp)
    }

    pub fn id(&self) -> &QueryId {
        match self {
            Prediction::Location(id, _, _) | Prediction::Time(id, _) => id,
        }
    }
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Keeps the rows that parse and drops the rest.
pub fn lenient_predictions<'de, D>(deserializer: D) -> std::result::Result<Vec<Prediction>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows: Vec<Value> = Deserialize::deserialize(deserializer)?;
    let total = rows.len();
    let predictions: Vec<Prediction> = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect();
    if predictions.len() < total {
        debug!("Dropped {} unreadable answer rows", total - predictions.len());
    }
    Ok(predictions)
}

/// The submitted document: who answered, when, and the answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerSheet {
    #[serde(rename = "aluno", default)]
    pub student: String,
    #[serde(rename = "datahora", default)]
    pub generated_at: String,
    #[serde(rename = "previsoes", default, deserialize_with = "lenient_predictions")]
    pub predictions: Vec<Prediction>,
    #[serde(rename = "senha", default)]
    pub password: String,
}

impl AnswerSheet {
    pub fn new(
        student: String,
        password: String,
        predictions: Vec<Prediction>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student,
            generated_at: generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            predictions,
            password,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_err)
    }
}
