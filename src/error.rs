use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("historical data folder {0} does not exist or is not a directory")]
    MissingHistoricalRoot(PathBuf),

    #[error("no day folder named YYYY-MM-DD was found under {0}")]
    EmptyHistory(PathBuf),

    #[error(
        "historical data only reaches {latest} but test days start on {earliest}; \
         add historical files covering the test dates"
    )]
    NoHistoricalOverlap {
        latest: NaiveDate,
        earliest: NaiveDate,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
