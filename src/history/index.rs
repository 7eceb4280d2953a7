use crate::error::{Error, Result};
use crate::history::HourKey;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Hour bucket -> raw ping files, built once from the historical corpus and
/// read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct TimeIndex {
    files: BTreeMap<HourKey, BTreeSet<PathBuf>>,
    latest_day: Option<NaiveDate>,
}

impl TimeIndex {
    /// Scans `root/<YYYY-MM-DD>/<YYYY-MM-DD_HH>.json`. Folders and files whose
    /// names do not parse are skipped.
    pub fn build(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::MissingHistoricalRoot(root.to_path_buf()));
        }
        info!("Indexing historical files under {}", root.display());

        let mut index = TimeIndex::default();
        let mut file_count = 0;

        for day_entry in read_dir(root)? {
            let day_path = day_entry.path();
            if !day_path.is_dir() {
                continue;
            }
            let Some(day) = file_name(&day_path)
                .and_then(|name| NaiveDate::parse_from_str(name, "%Y-%m-%d").ok())
            else {
                debug!("Skipping folder {}", day_path.display());
                continue;
            };
            if index.latest_day.map_or(true, |latest| day > latest) {
                index.latest_day = Some(day);
            }

            for file_entry in read_dir(&day_path)? {
                let path = file_entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(key) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(HourKey::parse_stem)
                else {
                    debug!("Skipping file {}", path.display());
                    continue;
                };
                index.insert(key, path);
                file_count += 1;
            }
        }

        info!(
            "Indexed {} hours of data from {} files",
            index.len(),
            file_count
        );
        Ok(index)
    }

    pub fn insert(&mut self, key: HourKey, path: PathBuf) {
        self.files.entry(key).or_default().insert(path);
    }

    pub fn files_for(&self, key: &HourKey) -> Option<&BTreeSet<PathBuf>> {
        self.files.get(key)
    }

    /// Latest day folder seen, whether or not it held any valid file.
    pub fn latest_day(&self) -> Option<NaiveDate> {
        self.latest_day
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn read_dir(path: &Path) -> Result<Vec<fs::DirEntry>> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::read_dir(path)
        .map_err(io_err)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_err)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
