use crate::error::{Error, Result};
use crate::output::{lenient_predictions, Prediction};
use crate::query::QueryId;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const TRUTH_DAY_PREFIX: &str = "final-";
pub const TRUTH_FILE_PREFIX: &str = "resposta-";

#[derive(Debug, Default, Deserialize)]
struct TruthFile {
    #[serde(rename = "previsoes", default, deserialize_with = "lenient_predictions")]
    answers: Vec<Prediction>,
}

/// Reads every `final-*/resposta-*.json` under `root` into one id -> answer
/// map. Unreadable files are skipped; a later file wins on duplicate ids.
pub fn load_ground_truth(root: &Path) -> Result<HashMap<QueryId, Prediction>> {
    let mut day_folders: Vec<_> = list_dir(root)?
        .into_iter()
        .filter(|path| path.is_dir() && has_prefix(path, TRUTH_DAY_PREFIX))
        .collect();
    day_folders.sort();

    let mut truth = HashMap::new();
    for folder in day_folders {
        let mut files: Vec<_> = list_dir(&folder)?
            .into_iter()
            .filter(|path| {
                has_prefix(path, TRUTH_FILE_PREFIX)
                    && path.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        files.sort();

        for path in files {
            match read_truth_file(&path) {
                Ok(answers) => {
                    for answer in answers {
                        truth.insert(answer.id().clone(), answer);
                    }
                }
                Err(e) => warn!("Skipping ground truth file: {}", e),
            }
        }
    }

    info!("Loaded {} ground truth answers", truth.len());
    Ok(truth)
}

fn read_truth_file(path: &Path) -> Result<Vec<Prediction>> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: TruthFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parsed.answers)
}

fn list_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect())
}

fn has_prefix(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, body: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn loads_answers_by_arity() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "final-2024-05-16/resposta-2024-05-16_10.json",
            r#"{"previsoes": [[1, -22.9, -43.2], [2, 1715853600000], [3]]}"#,
        );
        write(
            dir.path(),
            "final-2024-05-17/resposta-2024-05-17_10.json",
            r#"{"previsoes": [["x", 5]]}"#,
        );

        let truth = load_ground_truth(dir.path()).unwrap();

        assert_eq!(truth.len(), 3);
        assert_eq!(
            truth.get(&QueryId::Number(1)),
            Some(&Prediction::Location(QueryId::Number(1), -22.9, -43.2))
        );
        assert_eq!(
            truth.get(&QueryId::Number(2)),
            Some(&Prediction::Time(QueryId::Number(2), 1_715_853_600_000))
        );
        assert!(truth.contains_key(&QueryId::Text("x".into())));
    }

    #[test]
    fn ignores_foreign_folders_files_and_broken_json() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "2024-05-16/resposta-a.json", r#"{"previsoes": [[1, 5]]}"#);
        write(dir.path(), "final-2024-05-16/notes.json", r#"{"previsoes": [[2, 5]]}"#);
        write(dir.path(), "final-2024-05-16/resposta-b.json", "{ broken");
        write(dir.path(), "final-2024-05-16/resposta-c.json", r#"{"previsoes": [[3, 5]]}"#);

        let truth = load_ground_truth(dir.path()).unwrap();

        assert_eq!(truth.keys().collect::<Vec<_>>(), vec![&QueryId::Number(3)]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_ground_truth(&dir.path().join("final")).is_err());
    }
}
