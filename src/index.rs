//! Flattens the per-state files into one zip-keyed index.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Compact record stored per zip. Field names are kept to one letter to
/// keep the index file small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Rent.
    pub r: i64,
    /// State slug, matching the state file name.
    pub s: String,
    /// City name.
    pub c: String,
}

/// Zip code -> record.
pub type MasterIndex = BTreeMap<String, IndexRecord>;

#[derive(Debug, Default)]
pub struct IndexReport {
    pub index: MasterIndex,
    pub files_read: usize,
    pub entries_skipped: usize,
}

const DATA_EXTENSION: &str = "json";

/// Lists `*.json` files in `geo_dir`, sorted by file name so later states
/// win zip collisions deterministically.
fn state_files(geo_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();

    for entry in
        fs::read_dir(geo_dir).with_context(|| format!("reading {}", geo_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        // `Path::is_file` follows symlinks; `DirEntry::file_type` does not.
        if !path.is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(DATA_EXTENSION)
        {
            continue;
        }

        if let Some(state) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((state.to_string(), path.clone()));
        }
    }

    files.sort();
    Ok(files)
}

/// Integer value of a JSON number or numeric string, truncated.
fn as_whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64),
        _ => None,
    }
}

/// Returns a compact record when the entry has a non-empty zip and a
/// non-zero rent.
///
/// Hand-edited files may carry the zip as a number or the rent as a
/// numeric string; both are accepted.
fn index_record(state: &str, entry: &Value) -> Option<(String, IndexRecord)> {
    let zip = match entry.get("zip")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) if n.as_f64() != Some(0.0) => n
            .as_i64()
            .map(|i| i.to_string())
            .unwrap_or_else(|| n.to_string()),
        _ => return None,
    };
    let rent = as_whole_number(entry.get("rent")?).filter(|r| *r != 0)?;
    let city = entry.get("city").and_then(Value::as_str).unwrap_or_default();

    Some((
        zip,
        IndexRecord {
            r: rent,
            s: state.to_string(),
            c: city.to_string(),
        },
    ))
}

/// Adds every usable entry of one state file to `report`.
fn merge_state(report: &mut IndexReport, state: &str, data: Map<String, Value>) {
    for (slug, entry) in data {
        match index_record(state, &entry) {
            Some((zip, record)) => {
                if let Some(previous) = report.index.insert(zip, record) {
                    trace!(slug = %slug, replaced_state = %previous.s, "Zip already indexed");
                }
            }
            None => {
                trace!(state, slug = %slug, "Entry missing zip or rent");
                report.entries_skipped += 1;
            }
        }
    }
}

/// Reads every state file under `geo_dir` and builds the master index.
///
/// # Errors
///
/// Fails if the directory cannot be listed, or if any file is unreadable
/// or not a JSON object.
#[tracing::instrument(skip(geo_dir), fields(geo_dir = %geo_dir.display()))]
pub fn build_index(geo_dir: &Path) -> Result<IndexReport> {
    let mut report = IndexReport::default();

    for (state, path) in state_files(geo_dir)? {
        let content =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let data: Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        let Value::Object(data) = data else {
            bail!("{} is not a JSON object", path.display());
        };

        debug!(state = %state, entries = data.len(), "Indexing state file");
        merge_state(&mut report, &state, data);
        report.files_read += 1;
    }

    info!(
        files = report.files_read,
        zips = report.index.len(),
        skipped = report.entries_skipped,
        "Index built"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_index_record_extracts_fields() {
        let entry = json!({"city": "Abilene", "rent": 1500, "zip": "79601"});
        let (zip, record) = index_record("texas", &entry).unwrap();

        assert_eq!(zip, "79601");
        assert_eq!(
            record,
            IndexRecord {
                r: 1500,
                s: "texas".into(),
                c: "Abilene".into()
            }
        );
    }

    #[test]
    fn test_index_record_skips_incomplete() {
        assert!(index_record("texas", &json!({"city": "A", "rent": 1500})).is_none());
        assert!(index_record("texas", &json!({"city": "A", "zip": "79601"})).is_none());
        assert!(index_record("texas", &json!({"rent": 1500, "zip": ""})).is_none());
        assert!(index_record("texas", &json!({"rent": 0, "zip": "79601"})).is_none());
        assert!(index_record("texas", &json!({"rent": null, "zip": "79601"})).is_none());
        assert!(index_record("texas", &json!("not an object")).is_none());
    }

    #[test]
    fn test_index_record_accepts_numeric_zip_and_string_rent() {
        let (zip, record) =
            index_record("texas", &json!({"city": "A", "rent": "1500", "zip": "79601"})).unwrap();
        assert_eq!(zip, "79601");
        assert_eq!(record.r, 1500);

        let (zip, record) =
            index_record("texas", &json!({"city": "B", "rent": 1200, "zip": 79602})).unwrap();
        assert_eq!(zip, "79602");
        assert_eq!(record.r, 1200);

        assert!(index_record("texas", &json!({"rent": "n/a", "zip": "79601"})).is_none());
        assert!(index_record("texas", &json!({"rent": "0", "zip": "79601"})).is_none());
        assert!(index_record("texas", &json!({"rent": 900, "zip": 0})).is_none());
    }

    #[test]
    fn test_build_index_mixed_field_types() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("texas.json"),
            r#"{"a":{"city":"A","rent":"1500","zip":"79601"},"b":{"city":"B","rent":1200,"zip":79602},"c":{"city":"C"}}"#,
        )
        .unwrap();

        let report = build_index(tmp.path()).unwrap();

        assert_eq!(report.entries_skipped, 1);
        assert_eq!(report.index.len(), 2);
        assert_eq!(report.index["79602"].c, "B");
    }

    #[cfg(unix)]
    #[test]
    fn test_build_index_follows_symlinks() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.data");
        fs::write(
            &source,
            r#"{"abilene-79601":{"city":"Abilene","rent":1500,"zip":"79601"}}"#,
        )
        .unwrap();
        let geo = tmp.path().join("geo");
        fs::create_dir_all(&geo).unwrap();
        std::os::unix::fs::symlink(&source, geo.join("texas.json")).unwrap();

        let report = build_index(&geo).unwrap();

        assert_eq!(report.files_read, 1);
        assert_eq!(report.index["79601"].s, "texas");
    }

    #[test]
    fn test_index_record_missing_city_is_empty() {
        let (_, record) = index_record("ohio", &json!({"rent": 900, "zip": "43004"})).unwrap();
        assert_eq!(record.c, "");
    }

    #[test]
    fn test_build_index_ignores_other_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("texas.json"),
            r#"{"abilene-79601":{"city":"Abilene","rent":1500,"zip":"79601"}}"#,
        )
        .unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();

        let report = build_index(tmp.path()).unwrap();

        assert_eq!(report.files_read, 1);
        assert_eq!(report.index.len(), 1);
        assert_eq!(report.index["79601"].s, "texas");
    }

    #[test]
    fn test_build_index_rejects_non_object_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("texas.json"), "[1, 2, 3]").unwrap();

        assert!(build_index(tmp.path()).is_err());
    }

    #[test]
    fn test_build_index_missing_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(build_index(&tmp.path().join("absent")).is_err());
    }
}
