//! Persistence for state datasets and the master index.
//!
//! Everything is written as compact JSON and fully overwritten on each run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::index::MasterIndex;
use crate::normalize::StateDataset;

/// One state file produced by [`write_state_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub state: String,
    pub path: PathBuf,
    pub entries: usize,
}

/// Serializes `value` as compact JSON to `path`, replacing any existing file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, value)
        .with_context(|| format!("writing {}", path.display()))?;
    writer.flush()?;

    Ok(())
}

/// Writes `<dir>/<state>.json` for every non-empty dataset.
///
/// Creates `dir` (recursively) first. States with no entries get no file.
pub fn write_state_files(
    dir: &Path,
    states: &BTreeMap<&'static str, StateDataset>,
) -> Result<Vec<WrittenFile>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::new();
    for (state, data) in states {
        if data.is_empty() {
            continue;
        }

        let path = dir.join(format!("{state}.json"));
        write_json(&path, data)?;
        info!(state = *state, zips = data.len(), "Saved state file");

        written.push(WrittenFile {
            state: state.to_string(),
            path,
            entries: data.len(),
        });
    }

    Ok(written)
}

/// Writes the master index, creating parent directories as needed.
pub fn write_index(path: &Path, index: &MasterIndex) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    debug!(path = %path.display(), records = index.len(), "Writing index");
    write_json(path, index)
}
