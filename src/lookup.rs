//! Read-side access to the generated geo data.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::index::{IndexRecord, MasterIndex};
use crate::normalize::{StateDataset, ZipEntry};
use crate::states::is_state_slug;

/// Strips everything outside `[a-z0-9-]` so a caller-supplied name can't
/// escape the geo directory.
pub fn sanitize_slug(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

pub struct GeoStore {
    geo_dir: PathBuf,
    index_file: PathBuf,
}

impl GeoStore {
    pub fn new(geo_dir: impl Into<PathBuf>, index_file: impl Into<PathBuf>) -> Self {
        Self {
            geo_dir: geo_dir.into(),
            index_file: index_file.into(),
        }
    }

    /// Loads one state's dataset, or `None` for an unknown state or one
    /// with no file.
    pub fn state_data(&self, state: &str) -> Result<Option<StateDataset>> {
        let safe = sanitize_slug(state);
        if !is_state_slug(&safe) {
            return Ok(None);
        }

        let path = self.geo_dir.join(format!("{safe}.json"));
        debug!(path = %path.display(), "Loading state file");

        read_optional(&path)?
            .map(|content| {
                serde_json::from_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))
            })
            .transpose()
    }

    /// State entries as `(slug, entry)` sorted by city name, then slug.
    pub fn state_listing(&self, state: &str) -> Result<Option<Vec<(String, ZipEntry)>>> {
        Ok(self.state_data(state)?.map(|data| {
            let mut cities: Vec<_> = data.into_iter().collect();
            cities.sort_by(|(a_slug, a), (b_slug, b)| {
                a.city.cmp(&b.city).then_with(|| a_slug.cmp(b_slug))
            });
            cities
        }))
    }

    pub fn city_data(&self, state: &str, city_slug: &str) -> Result<Option<ZipEntry>> {
        Ok(self
            .state_data(state)?
            .and_then(|mut data| data.remove(city_slug)))
    }

    /// Looks a zip up in the master index.
    pub fn zip_lookup(&self, zip: &str) -> Result<Option<IndexRecord>> {
        let Some(content) = read_optional(&self.index_file)? else {
            return Ok(None);
        };
        let mut index: MasterIndex = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.index_file.display()))?;

        Ok(index.remove(zip))
    }
}
