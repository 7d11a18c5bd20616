//! Run configuration shared by the normalize and index jobs.
//!
//! Built once at startup from defaults, then environment overrides, then
//! CLI flags, and passed by reference into each job.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

pub const DEFAULT_INPUT_FILE: &str = "hud_2025.xlsx";
pub const DEFAULT_GEO_DIR: &str = "public/data/geo";
pub const DEFAULT_INDEX_FILE: &str = "public/data/zip_index.json";

/// Zero-based column positions read from the input sheet.
///
/// Header labels in the source file are inconsistent between releases, so
/// fields are always selected by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub zip: usize,
    pub area_name: usize,
    pub rent: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            zip: 0,
            area_name: 2,
            rent: 9,
        }
    }
}

impl ColumnMap {
    /// Parses a `"zip,area,rent"` triple of zero-based positions.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            bail!("expected three comma-separated column positions, got {raw:?}");
        }

        let mut positions = [0usize; 3];
        for (slot, part) in positions.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .with_context(|| format!("invalid column position {part:?} in {raw:?}"))?;
        }

        Ok(Self {
            zip: positions[0],
            area_name: positions[1],
            rent: positions[2],
        })
    }

    /// Highest position referenced; rows must be at least this wide + 1.
    pub fn max_position(&self) -> usize {
        self.zip.max(self.area_name).max(self.rent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input_file: PathBuf,
    /// Sheet to read; `None` selects the first sheet.
    pub sheet: Option<String>,
    pub geo_dir: PathBuf,
    pub index_file: PathBuf,
    pub columns: ColumnMap,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from(DEFAULT_INPUT_FILE),
            sheet: None,
            geo_dir: PathBuf::from(DEFAULT_GEO_DIR),
            index_file: PathBuf::from(DEFAULT_INDEX_FILE),
            columns: ColumnMap::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `RENT_GEO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("RENT_GEO_INPUT") {
            config.input_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("RENT_GEO_SHEET") {
            if !v.is_empty() {
                config.sheet = Some(v);
            }
        }
        if let Some(v) = lookup("RENT_GEO_GEO_DIR") {
            config.geo_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RENT_GEO_INDEX_FILE") {
            config.index_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("RENT_GEO_COLUMNS") {
            config.columns = ColumnMap::parse(&v).context("RENT_GEO_COLUMNS")?;
        }

        Ok(config)
    }
}
