//! The two batch jobs: spreadsheet -> state files, state files -> index.

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::index::build_index;
use crate::normalize::{NormalizeStats, Normalizer};
use crate::output::{WrittenFile, write_index, write_state_files};
use crate::source::read_records;

#[derive(Debug)]
pub struct NormalizeSummary {
    pub stats: NormalizeStats,
    pub files: Vec<WrittenFile>,
}

#[derive(Debug)]
pub struct IndexSummary {
    pub files_read: usize,
    pub zips: usize,
    pub entries_skipped: usize,
}

/// Reads the input spreadsheet and writes one JSON file per state.
///
/// A missing input file fails before anything is created on disk.
#[tracing::instrument(skip_all, fields(input = %config.input_file.display()))]
pub fn run_normalize(config: &Config) -> Result<NormalizeSummary> {
    let records = read_records(
        &config.input_file,
        config.sheet.as_deref(),
        &config.columns,
    )?;
    info!(locations = records.len(), "Processing locations");

    let mut normalizer = Normalizer::new();
    normalizer.extend(&records);
    let (states, stats) = normalizer.finish();

    info!(
        rows = stats.rows_read,
        kept = stats.rows_kept,
        missing_rent = stats.skipped_missing_rent,
        unparsed_area = stats.skipped_unparsed_area,
        unknown_state = stats.skipped_unknown_state,
        overwritten = stats.overwritten,
        "Rows normalized"
    );

    let files = write_state_files(&config.geo_dir, &states)?;
    info!(
        states = files.len(),
        geo_dir = %config.geo_dir.display(),
        "State files written"
    );

    Ok(NormalizeSummary { stats, files })
}

/// Builds the zip index from the state files and writes it.
#[tracing::instrument(skip_all, fields(geo_dir = %config.geo_dir.display()))]
pub fn run_index(config: &Config) -> Result<IndexSummary> {
    let report = build_index(&config.geo_dir)?;
    write_index(&config.index_file, &report.index)?;

    info!(
        zips = report.index.len(),
        path = %config.index_file.display(),
        "Index saved"
    );

    Ok(IndexSummary {
        files_read: report.files_read,
        zips: report.index.len(),
        entries_skipped: report.entries_skipped,
    })
}
