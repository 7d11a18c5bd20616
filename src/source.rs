//! Spreadsheet input: positional row extraction and sheet inspection.
//!
//! `.csv` files go through the `csv` crate; everything else (`.xlsx`,
//! `.xlsm`, `.xls`, `.ods`) through `calamine`. In both cases the first row
//! is a header and is skipped.

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::config::ColumnMap;

/// A single cell, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Empty,
}

impl RawValue {
    fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }

    fn from_cell(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawValue::Empty,
            Data::Int(i) => RawValue::Number(*i as f64),
            Data::Float(f) => RawValue::Number(*f),
            Data::String(s) => RawValue::from_text(s),
            Data::DateTime(dt) => RawValue::Number(dt.as_f64()),
            Data::Error(_) => RawValue::Empty,
            other => RawValue::from_text(&other.to_string()),
        }
    }

    /// Renders the value the way it reads in the sheet; empty cells give `""`.
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Number(n) => format_number(*n),
            RawValue::Text(s) => s.clone(),
            RawValue::Empty => String::new(),
        }
    }
}

/// Integral floats print without a fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One spreadsheet row reduced to the three fields the normalizer reads.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub zip: RawValue,
    pub area_name: RawValue,
    pub rent: RawValue,
}

impl RawRecord {
    fn from_cells<F>(columns: &ColumnMap, cell: F) -> Self
    where
        F: Fn(usize) -> RawValue,
    {
        RawRecord {
            zip: cell(columns.zip),
            area_name: cell(columns.area_name),
            rent: cell(columns.rent),
        }
    }
}

/// Sheet names plus the header row of the last sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSummary {
    pub sheet_names: Vec<String>,
    pub inspected_sheet: String,
    pub headers: Vec<String>,
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("could not find input file '{}'", path.display()),
        )
        .into());
    }
    Ok(())
}

/// Returns true when `err` was caused by a missing input file.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
    })
}

/// Reads every data row of `path`, picking cells by position.
///
/// `sheet` is ignored for CSV input. Short rows yield [`RawValue::Empty`]
/// for the cells they lack.
#[tracing::instrument(skip(path, columns), fields(path = %path.display()))]
pub fn read_records(
    path: &Path,
    sheet: Option<&str>,
    columns: &ColumnMap,
) -> Result<Vec<RawRecord>> {
    ensure_exists(path)?;

    let records = if is_csv(path) {
        read_csv_records(path, columns)?
    } else {
        read_workbook_records(path, sheet, columns)?
    };

    info!(rows = records.len(), "Input rows loaded");
    Ok(records)
}

fn read_csv_records(path: &Path, columns: &ColumnMap) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result.with_context(|| format!("reading {}", path.display()))?;
        records.push(RawRecord::from_cells(columns, |i| {
            row.get(i).map(RawValue::from_text).unwrap_or(RawValue::Empty)
        }));
    }

    Ok(records)
}

fn read_workbook_records(
    path: &Path,
    sheet: Option<&str>,
    columns: &ColumnMap,
) -> Result<Vec<RawRecord>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening {}", path.display()))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .with_context(|| format!("{} contains no sheets", path.display()))?,
    };
    debug!(sheet = %sheet_name, "Reading sheet");

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("reading sheet '{}' of {}", sheet_name, path.display()))?;

    // The range begins at the first used cell, not necessarily column A.
    let first_col = range.start().map(|(_, c)| c as usize).unwrap_or(0);

    let records = range
        .rows()
        .skip(1)
        .map(|row| {
            RawRecord::from_cells(columns, |i| {
                i.checked_sub(first_col)
                    .and_then(|offset| row.get(offset))
                    .map(RawValue::from_cell)
                    .unwrap_or(RawValue::Empty)
            })
        })
        .collect();

    Ok(records)
}

/// Lists sheet names and returns the header row of the last sheet.
///
/// A CSV file is reported as a single sheet named after its file stem.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn inspect(path: &Path) -> Result<SheetSummary> {
    ensure_exists(path)?;

    if is_csv(path) {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("csv")
            .to_string();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let headers = rdr.headers()?.iter().map(str::to_string).collect();

        return Ok(SheetSummary {
            sheet_names: vec![name.clone()],
            inspected_sheet: name,
            headers,
        });
    }

    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening {}", path.display()))?;
    let sheet_names = workbook.sheet_names();
    let inspected_sheet = sheet_names
        .last()
        .cloned()
        .with_context(|| format!("{} contains no sheets", path.display()))?;

    let range = workbook
        .worksheet_range(&inspected_sheet)
        .with_context(|| format!("reading sheet '{}'", inspected_sheet))?;
    let headers = range
        .rows()
        .next()
        .map(|row| row.iter().map(|c| RawValue::from_cell(c).as_text()).collect())
        .unwrap_or_default();

    Ok(SheetSummary {
        sheet_names,
        inspected_sheet,
        headers,
    })
}
