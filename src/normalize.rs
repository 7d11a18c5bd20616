//! Row normalization: zip cleanup, rent filtering, area-name parsing and
//! per-state grouping.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::trace;

use crate::source::{RawRecord, RawValue, format_number};
use crate::states::state_slug;

/// Comma, one whitespace character, then a two-letter upper-case code.
static STATE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r",\s([A-Z]{2})").ok());

/// A cleaned rent record as persisted in a state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipEntry {
    pub city: String,
    pub rent: i64,
    pub zip: String,
}

/// Slug -> entry for a single state.
pub type StateDataset = BTreeMap<String, ZipEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaName {
    pub state_abbrev: String,
    pub city: String,
}

/// Why a row was left out of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingRent,
    UnparsedArea,
    UnknownState,
}

/// A row that survived every filter, ready to be grouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub state_slug: &'static str,
    pub slug: String,
    pub entry: ZipEntry,
}

/// Stringifies a zip cell, drops a trailing `.0` and left-pads to 5 with `0`.
///
/// Values already 5 characters or longer are returned unpadded.
pub fn normalize_zip(value: &RawValue) -> String {
    let raw = match value {
        RawValue::Number(n) => format_number(*n),
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Empty => String::new(),
    };
    let raw = raw.strip_suffix(".0").unwrap_or(&raw);
    format!("{raw:0>5}")
}

/// Numeric rent truncated toward zero; `None` when missing, zero or not a number.
pub fn parse_rent(value: &RawValue) -> Option<i64> {
    let n = match value {
        RawValue::Number(n) => *n,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        RawValue::Empty => return None,
    };

    if !n.is_finite() || n == 0.0 {
        return None;
    }
    Some(n.trunc() as i64)
}

/// Parses `"Abilene, TX MSA"` into `TX` / `Abilene`.
///
/// The city is everything before the first comma, trimmed. Trailing
/// "MSA"/"HUD Metro FMR Area" text after the state code is not part of it.
pub fn parse_area(raw: &str) -> Option<AreaName> {
    let caps = STATE_PATTERN.as_ref()?.captures(raw)?;
    let state_abbrev = caps.get(1)?.as_str().to_string();
    let city = raw.split(',').next().unwrap_or_default().trim().to_string();

    Some(AreaName { state_abbrev, city })
}

/// `lowercase(city with spaces as hyphens)-zip`.
pub fn make_slug(city: &str, zip: &str) -> String {
    format!("{}-{}", city.to_lowercase().replace(' ', "-"), zip)
}

/// Applies the full row pipeline, reporting the first filter that failed.
pub fn normalize_record(record: &RawRecord) -> Result<NormalizedRow, SkipReason> {
    let rent = parse_rent(&record.rent).ok_or(SkipReason::MissingRent)?;
    let zip = normalize_zip(&record.zip);

    let area = parse_area(&record.area_name.as_text()).ok_or(SkipReason::UnparsedArea)?;
    let state_slug = state_slug(&area.state_abbrev).ok_or(SkipReason::UnknownState)?;

    let slug = make_slug(&area.city, &zip);

    Ok(NormalizedRow {
        state_slug,
        slug,
        entry: ZipEntry {
            city: area.city,
            rent,
            zip,
        },
    })
}

/// Row counts for one normalize pass. Output files are unaffected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub skipped_missing_rent: usize,
    pub skipped_unparsed_area: usize,
    pub skipped_unknown_state: usize,
    /// Kept rows that replaced an earlier row with the same slug.
    pub overwritten: usize,
}

impl NormalizeStats {
    pub fn skipped(&self) -> usize {
        self.skipped_missing_rent + self.skipped_unparsed_area + self.skipped_unknown_state
    }

    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingRent => self.skipped_missing_rent += 1,
            SkipReason::UnparsedArea => self.skipped_unparsed_area += 1,
            SkipReason::UnknownState => self.skipped_unknown_state += 1,
        }
    }
}

/// Accumulates normalized rows grouped by state slug.
#[derive(Debug, Default)]
pub struct Normalizer {
    states: BTreeMap<&'static str, StateDataset>,
    stats: NormalizeStats,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes one row and stores it; a repeated slug replaces the
    /// earlier entry.
    pub fn push(&mut self, record: &RawRecord) {
        self.stats.rows_read += 1;

        match normalize_record(record) {
            Ok(row) => {
                self.stats.rows_kept += 1;
                let previous = self
                    .states
                    .entry(row.state_slug)
                    .or_default()
                    .insert(row.slug, row.entry);
                if previous.is_some() {
                    self.stats.overwritten += 1;
                }
            }
            Err(reason) => {
                trace!(?reason, area = %record.area_name.as_text(), "Row skipped");
                self.stats.record_skip(reason);
            }
        }
    }

    pub fn extend<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        for record in records {
            self.push(record);
        }
    }

    pub fn stats(&self) -> &NormalizeStats {
        &self.stats
    }

    pub fn states(&self) -> &BTreeMap<&'static str, StateDataset> {
        &self.states
    }

    pub fn finish(self) -> (BTreeMap<&'static str, StateDataset>, NormalizeStats) {
        (self.states, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    fn record(zip: RawValue, area: &str, rent: RawValue) -> RawRecord {
        RawRecord {
            zip,
            area_name: text(area),
            rent,
        }
    }

    #[test]
    fn test_zip_padding() {
        assert_eq!(normalize_zip(&RawValue::Number(501.0)), "00501");
        assert_eq!(normalize_zip(&text("501")), "00501");
        assert_eq!(normalize_zip(&text("79601")), "79601");
    }

    #[test]
    fn test_zip_float_artifact() {
        assert_eq!(normalize_zip(&text("12345.0")), "12345");
        assert_eq!(normalize_zip(&text("501.0")), "00501");
        assert_eq!(normalize_zip(&RawValue::Number(12345.0)), "12345");
    }

    #[test]
    fn test_zip_longer_than_five_is_unchanged() {
        assert_eq!(normalize_zip(&text("123456")), "123456");
    }

    #[test]
    fn test_parse_rent() {
        assert_eq!(parse_rent(&RawValue::Number(1500.0)), Some(1500));
        assert_eq!(parse_rent(&RawValue::Number(1500.9)), Some(1500));
        assert_eq!(parse_rent(&text(" 1234 ")), Some(1234));
        assert_eq!(parse_rent(&RawValue::Number(0.0)), None);
        assert_eq!(parse_rent(&text("0")), None);
        assert_eq!(parse_rent(&text("n/a")), None);
        assert_eq!(parse_rent(&RawValue::Number(f64::NAN)), None);
        assert_eq!(parse_rent(&RawValue::Empty), None);
    }

    #[test]
    fn test_parse_area() {
        let area = parse_area("Abilene, TX MSA").unwrap();
        assert_eq!(area.state_abbrev, "TX");
        assert_eq!(area.city, "Abilene");
        assert_eq!(state_slug(&area.state_abbrev), Some("texas"));
    }

    #[test]
    fn test_parse_area_keeps_only_comma_prefix() {
        let area = parse_area("  Kansas City , MO-KS HUD Metro FMR Area").unwrap();
        assert_eq!(area.state_abbrev, "MO");
        assert_eq!(area.city, "Kansas City");
    }

    #[test]
    fn test_parse_area_rejects_unmatched() {
        assert_eq!(parse_area("Unknown Area"), None);
        assert_eq!(parse_area("Somewhere, tx MSA"), None);
        assert_eq!(parse_area("Somewhere,TX"), None);
    }

    #[test]
    fn test_make_slug() {
        assert_eq!(make_slug("San Antonio", "78201"), "san-antonio-78201");
        assert_eq!(make_slug("Abilene", "79601"), "abilene-79601");
    }

    #[test]
    fn test_normalize_record_success() {
        let row = normalize_record(&record(
            RawValue::Number(79601.0),
            "Abilene, TX MSA",
            RawValue::Number(1500.0),
        ))
        .unwrap();

        assert_eq!(row.state_slug, "texas");
        assert_eq!(row.slug, "abilene-79601");
        assert_eq!(
            row.entry,
            ZipEntry {
                city: "Abilene".into(),
                rent: 1500,
                zip: "79601".into()
            }
        );
    }

    #[test]
    fn test_normalize_record_skip_reasons() {
        let zip = || text("79601");
        assert_eq!(
            normalize_record(&record(zip(), "Abilene, TX MSA", RawValue::Empty)),
            Err(SkipReason::MissingRent)
        );
        assert_eq!(
            normalize_record(&record(zip(), "Unknown Area", text("900"))),
            Err(SkipReason::UnparsedArea)
        );
        assert_eq!(
            normalize_record(&record(zip(), "San Juan, PR HUD Metro FMR Area", text("900"))),
            Err(SkipReason::UnknownState)
        );
    }

    #[test]
    fn test_normalizer_last_row_wins() {
        let mut n = Normalizer::new();
        n.push(&record(text("79601"), "Abilene, TX MSA", text("1500")));
        n.push(&record(text("79601.0"), "Abilene, TX MSA", text("1625")));

        let (states, stats) = n.finish();

        let texas = &states["texas"];
        assert_eq!(texas.len(), 1);
        assert_eq!(texas["abilene-79601"].rent, 1625);
        assert_eq!(stats.rows_kept, 2);
        assert_eq!(stats.overwritten, 1);
    }

    #[test]
    fn test_normalizer_groups_and_counts() {
        let rows = vec![
            record(text("79601"), "Abilene, TX MSA", text("1500")),
            record(text("501"), "Holtsville, NY HUD Metro FMR Area", text("2800")),
            record(text("99999"), "Unknown Area", text("1000")),
            record(text("00901"), "San Juan, PR MSA", text("700")),
            record(text("10001"), "New York, NY HUD Metro FMR Area", text("0")),
        ];

        let mut n = Normalizer::new();
        n.extend(&rows);

        let stats = n.stats().clone();
        assert_eq!(stats.rows_read, 5);
        assert_eq!(stats.rows_kept, 2);
        assert_eq!(stats.skipped(), 3);
        assert_eq!(stats.skipped_missing_rent, 1);
        assert_eq!(stats.skipped_unparsed_area, 1);
        assert_eq!(stats.skipped_unknown_state, 1);

        let states = n.states();
        assert_eq!(states.len(), 2);
        assert_eq!(states["new-york"]["holtsville-00501"].zip, "00501");
    }
}
