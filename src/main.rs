//! CLI entry point for the rent_geo tool.
//!
//! Provides subcommands for normalizing the rent spreadsheet into per-state
//! JSON files, building the zip index, inspecting the spreadsheet, looking
//! up generated records, and checking rent affordability.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rent_geo::afford::{affordability, parse_salary};
use rent_geo::config::{ColumnMap, Config};
use rent_geo::lookup::GeoStore;
use rent_geo::pipeline::{run_index, run_normalize};
use rent_geo::source::{inspect, is_not_found};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "rent_geo")]
#[command(about = "Turns rent benchmark spreadsheets into per-state JSON and a zip index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the spreadsheet and write one JSON file per state
    Normalize {
        /// Spreadsheet to read (.xlsx, .xls, .ods or .csv)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Sheet name (defaults to the first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Directory for the per-state JSON files
        #[arg(short = 'd', long)]
        geo_dir: Option<PathBuf>,

        /// Zero-based zip,area,rent column positions, e.g. "0,2,9"
        #[arg(long, value_name = "ZIP,AREA,RENT")]
        columns: Option<String>,
    },
    /// Build the zip-code index from the per-state JSON files
    Index {
        /// Directory holding the per-state JSON files
        #[arg(short = 'd', long)]
        geo_dir: Option<PathBuf>,

        /// Index file to write
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List sheet names and the header row of the last sheet
    Inspect {
        /// Spreadsheet to inspect
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// Look up generated records by zip, or by state and city slug
    Lookup {
        /// Zip code to find in the index
        #[arg(long, conflicts_with_all = ["state", "city"])]
        zip: Option<String>,

        /// State slug, e.g. "new-york"
        #[arg(long)]
        state: Option<String>,

        /// City slug within the state, e.g. "abilene-79601"
        #[arg(long, requires = "state")]
        city: Option<String>,
    },
    /// Check whether a zip's rent fits an annual salary's take-home pay
    Afford {
        /// Zip code to take the rent from
        #[arg(long)]
        zip: String,

        /// Annual gross salary, e.g. "85,000"
        #[arg(long)]
        salary: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/rent_geo.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("rent_geo.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Normalize {
            input,
            sheet,
            geo_dir,
            columns,
        } => {
            if let Some(input) = input {
                config.input_file = input;
            }
            if sheet.is_some() {
                config.sheet = sheet;
            }
            if let Some(geo_dir) = geo_dir {
                config.geo_dir = geo_dir;
            }
            if let Some(columns) = columns {
                config.columns = ColumnMap::parse(&columns)?;
            }

            info!("Starting normalize");
            match run_normalize(&config) {
                Ok(summary) => {
                    info!(
                        states = summary.files.len(),
                        skipped = summary.stats.skipped(),
                        "Done, database built"
                    );
                }
                Err(e) if is_not_found(&e) => {
                    error!(
                        input = %config.input_file.display(),
                        "Input file not found, nothing written"
                    );
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
        Commands::Index { geo_dir, output } => {
            if let Some(geo_dir) = geo_dir {
                config.geo_dir = geo_dir;
            }
            if let Some(output) = output {
                config.index_file = output;
            }

            info!("Building search index");
            let summary = run_index(&config)?;
            info!(
                zips = summary.zips,
                files = summary.files_read,
                path = %config.index_file.display(),
                "Index created"
            );
        }
        Commands::Inspect { input } => {
            let path = input.unwrap_or(config.input_file);
            info!(path = %path.display(), "Inspecting");

            let summary = inspect(&path)?;
            info!(sheets = ?summary.sheet_names, "Found sheets");
            info!(sheet = %summary.inspected_sheet, columns = ?summary.headers, "Columns found");
        }
        Commands::Lookup { zip, state, city } => {
            let store = GeoStore::new(&config.geo_dir, &config.index_file);

            let result = match (zip, state, city) {
                (Some(zip), _, _) => serde_json::to_value(store.zip_lookup(&zip)?)?,
                (None, Some(state), Some(city)) => {
                    serde_json::to_value(store.city_data(&state, &city)?)?
                }
                (None, Some(state), None) => serde_json::to_value(store.state_listing(&state)?)?,
                (None, None, _) => bail!("lookup needs --zip or --state"),
            };

            if result.is_null() {
                info!("No matching record");
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Afford { zip, salary } => {
            let Some(annual) = parse_salary(&salary) else {
                bail!("salary {salary:?} is not a number");
            };

            let store = GeoStore::new(&config.geo_dir, &config.index_file);
            let Some(location) = store.zip_lookup(&zip)? else {
                info!(zip = %zip, "Location not found");
                println!("null");
                return Ok(());
            };

            let result = affordability(annual, location.r);
            if let Some(result) = &result {
                info!(
                    city = %location.c,
                    rent = location.r,
                    percent_of_income = result.percent_of_income,
                    affordable = result.is_affordable,
                    "Affordability"
                );
            }

            let output = serde_json::json!({
                "zip": zip,
                "city": location.c,
                "state": location.s,
                "rent": location.r,
                "result": result,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
