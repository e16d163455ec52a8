use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::filter::FilterSelection;

#[derive(Debug, Parser)]
#[command(author, version, about = "Clean sales exports and explore them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean one or more raw CSV exports into canonical tables
    Clean(CleanArgs),
    /// Compute dashboard KPIs and series for a filter selection
    Summary(SummaryArgs),
    /// List the values available for each filter dimension
    Options(OptionsArgs),
    /// Monthly trend, growth, status, fulfilment and unit price analysis
    Insights(InsightsArgs),
    /// Write the default configuration to a YAML file
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Raw CSV files or directories containing them
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Directory receiving the cleaned files
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,
    /// Also write the run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Primary character encoding of the inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

/// Options shared by every command that reads a cleaned table.
#[derive(Debug, Args)]
pub struct TableArgs {
    /// Cleaned CSV file to query
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Primary character encoding of the input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Months to include, as YYYY-MM (repeatable or comma-separated)
    #[arg(long = "month", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub months: Vec<String>,
    /// Categories to include (repeatable or comma-separated)
    #[arg(long = "category", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub categories: Vec<String>,
    /// Regions to include (repeatable or comma-separated)
    #[arg(long = "region", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub regions: Vec<String>,
}

impl FilterArgs {
    pub fn selection(&self) -> FilterSelection {
        FilterSelection::from_choices(&self.months, &self.categories, &self.regions)
    }
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub table: TableArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Number of regions kept in the revenue ranking (overrides configuration)
    #[arg(long = "top-regions")]
    pub top_regions: Option<usize>,
}

#[derive(Debug, Args)]
pub struct OptionsArgs {
    #[command(flatten)]
    pub table: TableArgs,
}

#[derive(Debug, Args)]
pub struct InsightsArgs {
    #[command(flatten)]
    pub table: TableArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Destination YAML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
