pub mod aggregate;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod insights;
pub mod io_utils;
pub mod render;
pub mod sales;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    aggregate::Aggregator,
    cli::{Cli, Commands, OutputFormat, TableArgs},
    config::PipelineConfig,
    sales::SalesTable,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sales_lens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => handle_clean(&args),
        Commands::Summary(args) => handle_summary(&args),
        Commands::Options(args) => handle_options(&args),
        Commands::Insights(args) => handle_insights(&args),
        Commands::InitConfig(args) => handle_init_config(&args),
    }
}

fn handle_clean(args: &cli::CleanArgs) -> Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let policy = config
        .cleaning
        .decode_policy(args.input_encoding.as_deref())?;
    info!(
        "Cleaning {} input(s) into {:?} (encodings {} then {})",
        args.inputs.len(),
        args.output_dir,
        policy.primary.name(),
        policy.fallback.name()
    );
    if let Some(delimiter) = args.delimiter {
        debug!("Using delimiter '{}'", printable_delimiter(delimiter));
    }
    let report = cleaner::clean_batch(
        &args.inputs,
        &args.output_dir,
        args.delimiter,
        &policy,
        &config.cleaning,
    )?;
    println!("{report}");
    if let Some(path) = &args.report {
        report.write(path)?;
        info!("Run report written to {path:?}");
    }
    info!(
        "Processed {} file(s), {} failed",
        report.entries.len(),
        report.failures()
    );
    Ok(())
}

/// Loads the cleaned table named by `args` with the configured bindings.
fn load_table(args: &TableArgs) -> Result<(SalesTable, PipelineConfig)> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let policy = config
        .cleaning
        .decode_policy(args.input_encoding.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let table = SalesTable::load(
        &args.input,
        delimiter,
        &policy,
        &config.columns,
        &config.cleaning,
    )?;
    if table.is_empty() {
        warn!("{:?} holds no sales records", args.input);
    }
    Ok((table, config))
}

fn emit_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output as JSON")?;
    println!("{rendered}");
    Ok(())
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let (table, config) = load_table(&args.table)?;
    let selection = args.filters.selection();
    let aggregator = Aggregator::new(args.top_regions.unwrap_or(config.top_regions));
    let result = aggregator.aggregate(&table, &selection)?;
    info!(
        "Answered query over {} record(s): {} order(s) matched",
        table.len(),
        result.total_orders
    );
    match args.table.format {
        OutputFormat::Table => print!("{}", render::render_dashboard(&result)),
        OutputFormat::Json => emit_json(&result)?,
    }
    Ok(())
}

fn handle_options(args: &cli::OptionsArgs) -> Result<()> {
    let (table, _) = load_table(&args.table)?;
    let options = table.filter_options();
    match args.table.format {
        OutputFormat::Table => print!("{}", render::render_filter_options(&options)),
        OutputFormat::Json => emit_json(&options)?,
    }
    Ok(())
}

fn handle_insights(args: &cli::InsightsArgs) -> Result<()> {
    let (table, _) = load_table(&args.table)?;
    let view = table.filter(&args.filters.selection());
    let insights = insights::analyze(&view, table.has_fulfilment())?;
    info!("Analyzed {} of {} record(s)", view.len(), table.len());
    match args.table.format {
        OutputFormat::Table => print!("{}", render::render_insights(&insights)),
        OutputFormat::Json => emit_json(&insights)?,
    }
    Ok(())
}

fn handle_init_config(args: &cli::InitConfigArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{:?} already exists; pass --force to overwrite it",
            args.output
        );
    }
    PipelineConfig::default().save(&args.output)?;
    info!("Default configuration written to {:?}", args.output);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
