//! Stockpipe CLI: stage entry points, full runs, the snapshot endpoint and inspection.
//!
//! Commands:
//! - `run`: extract, parse, load and unify in order; records the run in history
//! - `extract` / `parse` / `load` / `union`: run a single stage
//! - `snapshot`: fetch one candle payload and stage it under a new job id
//! - `warehouse status`: row count of every configured table
//! - `history`: recent pipeline runs
//!
//! Secrets are read from environment variables named after the secret,
//! e.g. `ALPHAVANTAGE_API_KEY`, `FINNHUB_API_KEY`, `MOTHER_DB`.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use stockpipe_core::provider::{AlphaVantageClient, FinnhubClient};
use stockpipe_core::secrets::EnvSecretStore;
use stockpipe_core::storage::LocalObjectStore;
use stockpipe_core::warehouse::{ParquetWarehouse, TableRef, Warehouse, WarehouseError};
use stockpipe_core::PipelineConfig;
use stockpipe_runner::{
    CandleSnapshot, Pipeline, RunHistory, RunRecord, RunReport, Stage, StageReport, SymbolOutcome,
};

#[derive(Parser)]
#[command(name = "stockpipe", about = "Stockpipe: daily stock price ETL pipeline")]
struct Cli {
    /// Path to a TOML config file. Defaults apply to every field it omits.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all four stages in order.
    Run,
    /// Fetch raw payloads for every symbol into staging.
    Extract,
    /// Flatten raw payloads into parsed records.
    Parse,
    /// Append parsed records to the per-symbol tables.
    Load,
    /// Rebuild the unified table from the per-symbol tables.
    Union,
    /// Fetch one candle snapshot and stage it under a new job id.
    Snapshot,
    /// Warehouse inspection commands.
    Warehouse {
        #[command(subcommand)]
        action: WarehouseAction,
    },
    /// Show recent pipeline runs.
    History {
        /// Number of runs to show, newest first.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum WarehouseAction {
    /// Row count of every per-symbol table and the unified table.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Run => run_pipeline(&config),
        Commands::Extract => run_single_stage(&config, Stage::Extract),
        Commands::Parse => run_single_stage(&config, Stage::Parse),
        Commands::Load => run_single_stage(&config, Stage::Load),
        Commands::Union => run_single_stage(&config, Stage::Unify),
        Commands::Snapshot => run_snapshot(&config),
        Commands::Warehouse { action } => match action {
            WarehouseAction::Status => run_warehouse_status(&config),
        },
        Commands::History { limit } => run_history(&config, limit),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    let source = AlphaVantageClient::new(&config.alphavantage)?;
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let mut pipeline = Pipeline::new(config, &EnvSecretStore, &source, &store, &warehouse);

    let report = pipeline.run();
    let history = RunHistory::new(&config.history_path);
    if let Err(e) = history.append(&RunRecord::from_report(&report)) {
        tracing::warn!(path = %history.path().display(), error = %e, "could not record run history");
    }

    print_run(&report);
    if let Some(e) = report.error {
        bail!(e);
    }
    Ok(())
}

fn run_single_stage(config: &PipelineConfig, stage: Stage) -> Result<()> {
    let source = AlphaVantageClient::new(&config.alphavantage)?;
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let pipeline = Pipeline::new(config, &EnvSecretStore, &source, &store, &warehouse);

    let report = pipeline.run_stage(stage)?;
    print_stage(&report);
    Ok(())
}

fn run_snapshot(config: &PipelineConfig) -> Result<()> {
    let source = FinnhubClient::new(&config.finnhub)?;
    let store = LocalObjectStore::new(&config.storage_root);
    let snapshot = CandleSnapshot::new(&config.finnhub, &EnvSecretStore, &store, &source)?;

    let response = snapshot.handle();
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if response.status != 200 {
        bail!("snapshot failed with status {}", response.status);
    }
    Ok(())
}

fn run_warehouse_status(config: &PipelineConfig) -> Result<()> {
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let mut tables = config.symbol_tables();
    tables.push(config.unified_table_ref());

    println!("Warehouse: {}", warehouse.root().display());
    println!();
    println!("{:<50} {:>10}", "Table", "Rows");
    println!("{}", "-".repeat(61));
    for table in &tables {
        println!("{:<50} {:>10}", table.to_string(), row_count_cell(&warehouse, table)?);
    }

    let extra: Vec<TableRef> = warehouse
        .list_tables(&config.project, &config.dataset)?
        .into_iter()
        .filter(|t| !tables.contains(t))
        .collect();
    if !extra.is_empty() {
        println!();
        println!("Unconfigured tables:");
        for table in &extra {
            println!("  {table}");
        }
    }
    Ok(())
}

fn row_count_cell(warehouse: &ParquetWarehouse, table: &TableRef) -> Result<String> {
    match warehouse.read_table(table) {
        Ok(df) => Ok(df.height().to_string()),
        Err(WarehouseError::TableNotFound(_)) => Ok("(missing)".into()),
        Err(e) => Err(e.into()),
    }
}

fn run_history(config: &PipelineConfig, limit: usize) -> Result<()> {
    let history = RunHistory::new(&config.history_path);
    let records = history.recent(limit)?;
    if records.is_empty() {
        println!("No runs recorded in {}", history.path().display());
        return Ok(());
    }

    println!("{:<50} {:<20} {:<8} {:<8}", "Run", "Started (UTC)", "State", "Stage");
    println!("{}", "-".repeat(89));
    for record in &records {
        let stage = record
            .failed_stage
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<50} {:<20} {:<8} {:<8}",
            record.run_id,
            record.started_at.format("%Y-%m-%d %H:%M:%S"),
            record.final_state.to_string(),
            stage
        );
        if let Some(error) = &record.error {
            println!("  error: {error}");
        }
    }
    Ok(())
}

fn print_run(report: &RunReport) {
    println!("Run {}: {}", report.run_id, report.state);
    for stage in &report.stages {
        print_stage(stage);
    }
}

fn print_stage(report: &StageReport) {
    println!(
        "[{}] ok: {}, skipped: {}",
        report.stage,
        report.succeeded(),
        report.skipped()
    );
    for entry in &report.outcomes {
        let detail = match &entry.outcome {
            SymbolOutcome::Staged { key, bytes, .. } => format!("staged {key} ({bytes} bytes)"),
            SymbolOutcome::Parsed { key, records } => format!("parsed {key} ({records} records)"),
            SymbolOutcome::Loaded {
                table,
                rows,
                duplicates_dropped,
            } => format!("loaded {rows} rows into {table} ({duplicates_dropped} duplicates dropped)"),
            SymbolOutcome::Skipped(reason) => format!("skipped: {reason}"),
        };
        println!("  {:<8} {detail}", entry.symbol);
    }
    if let Some(rows) = report.unified_rows {
        println!("  unified table rebuilt with {rows} rows");
    }
}
