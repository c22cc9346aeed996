//! excel-manager CLI - read and upsert workbooks through the native component

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use excel_manager::{
    ensure_staged, variant, ExcelService, NativePipeline, ServiceConfig, UpdateCell,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "excel-manager")]
#[command(
    author,
    version,
    about = "Read and upsert Excel workbooks through the native component"
)]
struct Cli {
    /// Directory holding target/release and the npm/ staging directory
    #[arg(long, global = true)]
    addon_root: Option<PathBuf>,

    /// Directory workbook names are resolved against
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Serve synthetic data when the native component cannot be loaded
    #[arg(long, global = true)]
    development: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every row of a sheet as JSON
    Read {
        /// Workbook file name inside the data directory
        file: String,

        /// Sheet name (default: Feuil1)
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Update the row keyed by the first cell, or append it
    Upsert {
        /// Workbook file name inside the data directory
        file: String,

        /// Sheet name (default: Feuil1)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Cell to write as COLUMN=VALUE (1-based column); the first one is the key
        #[arg(short, long = "cell", value_parser = parse_cell, required = true)]
        cells: Vec<UpdateCell>,
    },

    /// Show the detected platform variant and artifact locations
    Variant,

    /// Copy the release build into the staging directory
    Stage,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli);

    match cli.command {
        Commands::Read { file, sheet } => read(config, &file, sheet),
        Commands::Upsert { file, sheet, cells } => upsert(config, &file, sheet, &cells),
        Commands::Variant => show_variant(&config),
        Commands::Stage => stage(&config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Environment first, then command-line overrides.
fn build_config(cli: &Cli) -> ServiceConfig {
    let mut config = ServiceConfig::from_env_with_addon_root(cli.addon_root.clone());
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.development {
        config.allow_synthetic_fallback = true;
    }
    tracing::debug!(
        "Addon root {}, data directory {}, synthetic fallback {}",
        config.addon_root.display(),
        config.data_dir.display(),
        config.allow_synthetic_fallback
    );
    config
}

fn read(config: ServiceConfig, file: &str, sheet: Option<String>) -> Result<()> {
    let sheet = sheet.unwrap_or_else(|| config.default_sheet.clone());
    let service = ExcelService::new(config);

    let rows = service
        .read_sheet(file, &sheet)
        .with_context(|| format!("Failed to read '{file}' ({sheet})"))?;

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &rows).context("Failed to write JSON")?;
    writeln!(stdout)?;
    Ok(())
}

fn upsert(
    config: ServiceConfig,
    file: &str,
    sheet: Option<String>,
    cells: &[UpdateCell],
) -> Result<()> {
    let sheet = sheet.unwrap_or_else(|| config.default_sheet.clone());
    let service = ExcelService::new(config);

    service
        .upsert_row(file, &sheet, cells)
        .with_context(|| format!("Failed to upsert into '{file}' ({sheet})"))?;

    eprintln!("Upserted {} cell(s) into {file} ({sheet})", cells.len());
    Ok(())
}

fn show_variant(config: &ServiceConfig) -> Result<()> {
    let key = variant::resolve().context("Failed to resolve platform variant")?;
    let location = NativePipeline::new(config).location()?;

    println!("Variant:        {key}");
    println!("Canonical name: {}", location.canonical_name);
    println!("Build artifact: {}", location.source_path.display());
    println!("Staged module:  {}", location.staged_path.display());
    for root in &config.package_roots {
        println!("Package root:   {}", root.display());
    }
    Ok(())
}

fn stage(config: &ServiceConfig) -> Result<()> {
    let location = NativePipeline::new(config).location()?;
    let staged = ensure_staged(&location).context("Failed to stage native component")?;

    if staged.refreshed {
        println!("Staged {}", staged.path.display());
    } else {
        println!("Up to date: {}", staged.path.display());
    }
    Ok(())
}

/// Parse `COLUMN=VALUE`, e.g. `3=42`.
fn parse_cell(s: &str) -> Result<UpdateCell, String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got '{s}'"))?;
    let column: u32 = column
        .trim()
        .parse()
        .map_err(|_| format!("invalid column index '{column}'"))?;
    if column == 0 {
        return Err("column indexes start at 1".to_string());
    }
    Ok(UpdateCell::new(column, value))
}
