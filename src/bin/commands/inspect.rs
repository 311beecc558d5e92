use anyhow::{anyhow, Result};
use clap::Args;
use rowbound::{DatabaseConn, RowboundConfig};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Arguments for the Inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Database file to inspect, the configured database by default
    #[clap(long)]
    pub db: Option<String>,

    /// Output as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct TableInfo {
    name: String,
    rows: u64,
}

pub fn run(config: &RowboundConfig, args: InspectArgs) -> Result<()> {
    let path = args.db.unwrap_or_else(|| config.sqlite_path());
    if !Path::new(&path).exists() {
        return Err(anyhow!("Database file not found: {}", path));
    }

    info!("inspecting {}", path);
    let db = DatabaseConn::open_with(Some(path.as_str()), config.foreign_keys)?;
    let tables = db
        .table_names()?
        .into_iter()
        .map(|name| -> Result<TableInfo> {
            let rows = db.table_count(&name)?;
            Ok(TableInfo { name, rows })
        })
        .collect::<Result<Vec<_>>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
        return Ok(());
    }

    if tables.is_empty() {
        println!("{}: no tables", path);
        return Ok(());
    }

    let width = tables.iter().map(|t| t.name.len()).max().unwrap_or(0);
    println!("{}", path);
    for table in &tables {
        println!("  {:<width$}  {} rows", table.name, table.rows, width = width);
    }
    Ok(())
}
