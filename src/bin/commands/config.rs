use anyhow::Result;
use clap::Args;
use rowbound::RowboundConfig;
use serde::Serialize;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    database: DatabaseInfo,
    error_policy: String,
    foreign_keys: bool,
    max_reference_depth: usize,
}

#[derive(Debug, Serialize)]
struct DatabaseInfo {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

pub fn run(config: &RowboundConfig, args: ConfigArgs) -> Result<()> {
    if !args.json {
        println!("{}", config.summary());
        return Ok(());
    }

    let sqlite_path = config.sqlite_path();
    let exists = Path::new(&sqlite_path).exists();
    let size_bytes = if exists {
        std::fs::metadata(&sqlite_path).ok().map(|m| m.len())
    } else {
        None
    };

    let info = ConfigInfo {
        config_file: RowboundConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        database: DatabaseInfo {
            path: sqlite_path,
            exists,
            size_bytes,
        },
        error_policy: config.error_policy.to_string(),
        foreign_keys: config.foreign_keys,
        max_reference_depth: config.max_reference_depth,
    };
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
