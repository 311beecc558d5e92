use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;

use crate::error::ErrorPolicy;
use crate::session::DEFAULT_MAX_REFERENCE_DEPTH;

pub struct RowboundConfig {
    /// Path to the directory holding the database file
    pub data_dir: String,

    /// Database file name inside `data_dir`
    pub database_file: String,

    /// How conversion failures are handled (default: strict)
    pub error_policy: ErrorPolicy,

    /// Whether SQLite enforces foreign key constraints (default: true)
    pub foreign_keys: bool,

    /// Bound on nested foreign-key loads (default: 32)
    pub max_reference_depth: usize,
}

const DEFAULT_DATABASE_FILE: &str = "rowbound.sqlite3";

const EMPTY_CONFIG: &str = r#"### rowbound configuration file

### directory holding the database file
# data_dir = "~/.rowbound"

### database file name inside data_dir
# database_file = "rowbound.sqlite3"

### "strict" fails a call on the first conversion error,
### "lenient" logs and skips the failing field
# error_policy = "strict"

### enforce foreign key constraints
# foreign_keys = true

### how many foreign-key loads may nest while hydrating one row
# max_reference_depth = 32
"#;

impl Default for RowboundConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.rowbound", home_dir),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            error_policy: ErrorPolicy::Strict,
            foreign_keys: true,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }
}

impl RowboundConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<RowboundConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.rowbound/rowbound.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let rowbound_dir = format!("{}/.rowbound", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(rowbound_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create rowbound directory: {}", e))?;
                let p = format!("{}/rowbound.toml", rowbound_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // A .env file may carry the environment overrides below
        dotenvy::dotenv().ok();

        // Add in settings from the environment (with a prefix of ROWBOUND)
        // E.g., `ROWBOUND_ERROR_POLICY=lenient ./rowbound` would relax conversion errors
        builder = builder.add_source(config::Environment::with_prefix("ROWBOUND"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, &rowbound_dir)
    }

    fn from_map(config: &HashMap<String, String>, default_dir: &str) -> Result<RowboundConfig> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => {
                std::fs::create_dir_all(default_dir)
                    .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;
                default_dir.to_string()
            }
        };

        let database_file = config
            .get("database_file")
            .filter(|f| !f.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATABASE_FILE.to_string());

        let error_policy = match config.get("error_policy") {
            Some(p) => p.parse::<ErrorPolicy>()?,
            None => ErrorPolicy::Strict,
        };

        let foreign_keys = match config.get("foreign_keys") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| anyhow!("Invalid foreign_keys value: {}", v))?,
            None => true,
        };

        let max_reference_depth = match config.get("max_reference_depth") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid max_reference_depth value: {}", v))?,
            None => DEFAULT_MAX_REFERENCE_DEPTH,
        };

        Ok(RowboundConfig {
            data_dir,
            database_file,
            error_policy,
            foreign_keys,
            max_reference_depth,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, self.database_file)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let sqlite_path = self.sqlite_path();
        let mut lines = vec![
            format!("Config File:        {}", Self::config_file_path()),
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", sqlite_path),
            format!("Error Policy:       {}", self.error_policy),
            format!("Foreign Keys:       {}", self.foreign_keys),
            format!("Max Ref. Depth:     {}", self.max_reference_depth),
        ];

        if let Ok(meta) = std::fs::metadata(&sqlite_path) {
            lines.push(format!("Database Size:      {} bytes", meta.len()));
        }

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.rowbound/rowbound.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}
