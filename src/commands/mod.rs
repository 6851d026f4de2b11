pub mod info;
pub mod version;

use std::path::Path;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::{self, Config};

/// Load configuration and start logging. Logs go to stderr so that stdout
/// stays machine-readable.
pub fn setup(config_path: Option<&str>, log_level: Option<&str>, log_format: &str) -> Result<Config> {
    let cfg = config::load(config_path.map(Path::new))?;
    let level = log_level.unwrap_or(cfg.log_level.as_str()).to_string();
    init_logging(&level, log_format)?;
    Ok(cfg)
}

fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().init(),
        "text" => builder.init(),
        other => bail!("unknown log format {other:?} (expected text or json)"),
    }
    Ok(())
}

/// Print `value` as JSON or YAML. Returns false for any other format so the
/// caller can fall back to its table view.
pub fn print_structured<T: Serialize>(value: &T, format: &str) -> Result<bool> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(value)?),
        "yaml" => print!("{}", serde_yaml::to_string(value)?),
        "table" => return Ok(false),
        other => bail!("unknown output format {other:?} (expected table, json or yaml)"),
    }
    Ok(true)
}
