mod build_info;
mod commands;
mod config;
mod domain;
mod platform;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "diagsnap",
    version,
    about = "Point-in-time diagnostic snapshot of a container daemon and its host"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Output format (table, json or yaml)
    #[arg(long, default_value = "table")]
    format: String,

    /// Path to config file (default: ~/.config/diagsnap/config.yaml)
    #[arg(long)]
    config: Option<String>,

    /// Log level (overrides config; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format (text or json), written to stderr
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect and display a full diagnostic snapshot
    Info {
        #[command(flatten)]
        common: CommonArgs,

        /// YAML inventory describing containers, images and plugins
        /// (overrides config)
        #[arg(long)]
        inventory: Option<String>,
    },

    /// Show build and kernel version information
    Version {
        #[command(flatten)]
        common: CommonArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { common, inventory } => {
            let cfg = commands::setup(
                common.config.as_deref(),
                common.log_level.as_deref(),
                &common.log_format,
            )?;
            commands::info::run(cfg, &common.format, inventory.as_deref())
        }
        Commands::Version { common } => {
            let cfg = commands::setup(
                common.config.as_deref(),
                common.log_level.as_deref(),
                &common.log_format,
            )?;
            commands::version::run(cfg, &common.format)
        }
    }
}
