//! Vouch CLI: score registry artifacts and query their lineage.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use vouch_core::DeviceClass;

/// Vouch: trust scores and lineage for models, datasets and code
#[derive(Parser, Debug)]
#[command(name = "vouch", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.vouch/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Registry file path (overrides `registry.path`)
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    /// Skip repository host lookups; host-backed metrics score neutral
    #[arg(long, global = true)]
    offline: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Add or replace artifact records from a JSON file (one object or an array)
    Import { file: PathBuf },
    /// Compute and store a new score report
    Score {
        id: String,
        /// Weight the size metric by one device class instead of the mean
        #[arg(long, value_parser = parse_device)]
        device: Option<DeviceClass>,
        /// Print the dashboard JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show whether the latest score report clears the minimum metric threshold
    Status { id: String },
    /// Storage cost of an artifact, optionally with its dependencies
    Cost {
        id: String,
        /// Add every registered ancestor, each counted once
        #[arg(long)]
        dependencies: bool,
    },
    /// Show ancestors, descendants and the edges between them
    Lineage { id: String },
    /// Record that CHILD derives from PARENT
    Link { parent: String, child: String },
    /// Insert declared links into the lineage graph (all artifacts if no id)
    Sync { id: Option<String> },
    /// Compare an artifact's license with a GitHub repository's license
    LicenseCheck { id: String, repo_url: String },
    /// Delete every artifact, report and lineage edge
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default `.vouch/config.toml` into the workspace
    Init,
}

fn parse_device(raw: &str) -> Result<DeviceClass, String> {
    DeviceClass::ALL
        .into_iter()
        .find(|d| d.as_str() == raw.replace('-', "_"))
        .ok_or_else(|| {
            let names: Vec<&str> = DeviceClass::ALL.iter().map(|d| d.as_str()).collect();
            format!("unknown device class '{raw}' (expected one of: {})", names.join(", "))
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "vouch", "vouch")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "vouch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let options = commands::GlobalOptions {
        workspace,
        registry: cli.registry,
        offline: cli.offline,
    };
    commands::handle_command(cli.command, &options).await
}
