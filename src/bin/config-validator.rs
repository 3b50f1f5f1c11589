//! # STAPI Configuration Validator
//!
//! Loads the layered configuration for one or more environments and reports
//! whether it validates, before anything is started with it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use stapi_core::config::{ConfigManager, StapiConfig};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate STAPI core configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (defaults to STAPI_ENV, then APP_ENV, then development)
    #[arg(short, long)]
    environment: Option<String>,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate and print the resolved configuration
    Show,

    /// Compare resolved configurations between environments
    Compare {
        /// Base environment for comparison
        #[arg(short, long, default_value = "development")]
        base: String,

        /// Target environment for comparison
        #[arg(short, long)]
        target: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Compare { base, target }) => compare_configs(&cli, base, target),
        Some(Commands::Show) | None => show_config(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli, environment: &str) -> Result<StapiConfig> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)
        .with_context(|| format!("loading configuration for '{environment}'"))?;
    Ok(manager.config().clone())
}

fn show_config(cli: &Cli) -> Result<()> {
    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    let config = load(cli, &environment)?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Table => {
            println!("🔧 STAPI configuration ({environment})");
            for (key, value) in flatten(&serde_json::to_value(&config)?) {
                println!("  {key:<28} {value}");
            }
            println!("✅ Configuration is valid");
        }
    }
    Ok(())
}

fn compare_configs(cli: &Cli, base: &str, target: &str) -> Result<()> {
    let base_values = flatten(&serde_json::to_value(load(cli, base)?)?);
    let target_values = flatten(&serde_json::to_value(load(cli, target)?)?);

    let differences: Vec<_> = base_values
        .iter()
        .zip(target_values.iter())
        .filter(|(a, b)| a.1 != b.1)
        .map(|((key, a), (_, b))| (key.clone(), a.clone(), b.clone()))
        .collect();

    match cli.format {
        OutputFormat::Json => {
            let rows: Vec<_> = differences
                .iter()
                .map(|(key, a, b)| serde_json::json!({"key": key, base: a, target: b}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            println!("🔍 {base} → {target}");
            if differences.is_empty() {
                println!("  no differences");
            }
            for (key, a, b) in &differences {
                println!("  {key:<28} {a} → {b}");
            }
        }
    }
    Ok(())
}

/// Dotted key/value pairs in key order.
fn flatten(value: &serde_json::Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(&path, child, out);
                }
            }
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }

    let mut out = Vec::new();
    walk("", value, &mut out);
    out.sort();
    out
}
