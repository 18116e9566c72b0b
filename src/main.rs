// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! spanlog command line - resolves configuration and runs instrumented demo
//! scenarios so the console format and span wiring can be inspected.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;

use spanlog::config::{self, EnvOverrides};
use spanlog::init::{init_telemetry, TelemetryConfig};
use spanlog::{fields, Diagnostics, DiagnosticsConfig, LogLevel, LogOutput, TracingForwarder};

/// spanlog version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// spanlog - structured logging and tracing, in process.
#[derive(Parser)]
#[command(name = "spanlog")]
#[command(author, version, about = "In-process structured logging and tracing", long_about = None)]
struct Cli {
    /// Baseline log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    level: Option<LogLevel>,

    /// Shortcut for --level debug
    #[arg(long, global = true)]
    debug: bool,

    /// Shortcut for --level trace
    #[arg(long, global = true)]
    trace: bool,

    /// Disable colored level tokens
    #[arg(long, global = true)]
    no_color: bool,

    /// Omit timestamps from console lines
    #[arg(long, global = true)]
    no_timestamps: bool,

    /// Extra config file layered over the workspace config
    #[arg(short, long, global = true, env = "SPANLOG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn level_override(&self) -> Option<LogLevel> {
        if self.trace {
            Some(LogLevel::Trace)
        } else if self.debug {
            Some(LogLevel::Debug)
        } else {
            self.level
        }
    }
}

/// Output format for demo records.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Console lines
    Text,
    /// One JSON record per line
    Json,
}

/// Subcommands for spanlog.
#[derive(Subcommand)]
enum Commands {
    /// Run an instrumented checkout scenario
    Demo {
        /// Record output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also forward records to the internal tracing output
        #[arg(long)]
        forward: bool,
    },

    /// Show the resolved configuration
    Config,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The subscriber may already be installed by an embedding test harness.
    let _ = init_telemetry(&TelemetryConfig::default().with_ansi(!cli.no_color));

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Demo { format, forward } => run_demo(config, format, forward).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Version => {
            println!("spanlog {}", VERSION);
            Ok(())
        }
    }
}

/// Files first, then environment, then command line flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<DiagnosticsConfig> {
    let workspace_root = std::env::current_dir()?;
    let mut config = config::load_config_with(&workspace_root, EnvOverrides::default())?;

    if let Some(path) = &cli.config {
        config::apply_config_file(&mut config, config::load_config_file(path)?);
    }

    let mut overrides = EnvOverrides::from_env()?;
    if let Some(level) = cli.level_override() {
        overrides.level = Some(level);
    }
    if cli.no_color {
        overrides.with_colors = Some(false);
    }
    if cli.no_timestamps {
        overrides.with_timestamps = Some(false);
    }
    config::apply_overrides(&mut config, &overrides);

    Ok(config)
}

async fn run_demo(config: DiagnosticsConfig, format: OutputFormat, forward: bool) -> anyhow::Result<()> {
    let config = match format {
        OutputFormat::Text => config,
        OutputFormat::Json => config.with_output(LogOutput::custom(|record| {
            if let Ok(line) = serde_json::to_string(record) {
                println!("{line}");
            }
        })),
    };

    let diagnostics = Diagnostics::new(config);
    if forward {
        diagnostics.subscribe(TracingForwarder::shared());
    }

    let lookup: Result<(), String> = diagnostics.instrument("load-user", None, None, |log| {
        log.debug("Looking up user", fields(json!({ "user_id": 7 })));
        Err("not found".to_string())
    });
    if lookup.is_err() {
        diagnostics
            .default_logger()
            .warn("Continuing as guest", None);
    }

    let checkout = diagnostics.clone();
    let order: Result<u64, String> = diagnostics
        .instrument_async(
            "checkout",
            Some("orders"),
            Some(fields(json!({ "order_id": 1042 }))),
            |log| async move {
                log.info("Reserving stock", fields(json!({ "items": 3 })));
                tokio::task::yield_now().await;

                checkout.instrument("charge-card", Some("payments"), None, |log| {
                    log.info("Charged card", fields(json!({ "amount": 4999, "currency": "EUR" })));
                    Ok::<_, String>(())
                })?;

                let receipt = checkout.instrument("send-receipt", Some("email"), None, |_| {
                    Err::<(), _>("smtp unavailable".to_string())
                });
                if let Err(err) = receipt {
                    log.warn("Receipt deferred", fields(json!({ "reason": err })));
                }

                Ok::<u64, String>(1042)
            },
        )
        .await;

    diagnostics.shutdown();

    println!();
    println!("{}", "Instrumentation".bright_blue().bold());
    print!("{}", diagnostics.metrics().snapshot().format_report());

    match order {
        Ok(id) => {
            println!("{} order {} completed", "✓".green(), id);
            Ok(())
        }
        Err(err) => anyhow::bail!("checkout failed: {err}"),
    }
}
