//! specwatch CLI - watches OpenAPI documents and reports changes

use anyhow::Context;
use clap::Parser;
use specwatch_core::config::LoggingConfig;
use specwatch_core::format::{format_endpoint_list, format_history};
use specwatch_core::{BatchOutcome, Specwatch, SpecwatchConfig, Unsubscribed};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "specwatch")]
#[command(version, about = "specwatch - Change notifications for API specifications")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "specwatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Scan every minute until interrupted
    Run,
    /// Run one scan batch and print the report as JSON
    Scan,
    /// Subscribe a channel to an endpoint
    Add {
        /// URL serving the OpenAPI or Swagger JSON document
        url: String,
        /// Channel that receives notifications
        #[arg(long)]
        channel: String,
    },
    /// Unsubscribe a channel from an endpoint
    Rm {
        /// Monitored URL
        url: String,
        /// Channel to remove
        #[arg(long)]
        channel: String,
    },
    /// List monitored endpoints
    List {
        /// Only endpoints this channel subscribes to
        #[arg(long)]
        channel: Option<String>,
    },
    /// Show stored snapshots for an endpoint
    History {
        /// Monitored URL
        url: String,
    },
    /// Resume scanning an endpoint
    Enable {
        /// Monitored URL
        url: String,
    },
    /// Pause scanning an endpoint, keeping its subscribers
    Disable {
        /// Monitored URL
        url: String,
    },
    /// Check configuration validity and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = SpecwatchConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config.logging);

    if let Commands::CheckConfig = cli.command {
        println!("Configuration OK: {}", cli.config.display());
        println!();
        print!("{}", toml::to_string(&config)?);
        return Ok(());
    }

    let specwatch = Specwatch::new(config)?;

    match cli.command {
        Commands::Run => {
            info!("Press Ctrl-C to stop");
            specwatch
                .run(async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %err, "Cannot listen for Ctrl-C");
                    }
                })
                .await?;
        }
        Commands::Scan => match specwatch.scan_once().await {
            BatchOutcome::Completed(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            BatchOutcome::Skipped => println!("Scan skipped: a batch is already running"),
        },
        Commands::Add { url, channel } => {
            let endpoint = specwatch.subscribe(&url, &channel)?;
            println!(
                "Now monitoring {} for {} ({} subscriber(s))",
                endpoint.url,
                channel,
                endpoint.channels.len()
            );
        }
        Commands::Rm { url, channel } => match specwatch.unsubscribe(&url, &channel)? {
            Unsubscribed::NotSubscribed => {
                println!("{channel} is not subscribed to {url}");
            }
            Unsubscribed::ChannelRemoved => {
                println!("Stopped monitoring {url} for {channel}");
            }
            Unsubscribed::EndpointDeleted(_) => {
                println!("Stopped monitoring {url}; no subscribers left, history removed");
            }
        },
        Commands::List { channel } => {
            let endpoints = specwatch.list(channel.as_deref())?;
            println!("{}", format_endpoint_list(&endpoints));
        }
        Commands::History { url } => {
            let snapshots = specwatch.history(&url)?;
            println!("{}", format_history(&url, &snapshots));
        }
        Commands::Enable { url } => {
            specwatch.set_enabled(&url, true)?;
            println!("Scanning resumed for {url}");
        }
        Commands::Disable { url } => {
            specwatch.set_enabled(&url, false)?;
            println!("Scanning paused for {url}");
        }
        Commands::CheckConfig => {}
    }

    specwatch.flush()?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so command
/// output on stdout stays machine-readable.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
