//! CLI Entry Point for daq-unwrap
//!
//! Feeds samples from a file or stdin through an `UnwrapComponent` and prints the
//! unwrapped sequence, one value per line.
//!
//! # Usage
//!
//! Unwrap a phase ramp:
//! ```bash
//! daq-unwrap unwrap --input phase.txt
//! ```
//!
//! Unwrap the phase of interleaved complex samples read from stdin:
//! ```bash
//! cat iq.txt | daq-unwrap unwrap --complex --cx-operator phase
//! ```
//!
//! Show the effective configuration:
//! ```bash
//! daq-unwrap show-config --config config/default.toml
//! ```

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use daq_unwrap::config::{UnwrapConfig, DEFAULT_CONFIG_PATH};
use daq_unwrap::core::{OutputEvent, SampleMode, Sri};
use daq_unwrap::{logging, UnwrapComponent};
use figment::providers::Serialized;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "daq-unwrap")]
#[command(about = "Streaming phase/value unwrapper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unwrap samples from a file (or stdin) and print the result
    Unwrap {
        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input file of whitespace or comma separated floats; stdin if omitted
        #[arg(long)]
        input: Option<PathBuf>,

        /// Treat input as interleaved real/imaginary pairs
        #[arg(long)]
        complex: bool,

        /// Stream identifier
        #[arg(long, default_value = "cli")]
        stream_id: String,

        /// Samples per batch
        #[arg(long, default_value = "1024")]
        batch_size: usize,

        /// First wrap bound
        #[arg(long, allow_hyphen_values = true)]
        val1: Option<f32>,

        /// Second wrap bound
        #[arg(long, allow_hyphen_values = true)]
        val2: Option<f32>,

        /// Complex reduction: phase, abs, norm, real or imag
        #[arg(long)]
        cx_operator: Option<String>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Print the effective configuration as TOML
    ShowConfig {
        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

struct UnwrapArgs {
    input: Option<PathBuf>,
    complex: bool,
    stream_id: String,
    batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Unwrap {
            config,
            input,
            complex,
            stream_id,
            batch_size,
            val1,
            val2,
            cx_operator,
            log_level,
        } => {
            let mut figment = UnwrapConfig::figment(config_path(config));
            if let Some(val1) = val1 {
                figment = figment.merge(Serialized::default("properties.val1", val1));
            }
            if let Some(val2) = val2 {
                figment = figment.merge(Serialized::default("properties.val2", val2));
            }
            if let Some(cx_operator) = cx_operator {
                figment = figment.merge(Serialized::default("properties.cx_operator", cx_operator));
            }
            if let Some(log_level) = log_level {
                figment = figment.merge(Serialized::default("application.log_level", log_level));
            }
            let config: UnwrapConfig = figment.extract().context("Failed to load configuration")?;
            config.validate()?;
            logging::init_from_config(&config)?;

            let args = UnwrapArgs {
                input,
                complex,
                stream_id,
                batch_size,
            };
            run_unwrap(&config, args).await
        }
        Commands::ShowConfig { config } => {
            let config = UnwrapConfig::load_from(config_path(config))?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn config_path(config: Option<PathBuf>) -> PathBuf {
    config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

async fn run_unwrap(config: &UnwrapConfig, args: UnwrapArgs) -> Result<()> {
    if args.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }

    let text = match &args.input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };
    let samples = parse_samples(&text)?;
    info!(
        samples = samples.len(),
        stream_id = %args.stream_id,
        complex = args.complex,
        "Input loaded"
    );

    let mut component = UnwrapComponent::new(config)?;
    let output = component.output();
    let input = component.input();

    let collector = {
        let mut events = output.subscribe();
        let stream_id = args.stream_id.clone();
        tokio::spawn(async move {
            let mut values = Vec::new();
            loop {
                match events.recv().await {
                    Ok(OutputEvent::Packet(packet)) if packet.stream_id == stream_id => {
                        values.extend_from_slice(&packet.data);
                        if packet.eos {
                            return Ok(values);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        bail!("Output consumer lagged; {} events lost", skipped)
                    }
                    Err(RecvError::Closed) => bail!("Output port closed before end of stream"),
                }
            }
        })
    };

    component.start()?;

    let mode = if args.complex {
        SampleMode::Complex
    } else {
        SampleMode::Real
    };
    input.push_sri(Sri::new(args.stream_id.clone()).with_mode(mode));

    let floats_per_batch = if args.complex {
        args.batch_size * 2
    } else {
        args.batch_size
    };
    let batches: Vec<&[f32]> = samples.chunks(floats_per_batch).collect();
    if batches.is_empty() {
        input.push_packet(Vec::new(), Utc::now(), true, args.stream_id.as_str());
    }
    for (index, batch) in batches.iter().enumerate() {
        // Hold back rather than let the input port flush queued batches.
        input.wait_for_space().await;
        let eos = index + 1 == batches.len();
        debug!(batch = index, len = batch.len(), eos, "Pushing batch");
        input.push_packet(batch.to_vec(), Utc::now(), eos, args.stream_id.as_str());
    }

    let values = collector.await??;
    component.stop().await?;

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for value in &values {
        writeln!(out, "{}", value)?;
    }
    out.flush()?;

    info!(values = values.len(), "Unwrap complete");
    Ok(())
}

fn parse_samples(text: &str) -> Result<Vec<f32>> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f32>()
                .with_context(|| format!("Invalid sample '{}'", token))
        })
        .collect()
}
