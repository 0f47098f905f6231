//! Cryostation command-line client.
//!
//! # Usage
//!
//! ```bash
//! # One-shot instrument snapshot
//! cryostation --host cryostation-127 status
//!
//! # Periodic user-temperature readout until ctrl-c
//! cryostation --host cryostation-127 monitor --rate-ms 500
//!
//! # Change the setpoint and wait for thermal stability
//! cryostation --host cryostation-127 set-temp 5.0
//! ```
//!
//! # Environment Variables
//!
//! - `CRYOSTATION_CONFIG`: path to a TOML config file
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cryostation::commands::Reading;
use cryostation::pipeline::{PeriodicSampler, SampleSource};
use cryostation::sample::Field;
use cryostation::{set_temperature_and_wait_stable, Config, CryostationClient};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cryostation")]
#[command(about = "Cryostat instrument client")]
#[command(version)]
struct CliArgs {
    /// Instrument hostname (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Instrument TCP port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Path to a TOML config file (otherwise CRYOSTATION_CONFIG,
    /// then ./cryostation.toml, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit JSON lines instead of human-readable output
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Print a one-shot snapshot of instrument state
    Status,

    /// Periodically sample user temperature until interrupted
    Monitor {
        /// Sample interval in milliseconds (overrides config)
        #[arg(long)]
        rate_ms: Option<u64>,
    },

    /// Change the temperature setpoint and wait for thermal stability
    SetTemp {
        /// Target temperature (K)
        target: f64,
    },

    /// Start a cooldown cycle
    Cooldown,

    /// Start a warmup cycle
    Warmup,

    /// Enter standby
    Standby,

    /// Reset PID control parameters to firmware defaults
    ResetPid,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut config = match args.config {
        Some(ref path) => Config::load_from_file(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(host) = args.host {
        config.connection.host = host;
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    match args.command {
        SubCommand::Status => run_status(&config, args.json).await,
        SubCommand::Monitor { rate_ms } => run_monitor(&config, rate_ms, args.json, cancel).await,
        SubCommand::SetTemp { target } => run_set_temp(&config, target, args.json, cancel).await,
        SubCommand::Cooldown => run_action(&config, InstrumentAction::Cooldown).await,
        SubCommand::Warmup => run_action(&config, InstrumentAction::Warmup).await,
        SubCommand::Standby => run_action(&config, InstrumentAction::Standby).await,
        SubCommand::ResetPid => run_action(&config, InstrumentAction::ResetPid).await,
    }
}

// ============================================================================
// Subcommands
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum InstrumentAction {
    Cooldown,
    Warmup,
    Standby,
    ResetPid,
}

async fn run_action(config: &Config, action: InstrumentAction) -> Result<()> {
    let mut client = CryostationClient::connect(config.connection.clone())
        .await
        .context("connecting to instrument")?;

    let result = match action {
        InstrumentAction::Cooldown => client.start_cooldown().await,
        InstrumentAction::Warmup => client.start_warmup().await,
        InstrumentAction::Standby => client.start_standby().await,
        InstrumentAction::ResetPid => client.reset_pid().await,
    };
    client.close().await;

    result.with_context(|| format!("sending {action:?} command"))?;
    info!(action = ?action, "Command acknowledged");
    Ok(())
}

async fn run_status(config: &Config, json: bool) -> Result<()> {
    let mut client = CryostationClient::connect(config.connection.clone())
        .await
        .context("connecting to instrument")?;

    let snapshot = client.snapshot().await;
    client.close().await;
    let snapshot = snapshot.context("reading instrument state")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("alarm:                {}", snapshot.alarm_state);
        println!("chamber pressure:     {:.3}", snapshot.chamber_pressure);
        println!(
            "platform:             {:.4} K (stability {:.4} K, setpoint {:.4} K)",
            snapshot.platform_temperature, snapshot.platform_stability, snapshot.platform_setpoint
        );
        println!(
            "sample:               {:.4} K (stability {:.4} K)",
            snapshot.sample_temperature, snapshot.sample_stability
        );
        println!(
            "user:                 {:.4} K (stability {:.4} K, stage setpoint {:.4} K)",
            snapshot.user_temperature, snapshot.user_stability, snapshot.user_stage_setpoint
        );
    }
    Ok(())
}

async fn run_monitor(
    config: &Config,
    rate_ms: Option<u64>,
    json: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let client = CryostationClient::connect(config.connection.clone())
        .await
        .context("connecting to instrument")?;

    let rate = rate_ms.unwrap_or(config.sampling.sample_rate_ms);
    let mut sampler = PeriodicSampler::new(
        client,
        vec![Reading::UserTemperature],
        rate,
        config.sampling.on_tick_failure,
    );
    info!(rate_ms = rate, "Monitoring user temperature");

    let outcome = loop {
        let sample = tokio::select! {
            biased;
            () = cancel.cancelled() => break Ok(()),
            result = sampler.next_sample() => match result {
                Ok(sample) => sample,
                Err(e) => break Err(e),
            },
        };

        if json {
            println!("{}", serde_json::to_string(&sample)?);
        } else {
            let delta = sample.get(Field::DeltaTime).unwrap_or_default();
            let temperature = sample.get(Field::UserTemperature).unwrap_or_default();
            println!("t=+{delta:8.1}s  user_temperature={temperature:.4} K");
        }
    };

    let mut client = sampler.into_client();
    let stats = client.stats();
    client.close().await;
    info!(
        commands_sent = stats.commands_sent,
        timeouts = stats.timeouts,
        "Monitor session ended"
    );
    outcome.context("sampling user temperature")
}

async fn run_set_temp(
    config: &Config,
    target: f64,
    json: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let client = CryostationClient::connect(config.connection.clone())
        .await
        .context("connecting to instrument")?;

    let verdict = set_temperature_and_wait_stable(
        client,
        target,
        &config.sampling,
        &config.stability,
        cancel,
    )
    .await
    .context("waiting for thermal stability")?;

    match verdict {
        Some(verdict) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!(
                    "stable at setpoint {target:.4} K (mean stability {:.4} K)",
                    verdict.stability_mean
                );
            }
        }
        None => {
            warn!("Cancelled before the setpoint stabilised");
        }
    }
    Ok(())
}
