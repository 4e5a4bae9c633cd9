// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bullion: secure vault telemetry
//
// Entry point. Initialises logging, loads configuration, and dispatches to
// key generation, the simulated gateway, offline verification, or the event
// log viewer.

mod services;
mod simulator;

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use bullion_core::config::PayloadSchema;
use bullion_core::error::Result;
use bullion_core::types::{Location, SecurePacket};
use bullion_core::MonitorConfig;
use bullion_security::signing::DEFAULT_KEY_BITS;
use bullion_security::{DigestSigner, PemKeyDirectory, SymmetricKey};
use chrono::Utc;
use clap::{Parser, Subcommand};

use services::app_services::AppServices;
use simulator::{Scenario, SensorSimulator, UnitProfile};

/// Fallback position of the simulated vault when no geofence is configured.
const DEFAULT_VAULT_LOCATION: Location = Location {
    gps_lat: 51.5074,
    gps_lon: -0.1278,
};

#[derive(Parser, Debug)]
#[command(name = "bullion", version, about = "Secure telemetry and breach classification for monitored gold bars")]
struct Cli {
    /// JSON configuration file. Missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = "bullion.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an RSA signing keypair and a shared AES-256 key.
    Keygen {
        /// Output directory; defaults to the configured key directory.
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
        /// Write the shared key here instead of printing it.
        #[arg(long, value_name = "PATH")]
        shared_key_out: Option<PathBuf>,
    },
    /// Run simulated sensor readings through gateway, verifier, and engine.
    Simulate {
        #[arg(long, value_enum, default_value = "normal")]
        scenario: Scenario,
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Pause between readings.
        #[arg(long, value_name = "MS", default_value_t = 0)]
        interval_ms: u64,
    },
    /// Verify and classify one wire packet; prints `{status, reasons}`.
    Verify {
        /// Packet JSON file, or `-` for stdin.
        packet: PathBuf,
    },
    /// Show stored events, newest first.
    Events {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Only events for this bar, oldest first.
        #[arg(long, value_name = "BAR_ID")]
        bar: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "bullion failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = MonitorConfig::load(&cli.config)?;

    match cli.command {
        Commands::Keygen {
            dir,
            bits,
            shared_key_out,
        } => keygen(&config, dir, bits, shared_key_out),
        Commands::Simulate {
            scenario,
            count,
            interval_ms,
        } => simulate(config, scenario, count, Duration::from_millis(interval_ms)),
        Commands::Verify { packet } => verify(config, &packet),
        Commands::Events { limit, bar } => events(config, limit, bar.as_deref()),
    }
}

fn keygen(
    config: &MonitorConfig,
    dir: Option<PathBuf>,
    bits: usize,
    shared_key_out: Option<PathBuf>,
) -> Result<()> {
    let dir = dir.unwrap_or_else(|| config.key_dir.clone());
    tracing::info!(bits, dir = %dir.display(), "generating signing keypair");

    let signer = DigestSigner::generate(bits)?;
    PemKeyDirectory::new(&dir).write_keypair(&signer)?;

    let shared = SymmetricKey::generate()?;
    match shared_key_out {
        Some(path) => {
            std::fs::write(&path, shared.to_base64())?;
            tracing::info!(path = %path.display(), "shared key written");
        }
        None => println!("{}", shared.to_base64()),
    }
    Ok(())
}

fn simulate(config: MonitorConfig, scenario: Scenario, count: u32, interval: Duration) -> Result<()> {
    let location = match config.schema {
        PayloadSchema::Core => None,
        PayloadSchema::WithLocation => Some(
            config
                .policy
                .geofence
                .map(|fence| Location {
                    gps_lat: fence.latitude,
                    gps_lon: fence.longitude,
                })
                .unwrap_or(DEFAULT_VAULT_LOCATION),
        ),
    };

    let services = AppServices::init(config)?;
    let gateway = services.gateway()?;
    let unit = UnitProfile {
        location,
        ..UnitProfile::default()
    };
    let mut sensors = SensorSimulator::new(unit, rand::thread_rng());
    let mut first: Option<SecurePacket> = None;

    for i in 0..count {
        let packet = match (scenario, &first) {
            (Scenario::Replay, Some(original)) => original.clone(),
            _ => gateway.build(&sensors.reading(scenario, Utc::now()))?,
        };
        if first.is_none() {
            first = Some(packet.clone());
        }

        let outcome = services.ingest(&packet)?;
        tracing::info!(
            n = i + 1,
            ?scenario,
            bar_id = %sensors.unit().bar_id,
            status = %outcome.response.status,
            reasons = ?outcome.response.reasons,
            "reading classified"
        );
        println!("{}", serde_json::to_string(&outcome.response)?);

        if i + 1 < count && !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
    Ok(())
}

fn verify(config: MonitorConfig, path: &Path) -> Result<()> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    let packet: SecurePacket = serde_json::from_str(&raw)?;

    let services = AppServices::init(config)?;
    let outcome = services.ingest(&packet)?;
    println!("{}", serde_json::to_string_pretty(&outcome.response)?);
    Ok(())
}

fn events(config: MonitorConfig, limit: u32, bar: Option<&str>) -> Result<()> {
    let services = AppServices::init(config)?;
    let records = match bar {
        Some(bar_id) => services.events().events_for_bar(bar_id)?,
        None => services.events().recent(limit)?,
    };
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
