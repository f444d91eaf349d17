//! Rotary phone daemon
//!
//! Runs the phone prop on real hardware (sysfs GPIO, default audio devices)
//! or, with `--simulate`, on in-memory pins driven from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use rotary_line::{LogEvents, Phone, PhoneConfig, PhonePins, SimulatedPhone};
use rotary_voice::AudioBackends;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pause after each simulated digit, longer than the pulse gap.
const SIMULATED_DIGIT_SETTLE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "rotary-daemon")]
#[command(about = "Rotary telephone prop controller")]
#[command(version)]
struct Args {
    /// Config file (TOML). Defaults to $PHONE_CONFIG or config/phone.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use in-memory pins driven by stdin commands instead of GPIO
    #[arg(long)]
    simulate: bool,

    /// Run without opening any audio device
    #[arg(long)]
    no_audio: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[rotary-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PhoneConfig::load_from(path),
        None => PhoneConfig::load(),
    }
    .context("loading phone configuration")?;

    let backends = if args.no_audio {
        AudioBackends::default()
    } else {
        tokio::task::spawn_blocking(AudioBackends::detect).await?
    };

    let simulated = args.simulate.then(SimulatedPhone::new);
    let pins = match &simulated {
        Some(sim) => sim.pins(),
        None => PhonePins::sysfs(&config.pins).context("exporting GPIO pins")?,
    };

    tracing::info!(
        simulate = args.simulate,
        assets = %config.audio.assets_dir.display(),
        "Rotary phone starting"
    );
    let phone = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            Phone::start(&config, pins, backends, Arc::new(LogEvents))
        })
        .await??
    };
    tracing::info!("We're up...");

    match simulated {
        Some(sim) => run_simulation(&phone, sim).await?,
        None => wait_for_shutdown().await,
    }

    tokio::task::spawn_blocking(move || phone.shutdown()).await?;
    tracing::info!("Shutdown tasks complete.");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; waiting for CTRL-C only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("CTRL-C received; shutting down"),
            _ = term.recv() => tracing::info!("SIGTERM received; shutting down"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("CTRL-C received; shutting down");
    }
}

/// Read commands from stdin until `quit`, EOF or a shutdown signal.
async fn run_simulation(phone: &Phone, sim: SimulatedPhone) -> Result<()> {
    println!("simulation commands: up | down | dial <digits> | ring | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("up"), _) => sim.lift(),
            (Some("down"), _) => sim.hang_up(),
            (Some("dial"), Some(number)) => {
                let sim = sim.clone();
                let number = number.to_string();
                tokio::task::spawn_blocking(move || {
                    sim.dial_number(&number, SIMULATED_DIGIT_SETTLE)
                })
                .await?;
            }
            (Some("ring"), _) => phone.ring(),
            (Some("quit"), _) => break,
            (Some("status"), _) => println!(
                "hook={} dialing={:?} ringing={}",
                phone.hook().get(),
                phone.dial().digits(),
                phone.is_ringing()
            ),
            (None, _) => {}
            (Some(other), _) => println!("unknown command: {}", other),
        }
    }
    Ok(())
}
