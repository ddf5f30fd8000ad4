//! serial-relay entry point.
//!
//! Parses the command line, loads the configuration, installs logging and
//! hands over to the relay coordinator for the selected variant.
//!
//! ```text
//! main()
//!  ├─ list     -- print serial adapters
//!  ├─ config   -- print the effective configuration
//!  ├─ console  -- one device, typed lines out, text in
//!  └─ keys     -- two devices, held keys out, status reports in
//! ```
//!
//! Inbound device text goes to stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use serial_relay::application::lifecycle::{open_links, LinkPlan, Relay, RelayReport, Variant};
use serial_relay::infrastructure::input::console::ConsoleInput;
use serial_relay::infrastructure::input::keyboard::TerminalKeyboard;
use serial_relay::infrastructure::output::{ConsoleSink, CrlfWriter, RawTerminalSink};
use serial_relay::infrastructure::prompt;
use serial_relay::infrastructure::serial::{list_ports, SystemPortOpener};
use serial_relay::infrastructure::storage::config::{
    load_config, load_config_from, ConfigError, RelayConfig,
};
use serial_relay_core::RunState;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relays operator input to a serial device and prints what it sends back.
#[derive(Debug, Parser)]
#[command(
    name = "serial-relay",
    about = "Duplex serial relay: operator commands out, device text in",
    version
)]
struct Cli {
    /// Path to a TOML config file. Defaults to the platform config directory.
    #[arg(long, global = true, env = "SERIAL_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset. Overrides `logging.level`.
    #[arg(long, global = true, env = "SERIAL_RELAY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the serial ports the OS knows about.
    List,

    /// Print the effective configuration as TOML.
    Config,

    /// Relay typed lines over one bidirectional port.
    ///
    /// Type a command and press Enter; `exit` quits.
    Console {
        /// Device to open. Prompts after listing ports when absent.
        #[arg(long, env = "SERIAL_RELAY_DEVICE")]
        device: Option<String>,
    },

    /// Relay held keys over a pair of one-way ports.
    ///
    /// w/a/s/d drive, 7/8/0 set speed, e requests a distance reading.
    /// Esc or Ctrl-C quits.
    Keys {
        /// Device the status reports arrive on.
        #[arg(long, env = "SERIAL_RELAY_INBOUND")]
        inbound: Option<String>,

        /// Device the commands are written to.
        #[arg(long, env = "SERIAL_RELAY_OUTBOUND")]
        outbound: Option<String>,
    },
}

fn load(path: Option<&PathBuf>) -> anyhow::Result<RelayConfig> {
    match path {
        Some(path) => load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => match load_config() {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NoPlatformConfigDir) => Ok(RelayConfig::default()),
            Err(e) => Err(e).context("failed to load config"),
        },
    }
}

/// Installs the stderr subscriber.
///
/// With `raw_terminal` set, line endings are written as `\r\n` so log lines
/// stay readable while the keyboard holds the terminal in raw mode.
fn init_logging(level: &str, raw_terminal: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if raw_terminal {
        builder.with_writer(CrlfWriter::stderr).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
}

/// Clears `run_state` on Ctrl-C.
///
/// In raw mode the terminal delivers Ctrl-C as a key instead, which the
/// keyboard input turns into a terminate request.
fn spawn_ctrl_c_handler(run_state: RunState) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C, stopping relay");
                run_state.stop();
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load(cli.config.as_ref())?;
    init_logging(
        cli.log_level.as_deref().unwrap_or(&cfg.logging.level),
        matches!(cli.command, Commands::Keys { .. }),
    );

    match cli.command {
        Commands::List => {
            let ports = list_ports()?;
            prompt::print_listing(&mut std::io::stdout().lock(), &ports)?;
            Ok(())
        }
        Commands::Config => {
            print!("{}", cfg.to_toml()?);
            Ok(())
        }
        Commands::Console { device } => run_console(&cfg, device).await,
        Commands::Keys { inbound, outbound } => run_keys(&cfg, inbound, outbound).await,
    }
}

async fn run_console(cfg: &RelayConfig, device: Option<String>) -> anyhow::Result<()> {
    let device = match device.or_else(|| cfg.ports.device.clone()) {
        Some(device) => device,
        None => tokio::task::spawn_blocking(prompt::choose_device)
            .await?
            .context("failed to read the device name")?
            .context("no serial port selected")?,
    };

    let serial = cfg.serial_config(&device)?;
    let links = open_links(&SystemPortOpener, &LinkPlan::Shared(serial))
        .with_context(|| format!("cannot start relay on {device}"))?;
    let mut input = ConsoleInput::stdin()?;

    let run_state = RunState::new();
    spawn_ctrl_c_handler(run_state.clone());
    println!("Connected to {device}. Type a command and press Enter; `exit` quits.");

    let relay = Relay::new(run_state, cfg.relay_settings(Variant::Console));
    let report = relay.run(links, Box::new(ConsoleSink), &mut input).await?;
    log_report(&report);
    Ok(())
}

async fn run_keys(
    cfg: &RelayConfig,
    inbound: Option<String>,
    outbound: Option<String>,
) -> anyhow::Result<()> {
    let inbound = inbound
        .or_else(|| cfg.ports.inbound.clone())
        .context("no inbound device: pass --inbound or set ports.inbound")?;
    let outbound = outbound
        .or_else(|| cfg.ports.outbound.clone())
        .context("no outbound device: pass --outbound or set ports.outbound")?;

    let plan = LinkPlan::Split {
        inbound: cfg.serial_config(&inbound)?,
        outbound: cfg.serial_config(&outbound)?,
    };
    let links = open_links(&SystemPortOpener, &plan)
        .with_context(|| format!("cannot start relay on {inbound} / {outbound}"))?;

    println!("Hold w/a/s/d to drive, 7/8/0 for speed, e for distance. Esc quits.");
    let run_state = RunState::new();
    spawn_ctrl_c_handler(run_state.clone());

    let report = {
        let mut keyboard = TerminalKeyboard::open(cfg.key_hold())?;
        let relay = Relay::new(run_state, cfg.relay_settings(Variant::Keys));
        relay
            .run(links, Box::new(RawTerminalSink::new()), &mut keyboard)
            .await?
    };
    log_report(&report);
    Ok(())
}

fn log_report(report: &RelayReport) {
    info!(
        "sent {} bytes in {} cycles ({} write failures); received {} bytes ({} undecodable chunks)",
        report.send.bytes_written,
        report.send.cycles,
        report.send.write_failures,
        report.receive.bytes_received,
        report.receive.decode_failures
    );
}

// ── Tests ─────────────────────────────────────────────────────────────────────
