//! Nissan Ariya battery poller
//!
//! Connects to an ELM327 WiFi adapter and reports the 12V battery voltage,
//! traction battery SOC and HV pack voltage, either once or on a schedule.
//!
//! Usage: cargo run -p ariya-poller-cli -- [OPTIONS] <COMMAND>

use anyhow::{bail, Context, Result};
use ariya_poller::maintenance::disable_power_saving;
use ariya_poller::{
    spawn_poller, Config, CycleOutcome, LogLevel, Metric, PollingEngine, TcpTransport,
};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ariya-poller", version)]
#[command(about = "Poll 12V, SOC and HV voltage of a Nissan Ariya through an ELM327 WiFi adapter")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Adapter IP address or host name (required without --config, overrides it otherwise)
    #[arg(long)]
    host: Option<String>,

    /// Adapter TCP port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Minutes between scheduled refreshes (default: every 60 seconds)
    #[arg(short, long)]
    interval_minutes: Option<u64>,

    /// Log level: off, error, warn, info or debug (RUST_LOG takes precedence)
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh on a schedule; press Enter to force a full SOC/HV read
    Run,
    /// Run a single refresh cycle and print the snapshot as JSON
    Once {
        /// Read SOC/HV even if the 12V reading says the car is asleep
        #[arg(short, long)]
        force: bool,
    },
    /// Turn off the adapter's power saving (applied after a power cycle)
    DisablePowerSaving,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match (&args.config, &args.host) {
        (Some(path), _) => Config::load(path)
            .with_context(|| format!("Could not load config {}", path.display()))?,
        (None, Some(host)) => Config::new(host.as_str()),
        (None, None) => bail!("No adapter address given; use --host or a --config file with elm_ip"),
    };

    if let Some(host) = &args.host {
        config.elm_ip.clone_from(host);
    }
    if let Some(port) = args.port {
        config.elm_port = port;
    }
    if let Some(minutes) = args.interval_minutes {
        config.scan_interval_minutes = Some(minutes);
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(level.as_level_filter())
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

fn new_engine(config: &Config) -> PollingEngine<TcpTransport> {
    PollingEngine::new(
        config.endpoint(),
        TcpTransport::new(config.timing.settle_delay()),
        config.timing,
    )
}

fn run_scheduled(config: &Config) -> Result<()> {
    let interval = config.poll_interval();
    info!(
        "Polling {} every {}s; press Enter to force a full read",
        config.endpoint(),
        interval.as_secs()
    );

    let handle = spawn_poller(new_engine(config), interval).context("Could not start poller")?;
    let snapshots = handle.subscribe();

    std::thread::scope(|s| {
        s.spawn(|| {
            for line in std::io::stdin().lock().lines() {
                if line.is_err() {
                    break;
                }
                handle.request_forced_refresh();
            }
        });

        for snapshot in snapshots.iter() {
            println!("{snapshot}");
        }
    });

    Ok(())
}

fn run_once(config: &Config, force: bool) -> Result<()> {
    let mut engine = new_engine(config);
    if force {
        engine.force_refresh();
    }

    let snapshot = engine.refresh();
    match engine.last_outcome() {
        CycleOutcome::Unreachable => warn!("Adapter {} unreachable", config.endpoint()),
        CycleOutcome::Failed(e) => warn!("Cycle failed: {e}"),
        CycleOutcome::Completed { full_read: false, .. } => {
            info!("SOC/HV not read; use --force to read them anyway");
        }
        _ => {}
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    for metric in Metric::ALL {
        if let Some(value) = snapshot.get(metric) {
            info!("{}: {value:.2}{}", metric.name(), metric.unit());
        }
    }
    if let Some(soc) = snapshot.corrected_soc() {
        info!("SOC (corrected): {soc:.2}%");
    }
    Ok(())
}

fn run_disable_power_saving(config: &Config) -> Result<()> {
    let transport = TcpTransport::new(config.timing.settle_delay());
    let replies = disable_power_saving(&transport, &config.endpoint(), &config.timing)
        .context("Could not program the adapter")?;

    for (command, reply) in replies {
        let reply = reply.unwrap_or_else(|| "<no reply>".to_string());
        println!("{command:<12} {}", reply.escape_debug());
    }
    println!("Done. Power-cycle the adapter to apply the new setting.");
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    init_logging(config.log_level);

    match args.command {
        Command::Run => run_scheduled(&config),
        Command::Once { force } => run_once(&config, force),
        Command::DisablePowerSaving => run_disable_power_saving(&config),
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
