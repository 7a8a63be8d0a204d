//! Binary entrypoint for the Simtrack CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `probe [--port <path>]` - initialise the modem, bring the bearer up, print JSON status
//! - `send --lat <deg> --lon <deg> [--speed <kmh>] [--heading <deg>]` - deliver one record
//! - `shutdown [--port <path>]` - shut the modem's IP context
//!
//! See the library crate docs for module-level details: `simtrack::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use simtrack::config::Config;

#[derive(Parser)]
#[command(name = "simtrack")]
#[command(about = "Cellular telemetry uplink for SIM800-class modems")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Initialise the modem and bring the bearer up; prints a JSON status line
    Probe {
        /// Modem serial port (overrides config)
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Deliver one telemetry record
    Send {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Speed over ground in km/h
        #[arg(long)]
        speed: Option<f64>,
        /// Course over ground in degrees
        #[arg(long)]
        heading: Option<f64>,
        /// Modem serial port (overrides config)
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Shut the modem's IP context
    Shutdown {
        /// Modem serial port (overrides config)
        #[arg(short, long)]
        port: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);
    info!("Starting Simtrack v{}", env!("CARGO_PKG_VERSION"));

    #[cfg(not(feature = "serial"))]
    {
        let _ = config;
        log::error!("This command requires the 'serial' feature");
        std::process::exit(2);
    }

    #[cfg(feature = "serial")]
    {
        use simtrack::modem::{Modem, SerialChannel};
        use simtrack::telemetry::{Fix, FixProvider, ManualFix};

        let open = |port: Option<String>| {
            let port = port.unwrap_or_else(|| config.modem.port.clone());
            let baud = config.modem.baud_rate;
            async move { SerialChannel::open(&port, baud).await }
        };

        match cli.command {
            Commands::Init => unreachable!("handled above"),
            Commands::Probe { port } => {
                let mut modem = Modem::from_config(open(port).await?, &config);
                let result = match modem.initialize().await {
                    Ok(()) => modem.bring_up_bearer().await,
                    Err(e) => Err(e),
                };
                let ok = result.is_ok();
                let payload = serde_json::json!({
                    "status": if ok { "ok" } else { "failed" },
                    "bearer": modem.bearer_state().to_string(),
                    "ip": result.as_ref().ok().map(|ip| ip.to_string()),
                    "error": result.as_ref().err().map(|e| e.to_string()),
                    "metrics": simtrack::metrics::snapshot(),
                });
                println!("{}", payload);
                std::process::exit(if ok { 0 } else { 1 });
            }
            Commands::Send {
                lat,
                lon,
                speed,
                heading,
                port,
            } => {
                let provider = ManualFix {
                    location: Some((lat, lon)),
                    speed_kmh: speed,
                    heading_deg: heading,
                };
                let fix = match Fix::from_provider(&provider) {
                    Some(fix) if provider.has_fresh_fix() => fix,
                    _ => anyhow::bail!("no location to send"),
                };
                let mut modem = Modem::from_config(open(port).await?, &config);
                modem.initialize().await?;
                modem
                    .send_telemetry(&config.device.identity(), &fix)
                    .await?;
                info!("Telemetry delivered to {}:{}", config.server.host, config.server.port);
            }
            Commands::Shutdown { port } => {
                let mut modem = Modem::from_config(open(port).await?, &config);
                let outcome = modem.shutdown_bearer().await?;
                info!("IP context shut: {:?}", outcome);
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins; otherwise the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    let file = log_file.and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Mirror to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
