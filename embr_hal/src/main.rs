//! # EMBR HAL Binary
//!
//! Command-line front end to the resource broker: host detection, the
//! active board's pin table, and one-shot GPIO and LED operations.
//!
//! # Usage
//!
//! ```bash
//! # Which board is this?
//! embr_hal detect
//!
//! # Pin table of a board other than the one we run on
//! embr_hal --host "Raspberry Pi" --revision 2 pins --json
//!
//! # Drive a pin, then watch another until Ctrl-C
//! embr_hal gpio write P9_12 1
//! embr_hal -v gpio watch GPIO_17 --edge rising
//!
//! # User LEDs
//! embr_hal led toggle USR0
//! ```

use clap::{Parser, Subcommand};
use embr_common::config::{ConfigError, ConfigLoader, HalConfig, HostOverride, LogLevel};
use embr_common::consts::DEFAULT_CONFIG_PATH;
use embr_common::hal::pin::{self, Direction, Edge};
use embr_common::host::Host;
use embr_hal::{HalCore, HostRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// EMBR HAL - capability-keyed hardware resource broker
#[derive(Parser, Debug)]
#[command(name = "embr_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Capability-keyed hardware resource broker for embedded Linux boards")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file. A missing default file means defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip detection and use this board (for example "BeagleBone Black" or "rpi")
    #[arg(long, value_name = "NAME")]
    host: Option<String>,

    /// Board revision used with --host
    #[arg(long, default_value_t = 0, requires = "host")]
    revision: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and listings in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the running board
    Detect,
    /// List the capability map of the active board
    Pins,
    /// Print the effective configuration as TOML
    Config,
    /// Digital pin operations
    Gpio {
        #[command(subcommand)]
        action: GpioAction,
    },
    /// LED operations
    Led {
        #[command(subcommand)]
        action: LedAction,
    },
}

#[derive(Subcommand, Debug)]
enum GpioAction {
    /// Sample a pin
    Read {
        /// Pin id, alias or number
        key: String,
    },
    /// Drive a pin
    Write {
        /// Pin id, alias or number
        key: String,
        /// Level to drive
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        value: u8,
    },
    /// Log edges of a pin until Ctrl-C
    Watch {
        /// Pin id, alias or number
        key: String,
        /// Edge to trigger on
        #[arg(long, default_value = "both")]
        edge: Edge,
    },
}

#[derive(Subcommand, Debug)]
enum LedAction {
    /// Switch on
    On {
        /// LED id or alias
        key: String,
    },
    /// Switch off
    Off {
        /// LED id or alias
        key: String,
    },
    /// Invert the current state
    Toggle {
        /// LED id or alias
        key: String,
    },
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("FATAL: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args);
    let level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);
    let mut config = config?;

    if let Some(name) = &args.host {
        config.host = Some(HostOverride {
            name: Host::from(name.as_str()),
            revision: args.revision,
        });
    }
    config.validate()?;

    info!("EMBR HAL v{} ({})", env!("CARGO_PKG_VERSION"), config.shared.service_name);
    let core = HalCore::from_config(HostRegistry::with_builtin_hosts(), &config);

    let result = match args.command {
        Command::Detect => detect(&core),
        Command::Pins => pins(&core, args.json),
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Gpio { action } => gpio(&core, action),
        Command::Led { action } => led(&core, action),
    };

    if let Err(e) = core.close() {
        warn!("Shutdown incomplete: {e}");
    }
    result
}

/// Load the configuration file.
///
/// An explicit `--config` must exist. The default path is optional.
fn load_config(args: &Args) -> Result<HalConfig, ConfigError> {
    match &args.config {
        Some(path) => HalConfig::load(path),
        None => match HalConfig::load(std::path::Path::new(DEFAULT_CONFIG_PATH)) {
            Err(ConfigError::FileNotFound) => Ok(HalConfig::default()),
            other => other,
        },
    }
}

fn detect(core: &HalCore) -> Result<(), Box<dyn std::error::Error>> {
    let (host, revision) = core.detect_host()?;
    println!("{host} (revision {revision:#x})");
    let (effective, effective_rev) = core.host()?;
    if effective != host || effective_rev != revision {
        println!("overridden by configuration: {effective} (revision {effective_rev:#x})");
    }
    Ok(())
}

fn pins(core: &HalCore, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    core.init_gpio()?;
    let gpio = core.gpio()?;
    let map = gpio.pin_map();

    if json {
        println!("{}", serde_json::to_string_pretty(map)?);
        return Ok(());
    }

    let (host, revision) = core.host()?;
    println!("{host} (revision {revision:#x}): {} pins", map.len());
    for pd in map.iter() {
        println!(
            "{:<8} d={:<4} a={:<3} {:<24} {}",
            pd.id,
            pd.digital_logical,
            pd.analog_logical,
            format!("{:?}", pd.caps),
            pd.aliases.join(", ")
        );
    }
    Ok(())
}

fn gpio(core: &HalCore, action: GpioAction) -> Result<(), Box<dyn std::error::Error>> {
    core.init_gpio()?;
    match action {
        GpioAction::Read { key } => {
            core.set_direction(key.as_str(), Direction::In)?;
            println!("{}", core.digital_read(key.as_str())?);
        }
        GpioAction::Write { key, value } => {
            core.set_direction(key.as_str(), Direction::Out)?;
            core.digital_write(key.as_str(), pin::Level::from(value == 1))?;
        }
        GpioAction::Watch { key, edge } => watch(core, &key, edge)?,
    }
    Ok(())
}

fn watch(core: &HalCore, key: &str, edge: Edge) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    core.set_direction(key, Direction::In)?;
    core.watch(key, edge, |pin| match pin.read() {
        Ok(level) => info!("{}: edge, level {}", pin.id(), level),
        Err(e) => warn!("{}: edge, read failed: {}", pin.id(), e),
    })?;
    info!("Watching {key} for {} edges, Ctrl-C to stop", edge.as_str());

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    core.stop_watching(key)?;
    Ok(())
}

fn led(core: &HalCore, action: LedAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        LedAction::On { key } => core.led_on(key)?,
        LedAction::Off { key } => core.led_off(key)?,
        LedAction::Toggle { key } => core.led_toggle(key)?,
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
