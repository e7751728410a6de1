//! RetroPie status display daemon.
//!
//! Shows the running game, the playing track and system stats on a 128x64
//! OLED, paging automatically and on joystick input.
//!
//! # Usage
//!
//! ```bash
//! # On the Pi, with the panel on /dev/i2c-1
//! retropanel --config /etc/retropanel.toml
//!
//! # Anywhere else: frames go to the log, keys on stdin stand in for buttons
//! RUST_LOG=debug retropanel --headless
//! ```

#[cfg(feature = "hardware")]
mod hardware;
mod headless;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use retropanel_core::{
    Brightness, Config, EdgeSource, InputDispatcher, LineReader, LongPress, MainLoop,
    PageController, PowerControl, Providers, SharedPanel,
};

/// RetroPie status display
#[derive(Parser)]
#[command(name = "retropanel")]
#[command(version)]
#[command(about = "Game, media and system stats on a RetroPie status OLED")]
struct Cli {
    /// Configuration file (TOML). Defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log frames instead of driving the panel, read buttons from stdin
    #[arg(long)]
    headless: bool,

    /// Seconds between automatic page changes (overrides the config file)
    #[arg(long, value_name = "SECS")]
    page_interval: Option<u64>,

    /// Only change pages on joystick input
    #[arg(long)]
    no_auto_page: bool,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,

    /// I2C bus the panel is on
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c_bus: PathBuf,

    /// GPIO character device the buttons are on
    #[arg(long, default_value = "/dev/gpiochip0")]
    gpio_chip: PathBuf,
}

/// Hardware the rest of the daemon runs against.
struct Devices {
    panel: SharedPanel,
    edges: Box<dyn EdgeSource>,
    lines: Arc<dyn LineReader>,
    power: Arc<dyn PowerControl>,
    /// Feeds stdin keys to the edge source in headless mode.
    keyboard: Option<headless::Keyboard>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(secs) = cli.page_interval {
        config.paging.interval_secs = secs;
    }
    if cli.no_auto_page {
        config.paging.enabled = false;
    }

    let mut devices = open_devices(&cli)?;

    let controller = Arc::new(PageController::new(
        Arc::clone(&devices.panel),
        Providers::system(),
        config.render.clone(),
    ));
    let brightness = Arc::new(
        Brightness::new(config.brightness.levels.clone(), Arc::clone(&devices.panel))
            .context("Invalid brightness levels")?,
    );
    if let Err(e) = brightness.apply() {
        warn!("could not set initial brightness: {}", e);
    }

    let dispatcher = Arc::new(InputDispatcher::new(
        Arc::clone(&controller),
        brightness,
        Arc::clone(&devices.power),
        Arc::clone(&devices.lines),
        LongPress::new(config.input.hold_poll()),
    ));
    dispatcher
        .register_all(&mut *devices.edges, &config.pins, config.input.debounce())
        .context("Failed to register input lines")?;

    let main_loop = MainLoop::new(Arc::clone(&controller), config.paging.clone());
    let token = main_loop.shutdown_token();
    ctrlc::set_handler(move || {
        info!("signal received, shutting down");
        token.cancel();
    })
    .context("Failed to set signal handler")?;

    if let Some(keyboard) = devices.keyboard.take() {
        keyboard
            .spawn(main_loop.shutdown_token())
            .context("Failed to start keyboard reader")?;
    }

    main_loop.run()?;
    devices.edges.release();

    info!("stopped");
    Ok(())
}

fn open_devices(cli: &Cli) -> Result<Devices> {
    if cli.headless {
        return Ok(headless::devices());
    }
    hardware_devices(cli)
}

#[cfg(feature = "hardware")]
fn hardware_devices(cli: &Cli) -> Result<Devices> {
    use retropanel_core::{SystemPower, share_panel};

    let panel = hardware::Ssd1306Panel::open(&cli.i2c_bus)
        .with_context(|| format!("Failed to open panel on {}", cli.i2c_bus.display()))?;
    let edges = hardware::GpioEdgeSource::open(&cli.gpio_chip)
        .with_context(|| format!("Failed to open {}", cli.gpio_chip.display()))?;
    let lines: Arc<dyn LineReader> = edges.levels();
    Ok(Devices {
        panel: share_panel(panel),
        edges: Box::new(edges),
        lines,
        power: Arc::new(SystemPower),
        keyboard: None,
    })
}

#[cfg(not(feature = "hardware"))]
fn hardware_devices(cli: &Cli) -> Result<Devices> {
    warn!(
        "built without the hardware feature, ignoring {} and {} and running headless",
        cli.i2c_bus.display(),
        cli.gpio_chip.display()
    );
    Ok(headless::devices())
}
