use clap::Parser;
use orientation_tracker::TrackerConfig;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Streams integrated gyro orientation to a WebSocket host.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file; built-in defaults apply to missing keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket server host
    #[arg(long)]
    host: Option<String>,

    /// WebSocket server port
    #[arg(long)]
    port: Option<u16>,

    /// I2C bus device carrying both gyros
    #[arg(long)]
    i2c_bus: Option<String>,

    /// Do not stream; log tick throughput instead
    #[arg(long)]
    no_telemetry: bool,

    /// Do not log angles on every tick
    #[arg(long)]
    quiet_angles: bool,

    /// sysfs GPIO number of the reset button
    #[arg(long)]
    reset_gpio: Option<u32>,

    /// sysfs GPIO number of the reset indicator
    #[arg(long)]
    indicator_gpio: Option<u32>,
}

fn load_config(args: &Args) -> Result<TrackerConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig::default(),
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bus) = &args.i2c_bus {
        config.sensors.i2c_bus = bus.clone();
    }
    if args.no_telemetry {
        config.telemetry_enabled = false;
    }
    if args.quiet_angles {
        config.log_angles = false;
    }
    if args.reset_gpio.is_some() {
        config.reset.gpio = args.reset_gpio;
    }
    if args.indicator_gpio.is_some() {
        config.reset.indicator_gpio = args.indicator_gpio;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(target_os = "linux")]
fn run(config: TrackerConfig) -> Result<(), Box<dyn Error>> {
    use linux_mpu6050::Mpu6050Bus;
    use orientation_tracker::{
        MonotonicClock, NoTrigger, ResetTrigger, SysfsGpioTrigger, TickScheduler, WsTransport,
    };
    use std::sync::atomic::AtomicBool;

    let addresses = [
        config.sensors.primary.address,
        config.sensors.secondary.address,
    ];
    let bus = Mpu6050Bus::open(&config.sensors.i2c_bus, &addresses)?;
    info!(
        "MPU-6050 pair ready on {} at 0x{:02X}/0x{:02X}",
        config.sensors.i2c_bus, addresses[0], addresses[1]
    );

    let reset: Box<dyn ResetTrigger> = match config.reset.gpio {
        Some(pin) => Box::new(SysfsGpioTrigger::new(pin, config.reset.indicator_gpio)),
        None => Box::new(NoTrigger),
    };
    let transport = WsTransport::new(config.connect_timeout());

    let mut scheduler =
        TickScheduler::new(&config, bus, transport, reset, MonotonicClock::shared());
    scheduler.start();

    let running = AtomicBool::new(true);
    scheduler.run(&running);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_config: TrackerConfig) -> Result<(), Box<dyn Error>> {
    Err("the MPU-6050 bus needs Linux i2c-dev".into())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        "Orientation tracker: server {}, window {}, telemetry {}",
        config.endpoint(),
        config.sensors.window_depth,
        if config.telemetry_enabled { "on" } else { "off" }
    );

    run(config)
}
