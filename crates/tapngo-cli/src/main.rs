//! `tapngo`: run the kiosk controller with a console in place of the
//! keypad, card reader and LCD.

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};

use tapngo_core::KioskConfig;
use tapngo_core::config::ChannelConfig;
use tapngo_hardware::mock::{MockButtons, MockCardReader, MockDisplay};
use tapngo_hardware::{CameraTrigger, DisabledCamera, PeripheralManager};
use tapngo_kiosk::{KioskDriver, KioskMachine};
use tapngo_network::{
    BrokerAddress, ChannelSettings, ClassificationChannel, HostNetwork, HttpCameraTrigger,
    MqttConnector,
};

use crate::console::{Console, HELP, spawn_screen_printer};

/// Tap N Go self-checkout kiosk
#[derive(Debug, Parser)]
#[command(name = "tapngo", version, about, long_about = None)]
struct Cli {
    /// Configuration file; defaults apply if it does not exist
    #[arg(short, long, default_value = "tapngo.toml")]
    config: PathBuf,

    /// Broker override as `host` or `host:port`
    #[arg(long)]
    broker: Option<String>,

    /// Camera streaming server base URL, e.g. `http://10.0.0.3`
    #[arg(long)]
    camera_url: Option<String>,

    /// Device identifier used to derive the MQTT client id
    #[arg(long, default_value = "kiosk01")]
    device_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = KioskConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(broker) = &cli.broker {
        apply_broker_override(&mut config.channel, broker)?;
    }
    if let Some(url) = cli.camera_url {
        config.camera.base_url = Some(url);
    }
    config.validate().context("invalid configuration")?;

    info!(
        version = tapngo_core::VERSION,
        broker = %config.channel.broker_address(),
        topic = %config.channel.topic,
        "tapngo starting"
    );

    let (reader, card) = MockCardReader::new();
    let (panel, buttons) = MockButtons::new();
    let (lcd, display) = MockDisplay::with_geometry(config.display.columns, config.display.rows);
    let printer = spawn_screen_printer(&display, config.display.columns);
    let peripherals = PeripheralManager::new(Box::new(reader), Box::new(panel), Box::new(lcd));

    let camera: Box<dyn CameraTrigger> = match &config.camera.base_url {
        Some(url) => Box::new(HttpCameraTrigger::new(
            url.as_str(),
            config.camera.request_timeout(),
        )?),
        None => {
            info!("no camera server configured, camera control disabled");
            Box::new(DisabledCamera)
        }
    };

    let settings = ChannelSettings::from_config(&config.channel, &cli.device_id)?;
    let connector = MqttConnector::new(config.channel.keep_alive());
    let channel = ClassificationChannel::new(connector, settings);

    let machine = KioskMachine::from_config(&config)?;
    let mut driver = KioskDriver::new(machine, peripherals, camera, channel)
        .with_tick_interval(config.timing.tick_interval());

    let mut link = HostNetwork::new(BrokerAddress::new(
        config.channel.host.clone(),
        config.channel.port,
    ));
    driver
        .startup(&mut link, config.channel.bring_up_timeout())
        .await;

    let quit = Arc::new(Notify::new());
    Console::new(card, buttons, display, config.display.columns)
        .spawn_reader(Arc::clone(&quit))
        .context("starting console")?;
    eprintln!("{HELP}");

    driver
        .run_until(async {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(error) = result {
                        warn!(%error, "ctrl-c handler failed");
                    }
                }
                _ = quit.notified() => {}
            }
        })
        .await;

    printer.abort();
    info!(
        transactions = driver.machine().context().transactions(),
        "tapngo stopped"
    );
    Ok(())
}

/// Apply a `host` or `host:port` broker override.
fn apply_broker_override(channel: &mut ChannelConfig, broker: &str) -> Result<()> {
    let broker = broker.trim();
    let (host, port) = match broker.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("invalid broker port in '{broker}'"))?;
            (host, Some(port))
        }
        None => (broker, None),
    };

    if host.is_empty() {
        bail!("broker host is empty in '{broker}'");
    }

    channel.host = host.to_string();
    if let Some(port) = port {
        channel.port = port;
    }
    Ok(())
}
