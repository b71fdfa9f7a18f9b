mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use tracing::{error, info};

use domain::settings::SettingsService;
use infrastructure::bluetooth::BleSession;
use infrastructure::logging;
use infrastructure::osc::OscSink;
use presentation::cli::Console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new().context("loading settings")?;
    let settings = settings_service.get().clone();
    let _logging_guard = logging::init(&settings.log_settings)?;
    info!("Starting heart rate OSC bridge");

    // Without a sink there is nowhere to forward to, so this failure is
    // fatal before any radio work begins.
    let sink = OscSink::new(&settings.osc).context("creating OSC destination")?;

    let manager = Manager::new()
        .await
        .context("initializing Bluetooth manager")?;
    let adapter = manager
        .adapters()
        .await
        .context("enumerating Bluetooth adapters")?
        .into_iter()
        .next()
        .context("no Bluetooth adapter found")?;

    let mut console = Console::new();
    let mut session = BleSession::new(adapter, sink, &settings);

    session.start_scanning().await.context("starting BLE scan")?;
    println!("Scanning for devices. Press Enter to stop scanning.");
    console.next_line_within(settings.session.scan_grace()).await;
    session.stop_scanning().await.context("stopping BLE scan")?;

    if session.device_count() == 0 {
        println!("No devices found.");
        return Ok(());
    }

    let Some(index) = console.prompt_index().await else {
        println!("Invalid index selected.");
        return Ok(());
    };

    // Wire the next operator line to the subscription stop flag; the
    // session loop notices within one poll interval.
    let stop = session.stop_handle();
    tokio::spawn(async move {
        if console.next_line().await.is_some() {
            info!("Operator requested stop");
            stop.stop();
        }
    });

    if let Err(err) = session.connect_to_device(index).await {
        error!("Session ended without subscribing: {err}");
        println!("{err}");
    }

    Ok(())
}
