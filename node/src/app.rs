use std::{future::Future, sync::Arc};

use anyhow::Context;
use drybox_common::{
    layout::SPLASH_MESSAGE, sh1106::Sh1106, sht40::Sht40, DisplayRenderer, Fault,
    RuntimeConfig, SharedReadingState,
};
use embedded_hal::i2c::I2c;
use tracing::info;

use crate::{
    bringup::{bring_up, NetworkLink},
    faults::log_fault,
    sampling::SensorDisplayTask,
    telemetry::{client_id_from_unique_id, Broker, SessionOptions, TelemetryPublishTask},
    web::run_web_server,
};

pub struct NodeParts<SB, DB, L, B> {
    pub sensor_bus: SB,
    pub display_bus: DB,
    pub link: L,
    pub broker: B,
    pub hardware_id: Vec<u8>,
}

pub async fn run_node<SB, DB, L, B>(
    config: RuntimeConfig,
    parts: NodeParts<SB, DB, L, B>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    SB: I2c,
    DB: I2c,
    L: NetworkLink,
    B: Broker,
{
    let RuntimeConfig {
        timing,
        network,
        hardware,
        web,
    } = config;
    let NodeParts {
        sensor_bus,
        display_bus,
        mut link,
        broker,
        hardware_id,
    } = parts;

    tokio::pin!(shutdown);
    info!("starting");

    let panel = Sh1106::new(
        display_bus,
        hardware.display_address,
        hardware.display_width,
        hardware.display_height,
    )
    .map_err(Fault::from)
    .context("failed to initialise display")?;
    let mut display = DisplayRenderer::new(panel);
    if let Err(err) = display.splash(SPLASH_MESSAGE) {
        log_fault("startup", &err.into());
    }

    let state = Arc::new(SharedReadingState::new());

    let outcome = tokio::select! {
        outcome = bring_up(&mut link, &network, &timing, &state) => outcome,
        _ = &mut shutdown => {
            info!("interrupted during network bringup, exiting");
            if let Err(err) = display.power_off() {
                log_fault("shutdown", &err.into());
            }
            return Ok(());
        }
    };
    info!(
        bringup = outcome.as_str(),
        address = %state.address(),
        "network bringup finished"
    );

    let sensor = Sht40::new(sensor_bus, hardware.sensor_address, hardware.crc_policy());
    let mut sampler = SensorDisplayTask::new(sensor, display, state.clone(), &timing);

    let options = SessionOptions::new(client_id_from_unique_id(&hardware_id), &network);
    info!(client_id = %options.client_id, "telemetry identity");
    let publisher = TelemetryPublishTask::new(broker, state.clone(), options, &timing);

    let web_server = run_web_server(web.http_port, state.clone(), timing.request_timeout());

    info!("tasks running");
    tokio::select! {
        _ = sampler.run() => {}
        _ = publisher.run() => {}
        _ = web_server => {}
        _ = &mut shutdown => info!("interrupt received, exiting"),
    }

    if let Err(fault) = sampler.blank_display() {
        log_fault("shutdown", &fault);
    }
    Ok(())
}
