use std::{sync::Arc, time::Duration};

use drybox_common::{
    sht40::Sht40, DisplayRenderer, Fault, Reading, SharedReadingState, TimingConfig,
};
use embedded_hal::i2c::I2c;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use crate::faults::log_fault;

const TASK: &str = "sensor-display";

pub struct SensorDisplayTask<SB, DB> {
    sensor: Sht40<SB>,
    display: DisplayRenderer<DB>,
    state: Arc<SharedReadingState>,
    period: Duration,
    settle: Duration,
}

impl<SB: I2c, DB: I2c> SensorDisplayTask<SB, DB> {
    pub fn new(
        sensor: Sht40<SB>,
        display: DisplayRenderer<DB>,
        state: Arc<SharedReadingState>,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            sensor,
            display,
            state,
            period: timing.sample_period(),
            settle: timing.sensor_settle(),
        }
    }

    pub async fn run_cycle(&mut self) -> Result<Reading, Fault> {
        self.sensor.start_measurement()?;
        sleep(self.settle).await;
        let (temperature_c, humidity_pct) = self.sensor.read_measurement()?;

        let reading = Reading::from_sample(temperature_c, humidity_pct);
        self.state.store_reading(reading);

        self.display.render(&self.state.snapshot())?;
        Ok(reading)
    }

    pub fn blank_display(&mut self) -> Result<(), Fault> {
        Ok(self.display.power_off()?)
    }

    pub async fn run(&mut self) {
        info!(period_ms = self.period.as_millis() as u64, "sensor/display task started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(reading) => debug!(
                    "T={:.1}C RH={:.1}% DP={:.1}C",
                    reading.temperature_c, reading.humidity_pct, reading.dew_point_c
                ),
                Err(fault) => log_fault(TASK, &fault),
            }
        }
    }
}
