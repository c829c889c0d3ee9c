// the steering handles are only driven from tests
#![cfg_attr(not(test), allow(dead_code))]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use drybox_common::{
    sh1106::{CMD_DISPLAY_OFF, CMD_DISPLAY_ON, CMD_PAGE_ADDRESS, CONTROL_COMMAND},
    sht40::{encode_frame, humidity_to_ticks, temperature_to_ticks},
};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

const CMD_MEASURE: u8 = 0xFD;

#[derive(Debug, Default)]
struct SensorInner {
    temperature_c: f32,
    humidity_pct: f32,
    drift: bool,
    pending: bool,
    failing: u32,
    corrupting: u32,
    completed_reads: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SensorControl(Arc<Mutex<SensorInner>>);

impl SensorControl {
    fn lock(&self) -> MutexGuard<'_, SensorInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_climate(&self, temperature_c: f32, humidity_pct: f32) {
        let mut inner = self.lock();
        inner.temperature_c = temperature_c;
        inner.humidity_pct = humidity_pct;
    }

    pub fn fail_next(&self, count: u32) {
        self.lock().failing = count;
    }

    pub fn corrupt_next(&self, count: u32) {
        self.lock().corrupting = count;
    }

    pub fn completed_reads(&self) -> u32 {
        self.lock().completed_reads
    }
}

pub struct SimulatedSht40 {
    control: SensorControl,
}

impl SimulatedSht40 {
    pub fn scripted(temperature_c: f32, humidity_pct: f32) -> Self {
        let control = SensorControl::default();
        control.set_climate(temperature_c, humidity_pct);
        Self { control }
    }

    pub fn drifting() -> Self {
        let sim = Self::scripted(24.0, 35.0);
        sim.control.lock().drift = true;
        sim
    }

    pub fn control(&self) -> SensorControl {
        self.control.clone()
    }
}

impl ErrorType for SimulatedSht40 {
    type Error = ErrorKind;
}

impl I2c for SimulatedSht40 {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut inner = self.control.lock();
        if inner.failing > 0 {
            inner.failing -= 1;
            inner.pending = false;
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations {
            match op {
                Operation::Write(bytes) => match &bytes[..] {
                    [CMD_MEASURE] => inner.pending = true,
                    _ => return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
                },
                Operation::Read(buf) => {
                    if !inner.pending {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                    }
                    inner.pending = false;

                    if inner.drift {
                        let phase = inner.completed_reads as f32 * 0.05;
                        inner.temperature_c = 24.0 + 1.5 * phase.sin();
                        inner.humidity_pct = 35.0 + 4.0 * (phase * 0.7).cos();
                    }

                    let mut frame = encode_frame(
                        temperature_to_ticks(inner.temperature_c),
                        humidity_to_ticks(inner.humidity_pct),
                    );
                    if inner.corrupting > 0 {
                        inner.corrupting -= 1;
                        frame[5] ^= 0xFF;
                    }

                    let len = buf.len().min(frame.len());
                    buf[..len].copy_from_slice(&frame[..len]);
                    inner.completed_reads += 1;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PanelInner {
    frames: u32,
    failing: u32,
    lit: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PanelProbe(Arc<Mutex<PanelInner>>);

impl PanelProbe {
    fn lock(&self) -> MutexGuard<'_, PanelInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn frames(&self) -> u32 {
        self.lock().frames
    }

    pub fn is_lit(&self) -> bool {
        self.lock().lit
    }

    pub fn fail_next(&self, count: u32) {
        self.lock().failing = count;
    }
}

#[derive(Default)]
pub struct SimulatedPanel {
    probe: PanelProbe,
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> PanelProbe {
        self.probe.clone()
    }
}

impl ErrorType for SimulatedPanel {
    type Error = ErrorKind;
}

impl I2c for SimulatedPanel {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut inner = self.probe.lock();
        if inner.failing > 0 {
            inner.failing -= 1;
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations {
            match op {
                Operation::Write(bytes) => match bytes[..] {
                    [CONTROL_COMMAND, CMD_PAGE_ADDRESS] => inner.frames += 1,
                    [CONTROL_COMMAND, CMD_DISPLAY_ON] => inner.lit = true,
                    [CONTROL_COMMAND, CMD_DISPLAY_OFF] => inner.lit = false,
                    _ => {}
                },
                Operation::Read(_) => return Err(ErrorKind::Other),
            }
        }
        Ok(())
    }
}
