use crc::{Crc, CRC_8_NRSC_5};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use thiserror::Error;

pub const DEFAULT_ADDRESS: u8 = 0x44;

// Lower bound on the wait between trigger and read; the device NACKs reads
// while a high-precision measurement is in progress.
pub const MIN_SETTLE_MS: u32 = 10;

const CMD_MEASURE_HIGH_PRECISION: u8 = 0xFD;
const FRAME_LEN: usize = 6;
const TICKS_FULL_SCALE: f32 = 65535.0;

// Sensirion CRC-8: poly 0x31, init 0xFF, no reflection.
const SENSIRION_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcPolicy {
    Verify,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{word} checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
pub struct ChecksumMismatch {
    pub word: &'static str,
    pub expected: u8,
    pub actual: u8,
}

#[derive(Debug, Error)]
pub enum SensorError<E> {
    #[error("i2c transaction failed: {0:?}")]
    Bus(E),
    #[error(transparent)]
    Checksum(#[from] ChecksumMismatch),
}

pub struct Sht40<I2C> {
    i2c: I2C,
    address: u8,
    crc: CrcPolicy,
}

impl<I2C: I2c> Sht40<I2C> {
    pub fn new(i2c: I2C, address: u8, crc: CrcPolicy) -> Self {
        Self { i2c, address, crc }
    }

    pub fn start_measurement(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.i2c
            .write(self.address, &[CMD_MEASURE_HIGH_PRECISION])
            .map_err(SensorError::Bus)
    }

    pub fn read_measurement(&mut self) -> Result<(f32, f32), SensorError<I2C::Error>> {
        let mut frame = [0_u8; FRAME_LEN];
        self.i2c
            .read(self.address, &mut frame)
            .map_err(SensorError::Bus)?;
        Ok(decode_frame(&frame, self.crc)?)
    }

    pub fn measure<D: DelayNs>(
        &mut self,
        delay: &mut D,
        settle_ms: u32,
    ) -> Result<(f32, f32), SensorError<I2C::Error>> {
        self.start_measurement()?;
        delay.delay_ms(settle_ms.max(MIN_SETTLE_MS));
        self.read_measurement()
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

pub fn decode_temperature(ticks: u16) -> f32 {
    -45.0 + 175.0 * ticks as f32 / TICKS_FULL_SCALE
}

pub fn decode_humidity_unclamped(ticks: u16) -> f32 {
    -6.0 + 125.0 * ticks as f32 / TICKS_FULL_SCALE
}

pub fn decode_humidity(ticks: u16) -> f32 {
    decode_humidity_unclamped(ticks).clamp(0.0, 100.0)
}

pub fn crc8(word: [u8; 2]) -> u8 {
    SENSIRION_CRC.checksum(&word)
}

pub fn decode_frame(
    frame: &[u8; FRAME_LEN],
    policy: CrcPolicy,
) -> Result<(f32, f32), ChecksumMismatch> {
    let temperature = [frame[0], frame[1]];
    let humidity = [frame[3], frame[4]];

    if policy == CrcPolicy::Verify {
        check_word("temperature", temperature, frame[2])?;
        check_word("humidity", humidity, frame[5])?;
    }

    Ok((
        decode_temperature(u16::from_be_bytes(temperature)),
        decode_humidity(u16::from_be_bytes(humidity)),
    ))
}

pub fn encode_frame(temperature_ticks: u16, humidity_ticks: u16) -> [u8; FRAME_LEN] {
    let t = temperature_ticks.to_be_bytes();
    let rh = humidity_ticks.to_be_bytes();
    [t[0], t[1], crc8(t), rh[0], rh[1], crc8(rh)]
}

pub fn temperature_to_ticks(temperature_c: f32) -> u16 {
    ((temperature_c + 45.0) / 175.0 * TICKS_FULL_SCALE)
        .round()
        .clamp(0.0, TICKS_FULL_SCALE) as u16
}

pub fn humidity_to_ticks(humidity_pct: f32) -> u16 {
    ((humidity_pct + 6.0) / 125.0 * TICKS_FULL_SCALE)
        .round()
        .clamp(0.0, TICKS_FULL_SCALE) as u16
}

fn check_word(word: &'static str, bytes: [u8; 2], actual: u8) -> Result<(), ChecksumMismatch> {
    let expected = crc8(bytes);
    if expected == actual {
        Ok(())
    } else {
        Err(ChecksumMismatch {
            word,
            expected,
            actual,
        })
    }
}
