// TerraLog — SHT30 Temperature/Humidity Driver
//
// Single-shot measurement without clock stretching, high repeatability.
// Both 16-bit words carry a CRC-8 that we verify before converting: a
// corrupted reading must surface as a fault, never as a plausible number.

use esp_idf_hal::delay::FreeRtos;

use terralog::config::{I2C_ADDR_SHT30, I2C_TIMEOUT_TICKS};
use terralog::peripherals::{AbioticSensor, PeripheralError};
use terralog::sample::AbioticReading;

use crate::drivers::{bus_err, SharedBus};

// Command words
const CMD_MEASURE_HIGH: [u8; 2] = [0x24, 0x00]; // single shot, no stretch
const CMD_READ_STATUS: [u8; 2] = [0xF3, 0x2D];

/// Worst-case measurement duration at high repeatability (datasheet: 15 ms).
const MEASURE_DELAY_MS: u32 = 16;

pub struct Sht30 {
    bus: SharedBus,
}

impl Sht30 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        let mut buf = [0u8; 3];
        bus.write(I2C_ADDR_SHT30, &CMD_READ_STATUS, I2C_TIMEOUT_TICKS)
            .and_then(|_| bus.read(I2C_ADDR_SHT30, &mut buf, I2C_TIMEOUT_TICKS))
            .is_ok()
    }
}

impl AbioticSensor for Sht30 {
    fn measure(&mut self) -> Result<AbioticReading, PeripheralError> {
        let mut raw = [0u8; 6];
        {
            let mut bus = self.bus.lock().unwrap();
            bus.write(I2C_ADDR_SHT30, &CMD_MEASURE_HIGH, I2C_TIMEOUT_TICKS)
                .map_err(bus_err)?;
            FreeRtos::delay_ms(MEASURE_DELAY_MS);
            bus.read(I2C_ADDR_SHT30, &mut raw, I2C_TIMEOUT_TICKS)
                .map_err(bus_err)?;
        }

        if crc8(&raw[0..2]) != raw[2] || crc8(&raw[3..5]) != raw[5] {
            return Err(PeripheralError::Data("SHT30 checksum mismatch".into()));
        }

        let t_raw = u16::from_be_bytes([raw[0], raw[1]]) as f32;
        let h_raw = u16::from_be_bytes([raw[3], raw[4]]) as f32;

        Ok(AbioticReading {
            temperature_c: -45.0 + 175.0 * t_raw / 65535.0,
            humidity_pct: 100.0 * h_raw / 65535.0,
        })
    }
}

/// CRC-8 as specified by Sensirion: polynomial 0x31, init 0xFF.
fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}
