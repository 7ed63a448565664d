// TerraLog — MAX17043 Battery Fuel Gauge Driver
//
// Reports cell voltage (1.25 mV per LSB, 12-bit left-justified) and the
// ModelGauge state-of-charge estimate (integer percent + 1/256 fraction).

use terralog::config::{I2C_ADDR_GAUGE, I2C_TIMEOUT_TICKS};
use terralog::peripherals::{BatteryGauge, PeripheralError};
use terralog::sample::BatteryReading;

use crate::drivers::{bus_err, SharedBus};

// MAX17043 register addresses
const REG_VCELL: u8 = 0x02;
const REG_SOC: u8 = 0x04;
const REG_VERSION: u8 = 0x08;

/// Cell voltage LSB in millivolts.
const VCELL_LSB_MV: f32 = 1.25;

pub struct Max17043 {
    bus: SharedBus,
}

impl Max17043 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// Read the version register to confirm the gauge answers.
    pub fn init(&self) -> anyhow::Result<()> {
        let mut bus = self.bus.lock().unwrap();
        let mut buf = [0u8; 2];
        bus.write_read(I2C_ADDR_GAUGE, &[REG_VERSION], &mut buf, I2C_TIMEOUT_TICKS)?;
        log::info!(
            "MAX17043 present, IC version {}",
            u16::from_be_bytes(buf)
        );
        Ok(())
    }
}

impl BatteryGauge for Max17043 {
    fn read(&mut self) -> Result<BatteryReading, PeripheralError> {
        let mut bus = self.bus.lock().unwrap();

        let mut vcell = [0u8; 2];
        bus.write_read(I2C_ADDR_GAUGE, &[REG_VCELL], &mut vcell, I2C_TIMEOUT_TICKS)
            .map_err(bus_err)?;
        let counts = ((vcell[0] as u16) << 4) | ((vcell[1] as u16) >> 4);

        let mut soc = [0u8; 2];
        bus.write_read(I2C_ADDR_GAUGE, &[REG_SOC], &mut soc, I2C_TIMEOUT_TICKS)
            .map_err(bus_err)?;

        Ok(BatteryReading {
            voltage_mv: counts as f32 * VCELL_LSB_MV,
            charge_pct: soc[0] as f32 + soc[1] as f32 / 256.0,
        })
    }
}
