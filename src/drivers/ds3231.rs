// TerraLog — DS3231 RTC Driver
//
// Battery-backed real-time clock on I2C bus 0. All calendar registers are
// BCD; the chip keeps ticking through controller deep sleep, which is the
// whole point of carrying it.

use terralog::config::{I2C_ADDR_CLOCK, I2C_TIMEOUT_TICKS};
use terralog::peripherals::{Clock, PeripheralError};
use terralog::sample::ClockReading;

use crate::drivers::{bus_err, SharedBus};

// DS3231 register addresses
const REG_TIME: u8 = 0x00; // seconds, minutes, hours, weekday, day, month, year
const REG_STATUS: u8 = 0x0F;

pub struct Ds3231 {
    bus: SharedBus,
}

impl Ds3231 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        let mut buf = [0u8; 1];
        bus.write_read(I2C_ADDR_CLOCK, &[REG_STATUS], &mut buf, I2C_TIMEOUT_TICKS)
            .is_ok()
    }
}

impl Clock for Ds3231 {
    fn now(&mut self) -> Result<ClockReading, PeripheralError> {
        let mut bus = self.bus.lock().unwrap();
        let mut raw = [0u8; 7];
        bus.write_read(I2C_ADDR_CLOCK, &[REG_TIME], &mut raw, I2C_TIMEOUT_TICKS)
            .map_err(bus_err)?;

        let second = from_bcd(raw[0] & 0x7F);
        let minute = from_bcd(raw[1] & 0x7F);
        let hour = from_bcd(raw[2] & 0x3F); // 24-hour mode
        let weekday = raw[3].saturating_sub(1); // chip counts 1-7, we use 0-6
        let day = from_bcd(raw[4] & 0x3F);
        let month = from_bcd(raw[5] & 0x1F); // bit 7 is the century flag
        let year = 2000 + from_bcd(raw[6]) as u16;

        if month == 0 || month > 12 || day == 0 || day > 31 || hour > 23 {
            return Err(PeripheralError::Data(format!(
                "implausible RTC registers: {:02x?}",
                raw
            )));
        }

        Ok(ClockReading {
            year,
            month,
            day,
            hour,
            minute,
            second,
            weekday,
            yearday: day_of_year(year, month, day),
        })
    }

    fn set(&mut self, t: &ClockReading) -> Result<(), PeripheralError> {
        let mut bus = self.bus.lock().unwrap();
        let frame = [
            REG_TIME,
            to_bcd(t.second),
            to_bcd(t.minute),
            to_bcd(t.hour),
            t.weekday + 1,
            to_bcd(t.day),
            to_bcd(t.month),
            to_bcd((t.year - 2000) as u8),
        ];
        bus.write(I2C_ADDR_CLOCK, &frame, I2C_TIMEOUT_TICKS)
            .map_err(bus_err)?;
        log::info!("RTC time set: {} {}", t.date_string(), t.time_string());
        Ok(())
    }
}

fn from_bcd(v: u8) -> u8 {
    (v >> 4) * 10 + (v & 0x0F)
}

fn to_bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

fn day_of_year(year: u16, month: u8, day: u8) -> u16 {
    const DAYS_BEFORE: [u16; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let mut yd = DAYS_BEFORE[(month - 1) as usize] + day as u16;
    if leap && month > 2 {
        yd += 1;
    }
    yd
}
