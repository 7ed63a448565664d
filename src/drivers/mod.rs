// TerraLog — Hardware Drivers (ESP32 / ESP-IDF)
//
// Register-level drivers over shared I2C buses plus the ADC soil probe and
// the SD-SPI volume. Custom rather than crates.io drivers to avoid
// embedded-hal version conflicts with esp-idf-hal.

pub mod display;
pub mod ds3231;
pub mod max17043;
pub mod sdcard;
pub mod sht30;
pub mod soil_probe;

use std::sync::Mutex;

use esp_idf_hal::i2c::I2cDriver;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

/// Map a bus-level failure into the library's peripheral error.
pub(crate) fn bus_err(e: impl std::fmt::Display) -> terralog::peripherals::PeripheralError {
    terralog::peripherals::PeripheralError::Bus(e.to_string())
}
