// TerraLog — Peripheral Capability Traits
//
// Thin capability seams over the real drivers. The scheduler and acquirer
// only ever see these traits, which is what lets every phase run against
// in-memory mocks on the host. Each handle represents an already-initialized
// device: bring-up (bus init, presence scan, driver init, SD mount) happens
// in the firmware binary before a `PeripheralSet` exists, and a failure
// there is a fatal fault.

use thiserror::Error;

use crate::config::CapabilitySet;
use crate::sample::{AbioticReading, BatteryReading, ClockReading};

#[derive(Debug, Error)]
pub enum PeripheralError {
    /// The device could not be reached or answered garbage on the bus.
    #[error("bus error: {0}")]
    Bus(String),
    /// The device answered, but the payload failed validation (CRC, range).
    #[error("bad reading: {0}")]
    Data(String),
    /// Mount/write/unmount trouble on the storage volume.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Real-time clock. Readings come from battery-backed hardware, not from a
/// software clock, so they survive deep-sleep power cuts to the controller.
pub trait Clock {
    fn now(&mut self) -> Result<ClockReading, PeripheralError>;

    /// Write an absolute calendar time into the clock's persistent storage.
    /// Commissioning-only; never called from the steady-state loop.
    fn set(&mut self, t: &ClockReading) -> Result<(), PeripheralError>;
}

/// Temperature/relative-humidity sensor (SHT30 class).
pub trait AbioticSensor {
    fn measure(&mut self) -> Result<AbioticReading, PeripheralError>;
}

/// Analog soil-moisture probe; returns the raw 12-bit ADC count.
pub trait SoilProbe {
    fn read_raw(&mut self) -> Result<u16, PeripheralError>;
}

/// Battery fuel gauge (MAX17043 class).
pub trait BatteryGauge {
    fn read(&mut self) -> Result<BatteryReading, PeripheralError>;
}

/// Monochrome text display. Rows land at fixed pixel offsets; a call clears
/// the frame, draws, and flushes in one go.
pub trait Panel {
    fn draw_rows(&mut self, rows: &[&str]) -> Result<(), PeripheralError>;

    /// Enter/leave the display's own low-power mode.
    fn set_sleep(&mut self, sleeping: bool) -> Result<(), PeripheralError>;
}

/// A mounted storage volume. File I/O opens and closes per call — no handle
/// survives into the sleep phase, since the medium is unmounted before it.
pub trait Storage {
    /// Names of the entries in the volume root (header-presence check).
    fn root_entries(&mut self) -> Result<Vec<String>, PeripheralError>;

    /// Create `name` with `contents`, truncating anything already there.
    fn create(&mut self, name: &str, contents: &str) -> Result<(), PeripheralError>;

    /// Append `data` to `name` (open, write, flush, close).
    fn append(&mut self, name: &str, data: &str) -> Result<(), PeripheralError>;

    /// Free space in gigabytes, 2 decimals.
    fn free_gigabytes(&mut self) -> Result<f32, PeripheralError>;

    /// Unmount the volume. Called exactly once per burst, best-effort.
    fn unmount(&mut self) -> Result<(), PeripheralError>;
}

/// The capability set of one boot: required clock/sensor/storage, optional
/// display, soil probe and battery gauge depending on the build variant
/// (and on what the bus scan actually found).
pub struct PeripheralSet {
    pub clock: Box<dyn Clock>,
    pub sensor: Box<dyn AbioticSensor>,
    pub storage: Box<dyn Storage>,
    pub display: Option<Box<dyn Panel>>,
    pub soil: Option<Box<dyn SoilProbe>>,
    pub battery: Option<Box<dyn BatteryGauge>>,
}

impl PeripheralSet {
    /// Which optional data-producing peripherals this set actually carries.
    pub fn capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            battery: self.battery.is_some(),
            soil: self.soil.is_some(),
        }
    }
}
