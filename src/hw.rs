// TerraLog — Hardware Bring-Up
//
// Everything that must exist before the scheduler can run: the two I2C
// buses, the presence scans, the per-device drivers, the SD mount and the
// error-log sink. A failure of any required device is a fatal fault — the
// caller resets with backoff, because a logger without its clock, sensor
// or card has nothing to do. Only the display is allowed to be absent:
// headless operation is a supported deployment.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::sync::Mutex;

use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;

use terralog::config::{ERROR_LOG_PATH, I2C_TIMEOUT_TICKS, LoggerConfig};
use terralog::fault::{FaultRecord, FaultReporter};
use terralog::peripherals::{BatteryGauge, Panel, PeripheralSet, SoilProbe};

use crate::drivers::display::Sh1107;
use crate::drivers::ds3231::Ds3231;
use crate::drivers::max17043::Max17043;
use crate::drivers::sdcard::SdVolume;
use crate::drivers::sht30::Sht30;
use crate::drivers::soil_probe::SoilProbeAdc;
use crate::drivers::SharedBus;

// ---------------------------------------------------------------------------
// Error log sink (internal SPIFFS partition, survives SD card removal)
// ---------------------------------------------------------------------------

/// Mount the internal flash partition at /log and open the error log for
/// appending. If either step fails the reporter runs without a durable
/// sink — faults still reach the serial console.
pub fn open_error_log() -> FaultReporter {
    match try_open_error_log() {
        Ok(file) => FaultReporter::new(Box::new(file)),
        Err(e) => {
            log::warn!("Error log unavailable: {}", e);
            FaultReporter::without_sink()
        }
    }
}

fn try_open_error_log() -> anyhow::Result<std::fs::File> {
    let base_path = CString::new("/log")?;
    let conf = esp_idf_sys::esp_vfs_spiffs_conf_t {
        base_path: base_path.as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 2,
        format_if_mount_failed: true,
    };
    let ret = unsafe { esp_idf_sys::esp_vfs_spiffs_register(&conf) };
    // Already-registered is fine after a reset that skipped unmount.
    if ret != esp_idf_sys::ESP_OK && ret != esp_idf_sys::ESP_ERR_INVALID_STATE {
        esp_idf_sys::esp!(ret)?;
    }

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(ERROR_LOG_PATH)?;
    Ok(file)
}

// ---------------------------------------------------------------------------
// Peripheral bring-up
// ---------------------------------------------------------------------------

/// Bring up every peripheral the configuration asks for. A fatal fault is
/// reported exactly once (log, sink and — if the panel came up before the
/// failure — the error screen) and then returned for the caller to act on.
pub fn bootstrap(
    config: &LoggerConfig,
    reporter: &mut FaultReporter,
) -> Result<PeripheralSet, FaultRecord> {
    let mut display: Option<Box<dyn Panel>> = None;
    match bring_up(config, reporter, &mut display) {
        Ok(set) => Ok(set),
        Err(fault) => {
            reporter.report(&fault, &mut display);
            Err(fault)
        }
    }
}

fn bring_up(
    config: &LoggerConfig,
    reporter: &mut FaultReporter,
    display: &mut Option<Box<dyn Panel>>,
) -> Result<PeripheralSet, FaultRecord> {
    let peripherals = Peripherals::take()
        .map_err(|e| FaultRecord::fatal("Peripherals", e.to_string()))?;

    // ---- I2C buses --------------------------------------------------------
    // Bus 0 carries the clock, the SHT30 and (optionally) the fuel gauge;
    // bus 1 is dedicated to the OLED so a wedged display can never stall a
    // measurement transaction.
    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());

    let bus0 = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21, // SDA
        peripherals.pins.gpio22, // SCL
        &i2c_config,
    )
    .map_err(|e| FaultRecord::fatal("I2C Bus 0", e.to_string()))?;
    let bus1 = I2cDriver::new(
        peripherals.i2c1,
        peripherals.pins.gpio25, // SDA
        peripherals.pins.gpio26, // SCL
        &i2c_config,
    )
    .map_err(|e| FaultRecord::fatal("I2C Bus 1", e.to_string()))?;

    // SAFETY: The I2C peripherals are singletons obtained from
    // `Peripherals::take()`. They live for the entire programme duration
    // (the firmware never exits; deep sleep is a power cut, not a return).
    let bus0: SharedBus = Box::leak(Box::new(Mutex::new(unsafe { core::mem::transmute(bus0) })));
    let bus1: SharedBus = Box::leak(Box::new(Mutex::new(unsafe { core::mem::transmute(bus1) })));

    // ---- Presence scans ---------------------------------------------------
    let found0 = scan(bus0);
    log::info!("I2C bus 0 scan: {:02x?}", found0);
    if found0.is_empty() {
        reporter.report(
            &FaultRecord::recoverable("I2C Bus 0", "No devices found"),
            &mut None,
        );
    }

    let found1 = scan(bus1);
    log::info!("I2C bus 1 scan: {:02x?}", found1);

    // ---- Display (optional) -----------------------------------------------
    // An empty display bus means headless deployment; a display that is
    // present but refuses its init sequence means broken wiring, and the
    // boot must not limp past that.
    if found1.is_empty() {
        reporter.report(
            &FaultRecord::recoverable("I2C Bus 1", "No display found"),
            &mut None,
        );
    } else {
        let mut panel = Sh1107::new(bus1);
        panel
            .init()
            .map_err(|e| FaultRecord::fatal("Display", e.to_string()))?;
        *display = Some(Box::new(panel));
    }

    // ---- Required bus-0 devices -------------------------------------------
    let clock = Ds3231::new(bus0);
    if !clock.is_connected() {
        return Err(FaultRecord::fatal("Clock error", "DS3231 not responding"));
    }
    log::info!("DS3231 online");

    let sensor = Sht30::new(bus0);
    if !sensor.is_connected() {
        return Err(FaultRecord::fatal("SHT30 init", "SHT30 not responding"));
    }
    log::info!("SHT30 online");

    // ---- Optional devices per configuration -------------------------------
    let battery = if config.caps.battery {
        let gauge = Max17043::new(bus0);
        gauge
            .init()
            .map_err(|e| FaultRecord::fatal("Battery Gauge", e.to_string()))?;
        Some(Box::new(gauge) as Box<dyn BatteryGauge>)
    } else {
        None
    };

    let soil = if config.caps.soil {
        let probe = SoilProbeAdc::new()
            .map_err(|e| FaultRecord::fatal("Soil ADC", e.to_string()))?;
        Some(Box::new(probe) as Box<dyn SoilProbe>)
    } else {
        None
    };

    // ---- SD card ----------------------------------------------------------
    let storage = SdVolume::mount()
        .map_err(|e| FaultRecord::fatal("SD Card init", e.to_string()))?;

    Ok(PeripheralSet {
        clock: Box::new(clock),
        sensor: Box::new(sensor),
        storage: Box::new(storage),
        display: display.take(),
        soil,
        battery,
    })
}

/// Probe every 7-bit address with a zero-length write; devices that ACK
/// are present. Matches the list an `i2cdetect` would print.
fn scan(bus: SharedBus) -> Vec<u8> {
    let mut driver = bus.lock().unwrap();
    (0x08u8..0x78)
        .filter(|addr| driver.write(*addr, &[], I2C_TIMEOUT_TICKS).is_ok())
        .collect()
}
