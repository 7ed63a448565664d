// TerraLog — Hardware & System Configuration
// Target: ESP32 DevKit with two I2C buses, SPI SD card and analog soil probe

use std::time::Duration;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_I2C0_SDA: i32 = 21; // Bus 0 — DS3231 clock, SHT30, MAX17043
pub const PIN_I2C0_SCL: i32 = 22;
pub const PIN_I2C1_SDA: i32 = 25; // Bus 1 — SH1107 OLED only
pub const PIN_I2C1_SCL: i32 = 26;
pub const PIN_SOIL_ADC: i32 = 36; // ADC1_CH0 — capacitive soil probe
pub const PIN_SD_SCK: i32 = 18;
pub const PIN_SD_MOSI: i32 = 23;
pub const PIN_SD_MISO: i32 = 19;
pub const PIN_SD_CS: i32 = 4;

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_CLOCK: u8 = 0x68; // DS3231
pub const I2C_ADDR_SHT30: u8 = 0x44;
pub const I2C_ADDR_OLED: u8 = 0x3C; // SH1107
pub const I2C_ADDR_GAUGE: u8 = 0x36; // MAX17043
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks
pub const SD_SPI_FREQ_KHZ: u32 = 10_000;

// ---------------------------------------------------------------------------
// Display (SH1107 OLED, 128x128)
// ---------------------------------------------------------------------------
pub const SCREEN_WIDTH: u32 = 128;
pub const SCREEN_HEIGHT: u32 = 128;
/// Text columns that fit one row; error messages are truncated to this.
pub const DISPLAY_COLUMNS: usize = 16;
/// Vertical pixel pitch between text rows.
pub const DISPLAY_ROW_PITCH: u32 = 16;
/// Text rows that fit the panel at the row pitch; extra rows are dropped.
pub const DISPLAY_MAX_ROWS: usize = (SCREEN_HEIGHT / DISPLAY_ROW_PITCH) as usize;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------
pub const SD_MOUNT_POINT: &str = "/sd";
pub const CSV_FILE: &str = "data_one.csv";
pub const ERROR_LOG_PATH: &str = "/log/error_log.txt";

// ---------------------------------------------------------------------------
// Soil probe calibration (raw 12-bit ADC counts)
// ---------------------------------------------------------------------------
/// Calibrated endpoints of the soil probe: reading in free air (dry) and
/// fully submerged (wet). Lower raw counts mean more moisture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoilCalibration {
    pub air_val: u16,
    pub water_val: u16,
}

impl Default for SoilCalibration {
    fn default() -> Self {
        Self {
            air_val: 3550,
            water_val: 321,
        }
    }
}

// ---------------------------------------------------------------------------
// Capability set — which optional peripherals a build variant carries
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub battery: bool,
    pub soil: bool,
}

// ---------------------------------------------------------------------------
// Logger configuration — the single surface behind the firmware variants
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub caps: CapabilitySet,
    pub soil_cal: SoilCalibration,
    /// Samples taken back-to-back before the device sleeps.
    pub samples_per_burst: u32,
    /// Delay between samples within a burst.
    pub sample_interval: Duration,
    /// How long the "SD unmounted" status stays on screen.
    pub unmount_hold: Duration,
    /// How long the sleep countdown stays on screen before the OLED powers down.
    pub sleep_buffer: Duration,
    /// Device-wide deep-sleep duration between bursts.
    pub deep_sleep: Duration,
    /// Pause after a fatal fault before the recovery reset, so the error
    /// panel is readable.
    pub fatal_pause: Duration,
    /// Deep-sleep backoff after a fatal fault; wake re-enters bootstrap.
    pub reset_backoff: Duration,
    pub csv_file: &'static str,
}

impl LoggerConfig {
    /// Clock + SHT30 + SD only; 1-minute sleep.
    pub fn minimal() -> Self {
        Self {
            caps: CapabilitySet::default(),
            soil_cal: SoilCalibration::default(),
            samples_per_burst: 5,
            sample_interval: Duration::from_secs(5),
            unmount_hold: Duration::from_secs(5),
            sleep_buffer: Duration::from_secs(15),
            deep_sleep: Duration::from_secs(60),
            fatal_pause: Duration::from_secs(5),
            reset_backoff: Duration::from_secs(30),
            csv_file: CSV_FILE,
        }
    }

    /// Adds the MAX17043 battery gauge; 3-minute sleep (case-one enclosure).
    pub fn with_battery() -> Self {
        Self {
            caps: CapabilitySet {
                battery: true,
                soil: false,
            },
            deep_sleep: Duration::from_secs(3 * 60),
            ..Self::minimal()
        }
    }

    /// Everything: battery gauge plus soil probe; 10-second sample spacing.
    pub fn field() -> Self {
        Self {
            caps: CapabilitySet {
                battery: true,
                soil: true,
            },
            sample_interval: Duration::from_secs(10),
            deep_sleep: Duration::from_secs(3 * 60),
            ..Self::minimal()
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::minimal()
    }
}
