// TerraLog — Sample Data Model
//
// A `Sample` is the normalized record of one acquisition tick. It is built
// once by the acquirer and then consumed read-only by both the display and
// the CSV sink. Fields for peripherals that failed (or are not part of the
// build variant) stay `None` — a missing reading is never written as zero.

use crate::soil::SoilReading;

// ---------------------------------------------------------------------------
// Clock reading (sourced from the DS3231, survives deep-sleep power cuts)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Monday = 0 … Sunday = 6.
    pub weekday: u8,
    pub yearday: u16,
}

impl ClockReading {
    /// `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// `HH:MM:SS`
    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }

    /// Comparable key for the monotonicity check across a power session.
    /// Weekday and yearday are derived values and do not participate.
    pub fn sort_key(&self) -> (u16, u8, u8, u8, u8, u8) {
        (
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
    }

    /// True if `self` lies before `earlier` — a backward jump, which means
    /// the RTC lost power or was never set. Data-quality flag, not a crash.
    pub fn is_before(&self, earlier: &ClockReading) -> bool {
        self.sort_key() < earlier.sort_key()
    }
}

// ---------------------------------------------------------------------------
// Peripheral readings
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbioticReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    pub voltage_mv: f32,
    pub charge_pct: f32,
}

// ---------------------------------------------------------------------------
// Sample — one tick, immutable once constructed
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub timestamp: Option<ClockReading>,
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub battery: Option<BatteryReading>,
    pub soil: Option<SoilReading>,
    /// Set when the clock jumped backwards within this power session.
    pub time_suspect: bool,
}

// ---------------------------------------------------------------------------
// Rounding — half-to-even, so long logging runs carry no systematic bias
// ---------------------------------------------------------------------------

/// Round to 1 decimal place (temperature, humidity, battery voltage).
pub fn round1(v: f32) -> f32 {
    (v * 10.0).round_ties_even() / 10.0
}

/// Round to 0 decimal places (charge percentage).
pub fn round0(v: f32) -> f32 {
    v.round_ties_even()
}

/// Round to 3 decimal places (soil probe voltage).
pub fn round3(v: f32) -> f32 {
    (v * 1000.0).round_ties_even() / 1000.0
}
