// TerraLog — Soil Moisture Classification
//
// Capacitive probe on a 12-bit ADC. Lower raw counts mean more moisture.
// The calibrated range [water_val, air_val] is split into three equal
// buckets with integer division; bucket boundaries are exclusive at the
// lower (drier) edge, per the DFRobot probe datasheet.

use crate::config::SoilCalibration;
use crate::sample::{round1, round3};

/// Full-scale count of the 12-bit ADC.
const ADC_MAX: u16 = 4095;
/// ADC reference voltage.
const ADC_VREF: f32 = 3.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoilLevel {
    Dry,
    Wet,
    VeryWet,
}

impl SoilLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dry => "Dry",
            Self::Wet => "Wet",
            Self::VeryWet => "Very Wet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilReading {
    pub level: SoilLevel,
    /// Raw count after constraining into the calibrated range.
    pub raw: u16,
    /// 0.0 (air-dry) … 100.0 (submerged), 1 decimal.
    pub percentage: f32,
    /// Probe voltage derived from the constrained count, 3 decimals.
    pub voltage: f32,
}

impl SoilReading {
    /// Classify one raw ADC count against the calibration.
    pub fn classify(raw: u16, cal: &SoilCalibration) -> SoilReading {
        // Constrain into the calibrated range so the percentage stays in
        // 0..=100 even when the probe drifts past its endpoints.
        let raw = raw.clamp(cal.water_val, cal.air_val);

        let span = cal.air_val - cal.water_val;
        let percentage = (cal.air_val - raw) as f32 / span as f32 * 100.0;

        let intervals = span / 3;
        let dry_threshold = cal.air_val - intervals;
        let wet_threshold = cal.water_val + intervals;

        let level = if raw > dry_threshold {
            SoilLevel::Dry
        } else if raw > wet_threshold {
            SoilLevel::Wet
        } else {
            SoilLevel::VeryWet
        };

        SoilReading {
            level,
            raw,
            percentage: round1(percentage),
            voltage: round3(raw as f32 / ADC_MAX as f32 * ADC_VREF),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // air 3550 / water 321: intervals = 1076, dry > 2474, wet > 1397.
    fn cal() -> SoilCalibration {
        SoilCalibration {
            air_val: 3550,
            water_val: 321,
        }
    }

    #[test]
    fn dry_boundary_is_exclusive() {
        assert_eq!(SoilReading::classify(2475, &cal()).level, SoilLevel::Dry);
        assert_eq!(SoilReading::classify(2474, &cal()).level, SoilLevel::Wet);
    }

    #[test]
    fn wet_boundary_is_exclusive() {
        assert_eq!(SoilReading::classify(1398, &cal()).level, SoilLevel::Wet);
        assert_eq!(
            SoilReading::classify(1397, &cal()).level,
            SoilLevel::VeryWet
        );
    }

    #[test]
    fn raw_is_constrained_to_calibrated_range() {
        let high = SoilReading::classify(4095, &cal());
        assert_eq!(high.raw, 3550);
        assert_eq!(high.percentage, 0.0);
        assert_eq!(high.level, SoilLevel::Dry);

        let low = SoilReading::classify(0, &cal());
        assert_eq!(low.raw, 321);
        assert_eq!(low.percentage, 100.0);
        assert_eq!(low.level, SoilLevel::VeryWet);
    }

    #[test]
    fn percentage_is_inverted_and_rounded() {
        // Midpoint of the range: (3550 - 1935.5) is not reachable with
        // integer counts; 1936 lands at 49.99%, rounded to 1 decimal = 50.0.
        let mid = SoilReading::classify(1936, &cal());
        assert!((mid.percentage - 50.0).abs() < 0.1);
    }

    #[test]
    fn voltage_tracks_constrained_count() {
        let r = SoilReading::classify(2474, &cal());
        // 2474 / 4095 * 3.3 = 1.9937...
        assert!((r.voltage - 1.994).abs() < 0.001);
        assert_eq!(SoilReading::classify(321, &cal()).voltage, SoilReading::classify(0, &cal()).voltage);
    }
}
