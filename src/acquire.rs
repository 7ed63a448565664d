// TerraLog — Sample Acquirer
//
// One reading cycle across whatever peripherals the set carries. Reads the
// clock first so the sensor values share the tick's reported timestamp,
// then the abiotic sensor, then the soil probe, with the battery gauge
// last. Each read sits in its own fault boundary: a failure omits the
// field (never a fabricated zero) and produces a recoverable fault record
// for the caller to report. The acquirer itself touches neither the
// display nor storage.

use crate::config::SoilCalibration;
use crate::fault::FaultRecord;
use crate::peripherals::PeripheralSet;
use crate::sample::{round0, round1, BatteryReading, ClockReading, Sample};
use crate::soil::SoilReading;

/// Acquire one `Sample`. `previous` is the last good clock reading of this
/// power session; a backward jump against it marks the sample's timestamp
/// as suspect (clock lost power or was never set).
pub fn acquire(
    peripherals: &mut PeripheralSet,
    cal: &SoilCalibration,
    previous: Option<&ClockReading>,
) -> (Sample, Vec<FaultRecord>) {
    let mut faults = Vec::new();
    let mut sample = Sample::default();

    match peripherals.clock.now() {
        Ok(now) => {
            if let Some(prev) = previous {
                if now.is_before(prev) {
                    sample.time_suspect = true;
                    faults.push(FaultRecord::recoverable(
                        "Clock",
                        format!(
                            "time went backwards: {} {} after {} {}",
                            now.date_string(),
                            now.time_string(),
                            prev.date_string(),
                            prev.time_string()
                        ),
                    ));
                }
            }
            sample.timestamp = Some(now);
        }
        Err(e) => faults.push(FaultRecord::recoverable("Clock", e.to_string())),
    }

    match peripherals.sensor.measure() {
        Ok(reading) => {
            sample.temperature_c = Some(round1(reading.temperature_c));
            sample.humidity_pct = Some(round1(reading.humidity_pct));
        }
        Err(e) => faults.push(FaultRecord::recoverable("SHT30", e.to_string())),
    }

    if let Some(soil) = &mut peripherals.soil {
        match soil.read_raw() {
            Ok(raw) => sample.soil = Some(SoilReading::classify(raw, cal)),
            Err(e) => faults.push(FaultRecord::recoverable("Soil", e.to_string())),
        }
    }

    if let Some(gauge) = &mut peripherals.battery {
        match gauge.read() {
            Ok(reading) => {
                sample.battery = Some(BatteryReading {
                    voltage_mv: round1(reading.voltage_mv),
                    charge_pct: round0(reading.charge_pct),
                });
            }
            Err(e) => faults.push(FaultRecord::recoverable("Battery Gauge", e.to_string())),
        }
    }

    (sample, faults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::tests::mock::{self, MockSet};
    use crate::sample::AbioticReading;

    fn noon() -> ClockReading {
        mock::reading(2025, 5, 18, 12, 0, 0)
    }

    #[test]
    fn all_fields_present_and_rounded() {
        let mut set = MockSet::new()
            .clock_time(noon())
            .sensor_value(AbioticReading {
                temperature_c: 23.4623,
                humidity_pct: 45.049,
            })
            .soil_raw(2474)
            .battery_value(BatteryReading {
                voltage_mv: 3874.26,
                charge_pct: 86.51,
            })
            .build();

        let (sample, faults) = acquire(&mut set, &SoilCalibration::default(), None);
        assert!(faults.is_empty());

        let ts = sample.timestamp.unwrap();
        assert_eq!(ts.date_string(), "2025-05-18");
        assert_eq!(ts.time_string(), "12:00:00");
        assert_eq!(sample.temperature_c, Some(23.5));
        assert_eq!(sample.humidity_pct, Some(45.0));
        assert_eq!(sample.soil.unwrap().level.as_str(), "Wet");
        let batt = sample.battery.unwrap();
        assert_eq!(batt.voltage_mv, 3874.3);
        assert_eq!(batt.charge_pct, 87.0);
        assert!(!sample.time_suspect);
    }

    #[test]
    fn failed_sensor_omits_fields_instead_of_zeroing() {
        let mut set = MockSet::new().clock_time(noon()).sensor_fails().build();

        let (sample, faults) = acquire(&mut set, &SoilCalibration::default(), None);
        assert_eq!(sample.temperature_c, None);
        assert_eq!(sample.humidity_pct, None);
        assert!(sample.timestamp.is_some());
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].source, "SHT30");
        assert!(!faults[0].is_fatal());
    }

    #[test]
    fn failed_clock_still_yields_sensor_fields() {
        let mut set = MockSet::new()
            .clock_fails()
            .sensor_value(AbioticReading {
                temperature_c: 20.0,
                humidity_pct: 50.0,
            })
            .build();

        let (sample, faults) = acquire(&mut set, &SoilCalibration::default(), None);
        assert!(sample.timestamp.is_none());
        assert_eq!(sample.temperature_c, Some(20.0));
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].source, "Clock");
    }

    #[test]
    fn backward_clock_jump_flags_sample_as_suspect() {
        let mut set = MockSet::new().clock_time(noon()).build();
        let later = mock::reading(2025, 5, 18, 12, 5, 0);

        let (sample, faults) = acquire(&mut set, &SoilCalibration::default(), Some(&later));
        assert!(sample.time_suspect);
        assert!(sample.timestamp.is_some());
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].source, "Clock");
    }

    #[test]
    fn absent_capabilities_produce_no_fields_and_no_faults() {
        let mut set = MockSet::new().clock_time(noon()).build();
        let (sample, faults) = acquire(&mut set, &SoilCalibration::default(), None);
        assert!(sample.soil.is_none());
        assert!(sample.battery.is_none());
        assert!(faults.is_empty());
    }
}
