// TerraLog — CSV Persistence Sink
//
// Owns the file lifecycle on the mounted volume: create-with-header only if
// the file is absent, append one line per sample, unmount at the end of the
// burst. Every append opens and closes the file, so a power cut between
// samples loses nothing that was already taken.

use crate::config::CapabilitySet;
use crate::peripherals::{PeripheralError, Storage};
use crate::sample::Sample;

/// Fixed, versioned column header for the capability set. The header is
/// written exactly once per file and never rewritten afterwards.
pub fn header(caps: CapabilitySet) -> String {
    let mut columns = String::from("Date,Time,Temperature,Humidity");
    if caps.battery {
        columns.push_str(",Battery_V,Battery_%");
    }
    if caps.soil {
        columns.push_str(",Soil_Level,Soil_Raw,Soil_%,Soil_V");
    }
    columns
}

pub struct CsvSink {
    file: &'static str,
    caps: CapabilitySet,
}

impl CsvSink {
    pub fn new(file: &'static str, caps: CapabilitySet) -> Self {
        Self { file, caps }
    }

    /// Idempotent: consults the root listing and creates the file with its
    /// header only when absent. Calling this twice never duplicates or
    /// alters the header line.
    pub fn ensure_header(&self, storage: &mut dyn Storage) -> Result<(), PeripheralError> {
        let entries = storage.root_entries()?;
        if entries.iter().any(|name| name == self.file) {
            log::info!("CSV file present");
            return Ok(());
        }
        storage.create(self.file, &format!("{}\n", header(self.caps)))
    }

    /// Serialize and append one sample. Refuses a sample without a
    /// timestamp — a dated gap in the file beats an undatable line.
    /// Enabled-but-failed fields serialize as empty cells so the column
    /// layout stays fixed.
    pub fn append(&self, storage: &mut dyn Storage, sample: &Sample) -> Result<(), PeripheralError> {
        let line = self.serialize(sample)?;
        storage.append(self.file, &line)
    }

    fn serialize(&self, sample: &Sample) -> Result<String, PeripheralError> {
        let ts = sample
            .timestamp
            .as_ref()
            .ok_or_else(|| PeripheralError::Data("sample has no timestamp".into()))?;

        let mut line = format!(
            "{},{},{},{}",
            ts.date_string(),
            ts.time_string(),
            fmt_opt1(sample.temperature_c),
            fmt_opt1(sample.humidity_pct),
        );

        if self.caps.battery {
            match &sample.battery {
                Some(b) => {
                    line.push_str(&format!(",{:.1},{:.0}", b.voltage_mv, b.charge_pct));
                }
                None => line.push_str(",,"),
            }
        }

        if self.caps.soil {
            match &sample.soil {
                Some(s) => {
                    line.push_str(&format!(
                        ",{},{},{:.1},{:.3}",
                        s.level.as_str(),
                        s.raw,
                        s.percentage,
                        s.voltage
                    ));
                }
                None => line.push_str(",,,,"),
            }
        }

        line.push('\n');
        Ok(line)
    }
}

fn fmt_opt1(v: Option<f32>) -> String {
    match v {
        Some(v) => format!("{:.1}", v),
        None => String::new(),
    }
}
