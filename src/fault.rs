// TerraLog — Fault Reporter
//
// Every peripheral call in the control loop runs inside a fault boundary
// that turns failures into `FaultRecord`s. A record is mirrored to the
// process log, appended to a durable log sink, and (best-effort) rendered
// on the OLED — so a human can reconstruct what failed from either
// artifact. Escalation is by value: fatal records bubble up to the
// scheduler's top boundary, which maps them to a device reset with
// backoff; there is no in-process supervisor to restart anything else.

use std::io::Write;

use crate::config::DISPLAY_COLUMNS;
use crate::peripherals::Panel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Skip the affected field/iteration and keep the cycle going.
    Recoverable,
    /// Nothing meaningful can continue; reset the whole device.
    Fatal,
}

/// One fault, alive only for the duration of the handling call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRecord {
    pub source: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl FaultRecord {
    pub fn recoverable(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
            severity: Severity::Recoverable,
        }
    }

    pub fn fatal(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
            severity: Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// The append-only log line: `[source] message`.
    pub fn log_line(&self) -> String {
        format!("[{}] {}\n", self.source, self.message)
    }
}

/// Owns the durable log sink. Display mirroring is a separate step because
/// the display handle lives in the peripheral set, not here.
pub struct FaultReporter {
    sink: Option<Box<dyn Write + Send>>,
}

impl FaultReporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink: Some(sink) }
    }

    /// For boots where the log file could not be opened; faults still reach
    /// the process log.
    pub fn without_sink() -> Self {
        Self { sink: None }
    }

    /// Effects in order, each independently best-effort:
    /// (a) mirror to the process log, (b) append to the durable sink,
    /// (c) render the 3-line error panel. A failure in one never blocks
    /// the next; display failures are swallowed since the display itself
    /// may be the faulty component.
    pub fn report(&mut self, fault: &FaultRecord, display: &mut Option<Box<dyn Panel>>) {
        match fault.severity {
            Severity::Fatal => log::error!("[{}] {}", fault.source, fault.message),
            Severity::Recoverable => log::warn!("[{}] {}", fault.source, fault.message),
        }

        if let Some(sink) = &mut self.sink {
            let line = fault.log_line();
            if let Err(e) = sink.write_all(line.as_bytes()).and_then(|_| sink.flush()) {
                log::warn!("Could not write to error log: {}", e);
            }
        }

        if let Some(panel) = display {
            let truncated: String = fault.message.chars().take(DISPLAY_COLUMNS).collect();
            let source_row = format!("{}:", fault.source);
            let _ = panel.draw_rows(&["Error occurred!", &source_row, &truncated]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::PeripheralError;
    use std::sync::{Arc, Mutex};

    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct RecordingPanel {
        frames: Arc<Mutex<Vec<Vec<String>>>>,
        fail: bool,
    }

    impl Panel for RecordingPanel {
        fn draw_rows(&mut self, rows: &[&str]) -> Result<(), PeripheralError> {
            if self.fail {
                return Err(PeripheralError::Bus("display gone".into()));
            }
            self.frames
                .lock()
                .unwrap()
                .push(rows.iter().map(|r| r.to_string()).collect());
            Ok(())
        }
        fn set_sleep(&mut self, _sleeping: bool) -> Result<(), PeripheralError> {
            Ok(())
        }
    }

    #[test]
    fn log_line_format_matches_artifact() {
        let f = FaultRecord::recoverable("SD Unmount", "still busy");
        assert_eq!(f.log_line(), "[SD Unmount] still busy\n");
    }

    #[test]
    fn report_appends_to_sink_and_draws_panel() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let mut reporter = FaultReporter::new(Box::new(SharedSink(Arc::clone(&sink))));
        let mut display: Option<Box<dyn Panel>> = Some(Box::new(RecordingPanel {
            frames: Arc::clone(&frames),
            fail: false,
        }));

        let fault = FaultRecord::recoverable("Loop", "sensor timeout on iteration two");
        reporter.report(&fault, &mut display);

        let logged = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert_eq!(logged, "[Loop] sensor timeout on iteration two\n");

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], "Error occurred!");
        assert_eq!(frames[0][1], "Loop:");
        // Truncated to the 16-column display width.
        assert_eq!(frames[0][2], "sensor timeout o");
    }

    #[test]
    fn display_failure_is_swallowed_and_sink_still_written() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut reporter = FaultReporter::new(Box::new(SharedSink(Arc::clone(&sink))));
        let mut display: Option<Box<dyn Panel>> = Some(Box::new(RecordingPanel {
            frames: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }));

        reporter.report(&FaultRecord::fatal("Display", "flush failed"), &mut display);
        assert!(!sink.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_display_and_sink_are_fine() {
        let mut reporter = FaultReporter::without_sink();
        let mut display: Option<Box<dyn Panel>> = None;
        reporter.report(&FaultRecord::recoverable("I2C Bus 1", "No display found"), &mut display);
    }
}
