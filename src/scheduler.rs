// TerraLog — Cycle Scheduler
//
// The phase state machine driving one wake of the device:
//
//   Bootstrap -> Active(i = 0..4) -> Unmount -> SleepAnnounce -> DeepSleep
//
// Deep sleep cuts power to the controller, so there is no in-memory
// continuation: `run` consumes the context and returns a `CycleOutcome`
// telling the caller how long to suspend. On the real target the caller
// enters hardware deep sleep and the next wake rebuilds everything from
// scratch; in tests the caller builds a fresh context and calls `run`
// again, which is the same thing.
//
// Fault policy: bootstrap faults are structural and fatal (reset with
// backoff); everything after bootstrap is transient and recoverable — a
// failing iteration is reported and skipped, and the burst, the unmount
// and the sleep transition all still happen.

use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::acquire::acquire;
use crate::config::LoggerConfig;
use crate::fault::{FaultRecord, FaultReporter};
use crate::peripherals::PeripheralSet;
use crate::persist::CsvSink;
use crate::present;
use crate::sample::ClockReading;

/// Phases of one wake. `Active` carries the number of samples already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Bootstrap,
    Active { taken: u32 },
    Unmount,
    SleepAnnounce,
    DeepSleep,
}

/// What the caller must do once the state machine has run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Regular end of a burst: suspend for the configured duration.
    Sleep { duration: Duration },
    /// A fatal fault was reported: suspend briefly, wake re-enters bootstrap.
    Reset { backoff: Duration },
}

pub struct Scheduler<D: DelayNs> {
    config: LoggerConfig,
    peripherals: PeripheralSet,
    reporter: FaultReporter,
    sink: CsvSink,
    delay: D,
    /// Last trusted clock reading of this power session, for the
    /// monotonicity check.
    last_clock: Option<ClockReading>,
}

impl<D: DelayNs> Scheduler<D> {
    pub fn new(
        config: LoggerConfig,
        peripherals: PeripheralSet,
        reporter: FaultReporter,
        delay: D,
    ) -> Self {
        let sink = CsvSink::new(config.csv_file, peripherals.capabilities());
        Self {
            config,
            peripherals,
            reporter,
            sink,
            delay,
            last_clock: None,
        }
    }

    /// Drive the phase machine to its terminal state. This is the single
    /// top-level fault boundary: fatal faults from any phase land here and
    /// become a reset outcome, recoverable ones never escape their phase.
    pub fn run(mut self) -> CycleOutcome {
        let mut phase = Phase::Bootstrap;
        loop {
            phase = match phase {
                Phase::Bootstrap => match self.bootstrap() {
                    Ok(next) => next,
                    Err(fault) => {
                        self.report(&fault);
                        self.pause(self.config.fatal_pause);
                        return CycleOutcome::Reset {
                            backoff: self.config.reset_backoff,
                        };
                    }
                },
                Phase::Active { taken } => self.active(taken),
                Phase::Unmount => self.unmount(),
                Phase::SleepAnnounce => self.sleep_announce(),
                Phase::DeepSleep => {
                    log::info!(
                        "Deep sleep for {} s",
                        self.config.deep_sleep.as_secs()
                    );
                    return CycleOutcome::Sleep {
                        duration: self.config.deep_sleep,
                    };
                }
            };
        }
    }

    /// In-library part of bootstrap. The hardware is already up (the binary
    /// brought up buses, drivers and the mount before constructing this
    /// scheduler); what remains is the storage session: the CSV header must
    /// exist before the first append, and the free-space readout gives the
    /// operator a glance at remaining capacity.
    fn bootstrap(&mut self) -> Result<Phase, FaultRecord> {
        present::show_status(&mut self.peripherals.display, &["starting..."]);
        self.pause(Duration::from_millis(500));

        self.sink
            .ensure_header(self.peripherals.storage.as_mut())
            .map_err(|e| FaultRecord::fatal("CSV first Init", e.to_string()))?;

        match self.peripherals.storage.free_gigabytes() {
            Ok(gb) => {
                log::info!("{:.2} GB free", gb);
                present::show_storage_free(&mut self.peripherals.display, gb);
            }
            Err(e) => {
                self.report(&FaultRecord::recoverable("SD Storage", e.to_string()));
            }
        }
        self.pause(Duration::from_secs(1));

        Ok(Phase::Active { taken: 0 })
    }

    /// One sampling iteration. Failures are caught at the iteration
    /// boundary so a bad read never costs more than its own fields.
    fn active(&mut self, taken: u32) -> Phase {
        let (sample, faults) = acquire(
            &mut self.peripherals,
            &self.config.soil_cal,
            self.last_clock.as_ref(),
        );
        for fault in &faults {
            self.report(fault);
        }

        // Only a trusted timestamp becomes the monotonicity baseline; a
        // suspect one would poison the comparison for the rest of the burst.
        if !sample.time_suspect {
            if let Some(ts) = sample.timestamp {
                self.last_clock = Some(ts);
            }
        }

        if let Some(ts) = &sample.timestamp {
            log::info!(
                "Sample {}/{}: {} {}",
                taken + 1,
                self.config.samples_per_burst,
                ts.date_string(),
                ts.time_string()
            );
        }

        present::show_sample(&mut self.peripherals.display, &sample);

        if let Err(e) = self.sink.append(self.peripherals.storage.as_mut(), &sample) {
            self.report(&FaultRecord::recoverable("SD Write", e.to_string()));
        }

        self.pause(self.config.sample_interval);

        if taken + 1 < self.config.samples_per_burst {
            Phase::Active { taken: taken + 1 }
        } else {
            Phase::Unmount
        }
    }

    /// End of the storage session. Unmount is attempted exactly once and
    /// its failure is reported but never blocks the sleep transition —
    /// every appended line is already flushed.
    fn unmount(&mut self) -> Phase {
        match self.peripherals.storage.unmount() {
            Ok(()) => log::info!("SD unmounted"),
            Err(e) => self.report(&FaultRecord::recoverable("SD Unmount", e.to_string())),
        }

        present::show_status(&mut self.peripherals.display, &["SD unmounted"]);
        self.pause(self.config.unmount_hold);
        Phase::SleepAnnounce
    }

    /// Hold the countdown on screen long enough for a human to read it,
    /// then put the OLED into its own low-power mode.
    fn sleep_announce(&mut self) -> Phase {
        let buffer_s = self.config.sleep_buffer.as_secs();
        let sleep_min = self.config.deep_sleep.as_secs() / 60;
        let rows = [
            format!("Sleeping in {} s...", buffer_s),
            format!("Sleeptime: {} Min", sleep_min),
        ];
        log::info!("sleeping in {} s, sleeptime {} min", buffer_s, sleep_min);
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        present::show_status(&mut self.peripherals.display, &refs);

        self.pause(self.config.sleep_buffer);
        present::sleep_display(&mut self.peripherals.display);
        Phase::DeepSleep
    }

    fn report(&mut self, fault: &FaultRecord) {
        self.reporter.report(fault, &mut self.peripherals.display);
    }

    fn pause(&mut self, d: Duration) {
        self.delay.delay_ms(d.as_millis() as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultReporter;
    use crate::peripherals::tests::mock::{reading, MockSet};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Delay that records instead of sleeping; tests finish instantly.
    #[derive(Default)]
    struct RecordedDelay {
        ms: Arc<Mutex<Vec<u32>>>,
    }

    impl DelayNs for RecordedDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ms.lock().unwrap().push(ns / 1_000_000);
        }
        fn delay_us(&mut self, us: u32) {
            self.ms.lock().unwrap().push(us / 1_000);
        }
        fn delay_ms(&mut self, ms: u32) {
            self.ms.lock().unwrap().push(ms);
        }
    }

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

    fn ticking_clock() -> Vec<crate::sample::ClockReading> {
        (0..5).map(|i| reading(2025, 5, 18, 12, 0, i * 5)).collect()
    }

    fn scheduler_for(set: MockSet) -> Scheduler<RecordedDelay> {
        Scheduler::new(
            LoggerConfig::minimal(),
            set.build(),
            FaultReporter::without_sink(),
            RecordedDelay::default(),
        )
    }

    fn csv_lines(contents: &str) -> Vec<&str> {
        contents.lines().collect()
    }

    #[test]
    fn full_cycle_takes_five_samples_then_unmounts_and_sleeps() {
        let set = MockSet::new().clock_sequence(ticking_clock());
        let storage = set.storage();
        let panel = set.panel_log();

        let outcome = scheduler_for(set).run();
        assert_eq!(
            outcome,
            CycleOutcome::Sleep {
                duration: Duration::from_secs(60)
            }
        );

        let state = storage.lock().unwrap();
        let contents = state.files.get("data_one.csv").unwrap();
        let lines = csv_lines(contents);
        assert_eq!(lines.len(), 6); // header + 5 samples
        assert_eq!(lines[0], "Date,Time,Temperature,Humidity");
        assert_eq!(lines[1], "2025-05-18,12:00:00,21.0,40.0");
        assert_eq!(lines[5], "2025-05-18,12:00:20,21.0,40.0");
        assert!(state.unmounted);
        assert_eq!(state.unmount_attempts, 1);

        let panel = panel.lock().unwrap();
        // Display went to low-power exactly once, at sleep-announce.
        assert_eq!(panel.sleep_calls, vec![true]);
        // "SD unmounted" status was shown after the burst.
        assert!(panel.frames.iter().any(|f| f == &["SD unmounted".to_string()]));
    }

    #[test]
    fn failing_iteration_does_not_abort_burst_or_unmount() {
        let set = MockSet::new()
            .clock_sequence(ticking_clock())
            .sensor_fails_on_call(2);
        let storage = set.storage();

        let outcome = scheduler_for(set).run();
        assert!(matches!(outcome, CycleOutcome::Sleep { .. }));

        let state = storage.lock().unwrap();
        let contents = state.files.get("data_one.csv").unwrap();
        let lines = csv_lines(contents);
        assert_eq!(lines.len(), 6);
        // The failed read is an omitted field, not a missing line.
        assert_eq!(lines[2], "2025-05-18,12:00:05,,");
        assert_eq!(lines[3], "2025-05-18,12:00:10,21.0,40.0");
        assert!(state.unmounted);
    }

    #[test]
    fn boot_without_display_still_logs_the_burst() {
        let set = MockSet::new().clock_sequence(ticking_clock()).no_display();
        let storage = set.storage();

        let outcome = scheduler_for(set).run();
        assert!(matches!(outcome, CycleOutcome::Sleep { .. }));
        let state = storage.lock().unwrap();
        assert_eq!(csv_lines(state.files.get("data_one.csv").unwrap()).len(), 6);
        assert!(state.unmounted);
    }

    #[test]
    fn unmount_failure_still_reaches_deep_sleep() {
        let set = MockSet::new().clock_sequence(ticking_clock());
        let storage = set.storage();
        let panel = set.panel_log();
        storage.lock().unwrap().fail_unmount = true;

        let sink = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(
            LoggerConfig::minimal(),
            set.build(),
            FaultReporter::new(Box::new(SharedSink(Arc::clone(&sink)))),
            RecordedDelay::default(),
        );

        let outcome = scheduler.run();
        assert!(matches!(outcome, CycleOutcome::Sleep { .. }));

        let state = storage.lock().unwrap();
        assert_eq!(state.unmount_attempts, 1);
        assert!(!state.unmounted);

        let logged = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("[SD Unmount]"));
        // Sleep-announce still ran after the failed unmount.
        assert_eq!(panel.lock().unwrap().sleep_calls, vec![true]);
    }

    #[test]
    fn append_failure_is_recoverable_and_burst_still_unmounts() {
        let set = MockSet::new().clock_sequence(ticking_clock());
        let storage = set.storage();
        storage.lock().unwrap().fail_append = true;

        let sink = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(
            LoggerConfig::minimal(),
            set.build(),
            FaultReporter::new(Box::new(SharedSink(Arc::clone(&sink)))),
            RecordedDelay::default(),
        );

        let outcome = scheduler.run();
        assert!(matches!(outcome, CycleOutcome::Sleep { .. }));

        // Every iteration ran and reported its own write fault.
        let logged = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert_eq!(logged.matches("[SD Write]").count(), 5);

        let state = storage.lock().unwrap();
        // The header landed (created before the burst); no sample line did.
        assert_eq!(
            state.files.get("data_one.csv").unwrap(),
            "Date,Time,Temperature,Humidity\n"
        );
        assert_eq!(state.unmount_attempts, 1);
        assert!(state.unmounted);
    }

    #[test]
    fn header_creation_failure_is_fatal_and_resets_with_backoff() {
        let set = MockSet::new();
        let storage = set.storage();
        storage.lock().unwrap().fail_create = true;

        let sink = Arc::new(Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(
            LoggerConfig::minimal(),
            set.build(),
            FaultReporter::new(Box::new(SharedSink(Arc::clone(&sink)))),
            RecordedDelay::default(),
        );

        let outcome = scheduler.run();
        assert_eq!(
            outcome,
            CycleOutcome::Reset {
                backoff: Duration::from_secs(30)
            }
        );

        let logged = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert!(logged.starts_with("[CSV first Init]"));
        assert!(storage.lock().unwrap().files.is_empty());
    }

    #[test]
    fn wake_after_deep_sleep_rebuilds_everything_without_leaks() {
        // Two wakes sharing only the storage medium, exactly like the real
        // device: all volatile state is rebuilt, the header is not
        // duplicated, and the second burst lands after the first.
        let first = MockSet::new().clock_sequence(ticking_clock());
        let storage = first.storage();
        assert!(matches!(
            scheduler_for(first).run(),
            CycleOutcome::Sleep { .. }
        ));

        // Power-cycle: the medium is remounted by the next bootstrap.
        {
            let mut state = storage.lock().unwrap();
            state.unmounted = false;
        }

        let second = MockSet::new()
            .clock_sequence((0..5).map(|i| reading(2025, 5, 18, 12, 2, i * 5)).collect())
            .sharing_storage(&storage);
        assert!(matches!(
            scheduler_for(second).run(),
            CycleOutcome::Sleep { .. }
        ));

        let state = storage.lock().unwrap();
        let contents = state.files.get("data_one.csv").unwrap();
        let lines = csv_lines(contents);
        assert_eq!(lines.len(), 11); // one header + 2 bursts of 5
        assert_eq!(contents.matches("Date,Time").count(), 1);
        assert_eq!(lines[6], "2025-05-18,12:02:00,21.0,40.0");
        assert_eq!(state.unmount_attempts, 2);
    }

    #[test]
    fn burst_pacing_uses_the_configured_interval() {
        let delays = Arc::new(Mutex::new(Vec::new()));
        let set = MockSet::new().clock_sequence(ticking_clock());
        let scheduler = Scheduler::new(
            LoggerConfig::minimal(),
            set.build(),
            FaultReporter::without_sink(),
            RecordedDelay {
                ms: Arc::clone(&delays),
            },
        );
        scheduler.run();

        let delays = delays.lock().unwrap();
        // 5 inter-sample delays of 5 s each, one 15 s sleep buffer.
        assert_eq!(delays.iter().filter(|&&ms| ms == 5_000).count(), 6); // 5 samples + unmount hold
        assert_eq!(delays.iter().filter(|&&ms| ms == 15_000).count(), 1);
    }
}
