// TerraLog — Firmware Entry Point
//
// One wake of the device, end to end:
//   1. Bring up buses, drivers, SD card and the error-log sink.
//   2. Hand the peripheral set to the scheduler for one sampling burst.
//   3. Enter timed deep sleep; the next wake starts over from step 1.
//
// A fatal fault at any point maps to the same shape: report, short pause
// so the error panel is readable, deep sleep with backoff, retry on wake.

mod drivers;
mod hw;

use std::time::Duration;

use esp_idf_hal::delay::FreeRtos;

use terralog::config::LoggerConfig;
use terralog::peripherals::Clock;
use terralog::sample::ClockReading;
use terralog::scheduler::{CycleOutcome, Scheduler};

fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("TerraLog firmware starting…");

    // Deployment variant: battery gauge + soil probe, 3-minute cadence.
    // Bench units use `LoggerConfig::minimal()` or `::with_battery()`.
    let config = LoggerConfig::field();

    let mut reporter = hw::open_error_log();

    let peripherals = match hw::bootstrap(&config, &mut reporter) {
        Ok(set) => set,
        Err(_fault) => {
            // Already reported by the bring-up; leave the message on screen
            // for a moment, then back off and retry on the next wake.
            FreeRtos::delay_ms(config.fatal_pause.as_millis() as u32);
            enter_deep_sleep(config.reset_backoff);
        }
    };

    let outcome = Scheduler::new(config, peripherals, reporter, FreeRtos).run();
    match outcome {
        CycleOutcome::Sleep { duration } => enter_deep_sleep(duration),
        CycleOutcome::Reset { backoff } => enter_deep_sleep(backoff),
    }
}

/// Timed deep sleep. Does not return; the wake is a full reboot through
/// `main`.
fn enter_deep_sleep(duration: Duration) -> ! {
    unsafe {
        esp_idf_sys::esp_sleep_enable_timer_wakeup(duration.as_micros() as u64);
        esp_idf_sys::esp_deep_sleep_start();
    }
}

/// Commissioning helper: write a known-good calendar time into the DS3231
/// once, from a scratch build, then flash the regular firmware. Kept out
/// of the boot path on purpose.
#[allow(dead_code)]
fn set_rtc_time(clock: &mut dyn Clock) -> anyhow::Result<()> {
    clock.set(&ClockReading {
        year: 2025,
        month: 5,
        day: 18,
        hour: 19,
        minute: 6,
        second: 0,
        weekday: 6,
        yearday: 138,
    })?;
    Ok(())
}
