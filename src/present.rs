// TerraLog — Presentation
//
// Formats samples and status text into fixed display rows. Side effect
// only: a missing display is a no-op and a failing display is logged and
// swallowed, so a cosmetic fault can never abort data collection.

use crate::config::DISPLAY_MAX_ROWS;
use crate::peripherals::Panel;
use crate::sample::Sample;

/// Render one acquired sample. Missing fields show as `--` rather than a
/// fabricated value.
pub fn show_sample(display: &mut Option<Box<dyn Panel>>, sample: &Sample) {
    let (date, time) = match &sample.timestamp {
        Some(ts) => (ts.date_string(), ts.time_string()),
        None => ("--".to_string(), "--".to_string()),
    };

    let mut rows = vec![
        format!("Date: {}", date),
        format!("Time: {}", time),
        format!("Temp: {} C", fmt1(sample.temperature_c)),
        format!("Humi: {} %", fmt1(sample.humidity_pct)),
    ];
    if let Some(b) = &sample.battery {
        rows.push(format!("Batt: {:.1} mV", b.voltage_mv));
        rows.push(format!("Chrg: {:.0} %", b.charge_pct));
    }
    if let Some(s) = &sample.soil {
        rows.push(format!("Soil: {}", s.level.as_str()));
    }

    draw(display, &rows);
}

/// Render short status lines (sleep countdown, unmount notice...).
pub fn show_status(display: &mut Option<Box<dyn Panel>>, rows: &[&str]) {
    if let Some(panel) = display {
        let rows = &rows[..rows.len().min(DISPLAY_MAX_ROWS)];
        if let Err(e) = panel.draw_rows(rows) {
            log::warn!("Display error: {}", e);
        }
    }
}

/// Render the free-space readout taken right after mount.
pub fn show_storage_free(display: &mut Option<Box<dyn Panel>>, capacity_gb: f32) {
    let row = format!("SD: {:.2} GB", capacity_gb);
    draw(display, &[row]);
}

/// Blank the frame and put the panel into its own low-power mode.
pub fn sleep_display(display: &mut Option<Box<dyn Panel>>) {
    if let Some(panel) = display {
        let _ = panel.draw_rows(&[]);
        if let Err(e) = panel.set_sleep(true) {
            log::warn!("Display sleep error: {}", e);
        }
    }
}

fn fmt1(v: Option<f32>) -> String {
    match v {
        Some(v) => format!("{:.1}", v),
        None => "--".to_string(),
    }
}

fn draw(display: &mut Option<Box<dyn Panel>>, rows: &[String]) {
    if let Some(panel) = display {
        let refs: Vec<&str> = rows
            .iter()
            .take(DISPLAY_MAX_ROWS)
            .map(String::as_str)
            .collect();
        if let Err(e) = panel.draw_rows(&refs) {
            log::warn!("Display error: {}", e);
        }
    }
}
