//! Test logger that keeps every formatted record in memory

use log::{LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, Once};

struct CaptureLogger {
    lines: Mutex<Vec<String>>,
}

static LOGGER: CaptureLogger = CaptureLogger {
    lines: Mutex::new(Vec::new()),
};
static INSTALL: Once = Once::new();

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let line = format!("{} {}", record.level(), record.args());
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    fn flush(&self) {}
}

/// Installs the capturing logger for this test binary
pub fn install() {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Captured lines containing `needle`; tests share the logger, so each test
/// filters on a label of its own
pub fn lines_containing(needle: &str) -> Vec<String> {
    LOGGER
        .lines
        .lock()
        .map(|lines| {
            lines
                .iter()
                .filter(|line| line.contains(needle))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
