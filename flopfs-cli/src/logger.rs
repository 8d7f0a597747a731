//! Stderr logger for the `flopfs` tool.

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level = record.level();
            eprintln!("{level:5} {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the logger. With `trace` every filesystem operation is shown,
/// otherwise only warnings and errors.
pub fn init(trace: bool) {
    let level = if trace {
        LevelFilter::Trace
    } else {
        LevelFilter::Warn
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
