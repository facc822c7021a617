use core::fmt::Write;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

#[cfg(feature = "verbose")]
const MAX_LEVEL: LevelFilter = LevelFilter::Trace;
#[cfg(not(feature = "verbose"))]
const MAX_LEVEL: LevelFilter = LevelFilter::Info;

static LOGGER: UefiLogger = UefiLogger::new(MAX_LEVEL);

/// A `log` sink for the firmware's text output protocols.
pub struct UefiLogger {
    max_level: LevelFilter,
}

impl UefiLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install the logger. Call this once, after `uefi::helpers::init`.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn init() -> Result<&'static Self, SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(LOGGER.max_level);
        Ok(&LOGGER)
    }
}

impl Log for UefiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message"
        if cfg!(feature = "console") {
            uefi::println!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        } else {
            // StdErr is usually routed to a serial port, if anywhere.
            uefi::system::with_stderr(|out| {
                let _ = writeln!(
                    out,
                    "[{}] {}: {}",
                    record.level(),
                    record.target(),
                    record.args()
                );
            });
        }
    }

    fn flush(&self) {}
}
