use chrono::Local;
use log::{set_logger, set_max_level, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

static LOGGER: Logger = Logger;

/// Installs the process logger. Records of dependencies are only shown from `WARN` upwards.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    set_logger(&LOGGER)?;
    set_max_level(level);
    Ok(())
}

#[derive(Copy, Clone, Debug)]
pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("prediction_contest") || metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = Local::now().format("%Y-%m-%d %H:%M:%S");

        let line = format!(
            "[{}] [{}:{}] [{}] {}",
            now,
            record.file().unwrap_or("???"),
            record.line().unwrap_or(0),
            record.level(),
            record.args()
        );

        // Warnings and errors go to stderr so command output stays clean.
        if record.level() <= Level::Warn {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use log::{Level, Log, Metadata};

    use super::Logger;

    #[test]
    fn test_logger_enabled() {
        let own = Metadata::builder()
            .target("prediction_contest_core::rescore")
            .level(Level::Debug)
            .build();
        assert!(Logger.enabled(&own));

        let dependency = Metadata::builder()
            .target("sqlx::query")
            .level(Level::Info)
            .build();
        assert!(!Logger.enabled(&dependency));

        let warning = Metadata::builder()
            .target("sqlx::query")
            .level(Level::Warn)
            .build();
        assert!(Logger.enabled(&warning));
    }
}
