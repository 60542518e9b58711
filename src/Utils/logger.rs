//! Logger set-up for the binary and the examples. Library code only uses the `log` macros.
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::str::FromStr;

/// "off", "error", "warn", "info", "debug" or "trace"; unknown names fall back to info
pub fn level_from_str(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Info)
}

/// Console logger, plus a file logger when `log_file` is given. Returns false if a logger
/// was already installed (the first one stays active).
pub fn init_logger(level: LevelFilter, log_file: Option<&str>) -> bool {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(name) = log_file {
        match File::create(name) {
            Ok(file) => loggers.push(WriteLogger::new(level, Config::default(), file)),
            Err(e) => eprintln!("cannot create log file {}: {}", name, e),
        }
    }
    CombinedLogger::init(loggers).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_str() {
        assert_eq!(level_from_str("debug"), LevelFilter::Debug);
        assert_eq!(level_from_str(" WARN "), LevelFilter::Warn);
        assert_eq!(level_from_str("verbose"), LevelFilter::Info);
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_logger(LevelFilter::Warn, None);
        assert!(!init_logger(LevelFilter::Warn, None));
    }
}
