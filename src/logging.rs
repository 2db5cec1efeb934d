use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::error::{FinwiseError, Result};

const PATTERN: &str = "{d(%H:%M:%S)} {h({l})} {t} - {m}{n}";

pub fn parse_level(raw: &str) -> LevelFilter {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    }
}

/// Resolve the effective level: `--verbose` beats FINWISE_LOG, which beats settings.
pub fn resolve_level(verbose: bool, env_level: Option<&str>, settings_level: &str) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    parse_level(env_level.unwrap_or(settings_level))
}

/// Log to stderr so command output on stdout stays clean.
pub fn init(level: LevelFilter) -> Result<()> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| FinwiseError::Settings(format!("Invalid logging config: {e}")))?;

    log4rs::init_config(config)
        .map_err(|e| FinwiseError::Settings(format!("Could not initialize logging: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("error"), LevelFilter::Error);
        assert_eq!(parse_level("garbage"), LevelFilter::Warn);
    }

    #[test]
    fn test_resolve_level_precedence() {
        assert_eq!(resolve_level(true, Some("error"), "info"), LevelFilter::Debug);
        assert_eq!(resolve_level(false, Some("error"), "info"), LevelFilter::Error);
        assert_eq!(resolve_level(false, None, "info"), LevelFilter::Info);
    }
}
