//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::settings::{LogLevel, Settings};

/// Build the filter directive string for a log level and `-v` count.
///
/// Each `-v` raises PlantMama's own crates one level; three or more enable
/// `trace` everywhere.
pub fn filter_directives(level: LogLevel, verbosity: u8) -> String {
    let own = match verbosity {
        0 => level.as_filter(),
        1 => "debug",
        2 => "trace",
        _ => return "trace".to_string(),
    };

    format!(
        "{own},plantmama_core={own},plantmama_agent={own},plantmama_telegram={own},\
         plantmama_persistence={own},teloxide=warn,reqwest=warn,hyper=warn",
        own = own
    )
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `LOG_LEVEL` when set. Debug mode writes human
/// readable lines; otherwise every event is a JSON object.
pub fn init_logging(settings: &Settings, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(filter_directives(settings.log_level, verbosity))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if settings.debug {
        builder.with_target(false).try_init()
    } else {
        builder.json().with_current_span(false).try_init()
    };

    match result {
        Ok(()) => tracing::info!(level = %settings.log_level, json = !settings.debug, "Logging configured"),
        Err(e) => tracing::debug!(error = %e, "Tracing subscriber already installed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_follow_level() {
        let d = filter_directives(LogLevel::Warning, 0);
        assert!(d.starts_with("warn,"));
        assert!(d.contains("plantmama_agent=warn"));
        assert!(d.contains("teloxide=warn"));
    }

    #[test]
    fn test_critical_maps_to_error() {
        assert!(filter_directives(LogLevel::Critical, 0).starts_with("error,"));
    }

    #[test]
    fn test_verbosity_raises_level() {
        assert!(filter_directives(LogLevel::Error, 1).contains("plantmama_telegram=debug"));
        assert!(filter_directives(LogLevel::Info, 2).contains("plantmama_core=trace"));
        assert_eq!(filter_directives(LogLevel::Info, 5), "trace");
    }

    #[test]
    fn test_directives_parse() {
        for v in 0..3 {
            assert!(EnvFilter::try_new(filter_directives(LogLevel::Info, v)).is_ok());
        }
    }
}
