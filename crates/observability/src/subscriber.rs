//! `tracing-subscriber` installation.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event; the production format.
    #[default]
    Json,
    /// Human-readable lines for local development.
    Pretty,
}

impl LogFormat {
    /// `pretty` selects [`LogFormat::Pretty`]; anything else is JSON.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub format: LogFormat,
}

/// Selects [`LogFormat`] by name.
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            format: lookup(LOG_FORMAT_VAR)
                .map(|name| LogFormat::from_name(&name))
                .unwrap_or_default(),
            ..Self::default()
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

fn filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.default_filter))
}

/// Install the global subscriber. Returns `false` when one was already set.
pub fn install(settings: &LogSettings) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(settings))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match settings.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(LogFormat::from_name("Pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("anything"), LogFormat::Json);
    }

    #[test]
    fn format_is_read_from_log_format() {
        let pretty = LogSettings::from_lookup(|key| (key == "LOG_FORMAT").then(|| " pretty ".to_string()));
        assert_eq!(pretty.format, LogFormat::Pretty);
        assert_eq!(pretty.default_filter, "info");
        assert_eq!(LogSettings::from_lookup(|_| None), LogSettings::default());
    }

    #[test]
    fn second_install_is_a_no_op() {
        install(&LogSettings::default());
        assert!(!install(&LogSettings::default()));
        crate::init();
    }
}
