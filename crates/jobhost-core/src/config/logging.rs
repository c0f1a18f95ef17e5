//! Logging configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output shape of the server's log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Multi-line human-readable output
    Pretty,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Pretty => f.write_str("pretty"),
        }
    }
}

/// Server logging settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `"info"` or `"info,jobhost_plugin=debug"`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        let config: LoggingConfig = serde_json::from_str(r#"{"format": "pretty"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "info");
        assert_eq!(LogFormat::default().to_string(), "json");
        assert!(serde_json::from_str::<LoggingConfig>(r#"{"format": "xml"}"#).is_err());
    }
}
