//! Configuration surface for the write-preparation core: the notification
//! severity threshold, the per-tick chunk cap, and the torn-trace retry
//! policy. Everything else (which rings to attach, where the output file
//! lives, how logs leave the process) is the embedder's problem.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracedump_wire::Severity;

#[derive(Debug, Clone, Deserialize)]
pub struct DumperConfig {
    #[serde(default = "defaults::threshold_severity")]
    pub threshold_severity: Severity,
    #[serde(default = "defaults::max_records_per_chunk")]
    pub max_records_per_chunk: u32,
    #[serde(default = "defaults::num_retries_on_partial_record")]
    pub num_retries_on_partial_record: u32,
    #[serde(default = "defaults::retry_wait_micros")]
    pub retry_wait_micros: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

impl DumperConfig {
    pub fn retry_wait(&self) -> Duration {
        Duration::from_micros(self.retry_wait_micros)
    }

    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: DumperConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}

impl Default for DumperConfig {
    fn default() -> Self {
        Self {
            threshold_severity: defaults::threshold_severity(),
            max_records_per_chunk: defaults::max_records_per_chunk(),
            num_retries_on_partial_record: defaults::num_retries_on_partial_record(),
            retry_wait_micros: defaults::retry_wait_micros(),
            log_level: defaults::log_level(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    use tracedump_wire::Severity;

    pub fn threshold_severity() -> Severity {
        Severity::Warn
    }

    pub fn max_records_per_chunk() -> u32 {
        1024
    }

    pub fn num_retries_on_partial_record() -> u32 {
        3
    }

    pub fn retry_wait_micros() -> u64 {
        10
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_constants() {
        let c = DumperConfig::default();
        assert_eq!(c.threshold_severity, Severity::Warn);
        assert_eq!(c.max_records_per_chunk, 1024);
        assert_eq!(c.num_retries_on_partial_record, 3);
        assert_eq!(c.retry_wait_micros, 10);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let c: DumperConfig = toml::from_str("max_records_per_chunk = 256\n").unwrap();
        assert_eq!(c.max_records_per_chunk, 256);
        assert_eq!(c.threshold_severity, Severity::Warn);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = DumperConfig::load("/nonexistent/tracedump.toml".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
