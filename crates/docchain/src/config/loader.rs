use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.worker_count == 0 {
        return Err(invalid("worker_count must be at least 1"));
    }

    if config.poll_interval_ms == 0 {
        return Err(invalid("poll_interval_ms must be greater than 0"));
    }

    let extraction = &config.extraction;
    if extraction.window_size == 0 {
        return Err(invalid("extraction.window_size must be greater than 0"));
    }
    if extraction.window_overlap >= extraction.window_size {
        return Err(invalid(format!(
            "extraction.window_overlap ({}) must be smaller than window_size ({})",
            extraction.window_overlap, extraction.window_size
        )));
    }
    if extraction.max_windows == 0 {
        return Err(invalid("extraction.max_windows must be at least 1"));
    }
    if !(extraction.min_plausible_amount > 0.0) {
        return Err(invalid("extraction.min_plausible_amount must be positive"));
    }

    if config.inference.timeout_secs == 0 {
        return Err(invalid("inference.timeout_secs must be greater than 0"));
    }
    if config.inference.enabled && config.inference.endpoint.trim().is_empty() {
        return Err(invalid("inference.endpoint is required when inference is enabled"));
    }

    if config.chains.overdue_after_days <= 0 {
        return Err(invalid("chains.overdue_after_days must be positive"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.recent_completed_per_submitter, 10);
        assert_eq!(config.extraction.window_size, 2000);
        assert_eq!(config.extraction.max_windows, 5);
        assert_eq!(config.inference.model, "mistral");
        assert_eq!(config.chains.overdue_after_days, 90);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "worker_count": 5,
            "poll_interval_ms": 250,
            "database_path": "/var/lib/docchain/ledger.db",
            "storage_directory": "/var/lib/docchain/documents",
            "inference": {
                "enabled": false,
                "endpoint": "http://ollama:11434",
                "model": "llama3",
                "timeout_secs": 30
            },
            "extraction": {
                "window_size": 1000,
                "window_overlap": 400,
                "max_windows": 3,
                "min_plausible_amount": 50.0
            },
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.worker_count, 5);
        assert!(!config.inference.enabled);
        assert_eq!(config.inference.timeout_secs, 30);
        assert_eq!(config.extraction.window_overlap, 400);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.resolved_database_path().unwrap(),
            std::path::PathBuf::from("/var/lib/docchain/ledger.db")
        );
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let result = load_config_from_str(r#"{ "version": "1.0", "worker_count": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_window() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "extraction": { "window_size": 500, "window_overlap": 500 } }"#,
        );
        match result {
            Err(ConfigError::Validation { message }) => {
                assert!(message.contains("window_overlap"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/definitely/not/here/docchain.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
