// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation of configuration values.
//!
//! Figment and serde catch structural problems (unknown keys, wrong types);
//! this module checks value ranges that the type system cannot express.
//! All violations are collected so the user sees every problem at once.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Returns every violation found, not just the first.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.bridge.poll_interval_secs <= 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "bridge.poll_interval_secs must be positive, got {}",
                config.bridge.poll_interval_secs
            ),
        });
    }

    if config.bridge.fetch_timeout_secs <= 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "bridge.fetch_timeout_secs must be positive, got {}",
                config.bridge.fetch_timeout_secs
            ),
        });
    }

    if config.bridge.send_timeout_secs <= 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "bridge.send_timeout_secs must be positive, got {}",
                config.bridge.send_timeout_secs
            ),
        });
    }

    if config.bridge.error_backoff_secs < 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "bridge.error_backoff_secs must not be negative, got {}",
                config.bridge.error_backoff_secs
            ),
        });
    }

    if config.bridge.dedup_window_secs < 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "bridge.dedup_window_secs must not be negative, got {}",
                config.bridge.dedup_window_secs
            ),
        });
    }

    if config.bridge.subscriber_queue_size == 0 {
        errors.push(ConfigError::Validation {
            message: "bridge.subscriber_queue_size must be at least 1".to_string(),
        });
    }

    if !VALID_LOG_LEVELS.contains(&config.bridge.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "bridge.log_level must be one of {}, got `{}`",
                VALID_LOG_LEVELS.join(", "),
                config.bridge.log_level
            ),
        });
    }

    if config.server.host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must be non-zero".to_string(),
        });
    }

    if config.storage.database_path.is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.imessage.chat_db_path.is_empty() {
        errors.push(ConfigError::Validation {
            message: "imessage.chat_db_path must not be empty".to_string(),
        });
    }

    if config.imessage.send_retry_count == 0 {
        errors.push(ConfigError::Validation {
            message: "imessage.send_retry_count must be at least 1".to_string(),
        });
    }

    if config.imessage.send_retry_delay_secs < 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "imessage.send_retry_delay_secs must not be negative, got {}",
                config.imessage.send_retry_delay_secs
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_of(err: &ConfigError) -> &str {
        match err {
            ConfigError::Validation { message } => message,
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = CourierConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut config = CourierConfig::default();
        config.bridge.poll_interval_secs = 0.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(message_of(&errors[0]).contains("bridge.poll_interval_secs"));
    }

    #[test]
    fn bad_log_level_rejected() {
        let mut config = CourierConfig::default();
        config.bridge.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(message_of(&errors[0]).contains("bridge.log_level"));
    }

    #[test]
    fn zero_port_rejected() {
        let mut config = CourierConfig::default();
        config.server.port = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(message_of(&errors[0]).contains("server.port"));
    }

    #[test]
    fn all_violations_collected() {
        let mut config = CourierConfig::default();
        config.bridge.poll_interval_secs = -1.0;
        config.bridge.subscriber_queue_size = 0;
        config.server.port = 0;
        config.imessage.send_retry_count = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn zero_dedup_window_allowed() {
        let mut config = CourierConfig::default();
        config.bridge.dedup_window_secs = 0.0;
        assert!(validate_config(&config).is_ok());
    }
}
