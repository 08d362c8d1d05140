//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    GatewayConfig, InteractionConfig, LogOutput, LoggingConfig, RetryConfig, TetherConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &TetherConfig) -> ConfigResult<()> {
    validate_gateway_config(&config.gateway)?;
    validate_interaction_config(&config.interactions)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_gateway_config(gateway: &GatewayConfig) -> ConfigResult<()> {
    if gateway.token.trim().is_empty() {
        return Err(ConfigError::missing_field("gateway.token"));
    }

    if gateway.application_id == 0 {
        return Err(ConfigError::missing_field("gateway.application_id"));
    }

    if !gateway.api_base.starts_with("http://") && !gateway.api_base.starts_with("https://") {
        return Err(ConfigError::invalid_url(
            &gateway.api_base,
            "API base must start with http:// or https://",
        ));
    }

    if gateway.request_timeout_ms == 0 {
        return Err(ConfigError::validation("Request timeout must be greater than 0"));
    }

    if gateway.ack_poll_interval_ms == 0 || gateway.ack_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Heartbeat ACK poll interval and timeout must be greater than 0",
        ));
    }

    if gateway.ack_poll_interval_ms > gateway.ack_timeout_ms {
        return Err(ConfigError::validation(
            "Heartbeat ACK poll interval cannot exceed the ACK timeout",
        ));
    }

    if gateway.ack_wait_attempts == 0 {
        return Err(ConfigError::validation(
            "At least one heartbeat ACK wait is required",
        ));
    }

    if gateway.max_rate_limit_attempts == 0 {
        return Err(ConfigError::validation(
            "At least one rate-limited attempt is required",
        ));
    }

    validate_retry_config(&gateway.retry)
}

fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }

    Ok(())
}

fn validate_interaction_config(interactions: &InteractionConfig) -> ConfigResult<()> {
    if interactions.custom_id_ttl_secs == 0 {
        return Err(ConfigError::validation(
            "Custom id lifetime must be greater than 0",
        ));
    }
    if interactions.sweep_interval_secs == 0 {
        return Err(ConfigError::validation(
            "Custom id sweep interval must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TetherConfig {
        let mut config = TetherConfig::default();
        config.gateway.token = "secret".into();
        config.gateway.application_id = 20;
        config
    }

    #[test]
    fn test_validate_complete_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_defaults_lack_credentials() {
        let result = validate_config(&TetherConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingField { field }) if field == "gateway.token"));

        let mut config = valid();
        config.gateway.application_id = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_timeouts_and_retry() {
        let mut config = valid();
        config.gateway.ack_timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.gateway.ack_poll_interval_ms = config.gateway.ack_timeout_ms + 1;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.gateway.retry.max_delay_ms = 10;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = valid();
        config.gateway.retry.backoff_multiplier = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_api_base_and_log_file() {
        let mut config = valid();
        config.gateway.api_base = "discord.com".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
    }
}
