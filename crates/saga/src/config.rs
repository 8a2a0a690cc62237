//! Saga configuration loaded from environment variables.

use std::time::Duration;

/// Timing configuration shared by all coordinators.
///
/// Reads from environment variables:
/// - `SAGA_RESPONSE_TIMEOUT_SECS` — global response-wait timeout (default: `5`)
/// - `SAGA_DELETE_CONFIRM_DELAY_MS` — grace period before the delete
///   confirmation probe (default: `500`)
#[derive(Debug, Clone, Copy)]
pub struct SagaConfig {
    /// How long a step waits for its correlated response.
    pub response_timeout: Duration,

    /// Fixed delay between issuing a DELETE and probing for existence.
    pub delete_confirm_delay: Duration,
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            response_timeout: std::env::var("SAGA_RESPONSE_TIMEOUT_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.response_timeout),
            delete_confirm_delay: std::env::var("SAGA_DELETE_CONFIRM_DELAY_MS")
                .ok()
                .and_then(|value| value.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.delete_confirm_delay),
        }
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            delete_confirm_delay: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = SagaConfig::default();
        assert_eq!(config.response_timeout, Duration::from_secs(5));
        assert_eq!(config.delete_confirm_delay, Duration::from_millis(500));
    }
}
