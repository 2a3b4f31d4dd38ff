use std::sync::OnceLock;

use crate::groups;

/// Primary configuration struct containing all config sections
#[derive(Debug, Clone, Default)]
pub struct B2Config {
    pub client: groups::client::ConfigValues,
    pub transfer: groups::transfer::ConfigValues,
}

impl B2Config {
    /// Create a new config instance with default values and environment
    /// variable overrides applied. Equivalent to
    /// `B2Config::default().with_env_overrides()`.
    pub fn new() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides to all configuration sections.
    /// Returns a new `B2Config` instance with overrides applied.
    /// Environment variables follow the pattern `B2_{GROUP_NAME}_{FIELD_NAME}`.
    pub fn with_env_overrides(mut self) -> Self {
        self.client.apply_env_overrides();
        self.transfer.apply_env_overrides();
        self
    }
}

/// Process-wide configuration, loaded once on first access.
pub fn b2_config() -> &'static B2Config {
    static CONFIG: OnceLock<B2Config> = OnceLock::new();
    CONFIG.get_or_init(B2Config::new)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = B2Config::default();
        assert_eq!(config.client.retry_max_attempts, 4);
        assert_eq!(config.client.part_retry_delay, Duration::from_secs(1));
        assert_eq!(config.transfer.min_part_size, 5 * 1024 * 1024);
        assert_eq!(config.transfer.max_part_number, 10_000);
    }

    #[test]
    fn env_overrides_apply_per_group() {
        std::env::set_var("B2_CLIENT_RETRY_MAX_ATTEMPTS", "9");
        std::env::set_var("B2_CLIENT_PART_RETRY_DELAY", "50ms");
        std::env::set_var("B2_TRANSFER_MIN_PART_SIZE", "not a size");

        let config = B2Config::new();
        assert_eq!(config.client.retry_max_attempts, 9);
        assert_eq!(config.client.part_retry_delay, Duration::from_millis(50));
        // Unparsable values fall back to the default.
        assert_eq!(config.transfer.min_part_size, 5 * 1024 * 1024);

        std::env::remove_var("B2_CLIENT_RETRY_MAX_ATTEMPTS");
        std::env::remove_var("B2_CLIENT_PART_RETRY_DELAY");
        std::env::remove_var("B2_TRANSFER_MIN_PART_SIZE");
    }
}
