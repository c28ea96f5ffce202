use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub audit: AuditConfig,
    pub directory: DirectoryConfig,
    pub pin: PinConfig,
    pub server: ServerConfig,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
    /// Add the `Secure` attribute to the session cookie (set behind HTTPS)
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct PinConfig {
    /// Consecutive failures that trigger a lockout
    pub max_attempts: u32,
    pub lockout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Interval of the host maintenance sweep; 0 disables it
    pub cleanup_interval_seconds: u64,
    pub session_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub retention_days: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    /// JSON file with the household members; empty directory when unset
    pub members_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
            secure_cookies: false,
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_seconds: 900, // 15 minutes
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: 3600,
            session_ttl_seconds: 86400, // 24 hours
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { retention_days: 90 }
    }
}

impl PinConfig {
    pub fn lockout(&self) -> Duration {
        Duration::seconds(self.lockout_seconds as i64)
    }
}

impl TokenConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_seconds as i64)
    }
}

/// Read a numeric environment variable, falling back to `default` when unset.
fn env_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("{name} must be a number"))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or(defaults.server.bind_address);
        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.server.data_dir);
        let secure_cookies = std::env::var("SECURE_COOKIES")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let members_file = std::env::var("MEMBERS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let config = Config {
            audit: AuditConfig {
                retention_days: env_number("AUDIT_RETENTION_DAYS", defaults.audit.retention_days)?,
            },
            directory: DirectoryConfig { members_file },
            pin: PinConfig {
                max_attempts: env_number("PIN_MAX_ATTEMPTS", defaults.pin.max_attempts)?,
                lockout_seconds: env_number("PIN_LOCKOUT_SECONDS", defaults.pin.lockout_seconds)?,
            },
            server: ServerConfig {
                bind_address,
                data_dir,
                secure_cookies,
            },
            tokens: TokenConfig {
                cleanup_interval_seconds: env_number(
                    "MAINTENANCE_INTERVAL_SECONDS",
                    defaults.tokens.cleanup_interval_seconds,
                )?,
                session_ttl_seconds: env_number(
                    "SESSION_TTL_SECONDS",
                    defaults.tokens.session_ttl_seconds,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pin.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "PIN_MAX_ATTEMPTS must be greater than 0".to_string(),
            ));
        }
        if self.pin.lockout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "PIN_LOCKOUT_SECONDS must be greater than 0".to_string(),
            ));
        }
        if self.tokens.session_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "SESSION_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }
        if self.audit.retention_days == 0 {
            return Err(ConfigError::ValidationError(
                "AUDIT_RETENTION_DAYS must be greater than 0".to_string(),
            ));
        }

        if !self.server.secure_cookies {
            tracing::warn!(
                "SECURE_COOKIES is off. Session cookies will be sent over plain HTTP."
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_household_policy() {
        let config = Config::default();
        assert_eq!(config.pin.max_attempts, 5);
        assert_eq!(config.pin.lockout(), Duration::minutes(15));
        assert_eq!(config.tokens.session_ttl(), Duration::hours(24));
        assert_eq!(config.audit.retention_days, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.pin.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tokens.session_ttl_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audit.retention_days = 0;
        assert!(config.validate().is_err());
    }
}
