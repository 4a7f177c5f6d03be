//! Server configuration module
//! Builds the single immutable configuration shared by every component

use crate::auth::password::HashingCost;
use crate::constants::{
    DEFAULT_AUTH_MIN_DURATION_MS, DEFAULT_HASH_ITERATIONS, DEFAULT_HASH_MEMORY_KIB, DEFAULT_HOST,
    DEFAULT_PORT, DEFAULT_TOKEN_LIFETIME_HOURS, MAX_TOKEN_LIFETIME_HOURS, MIN_SECRET_LENGTH,
};
use crate::error::{EcoshareError, Result};
use std::env;
use std::fmt;
use std::time::Duration;

/// Account created at startup when it does not exist yet
#[derive(Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Server configuration parameters
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for token signing/validation
    pub jwt_secret: String,
    /// How long an issued token stays valid
    pub token_lifetime: Duration,
    /// Argon2 cost parameters
    pub hashing_cost: HashingCost,
    /// Minimum wall time of a login or registration attempt
    pub auth_min_duration: Duration,
    pub bootstrap_admin: Option<AdminBootstrap>,
    /// TLS configuration
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    /// Enable TLS
    pub enable_tls: bool,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("token_lifetime", &self.token_lifetime)
            .field("hashing_cost", &self.hashing_cost)
            .field("auth_min_duration", &self.auth_min_duration)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("enable_tls", &self.enable_tls)
            .finish()
    }
}

impl ServerConfig {
    /// Create a configuration with defaults around a validated signing secret
    pub fn new(jwt_secret: impl Into<String>) -> Result<Self> {
        let jwt_secret = jwt_secret.into();
        Self::validate_jwt_secret(&jwt_secret)?;

        Ok(Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            jwt_secret,
            token_lifetime: Duration::from_secs(DEFAULT_TOKEN_LIFETIME_HOURS * 3600),
            hashing_cost: HashingCost::default(),
            auth_min_duration: Duration::from_millis(DEFAULT_AUTH_MIN_DURATION_MS),
            bootstrap_admin: None,
            tls_cert_path: None,
            tls_key_path: None,
            enable_tls: false,
        })
    }

    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    pub fn with_hashing_cost(mut self, cost: HashingCost) -> Self {
        self.hashing_cost = cost;
        self
    }

    pub fn with_auth_min_duration(mut self, duration: Duration) -> Self {
        self.auth_min_duration = duration;
        self
    }

    pub fn with_bootstrap_admin(mut self, admin: AdminBootstrap) -> Self {
        self.bootstrap_admin = Some(admin);
        self
    }

    /// Validate that a secret meets security requirements
    fn validate_secret(secret: &str, secret_type: &str) -> Result<()> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(EcoshareError::ConfigError(format!(
                "{} secret must be at least {} characters long",
                secret_type, MIN_SECRET_LENGTH
            )));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-secret-key",
            "change-this",
            "changeme",
            "test-secret",
            "default",
            "secret",
            "password",
            "12345",
        ];

        for pattern in &insecure_patterns {
            if secret.to_lowercase().contains(pattern) {
                return Err(EcoshareError::ConfigError(format!(
                    "{} secret contains insecure pattern '{}'. Please use a secure random secret generated with: openssl rand -base64 32",
                    secret_type, pattern
                )));
            }
        }

        // Ensure some complexity
        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EcoshareError::ConfigError(format!(
                "{} secret should contain mixed characters (letters, numbers, symbols) for security",
                secret_type
            )));
        }

        Ok(())
    }

    /// Validate JWT secret meets security requirements
    fn validate_jwt_secret(secret: &str) -> Result<()> {
        Self::validate_secret(secret, "JWT")
    }

    fn validate_token_lifetime_hours(hours: u64) -> Result<()> {
        if hours == 0 || hours > MAX_TOKEN_LIFETIME_HOURS {
            return Err(EcoshareError::ConfigError(format!(
                "Token lifetime must be between 1 and {} hours, got {}",
                MAX_TOKEN_LIFETIME_HOURS, hours
            )));
        }
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env::var("ECOSHARE_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("ECOSHARE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let jwt_secret = env::var("ECOSHARE_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .map_err(|_| {
                EcoshareError::ConfigError(
                    "JWT_SECRET environment variable is required for security. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;

        let token_lifetime_hours = env::var("ECOSHARE_TOKEN_LIFETIME_HOURS")
            .ok()
            .and_then(|h| h.parse().ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_HOURS);

        let memory_kib = env::var("ECOSHARE_HASH_MEMORY_KIB")
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(DEFAULT_HASH_MEMORY_KIB);

        let iterations = env::var("ECOSHARE_HASH_ITERATIONS")
            .ok()
            .and_then(|i| i.parse().ok())
            .unwrap_or(DEFAULT_HASH_ITERATIONS);

        let auth_min_ms = env::var("ECOSHARE_AUTH_MIN_DURATION_MS")
            .ok()
            .and_then(|d| d.parse().ok())
            .unwrap_or(DEFAULT_AUTH_MIN_DURATION_MS);

        let bootstrap_admin = match env::var("ECOSHARE_ADMIN_USERNAME").ok() {
            Some(username) => {
                let password = env::var("ECOSHARE_ADMIN_PASSWORD").map_err(|_| {
                    EcoshareError::ConfigError(
                        "ECOSHARE_ADMIN_USERNAME is set but ECOSHARE_ADMIN_PASSWORD is not"
                            .to_string(),
                    )
                })?;
                let email = env::var("ECOSHARE_ADMIN_EMAIL")
                    .unwrap_or_else(|_| format!("{}@localhost", username));
                Some(AdminBootstrap {
                    username,
                    password,
                    email,
                })
            }
            None => None,
        };

        // TLS configuration
        let enable_tls = env::var("ECOSHARE_ENABLE_TLS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let tls_cert_path = env::var("ECOSHARE_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("ECOSHARE_TLS_KEY_PATH").ok();

        // Validate TLS configuration if enabled
        if enable_tls {
            if tls_cert_path.is_none() || tls_key_path.is_none() {
                return Err(EcoshareError::ConfigError(
                    "TLS is enabled but ECOSHARE_TLS_CERT_PATH or ECOSHARE_TLS_KEY_PATH is not set"
                        .to_string(),
                ));
            }

            if let (Some(ref cert_path), Some(ref key_path)) = (&tls_cert_path, &tls_key_path) {
                if !std::path::Path::new(cert_path).exists() {
                    return Err(EcoshareError::ConfigError(format!(
                        "TLS certificate file does not exist: {}",
                        cert_path
                    )));
                }
                if !std::path::Path::new(key_path).exists() {
                    return Err(EcoshareError::ConfigError(format!(
                        "TLS private key file does not exist: {}",
                        key_path
                    )));
                }
            }
        }

        Self::validate_token_lifetime_hours(token_lifetime_hours)?;
        let hashing_cost = HashingCost::new(memory_kib, iterations)?;

        let mut config = Self::new(jwt_secret)?
            .with_token_lifetime(Duration::from_secs(token_lifetime_hours * 3600))
            .with_hashing_cost(hashing_cost)
            .with_auth_min_duration(Duration::from_millis(auth_min_ms));

        config.host = host;
        config.port = port;
        config.bootstrap_admin = bootstrap_admin;
        config.enable_tls = enable_tls;
        config.tls_cert_path = tls_cert_path;
        config.tls_key_path = tls_key_path;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_SECRET: &str = "k7Qz9vR2mX4pL8wN1bT6yH3jF5cD0sGa";

    #[test]
    fn test_new_accepts_strong_secret() {
        let config = ServerConfig::new(GOOD_SECRET).unwrap();
        assert_eq!(config.token_lifetime, Duration::from_secs(24 * 3600));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = ServerConfig::new("short-1").unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_insecure_pattern_rejected() {
        let result = ServerConfig::new("this-is-my-default-signing-key-0000000");
        assert!(matches!(result, Err(EcoshareError::ConfigError(_))));
    }

    #[test]
    fn test_alphabetic_only_secret_rejected() {
        let result = ServerConfig::new("abcdefghijklmnopqrstuvwxyzABCDEFGH");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ServerConfig::new(GOOD_SECRET).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains(GOOD_SECRET));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_token_lifetime_bounds() {
        assert!(ServerConfig::validate_token_lifetime_hours(0).is_err());
        assert!(ServerConfig::validate_token_lifetime_hours(24).is_ok());
        assert!(ServerConfig::validate_token_lifetime_hours(MAX_TOKEN_LIFETIME_HOURS + 1).is_err());
    }
}
