//! Environment-driven configuration loading
//!
//! Environment variables are process-wide, so every scenario runs inside one
//! test function.

use ecoshare::config::ServerConfig;
use std::env;
use std::time::Duration;

const VARS: &[&str] = &[
    "ECOSHARE_JWT_SECRET",
    "JWT_SECRET",
    "ECOSHARE_TOKEN_LIFETIME_HOURS",
    "ECOSHARE_PORT",
    "ECOSHARE_ADMIN_USERNAME",
    "ECOSHARE_ADMIN_PASSWORD",
    "ECOSHARE_ADMIN_EMAIL",
    "ECOSHARE_ENABLE_TLS",
    "ECOSHARE_TLS_CERT_PATH",
    "ECOSHARE_TLS_KEY_PATH",
];

fn clear() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_config_from_env() {
    let saved: Vec<(&str, Option<String>)> =
        VARS.iter().map(|var| (*var, env::var(var).ok())).collect();

    // Missing signing secret aborts
    clear();
    let err = ServerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("JWT_SECRET"));

    // Weak secret aborts
    env::set_var("ECOSHARE_JWT_SECRET", "changeme-changeme-changeme-changeme-1");
    assert!(ServerConfig::from_env().is_err());

    // Fallback variable is honoured
    clear();
    env::set_var("JWT_SECRET", "Fq8vL2pX9kR4tM7wZ1cN6bH3jD5sG0aY");
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.token_lifetime, Duration::from_secs(24 * 3600));
    assert!(config.bootstrap_admin.is_none());

    // Overrides
    env::set_var("ECOSHARE_TOKEN_LIFETIME_HOURS", "2");
    env::set_var("ECOSHARE_PORT", "9090");
    env::set_var("ECOSHARE_ADMIN_USERNAME", "root");
    env::set_var("ECOSHARE_ADMIN_PASSWORD", "adm1n-password");
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.token_lifetime, Duration::from_secs(2 * 3600));
    assert_eq!(config.port, 9090);
    let admin = config.bootstrap_admin.unwrap();
    assert_eq!(admin.username, "root");
    assert_eq!(admin.email, "root@localhost");

    // Admin username without password is a configuration error
    env::remove_var("ECOSHARE_ADMIN_PASSWORD");
    assert!(ServerConfig::from_env().is_err());
    env::remove_var("ECOSHARE_ADMIN_USERNAME");

    // Out-of-range lifetime
    env::set_var("ECOSHARE_TOKEN_LIFETIME_HOURS", "0");
    assert!(ServerConfig::from_env().is_err());
    env::remove_var("ECOSHARE_TOKEN_LIFETIME_HOURS");

    // TLS needs both paths
    env::set_var("ECOSHARE_ENABLE_TLS", "true");
    assert!(ServerConfig::from_env().is_err());

    clear();
    for (var, value) in saved {
        if let Some(value) = value {
            env::set_var(var, value);
        }
    }
}
