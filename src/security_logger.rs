//! Security-focused logging for authentication and authorization events
//!
//! Events are written on the `security` log target and nothing is retained in
//! process. Aggregation and alerting belong to whatever consumes the log.

const LOG_TARGET: &str = "security";

/// Longest caller-supplied value written to a log line
const MAX_LOGGED_VALUE_CHARS: usize = 64;

/// Types of security events to track
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    // Authentication events
    AuthenticationFailed { username: String, reason: String },
    AuthenticationSuccess { subject_id: String },
    AccountRegistered { subject_id: String, username: String },
    PasswordChanged { subject_id: String },
    TokenValidationFailed { reason: String },

    // Authorization events
    PermissionDenied { subject_id: String, action: String, resource: Option<String> },

    // System security
    ConfigurationError { component: String, error: String },
}

/// Render untrusted input on a single line: control characters escaped, length capped
pub fn loggable(value: &str) -> String {
    let mut out: String = value
        .chars()
        .take(MAX_LOGGED_VALUE_CHARS)
        .flat_map(char::escape_debug)
        .collect();
    if value.chars().count() > MAX_LOGGED_VALUE_CHARS {
        out.push_str("...");
    }
    out
}

impl SecurityEvent {
    /// Single-line description of the event
    pub fn describe(&self) -> String {
        match self {
            SecurityEvent::AuthenticationFailed { username, reason } => format!(
                "Authentication failed - User: \"{}\", Reason: {}",
                loggable(username),
                reason
            ),
            SecurityEvent::AuthenticationSuccess { subject_id } => {
                format!("Authentication success - Subject: {}", subject_id)
            }
            SecurityEvent::AccountRegistered { subject_id, username } => format!(
                "Account registered - Subject: {}, User: \"{}\"",
                subject_id,
                loggable(username)
            ),
            SecurityEvent::PasswordChanged { subject_id } => {
                format!("Password changed - Subject: {}", subject_id)
            }
            SecurityEvent::TokenValidationFailed { reason } => {
                format!("Token validation failed - Reason: {}", reason)
            }
            SecurityEvent::PermissionDenied { subject_id, action, resource } => format!(
                "Permission denied - Subject: {}, Action: {}, Resource: {:?}",
                subject_id, action, resource
            ),
            SecurityEvent::ConfigurationError { component, error } => format!(
                "Configuration error - Component: {}, Error: {}",
                component, error
            ),
        }
    }

    fn level(&self) -> log::Level {
        match self {
            SecurityEvent::AuthenticationSuccess { .. }
            | SecurityEvent::AccountRegistered { .. }
            | SecurityEvent::PasswordChanged { .. } => log::Level::Info,
            SecurityEvent::AuthenticationFailed { .. }
            | SecurityEvent::TokenValidationFailed { .. }
            | SecurityEvent::PermissionDenied { .. } => log::Level::Warn,
            SecurityEvent::ConfigurationError { .. } => log::Level::Error,
        }
    }
}

/// Write a security event to the `security` target
pub fn log_security_event(event: SecurityEvent) {
    log::log!(target: LOG_TARGET, event.level(), "SECURITY: {}", event.describe());
}
