use std::error::Error;
use std::fmt;

use warp::http::StatusCode;

#[derive(Debug)]
pub enum EcoshareError {
    // Credential errors
    AccountNotFound,
    BadCredential,
    DuplicateAccount,

    // Token codec errors
    Malformed,
    InvalidSignature,
    Expired,

    // Request authorizer errors
    MissingToken,
    MalformedHeader,
    Unauthorized,

    // Ownership errors
    Forbidden,

    // Resource errors
    NotFound(String),
    Conflict(String),

    // Validation errors
    ValidationError(String),

    // Storage errors
    StorageError(String),

    // Password hashing errors (entropy failure, worker join failure)
    HashingError(String),

    // Configuration errors
    ConfigError(String),

    // System errors
    SystemError(String),
}

impl EcoshareError {
    /// HTTP status surfaced to the client for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AccountNotFound
            | Self::BadCredential
            | Self::Malformed
            | Self::InvalidSignature
            | Self::Expired
            | Self::MissingToken
            | Self::MalformedHeader
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateAccount | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::StorageError(_)
            | Self::HashingError(_)
            | Self::ConfigError(_)
            | Self::SystemError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client.
    ///
    /// Credential failures collapse into one message so the API does not reveal
    /// which usernames exist, token failures collapse into "unauthorized", and
    /// server-side failures never expose their internal detail.
    pub fn public_message(&self) -> String {
        match self {
            Self::AccountNotFound | Self::BadCredential => "invalid credentials".to_string(),
            Self::DuplicateAccount => "account already exists".to_string(),
            Self::Malformed
            | Self::InvalidSignature
            | Self::Expired
            | Self::MissingToken
            | Self::MalformedHeader
            | Self::Unauthorized => "unauthorized".to_string(),
            Self::Forbidden => "forbidden".to_string(),
            Self::NotFound(what) => format!("{} not found", what),
            Self::Conflict(msg) => msg.clone(),
            Self::ValidationError(msg) => msg.clone(),
            Self::StorageError(_)
            | Self::HashingError(_)
            | Self::ConfigError(_)
            | Self::SystemError(_) => "internal server error".to_string(),
        }
    }
}

impl fmt::Display for EcoshareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountNotFound => write!(f, "Account not found"),
            Self::BadCredential => write!(f, "Bad credential"),
            Self::DuplicateAccount => write!(f, "Account already exists"),
            Self::Malformed => write!(f, "Malformed token"),
            Self::InvalidSignature => write!(f, "Invalid token signature"),
            Self::Expired => write!(f, "Token expired or not yet valid"),
            Self::MissingToken => write!(f, "Missing bearer token"),
            Self::MalformedHeader => write!(f, "Malformed authorization header"),
            Self::Unauthorized => write!(f, "Unauthorized access"),
            Self::Forbidden => write!(f, "Forbidden: resource is owned by another account"),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::HashingError(msg) => write!(f, "Password hashing error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::SystemError(msg) => write!(f, "System error: {}", msg),
        }
    }
}

impl Error for EcoshareError {}

impl warp::reject::Reject for EcoshareError {}

impl From<tokio::task::JoinError> for EcoshareError {
    fn from(err: tokio::task::JoinError) -> Self {
        EcoshareError::SystemError(format!("Blocking task failed: {}", err))
    }
}

// Generic result type for Ecoshare
pub type Result<T> = std::result::Result<T, EcoshareError>;
