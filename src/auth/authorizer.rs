//! Bearer-token gate for protected requests
//!
//! Turns an `Authorization` header into an [`Identity`] using only the token
//! itself. No store lookups happen here: signature and embedded timestamps are
//! the whole session.

use std::sync::Arc;
use warp::http::HeaderValue;

use crate::auth::token::TokenManager;
use crate::auth::user::Identity;
use crate::constants::{BEARER_PREFIX, MAX_TOKEN_LENGTH};
use crate::error::{EcoshareError, Result};
use crate::security_logger::{log_security_event, SecurityEvent};

/// Pull the token out of an `Authorization` header value.
///
/// The scheme name is matched case-insensitively.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str> {
    let header = header.ok_or(EcoshareError::MissingToken)?;

    let scheme_len = BEARER_PREFIX.len();
    let has_scheme = header
        .get(..scheme_len)
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case(BEARER_PREFIX));
    if !has_scheme {
        return Err(EcoshareError::MalformedHeader);
    }

    let token = header[scheme_len..].trim();
    if token.is_empty() {
        return Err(EcoshareError::MalformedHeader);
    }
    Ok(token)
}

/// Header bytes as text; anything outside visible ASCII is a malformed header
pub fn header_text(value: &HeaderValue) -> Result<&str> {
    value.to_str().map_err(|_| EcoshareError::MalformedHeader)
}

/// Cheap structural screening before any cryptography runs
fn screen_token(token: &str) -> Result<()> {
    if token.len() > MAX_TOKEN_LENGTH || token.chars().any(char::is_control) {
        return Err(EcoshareError::Malformed);
    }
    Ok(())
}

#[derive(Clone)]
pub struct RequestAuthorizer {
    tokens: Arc<TokenManager>,
}

impl RequestAuthorizer {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }

    /// Verify the header and return the caller's identity.
    ///
    /// A missing header is `MissingToken`, a non-bearer header is
    /// `MalformedHeader`, and every decoding failure becomes `Unauthorized`.
    pub fn authorize(&self, header: Option<&str>) -> Result<Identity> {
        let token = extract_bearer_token(header)?;

        match self.verify(token) {
            Ok(identity) => Ok(identity),
            Err(e) => {
                log_security_event(SecurityEvent::TokenValidationFailed {
                    reason: e.to_string(),
                });
                Err(EcoshareError::Unauthorized)
            }
        }
    }

    /// [`RequestAuthorizer::authorize`] on the raw header value
    pub fn authorize_value(&self, header: Option<&HeaderValue>) -> Result<Identity> {
        let header = header.map(header_text).transpose()?;
        self.authorize(header)
    }

    /// Decode a bare token, keeping the precise codec error
    pub fn verify(&self, token: &str) -> Result<Identity> {
        screen_token(token)?;
        self.tokens.decode(token)?.identity()
    }
}
