use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::user::{Identity, Role, SubjectId};
use crate::config::ServerConfig;
use crate::error::{EcoshareError, Result};

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    /// Username shown as the display name
    pub username: String,
    /// Role at issuance; stays fixed until the holder logs in again
    pub role: Role,
    /// Issued at (UTC timestamp, seconds)
    pub iat: i64,
    /// Not before (UTC timestamp, seconds)
    pub nbf: i64,
    /// Expiration time (UTC timestamp, seconds)
    pub exp: i64,
}

impl Claims {
    /// Creates claims for an identity issued at `issued_at`
    pub fn issue(identity: &Identity, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: identity.subject_id.to_string(),
            username: identity.display_name.clone(),
            role: identity.role,
            iat,
            nbf: iat,
            exp: iat.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
        }
    }

    /// True while `now` lies inside `[nbf, exp)`
    pub fn is_valid_at(&self, now: i64) -> bool {
        now >= self.nbf && now < self.exp
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }

    /// Rebuild the identity carried by these claims
    pub fn identity(&self) -> Result<Identity> {
        let subject_id: SubjectId = self.sub.parse().map_err(|_| EcoshareError::Malformed)?;
        if self.username.is_empty() {
            return Err(EcoshareError::Malformed);
        }
        Ok(Identity::new(subject_id, self.username.clone(), self.role))
    }
}

/// Encodes and decodes signed, time-bounded identity claims
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenManager {
    /// Creates a new token manager with a secret
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        // The validity window is checked by `decode_at` against an explicit clock,
        // so the library only verifies the signature, algorithm and claim presence.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_lifetime)
    }

    /// Builds claims for the identity and signs them
    pub fn issue(&self, identity: &Identity) -> Result<(String, Claims)> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(&self, identity: &Identity, issued_at: DateTime<Utc>) -> Result<(String, Claims)> {
        let claims = Claims::issue(identity, issued_at, self.lifetime);
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    /// Generates a JWT token for the given claims
    pub fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| EcoshareError::SystemError(format!("Failed to generate token: {}", e)))
    }

    /// Validates and decodes a token against the current time
    pub fn decode(&self, token: &str) -> Result<Claims> {
        self.decode_at(token, Utc::now().timestamp())
    }

    /// Validates and decodes a token as of `now` (UTC seconds)
    pub fn decode_at(&self, token: &str, now: i64) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => EcoshareError::InvalidSignature,
                ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => EcoshareError::Expired,
                _ => EcoshareError::Malformed,
            })?;

        let claims = token_data.claims;
        if claims.exp <= claims.nbf {
            return Err(EcoshareError::Malformed);
        }
        if !claims.is_valid_at(now) {
            return Err(EcoshareError::Expired);
        }

        Ok(claims)
    }
}
