//! Credential check and token issuance
//!
//! The authenticator is the only component that combines the credential store,
//! the password hasher and the token manager. All three are injected at
//! construction; nothing here reaches for global state.

use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::password::PasswordHasher;
use crate::auth::token::{Claims, TokenManager};
use crate::auth::user::{
    validate_email, validate_password, validate_phone, validate_username, Account, NewAccount,
    Role, SubjectId,
};
use crate::config::{AdminBootstrap, ServerConfig};
use crate::error::{EcoshareError, Result};
use crate::security::AuthTimer;
use crate::security_logger::{log_security_event, SecurityEvent};
use crate::storage::CredentialStore;

/// Verified against when the username is unknown, so a miss costs one full verify
const DUMMY_PASSWORD: &str = "ecoshare-timing-equalizer";

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// A successful login
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub claims: Claims,
    pub account: Account,
}

pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenManager>,
    dummy_hash: String,
    auth_min_duration: Duration,
}

impl Authenticator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenManager>,
        auth_min_duration: Duration,
    ) -> Result<Self> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            store,
            hasher,
            tokens,
            dummy_hash,
            auth_min_duration,
        })
    }

    pub fn from_config(
        config: &ServerConfig,
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenManager>,
    ) -> Result<Self> {
        let hasher = PasswordHasher::new(config.hashing_cost)?;
        Self::new(store, hasher, tokens, config.auth_min_duration)
    }

    /// Check credentials and issue a token.
    ///
    /// Failures are padded to the configured minimum duration.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let timer = AuthTimer::new(self.auth_min_duration);
        let result = self.check_and_issue(username, password).await;

        if let Err(ref e) = result {
            log_security_event(SecurityEvent::AuthenticationFailed {
                username: username.to_string(),
                reason: e.to_string(),
            });
            timer.wait().await;
        }
        result
    }

    async fn check_and_issue(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let credential = match self.store.find_by_username(username).await? {
            Some(credential) => credential,
            None => {
                self.hasher
                    .verify_async(password.to_string(), self.dummy_hash.clone())
                    .await?;
                return Err(EcoshareError::AccountNotFound);
            }
        };

        let matches = self
            .hasher
            .verify_async(password.to_string(), credential.password_hash().to_string())
            .await?;
        if !matches {
            return Err(EcoshareError::BadCredential);
        }

        let now = Utc::now();
        let mut account = credential.into_account();
        let (token, claims) = self.tokens.issue_at(&account.identity(), now)?;
        self.store.record_login(account.id, now).await?;
        account.last_login_at = Some(now);

        log_security_event(SecurityEvent::AuthenticationSuccess {
            subject_id: account.id.to_string(),
        });

        Ok(LoginOutcome {
            token,
            claims,
            account,
        })
    }

    /// Create a regular account
    pub async fn register(&self, request: RegisterRequest) -> Result<Account> {
        let timer = AuthTimer::new(self.auth_min_duration);
        let username = request.username.clone();
        let result = self.create_account(request, Role::User).await;

        match result {
            Ok(ref account) => {
                log_security_event(SecurityEvent::AccountRegistered {
                    subject_id: account.id.to_string(),
                    username: account.username.clone(),
                });
            }
            Err(EcoshareError::DuplicateAccount) => {
                info!("Registration rejected, account already exists: {}", username);
                timer.wait().await;
            }
            Err(_) => {}
        }
        result
    }

    async fn create_account(&self, request: RegisterRequest, role: Role) -> Result<Account> {
        validate_username(&request.username)?;
        validate_password(&request.password)?;
        validate_email(&request.email)?;
        if let Some(ref phone) = request.phone {
            validate_phone(phone)?;
        }

        // Cheap early exit; the store's own check below is the one that counts
        if self.store.find_by_username(&request.username).await?.is_some() {
            return Err(EcoshareError::DuplicateAccount);
        }

        let password_hash = self.hasher.hash_async(request.password).await?;
        let new_account = NewAccount {
            username: request.username,
            email: request.email,
            phone: request.phone,
            role,
        };

        match self.store.insert(new_account, password_hash).await {
            Ok(account) => Ok(account),
            Err(EcoshareError::Conflict(_)) => Err(EcoshareError::DuplicateAccount),
            Err(e) => Err(e),
        }
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        subject_id: SubjectId,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        validate_password(new_password)?;

        let credential = self
            .store
            .find_by_id(subject_id)
            .await?
            .ok_or(EcoshareError::AccountNotFound)?;

        let matches = self
            .hasher
            .verify_async(old_password.to_string(), credential.password_hash().to_string())
            .await?;
        if !matches {
            log_security_event(SecurityEvent::AuthenticationFailed {
                username: credential.account().username.clone(),
                reason: "wrong current password on password change".to_string(),
            });
            return Err(EcoshareError::BadCredential);
        }

        let password_hash = self.hasher.hash_async(new_password.to_string()).await?;
        self.store
            .update_password_hash(subject_id, password_hash)
            .await
            .map_err(|e| match e {
                EcoshareError::NotFound(_) => EcoshareError::AccountNotFound,
                other => other,
            })?;

        log_security_event(SecurityEvent::PasswordChanged {
            subject_id: subject_id.to_string(),
        });
        Ok(())
    }

    /// Create the configured admin account unless the username is already taken.
    ///
    /// Returns the new account, or `None` when nothing was created.
    pub async fn ensure_admin(&self, admin: &AdminBootstrap) -> Result<Option<Account>> {
        if let Some(existing) = self.store.find_by_username(&admin.username).await? {
            if !existing.account().role.is_admin() {
                warn!(
                    "Bootstrap admin '{}' exists without the admin role; leaving it unchanged",
                    admin.username
                );
            }
            return Ok(None);
        }

        let request = RegisterRequest {
            username: admin.username.clone(),
            password: admin.password.clone(),
            email: admin.email.clone(),
            phone: None,
        };
        match self.create_account(request, Role::Admin).await {
            Ok(account) => {
                info!("Created bootstrap admin account '{}'", account.username);
                Ok(Some(account))
            }
            Err(EcoshareError::DuplicateAccount) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashingCost;
    use crate::storage::MemoryStorage;

    const SECRET: &str = "unit-signing-key-4f8a1c9e7b2d6053";

    fn authenticator() -> (Authenticator, Arc<TokenManager>) {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryStorage::new());
        let tokens = Arc::new(TokenManager::new(SECRET, Duration::from_secs(3600)));
        let hasher = PasswordHasher::new(HashingCost::minimal()).unwrap();
        let auth = Authenticator::new(store, hasher, tokens.clone(), Duration::ZERO).unwrap();
        (auth, tokens)
    }

    fn request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "s3cret!pw".to_string(),
            email: email.to_string(),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login_yields_same_subject() {
        let (auth, tokens) = authenticator();
        let account = auth.register(request("alice", "alice@example.com")).await.unwrap();

        let outcome = auth.login("alice", "s3cret!pw").await.unwrap();
        let identity = tokens.decode(&outcome.token).unwrap().identity().unwrap();
        assert_eq!(identity.subject_id, account.id);
        assert_eq!(identity.display_name, "alice");
        assert!(outcome.account.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (auth, _) = authenticator();
        auth.register(request("alice", "alice@example.com")).await.unwrap();

        assert!(matches!(
            auth.login("nobody", "s3cret!pw").await,
            Err(EcoshareError::AccountNotFound)
        ));
        assert!(matches!(
            auth.login("alice", "wrong-password").await,
            Err(EcoshareError::BadCredential)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email() {
        let (auth, _) = authenticator();
        auth.register(request("alice", "alice@example.com")).await.unwrap();

        assert!(matches!(
            auth.register(request("alice", "new@example.com")).await,
            Err(EcoshareError::DuplicateAccount)
        ));
        assert!(matches!(
            auth.register(request("alice2", "alice@example.com")).await,
            Err(EcoshareError::DuplicateAccount)
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (auth, _) = authenticator();
        let mut bad = request("alice", "alice@example.com");
        bad.password = "short".to_string();
        assert!(matches!(
            auth.register(bad).await,
            Err(EcoshareError::ValidationError(_))
        ));
        assert!(matches!(
            auth.register(request("alice", "not-an-email")).await,
            Err(EcoshareError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (auth, _) = authenticator();
        let account = auth.register(request("alice", "alice@example.com")).await.unwrap();

        assert!(matches!(
            auth.change_password(account.id, "wrong-old", "n3w-password").await,
            Err(EcoshareError::BadCredential)
        ));

        auth.change_password(account.id, "s3cret!pw", "n3w-password")
            .await
            .unwrap();
        assert!(auth.login("alice", "s3cret!pw").await.is_err());
        assert!(auth.login("alice", "n3w-password").await.is_ok());

        assert!(matches!(
            auth.change_password(SubjectId(999), "s3cret!pw", "n3w-password").await,
            Err(EcoshareError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let (auth, tokens) = authenticator();
        let admin = AdminBootstrap {
            username: "root".to_string(),
            password: "adm1n-password".to_string(),
            email: "root@example.com".to_string(),
        };

        let created = auth.ensure_admin(&admin).await.unwrap();
        assert!(created.unwrap().role.is_admin());
        assert!(auth.ensure_admin(&admin).await.unwrap().is_none());

        let outcome = auth.login("root", "adm1n-password").await.unwrap();
        assert!(tokens.decode(&outcome.token).unwrap().identity().unwrap().is_admin());
    }
}
