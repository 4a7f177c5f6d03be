//! Account profile operations for authenticated callers

use std::sync::Arc;

use crate::auth::guard::OwnershipGuard;
use crate::auth::user::{validate_email, validate_phone, Account, Identity, ProfileUpdate};
use crate::core::Paginated;
use crate::error::{EcoshareError, Result};
use crate::storage::{CredentialStore, Page};

pub struct AccountService {
    store: Arc<dyn CredentialStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// The caller's own account
    pub async fn profile(&self, identity: &Identity) -> Result<Account> {
        self.store
            .find_by_id(identity.subject_id)
            .await?
            .map(|credential| credential.into_account())
            .ok_or_else(|| EcoshareError::NotFound("account".to_string()))
    }

    pub async fn update_profile(&self, identity: &Identity, update: ProfileUpdate) -> Result<Account> {
        if let Some(ref email) = update.email {
            validate_email(email)?;
        }
        if let Some(ref phone) = update.phone {
            validate_phone(phone)?;
        }

        self.store
            .update_profile(identity.subject_id, update)
            .await
            .map_err(|e| match e {
                EcoshareError::Conflict(_) => {
                    EcoshareError::Conflict("email already in use".to_string())
                }
                other => other,
            })
    }

    /// Every account, admins only
    pub async fn list_accounts(&self, identity: &Identity, page: Page) -> Result<Paginated<Account>> {
        OwnershipGuard::authorize_listing(identity, "accounts")?;
        let (items, total) = self.store.list_accounts(page).await?;
        Ok(Paginated::new(items, total, page))
    }
}
