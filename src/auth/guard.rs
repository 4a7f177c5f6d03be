//! Per-resource ownership checks
//!
//! A caller may act on a resource only when they own it. Admins get one
//! exception: read-only administrative listings. Mutation on behalf of another
//! owner is never allowed, admin or not.

use crate::auth::user::{Identity, SubjectId};
use crate::error::{EcoshareError, Result};
use crate::security_logger::{log_security_event, SecurityEvent};

/// A resource bound to the account that created it
pub trait Owned {
    fn owner_subject_id(&self) -> SubjectId;
}

/// What the caller intends to do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Mutate,
    /// Read-only listing across owners
    AdminListing,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Mutate => "mutate",
            Access::AdminListing => "admin_listing",
        }
    }
}

pub struct OwnershipGuard;

impl OwnershipGuard {
    /// Allow iff the caller owns the resource, or is an admin doing a listing
    pub fn check<R: Owned + ?Sized>(identity: &Identity, resource: &R, access: Access) -> Result<()> {
        if resource.owner_subject_id() == identity.subject_id {
            return Ok(());
        }
        if identity.is_admin() && access == Access::AdminListing {
            return Ok(());
        }
        Err(EcoshareError::Forbidden)
    }

    /// Like [`OwnershipGuard::check`], logging denials
    pub fn authorize<R: Owned + ?Sized>(
        identity: &Identity,
        resource: &R,
        access: Access,
        resource_label: &str,
    ) -> Result<()> {
        let result = Self::check(identity, resource, access);
        if result.is_err() {
            log_security_event(SecurityEvent::PermissionDenied {
                subject_id: identity.subject_id.to_string(),
                action: access.as_str().to_string(),
                resource: Some(resource_label.to_string()),
            });
        }
        result
    }

    /// Gate for listings that span every owner
    pub fn authorize_listing(identity: &Identity, listing: &str) -> Result<()> {
        if identity.is_admin() {
            return Ok(());
        }
        log_security_event(SecurityEvent::PermissionDenied {
            subject_id: identity.subject_id.to_string(),
            action: Access::AdminListing.as_str().to_string(),
            resource: Some(listing.to_string()),
        });
        Err(EcoshareError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::Role;

    struct Thing(SubjectId);

    impl Owned for Thing {
        fn owner_subject_id(&self) -> SubjectId {
            self.0
        }
    }

    fn alice() -> Identity {
        Identity::new(SubjectId(1), "alice", Role::User)
    }

    fn bob() -> Identity {
        Identity::new(SubjectId(2), "bob", Role::User)
    }

    fn admin() -> Identity {
        Identity::new(SubjectId(3), "root", Role::Admin)
    }

    #[test]
    fn test_owner_is_allowed_everything() {
        let thing = Thing(SubjectId(1));
        for access in [Access::Read, Access::Mutate, Access::AdminListing] {
            assert!(OwnershipGuard::check(&alice(), &thing, access).is_ok());
        }
    }

    #[test]
    fn test_other_user_is_forbidden() {
        let thing = Thing(SubjectId(1));
        for access in [Access::Read, Access::Mutate, Access::AdminListing] {
            assert!(matches!(
                OwnershipGuard::check(&bob(), &thing, access),
                Err(EcoshareError::Forbidden)
            ));
        }
    }

    #[test]
    fn test_admin_bypass_is_listing_only() {
        let thing = Thing(SubjectId(1));
        assert!(OwnershipGuard::check(&admin(), &thing, Access::AdminListing).is_ok());
        assert!(OwnershipGuard::check(&admin(), &thing, Access::Read).is_err());
        assert!(OwnershipGuard::check(&admin(), &thing, Access::Mutate).is_err());
    }

    #[test]
    fn test_listing_requires_admin() {
        assert!(OwnershipGuard::authorize_listing(&admin(), "users").is_ok());
        assert!(matches!(
            OwnershipGuard::authorize_listing(&alice(), "users"),
            Err(EcoshareError::Forbidden)
        ));
    }
}
