//! Authentication and authorization module

pub mod authenticator;
pub mod authorizer;
pub mod guard;
pub mod password;
pub mod token;
pub mod user;

// Re-export main components
pub use authenticator::{Authenticator, LoginOutcome, LoginRequest, RegisterRequest};
pub use authorizer::{extract_bearer_token, RequestAuthorizer};
pub use guard::{Access, Owned, OwnershipGuard};
pub use password::{HashingCost, PasswordHasher};
pub use token::{Claims, TokenManager};
pub use user::{Account, Identity, Role, SubjectId};
