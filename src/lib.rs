//! EcoShare - credential authentication and ownership-scoped authorization
//!
//! This library provides password hashing, signed stateless tokens, a bearer
//! token gate for warp routes and per-resource ownership checks, wired into a
//! small device, location and power usage API.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod security;
pub mod security_logger;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
pub use error::{EcoshareError, Result};
