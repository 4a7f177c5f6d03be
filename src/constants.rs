// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const API_PREFIX: &str = "api";
pub const API_VERSION: &str = "v1";

// Token configuration constants
pub const DEFAULT_TOKEN_LIFETIME_HOURS: u64 = 24;
pub const MAX_TOKEN_LIFETIME_HOURS: u64 = 720;
pub const MAX_TOKEN_LENGTH: usize = 4096;
pub const MIN_SECRET_LENGTH: usize = 32;
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const BEARER_PREFIX: &str = "Bearer ";

// Password hashing constants (Argon2id, memory in KiB)
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
pub const DEFAULT_HASH_ITERATIONS: u32 = 2;
pub const DEFAULT_AUTH_MIN_DURATION_MS: u64 = 100;

// Account validation constants
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_EMAIL_LENGTH: usize = 100;
pub const MAX_PHONE_LENGTH: usize = 20;

// Pagination constants
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
