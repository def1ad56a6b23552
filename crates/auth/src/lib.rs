//! `billscribe-auth` — token and credential primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage: it signs and
//! verifies access tokens, hashes/verifies passwords, and generates and
//! hashes the opaque refresh-token values. Persisting refresh rows and
//! setting cookies happens in higher layers.

pub mod claims;
pub mod error;
pub mod password;
pub mod refresh;

pub use claims::{AccessClaims, sign_access_token, verify_access_token};
pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use refresh::{generate_refresh_token, hash_refresh_token, verify_refresh_token};
