use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("failed to encode token: {0}")]
    TokenEncode(String),

    #[error("hashing failed: {0}")]
    Hash(String),
}
