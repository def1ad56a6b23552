//! Repositories over the relational store.
//!
//! Each repository is a trait with a Postgres implementation and an
//! in-memory implementation for dev/tests.

pub mod invoices;
pub mod refresh_tokens;
pub mod users;

pub use invoices::{InMemoryInvoiceRepo, InvoiceRepo, PostgresInvoiceRepo};
pub use refresh_tokens::{InMemoryRefreshTokenRepo, PostgresRefreshTokenRepo, RefreshTokenRepo};
pub use users::{InMemoryUserRepo, PostgresUserRepo, UserRepo};

/// Repository error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepoError {
    #[error("not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Storage(other.to_string()),
        }
    }
}
