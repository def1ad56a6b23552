//! `billscribe-core` — domain types shared across the workspace.
//!
//! This crate contains **pure domain** data (no HTTP, no storage concerns):
//! identifiers, the invoice/item models, and the auth-related records.

pub mod id;
pub mod invoice;
pub mod user;

pub use id::{InvoiceId, InvoiceItemId, UserId};
pub use invoice::{Invoice, InvoiceItem, InvoiceItemDraft, InvoiceStatus};
pub use user::{RefreshToken, RefreshTokenId, User};
