use std::sync::Arc;
use std::time::Duration;

use billscribe_infra::{InvoiceRepo, JobStore, ObjectStore, RefreshTokenRepo, UserRepo};

use crate::app::cookies::CookieSettings;

/// Presigned URLs (upload and audio playback) are short-lived.
pub const PRESIGN_TTL: Duration = Duration::from_secs(15 * 60);

/// Default cap on request bodies for the direct audio upload (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Token lifetimes and cookie rendering settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
    pub cookie: CookieSettings,
}

/// Everything the handlers need, behind trait objects so production wires
/// Postgres/S3/OpenAI and tests wire the in-memory implementations.
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<dyn UserRepo>,
    pub invoices: Arc<dyn InvoiceRepo>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepo>,
    pub jobs: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub auth: AuthSettings,
    /// Body-size cap applied to the protected routes; sized for raw audio.
    pub max_upload_bytes: usize,
}
