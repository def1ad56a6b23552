//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the trait-object bundle every handler works against
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs
//! - `cookies.rs`: refresh-cookie rendering and parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, extract::DefaultBodyLimit, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod cookies;
pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, AuthSettings, DEFAULT_MAX_UPLOAD_BYTES};

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        jwt_secret: Arc::from(services.auth.jwt_secret.as_str()),
    };

    // Protected routes: bearer token required. The body limit is raised
    // above axum's 2 MB default so multipart audio uploads fit.
    let protected = Router::new()
        .nest("/api/invoices", routes::invoices::router())
        .nest("/api/uploads", routes::uploads::router())
        .layer(DefaultBodyLimit::max(services.max_upload_bytes))
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(routes::system::health))
        .nest("/api/auth", routes::auth::router())
        .layer(Extension(services))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
