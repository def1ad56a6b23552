//! Postgres pool lifecycle.
//!
//! The pool is created once at process start and injected into repositories
//! and stores; nothing reaches for ambient global state.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Open a bounded pool and verify connectivity.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
