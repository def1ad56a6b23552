use std::sync::Arc;

use billscribe_api::app::{AppServices, AuthSettings, build_app};
use billscribe_api::config::AppConfig;
use billscribe_infra::{
    OpenAiClient, OpenAiConfig, PostgresInvoiceRepo, PostgresJobStore, PostgresRefreshTokenRepo,
    PostgresUserRepo, S3Config, S3ObjectStore, TranscriptionWorker, WorkerConfig, WorkerDeps,
    connect_pool, run_migrations,
};

use billscribe_api::app::cookies::CookieSettings;

#[tokio::main]
async fn main() {
    billscribe_observability::init();

    let config = AppConfig::from_env();

    let pool = connect_pool(&config.database_url, config.max_db_connections)
        .await
        .expect("failed to connect to Postgres");
    run_migrations(&pool).await.expect("migrations failed");

    let users = Arc::new(PostgresUserRepo::new(pool.clone()));
    let invoices = Arc::new(PostgresInvoiceRepo::new(pool.clone()));
    let refresh_tokens = Arc::new(PostgresRefreshTokenRepo::new(pool.clone()));
    let jobs = Arc::new(PostgresJobStore::new(pool));

    let objects = Arc::new(S3ObjectStore::new(S3Config {
        region: config.s3_region.clone(),
        endpoint_url: config.s3_endpoint_url.clone(),
        access_key_id: config.s3_access_key_id.clone(),
        secret_access_key: config.s3_secret_access_key.clone(),
        bucket: config.s3_bucket.clone(),
    }));

    let openai = Arc::new(
        OpenAiClient::new(OpenAiConfig {
            api_key: config.openai_api_key.clone(),
            base_url: None,
            request_timeout: config.ai_call_timeout,
        })
        .expect("failed to build OpenAI client"),
    );

    let worker = TranscriptionWorker::new(
        WorkerDeps {
            jobs: jobs.clone(),
            invoices: invoices.clone(),
            objects: objects.clone(),
            transcriber: openai.clone(),
            extractor: openai,
        },
        WorkerConfig {
            poll_interval: config.worker_poll_interval,
            call_timeout: config.ai_call_timeout,
        },
    );
    let _worker_handle = worker.spawn();

    let services = Arc::new(AppServices {
        users,
        invoices,
        refresh_tokens,
        jobs,
        objects,
        auth: AuthSettings {
            jwt_secret: config.jwt_secret.clone(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            cookie: CookieSettings {
                name: config.cookie_name.clone(),
                secure: config.cookie_secure,
                same_site: config.cookie_same_site,
                domain: config.cookie_domain.clone(),
                ..CookieSettings::default()
            },
        },
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap_or_else(|e| panic!("failed to bind 0.0.0.0:{}: {e}", config.port));

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on {addr}");
    }

    axum::serve(listener, app).await.expect("server error");
}
