use association_portal::{
    AppState,
    config::{AppConfig, Env, StorageBackend},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    storage::{LocalStorage, S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the repository and storage backends, and
/// serves the API.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    // Fails fast when production secrets are missing.
    let config = AppConfig::load();

    // RUST_LOG wins over the default filter.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "association_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // Repository: Postgres, or the in-process store for `DATABASE_URL=memory`.
    let repo: RepositoryState = if config.db_url == "memory" {
        tracing::warn!("using the in-memory repository; data is lost on restart");
        Arc::new(InMemoryRepository::new())
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.db_url)
            .await
            .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
        let postgres = PostgresRepository::new(pool);
        postgres
            .migrate()
            .await
            .expect("FATAL: Failed to apply database migrations.");
        Arc::new(postgres)
    };

    let storage: StorageState = match config.storage_backend {
        StorageBackend::Local => {
            Arc::new(LocalStorage::new(&config.upload_dir, &config.public_base_url))
        }
        StorageBackend::S3 => Arc::new(S3StorageClient::new(
            &config.s3_endpoint,
            &config.s3_region,
            &config.s3_key,
            &config.s3_secret,
            &config.s3_bucket,
            &config.s3_public_url,
        )),
    };
    // Creates the uploads root or the bucket.
    if let Err(e) = storage.ensure_ready().await {
        tracing::error!(error = %e, "storage backend is not ready; uploads will fail");
    }

    if config.smtp.is_none() {
        tracing::info!("SMTP not configured; outgoing mail is logged instead of sent");
    }

    let port = config.port;
    let app = create_router(AppState::new(repo, storage, config));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {addr}");
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui"
    );

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
