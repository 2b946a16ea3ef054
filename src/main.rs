use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use genimage::app_state::{AppState, RequestSettings};
use genimage::config::AppConfig;
use genimage::db::{self, PgJobStore};
use genimage::routes;
use genimage::services::{
    image_gen::OpenAiImageClient, image_host::BucketImageHost, mailer::SmtpNotifier,
    rate_limit::RateLimiter, storage::BucketClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(project = ?config.gcp_project, "Initializing genimage server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "genimage_requests_total",
        "Generation requests by outcome"
    );
    metrics::describe_histogram!(
        "genimage_processing_seconds",
        "Time from job creation to approval emails for accepted requests"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let jobs = PgJobStore::new(db_pool, config.job_retention);

    // Initialize storage client
    tracing::info!(bucket = %config.image_bucket, "Initializing image bucket client");
    let bucket = BucketClient::new(
        &config.image_bucket,
        &config.storage_endpoint,
        &config.storage_region,
        &config.storage_access_key,
        &config.storage_secret_key,
        &config.public_url_base,
    )
    .expect("Failed to initialize bucket client");
    let hosting = BucketImageHost::new(Arc::new(bucket), std::env::temp_dir());

    let images = OpenAiImageClient::new(&config.openai_api_base, &config.openai_api_key);

    let notifier = SmtpNotifier::new(
        &config.smtp_host,
        config.smtp_port,
        &config.gmail,
        &config.app_password,
        &config.approval_url,
    );

    let state = AppState::new(
        Arc::new(jobs),
        Arc::new(images),
        Arc::new(hosting),
        Arc::new(notifier),
        RateLimiter::new(config.rate_limit_per_minute),
        RequestSettings::from_config(&config),
    );

    let app = routes::router(state).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );
    let app = routes::with_layers(app);

    tracing::info!("Starting genimage on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
