use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::Credentials;
use axum::Router;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod consumer;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::AppConfig;
use consumer::MessageQueueConsumer;
use handlers::AppState;
use services::healthcheck::{ConsumerMonitor, HealthCheck};
use services::processor::QueueProcessor;
use services::reader::Reader;
use services::store::{BlobStore, S3BlobStore};
use services::writer::Writer;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::parse();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(?cfg, "starting s3-rw-gateway");

    // --- Store client and core services ---
    let client = build_s3_client(&cfg).await;
    let store: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(client, cfg.bucket_name.clone()));

    let writer = Writer::new(
        store.clone(),
        cfg.bucket_prefix.clone(),
        cfg.only_updates_enabled,
    );
    let reader = Reader::new(store.clone(), cfg.bucket_prefix.clone(), cfg.workers);

    // --- Ingestion path, only when a topic is configured ---
    let consumer = if cfg.ingestion_enabled() {
        let consumer = Arc::new(
            MessageQueueConsumer::new(
                &cfg.kafka_address,
                &cfg.consumer_group,
                &cfg.consumer_topic,
                cfg.consumer_lag_tolerance,
            )
            .context("wiring kafka consumer")?,
        );
        let processor = QueueProcessor::new(writer.clone());
        let ingest = consumer.clone();
        tokio::spawn(async move { ingest.run(processor).await });
        Some(consumer)
    } else {
        tracing::info!("no consumer topic configured, ingestion disabled");
        None
    };

    // --- Router ---
    let health = HealthCheck::new(
        store,
        consumer.map(|c| c as Arc<dyn ConsumerMonitor>),
        cfg.app_name.clone(),
        cfg.app_system_code.clone(),
    );
    let state = AppState {
        writer,
        reader,
        health: Arc::new(health),
    };

    let mut app: Router = routes::routes::routes(&cfg.normalized_resource_path()).with_state(state);
    if cfg.request_logging_enabled {
        app = app.layer(TraceLayer::new_for_http());
    }

    // --- Start server ---
    let addr = cfg.listen_addr();
    tracing::info!(%addr, "listening");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}

/// Build the S3 client: region from config, at most one retry so persistent
/// store failures surface to callers instead of stalling the pipelines, and
/// in local mode an endpoint override with path-style addressing and static
/// credentials for emulators.
async fn build_s3_client(cfg: &AppConfig) -> aws_sdk_s3::Client {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(cfg.aws_region.clone()));
    if cfg.is_local() {
        loader = loader.endpoint_url(cfg.s3_endpoint.clone());
    }
    let shared = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared)
        .retry_config(RetryConfig::standard().with_max_attempts(2));
    if cfg.is_local() {
        builder = builder
            .force_path_style(true)
            .credentials_provider(Credentials::new("local", "local", None, None, "local-env"));
    }
    aws_sdk_s3::Client::from_conf(builder.build())
}
