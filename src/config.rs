use clap::Parser;

/// Centralized application configuration.
///
/// Every option is a CLI flag with an environment-variable fallback, so the
/// service runs the same from a shell, a container, or an orchestrator.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "s3-rw-gateway",
    about = "A RESTful API for reading and writing data in S3"
)]
pub struct AppConfig {
    /// Application name used in health-check payloads
    #[arg(long, env = "APP_NAME", default_value = "s3-rw-gateway")]
    pub app_name: String,

    /// System code used in health-check payloads
    #[arg(long, env = "APP_SYSTEM_CODE", default_value = "s3-rw-gateway")]
    pub app_system_code: String,

    /// Port to listen on
    #[arg(long, env = "APP_PORT", default_value_t = 8080)]
    pub port: u16,

    /// URL prefix the resource routes are mounted under
    #[arg(long, env = "RESOURCE_PATH", default_value = "")]
    pub resource_path: String,

    /// AWS region to connect to
    #[arg(long, env = "AWS_REGION", default_value = "eu-west-1")]
    pub aws_region: String,

    /// Bucket name to read from and write to
    #[arg(long, env = "BUCKET_NAME")]
    pub bucket_name: String,

    /// Prefix for content going into the bucket
    #[arg(long, env = "BUCKET_PREFIX", default_value = "")]
    pub bucket_prefix: String,

    /// Number of workers used when batch downloading
    #[arg(long, env = "WORKERS", default_value_t = 10)]
    pub workers: usize,

    /// Skip writes whose payload hash matches the stored object
    #[arg(long, env = "ONLY_UPDATES_ENABLED", default_value_t = false)]
    pub only_updates_enabled: bool,

    /// Log every request with its transaction id
    #[arg(long, env = "REQUEST_LOGGING_ENABLED", default_value_t = false)]
    pub request_logging_enabled: bool,

    /// Topic to ingest; leave empty to disable the ingestion path
    #[arg(long, env = "CONSUMER_TOPIC", default_value = "")]
    pub consumer_topic: String,

    /// Consumer group id for the ingestion path
    #[arg(long, env = "CONSUMER_GROUP", default_value = "s3-rw-gateway")]
    pub consumer_group: String,

    /// Kafka bootstrap address
    #[arg(long, env = "KAFKA_ADDRESS", default_value = "localhost:9092")]
    pub kafka_address: String,

    /// Maximum tolerated consumer lag before the lag check degrades
    #[arg(long, env = "CONSUMER_LAG_TOLERANCE", default_value_t = 120)]
    pub consumer_lag_tolerance: i64,

    /// Logger verbosity (an env-filter directive, e.g. "info" or "debug")
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Deployment environment; "local" switches on the endpoint override
    #[arg(long, env = "ENV", default_value = "")]
    pub environment: String,

    /// Store endpoint override used when ENV=local (e.g. a localstack URL)
    #[arg(long, env = "S3_ENDPOINT", default_value = "")]
    pub s3_endpoint: String,
}

impl AppConfig {
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Resource path with a leading slash; empty stays empty.
    pub fn normalized_resource_path(&self) -> String {
        if self.resource_path.is_empty() || self.resource_path.starts_with('/') {
            self.resource_path.clone()
        } else {
            format!("/{}", self.resource_path)
        }
    }

    /// Local mode: endpoint override, path-style addressing, static creds.
    pub fn is_local(&self) -> bool {
        self.environment == "local" && !self.s3_endpoint.is_empty()
    }

    pub fn ingestion_enabled(&self) -> bool {
        !self.consumer_topic.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        let mut full = vec!["s3-rw-gateway"];
        full.extend_from_slice(args);
        AppConfig::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_apply_when_only_the_bucket_is_given() {
        let cfg = parse(&["--bucket-name", "test-bucket"]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.workers, 10);
        assert!(!cfg.only_updates_enabled);
        assert!(!cfg.ingestion_enabled());
        assert!(!cfg.is_local());
    }

    #[test]
    fn resource_path_is_normalized_to_a_leading_slash() {
        let cfg = parse(&["--bucket-name", "b", "--resource-path", "concepts"]);
        assert_eq!(cfg.normalized_resource_path(), "/concepts");

        let cfg = parse(&["--bucket-name", "b", "--resource-path", "/concepts"]);
        assert_eq!(cfg.normalized_resource_path(), "/concepts");

        let cfg = parse(&["--bucket-name", "b"]);
        assert_eq!(cfg.normalized_resource_path(), "");
    }

    #[test]
    fn topic_enables_ingestion_and_endpoint_enables_local_mode() {
        let cfg = parse(&["--bucket-name", "b", "--consumer-topic", "Concepts"]);
        assert!(cfg.ingestion_enabled());

        let cfg = parse(&[
            "--bucket-name",
            "b",
            "--environment",
            "local",
            "--s3-endpoint",
            "http://localhost:4566",
        ]);
        assert!(cfg.is_local());
    }
}
