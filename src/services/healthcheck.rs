//! src/services/healthcheck.rs
//!
//! Composite health: a HEAD on the bucket plus, when an ingestion consumer
//! is attached, its connectivity and lag probes. The detailed report always
//! answers HTTP 200 with per-check results in the body; good-to-go is the
//! binary fail-fast composition used by load balancers.

use crate::services::store::BlobStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::join;
use tracing::error;

/// Probes the gateway asks of an attached message consumer.
#[async_trait]
pub trait ConsumerMonitor: Send + Sync {
    /// Can the consumer reach the bus at all?
    async fn connectivity_check(&self) -> anyhow::Result<()>;
    /// Is the consumer keeping up with the topic?
    async fn monitor_check(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: String,
    pub name: String,
    pub ok: bool,
    pub severity: u8,
    pub business_impact: String,
    pub technical_summary: String,
    pub panic_guide: String,
    pub check_output: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub schema_version: u32,
    pub system_code: String,
    pub name: String,
    pub description: String,
    pub ok: bool,
    pub checks: Vec<CheckResult>,
}

/// Binary readiness signal, distinct from the detailed report.
#[derive(Debug, Clone)]
pub struct GtgStatus {
    pub good_to_go: bool,
    pub message: String,
}

pub struct HealthCheck {
    store: Arc<dyn BlobStore>,
    consumer: Option<Arc<dyn ConsumerMonitor>>,
    pub app_name: String,
    pub app_system_code: String,
}

impl HealthCheck {
    pub fn new(
        store: Arc<dyn BlobStore>,
        consumer: Option<Arc<dyn ConsumerMonitor>>,
        app_name: impl Into<String>,
        app_system_code: impl Into<String>,
    ) -> Self {
        Self {
            store,
            consumer,
            app_name: app_name.into(),
            app_system_code: app_system_code.into(),
        }
    }

    fn panic_guide(&self) -> String {
        format!("https://runbooks.example.org/{}", self.app_system_code)
    }

    /// Run every check and assemble the detailed report.
    pub async fn health(&self) -> HealthReport {
        let mut checks = vec![self.bucket_check().await];
        if let Some(consumer) = &self.consumer {
            checks.push(self.connectivity_check(consumer.as_ref()).await);
            checks.push(self.lag_check(consumer.as_ref()).await);
        }
        let ok = checks.iter().all(|check| check.ok);

        HealthReport {
            schema_version: 1,
            system_code: self.app_system_code.clone(),
            name: format!("{} Healthchecks", self.app_name),
            description: "Runs a HEAD check on bucket".to_string(),
            ok,
            checks,
        }
    }

    /// Fail-fast readiness: bucket reachability always, consumer
    /// connectivity when a consumer is attached. Both probes run in
    /// parallel; the first failure wins.
    pub async fn gtg(&self) -> GtgStatus {
        match &self.consumer {
            Some(consumer) => {
                let (bucket, connectivity) =
                    join!(self.store.head_bucket(), consumer.connectivity_check());
                if bucket.is_err() {
                    return GtgStatus {
                        good_to_go: false,
                        message: "Head request to S3 failed".to_string(),
                    };
                }
                if let Err(err) = connectivity {
                    return GtgStatus {
                        good_to_go: false,
                        message: err.to_string(),
                    };
                }
                GtgStatus {
                    good_to_go: true,
                    message: "OK".to_string(),
                }
            }
            None => match self.store.head_bucket().await {
                Ok(()) => GtgStatus {
                    good_to_go: true,
                    message: "OK".to_string(),
                },
                Err(_) => GtgStatus {
                    good_to_go: false,
                    message: "Head request to S3 failed".to_string(),
                },
            },
        }
    }

    async fn bucket_check(&self) -> CheckResult {
        let (ok, output) = match self.store.head_bucket().await {
            Ok(()) => (true, "Access to S3 bucket ok".to_string()),
            Err(err) => {
                error!(%err, "error running S3 health check");
                (false, "Can not perform check on S3 bucket".to_string())
            }
        };
        CheckResult {
            id: "s3-bucket-check".to_string(),
            name: "S3 Bucket check".to_string(),
            ok,
            severity: 3,
            business_impact: "Unable to access S3 bucket".to_string(),
            technical_summary: "Can not access S3 bucket.".to_string(),
            panic_guide: self.panic_guide(),
            check_output: output,
            last_updated: Utc::now(),
        }
    }

    async fn connectivity_check(&self, consumer: &dyn ConsumerMonitor) -> CheckResult {
        let (ok, output) = match consumer.connectivity_check().await {
            Ok(()) => (true, "OK".to_string()),
            Err(err) => (false, err.to_string()),
        };
        CheckResult {
            id: "kafka-connectivity".to_string(),
            name: "Kafka Connectivity to MSK".to_string(),
            ok,
            severity: 2,
            business_impact: "Cannot read content and store to S3".to_string(),
            technical_summary: "Kafka consumer is not reachable/healthy".to_string(),
            panic_guide: self.panic_guide(),
            check_output: output,
            last_updated: Utc::now(),
        }
    }

    async fn lag_check(&self, consumer: &dyn ConsumerMonitor) -> CheckResult {
        let (ok, output) = match consumer.monitor_check().await {
            Ok(()) => (true, "OK".to_string()),
            Err(err) => (false, err.to_string()),
        };
        CheckResult {
            id: "kafka-consumer-lagcheck".to_string(),
            name: "Kafka consumer lagging".to_string(),
            ok,
            severity: 3,
            business_impact: "Reading messages is delayed".to_string(),
            technical_summary:
                "Messages awaiting handling exceed the configured lag tolerance.".to_string(),
            panic_guide: self.panic_guide(),
            check_output: output,
            last_updated: Utc::now(),
        }
    }
}
