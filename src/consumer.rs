//! Kafka ingestion wiring.
//!
//! Subscribes a consumer-group stream to the configured topic, drains every
//! delivery into the [`QueueProcessor`], and answers the connectivity and
//! lag probes the health checker asks for. Delivery retries stay with the
//! bus; this loop never re-enqueues.

use crate::models::message::Message;
use crate::services::healthcheck::ConsumerMonitor;
use crate::services::processor::QueueProcessor;
use anyhow::{bail, Context};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedHeaders, Headers, Message as _};
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MessageQueueConsumer {
    consumer: Arc<StreamConsumer>,
    topic: String,
    lag_tolerance: i64,
}

impl MessageQueueConsumer {
    pub fn new(
        kafka_address: &str,
        consumer_group: &str,
        topic: &str,
        lag_tolerance: i64,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", kafka_address)
            .set("group.id", consumer_group)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .context("creating kafka consumer")?;
        consumer
            .subscribe(&[topic])
            .with_context(|| format!("subscribing to topic {topic}"))?;

        Ok(Self {
            consumer: Arc::new(consumer),
            topic: topic.to_string(),
            lag_tolerance,
        })
    }

    /// Drain deliveries forever, handing each one to the processor.
    pub async fn run(&self, processor: QueueProcessor) {
        info!(topic = %self.topic, "consuming from topic");
        loop {
            match self.consumer.recv().await {
                Ok(delivery) => {
                    let message =
                        to_message(delivery.headers().map(header_pairs), delivery.payload());
                    processor.process(message).await;
                }
                Err(err) => warn!(%err, "error receiving message from topic"),
            }
        }
    }
}

fn header_pairs(headers: &BorrowedHeaders) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|header| {
            let value = header
                .value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            (header.key.to_string(), value)
        })
        .collect()
}

fn to_message(headers: Option<Vec<(String, String)>>, payload: Option<&[u8]>) -> Message {
    Message {
        headers: headers.unwrap_or_default().into_iter().collect(),
        body: payload
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl ConsumerMonitor for MessageQueueConsumer {
    async fn connectivity_check(&self) -> anyhow::Result<()> {
        let consumer = self.consumer.clone();
        let topic = self.topic.clone();
        tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(Some(&topic), PROBE_TIMEOUT)
                .map(|_| ())
                .context("fetching topic metadata")
        })
        .await
        .context("connectivity probe task failed")?
    }

    async fn monitor_check(&self) -> anyhow::Result<()> {
        let consumer = self.consumer.clone();
        let topic = self.topic.clone();
        let tolerance = self.lag_tolerance;
        tokio::task::spawn_blocking(move || consumer_lag(consumer.as_ref(), &topic, tolerance))
            .await
            .context("lag probe task failed")?
    }
}

/// Compare per-partition committed offsets against the high watermark.
/// Partitions without a committed offset count the whole retained range.
fn consumer_lag(consumer: &StreamConsumer, topic: &str, tolerance: i64) -> anyhow::Result<()> {
    let metadata = consumer
        .fetch_metadata(Some(topic), PROBE_TIMEOUT)
        .context("fetching topic metadata")?;
    let Some(topic_metadata) = metadata.topics().iter().find(|t| t.name() == topic) else {
        bail!("topic {topic} not present in broker metadata");
    };

    let mut partitions = TopicPartitionList::new();
    for partition in topic_metadata.partitions() {
        partitions.add_partition(topic, partition.id());
    }
    let committed = consumer
        .committed_offsets(partitions, PROBE_TIMEOUT)
        .context("fetching committed offsets")?;

    for element in committed.elements() {
        let (low, high) = consumer
            .fetch_watermarks(topic, element.partition(), PROBE_TIMEOUT)
            .context("fetching watermarks")?;
        let lag = match element.offset() {
            Offset::Offset(offset) => high - offset,
            _ => high - low,
        };
        if lag > tolerance {
            bail!(
                "consumer lag {lag} on partition {} exceeds tolerance {tolerance}",
                element.partition()
            );
        }
    }
    Ok(())
}
