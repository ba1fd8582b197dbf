//! src/services/processor.rs
//!
//! QueueProcessor — drains bus messages into the write pipeline. Delivery
//! semantics belong to the bus client: unparseable or failing messages are
//! logged and dropped, never re-enqueued, and a message is written at most
//! once.

use crate::models::message::{new_transaction_id, Message, TRANSACTION_ID_HEADER};
use crate::services::writer::{WriteStatus, Writer};
use bytes::Bytes;
use tracing::{error, info};

const CONTENT_TYPE_HEADER: &str = "Content-Type";
const MESSAGE_ID_HEADER: &str = "Message-Id";

#[derive(Clone)]
pub struct QueueProcessor {
    writer: Writer,
}

impl QueueProcessor {
    pub fn new(writer: Writer) -> Self {
        Self { writer }
    }

    /// Handle one inbound message.
    ///
    /// The transaction id comes from `X-Request-Id` (minted when absent),
    /// the content type from `Content-Type`, and the UUID from the JSON
    /// body, falling back to the `Message-Id` header when the body carries
    /// an empty one.
    pub async fn process(&self, message: Message) {
        let transaction_id = message
            .header(TRANSACTION_ID_HEADER)
            .filter(|tid| !tid.is_empty())
            .map(str::to_string)
            .unwrap_or_else(new_transaction_id);
        let content_type = message.header(CONTENT_TYPE_HEADER).unwrap_or("");

        let envelope: crate::models::message::InboundEnvelope =
            match serde_json::from_str(&message.body) {
                Ok(envelope) => envelope,
                Err(err) => {
                    error!(
                        transaction_id = %transaction_id,
                        message_id = message.header(MESSAGE_ID_HEADER).unwrap_or(""),
                        %err,
                        "could not unmarshal message"
                    );
                    return;
                }
            };

        let uuid = if envelope.uuid.is_empty() {
            message
                .header(MESSAGE_ID_HEADER)
                .unwrap_or_default()
                .to_string()
        } else {
            envelope.uuid
        };

        let payload = Bytes::from(message.body.clone());
        match self
            .writer
            .write(
                &uuid,
                "",
                &payload,
                Some(content_type),
                &transaction_id,
                false,
            )
            .await
        {
            Ok(WriteStatus::Unchanged) => {}
            Ok(WriteStatus::Created) => {
                info!(transaction_id = %transaction_id, uuid = %uuid, "created record in store");
            }
            Ok(WriteStatus::Updated) => {
                info!(transaction_id = %transaction_id, uuid = %uuid, "updated record in store");
            }
            Ok(_) => {
                error!(transaction_id = %transaction_id, uuid = %uuid, "unhandled write status");
            }
            Err(err) => {
                error!(transaction_id = %transaction_id, uuid = %uuid, %err, "failed to write message");
            }
        }
    }
}
