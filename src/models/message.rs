//! Inbound queue messages and transaction-id conventions.

use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Request/response header that carries the transaction id.
pub const TRANSACTION_ID_HEADER: &str = "X-Request-Id";

/// A message delivered by the bus client: string headers plus an opaque body.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Message {
    /// Case-insensitive header lookup; bus clients differ on casing.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The body schema the ingestion path understands. Extra fields are ignored.
#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub uuid: String,
}

/// Mint a fresh transaction id for requests and messages that arrived
/// without one.
pub fn new_transaction_id() -> String {
    format!("tid_{}", Uuid::new_v4().simple())
}
