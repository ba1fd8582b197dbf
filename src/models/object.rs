//! Object-level types exchanged with the blob store.

use aws_sdk_s3::primitives::ByteStream;
use serde::Serialize;
use std::collections::HashMap;

/// Metadata key carrying the transaction id of the last successful write.
pub const TRANSACTION_ID_KEY: &str = "transaction-id";

/// Metadata key holding the decimal 64-bit payload hash recorded at the time
/// of the last successful PUT.
pub const OBJECT_HASH_KEY: &str = "Current-Object-Hash";

/// The result of a HEAD on an object key.
///
/// Carries only the user metadata map; the write pipeline reads the recorded
/// payload hash out of it. Stores may return metadata keys in any casing, so
/// lookups go through [`ObjectHead::metadata_value`].
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    /// User metadata attached to the object.
    pub metadata: HashMap<String, String>,
}

impl ObjectHead {
    /// Case-insensitive metadata lookup.
    ///
    /// S3 lowercases user metadata keys on the wire while test doubles and
    /// emulators may preserve the original casing.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A retrieved object: its content type and a lazily-read payload stream.
#[derive(Debug)]
pub struct FetchedObject {
    /// Content type recorded on the object, if any.
    pub content_type: Option<String>,
    /// Payload byte stream; not buffered until the caller consumes it.
    pub body: ByteStream,
}

/// One page of a bucket listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Raw object keys in listing (lexicographic) order.
    pub keys: Vec<String>,
    /// Continuation token for the next page, absent on the last page.
    pub next_continuation_token: Option<String>,
}

/// Wire record emitted by the `__ids` stream, one JSON object per line.
#[derive(Debug, Serialize)]
pub struct IdRecord {
    /// UUID in canonical hyphenated form.
    #[serde(rename = "ID")]
    pub id: String,
}
