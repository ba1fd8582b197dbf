//! src/services/writer.rs
//!
//! Writer — single-object upsert with hash comparison and "only-updates"
//! suppression, plus delete. The HEAD-then-PUT flow buys accurate
//! CREATED/UPDATED reporting and the ability to skip no-op writes when an
//! upstream pipeline re-emits unchanged payloads.

use crate::models::object::{OBJECT_HASH_KEY, TRANSACTION_ID_KEY};
use crate::services::hash::payload_hash;
use crate::services::key_mapper::map_key;
use crate::services::store::{BlobStore, StoreError};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Outcome taxonomy shared by the HTTP handlers and the queue processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Unchanged,
    Created,
    Updated,
    InternalError,
    ServiceUnavailable,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("stored object hash is not a valid integer: {0}")]
    MalformedStoredHash(#[from] std::num::ParseIntError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WriteError {
    /// The [`WriteStatus`] a failed write reports upstream.
    pub fn status(&self) -> WriteStatus {
        match self {
            WriteError::MalformedStoredHash(_) => WriteStatus::InternalError,
            WriteError::Store(_) => WriteStatus::ServiceUnavailable,
        }
    }
}

#[derive(Clone)]
pub struct Writer {
    store: Arc<dyn BlobStore>,
    bucket_prefix: String,
    only_updates_enabled: bool,
}

impl Writer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        bucket_prefix: impl Into<String>,
        only_updates_enabled: bool,
    ) -> Self {
        Self {
            store,
            bucket_prefix: bucket_prefix.into(),
            only_updates_enabled,
        }
    }

    /// Upsert `payload` under the key derived from `uuid`.
    ///
    /// HEADs the target first to classify the write, then PUTs unless
    /// suppression applies. A missing `Current-Object-Hash` on an existing
    /// object counts as `0`, so such objects always register as updated.
    pub async fn write(
        &self,
        uuid: &str,
        path: &str,
        payload: &Bytes,
        content_type: Option<&str>,
        transaction_id: &str,
        ignore_hash: bool,
    ) -> Result<WriteStatus, WriteError> {
        let key = map_key(&self.bucket_prefix, path, uuid);
        let new_hash = payload_hash(payload);

        let mut status = match self.store.head_object(&key).await {
            Ok(None) => WriteStatus::Created,
            Ok(Some(head)) => {
                let recorded = head.metadata_value(OBJECT_HASH_KEY).unwrap_or("0");
                let current_hash: u64 = recorded.parse().map_err(|err| {
                    error!(
                        transaction_id,
                        uuid, recorded, "stored object hash failed to parse"
                    );
                    WriteError::MalformedStoredHash(err)
                })?;
                if current_hash == new_hash {
                    WriteStatus::Unchanged
                } else {
                    WriteStatus::Updated
                }
            }
            Err(err) => {
                error!(transaction_id, uuid, %err, "error retrieving object metadata");
                return Err(err.into());
            }
        };

        if status == WriteStatus::Unchanged {
            if self.only_updates_enabled && !ignore_hash {
                debug!(
                    transaction_id,
                    uuid, "payload unchanged since last upload, write skipped"
                );
                return Ok(WriteStatus::Unchanged);
            }
            // Suppression does not apply; the PUT happens and reports as an update.
            status = WriteStatus::Updated;
        }

        let mut metadata = HashMap::new();
        metadata.insert(TRANSACTION_ID_KEY.to_string(), transaction_id.to_string());
        metadata.insert(OBJECT_HASH_KEY.to_string(), new_hash.to_string());
        let content_type = content_type.filter(|ct| !ct.is_empty());

        self.store
            .put_object(&key, payload.clone(), content_type, metadata)
            .await
            .map_err(|err| {
                error!(transaction_id, uuid, %err, "error writing payload to store");
                WriteError::Store(err)
            })?;

        Ok(status)
    }

    /// Remove the object for `uuid`. Deleting a missing key is the store's
    /// natural no-op.
    pub async fn delete(
        &self,
        uuid: &str,
        path: &str,
        transaction_id: &str,
    ) -> Result<(), StoreError> {
        let key = map_key(&self.bucket_prefix, path, uuid);
        self.store.delete_object(&key).await.map_err(|err| {
            error!(transaction_id, uuid, %err, "error deleting object");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::in_memory::{InMemoryStore, StoredEntry};

    const UUID: &str = "123e4567-e89b-12d3-a456-426655440000";
    const KEY: &str = "test/prefix/123e4567/e89b/12d3/a456/426655440000";
    const TID: &str = "tid_test";

    fn writer(store: Arc<InMemoryStore>, only_updates: bool) -> Writer {
        Writer::new(store, "test/prefix", only_updates)
    }

    fn seed_with_hash(store: &InMemoryStore, payload: &[u8], hash: &str) {
        let mut metadata = HashMap::new();
        metadata.insert(OBJECT_HASH_KEY.to_string(), hash.to_string());
        store.seed_entry(
            KEY,
            StoredEntry {
                body: payload.to_vec(),
                content_type: Some("application/json".to_string()),
                metadata,
            },
        );
    }

    #[tokio::test]
    async fn new_object_is_created_with_hash_and_transaction_metadata() {
        let store = Arc::new(InMemoryStore::new());
        let w = writer(store.clone(), false);
        let payload = Bytes::from_static(b"PAYLOAD");

        let status = w
            .write(UUID, "", &payload, Some("application/json"), TID, false)
            .await
            .unwrap();

        assert_eq!(status, WriteStatus::Created);
        let entry = store.entry(KEY).expect("object stored");
        assert_eq!(entry.body, b"PAYLOAD");
        assert_eq!(entry.content_type.as_deref(), Some("application/json"));
        assert_eq!(entry.metadata.get(TRANSACTION_ID_KEY).unwrap(), TID);
        assert_eq!(
            entry.metadata.get(OBJECT_HASH_KEY).unwrap(),
            &payload_hash(b"PAYLOAD").to_string()
        );
    }

    #[tokio::test]
    async fn matching_hash_with_only_updates_suppresses_the_put() {
        let store = Arc::new(InMemoryStore::new());
        seed_with_hash(&store, b"PAYLOAD", &payload_hash(b"PAYLOAD").to_string());
        let w = writer(store.clone(), true);

        let status = w
            .write(
                UUID,
                "",
                &Bytes::from_static(b"PAYLOAD"),
                Some("application/json"),
                TID,
                false,
            )
            .await
            .unwrap();

        assert_eq!(status, WriteStatus::Unchanged);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn ignore_hash_forces_the_put_despite_matching_hash() {
        let store = Arc::new(InMemoryStore::new());
        seed_with_hash(&store, b"PAYLOAD", &payload_hash(b"PAYLOAD").to_string());
        let w = writer(store.clone(), true);

        let status = w
            .write(
                UUID,
                "",
                &Bytes::from_static(b"PAYLOAD"),
                Some("application/json"),
                TID,
                true,
            )
            .await
            .unwrap();

        assert_eq!(status, WriteStatus::Updated);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn matching_hash_without_only_updates_promotes_to_updated() {
        let store = Arc::new(InMemoryStore::new());
        seed_with_hash(&store, b"PAYLOAD", &payload_hash(b"PAYLOAD").to_string());
        let w = writer(store.clone(), false);

        let status = w
            .write(UUID, "", &Bytes::from_static(b"PAYLOAD"), None, TID, false)
            .await
            .unwrap();

        assert_eq!(status, WriteStatus::Updated);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn existing_object_without_recorded_hash_counts_as_updated() {
        let store = Arc::new(InMemoryStore::new());
        store.seed(KEY, b"OLD");
        let w = writer(store.clone(), true);

        let status = w
            .write(UUID, "", &Bytes::from_static(b"PAYLOAD"), None, TID, false)
            .await
            .unwrap();

        assert_eq!(status, WriteStatus::Updated);
        assert_eq!(store.entry(KEY).unwrap().body, b"PAYLOAD");
    }

    #[tokio::test]
    async fn changed_payload_is_reported_as_updated() {
        let store = Arc::new(InMemoryStore::new());
        seed_with_hash(&store, b"OLD", &payload_hash(b"OLD").to_string());
        let w = writer(store.clone(), true);

        let status = w
            .write(UUID, "", &Bytes::from_static(b"NEW"), None, TID, false)
            .await
            .unwrap();

        assert_eq!(status, WriteStatus::Updated);
        assert_eq!(store.entry(KEY).unwrap().body, b"NEW");
    }

    #[tokio::test]
    async fn malformed_stored_hash_is_an_internal_error() {
        let store = Arc::new(InMemoryStore::new());
        seed_with_hash(&store, b"PAYLOAD", "not-a-number");
        let w = writer(store.clone(), true);

        let err = w
            .write(UUID, "", &Bytes::from_static(b"PAYLOAD"), None, TID, false)
            .await
            .unwrap_err();

        assert_eq!(err.status(), WriteStatus::InternalError);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn head_failure_is_service_unavailable_and_skips_the_put() {
        let store = Arc::new(InMemoryStore::new());
        store.fail("head_object", "S3 error");
        let w = writer(store.clone(), false);

        let err = w
            .write(UUID, "", &Bytes::from_static(b"PAYLOAD"), None, TID, false)
            .await
            .unwrap_err();

        assert_eq!(err.status(), WriteStatus::ServiceUnavailable);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn put_failure_is_service_unavailable() {
        let store = Arc::new(InMemoryStore::new());
        store.fail("put_object", "S3 error");
        let w = writer(store.clone(), false);

        let err = w
            .write(UUID, "", &Bytes::from_static(b"PAYLOAD"), None, TID, false)
            .await
            .unwrap_err();

        assert_eq!(err.status(), WriteStatus::ServiceUnavailable);
    }

    #[tokio::test]
    async fn empty_content_type_is_not_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let w = writer(store.clone(), false);

        w.write(UUID, "", &Bytes::from_static(b"PAYLOAD"), Some(""), TID, false)
            .await
            .unwrap();

        assert_eq!(store.entry(KEY).unwrap().content_type, None);
    }

    #[tokio::test]
    async fn path_scopes_the_key_when_prefix_is_empty() {
        let store = Arc::new(InMemoryStore::new());
        let w = Writer::new(store.clone(), "", false);

        w.write(
            UUID,
            "testDirectory",
            &Bytes::from_static(b"PAYLOAD"),
            None,
            TID,
            false,
        )
        .await
        .unwrap();

        assert!(store
            .entry("testDirectory/123e4567/e89b/12d3/a456/426655440000")
            .is_some());
    }

    #[tokio::test]
    async fn delete_removes_the_object_and_propagates_store_errors() {
        let store = Arc::new(InMemoryStore::new());
        store.seed(KEY, b"PAYLOAD");
        let w = writer(store.clone(), false);

        w.delete(UUID, "", TID).await.unwrap();
        assert!(store.entry(KEY).is_none());

        store.fail("delete_object", "S3 error");
        assert!(w.delete(UUID, "", TID).await.is_err());
    }
}
