//! src/services/store.rs
//!
//! BlobStore — the capability set the gateway needs from an S3-compatible
//! object store: HeadBucket, HeadObject, GetObject, PutObject, DeleteObject
//! and paged ListObjectsV2. The production implementation wraps the AWS SDK
//! client; tests run against an in-memory double with per-operation failure
//! injection.

use crate::models::object::{FetchedObject, ListPage, ObjectHead};
use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store request failed: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Asynchronous object-store operations.
///
/// "Not found" is part of the domain, not an error: `head_object` and
/// `get_object` answer `Ok(None)` when the store reports a missing key and
/// reserve `Err` for everything else.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn head_bucket(&self) -> StoreResult<()>;

    async fn head_object(&self, key: &str) -> StoreResult<Option<ObjectHead>>;

    async fn get_object(&self, key: &str) -> StoreResult<Option<FetchedObject>>;

    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> StoreResult<()>;

    async fn delete_object(&self, key: &str) -> StoreResult<()>;

    /// Fetch one listing page. `max_keys` bounds the page size when set.
    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> StoreResult<ListPage>;
}

/// S3-backed implementation of [`BlobStore`].
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

fn backend_error<E>(err: SdkError<E>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn head_bucket(&self) -> StoreResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(backend_error)
    }

    async fn head_object(&self, key: &str) -> StoreResult<Option<ObjectHead>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => Ok(Some(ObjectHead {
                metadata: out.metadata().cloned().unwrap_or_default(),
            })),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(None),
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn get_object(&self, key: &str) -> StoreResult<Option<FetchedObject>> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => Ok(Some(FetchedObject {
                content_type: out.content_type().map(str::to_string),
                body: out.body,
            })),
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(payload))
            .set_content_type(content_type.map(str::to_string))
            .set_metadata(Some(metadata))
            .send()
            .await
            .map(|_| ())
            .map_err(backend_error)
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(backend_error)
    }

    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> StoreResult<ListPage> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(str::to_string))
            .set_continuation_token(continuation_token.map(str::to_string))
            .set_max_keys(max_keys)
            .send()
            .await
            .map_err(backend_error)?;

        let keys = out
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();
        let next_continuation_token = if out.is_truncated().unwrap_or(false) {
            out.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            keys,
            next_continuation_token,
        })
    }
}

#[cfg(test)]
pub(crate) mod in_memory {
    //! Seedable in-memory [`BlobStore`] used across the service tests.

    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub(crate) struct StoredEntry {
        pub body: Vec<u8>,
        pub content_type: Option<String>,
        pub metadata: HashMap<String, String>,
    }

    /// BTreeMap keeps listing order lexicographic, matching S3.
    pub(crate) struct InMemoryStore {
        objects: Mutex<BTreeMap<String, StoredEntry>>,
        failures: Mutex<HashMap<&'static str, String>>,
        puts: AtomicUsize,
        page_size: usize,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::with_page_size(1000)
        }

        /// Small page sizes force pagination in listing tests.
        pub fn with_page_size(page_size: usize) -> Self {
            Self {
                objects: Mutex::new(BTreeMap::new()),
                failures: Mutex::new(HashMap::new()),
                puts: AtomicUsize::new(0),
                page_size,
            }
        }

        /// Insert a raw key directly, bypassing the write pipeline.
        pub fn seed(&self, key: &str, body: &[u8]) {
            self.seed_entry(
                key,
                StoredEntry {
                    body: body.to_vec(),
                    content_type: None,
                    metadata: HashMap::new(),
                },
            );
        }

        pub fn seed_entry(&self, key: &str, entry: StoredEntry) {
            self.objects.lock().unwrap().insert(key.to_string(), entry);
        }

        pub fn entry(&self, key: &str) -> Option<StoredEntry> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        pub fn put_count(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        /// Make every call to `op` fail with `message` until cleared.
        pub fn fail(&self, op: &'static str, message: &str) {
            self.failures.lock().unwrap().insert(op, message.to_string());
        }

        fn check(&self, op: &'static str) -> StoreResult<()> {
            match self.failures.lock().unwrap().get(op) {
                Some(message) => Err(StoreError::Backend(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl BlobStore for InMemoryStore {
        async fn head_bucket(&self) -> StoreResult<()> {
            self.check("head_bucket")
        }

        async fn head_object(&self, key: &str) -> StoreResult<Option<ObjectHead>> {
            self.check("head_object")?;
            Ok(self.entry(key).map(|entry| ObjectHead {
                metadata: entry.metadata,
            }))
        }

        async fn get_object(&self, key: &str) -> StoreResult<Option<FetchedObject>> {
            self.check("get_object")?;
            Ok(self.entry(key).map(|entry| FetchedObject {
                content_type: entry.content_type,
                body: ByteStream::from(entry.body),
            }))
        }

        async fn put_object(
            &self,
            key: &str,
            payload: Bytes,
            content_type: Option<&str>,
            metadata: HashMap<String, String>,
        ) -> StoreResult<()> {
            self.check("put_object")?;
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.seed_entry(
                key,
                StoredEntry {
                    body: payload.to_vec(),
                    content_type: content_type.map(str::to_string),
                    metadata,
                },
            );
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> StoreResult<()> {
            self.check("delete_object")?;
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_page(
            &self,
            prefix: Option<&str>,
            continuation_token: Option<&str>,
            max_keys: Option<i32>,
        ) -> StoreResult<ListPage> {
            self.check("list")?;
            let objects = self.objects.lock().unwrap();
            let matching: Vec<&String> = objects
                .keys()
                .filter(|key| prefix.is_none_or(|p| key.starts_with(p)))
                .filter(|key| continuation_token.is_none_or(|t| key.as_str() > t))
                .collect();

            let limit = max_keys
                .map(|m| m.max(0) as usize)
                .unwrap_or(usize::MAX)
                .min(self.page_size);
            let keys: Vec<String> = matching.iter().take(limit).map(|k| k.to_string()).collect();
            let next_continuation_token = if matching.len() > limit {
                keys.last().cloned()
            } else {
                None
            };

            Ok(ListPage {
                keys,
                next_continuation_token,
            })
        }
    }
}
