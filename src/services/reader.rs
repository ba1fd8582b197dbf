//! src/services/reader.rs
//!
//! Reader — single-object get plus the three enumeration paths (count, ids,
//! bulk streaming). The bulk engine is a bounded pipeline:
//!
//! ```text
//! lister ──uuids(chan, cap=3000)──▶ W workers ──items(chan, cap=⌊1.5·W⌋)──▶ sink ──▶ pipe
//! ```
//!
//! Bounded channels give natural backpressure: the lister stalls when
//! workers are slow, workers stall when the consumer of the pipe is slow.
//! When the pipe reader is dropped mid-stream the sink's next write fails
//! and the stages unwind through closed channels.

use crate::models::object::{FetchedObject, IdRecord};
use crate::services::key_mapper::{effective_scope, list_prefix, map_key, uuid_from_key};
use crate::services::store::{BlobStore, StoreError};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

/// Three times the default listing page size.
const UUID_CHANNEL_CAPACITY: usize = 3000;
const PAGE_CHANNEL_CAPACITY: usize = 10;
const PIPE_BUFFER_BYTES: usize = 64 * 1024;

/// A listed key contributes to enumeration unless it is a folder marker,
/// an administrative artefact, or the bare dot.
fn is_content_key(key: &str) -> bool {
    !key.ends_with('/') && !key.starts_with("__") && key != "."
}

#[derive(Clone)]
pub struct Reader {
    store: Arc<dyn BlobStore>,
    bucket_prefix: String,
    workers: usize,
}

impl Reader {
    pub fn new(store: Arc<dyn BlobStore>, bucket_prefix: impl Into<String>, workers: usize) -> Self {
        Self {
            store,
            bucket_prefix: bucket_prefix.into(),
            workers: workers.max(1),
        }
    }

    /// Fetch a single object; `Ok(None)` when the key does not exist.
    pub async fn get(&self, uuid: &str, path: &str) -> Result<Option<FetchedObject>, StoreError> {
        let key = map_key(&self.bucket_prefix, path, uuid);
        self.store.get_object(&key).await
    }

    /// Count surviving keys across all listing pages.
    ///
    /// Pages flow through a bounded channel to a background reducer; a
    /// listing error discards the running count.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let (page_tx, mut page_rx) = mpsc::channel::<Vec<String>>(PAGE_CHANNEL_CAPACITY);
        let reducer = tokio::spawn(async move {
            let mut total: i64 = 0;
            while let Some(keys) = page_rx.recv().await {
                total += keys.iter().filter(|key| is_content_key(key)).count() as i64;
            }
            total
        });

        let prefix = list_prefix(&self.bucket_prefix);
        let mut continuation: Option<String> = None;
        loop {
            let page = match self
                .store
                .list_page(prefix.as_deref(), continuation.as_deref(), None)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    reducer.abort();
                    return Err(err);
                }
            };
            if page_tx.send(page.keys).await.is_err() {
                break;
            }
            match page.next_continuation_token {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        drop(page_tx);

        reducer
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    /// Stream `{"ID":"<uuid>"}` lines for every surviving key.
    ///
    /// A producer paginates the listing into a bounded channel; an encoder
    /// writes one JSON line per UUID into the returned pipe.
    pub async fn ids(&self) -> Result<DuplexStream, StoreError> {
        self.check_list_ok("").await?;

        let (mut pipe_writer, pipe_reader) = tokio::io::duplex(PIPE_BUFFER_BYTES);
        let (uuid_tx, mut uuid_rx) = mpsc::channel::<String>(UUID_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(id) = uuid_rx.recv().await {
                let mut line = match serde_json::to_vec(&IdRecord { id }) {
                    Ok(line) => line,
                    Err(err) => {
                        error!(%err, "error encoding id record");
                        break;
                    }
                };
                line.push(b'\n');
                if pipe_writer.write_all(&line).await.is_err() {
                    break;
                }
            }
            let _ = pipe_writer.shutdown().await;
        });

        let store = self.store.clone();
        let scope = self.bucket_prefix.clone();
        tokio::spawn(async move {
            if let Err(err) = stream_uuids(store, &scope, uuid_tx).await {
                error!(%err, "error reading content of bucket");
            }
        });

        Ok(pipe_reader)
    }

    /// Stream every surviving object's payload, `'\n'`-separated, in no
    /// particular order.
    ///
    /// The contract is a multiset of payloads: worker fan-out does not
    /// preserve listing order. A minimal listing probe runs first so auth
    /// and permission errors surface before any task is spawned. Listing and
    /// UUID recovery use the same effective prefix as the per-object keys,
    /// so a request `path` scopes the whole sweep when no bucket prefix is
    /// configured.
    pub async fn get_all(&self, path: &str) -> Result<DuplexStream, StoreError> {
        self.check_list_ok(path).await?;

        let (pipe_writer, pipe_reader) = tokio::io::duplex(PIPE_BUFFER_BYTES);
        let (uuid_tx, uuid_rx) = mpsc::channel::<String>(UUID_CHANNEL_CAPACITY);
        let uuid_rx = Arc::new(Mutex::new(uuid_rx));
        let (item_tx, mut item_rx) =
            mpsc::channel::<FetchedObject>((self.workers * 3 / 2).max(1));

        for _ in 0..self.workers {
            let store = self.store.clone();
            let bucket_prefix = self.bucket_prefix.clone();
            let path = path.to_string();
            let uuid_rx = uuid_rx.clone();
            let item_tx = item_tx.clone();
            tokio::spawn(async move {
                loop {
                    // Hold the lock only for the receive so workers interleave.
                    let uuid = { uuid_rx.lock().await.recv().await };
                    let Some(uuid) = uuid else { break };
                    let key = map_key(&bucket_prefix, &path, &uuid);
                    match store.get_object(&key).await {
                        Ok(Some(item)) => {
                            if item_tx.send(item).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(uuid = %uuid, %err, "error fetching object during bulk read")
                        }
                    }
                }
            });
        }
        // Workers hold the remaining senders; the items channel closes when
        // the last worker exits.
        drop(item_tx);

        tokio::spawn(async move {
            let mut out = pipe_writer;
            while let Some(item) = item_rx.recv().await {
                let mut body = item.body.into_async_read();
                match tokio::io::copy(&mut body, &mut out).await {
                    Ok(_) => {
                        if out.write_all(b"\n").await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%err, "error reading object body during bulk read"),
                }
            }
            let _ = out.shutdown().await;
        });

        let store = self.store.clone();
        let scope = effective_scope(&self.bucket_prefix, path).to_string();
        tokio::spawn(async move {
            if let Err(err) = stream_uuids(store, &scope, uuid_tx).await {
                error!(%err, "error reading content of bucket during bulk read");
            }
        });

        Ok(pipe_reader)
    }

    /// Minimal `MaxKeys=1` listing used as a pre-flight probe.
    async fn check_list_ok(&self, path: &str) -> Result<(), StoreError> {
        let scope = effective_scope(&self.bucket_prefix, path);
        self.store
            .list_page(list_prefix(scope).as_deref(), None, Some(1))
            .await
            .map(|_| ())
    }
}

/// Paginate the bucket under `scope` (the effective prefix) and send the
/// reconstructed UUID of every surviving key. Returns early (without error)
/// when the receiver hangs up.
async fn stream_uuids(
    store: Arc<dyn BlobStore>,
    scope: &str,
    tx: mpsc::Sender<String>,
) -> Result<(), StoreError> {
    let prefix = list_prefix(scope);
    let mut continuation: Option<String> = None;
    loop {
        let page = store
            .list_page(prefix.as_deref(), continuation.as_deref(), None)
            .await?;
        for key in &page.keys {
            if is_content_key(key) && tx.send(uuid_from_key(scope, key)).await.is_err() {
                return Ok(());
            }
        }
        match page.next_continuation_token {
            Some(token) => continuation = Some(token),
            None => return Ok(()),
        }
    }
}
