// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! An open file handle: open-count, a debounced flush timer, and the
//! buffer/self-encryptor pairing that turns buffered writes into stored
//! chunks. Grounded on the source's `FileContext`/`File` pairing (meta data
//! and self-encryptor travel together; the buffer defers the actual
//! chunking until flush).

use crate::buffer::WriteBuffer;
use crate::config::Config;
use crate::error::Result;
use crate::meta_data::MetaData;
use crate::self_encryptor::{chunk_identity, SelfEncryptor};
use crate::store::{ObjectKind, Store};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct Inner {
    meta: MetaData,
    buffer: WriteBuffer,
    encryptor: SelfEncryptor,
    loaded: bool,
    open_count: usize,
    flushed: bool,
    /// When the current run of unflushed writes began, so a sustained
    /// write stream can still be forced to flush at `max_flush_interval`.
    first_unflushed_write: Option<Instant>,
}

/// A handle on one file's content, shared between every caller that has it
/// open concurrently.
#[derive(Clone)]
pub struct File<S: Store> {
    inner: Arc<Mutex<Inner>>,
    store: Arc<S>,
    config: Config,
    flush_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl<S: Store + 'static> File<S> {
    /// Opens `meta` (whose `data_map` reflects its last-flushed content),
    /// with the open count starting at one.
    pub fn open(meta: MetaData, config: Config, store: Arc<S>) -> Self {
        let data_map = meta.data_map().cloned().unwrap_or_default();
        let inner = Inner {
            meta,
            buffer: WriteBuffer::new(&config),
            encryptor: SelfEncryptor::new(data_map),
            loaded: false,
            open_count: 1,
            flushed: true,
            first_unflushed_write: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            store,
            config,
            flush_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Registers another concurrent opener.
    pub async fn increment_open(&self) {
        self.inner.lock().await.open_count += 1;
    }

    /// Releases one opener's hold. If it was the last, flushes any pending
    /// writes and returns `true` so the caller (`Drive`) can drop this
    /// handle from its open-file table.
    pub async fn release(&self) -> Result<bool> {
        let is_last = {
            let mut inner = self.inner.lock().await;
            inner.open_count = inner.open_count.saturating_sub(1);
            inner.open_count == 0
        };
        if is_last {
            self.cancel_scheduled_flush().await;
            self.flush().await?;
        }
        Ok(is_last)
    }

    async fn ensure_loaded(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.loaded {
            return Ok(());
        }
        let size = inner.meta.size();
        let content = if size == 0 {
            Vec::new()
        } else {
            inner.encryptor.read(self.store.as_ref(), 0, size).await?
        };
        inner.buffer = WriteBuffer::with_content(&self.config, content);
        inner.loaded = true;
        Ok(())
    }

    /// Reads `len` bytes starting at `offset`, clamped at end-of-file.
    pub async fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.ensure_loaded().await?;
        let mut inner = self.inner.lock().await;
        let content = inner.buffer.contents()?;
        let start = (offset as usize).min(content.len());
        let end = ((offset + len) as usize).min(content.len());
        Ok(content[start..end].to_vec())
    }

    /// Writes `data` at `offset`, arming the debounced flush timer.
    pub async fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.ensure_loaded().await?;
        {
            let mut inner = self.inner.lock().await;
            inner.buffer.write_at(offset, data)?;
            let new_size = inner.buffer.len();
            if new_size > inner.meta.size() {
                inner.meta.set_size(new_size);
            }
            inner.meta.update_last_modified();
            if inner.flushed {
                inner.first_unflushed_write = Some(Instant::now());
            }
            inner.flushed = false;
        }
        self.schedule_flush();
        Ok(())
    }

    /// Truncates (or zero-extends) the file to `size`.
    pub async fn truncate(&self, size: u64) -> Result<()> {
        self.ensure_loaded().await?;
        {
            let mut inner = self.inner.lock().await;
            inner.buffer.truncate(size)?;
            inner.meta.set_size(size);
            inner.meta.update_last_modified();
            if inner.flushed {
                inner.first_unflushed_write = Some(Instant::now());
            }
            inner.flushed = false;
        }
        self.schedule_flush();
        Ok(())
    }

    /// True if every write since the last flush has been committed.
    pub async fn is_flushed(&self) -> bool {
        self.inner.lock().await.flushed
    }

    /// A snapshot of this file's current metadata (reflects unflushed size
    /// changes, but `data_map` only updates on an actual flush).
    pub async fn metadata(&self) -> MetaData {
        self.inner.lock().await.meta.clone()
    }

    /// Commits any pending buffered bytes to chunks, writes them to the
    /// store, and updates this handle's metadata's data map. Returns the
    /// updated metadata so the caller can re-store the owning directory.
    pub async fn flush(&self) -> Result<MetaData> {
        let mut inner = self.inner.lock().await;
        if inner.flushed {
            return Ok(inner.meta.clone());
        }
        let content = inner.buffer.contents()?;
        let outcome = inner.encryptor.commit(content)?;
        for (name, bytes) in outcome.puts {
            let id = chunk_identity(&name);
            self.store.put(ObjectKind::Chunk, id, bytes.to_vec()).await?;
        }
        inner.meta.set_data_map(outcome.data_map);
        inner.flushed = true;
        inner.first_unflushed_write = None;
        debug!(name = inner.meta.name(), "flushed file");
        Ok(inner.meta.clone())
    }

    /// (Re-)arms the debounced flush timer: a burst of writes within
    /// `min_flush_interval` of each other coalesces into a single flush, but
    /// a sustained stream of writes is still forced to flush no later than
    /// `max_flush_interval` after the first write in the run (the debounce
    /// is capped by, not reset past, that ceiling).
    fn schedule_flush(&self) {
        let this = self.clone();
        let min = self.config.min_flush_interval;
        let max = self.config.max_flush_interval;
        tokio::spawn(async move {
            let mut guard = this.flush_task.lock().await;
            if let Some(handle) = guard.take() {
                handle.abort();
            }
            let first_write_at = {
                let mut inner = this.inner.lock().await;
                *inner.first_unflushed_write.get_or_insert_with(Instant::now)
            };
            let remaining_to_max = max.saturating_sub(first_write_at.elapsed());
            let sleep_for = min.min(remaining_to_max);
            let task_self = this.clone();
            *guard = Some(tokio::spawn(async move {
                tokio::time::sleep(sleep_for).await;
                if let Err(e) = task_self.flush().await {
                    warn!(error = %e, "debounced flush failed");
                }
            }));
        });
    }

    async fn cancel_scheduled_flush(&self) {
        if let Some(handle) = self.flush_task.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_utils::MemoryStore;

    fn config() -> Config {
        Config::default()
    }

    #[tokio::test]
    async fn write_then_read_without_flush_sees_the_write() {
        let store = Arc::new(MemoryStore::new());
        let meta = MetaData::new("a.txt", false);
        let file = File::open(meta, config(), store);
        file.write(0, b"hello").await.expect("write");
        let read = file.read(0, 5).await.expect("read");
        assert_eq!(read, b"hello");
    }

    #[tokio::test]
    async fn flush_commits_chunks_and_updates_data_map() {
        let store = Arc::new(MemoryStore::new());
        let meta = MetaData::new("a.txt", false);
        let file = File::open(meta, config(), store);
        file.write(0, b"hello world").await.expect("write");
        let flushed_meta = file.flush().await.expect("flush");
        assert!(file.is_flushed().await);
        assert_eq!(flushed_meta.size(), 11);
    }

    #[tokio::test]
    async fn release_flushes_on_last_close() {
        let store = Arc::new(MemoryStore::new());
        let meta = MetaData::new("a.txt", false);
        let file = File::open(meta, config(), store);
        file.write(0, b"hello").await.expect("write");
        let was_last = file.release().await.expect("release");
        assert!(was_last);
        assert!(file.is_flushed().await);
    }

    #[tokio::test]
    async fn sustained_writes_still_flush_by_the_max_interval() {
        let store = Arc::new(MemoryStore::new());
        let meta = MetaData::new("a.txt", false);
        let config = Config {
            min_flush_interval: std::time::Duration::from_millis(80),
            max_flush_interval: std::time::Duration::from_millis(150),
            ..Config::default()
        };
        let file = File::open(meta, config, store);

        // Each write re-arms the `min` debounce before it can fire, but
        // none of them should push the forced flush past `max` measured
        // from the first write in the run.
        for _ in 0..4 {
            file.write(0, b"x").await.expect("write");
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(file.is_flushed().await);
    }

    #[tokio::test]
    async fn release_with_remaining_openers_does_not_flush() {
        let store = Arc::new(MemoryStore::new());
        let meta = MetaData::new("a.txt", false);
        let file = File::open(meta, config(), store);
        file.increment_open().await;
        file.write(0, b"hello").await.expect("write");
        let was_last = file.release().await.expect("release");
        assert!(!was_last);
    }
}
