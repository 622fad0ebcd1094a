// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! The top-level, mount-adapter-facing entry point: wires a
//! [`DirectoryHandler`] to an open-file table, and exposes the operation
//! set a FUSE/Dokan/WinFsp layer would call into (spec §6), with FUSE op
//! numbers and mount-table glue themselves out of scope.

use crate::config::Config;
use crate::directory_handler::{DirectoryHandler, Keys};
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, OpKind};
use crate::file::File;
use crate::meta_data::MetaData;
use crate::store::Store;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// A file is keyed in the open-file table by its resolved path: the same
/// path opened twice shares one [`File`] handle and one open-count.
pub struct Drive<S: Store + 'static> {
    handler: DirectoryHandler<S>,
    open_files: DashMap<PathBuf, File<S>>,
    config: Config,
    store: Arc<S>,
}

impl<S: Store + 'static> Drive<S> {
    /// Constructs a drive over `store`, bootstrapping a fresh tree if
    /// `config.root_parent_id` is `None` or names nothing yet in the store.
    pub async fn new(config: Config, store: Arc<S>, keys: Keys) -> Result<Self> {
        let handler = DirectoryHandler::new(config.clone(), store.clone(), keys).await?;
        Ok(Self {
            handler,
            open_files: DashMap::new(),
            config,
            store,
        })
    }

    /// The root directory's identity, for the caller to persist as the
    /// next `Config::root_parent_id`.
    pub fn root_id(&self) -> crate::identity::Identity {
        self.handler.root_id()
    }

    /// Subscribes to filesystem change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.handler.subscribe()
    }

    /// Looks up the metadata for `path` without opening it.
    pub async fn get_metadata(&self, path: &Path) -> Result<MetaData> {
        self.handler.get(path).await
    }

    /// Creates a new regular file at `path`.
    pub async fn add_file(&self, path: &Path) -> Result<MetaData> {
        let name = file_name(path)?;
        let meta = MetaData::new(name, false);
        self.handler.add(path, meta.clone()).await?;
        Ok(meta)
    }

    /// Creates a new directory at `path`.
    pub async fn add_directory(&self, path: &Path) -> Result<MetaData> {
        let name = file_name(path)?;
        let meta = MetaData::new(name, true);
        self.handler.add(path, meta.clone()).await?;
        Ok(meta)
    }

    /// Creates a symlink at `path` pointing at `target`.
    pub async fn add_symlink(&self, path: &Path, target: &str) -> Result<MetaData> {
        let name = file_name(path)?;
        let meta = MetaData::new_symlink(name, target);
        self.handler.add(path, meta.clone()).await?;
        Ok(meta)
    }

    /// Removes the entry at `path`. If it names a currently-open file, the
    /// handle is dropped from the open-file table (outstanding readers keep
    /// their own `Arc` alive).
    pub async fn remove_file(&self, path: &Path) -> Result<MetaData> {
        let removed = self.handler.delete(path).await?;
        self.open_files.remove(path);
        Ok(removed)
    }

    /// Renames (and optionally moves) `old_path` to `new_path`, re-keying
    /// any open-file-table entry along with it.
    pub async fn rename_file(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        self.handler.rename(old_path, new_path).await?;
        if let Some((_, file)) = self.open_files.remove(old_path) {
            self.open_files.insert(new_path.to_path_buf(), file);
        }
        Ok(())
    }

    /// Re-parents the entry at `path` into `new_parent`, keeping its own
    /// name. A thin wrapper over rename for adapters that model moves
    /// separately from renames.
    pub async fn update_parent(&self, path: &Path, new_parent: &Path) -> Result<()> {
        let name = file_name(path)?;
        let new_path = new_parent.join(name);
        self.handler.rename(path, &new_path).await
    }

    /// Opens `path` for reading and writing, returning a handle shared by
    /// every concurrent opener of the same path.
    pub async fn open_file(&self, path: &Path) -> Result<File<S>> {
        if let Some(existing) = self.open_files.get(path) {
            existing.increment_open().await;
            return Ok(existing.clone());
        }
        let meta = self.handler.get(path).await?;
        if meta.is_directory() {
            return Err(Error::NotADirectory(path.display().to_string()));
        }
        let file = File::open(meta, self.config.clone(), self.store.clone());
        self.open_files.insert(path.to_path_buf(), file.clone());
        Ok(file)
    }

    /// Releases one opener's hold on `path`. On the last release, flushes
    /// pending writes and re-stores the owning directory with the file's
    /// updated metadata.
    pub async fn release(&self, path: &Path) -> Result<()> {
        let Some(file) = self.open_files.get(path).map(|f| f.clone()) else {
            return Ok(());
        };
        let was_last = file.release().await?;
        if was_last {
            self.open_files.remove(path);
            let meta = file.metadata().await;
            self.handler.replace_metadata(path, meta).await?;
            self.handler.publish_modified(path);
        }
        Ok(())
    }

    /// Forces a file's buffered writes to be committed without closing it.
    pub async fn flush_file(&self, path: &Path) -> Result<()> {
        if let Some(file) = self.open_files.get(path).map(|f| f.clone()) {
            let meta = file.flush().await?;
            self.handler.replace_metadata(path, meta).await?;
            self.handler.publish_modified(path);
        }
        Ok(())
    }

    /// Truncates the file at `path` to `size`.
    pub async fn truncate_file(&self, path: &Path, size: u64) -> Result<()> {
        let file = self.open_file(path).await?;
        file.truncate(size).await
    }

    /// Lists the visible (non-hidden) children of `path` one at a time,
    /// resetting once exhausted. Mirrors the source's `GetChildAndIncrementItr`.
    pub async fn list_next(&self, path: &Path) -> Result<Option<MetaData>> {
        self.handler.list_next(path).await
    }

    /// Reads a hidden (`.ms_hidden`) sibling of `path` in full.
    pub async fn read_hidden(&self, path: &Path) -> Result<Vec<u8>> {
        self.handler.read_hidden(path).await
    }

    /// Writes a hidden sibling of `path`, creating it if necessary.
    pub async fn write_hidden(&self, path: &Path, bytes: Vec<u8>) -> Result<()> {
        self.handler.write_hidden(path, bytes).await
    }

    /// Deletes a hidden sibling of `path`.
    pub async fn delete_hidden(&self, path: &Path) -> Result<()> {
        self.handler.delete_hidden(path).await
    }

    /// Names of every hidden sibling directly under `path`.
    pub async fn search_hidden(&self, path: &Path) -> Result<Vec<String>> {
        self.handler.search_hidden(path).await
    }

    /// The free-form notes attached to the entry at `path`.
    pub async fn get_notes(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self.handler.get(path).await?.notes().to_vec())
    }

    /// Appends a note to the entry at `path`.
    pub async fn add_note(&self, path: &Path, note: impl Into<String>) -> Result<()> {
        self.handler.add_note(path, note.into()).await
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::InvalidParameter(path.display().to_string()))
}
