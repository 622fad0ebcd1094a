// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! The central coordinator: resolves paths against a cached tree of
//! [`Directory`] objects, and is the only thing in this crate that ever
//! calls through to a [`Store`].

use crate::config::{Config, GROUP, HIDDEN_MARKER, OWNER, SERVICES, WORLD};
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, EventSink, OpKind};
use crate::identity::Identity;
use crate::meta_data::MetaData;
use crate::store::{ObjectKind, Store};
use crate::zone::{self, Zone};
use backoff::ExponentialBackoff;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries `op` with an exponential backoff, stopping as soon as it
/// reports a non-transient error or after `kMaxAttempts` (spec §7),
/// mirroring the teacher's `run_w_backoff_delayed`/`retry` pairing in
/// `sn/src/client/utils/test_utils/mod.rs`.
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempt = Cell::new(0u32);
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(20),
        max_interval: Duration::from_millis(200),
        max_elapsed_time: None,
        ..Default::default()
    };
    backoff::future::retry(policy, || {
        let attempt_no = attempt.get() + 1;
        attempt.set(attempt_no);
        let fut = op();
        async move {
            match fut.await {
                Ok(v) => Ok(v),
                Err(e) if e.is_transient() && attempt_no < crate::config::MAX_ATTEMPTS as u32 => {
                    warn!(attempt = attempt_no, error = %e, "transient store error, retrying");
                    Err(backoff::Error::Transient(e))
                }
                Err(e) => Err(backoff::Error::Permanent(e)),
            }
        }
    })
    .await
}

/// Signing material for the Owner and Group encodings. The World encoding
/// needs neither: it is stored verbatim (spec §4.3).
pub struct Keys {
    pub owner_keypair: ed25519_dalek::Keypair,
    pub group_secret_key: bls::SecretKey,
}

#[derive(Serialize, Deserialize)]
struct EncodedDirectory {
    /// Carried in the clear: the salt needed to decrypt `ciphertext`, and
    /// nothing more sensitive than the tree position a directory listing
    /// already reveals.
    parent_id: Identity,
    ciphertext: Vec<u8>,
    signature: Vec<u8>,
}

/// Resolves paths against a cached, lazily-loaded tree of directories, and
/// performs every mutation (add/delete/rename) with store-backed
/// durability and in-memory rollback on failure.
pub struct DirectoryHandler<S: Store> {
    config: Config,
    store: Arc<S>,
    keys: Keys,
    cache: DashMap<Identity, Directory>,
    root_id: Identity,
    events: EventSink,
}

impl<S: Store> DirectoryHandler<S> {
    /// Loads the existing tree if `config.root_parent_id` names one
    /// already in the store, otherwise bootstraps a fresh root with empty
    /// Owner, Group, and World zones (the latter two carrying an immovable
    /// `Services` child, per the source's constructor).
    pub async fn new(config: Config, store: Arc<S>, keys: Keys) -> Result<Self> {
        if config.unique_user_id == Identity::zero() {
            return Err(Error::Uninitialised);
        }
        let root_id = config.root_parent_id.unwrap_or_else(Identity::random);
        let cache = DashMap::new();
        let handler = Self {
            config,
            store,
            keys,
            cache,
            root_id,
            events: EventSink::new(),
        };
        handler.bootstrap(root_id).await?;
        Ok(handler)
    }

    /// The root directory's identity; the caller should persist this as
    /// `Config::root_parent_id` for the next construction.
    pub fn root_id(&self) -> Identity {
        self.root_id
    }

    /// Subscribes to filesystem change notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    async fn bootstrap(&self, root_id: Identity) -> Result<()> {
        match self.retrieve(Zone::Owner, root_id).await {
            Ok(root) => {
                self.cache.insert(root_id, root);
                return Ok(());
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        debug!(?root_id, "bootstrapping fresh directory tree");

        let mut root = Directory::empty_with_id(root_id, root_id);
        let owner = Directory::empty(root_id);
        let mut group = Directory::empty(root_id);
        let mut world = Directory::empty(root_id);
        let group_services = Directory::empty(group.id());
        let world_services = Directory::empty(world.id());

        group.add_child(MetaData::new_directory_with_id(SERVICES, group_services.id()))?;
        world.add_child(MetaData::new_directory_with_id(SERVICES, world_services.id()))?;
        root.add_child(MetaData::new_directory_with_id(OWNER, owner.id()))?;
        root.add_child(MetaData::new_directory_with_id(GROUP, group.id()))?;
        root.add_child(MetaData::new_directory_with_id(WORLD, world.id()))?;

        self.store_new(Zone::Owner, &root).await?;
        self.store_new(Zone::Owner, &owner).await?;
        self.store_new(Zone::Group, &group).await?;
        self.store_new(Zone::World, &world).await?;
        self.store_new(Zone::Group, &group_services).await?;
        self.store_new(Zone::World, &world_services).await?;

        self.cache.insert(root.id(), root);
        self.cache.insert(owner.id(), owner);
        self.cache.insert(group.id(), group);
        self.cache.insert(world.id(), world);
        self.cache.insert(group_services.id(), group_services);
        self.cache.insert(world_services.id(), world_services);
        Ok(())
    }

    /// Resolves `path` to the metadata of the entry it names.
    pub async fn get(&self, path: &Path) -> Result<MetaData> {
        let (parent, name) = self.resolve_parent(path).await?;
        parent
            .get_child(&name)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))
    }

    /// Loads (and caches) the directory named by `id`, fetching it from the
    /// store if it is not already cached.
    pub async fn get_directory(&self, zone: Zone, id: Identity) -> Result<Directory> {
        if let Some(dir) = self.cache.get(&id) {
            return Ok(dir.clone());
        }
        let dir = self.retrieve(zone, id).await?;
        self.cache.insert(id, dir.clone());
        Ok(dir)
    }

    /// Adds `meta` as a new child of the directory named by `path`,
    /// rejecting World-zone adds when the config is not world-writable. For
    /// a directory entry, a fresh empty `Directory` is stored under its
    /// `child_directory_id` before the parent is updated, and rolled back
    /// if either store fails (spec §4.3).
    pub async fn add(&self, path: &Path, meta: MetaData) -> Result<()> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        if !zone::can_add(path, self.config.world_writable) {
            return Err(Error::PermissionDenied(path.display().to_string()));
        }
        let dir_id = self.resolve_directory_id(path).await?;
        let mut dir = self.get_directory(zone, dir_id).await?;
        let snapshot = dir.clone();

        let name = meta.name().to_string();
        let child_dir_id = meta.child_directory_id();
        if let Err(e) = dir.add_child(meta) {
            return Err(e);
        }

        if let Some(child_id) = child_dir_id {
            let child_dir = Directory::empty_with_id(child_id, dir_id);
            if let Err(e) = self.store_new(zone, &child_dir).await {
                self.cache.insert(dir_id, snapshot);
                return Err(e);
            }
            self.cache.insert(child_id, child_dir);
        }

        if let Err(e) = self.store_existing(zone, &mut dir).await {
            self.cache.insert(dir_id, snapshot);
            if let Some(child_id) = child_dir_id {
                self.cache.remove(&child_id);
                let _ = self.store.delete(zone.directory_kind(), child_id).await;
            }
            return Err(e);
        }
        self.cache.insert(dir_id, dir);
        self.touch_parent_entry(zone, dir_id).await;
        self.events.publish(ChangeEvent::new(path.join(&name), None, OpKind::Added));
        Ok(())
    }

    /// Bumps the `last_modified` of `dir_id`'s own entry in its parent's
    /// child listing, propagating the change one level up (spec §4.3).
    /// Best-effort: a failure here does not fail the original mutation,
    /// since the child's own state is already durable.
    async fn touch_parent_entry(&self, zone: Zone, dir_id: Identity) {
        let parent_id = match self.cache.get(&dir_id) {
            Some(dir) => dir.parent_id(),
            None => return,
        };
        if parent_id == dir_id {
            return;
        }
        let parent_zone = if parent_id == self.root_id { Zone::Owner } else { zone };
        let mut parent_dir = match self.get_directory(parent_zone, parent_id).await {
            Ok(d) => d,
            Err(_) => return,
        };
        let entry = parent_dir
            .children()
            .find(|m| m.child_directory_id() == Some(dir_id))
            .cloned();
        if let Some(mut meta) = entry {
            meta.update_last_modified();
            parent_dir.replace_child(meta);
            if self.store_existing(parent_zone, &mut parent_dir).await.is_ok() {
                self.cache.insert(parent_id, parent_dir);
            }
        }
    }

    /// Removes the entry named by `path`, refusing to remove a non-empty
    /// directory.
    pub async fn delete(&self, path: &Path) -> Result<MetaData> {
        if !zone::can_delete(path, self.config.world_writable) {
            return Err(Error::PermissionDenied(path.display().to_string()));
        }
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir_id = self.resolve_directory_id(path).await?;
        let mut dir = self.get_directory(zone, dir_id).await?;
        let snapshot = dir.clone();

        let name = file_name(path)?;
        let existing = dir
            .get_child(&name)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        if !self.rename_target_removable(&existing) {
            return Err(Error::PermissionDenied(format!(
                "{} is a non-empty directory",
                path.display()
            )));
        }

        let removed = dir.remove_child(&name)?;
        if let Err(e) = self.store_existing(zone, &mut dir).await {
            self.cache.insert(dir_id, snapshot);
            return Err(e);
        }
        self.cache.insert(dir_id, dir);

        if let Some(child_id) = removed.child_directory_id() {
            self.cache.remove(&child_id);
            let _ = self.store.delete(zone.directory_kind(), child_id).await;
        }
        self.events.publish(ChangeEvent::new(path.to_path_buf(), None, OpKind::Removed));
        Ok(removed)
    }

    /// True if `target` can be the victim of a delete/overwriting rename:
    /// any file, or an empty directory (spec §11 supplement).
    fn rename_target_removable(&self, target: &MetaData) -> bool {
        if !target.is_directory() {
            return true;
        }
        match target.child_directory_id() {
            Some(id) => self
                .cache
                .get(&id)
                .map(|dir| dir.is_empty())
                .unwrap_or(true),
            None => true,
        }
    }

    /// Renames (and optionally moves) the entry at `old_path` to
    /// `new_path`, re-storing the whole subtree under the destination's
    /// encoding when the move crosses a zone boundary.
    pub async fn rename(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        if !zone::can_rename_from(old_path, self.config.world_writable)
            || !zone::can_rename_to(new_path, self.config.world_writable)
        {
            return Err(Error::PermissionDenied(old_path.display().to_string()));
        }
        let old_zone = zone::zone_of(old_path)
            .ok_or_else(|| Error::InvalidParameter(old_path.display().to_string()))?;
        let new_zone = zone::zone_of(new_path)
            .ok_or_else(|| Error::InvalidParameter(new_path.display().to_string()))?;

        let old_parent_id = self.resolve_directory_id(old_path).await?;
        let new_parent_id = self.resolve_directory_id(new_path).await?;
        let old_name = file_name(old_path)?;
        let new_name = file_name(new_path)?;

        if old_parent_id == new_parent_id && old_zone == new_zone {
            self.rename_same_parent(old_zone, old_parent_id, &old_name, &new_name)
                .await?;
        } else {
            self.rename_different_parent(
                old_zone,
                old_parent_id,
                &old_name,
                new_zone,
                new_parent_id,
                &new_name,
            )
            .await?;
        }

        self.events.publish(ChangeEvent::new(
            old_path.to_path_buf(),
            Some(new_path.to_path_buf()),
            OpKind::Renamed,
        ));
        Ok(())
    }

    async fn rename_same_parent(
        &self,
        zone: Zone,
        parent_id: Identity,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        let mut dir = self.get_directory(zone, parent_id).await?;
        let snapshot = dir.clone();
        if let Err(e) = dir.rename_child(old_name, new_name) {
            return Err(e);
        }
        if let Err(e) = self.store_existing(zone, &mut dir).await {
            self.cache.insert(parent_id, snapshot);
            return Err(e);
        }
        self.cache.insert(parent_id, dir);
        Ok(())
    }

    async fn rename_different_parent(
        &self,
        old_zone: Zone,
        old_parent_id: Identity,
        old_name: &str,
        new_zone: Zone,
        new_parent_id: Identity,
        new_name: &str,
    ) -> Result<()> {
        let mut old_dir = self.get_directory(old_zone, old_parent_id).await?;
        let old_snapshot = old_dir.clone();
        let mut meta = old_dir.remove_child(old_name)?;
        meta.set_name(new_name);
        meta.update_last_modified();

        let mut new_dir = self.get_directory(new_zone, new_parent_id).await?;
        let new_snapshot = new_dir.clone();
        if let Err(e) = new_dir.add_child(meta.clone()) {
            self.cache.insert(old_parent_id, old_snapshot);
            return Err(e);
        }

        if let Some(child_id) = meta.child_directory_id() {
            if old_zone != new_zone {
                if let Err(e) = self
                    .re_store_subtree(child_id, old_zone, new_zone, Some(new_parent_id))
                    .await
                {
                    self.cache.insert(old_parent_id, old_snapshot);
                    self.cache.insert(new_parent_id, new_snapshot);
                    return Err(e);
                }
            } else if let Some(mut dir) = self.cache.get(&child_id).map(|d| d.clone()) {
                dir.set_parent_id(new_parent_id);
                if let Err(e) = self.store_existing(new_zone, &mut dir).await {
                    self.cache.insert(old_parent_id, old_snapshot);
                    self.cache.insert(new_parent_id, new_snapshot);
                    return Err(e);
                }
                self.cache.insert(child_id, dir);
            }
        }

        if let Err(e) = self.store_existing(new_zone, &mut new_dir).await {
            self.cache.insert(old_parent_id, old_snapshot);
            self.cache.insert(new_parent_id, new_snapshot);
            return Err(e);
        }
        if let Err(e) = self.store_existing(old_zone, &mut old_dir).await {
            self.cache.insert(old_parent_id, old_snapshot);
            self.cache.insert(new_parent_id, new_snapshot);
            return Err(e);
        }

        self.cache.insert(old_parent_id, old_dir);
        self.cache.insert(new_parent_id, new_dir);
        Ok(())
    }

    /// Re-stores a directory (and, recursively, every directory beneath
    /// it) under a new zone's encoding, after a cross-zone rename moved it.
    /// `new_parent_id` overrides `dir.parent_id()` for this call only (the
    /// subtree root's new parent is the destination directory; every
    /// descendant keeps its existing parent, unaffected by the move).
    /// Mirrors the source's `ReStoreDirectories`.
    fn re_store_subtree<'a>(
        &'a self,
        id: Identity,
        old_zone: Zone,
        new_zone: Zone,
        new_parent_id: Option<Identity>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut dir = self.get_directory(old_zone, id).await?;
            if let Some(parent_id) = new_parent_id {
                dir.set_parent_id(parent_id);
            }
            let children: Vec<MetaData> = dir.children().cloned().collect();
            for child in &children {
                if let Some(child_id) = child.child_directory_id() {
                    self.re_store_subtree(child_id, old_zone, new_zone, None).await?;
                }
            }
            self.store_existing(new_zone, &mut dir).await?;
            let _ = self.store.delete(old_zone.directory_kind(), id).await;
            self.cache.insert(id, dir);
            Ok(())
        })
    }

    /// Resolves a path to the `(Directory, name)` pair naming its last
    /// component's parent and the component itself.
    async fn resolve_parent(&self, path: &Path) -> Result<(Directory, String)> {
        let parent_id = self.resolve_directory_id(path).await?;
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir = self.get_directory(zone, parent_id).await?;
        Ok((dir, file_name(path)?))
    }

    /// Walks from the root to the directory containing `path`'s last
    /// component, returning that directory's identity.
    async fn resolve_directory_id(&self, path: &Path) -> Result<Identity> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let components: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str().map(|s| s.to_string()),
                _ => None,
            })
            .collect();
        if components.is_empty() {
            return Err(Error::InvalidParameter("empty path".to_string()));
        }

        let mut current_id = self.root_id;
        // The root itself is always Owner-encoded, regardless of which
        // zone the path being resolved falls under; only once we step past
        // it (into Owner/Group/World and beyond) does the target zone's
        // encoding apply. The final component (the entry being addressed)
        // is not itself descended into.
        let mut current_zone = Zone::Owner;
        for name in &components[..components.len() - 1] {
            let dir = self.get_directory(current_zone, current_id).await?;
            let child = dir
                .get_child(name)
                .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
            current_id = child
                .child_directory_id()
                .ok_or_else(|| Error::NotADirectory(name.clone()))?;
            current_zone = zone;
        }
        Ok(current_id)
    }

    async fn store_new(&self, zone: Zone, dir: &Directory) -> Result<()> {
        self.put_with_retry(zone, dir).await
    }

    async fn store_existing(&self, zone: Zone, dir: &mut Directory) -> Result<()> {
        self.put_with_retry(zone, dir).await?;
        dir.mark_stored();
        Ok(())
    }

    async fn put_with_retry(&self, zone: Zone, dir: &Directory) -> Result<()> {
        let bytes = self.encode(zone, dir)?;
        let id = dir.id();
        with_retry(|| {
            let bytes = bytes.clone();
            async move { self.store.put(zone.directory_kind(), id, bytes).await }
        })
        .await
    }

    async fn retrieve(&self, zone: Zone, id: Identity) -> Result<Directory> {
        let bytes = with_retry(|| async move { self.store.get(zone.directory_kind(), id).await }).await?;
        self.decode(zone, id, &bytes)
    }

    fn encode(&self, zone: Zone, dir: &Directory) -> Result<Vec<u8>> {
        let serialised = dir.serialise()?;
        if !zone.is_encrypted() {
            return Ok(serialised);
        }
        let ciphertext = crate::crypto::encrypt_data_map(&dir.parent_id(), &dir.id(), &serialised);
        let signature = match zone {
            Zone::Owner => crate::crypto::sign_owner(&self.keys.owner_keypair, &ciphertext)
                .to_bytes()
                .to_vec(),
            Zone::Group => crate::crypto::sign_group(&self.keys.group_secret_key, &ciphertext).to_bytes(),
            Zone::World => unreachable!("world zone is not encrypted"),
        };
        let encoded = EncodedDirectory {
            parent_id: dir.parent_id(),
            ciphertext,
            signature,
        };
        bincode::serialize(&encoded).map_err(|e| Error::SerialisationError(e.to_string()))
    }

    fn decode(&self, zone: Zone, id: Identity, bytes: &[u8]) -> Result<Directory> {
        if !zone.is_encrypted() {
            return Directory::from_serialised(bytes);
        }
        let encoded: EncodedDirectory =
            bincode::deserialize(bytes).map_err(|e| Error::ParsingError(e.to_string()))?;

        match zone {
            Zone::Owner => {
                let signature = ed25519_dalek::Signature::from_bytes(&encoded.signature)
                    .map_err(|e| Error::CryptoError(e.to_string()))?;
                crate::crypto::verify_owner(&self.keys.owner_keypair.public, &encoded.ciphertext, &signature)?;
            }
            Zone::Group => {
                let signature = bls::Signature::from_bytes(encoded.signature.clone())
                    .map_err(|e| Error::CryptoError(e.to_string()))?;
                crate::crypto::verify_group(
                    &self.keys.group_secret_key.public_key(),
                    &encoded.ciphertext,
                    &signature,
                )?;
            }
            Zone::World => unreachable!("world zone is not encrypted"),
        }

        let plaintext = crate::crypto::decrypt_data_map(&encoded.parent_id, &id, &encoded.ciphertext)?;
        Directory::from_serialised(&plaintext)
    }

    /// Overwrites the metadata of the entry named by `path` in place (no
    /// structural add/remove), used when a file's data map changes on
    /// flush.
    pub async fn replace_metadata(&self, path: &Path, meta: MetaData) -> Result<()> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir_id = self.resolve_directory_id(path).await?;
        let mut dir = self.get_directory(zone, dir_id).await?;
        let snapshot = dir.clone();
        dir.replace_child(meta);
        if let Err(e) = self.store_existing(zone, &mut dir).await {
            self.cache.insert(dir_id, snapshot);
            return Err(e);
        }
        self.cache.insert(dir_id, dir);
        Ok(())
    }

    /// Publishes a `Modified` event for `path`.
    pub fn publish_modified(&self, path: &Path) {
        self.events.publish(ChangeEvent::new(path.to_path_buf(), None, OpKind::Modified));
    }

    /// Appends `note` to the entry named by `path`.
    pub async fn add_note(&self, path: &Path, note: String) -> Result<()> {
        let (dir, name) = self.resolve_parent(path).await?;
        let mut meta = dir
            .get_child(&name)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        meta.add_note(note);
        self.replace_metadata(path, meta).await
    }

    /// Resolves `path` itself as a directory (not its parent), for
    /// enumeration and `Services`-style traversal.
    async fn resolve_self_directory_id(&self, path: &Path) -> Result<Identity> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let components: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str().map(|s| s.to_string()),
                _ => None,
            })
            .collect();
        let mut current_id = self.root_id;
        let mut current_zone = Zone::Owner;
        for name in &components {
            let dir = self.get_directory(current_zone, current_id).await?;
            let child = dir
                .get_child(name)
                .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
            current_id = child
                .child_directory_id()
                .ok_or_else(|| Error::NotADirectory(name.clone()))?;
            current_zone = zone;
        }
        Ok(current_id)
    }

    /// Returns the next non-hidden child of the directory at `path`,
    /// advancing (and, once exhausted, resetting) its enumeration cursor.
    pub async fn list_next(&self, path: &Path) -> Result<Option<MetaData>> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir_id = self.resolve_self_directory_id(path).await?;
        let mut dir = self.get_directory(zone, dir_id).await?;
        let next = dir.get_child_and_advance_cursor().cloned();
        self.cache.insert(dir_id, dir);
        Ok(next)
    }

    /// Every hidden child name directly under the directory at `path`.
    pub async fn search_hidden(&self, path: &Path) -> Result<Vec<String>> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir_id = self.resolve_self_directory_id(path).await?;
        let dir = self.get_directory(zone, dir_id).await?;
        Ok(dir.hidden_child_names())
    }

    fn hidden_name(path: &Path) -> Result<String> {
        Ok(format!("{}.{}", file_name(path)?, HIDDEN_MARKER))
    }

    /// Reads the full content of `path`'s hidden companion entry.
    pub async fn read_hidden(&self, path: &Path) -> Result<Vec<u8>> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir_id = self.resolve_directory_id(path).await?;
        let dir = self.get_directory(zone, dir_id).await?;
        let hidden = Self::hidden_name(path)?;
        let meta = dir
            .get_child(&hidden)
            .cloned()
            .ok_or_else(|| Error::NotFound(hidden.clone()))?;
        let data_map = meta.data_map().cloned().unwrap_or_default();
        let encryptor = crate::self_encryptor::SelfEncryptor::new(data_map);
        encryptor.read(self.store.as_ref(), 0, meta.size()).await
    }

    /// Writes `bytes` as `path`'s hidden companion entry, creating it if it
    /// does not already exist.
    pub async fn write_hidden(&self, path: &Path, content: Vec<u8>) -> Result<()> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir_id = self.resolve_directory_id(path).await?;
        let mut dir = self.get_directory(zone, dir_id).await?;
        let snapshot = dir.clone();
        let hidden = Self::hidden_name(path)?;

        let existing_map = dir
            .get_child(&hidden)
            .and_then(|m| m.data_map().cloned());
        let mut encryptor = crate::self_encryptor::SelfEncryptor::new(existing_map.unwrap_or_default());
        let outcome = encryptor.commit(bytes::Bytes::from(content))?;
        for (name, chunk) in outcome.puts {
            let id = chunk_identity(&name);
            if let Err(e) = self.store.put(ObjectKind::Chunk, id, chunk.to_vec()).await {
                self.cache.insert(dir_id, snapshot);
                return Err(e);
            }
        }

        let mut meta = dir
            .get_child(&hidden)
            .cloned()
            .unwrap_or_else(|| MetaData::new(hidden.clone(), false));
        meta.set_data_map(outcome.data_map);
        if dir.has_child(&hidden) {
            dir.replace_child(meta);
        } else if let Err(e) = dir.add_child(meta) {
            self.cache.insert(dir_id, snapshot);
            return Err(e);
        }

        if let Err(e) = self.store_existing(zone, &mut dir).await {
            self.cache.insert(dir_id, snapshot);
            return Err(e);
        }
        self.cache.insert(dir_id, dir);
        Ok(())
    }

    /// Deletes `path`'s hidden companion entry, if any.
    pub async fn delete_hidden(&self, path: &Path) -> Result<()> {
        let zone = zone::zone_of(path).ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        let dir_id = self.resolve_directory_id(path).await?;
        let mut dir = self.get_directory(zone, dir_id).await?;
        let hidden = Self::hidden_name(path)?;
        if !dir.has_child(&hidden) {
            return Ok(());
        }
        let snapshot = dir.clone();
        let removed = dir.remove_child(&hidden)?;
        if let Err(e) = self.store_existing(zone, &mut dir).await {
            self.cache.insert(dir_id, snapshot);
            return Err(e);
        }
        self.cache.insert(dir_id, dir);

        if let Some(map) = removed.data_map() {
            let encryptor = crate::self_encryptor::SelfEncryptor::new(map.clone());
            let _ = encryptor.delete_all_chunks(self.store.as_ref()).await;
        }
        Ok(())
    }
}

use crate::self_encryptor::chunk_identity;

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::InvalidParameter(path.display().to_string()))
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! Convenience constructors for exercising a full handler in tests.
    use super::*;
    use crate::store::test_utils::MemoryStore;

    /// A `DirectoryHandler<MemoryStore>` with freshly generated signing
    /// keys, ready to bootstrap against an empty in-memory store.
    pub async fn handler_with_memory_store() -> DirectoryHandler<MemoryStore> {
        let mut csprng = rand::rngs::OsRng {};
        let keys = Keys {
            owner_keypair: ed25519_dalek::Keypair::generate(&mut csprng),
            group_secret_key: bls::SecretKey::random(),
        };
        let config = Config {
            unique_user_id: Identity::random(),
            ..Config::default()
        };
        DirectoryHandler::new(config, Arc::new(MemoryStore::new()), keys)
            .await
            .expect("bootstrap")
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::handler_with_memory_store;
    use super::*;

    #[tokio::test]
    async fn new_rejects_the_default_unique_user_id() {
        let mut csprng = rand::rngs::OsRng {};
        let keys = Keys {
            owner_keypair: ed25519_dalek::Keypair::generate(&mut csprng),
            group_secret_key: bls::SecretKey::random(),
        };
        let err = DirectoryHandler::new(
            Config::default(),
            Arc::new(crate::store::test_utils::MemoryStore::new()),
            keys,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Uninitialised));
    }

    #[tokio::test]
    async fn bootstrap_creates_the_three_zones() {
        let handler = handler_with_memory_store().await;
        let root = handler.get_directory(Zone::Owner, handler.root_id()).await.unwrap();
        assert!(root.has_child(OWNER));
        assert!(root.has_child(GROUP));
        assert!(root.has_child(WORLD));
    }

    #[tokio::test]
    async fn add_then_get_roundtrips_through_the_store() {
        let handler = handler_with_memory_store().await;
        let meta = MetaData::new("a.txt", false);
        handler.add(&PathBuf::from("Owner/a.txt"), meta).await.expect("add");
        let fetched = handler.get(&PathBuf::from("Owner/a.txt")).await.expect("get");
        assert_eq!(fetched.name(), "a.txt");
    }

    #[tokio::test]
    async fn world_add_is_rejected_when_not_world_writable() {
        let mut csprng = rand::rngs::OsRng {};
        let keys = Keys {
            owner_keypair: ed25519_dalek::Keypair::generate(&mut csprng),
            group_secret_key: bls::SecretKey::random(),
        };
        let config = Config {
            unique_user_id: Identity::random(),
            world_writable: false,
            ..Config::default()
        };
        let handler = DirectoryHandler::new(config, Arc::new(crate::store::test_utils::MemoryStore::new()), keys)
            .await
            .expect("bootstrap");
        let err = handler
            .add(&PathBuf::from("World/a.txt"), MetaData::new("a.txt", false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn rename_across_zones_moves_the_entry() {
        let handler = handler_with_memory_store().await;
        handler
            .add(&PathBuf::from("Owner/a.txt"), MetaData::new("a.txt", false))
            .await
            .expect("add");
        handler
            .rename(&PathBuf::from("Owner/a.txt"), &PathBuf::from("World/a.txt"))
            .await
            .expect("rename");
        assert!(handler.get(&PathBuf::from("Owner/a.txt")).await.is_err());
        assert!(handler.get(&PathBuf::from("World/a.txt")).await.is_ok());
    }

    #[tokio::test]
    async fn group_zone_refuses_add_and_delete() {
        let handler = handler_with_memory_store().await;
        let err = handler
            .add(&PathBuf::from("Group/a.txt"), MetaData::new("a.txt", false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        let err = handler.delete(&PathBuf::from("Group/Services")).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn delete_non_empty_directory_is_rejected() {
        let handler = handler_with_memory_store().await;
        let sub_meta = MetaData::new("sub", true);
        handler.add(&PathBuf::from("Owner/sub"), sub_meta.clone()).await.expect("add dir");
        let sub_id = sub_meta.child_directory_id().unwrap();
        let mut sub_dir = handler.get_directory(Zone::Owner, sub_id).await.unwrap();
        sub_dir.add_child(MetaData::new("inner.txt", false)).unwrap();
        handler.cache.insert(sub_id, sub_dir);

        let err = handler.delete(&PathBuf::from("Owner/sub")).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn zone_roots_cannot_be_deleted_or_renamed() {
        let handler = handler_with_memory_store().await;
        for root in ["Owner", "Group", "World", "World/Services"] {
            let err = handler.delete(&PathBuf::from(root)).await.unwrap_err();
            assert!(matches!(err, Error::PermissionDenied(_)), "{root} delete");
            let err = handler
                .rename(&PathBuf::from(root), &PathBuf::from("Owner/elsewhere"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::PermissionDenied(_)), "{root} rename from");
        }
    }

    #[tokio::test]
    async fn add_directory_stores_a_fresh_empty_directory_for_its_child_id() {
        let handler = handler_with_memory_store().await;
        let sub_meta = MetaData::new("sub", true);
        let sub_id = sub_meta.child_directory_id().unwrap();
        handler.add(&PathBuf::from("Owner/sub"), sub_meta).await.expect("add dir");

        let sub_dir = handler.get_directory(Zone::Owner, sub_id).await.expect("child dir stored");
        assert!(sub_dir.is_empty());

        handler
            .add(&PathBuf::from("Owner/sub/y.txt"), MetaData::new("y.txt", false))
            .await
            .expect("add nested file");
        let fetched = handler.get(&PathBuf::from("Owner/sub/y.txt")).await.expect("get nested");
        assert_eq!(fetched.name(), "y.txt");
    }

    #[tokio::test]
    async fn add_bumps_the_parent_directorys_own_last_modified() {
        let handler = handler_with_memory_store().await;
        let owner_before = handler.get(&PathBuf::from("Owner")).await.expect("get Owner entry");

        handler
            .add(&PathBuf::from("Owner/a.txt"), MetaData::new("a.txt", false))
            .await
            .expect("add");

        let owner_after = handler.get(&PathBuf::from("Owner")).await.expect("get Owner entry");
        assert!(owner_after.last_write_time() >= owner_before.last_write_time());
    }
}
