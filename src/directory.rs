// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! A single directory's child listing: an ordered, case-insensitive-unique
//! keyed collection of [`MetaData`], plus the bookkeeping (dirty bit,
//! iteration cursor) a directory handler needs to decide when to re-store
//! it and how to serve paginated enumeration.

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::meta_data::{case_key, MetaData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Serialize, Deserialize)]
struct DirectoryContents {
    id: Identity,
    parent_id: Identity,
    children: BTreeMap<String, MetaData>,
}

/// One directory's children, keyed case-insensitively, with a one-shot
/// enumeration cursor and a dirty bit tracking unsaved mutations.
#[derive(Clone)]
pub struct Directory {
    id: Identity,
    parent_id: Identity,
    children: BTreeMap<String, MetaData>,
    contents_changed: bool,
    cursor: usize,
}

impl Directory {
    /// An empty directory with a fresh random id.
    pub fn empty(parent_id: Identity) -> Self {
        Self {
            id: Identity::random(),
            parent_id,
            children: BTreeMap::new(),
            contents_changed: false,
            cursor: 0,
        }
    }

    /// An empty directory with a caller-supplied id (used at bootstrap,
    /// where the four zone roots need well-known ids derived from the
    /// user's `unique_user_id`).
    pub fn empty_with_id(id: Identity, parent_id: Identity) -> Self {
        Self {
            id,
            parent_id,
            children: BTreeMap::new(),
            contents_changed: false,
            cursor: 0,
        }
    }

    /// This directory's own identity, under which it is stored.
    pub fn id(&self) -> Identity {
        self.id
    }

    /// The identity of the directory containing this one.
    pub fn parent_id(&self) -> Identity {
        self.parent_id
    }

    /// Re-parents this directory (used on cross-directory rename).
    pub fn set_parent_id(&mut self, parent_id: Identity) {
        self.parent_id = parent_id;
        self.contents_changed = true;
    }

    /// True if a mutation has occurred since the last [`Directory::serialise`]
    /// (or construction via [`Directory::from_serialised`]).
    pub fn contents_changed(&self) -> bool {
        self.contents_changed
    }

    /// Clears the dirty bit once the caller has durably stored this
    /// directory's serialised form.
    pub fn mark_stored(&mut self) {
        self.contents_changed = false;
    }

    /// True if this directory has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of children, including hidden ones.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if a child with this name exists (case-insensitive).
    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(&case_key(name))
    }

    /// Looks up a child by name (case-insensitive).
    pub fn get_child(&self, name: &str) -> Option<&MetaData> {
        self.children.get(&case_key(name))
    }

    /// Mutable lookup of a child by name (case-insensitive).
    pub fn get_child_mut(&mut self, name: &str) -> Option<&mut MetaData> {
        self.children.get_mut(&case_key(name))
    }

    /// Adds a new child, failing with [`Error::AlreadyExists`] if the name
    /// (case-insensitively) collides with an existing one.
    pub fn add_child(&mut self, meta: MetaData) -> Result<()> {
        let key = case_key(meta.name());
        if self.children.contains_key(&key) {
            return Err(Error::AlreadyExists(meta.name().to_string()));
        }
        self.children.insert(key, meta);
        self.contents_changed = true;
        self.reset_cursor();
        Ok(())
    }

    /// Removes a child by name, returning its metadata.
    pub fn remove_child(&mut self, name: &str) -> Result<MetaData> {
        let removed = self
            .children
            .remove(&case_key(name))
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.contents_changed = true;
        self.reset_cursor();
        Ok(removed)
    }

    /// Renames a child in place, failing with [`Error::AlreadyExists`] if
    /// `new_name` collides with a different existing child, and with
    /// [`Error::NotFound`] if `old_name` has no entry.
    pub fn rename_child(&mut self, old_name: &str, new_name: &str) -> Result<MetaData> {
        let old_key = case_key(old_name);
        let new_key = case_key(new_name);
        if old_key != new_key && self.children.contains_key(&new_key) {
            return Err(Error::AlreadyExists(new_name.to_string()));
        }
        let mut meta = self
            .children
            .remove(&old_key)
            .ok_or_else(|| Error::NotFound(old_name.to_string()))?;
        meta.set_name(new_name);
        meta.update_last_modified();
        self.children.insert(new_key, meta.clone());
        self.contents_changed = true;
        self.reset_cursor();
        Ok(meta)
    }

    /// Re-inserts an already-built `MetaData` under its own name, replacing
    /// any existing entry. Used when a child's own attributes changed (e.g.
    /// a file's data map after flush) without a structural add/remove.
    pub fn replace_child(&mut self, meta: MetaData) {
        let key = case_key(meta.name());
        self.children.insert(key, meta);
        self.contents_changed = true;
    }

    /// Every child name hidden by the `.ms_hidden` marker.
    pub fn hidden_child_names(&self) -> Vec<String> {
        self.children
            .values()
            .filter(|m| m.is_hidden())
            .map(|m| m.name().to_string())
            .collect()
    }

    /// All children in case-insensitive sort order, hidden ones included.
    pub fn children(&self) -> impl Iterator<Item = &MetaData> {
        self.children.values()
    }

    /// Resets the one-shot enumeration cursor to the beginning.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Returns the next non-hidden child in sort order and advances the
    /// cursor, or `None` once exhausted (at which point the cursor is reset
    /// so a subsequent call starts a fresh pass).
    pub fn get_child_and_advance_cursor(&mut self) -> Option<&MetaData> {
        let visible: Vec<&str> = self
            .children
            .iter()
            .filter(|(_, m)| !m.is_hidden())
            .map(|(k, _)| k.as_str())
            .collect();
        if self.cursor >= visible.len() {
            self.cursor = 0;
            return None;
        }
        let key = visible[self.cursor].to_string();
        self.cursor += 1;
        self.children.get(&key)
    }

    /// Serialises to the canonical wire form, suitable for storing under
    /// this directory's own encoding (Owner/Group/World, per `zone.rs`).
    pub fn serialise(&self) -> Result<Vec<u8>> {
        let contents = DirectoryContents {
            id: self.id,
            parent_id: self.parent_id,
            children: self.children.clone(),
        };
        bincode::serialize(&contents).map_err(|e| Error::SerialisationError(e.to_string()))
    }

    /// Parses the canonical wire form. The resulting directory starts clean
    /// (`contents_changed() == false`) since it reflects exactly what was
    /// stored.
    pub fn from_serialised(bytes: &[u8]) -> Result<Self> {
        let contents: DirectoryContents =
            bincode::deserialize(bytes).map_err(|e| Error::ParsingError(e.to_string()))?;
        Ok(Self {
            id: contents.id,
            parent_id: contents.parent_id,
            children: contents.children,
            contents_changed: false,
            cursor: 0,
        })
    }
}
