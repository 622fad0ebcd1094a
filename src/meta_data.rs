// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::config::{DIRECTORY_SIZE, HIDDEN_MARKER};
use crate::data_map::DataMap;
use crate::error::{Error, Result};
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The kind of filesystem entry a [`MetaData`] describes.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum FileType {
    /// A regular, chunked-and-encrypted file.
    RegularFile,
    /// A child directory, identified by `child_directory_id`.
    Directory,
    /// A symlink, carrying its target in `symlink_target`.
    Symlink,
}

/// Platform-specific attribute bits, preserved verbatim across round-trip
/// but otherwise opaque to the core (spec §9, unifying the source's
/// `#ifndef MAIDSAFE_WIN32` split between `struct stat` and Win32
/// `FILETIME`/`DWORD` fields).
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct PlatformAttributes {
    /// Raw mode/permission bits, interpreted by the host adapter.
    pub mode: u32,
    /// Opaque platform-specific blob (e.g. extended Win32 attribute DWORD).
    pub extra: Vec<u8>,
}

/// Per-entry attributes: name, times, size, mode, and exactly one of a
/// child directory id or a data map (spec I3).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MetaData {
    name: String,
    file_type: FileType,
    creation_time: DateTime<Utc>,
    last_access_time: DateTime<Utc>,
    last_write_time: DateTime<Utc>,
    last_status_change_time: DateTime<Utc>,
    size: u64,
    allocation_size: u64,
    attributes: PlatformAttributes,
    data_map: Option<DataMap>,
    child_directory_id: Option<Identity>,
    symlink_target: Option<String>,
    notes: Vec<String>,
}

impl MetaData {
    /// Creates a fresh entry. Directories get a random `child_directory_id`
    /// and no data map; files get an empty data map and no directory id.
    pub fn new(name: impl Into<String>, is_directory: bool) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            file_type: if is_directory {
                FileType::Directory
            } else {
                FileType::RegularFile
            },
            creation_time: now,
            last_access_time: now,
            last_write_time: now,
            last_status_change_time: now,
            size: if is_directory { DIRECTORY_SIZE } else { 0 },
            allocation_size: if is_directory { DIRECTORY_SIZE } else { 0 },
            attributes: PlatformAttributes::default(),
            data_map: if is_directory { None } else { Some(DataMap::empty()) },
            child_directory_id: if is_directory {
                Some(Identity::random())
            } else {
                None
            },
            symlink_target: None,
            notes: Vec::new(),
        }
    }

    /// Creates a directory entry pointing at a caller-chosen child
    /// directory id, rather than a freshly randomised one. Used when
    /// bootstrapping the well-known zone roots.
    pub fn new_directory_with_id(name: impl Into<String>, id: Identity) -> Self {
        let mut meta = Self::new(name, true);
        meta.child_directory_id = Some(id);
        meta
    }

    /// Creates a symlink entry carrying `target` instead of a data map or
    /// child directory id.
    pub fn new_symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            file_type: FileType::Symlink,
            creation_time: now,
            last_access_time: now,
            last_write_time: now,
            last_status_change_time: now,
            size: 0,
            allocation_size: 0,
            attributes: PlatformAttributes::default(),
            data_map: None,
            child_directory_id: None,
            symlink_target: Some(target.into()),
            notes: Vec::new(),
        }
    }

    /// Serialises to the canonical wire form.
    pub fn serialise(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::SerialisationError(e.to_string()))
    }

    /// Parses the canonical wire form, rejecting records that violate I3
    /// (both `data_map` and `child_directory_id` present) or carry an empty
    /// name that is not the root sentinel.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let meta: MetaData =
            bincode::deserialize(bytes).map_err(|e| Error::ParsingError(e.to_string()))?;
        meta.validate()?;
        Ok(meta)
    }

    fn validate(&self) -> Result<()> {
        if self.data_map.is_some() && self.child_directory_id.is_some() {
            return Err(Error::ParsingError(
                "entry has both a data map and a child directory id".to_string(),
            ));
        }
        if self.name.is_empty() && self.name != crate::config::ROOT_SENTINEL {
            return Err(Error::ParsingError("entry has an empty name".to_string()));
        }
        Ok(())
    }

    /// Path component, compared case-insensitively within a directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames this entry in place (caller is responsible for re-keying it
    /// in its owning `Directory`'s child map).
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The entry kind.
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// True for `FileType::Directory`.
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// True for entries whose extension matches the hidden-marker.
    pub fn is_hidden(&self) -> bool {
        self.name
            .rsplit('.')
            .next()
            .map(|ext| ext.eq_ignore_ascii_case(HIDDEN_MARKER))
            .unwrap_or(false)
            && self.name.contains('.')
    }

    /// The child directory id, for `FileType::Directory` entries.
    pub fn child_directory_id(&self) -> Option<Identity> {
        self.child_directory_id
    }

    /// The data map, for `FileType::RegularFile` entries.
    pub fn data_map(&self) -> Option<&DataMap> {
        self.data_map.as_ref()
    }

    /// Replaces the data map (e.g. after a flush produced a new one).
    pub fn set_data_map(&mut self, data_map: DataMap) {
        self.size = data_map.len();
        if self.allocation_size < self.size {
            self.allocation_size = self.size;
        }
        self.data_map = Some(data_map);
    }

    /// The symlink target, for `FileType::Symlink` entries.
    pub fn symlink_target(&self) -> Option<&str> {
        self.symlink_target.as_deref()
    }

    /// Apparent size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Sets the apparent size directly (used by `truncate`).
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
        if self.allocation_size < size {
            self.allocation_size = size;
        }
    }

    /// Bytes actually allocated for this entry: directories report a fixed
    /// nominal size; files report at least their apparent size.
    pub fn allocated_size(&self) -> u64 {
        if self.is_directory() {
            DIRECTORY_SIZE
        } else {
            self.allocation_size.max(self.size)
        }
    }

    /// Mutable access to the platform attribute blob.
    pub fn attributes_mut(&mut self) -> &mut PlatformAttributes {
        &mut self.attributes
    }

    /// Read access to the platform attribute blob.
    pub fn attributes(&self) -> &PlatformAttributes {
        &self.attributes
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn last_access_time(&self) -> DateTime<Utc> {
        self.last_access_time
    }

    pub fn last_write_time(&self) -> DateTime<Utc> {
        self.last_write_time
    }

    pub fn last_status_change_time(&self) -> DateTime<Utc> {
        self.last_status_change_time
    }

    /// Bumps `last_access_time`, e.g. after a read.
    pub fn update_last_accessed(&mut self) {
        self.last_access_time = Utc::now();
    }

    /// Bumps `last_write_time` and `last_status_change_time`, e.g. after a
    /// write, truncate, or rename.
    pub fn update_last_modified(&mut self) {
        let now = Utc::now();
        self.last_write_time = now;
        self.last_status_change_time = now;
    }

    /// The notes list associated with this entry.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Appends a note.
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Case-insensitive comparison key, the collation used throughout a
/// directory's child container.
pub fn case_key(name: &str) -> String {
    name.to_lowercase()
}

impl Eq for MetaData {}

impl PartialOrd for MetaData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetaData {
    fn cmp(&self, other: &Self) -> Ordering {
        case_key(&self.name).cmp(&case_key(&other.name))
    }
}
