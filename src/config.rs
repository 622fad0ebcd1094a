// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::identity::Identity;
use std::path::PathBuf;
use std::time::Duration;

/// Reserved name, first path component under root, denoting the Owner zone.
pub const OWNER: &str = "Owner";
/// Reserved name, first path component under root, denoting the Group zone.
pub const GROUP: &str = "Group";
/// Reserved name, first path component under root, denoting the World zone.
pub const WORLD: &str = "World";
/// Reserved name of the immovable services directory under `/World`.
pub const SERVICES: &str = "Services";
/// File extension marking an entry hidden from normal enumeration.
pub const HIDDEN_MARKER: &str = "ms_hidden";
/// Name stamped on a zone-root's own `MetaData`, whose `name` would
/// otherwise be empty (a root has no entry in any parent's children).
pub const ROOT_SENTINEL: &str = "/";

/// Maximum number of times a transient store error is retried for an
/// idempotent operation (`get`, `delete`).
pub const MAX_ATTEMPTS: usize = 3;

/// Nominal allocated size reported for directory entries, mirroring the
/// source's `kDirectorySize` constant used in `GetAllocatedSize`.
pub const DIRECTORY_SIZE: u64 = 4096;

/// Configuration consumed by the core at construction time.
#[derive(Clone, Debug)]
pub struct Config {
    /// Required, non-empty. Identifies the owner of this filesystem.
    /// `DirectoryHandler::new`/`Drive::new` reject the all-zero default
    /// (`Error::Uninitialised`) — a caller must supply a real identity.
    pub unique_user_id: Identity,
    /// If `None` on first start, a random one is generated and the four
    /// zone roots are bootstrapped.
    pub root_parent_id: Option<Identity>,
    /// Default `true`. Gates adds/deletes/renames touching the World zone.
    pub world_writable: bool,
    /// Bound on retained per-directory version history.
    pub max_versions: u32,
    /// Lower bound used when arming a file's flush timer.
    pub min_flush_interval: Duration,
    /// Upper bound used when arming a file's flush timer.
    pub max_flush_interval: Duration,
    /// Memory cap, in bytes, for a file's pre-chunk write buffer.
    pub file_buffer_memory_cap: usize,
    /// Disk cap, in bytes, for a file's pre-chunk write buffer spill area.
    pub file_buffer_disk_cap: usize,
    /// Directory under which spilled buffer bytes are written.
    pub buffer_spill_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unique_user_id: Identity::zero(),
            root_parent_id: None,
            world_writable: true,
            max_versions: 5,
            min_flush_interval: Duration::from_secs(2),
            max_flush_interval: Duration::from_secs(10),
            file_buffer_memory_cap: 1024 * 1024,
            file_buffer_disk_cap: 64 * 1024 * 1024,
            buffer_spill_path: std::env::temp_dir(),
        }
    }
}
