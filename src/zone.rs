// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! The three access zones a path resolves into, and the pure policy
//! functions gating mutation within each (spec §5).

use crate::config::{GROUP, OWNER, SERVICES, WORLD};
use crate::store::ObjectKind;
use std::path::Path;

/// The access zone a path falls under, determined by its first component.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Zone {
    /// Self-encrypted and signed with the owner's key. Always mutable by
    /// the owner.
    Owner,
    /// Self-encrypted and signed with the group's shared key. Mutable by
    /// any group member.
    Group,
    /// Stored verbatim (no self-encryption, no signature). Mutable only
    /// when `Config::world_writable` is set, and never under `/World/Services`.
    World,
}

impl Zone {
    /// The [`ObjectKind`] a directory in this zone is stored under.
    pub fn directory_kind(self) -> ObjectKind {
        match self {
            Zone::Owner => ObjectKind::OwnerDirectory,
            Zone::Group => ObjectKind::GroupDirectory,
            Zone::World => ObjectKind::WorldDirectory,
        }
    }

    /// Whether directories and files in this zone are self-encrypted
    /// (Owner, Group) or stored verbatim (World).
    pub fn is_encrypted(self) -> bool {
        !matches!(self, Zone::World)
    }
}

/// Determines which zone a path falls under, by its first component.
/// Returns `None` for a path that is the root itself or whose first
/// component is not one of the three reserved zone names.
pub fn zone_of(path: &Path) -> Option<Zone> {
    let first = path.components().next()?;
    match first.as_os_str().to_str()? {
        s if s == OWNER => Some(Zone::Owner),
        s if s == GROUP => Some(Zone::Group),
        s if s == WORLD => Some(Zone::World),
        _ => None,
    }
}

/// True if `path`, immediately under a World-zone root, names the
/// immovable `/World/Services` directory.
pub fn is_world_services(path: &Path) -> bool {
    let mut components = path.components();
    let first = components.next().and_then(|c| c.as_os_str().to_str());
    let second = components.next().and_then(|c| c.as_os_str().to_str());
    first == Some(WORLD) && second == Some(SERVICES)
}

/// True if `path` names one of the four reserved zone roots (the
/// filesystem root, `/Owner`, `/Group`, `/World`) or `/World/Services`,
/// none of which can be created, deleted, or renamed (spec §5, invariant
/// I6).
pub fn is_reserved_root(path: &Path) -> bool {
    let components: Vec<&str> = path.components().filter_map(|c| c.as_os_str().to_str()).collect();
    match components.as_slice() {
        [] => true,
        [OWNER] | [GROUP] | [WORLD] => true,
        [WORLD, SERVICES] => true,
        _ => false,
    }
}

/// Whether an entry may be added under `path`, given the zone's world
/// writability. The four zone roots and `/World/Services` can never be
/// added, deleted, or renamed (spec §5, invariant I6). The Group zone is
/// otherwise never mutable through this core: a group record's signature
/// is produced by a threshold-signing process outside this crate's scope,
/// so Group-zone adds and deletes are always refused here (spec §5) even
/// though the zone is readable.
pub fn can_add(path: &Path, world_writable: bool) -> bool {
    if is_reserved_root(path) {
        return false;
    }
    match zone_of(path) {
        Some(Zone::Owner) => true,
        Some(Zone::Group) => false,
        Some(Zone::World) => world_writable && !is_world_services(path),
        None => false,
    }
}

/// Whether an entry may be deleted from `path`'s parent directory.
pub fn can_delete(path: &Path, world_writable: bool) -> bool {
    can_add(path, world_writable)
}

/// Whether `path` may be renamed (as the source of a rename). Identical to
/// [`can_delete`]: removing the old name is part of every rename.
pub fn can_rename_from(path: &Path, world_writable: bool) -> bool {
    can_delete(path, world_writable)
}

/// Whether `path` may be the destination of a rename.
pub fn can_rename_to(path: &Path, world_writable: bool) -> bool {
    can_add(path, world_writable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn owner_zone_is_always_writable() {
        assert!(can_add(&PathBuf::from("Owner/a.txt"), false));
    }

    #[test]
    fn group_zone_is_never_writable() {
        assert!(!can_add(&PathBuf::from("Group/a.txt"), true));
        assert!(!can_delete(&PathBuf::from("Group/a.txt"), true));
        assert!(!can_rename_to(&PathBuf::from("Group/a.txt"), true));
        assert!(!can_rename_from(&PathBuf::from("Group/a.txt"), true));
    }

    #[test]
    fn world_zone_respects_world_writable() {
        assert!(can_add(&PathBuf::from("World/a.txt"), true));
        assert!(!can_add(&PathBuf::from("World/a.txt"), false));
    }

    #[test]
    fn world_services_is_never_mutable() {
        assert!(!can_add(&PathBuf::from("World/Services/a.txt"), true));
        assert!(!can_delete(&PathBuf::from("World/Services/a.txt"), true));
    }

    #[test]
    fn unknown_first_component_resolves_to_no_zone() {
        assert!(zone_of(&PathBuf::from("Nonsense/a.txt")).is_none());
        assert!(!can_add(&PathBuf::from("Nonsense/a.txt"), true));
    }

    #[test]
    fn zone_roots_are_never_mutable() {
        for path in [
            PathBuf::from(""),
            PathBuf::from(OWNER),
            PathBuf::from(GROUP),
            PathBuf::from(WORLD),
            PathBuf::from("World/Services"),
        ] {
            assert!(is_reserved_root(&path), "{:?} should be a reserved root", path);
            assert!(!can_add(&path, true));
            assert!(!can_delete(&path, true));
            assert!(!can_rename_from(&path, true));
            assert!(!can_rename_to(&path, true));
        }
    }

    #[test]
    fn non_root_paths_are_not_reserved() {
        assert!(!is_reserved_root(&PathBuf::from("Owner/a.txt")));
        assert!(!is_reserved_root(&PathBuf::from("World/Services/a.txt")));
    }
}
