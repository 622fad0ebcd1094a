// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! End-to-end scenarios and quantified properties from spec §8, run
//! against a full `Drive` over an in-memory store.

use proptest::prelude::*;
use sn_drive::directory_handler::{DirectoryHandler, Keys};
use sn_drive::store::test_utils::MemoryStore;
use sn_drive::{Config, Directory, Drive, Error, Identity, MetaData};
use std::path::PathBuf;
use std::sync::Arc;

fn keys() -> Keys {
    let mut csprng = rand::rngs::OsRng {};
    Keys {
        owner_keypair: ed25519_dalek::Keypair::generate(&mut csprng),
        group_secret_key: bls::SecretKey::random(),
    }
}

fn config() -> Config {
    Config {
        unique_user_id: Identity::random(),
        ..Config::default()
    }
}

async fn drive() -> Drive<MemoryStore> {
    Drive::new(config(), Arc::new(MemoryStore::new()), keys())
        .await
        .expect("bootstrap")
}

async fn handler() -> DirectoryHandler<MemoryStore> {
    DirectoryHandler::new(config(), Arc::new(MemoryStore::new()), keys())
        .await
        .expect("bootstrap")
}

#[tokio::test]
async fn bootstrap_creates_the_root_and_its_three_zones() {
    let handler = handler().await;
    assert!(handler.get(&PathBuf::from("Owner")).await.is_ok());
    assert!(handler.get(&PathBuf::from("Group")).await.is_ok());
    assert!(handler.get(&PathBuf::from("World")).await.is_ok());
    assert!(handler.get(&PathBuf::from("World/Services")).await.is_ok());
}

/// P8: add(p, m) then get_metadata(p) returns m, modulo timestamps.
#[tokio::test]
async fn add_file_then_read_metadata_matches() {
    let drive = drive().await;
    let added = drive.add_file(&PathBuf::from("Owner/a.txt")).await.expect("add");
    let fetched = drive.get_metadata(&PathBuf::from("Owner/a.txt")).await.expect("get");
    assert_eq!(fetched.name(), added.name());
    assert_eq!(fetched.size(), 0);
    assert_eq!(fetched.creation_time(), added.creation_time());
}

/// P5: a write is visible to a same-handle read before any flush.
#[tokio::test]
async fn write_without_flush_is_visible_to_a_read() {
    let drive = drive().await;
    drive.add_file(&PathBuf::from("Owner/a.txt")).await.expect("add");
    let file = drive.open_file(&PathBuf::from("Owner/a.txt")).await.expect("open");
    file.write(0, b"hello world").await.expect("write");
    assert!(!file.is_flushed().await);
    let read = file.read(0, 11).await.expect("read");
    assert_eq!(read, b"hello world");
}

/// P7: flush, close, reopen reads back identical bytes.
#[tokio::test]
async fn flush_then_reopen_reads_back_identical_bytes() {
    let drive = drive().await;
    drive.add_file(&PathBuf::from("Owner/a.txt")).await.expect("add");
    let file = drive.open_file(&PathBuf::from("Owner/a.txt")).await.expect("open");
    file.write(0, b"durable bytes").await.expect("write");
    drive.release(&PathBuf::from("Owner/a.txt")).await.expect("release");

    let reopened = drive.open_file(&PathBuf::from("Owner/a.txt")).await.expect("reopen");
    let read = reopened.read(0, 13).await.expect("read");
    assert_eq!(read, b"durable bytes");
}

/// P6 (first half): rename(x, x) is a no-op and raises no error.
#[tokio::test]
async fn rename_onto_self_is_a_noop() {
    let drive = drive().await;
    drive.add_file(&PathBuf::from("Owner/a.txt")).await.expect("add");
    drive
        .rename_file(&PathBuf::from("Owner/a.txt"), &PathBuf::from("Owner/a.txt"))
        .await
        .expect("rename onto self");
    let meta = drive.get_metadata(&PathBuf::from("Owner/a.txt")).await.expect("get");
    assert_eq!(meta.name(), "a.txt");
}

/// P6 (second half): rename(x, y) then rename(y, x) restores the tree.
#[tokio::test]
async fn rename_there_and_back_restores_the_tree() {
    let drive = drive().await;
    drive.add_file(&PathBuf::from("Owner/a.txt")).await.expect("add");
    let file = drive.open_file(&PathBuf::from("Owner/a.txt")).await.expect("open");
    file.write(0, b"payload").await.expect("write");
    drive.release(&PathBuf::from("Owner/a.txt")).await.expect("release");

    drive
        .rename_file(&PathBuf::from("Owner/a.txt"), &PathBuf::from("Owner/b.txt"))
        .await
        .expect("rename there");
    drive
        .rename_file(&PathBuf::from("Owner/b.txt"), &PathBuf::from("Owner/a.txt"))
        .await
        .expect("rename back");

    assert!(drive.get_metadata(&PathBuf::from("Owner/b.txt")).await.is_err());
    let meta = drive.get_metadata(&PathBuf::from("Owner/a.txt")).await.expect("get");
    assert_eq!(meta.size(), 7);
}

/// Scenario 3: renaming onto an existing target replaces it, reclaiming
/// the victim's space.
#[tokio::test]
async fn rename_over_existing_target_replaces_it() {
    let drive = drive().await;
    drive.add_file(&PathBuf::from("Owner/a.txt")).await.expect("add a");
    drive.add_file(&PathBuf::from("Owner/b.txt")).await.expect("add b");

    let a = drive.open_file(&PathBuf::from("Owner/a.txt")).await.expect("open a");
    a.write(0, &vec![1u8; 100]).await.expect("write a");
    drive.release(&PathBuf::from("Owner/a.txt")).await.expect("release a");

    let b = drive.open_file(&PathBuf::from("Owner/b.txt")).await.expect("open b");
    b.write(0, &vec![2u8; 40]).await.expect("write b");
    drive.release(&PathBuf::from("Owner/b.txt")).await.expect("release b");

    drive
        .rename_file(&PathBuf::from("Owner/a.txt"), &PathBuf::from("Owner/b.txt"))
        .await
        .expect("rename over target");

    assert!(drive.get_metadata(&PathBuf::from("Owner/a.txt")).await.is_err());
    let meta = drive.get_metadata(&PathBuf::from("Owner/b.txt")).await.expect("get");
    assert_eq!(meta.size(), 100);
}

/// Scenario 4: cross-zone rename re-stores the whole moved subtree under
/// the destination's encoding.
#[tokio::test]
async fn cross_zone_rename_moves_a_directory_and_its_children() {
    let drive = drive().await;
    drive.add_directory(&PathBuf::from("Owner/dir")).await.expect("add dir");
    drive.add_directory(&PathBuf::from("Owner/dir/y")).await.expect("add dir/y");
    drive.add_file(&PathBuf::from("Owner/dir/x")).await.expect("add dir/x");
    drive.add_file(&PathBuf::from("Owner/dir/y/z")).await.expect("add dir/y/z");

    drive
        .rename_file(&PathBuf::from("Owner/dir"), &PathBuf::from("World/dir"))
        .await
        .expect("cross-zone rename");

    assert!(drive.get_metadata(&PathBuf::from("Owner/dir")).await.is_err());
    assert!(drive.get_metadata(&PathBuf::from("World/dir")).await.is_ok());
    assert!(drive.get_metadata(&PathBuf::from("World/dir/x")).await.is_ok());
    assert!(drive.get_metadata(&PathBuf::from("World/dir/y")).await.is_ok());
    assert!(drive.get_metadata(&PathBuf::from("World/dir/y/z")).await.is_ok());
}

/// P9 / scenario 5: the Group zone never accepts add or delete.
#[tokio::test]
async fn group_zone_refuses_add_and_delete() {
    let drive = drive().await;
    let err = drive.add_file(&PathBuf::from("Group/x.txt")).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    let err = drive.remove_file(&PathBuf::from("Group/Services")).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

/// World-zone writes are refused unless the config opts in.
#[tokio::test]
async fn world_zone_respects_world_writable_flag() {
    let config = Config {
        unique_user_id: Identity::random(),
        world_writable: false,
        ..Config::default()
    };
    let drive = Drive::new(config, Arc::new(MemoryStore::new()), keys())
        .await
        .expect("bootstrap");
    let err = drive.add_file(&PathBuf::from("World/x.txt")).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,12}"
}

proptest! {
    /// P1: a Directory never holds two children whose names differ only
    /// by case.
    #[test]
    fn directory_children_are_case_insensitive_unique(names in prop::collection::vec(arb_name(), 1..12)) {
        let mut dir = Directory::empty(Identity::random());
        let mut accepted: Vec<String> = Vec::new();
        for name in names {
            let collides = accepted
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(&name));
            let result = dir.add_child(MetaData::new(name.clone(), false));
            if collides {
                prop_assert!(result.is_err());
            } else {
                prop_assert!(result.is_ok());
                accepted.push(name);
            }
        }
        let lowered: Vec<String> = dir.children().map(|c| c.name().to_lowercase()).collect();
        let mut deduped = lowered.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(lowered.len(), deduped.len());
    }

    /// P3: every MetaData carries exactly one of a data map or a child
    /// directory id.
    #[test]
    fn meta_data_carries_exactly_one_payload_kind(name in arb_name(), is_directory in any::<bool>()) {
        let meta = MetaData::new(name, is_directory);
        prop_assert_ne!(meta.data_map().is_some(), meta.child_directory_id().is_some());
    }

    /// P4: parse(serialise(D)) == D.
    #[test]
    fn directory_round_trips_through_serialise_and_parse(names in prop::collection::vec(arb_name(), 0..16)) {
        let mut dir = Directory::empty(Identity::random());
        for name in names {
            let _ = dir.add_child(MetaData::new(name, false));
        }
        let bytes = dir.serialise().expect("serialise");
        let parsed = Directory::from_serialised(&bytes).expect("parse");
        prop_assert_eq!(dir.id(), parsed.id());
        prop_assert_eq!(dir.parent_id(), parsed.parent_id());
        let original: Vec<&str> = dir.children().map(|c| c.name()).collect();
        let round_tripped: Vec<&str> = parsed.children().map(|c| c.name()).collect();
        prop_assert_eq!(original, round_tripped);
    }
}
