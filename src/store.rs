// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! The object-store boundary (spec §4.5/§6): the core never reasons about
//! how objects are transported or persisted, only that they can be
//! `put`/`get`/`delete` by `(ObjectKind, Identity)`.

use crate::error::Result;
use crate::identity::Identity;
use async_trait::async_trait;

/// Which namespace an object's identity is drawn from. A directory stored
/// under the wrong kind (e.g. a Group directory fetched as `OwnerDirectory`)
/// is a programmer error, not a storage error, so kind and identity travel
/// together on every call.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum ObjectKind {
    OwnerDirectory,
    GroupDirectory,
    WorldDirectory,
    Chunk,
}

/// Backing object store, keyed by `(ObjectKind, Identity)`. Implementations
/// may surface transient failures as `Error::StoreError { transient: true,
/// .. }`; the directory handler retries those up to
/// `config::MAX_ATTEMPTS` times.
#[async_trait]
pub trait Store: Send + Sync {
    /// Writes `bytes` under `(kind, id)`, overwriting any existing value.
    async fn put(&self, kind: ObjectKind, id: Identity, bytes: Vec<u8>) -> Result<()>;

    /// Reads the bytes stored under `(kind, id)`.
    async fn get(&self, kind: ObjectKind, id: Identity) -> Result<Vec<u8>>;

    /// Deletes `(kind, id)`. Deleting a key that does not exist is not an
    /// error (mirrors the source's best-effort `DeleteStored`).
    async fn delete(&self, kind: ObjectKind, id: Identity) -> Result<()>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! An in-memory [`Store`] for tests and downstream crates exercising
    //! this one, gated the way `sn_interface::types` gates its own test
    //! doubles behind `#[cfg(any(test, feature = "test-utils"))]`.

    use super::*;
    use crate::error::Error;
    use dashmap::DashMap;

    /// A `Store` backed by a concurrent in-memory map. Never evicts; only
    /// suitable for tests and short-lived tools.
    #[derive(Default)]
    pub struct MemoryStore {
        objects: DashMap<(ObjectKind, Identity), Vec<u8>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of objects currently held, for test assertions.
        pub fn len(&self) -> usize {
            self.objects.len()
        }
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn put(&self, kind: ObjectKind, id: Identity, bytes: Vec<u8>) -> Result<()> {
            self.objects.insert((kind, id), bytes);
            Ok(())
        }

        async fn get(&self, kind: ObjectKind, id: Identity) -> Result<Vec<u8>> {
            self.objects
                .get(&(kind, id))
                .map(|entry| entry.value().clone())
                .ok_or_else(|| Error::NotFound(format!("{:?}/{}", kind, id)))
        }

        async fn delete(&self, kind: ObjectKind, id: Identity) -> Result<()> {
            self.objects.remove(&(kind, id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = MemoryStore::new();
        let id = Identity::random();
        store
            .put(ObjectKind::Chunk, id, b"hello".to_vec())
            .await
            .expect("put");
        let bytes = store.get(ObjectKind::Chunk, id).await.expect("get");
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .get(ObjectKind::Chunk, Identity::random())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_missing_is_not_an_error() {
        let store = MemoryStore::new();
        store
            .delete(ObjectKind::Chunk, Identity::random())
            .await
            .expect("delete of missing key is a no-op");
    }
}
