// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! The 64-byte opaque key used to name directories, and the parent-binding
//! wrapper used when salting a directory's encrypted `DataMap`.

use rand::Rng;
use serde::de::{Error as DeError, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Length in bytes of an [`Identity`].
pub const IDENTITY_LEN: usize = 64;

/// A 64-byte opaque key, used as the stable primary key for directories and
/// as the salt input for directory DataMap encryption.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serialiser: S) -> Result<S::Ok, S::Error> {
        serialiser.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserialiser: D) -> Result<Self, D::Error> {
        struct IdentityVisitor;

        impl<'de> Visitor<'de> for IdentityVisitor {
            type Value = Identity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} bytes", IDENTITY_LEN)
            }

            fn visit_bytes<E: DeError>(self, value: &[u8]) -> Result<Identity, E> {
                if value.len() != IDENTITY_LEN {
                    return Err(E::invalid_length(value.len(), &self));
                }
                let mut bytes = [0u8; IDENTITY_LEN];
                bytes.copy_from_slice(value);
                Ok(Identity(bytes))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Identity, A::Error> {
                let mut bytes = [0u8; IDENTITY_LEN];
                for (i, slot) in bytes.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| DeError::invalid_length(i, &self))?;
                }
                Ok(Identity(bytes))
            }
        }

        deserialiser.deserialize_bytes(IdentityVisitor)
    }
}

impl Identity {
    /// Wraps a raw 64-byte array.
    pub fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a cryptographically random identity.
    pub fn random() -> Self {
        let mut bytes = [0u8; IDENTITY_LEN];
        rand::thread_rng().fill(&mut bytes[..]);
        Self(bytes)
    }

    /// The all-zero identity, used for test fixtures and the root-parent
    /// sentinel before bootstrap assigns a random one.
    pub fn zero() -> Self {
        Self([0u8; IDENTITY_LEN])
    }

    /// True if this identity is the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; IDENTITY_LEN]
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({}…)", hex::encode(&self.0[..6]))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Denotes a directory's parent, carried alongside `directory_id` to bind
/// the encrypted zone encodings (Owner/Group) to their position in the tree.
pub type ParentId = Identity;
