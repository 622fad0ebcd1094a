// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! The self-encryptor's manifest for a file: an ordered list of chunk
//! descriptors, or inline content for files smaller than the minimum chunk
//! size.

use serde::{Deserialize, Serialize};
use xor_name::XorName;

/// Describes a single chunk produced by the self-encryptor.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct ChunkInfo {
    /// Hash of the plaintext chunk before encryption.
    pub pre_hash: XorName,
    /// Hash of the encrypted chunk, also its content address in the store.
    pub post_hash: XorName,
    /// Size in bytes of the plaintext chunk.
    pub size: u64,
}

/// A file's data manifest: either a list of chunk descriptors, or, for
/// files under the self-encryptor's minimum chunk size, the plaintext
/// bytes carried inline.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize, Debug, Default)]
pub struct DataMap {
    chunks: Vec<ChunkInfo>,
    content: Vec<u8>,
}

impl DataMap {
    /// An empty data map, as assigned to a freshly-created zero-length file.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A data map carrying its content inline rather than as chunks.
    pub fn with_inline_content(content: Vec<u8>) -> Self {
        Self {
            chunks: Vec::new(),
            content,
        }
    }

    /// A data map carrying an ordered list of chunk descriptors.
    pub fn with_chunks(chunks: Vec<ChunkInfo>) -> Self {
        Self {
            chunks,
            content: Vec::new(),
        }
    }

    /// The chunk descriptors, if any.
    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }

    /// The inline content, if any.
    pub fn inline_content(&self) -> &[u8] {
        &self.content
    }

    /// True if this file's bytes are carried inline rather than chunked.
    pub fn has_inline_content(&self) -> bool {
        !self.content.is_empty() || self.chunks.is_empty()
    }

    /// Total plaintext size represented by this map. Computed from each
    /// chunk's own recorded size rather than assuming equal-sized interior
    /// chunks (see DESIGN.md for why this differs from the source).
    pub fn len(&self) -> u64 {
        if self.chunks.is_empty() {
            self.content.len() as u64
        } else {
            self.chunks.iter().map(|c| c.size).sum()
        }
    }

    /// True if this map represents a zero-length file.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_has_zero_len() {
        assert_eq!(DataMap::empty().len(), 0);
        assert!(DataMap::empty().is_empty());
    }

    #[test]
    fn inline_len_matches_content() {
        let map = DataMap::with_inline_content(vec![1, 2, 3, 4]);
        assert_eq!(map.len(), 4);
        assert!(map.has_inline_content());
    }

    #[test]
    fn chunked_len_sums_chunk_sizes() {
        let chunks = vec![
            ChunkInfo {
                pre_hash: XorName::default(),
                post_hash: XorName::default(),
                size: 1024,
            },
            ChunkInfo {
                pre_hash: XorName::default(),
                post_hash: XorName::default(),
                size: 37,
            },
        ];
        let map = DataMap::with_chunks(chunks);
        assert_eq!(map.len(), 1061);
        assert!(!map.has_inline_content());
    }
}
