// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Narrow interface onto the self-encryptor, per spec §4.5/§6: the core
//! consumes chunking and convergent encryption through this trait only and
//! has no knowledge of the algorithm behind it.

use crate::data_map::{ChunkInfo as OurChunkInfo, DataMap as OurDataMap};
use crate::error::{Error, Result};
use crate::store::{ObjectKind, Store};
use bytes::Bytes;
use self_encryption::{decrypt_full_set, encrypt, DataMap as SeDataMap, EncryptedChunk};

/// What a flush produces: chunks that must be `put` into the store, plus
/// (for chunks the store already holds a copy of, by content address) the
/// set the caller only needs to acknowledge rather than re-upload.
pub struct FlushOutcome {
    /// Chunks this flush newly wrote and that must be `put`.
    pub puts: Vec<(xor_name::XorName, Bytes)>,
    /// The data map reflecting the file's current content.
    pub data_map: OurDataMap,
}

/// A self-encryptor bound to one file's bytes.
///
/// This core has no streaming self-encryptor of its own: pending bytes
/// accumulate in the caller's buffer (`buffer.rs`) and `flush` runs the
/// whole-buffer `self_encryption::encrypt`/`decrypt_full_set` pair over the
/// file's current content. This mirrors spec §4.4 ("flush ... forces the
/// self-encryptor to commit pending bytes to chunks") without assuming a
/// particular incremental chunking implementation.
pub struct SelfEncryptor {
    data_map: OurDataMap,
}

impl SelfEncryptor {
    /// Binds to an existing data map (e.g. on open of an existing file).
    pub fn new(data_map: OurDataMap) -> Self {
        Self { data_map }
    }

    /// The data map as of the last flush.
    pub fn data_map(&self) -> &OurDataMap {
        &self.data_map
    }

    /// Reads `len` bytes starting at `offset` out of the store, decrypting
    /// the full chunk set. EOF-clamped: returns fewer bytes than requested
    /// if the read range runs past the end of the file.
    pub async fn read<S: Store>(
        &self,
        store: &S,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>> {
        let plaintext = self.decrypt(store).await?;
        let start = (offset as usize).min(plaintext.len());
        let end = ((offset + len) as usize).min(plaintext.len());
        Ok(plaintext[start..end].to_vec())
    }

    /// Commits `content` (the file's entire current plaintext) as a fresh
    /// set of chunks, returning the chunks that must be stored and the new
    /// data map. Does not itself call `store.put` — the caller (`file.rs`)
    /// owns ordering flush against the owning Directory's own store.
    pub fn commit(&mut self, content: Bytes) -> Result<FlushOutcome> {
        if content.is_empty() {
            self.data_map = OurDataMap::empty();
            return Ok(FlushOutcome {
                puts: Vec::new(),
                data_map: self.data_map.clone(),
            });
        }

        let (se_map, chunks) = encrypt(content)
            .map_err(|e| Error::CryptoError(format!("self-encryption failed: {:?}", e)))?;

        let (our_map, puts) = translate_from_self_encryption(se_map, chunks);
        self.data_map = our_map.clone();
        Ok(FlushOutcome {
            puts,
            data_map: our_map,
        })
    }

    /// Removes every chunk this data map references from the store. Used
    /// when a file or the directory holding it is deleted.
    pub async fn delete_all_chunks<S: Store>(&self, store: &S) -> Result<()> {
        for chunk in self.data_map.chunks() {
            store.delete(ObjectKind::Chunk, chunk_identity(&chunk.post_hash)).await?;
        }
        Ok(())
    }

    async fn decrypt<S: Store>(&self, store: &S) -> Result<Bytes> {
        if self.data_map.has_inline_content() {
            return Ok(Bytes::copy_from_slice(self.data_map.inline_content()));
        }

        let mut chunks = Vec::with_capacity(self.data_map.chunks().len());
        for chunk in self.data_map.chunks() {
            let bytes = store
                .get(ObjectKind::Chunk, chunk_identity(&chunk.post_hash))
                .await?;
            chunks.push(EncryptedChunk {
                content: Bytes::from(bytes),
            });
        }

        let se_map = translate_to_self_encryption(&self.data_map);
        decrypt_full_set(&se_map, &chunks)
            .map_err(|e| Error::CryptoError(format!("self-decryption failed: {:?}", e)))
    }
}

/// `self_encryption::DataMap`'s chunk identities are `XorName`s; the store
/// keys chunks by our crate's `Identity`. A chunk name is 32 bytes and an
/// `Identity` is 64, so the chunk identity is the name zero-extended — the
/// two namespaces never collide with directory identities, which are always
/// drawn from `Identity::random()`.
pub(crate) fn chunk_identity(name: &xor_name::XorName) -> crate::identity::Identity {
    let mut bytes = [0u8; crate::identity::IDENTITY_LEN];
    bytes[..32].copy_from_slice(&name.0);
    crate::identity::Identity::from_bytes(bytes)
}

fn translate_from_self_encryption(
    se_map: SeDataMap,
    chunks: Vec<EncryptedChunk>,
) -> (OurDataMap, Vec<(xor_name::XorName, Bytes)>) {
    match se_map {
        SeDataMap::Chunks(infos) => {
            let our_chunks: Vec<OurChunkInfo> = infos
                .iter()
                .map(|c| OurChunkInfo {
                    pre_hash: c.src_hash,
                    post_hash: c.dst_hash,
                    size: c.src_size as u64,
                })
                .collect();
            let puts = infos
                .iter()
                .zip(chunks.into_iter())
                .map(|(info, chunk)| (info.dst_hash, chunk.content))
                .collect();
            (OurDataMap::with_chunks(our_chunks), puts)
        }
        SeDataMap::Content(content) => (OurDataMap::with_inline_content(content), Vec::new()),
        SeDataMap::None => (OurDataMap::empty(), Vec::new()),
    }
}

fn translate_to_self_encryption(our_map: &OurDataMap) -> SeDataMap {
    if our_map.has_inline_content() {
        if our_map.inline_content().is_empty() {
            SeDataMap::None
        } else {
            SeDataMap::Content(our_map.inline_content().to_vec())
        }
    } else {
        let infos = our_map
            .chunks()
            .iter()
            .enumerate()
            .map(|(index, c)| self_encryption::ChunkInfo {
                index,
                dst_hash: c.post_hash,
                src_hash: c.pre_hash,
                src_size: c.size as usize,
            })
            .collect();
        SeDataMap::Chunks(infos)
    }
}
