// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! A file's pending, unflushed bytes (spec §4.4): held in memory while
//! small, promoted once to a spilled temp file if a write would grow it
//! past `Config::file_buffer_memory_cap`, and failing with
//! [`Error::NoSpace`] once `Config::file_buffer_disk_cap` is also
//! exhausted.

use crate::config::Config;
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

enum Tier {
    Memory(Vec<u8>),
    Disk { file: NamedTempFile, len: u64 },
}

/// A single open file's write-side buffer.
pub struct WriteBuffer {
    tier: Tier,
    memory_cap: usize,
    disk_cap: usize,
    spill_dir: PathBuf,
}

impl WriteBuffer {
    /// A fresh, empty buffer using the caps and spill directory from
    /// `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            tier: Tier::Memory(Vec::new()),
            memory_cap: config.file_buffer_memory_cap,
            disk_cap: config.file_buffer_disk_cap,
            spill_dir: config.buffer_spill_path.clone(),
        }
    }

    /// Seeds the buffer with existing content, e.g. on open of a file whose
    /// current content was just decrypted from the store.
    pub fn with_content(config: &Config, content: Vec<u8>) -> Self {
        let mut buffer = Self::new(config);
        if content.len() > buffer.memory_cap {
            buffer.tier = Tier::Memory(content);
            // promote_to_disk reads from Tier::Memory, so set it first.
            let _ = buffer.promote_to_disk();
        } else {
            buffer.tier = Tier::Memory(content);
        }
        buffer
    }

    /// Current logical length of the buffered content.
    pub fn len(&self) -> u64 {
        match &self.tier {
            Tier::Memory(buf) => buf.len() as u64,
            Tier::Disk { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes `data` at `offset`, zero-filling any gap, promoting to the
    /// disk tier if this write would grow the buffer past the memory cap,
    /// and failing with [`Error::NoSpace`] if it would also exceed the disk
    /// cap.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let new_len = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| Error::InvalidParameter("write overflows u64 length".to_string()))?;

        if matches!(self.tier, Tier::Memory(_)) && new_len as usize > self.memory_cap {
            self.promote_to_disk()?;
        }

        match &mut self.tier {
            Tier::Memory(buf) => {
                if new_len as usize > buf.len() {
                    buf.resize(new_len as usize, 0);
                }
                buf[offset as usize..new_len as usize].copy_from_slice(data);
                Ok(())
            }
            Tier::Disk { file, len } => {
                if new_len > self.disk_cap as u64 {
                    return Err(Error::NoSpace);
                }
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(data)?;
                if new_len > *len {
                    *len = new_len;
                }
                Ok(())
            }
        }
    }

    /// Truncates (or zero-extends) the buffer to exactly `size`.
    pub fn truncate(&mut self, size: u64) -> Result<()> {
        match &mut self.tier {
            Tier::Memory(buf) => {
                if size as usize > self.memory_cap {
                    self.promote_to_disk()?;
                    return self.truncate(size);
                }
                buf.resize(size as usize, 0);
                Ok(())
            }
            Tier::Disk { file, len } => {
                file.as_file().set_len(size)?;
                *len = size;
                Ok(())
            }
        }
    }

    /// Materialises the buffer's full current content, ready to hand to
    /// [`crate::self_encryptor::SelfEncryptor::commit`].
    pub fn contents(&mut self) -> Result<Bytes> {
        match &mut self.tier {
            Tier::Memory(buf) => Ok(Bytes::from(buf.clone())),
            Tier::Disk { file, len } => {
                file.seek(SeekFrom::Start(0))?;
                let mut out = vec![0u8; *len as usize];
                file.read_exact(&mut out)?;
                Ok(Bytes::from(out))
            }
        }
    }

    fn promote_to_disk(&mut self) -> Result<()> {
        let existing = match &self.tier {
            Tier::Memory(buf) => buf.clone(),
            Tier::Disk { .. } => return Ok(()),
        };
        if existing.len() > self.disk_cap {
            return Err(Error::NoSpace);
        }
        let mut file = NamedTempFile::new_in(&self.spill_dir)?;
        file.write_all(&existing)?;
        let len = existing.len() as u64;
        self.tier = Tier::Disk { file, len };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            file_buffer_memory_cap: 16,
            file_buffer_disk_cap: 64,
            ..Config::default()
        }
    }

    #[test]
    fn small_write_stays_in_memory() {
        let mut buf = WriteBuffer::new(&config());
        buf.write_at(0, b"hello").expect("write");
        assert_eq!(buf.len(), 5);
        assert!(matches!(buf.tier, Tier::Memory(_)));
    }

    #[test]
    fn write_past_memory_cap_promotes_to_disk() {
        let mut buf = WriteBuffer::new(&config());
        buf.write_at(0, &[0u8; 20]).expect("write");
        assert!(matches!(buf.tier, Tier::Disk { .. }));
        assert_eq!(buf.len(), 20);
    }

    #[test]
    fn write_past_disk_cap_fails_with_no_space() {
        let mut buf = WriteBuffer::new(&config());
        let err = buf.write_at(0, &[0u8; 100]).unwrap_err();
        assert!(matches!(err, Error::NoSpace));
    }

    #[test]
    fn truncate_shrinks_and_extends() {
        let mut buf = WriteBuffer::new(&config());
        buf.write_at(0, b"hello").expect("write");
        buf.truncate(2).expect("truncate down");
        assert_eq!(buf.contents().expect("contents").as_ref(), b"he");
        buf.truncate(4).expect("truncate up");
        assert_eq!(buf.contents().expect("contents").len(), 4);
    }

    #[test]
    fn contents_survive_disk_promotion() {
        let mut buf = WriteBuffer::new(&config());
        buf.write_at(0, &[7u8; 20]).expect("write");
        let contents = buf.contents().expect("contents");
        assert_eq!(contents.len(), 20);
        assert!(contents.iter().all(|b| *b == 7));
    }
}
