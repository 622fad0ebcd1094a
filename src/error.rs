// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use std::result;
use thiserror::Error;

/// A specialised `Result` type for this crate.
pub type Result<T> = result::Result<T, Error>;

/// Main error type for the drive core.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed path, empty identity, or a zero-sized argument where forbidden.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Missing child, or a directory id with nothing stored under it.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Duplicate child name on add.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// A mid-path segment is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    /// Zone policy refusal.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// File buffer memory and disk caps exhausted.
    #[error("No space left in file buffer")]
    NoSpace,
    /// A structured form could not be produced.
    #[error("Serialisation error: {0}")]
    SerialisationError(String),
    /// Malformed or incompatible stored bytes.
    #[error("Parsing error: {0}")]
    ParsingError(String),
    /// DataMap encrypt/decrypt failure.
    #[error("Crypto error: {0}")]
    CryptoError(String),
    /// Failure reported by the backing store adapter.
    #[error("Store error (transient: {transient}): {message}")]
    StoreError {
        /// Whether the adapter considers this retryable.
        transient: bool,
        /// Adapter-supplied detail.
        message: String,
    },
    /// The handler was used before a valid `unique_user_id` was supplied.
    #[error("Handler used before initialisation")]
    Uninitialised,
    /// Local filesystem failure from the write buffer's disk spill tier.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// True for a `StoreError` the caller may retry up to `kMaxAttempts`.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreError { transient: true, .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
