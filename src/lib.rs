// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! A metadata, directory, and file-handle core for a content-addressed,
//! convergently-encrypted virtual filesystem.
//!
//! A mount adapter (FUSE, Dokan, WinFsp, or a plain CLI) projects a single
//! POSIX/Win32-style directory tree onto three access zones — `Owner`,
//! `Group`, and `World` — each stored under its own encoding (spec §4.3).
//! This crate resolves paths against that tree, keeps it in sync with a
//! pluggable [`store::Store`], and hands file content to a self-encryptor
//! it otherwise knows nothing about. It does not itself speak any mount
//! protocol, transport bytes over a network, or choose a signing identity
//! for the caller.
//!
//! The entry point is [`drive::Drive`], built from a [`config::Config`], a
//! [`store::Store`] implementation, and [`directory_handler::Keys`].

pub mod buffer;
pub mod config;
pub mod crypto;
pub mod data_map;
pub mod directory;
pub mod directory_handler;
pub mod drive;
pub mod error;
pub mod events;
pub mod file;
pub mod identity;
pub mod meta_data;
pub mod self_encryptor;
pub mod store;
pub mod zone;

pub use config::Config;
pub use directory::Directory;
pub use directory_handler::{DirectoryHandler, Keys};
pub use drive::Drive;
pub use error::{Error, Result};
pub use events::{ChangeEvent, OpKind};
pub use identity::Identity;
pub use meta_data::{FileType, MetaData};
pub use store::{ObjectKind, Store};
pub use zone::Zone;
