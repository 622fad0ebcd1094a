// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Encryption and signing of the Owner/Group directory encodings (spec
//! §4.3). The directory's own bytes are self-encrypted first (producing a
//! `DataMap`); this module then encrypts that (small) `DataMap`, salted on
//! the directory's position in the tree, and signs the result.

use crate::error::{Error, Result};
use crate::identity::Identity;
use tiny_keccak::{Hasher, Sha3};

const KEY_LEN: usize = 32;

fn derive_key(parent_id: &Identity, directory_id: &Identity) -> [u8; KEY_LEN] {
    let mut hasher = Sha3::v256();
    hasher.update(parent_id.as_bytes());
    hasher.update(directory_id.as_bytes());
    let mut key = [0u8; KEY_LEN];
    hasher.finalize(&mut key);
    key
}

fn keystream(key: &[u8; KEY_LEN], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter: u64 = 0;
    while out.len() < len {
        let mut hasher = Sha3::v256();
        hasher.update(key);
        hasher.update(&counter.to_le_bytes());
        let mut block = [0u8; KEY_LEN];
        hasher.finalize(&mut block);
        out.extend_from_slice(&block);
        counter += 1;
    }
    out.truncate(len);
    out
}

fn xor_with_keystream(bytes: &[u8], key: &[u8; KEY_LEN]) -> Vec<u8> {
    let stream = keystream(key, bytes.len());
    bytes.iter().zip(stream.iter()).map(|(b, k)| b ^ k).collect()
}

/// Encrypts a serialised `DataMap` for storage under the Owner or Group
/// encoding, salted on the directory's position in the tree.
pub fn encrypt_data_map(
    parent_id: &Identity,
    directory_id: &Identity,
    serialised_data_map: &[u8],
) -> Vec<u8> {
    let key = derive_key(parent_id, directory_id);
    xor_with_keystream(serialised_data_map, &key)
}

/// Inverse of [`encrypt_data_map`].
pub fn decrypt_data_map(
    parent_id: &Identity,
    directory_id: &Identity,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let key = derive_key(parent_id, directory_id);
    Ok(xor_with_keystream(ciphertext, &key))
}

/// Signs bytes with the owner's single keypair, for the Owner encoding.
pub fn sign_owner(keypair: &ed25519_dalek::Keypair, bytes: &[u8]) -> ed25519_dalek::Signature {
    use ed25519_dalek::Signer;
    keypair.sign(bytes)
}

/// Verifies an Owner-zone signature.
pub fn verify_owner(
    public: &ed25519_dalek::PublicKey,
    bytes: &[u8],
    signature: &ed25519_dalek::Signature,
) -> Result<()> {
    use ed25519_dalek::Verifier;
    public
        .verify(bytes, signature)
        .map_err(|e| Error::CryptoError(format!("owner signature invalid: {}", e)))
}

/// Signs bytes for the Group encoding, using the group's shared BLS key.
pub fn sign_group(secret_key: &bls::SecretKey, bytes: &[u8]) -> bls::Signature {
    secret_key.sign(bytes)
}

/// Verifies a Group-zone signature.
pub fn verify_group(public_key: &bls::PublicKey, bytes: &[u8], signature: &bls::Signature) -> Result<()> {
    if public_key.verify(signature, bytes) {
        Ok(())
    } else {
        Err(Error::CryptoError("group signature invalid".to_string()))
    }
}
