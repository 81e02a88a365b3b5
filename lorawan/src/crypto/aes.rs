//! AES-128 block primitive
//!
//! Thin context around [`aes::Aes128`] that transforms exactly one 16 byte
//! block in place. Every other cipher construction in the crate (CMAC,
//! payload cipher, join accept cipher, key derivation) is built on this.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

use crate::config::device::AESKey;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// One AES block
pub type Block = [u8; BLOCK_SIZE];

/// Expanded AES-128 key
#[derive(Clone)]
pub struct AesContext {
    key: AESKey,
    cipher: Aes128,
}

impl AesContext {
    /// Expand `key` into round key material
    pub fn new(key: &AESKey) -> Self {
        Self {
            key: *key,
            cipher: Aes128::new(key.as_bytes().into()),
        }
    }

    /// Key this context was expanded from
    pub fn key(&self) -> &AESKey {
        &self.key
    }

    /// Encrypt one block in place
    pub fn encrypt(&self, block: &mut Block) {
        self.cipher.encrypt_block(block.into());
    }

    /// Decrypt one block in place
    pub fn decrypt(&self, block: &mut Block) {
        self.cipher.decrypt_block(block.into());
    }
}

impl core::fmt::Debug for AesContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesContext").finish_non_exhaustive()
    }
}
