//! Incremental AES-CMAC (RFC 4493)
//!
//! The context can be fed any number of arbitrarily sized chunks; the result
//! is identical to a single update over the concatenation. `finish` works on a
//! copy, so the context can be finished more than once.

use aes::Aes128;
use cmac::{Cmac, Mac};

use super::aes::{AesContext, Block, BLOCK_SIZE};

/// Running CMAC computation
#[derive(Clone)]
pub struct CmacContext {
    mac: Cmac<Aes128>,
    size: usize,
}

impl CmacContext {
    /// Start a new MAC computation keyed by `aes`
    pub fn new(aes: &AesContext) -> Self {
        Self {
            mac: <Cmac<Aes128> as cmac::digest::KeyInit>::new(aes.key().as_bytes().into()),
            size: 0,
        }
    }

    /// Absorb `data`
    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
        self.size += data.len();
    }

    /// Number of bytes absorbed so far
    pub fn len(&self) -> usize {
        self.size
    }

    /// True if nothing has been absorbed yet
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Full 16 byte tag
    pub fn finish_block(&self) -> Block {
        let tag = self.mac.clone().finalize().into_bytes();
        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&tag);
        out
    }

    /// Tag truncated to the first four bytes
    ///
    /// The four bytes are packed little endian, so `to_le_bytes()` on the
    /// result yields them in the order they appear in the full tag.
    pub fn finish(&self) -> u32 {
        let block = self.finish_block();
        u32::from_le_bytes([block[0], block[1], block[2], block[3]])
    }
}

impl core::fmt::Debug for CmacContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CmacContext")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
