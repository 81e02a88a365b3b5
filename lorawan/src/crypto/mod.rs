//! LoRaWAN cryptographic operations
//!
//! This module provides cryptographic functions for LoRaWAN security:
//! - Message Integrity Code (MIC) computation
//! - Payload encryption/decryption
//! - Join accept encryption
//! - Session key derivation

/// AES-128 block primitive
pub mod aes;

/// AES-CMAC engine
pub mod cmac;

use self::aes::{AesContext, Block, BLOCK_SIZE};
use self::cmac::CmacContext;
use crate::config::device::{AESKey, DevAddr};

/// MIC size in bytes
pub const MIC_SIZE: usize = 4;

/// Direction identifiers for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Uplink (device to network)
    Up = 0,
    /// Downlink (network to device)
    Down = 1,
}

/// Builds the A/B0 style block shared by the payload cipher and data MIC
fn frame_block(tag: u8, dir: Direction, dev_addr: DevAddr, fcnt: u32, last: u8) -> Block {
    let mut block = [0u8; BLOCK_SIZE];
    block[0] = tag;
    block[5] = dir as u8;
    block[6..10].copy_from_slice(&dev_addr.to_le_bytes());
    block[10..14].copy_from_slice(&fcnt.to_le_bytes());
    block[15] = last;
    block
}

/// Compute the MIC of a data frame
///
/// `msg` is everything from the MHDR up to (not including) the MIC.
pub fn compute_mic(
    key: &AESKey,
    msg: &[u8],
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
) -> u32 {
    let aes = AesContext::new(key);
    let b0 = frame_block(0x49, dir, dev_addr, fcnt, msg.len() as u8);

    let mut ctx = CmacContext::new(&aes);
    ctx.update(&b0);
    ctx.update(msg);
    ctx.finish()
}

/// Compute the MIC of a join request or (plaintext) join accept
pub fn compute_join_mic(key: &AESKey, msg: &[u8]) -> u32 {
    let aes = AesContext::new(key);
    let mut ctx = CmacContext::new(&aes);
    ctx.update(msg);
    ctx.finish()
}

/// Encrypt or decrypt `payload` in place
///
/// The keystream is AES(A_i) for i = 1..k; the same call undoes itself.
pub fn encrypt_payload(
    key: &AESKey,
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
    payload: &mut [u8],
) {
    let aes = AesContext::new(key);

    for (i, chunk) in payload.chunks_mut(BLOCK_SIZE).enumerate() {
        let mut s = frame_block(0x01, dir, dev_addr, fcnt, (i + 1) as u8);
        aes.encrypt(&mut s);

        for (b, k) in chunk.iter_mut().zip(s.iter()) {
            *b ^= *k;
        }
    }
}

/// Apply the network side join accept transform (AES decrypt) in place
///
/// A network server produces a join accept by running AES *decrypt* over
/// the plaintext so that the device only ever needs AES encrypt.
/// `data` must be a whole number of blocks.
pub fn encrypt_join_accept(key: &AESKey, data: &mut [u8]) {
    let aes = AesContext::new(key);

    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        aes.decrypt(&mut block);
        chunk.copy_from_slice(&block);
    }
}

/// Recover a join accept plaintext in place (AES encrypt)
pub fn decrypt_join_accept(key: &AESKey, data: &mut [u8]) {
    let aes = AesContext::new(key);

    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        aes.encrypt(&mut block);
        chunk.copy_from_slice(&block);
    }
}

/// Derive network and application session keys from join accept
///
/// # Arguments
/// * `app_key` - Application key
/// * `app_nonce` - Application nonce from join accept (24 bit)
/// * `net_id` - Network ID from join accept (24 bit)
/// * `dev_nonce` - Device nonce from join request
pub fn derive_session_keys(
    app_key: &AESKey,
    app_nonce: u32,
    net_id: u32,
    dev_nonce: u16,
) -> (AESKey, AESKey) {
    let aes = AesContext::new(app_key);

    let derive = |tag: u8| {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = tag;
        block[1..4].copy_from_slice(&app_nonce.to_le_bytes()[..3]);
        block[4..7].copy_from_slice(&net_id.to_le_bytes()[..3]);
        block[7..9].copy_from_slice(&dev_nonce.to_le_bytes());
        aes.encrypt(&mut block);
        AESKey::new(block)
    };

    (derive(0x01), derive(0x02))
}
