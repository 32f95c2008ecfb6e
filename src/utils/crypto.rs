//! AES-128 primitives for the link.
//!
//! - **Stream mode** protects session traffic: AES-CFB with 128-bit segments
//!   and a fresh random IV per call, emitted as `IV ‖ ciphertext`.
//! - **Block mode** (ECB) is only applied to the high-entropy pairing randoms
//!   and the sealed session secret.
//!
//! There is no authentication tag: decrypting with the wrong key yields
//! garbage, not an error.

use crate::error::{constants, ProtocolError, Result};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{AsyncStreamCipher, BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit};
use aes::Aes128;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-128 key length
pub const KEY_LEN: usize = 16;

/// AES block length
pub const BLOCK_LEN: usize = 16;

/// Stream-mode IV length
pub const IV_LEN: usize = 16;

type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

/// Stream-mode cipher bound to a session key
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Crypto {
    key: [u8; KEY_LEN],
}

impl Crypto {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self { key: *key }
    }

    /// Draw a fresh IV from the OS RNG
    pub fn generate_iv() -> Result<[u8; IV_LEN]> {
        let mut iv = [0u8; IV_LEN];
        fill_random(&mut iv)?;
        Ok(iv)
    }

    /// Encrypt under a fresh IV, returning `IV ‖ ciphertext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let iv = Self::generate_iv()?;
        Ok(self.encrypt_with_iv(plaintext, &iv))
    }

    pub(crate) fn encrypt_with_iv(&self, plaintext: &[u8], iv: &[u8; IV_LEN]) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_LEN + plaintext.len());
        out.extend_from_slice(iv);
        out.extend_from_slice(plaintext);
        Aes128CfbEnc::new(
            GenericArray::from_slice(&self.key),
            GenericArray::from_slice(iv),
        )
        .encrypt(&mut out[IV_LEN..]);
        out
    }

    /// Split the IV off `IV ‖ ciphertext` and decrypt the rest
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < IV_LEN {
            debug!(len = data.len(), "{}", constants::ERR_CIPHERTEXT_TOO_SHORT);
            return Err(ProtocolError::DecryptionFailure);
        }
        let (iv, ciphertext) = data.split_at(IV_LEN);
        let mut out = ciphertext.to_vec();
        Aes128CfbDec::new(
            GenericArray::from_slice(&self.key),
            GenericArray::from_slice(iv),
        )
        .decrypt(&mut out);
        Ok(out)
    }
}

/// AES-128-ECB encrypt; `data` must be a whole number of blocks
pub fn block_encrypt(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>> {
    check_blocks(data)?;
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = data.to_vec();
    for block in out.chunks_exact_mut(BLOCK_LEN) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(out)
}

/// AES-128-ECB decrypt; `data` must be a whole number of blocks
pub fn block_decrypt(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>> {
    check_blocks(data)?;
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = data.to_vec();
    for block in out.chunks_exact_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(out)
}

fn check_blocks(data: &[u8]) -> Result<()> {
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        return Err(ProtocolError::InvalidBlockLength(data.len()));
    }
    Ok(())
}

/// Fill `buf` from the OS CSPRNG
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::fill(buf).map_err(|e| {
        ProtocolError::EncryptionFailure(format!("{}: {e}", constants::ERR_RNG_UNAVAILABLE))
    })
}

/// `len` random bytes, none of them zero
pub fn random_nonzero(len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    fill_random(&mut out)?;
    for byte in out.iter_mut() {
        while *byte == 0 {
            let mut one = [0u8; 1];
            fill_random(&mut one)?;
            *byte = one[0];
        }
    }
    Ok(out)
}
