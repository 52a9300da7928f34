//! AES-128-CBC with PKCS#7 padding and a fixed all-zero IV.
//!
//! The fixed key and IV are part of the save format: any build that knows the
//! passphrase reads any save. This keeps casual editors out, nothing more.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;

const FIXED_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("passphrase does not yield a 16-byte key (got {actual} bytes)")]
    InvalidKeyLength { actual: usize },
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext length {len} is not a positive multiple of 16")]
    InvalidLength { len: usize },
    #[error("invalid PKCS#7 padding")]
    InvalidPadding,
    #[error("decrypted data is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Right-pads the passphrase with spaces to 16 characters and keeps the first
/// 16 characters. Only an ASCII passphrase encodes to exactly 16 bytes.
pub fn derive_key(passphrase: &str) -> Result<[u8; KEY_SIZE], CipherError> {
    let padded = passphrase
        .chars()
        .chain(std::iter::repeat(' '))
        .take(KEY_SIZE)
        .collect::<String>();
    let bytes = padded.as_bytes();
    bytes
        .try_into()
        .map_err(|_| CipherError::InvalidKeyLength {
            actual: bytes.len(),
        })
}

pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &str) -> String {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut buffer = pkcs7_pad(plaintext.as_bytes());

    let mut chain = FIXED_IV;
    for chunk in buffer.chunks_exact_mut(BLOCK_SIZE) {
        for (byte, prev) in chunk.iter_mut().zip(chain.iter()) {
            *byte ^= prev;
        }
        let block = GenericArray::from_mut_slice(chunk);
        cipher.encrypt_block(block);
        chain.copy_from_slice(chunk);
    }

    STANDARD.encode(buffer)
}

pub fn decrypt(key: &[u8; KEY_SIZE], encoded: &str) -> Result<String, CipherError> {
    let mut buffer = STANDARD.decode(encoded.trim())?;
    if buffer.is_empty() || buffer.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::InvalidLength { len: buffer.len() });
    }

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut chain = FIXED_IV;
    for chunk in buffer.chunks_exact_mut(BLOCK_SIZE) {
        let mut next_chain = [0u8; BLOCK_SIZE];
        next_chain.copy_from_slice(chunk);
        let block = GenericArray::from_mut_slice(chunk);
        cipher.decrypt_block(block);
        for (byte, prev) in chunk.iter_mut().zip(chain.iter()) {
            *byte ^= prev;
        }
        chain = next_chain;
    }

    let unpadded_len = pkcs7_unpadded_len(&buffer)?;
    buffer.truncate(unpadded_len);
    Ok(String::from_utf8(buffer)?)
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

fn pkcs7_unpadded_len(data: &[u8]) -> Result<usize, CipherError> {
    let pad_len = *data.last().ok_or(CipherError::InvalidPadding)? as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(CipherError::InvalidPadding);
    }
    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&byte| byte as usize != pad_len) {
        return Err(CipherError::InvalidPadding);
    }
    Ok(body.len())
}
