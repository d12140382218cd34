//! AES key material and block-mode encryption/decryption.
//!
//! Keys are 128, 192 or 256 bits; the cipher is picked from the key length.
//! Payloads use PKCS#7 padding in both ECB and CBC modes.

use std::fmt;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{SecretError, SecretResult};
use crate::store::{Secret, SecretStore};

/// AES block size in bytes, which is also the CBC IV length.
pub const AES_BLOCK_LEN: usize = 16;

/// Block cipher mode of operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AesMode {
    /// Electronic codebook; no IV.
    #[default]
    Ecb,
    /// Cipher block chaining with an IV from the secrets store.
    Cbc,
}

impl fmt::Display for AesMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ecb => f.write_str("AES/ECB/PKCS7"),
            Self::Cbc => f.write_str("AES/CBC/PKCS7"),
        }
    }
}

/// An AES key (and IV for CBC) that is wiped from memory on drop.
pub struct CipherMaterial {
    mode: AesMode,
    key: Zeroizing<Vec<u8>>,
    iv: Option<Zeroizing<Vec<u8>>>,
}

impl fmt::Debug for CipherMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherMaterial")
            .field("mode", &self.mode)
            .field("key_bits", &(self.key.len() * 8))
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CipherMaterial {
    /// Builds cipher material from raw key bytes.
    ///
    /// CBC requires a 16-byte IV; ECB ignores any IV given.
    pub fn new(mode: AesMode, key: Vec<u8>, iv: Option<Vec<u8>>) -> SecretResult<Self> {
        let key = Zeroizing::new(key);
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(SecretError::Cipher(format!(
                "AES key must be 16, 24 or 32 bytes, got {}",
                key.len()
            )));
        }
        let iv = match mode {
            AesMode::Ecb => None,
            AesMode::Cbc => {
                let iv = Zeroizing::new(iv.ok_or_else(|| {
                    SecretError::Cipher("CBC mode requires an IV".to_string())
                })?);
                if iv.len() != AES_BLOCK_LEN {
                    return Err(SecretError::Cipher(format!(
                        "CBC IV must be {} bytes, got {}",
                        AES_BLOCK_LEN,
                        iv.len()
                    )));
                }
                Some(iv)
            }
        };
        Ok(Self { mode, key, iv })
    }

    /// Reads the base64 AES key (and IV for CBC) from the secrets store.
    pub fn from_store(store: &SecretStore, mode: AesMode) -> SecretResult<Self> {
        let key = decode_secret(store, Secret::AesPrivateKey)?;
        let iv = match mode {
            AesMode::Ecb => None,
            AesMode::Cbc => Some(decode_secret(store, Secret::AesIv)?),
        };
        Self::new(mode, key, iv)
    }

    /// Generates a random IV suitable for CBC mode.
    pub fn generate_iv() -> Vec<u8> {
        let mut rng = rand::rng();
        (0..AES_BLOCK_LEN).map(|_| rng.random()).collect()
    }

    /// The configured mode.
    pub fn mode(&self) -> AesMode {
        self.mode
    }

    /// Decrypts a padded ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> SecretResult<Vec<u8>> {
        match self.key.len() {
            16 => self.decrypt_with::<Aes128>(ciphertext),
            24 => self.decrypt_with::<Aes192>(ciphertext),
            _ => self.decrypt_with::<Aes256>(ciphertext),
        }
    }

    /// Encrypts and pads a plaintext.
    pub fn encrypt(&self, plaintext: &[u8]) -> SecretResult<Vec<u8>> {
        match self.key.len() {
            16 => self.encrypt_with::<Aes128>(plaintext),
            24 => self.encrypt_with::<Aes192>(plaintext),
            _ => self.encrypt_with::<Aes256>(plaintext),
        }
    }

    fn decrypt_with<C>(&self, ciphertext: &[u8]) -> SecretResult<Vec<u8>>
    where
        C: BlockCipher + BlockDecryptMut + KeyInit,
    {
        let plaintext = match (self.mode, self.iv.as_deref()) {
            (AesMode::Ecb, _) => ecb::Decryptor::<C>::new_from_slice(&self.key)
                .map_err(|e| SecretError::Cipher(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            (AesMode::Cbc, Some(iv)) => cbc::Decryptor::<C>::new_from_slices(&self.key, iv)
                .map_err(|e| SecretError::Cipher(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            (AesMode::Cbc, None) => {
                return Err(SecretError::Cipher("CBC mode requires an IV".to_string()));
            }
        };
        plaintext.map_err(|_| {
            SecretError::Cipher(format!(
                "{} decryption failed: wrong key or corrupt ciphertext",
                self.mode
            ))
        })
    }

    fn encrypt_with<C>(&self, plaintext: &[u8]) -> SecretResult<Vec<u8>>
    where
        C: BlockCipher + BlockEncryptMut + KeyInit,
    {
        match (self.mode, self.iv.as_deref()) {
            (AesMode::Ecb, _) => Ok(ecb::Encryptor::<C>::new_from_slice(&self.key)
                .map_err(|e| SecretError::Cipher(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            (AesMode::Cbc, Some(iv)) => Ok(cbc::Encryptor::<C>::new_from_slices(&self.key, iv)
                .map_err(|e| SecretError::Cipher(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
            (AesMode::Cbc, None) => Err(SecretError::Cipher("CBC mode requires an IV".to_string())),
        }
    }
}

fn decode_secret(store: &SecretStore, secret: Secret) -> SecretResult<Vec<u8>> {
    let encoded = store.get_secret(secret)?;
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| SecretError::malformed(secret.property_name(), e.to_string()))
}
