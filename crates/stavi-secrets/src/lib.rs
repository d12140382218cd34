//! Secrets store, salting and the single-use decryption pipeline.
//!
//! - [`SecretStore`] resolves named secrets from a key/value file
//! - [`SaltingStrategy`] adds and removes a reversible salt
//! - [`CipherMaterial`] holds an AES key (and IV) and runs ECB or CBC
//! - [`SecretPipeline`] recovers plaintext from an encrypted, salted file
//! - [`seal`] produces such files
//!
//! ```ignore
//! use stavi_secrets::{AesMode, SecretPipeline, SecretStore, SecretStoreOptions};
//!
//! let store = SecretStore::open("secrets.properties", SecretStoreOptions::default())?;
//! let key = SecretPipeline::standard("private-key.txt", &store, AesMode::Ecb)?.read_string()?;
//! ```

pub mod cipher;
pub mod error;
pub mod pipeline;
pub mod salt;
pub mod store;

pub use cipher::{AES_BLOCK_LEN, AesMode, CipherMaterial};
pub use error::{SecretError, SecretResult};
pub use pipeline::{SecretPipeline, Stage, seal, seal_to_file};
pub use salt::{SaltStep, SaltingStrategy};
pub use store::{Secret, SecretStore, SecretStoreOptions};
