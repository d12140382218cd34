//! Single-use decryption pipeline for encrypted, salted secret files.
//!
//! The standard pipeline reads a file and applies, in order:
//!
//! ```text
//! file bytes ──▶ base64 decode ──▶ AES decrypt ──▶ remove salt ──▶ plaintext
//! ```
//!
//! [`seal`] performs the inverse (salt, encrypt, base64 encode) and is what
//! produces the files the pipeline reads.
//!
//! A pipeline yields its result once. Running it moves the stages (and the
//! AES key and IV held by the decrypt stage) out of the pipeline and drops
//! them when the run ends, whether it succeeded or not. Any later read fails
//! with [`SecretError::PipelineReuse`]; build a new pipeline for every read.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, error};
use zeroize::Zeroizing;

use crate::cipher::{AesMode, CipherMaterial};
use crate::error::{SecretError, SecretResult};
use crate::salt::SaltingStrategy;
use crate::store::SecretStore;

/// One transform applied to the bytes read from the source file.
#[derive(Debug)]
pub enum Stage {
    /// Standard base64; ASCII whitespace is ignored.
    Base64Decode,
    /// AES decryption with the held key material.
    Decrypt(CipherMaterial),
    /// Salt removal.
    RemoveSalt(SaltingStrategy),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Self::Base64Decode => "base64-decode",
            Self::Decrypt(_) => "decrypt",
            Self::RemoveSalt(_) => "remove-salt",
        }
    }

    fn apply(&self, input: Zeroizing<Vec<u8>>) -> SecretResult<Zeroizing<Vec<u8>>> {
        let output = match self {
            Self::Base64Decode => {
                let compact: Zeroizing<Vec<u8>> = Zeroizing::new(
                    input
                        .iter()
                        .copied()
                        .filter(|b| !b.is_ascii_whitespace())
                        .collect(),
                );
                STANDARD.decode(compact.as_slice())?
            }
            Self::Decrypt(cipher) => cipher.decrypt(&input)?,
            Self::RemoveSalt(salting) => salting.remove_salt(&input)?,
        };
        Ok(Zeroizing::new(output))
    }
}

/// An ordered, single-use chain of [`Stage`]s over a source file.
pub struct SecretPipeline {
    source: PathBuf,
    stages: Option<Vec<Stage>>,
}

impl fmt::Debug for SecretPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Option<Vec<&str>> = self
            .stages
            .as_ref()
            .map(|stages| stages.iter().map(Stage::name).collect());
        f.debug_struct("SecretPipeline")
            .field("source", &self.source)
            .field("stages", &stages)
            .finish()
    }
}

impl SecretPipeline {
    /// A pipeline that returns the raw file bytes.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            stages: Some(Vec::new()),
        }
    }

    /// The application-standard pipeline: base64 decode, AES decrypt with
    /// the key from `store`, then remove the salt configured in `store`.
    pub fn standard(
        source: impl Into<PathBuf>,
        store: &SecretStore,
        mode: AesMode,
    ) -> SecretResult<Self> {
        let salting = SaltingStrategy::from_store(store)?;
        let cipher = CipherMaterial::from_store(store, mode)?;
        Ok(Self::new(source)
            .then(Stage::Base64Decode)
            .then(Stage::Decrypt(cipher))
            .then(Stage::RemoveSalt(salting)))
    }

    /// Appends a stage.
    #[must_use]
    pub fn then(mut self, stage: Stage) -> Self {
        if let Some(ref mut stages) = self.stages {
            stages.push(stage);
        }
        self
    }

    /// Returns the source file path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns true once the pipeline has produced (or failed to produce)
    /// its result.
    pub fn is_consumed(&self) -> bool {
        self.stages.is_none()
    }

    /// Reads the source file and runs every stage left to right.
    pub fn read_bytes(&mut self) -> SecretResult<Zeroizing<Vec<u8>>> {
        let stages = self.stages.take().ok_or(SecretError::PipelineReuse)?;
        debug!(path = ?self.source, stages = stages.len(), "running secret pipeline");

        let raw = fs::read(&self.source).map_err(|e| {
            error!(path = ?self.source, error = %e, "failed to read secret file");
            SecretError::io(&self.source, e)
        })?;

        stages
            .iter()
            .try_fold(Zeroizing::new(raw), |bytes, stage| {
                stage.apply(bytes).inspect_err(|e| {
                    error!(stage = stage.name(), error = %e, "secret pipeline stage failed");
                })
            })
    }

    /// Like [`SecretPipeline::read_bytes`], decoding the result as UTF-8.
    ///
    /// The decrypted bytes stay in a wiped buffer on both paths; the error
    /// for invalid UTF-8 does not carry them.
    pub fn read_string(&mut self) -> SecretResult<Zeroizing<String>> {
        let bytes = self.read_bytes()?;
        let text = std::str::from_utf8(&bytes)?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}

/// Salts, encrypts and base64-encodes `plaintext`; the inverse of the
/// standard pipeline.
pub fn seal(
    plaintext: &[u8],
    cipher: &CipherMaterial,
    salting: &SaltingStrategy,
) -> SecretResult<String> {
    let salted = Zeroizing::new(salting.add_salt(plaintext));
    let ciphertext = cipher.encrypt(&salted)?;
    Ok(STANDARD.encode(ciphertext))
}

/// Seals `plaintext` with the key, IV and salting configured in `store` and
/// writes the result to `destination`.
pub fn seal_to_file(
    plaintext: &[u8],
    destination: &Path,
    store: &SecretStore,
    mode: AesMode,
) -> SecretResult<()> {
    let salting = SaltingStrategy::from_store(store)?;
    let cipher = CipherMaterial::from_store(store, mode)?;
    let sealed = seal(plaintext, &cipher, &salting)?;
    fs::write(destination, sealed).map_err(|e| SecretError::io(destination, e))?;
    debug!(path = ?destination, "wrote sealed secret");
    Ok(())
}
