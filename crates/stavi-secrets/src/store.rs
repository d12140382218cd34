//! Key/value secrets store backed by a properties-style text file.
//!
//! The file holds one `name=value` pair per line (`:` is accepted as the
//! separator too); blank lines and lines starting with `#` or `!` are
//! ignored:
//!
//! ```text
//! # AES key used for the private-key file, base64
//! aes.private_key=q83vEjRWeJq83vEjRWeJqw==
//! salting_strategy.composition=prepend,reverse,append
//! salting_strategy.length=12
//! ```
//!
//! By default the file is re-read on every lookup so secret values do not
//! stay resident between reads. With [`SecretStoreOptions::cache`] the parsed
//! file is kept for the life of the store.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{SecretError, SecretResult};

type Properties = HashMap<String, Zeroizing<String>>;

/// Names of the secrets this application reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Secret {
    /// Base64 AES key used by the decryption pipeline.
    AesPrivateKey,
    /// Base64 initialization vector for CBC mode.
    AesIv,
    /// Comma-separated list of salting steps.
    SaltingStrategyComposition,
    /// Number of salt bytes per salting step.
    SaltingStrategyLength,
}

impl Secret {
    /// The key under which this secret is stored.
    pub fn property_name(&self) -> &'static str {
        match self {
            Self::AesPrivateKey => "aes.private_key",
            Self::AesIv => "aes.iv",
            Self::SaltingStrategyComposition => "salting_strategy.composition",
            Self::SaltingStrategyLength => "salting_strategy.length",
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property_name())
    }
}

/// Loading behaviour of a [`SecretStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecretStoreOptions {
    /// Keep the parsed file in memory after the first read.
    pub cache: bool,
    /// Delete the secrets file once it has been read.
    pub delete_on_load: bool,
    /// Read the file when the store is opened rather than on first lookup.
    pub eager_load: bool,
}

/// Secrets resolved by name from a key/value file.
pub struct SecretStore {
    path: PathBuf,
    options: SecretStoreOptions,
    cached: Mutex<Option<Arc<Properties>>>,
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStore")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SecretStore {
    /// Opens the store at `path`.
    ///
    /// Nothing is read unless `eager_load` is set, in which case a missing or
    /// unreadable file fails here.
    pub fn open(path: impl Into<PathBuf>, options: SecretStoreOptions) -> SecretResult<Self> {
        let store = Self {
            path: path.into(),
            options,
            cached: Mutex::new(None),
        };

        if options.eager_load {
            info!(path = ?store.path, "eager loading of secrets enabled, loading now");
            if !options.cache {
                warn!("secrets are eagerly loaded but caching is disabled; eager loading has no effect");
            }
            store.load()?;
        }

        Ok(store)
    }

    /// Returns the path of the secrets file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a secret, failing if it is absent or blank.
    pub fn get_secret(&self, secret: Secret) -> SecretResult<Zeroizing<String>> {
        self.get_named(secret.property_name())
    }

    /// Looks up a secret and parses it as an integer.
    pub fn get_int_secret(&self, secret: Secret) -> SecretResult<i64> {
        let value = self.get_secret(secret)?;
        value
            .trim()
            .parse()
            .map_err(|e| SecretError::malformed(secret.property_name(), format!("{}", e)))
    }

    /// Looks up a secret by its raw key.
    pub fn get_named(&self, name: &str) -> SecretResult<Zeroizing<String>> {
        let properties = self.load()?;
        match properties.get(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.clone()),
            _ => Err(SecretError::missing(name)),
        }
    }

    fn load(&self) -> SecretResult<Arc<Properties>> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref properties) = *cached {
            debug!("secrets are cached, returning cached secrets");
            return Ok(Arc::clone(properties));
        }

        let read = fs::read_to_string(&self.path).map(Zeroizing::new);
        if self.options.delete_on_load {
            self.delete_file();
        }
        let content = read.map_err(|e| SecretError::io(&self.path, e))?;
        debug!(path = ?self.path, "read secrets file");

        let properties = Arc::new(parse_properties(&content));
        if self.options.cache {
            *cached = Some(Arc::clone(&properties));
            debug!("secret caching enabled, secrets cached");
        }
        Ok(properties)
    }

    fn delete_file(&self) {
        if !self.path.exists() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = ?self.path, "deleted secrets file"),
            Err(e) => warn!(path = ?self.path, error = %e, "failed to delete secrets file"),
        }
    }
}

fn parse_properties(content: &str) -> Properties {
    let mut properties = Properties::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(|c: char| c == '=' || c == ':') {
            Some(idx) => (&line[..idx], &line[idx + 1..]),
            None => (line, ""),
        };
        properties.insert(
            key.trim().to_string(),
            Zeroizing::new(value.trim().to_string()),
        );
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_secrets(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = "\
# salting
salting_strategy.composition = prepend,append
salting_strategy.length: 8
! legacy comment
aes.private_key=abc=def
blank.value=
";

    #[test]
    fn parses_properties_format() {
        let props = parse_properties(SAMPLE);
        assert_eq!(
            props.get("salting_strategy.composition").map(|v| v.as_str()),
            Some("prepend,append")
        );
        assert_eq!(
            props.get("salting_strategy.length").map(|v| v.as_str()),
            Some("8")
        );
        // Only the first separator splits.
        assert_eq!(
            props.get("aes.private_key").map(|v| v.as_str()),
            Some("abc=def")
        );
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn get_secret_and_int_secret() {
        let file = write_secrets(SAMPLE);
        let store = SecretStore::open(file.path(), SecretStoreOptions::default()).unwrap();

        assert_eq!(
            store.get_secret(Secret::SaltingStrategyComposition).unwrap().as_str(),
            "prepend,append"
        );
        assert_eq!(store.get_int_secret(Secret::SaltingStrategyLength).unwrap(), 8);
    }

    #[test]
    fn absent_or_blank_secret_is_missing() {
        let file = write_secrets(SAMPLE);
        let store = SecretStore::open(file.path(), SecretStoreOptions::default()).unwrap();

        assert!(matches!(
            store.get_secret(Secret::AesIv),
            Err(SecretError::Missing { ref name }) if name == "aes.iv"
        ));
        assert!(matches!(
            store.get_named("blank.value"),
            Err(SecretError::Missing { .. })
        ));
    }

    #[test]
    fn non_integer_secret_is_malformed() {
        let file = write_secrets("salting_strategy.length=twelve\n");
        let store = SecretStore::open(file.path(), SecretStoreOptions::default()).unwrap();
        assert!(matches!(
            store.get_int_secret(Secret::SaltingStrategyLength),
            Err(SecretError::Malformed { .. })
        ));
    }

    #[test]
    fn uncached_store_rereads_file() {
        let file = write_secrets("aes.private_key=first\n");
        let store = SecretStore::open(file.path(), SecretStoreOptions::default()).unwrap();
        assert_eq!(store.get_secret(Secret::AesPrivateKey).unwrap().as_str(), "first");

        fs::write(file.path(), "aes.private_key=second\n").unwrap();
        assert_eq!(store.get_secret(Secret::AesPrivateKey).unwrap().as_str(), "second");
    }

    #[test]
    fn cached_store_keeps_first_read() {
        let file = write_secrets("aes.private_key=first\n");
        let options = SecretStoreOptions {
            cache: true,
            ..Default::default()
        };
        let store = SecretStore::open(file.path(), options).unwrap();
        assert_eq!(store.get_secret(Secret::AesPrivateKey).unwrap().as_str(), "first");

        fs::write(file.path(), "aes.private_key=second\n").unwrap();
        assert_eq!(store.get_secret(Secret::AesPrivateKey).unwrap().as_str(), "first");
    }

    #[test]
    fn delete_on_load_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.properties");
        fs::write(&path, "aes.private_key=value\n").unwrap();

        let options = SecretStoreOptions {
            cache: true,
            delete_on_load: true,
            eager_load: true,
        };
        let store = SecretStore::open(&path, options).unwrap();
        assert!(!path.exists());
        assert_eq!(store.get_secret(Secret::AesPrivateKey).unwrap().as_str(), "value");
    }

    #[test]
    fn eager_load_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let options = SecretStoreOptions {
            eager_load: true,
            ..Default::default()
        };
        let result = SecretStore::open(dir.path().join("absent"), options);
        assert!(matches!(result, Err(SecretError::Io { .. })));
    }

    #[test]
    fn lazy_open_of_missing_file_fails_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            SecretStore::open(dir.path().join("absent"), SecretStoreOptions::default()).unwrap();
        assert!(matches!(
            store.get_secret(Secret::AesPrivateKey),
            Err(SecretError::Io { .. })
        ));
    }

    #[test]
    fn secret_display_is_property_name() {
        assert_eq!(Secret::AesPrivateKey.to_string(), "aes.private_key");
        assert_eq!(
            Secret::SaltingStrategyLength.to_string(),
            "salting_strategy.length"
        );
    }
}
