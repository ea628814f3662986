use crate::builder::{StoreBuilder, WithPath};
use crate::engine::DEFAULT_SCAN_BATCH;
use crate::error::{KvError, KvErrorExt};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Serializable settings of a [`crate::Store`].
///
/// Only `path` is required:
///
/// ```toml
/// path = "/var/lib/app/kv"
/// create = true          # default
/// cache_size = 67108864  # bytes, engine default when absent
/// list_batch = 256       # default
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_create")]
    pub create: bool,
    #[serde(default)]
    pub cache_size: Option<usize>,
    #[serde(default = "default_list_batch")]
    pub list_batch: usize,
}

const fn default_create() -> bool {
    true
}

const fn default_list_batch() -> usize {
    DEFAULT_SCAN_BATCH
}

impl StoreConfig {
    /// Settings for `path` with every other field at its default.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create: default_create(),
            cache_size: None,
            list_batch: default_list_batch(),
        }
    }

    /// Loads settings from `file`, overlaid with `NESTKV__`-prefixed environment variables.
    ///
    /// The format follows the file extension (TOML, JSON, YAML and the other formats the
    /// `config` crate understands). `NESTKV__LIST_BATCH=512` overrides `list_batch`.
    ///
    /// # Errors
    /// Returns [`KvError::Config`] if the file is missing or does not describe a store.
    pub fn load(file: impl AsRef<Path>) -> Result<Self, KvError> {
        Self::load_with(file.as_ref(), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("NESTKV")
            .separator("__")
            .convert_case(config::Case::Snake)
            .try_parsing(true)
    }

    fn load_with(file: &Path, environment: Environment) -> Result<Self, KvError> {
        let builder =
            Config::builder().add_source(File::from(file).required(true)).add_source(environment);

        info!("Loading store config from {}", file.display());

        builder
            .build()
            .context("Failed to build store config")?
            .try_deserialize::<Self>()
            .context("Failed to deserialize store config")
    }

    pub(crate) fn builder(&self) -> StoreBuilder<WithPath> {
        let builder = StoreBuilder::new()
            .path(&self.path)
            .create(self.create)
            .list_batch(self.list_batch);
        match self.cache_size {
            Some(bytes) => builder.cache_size(bytes),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn toml_file_with_defaults() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("store.toml");
        fs::write(&file, "path = \"/tmp/kv\"\n").unwrap();

        let config = StoreConfig::load(&file).unwrap();
        assert_eq!(config, StoreConfig::new("/tmp/kv"));
    }

    #[test]
    fn json_file_with_overrides() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("store.json");
        fs::write(&file, r#"{"path":"db","create":false,"cache_size":4096,"list_batch":8}"#).unwrap();

        let config = StoreConfig::load(&file).unwrap();
        assert!(!config.create);
        assert_eq!(config.cache_size, Some(4096));
        assert_eq!(config.list_batch, 8);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("store.toml");
        fs::write(&file, "path = \"/tmp/kv\"\nlist_batch = 8\n").unwrap();

        let vars: config::Map<String, String> = [
            ("NESTKV__LIST_BATCH", "512"),
            ("NESTKV__CREATE", "false"),
            ("NESTKV__CACHE_SIZE", "1048576"),
            ("OTHER__PATH", "/ignored"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
        let environment = StoreConfig::environment().source(Some(vars));

        let config = StoreConfig::load_with(&file, environment).unwrap();
        assert_eq!(config.path, PathBuf::from("/tmp/kv"));
        assert_eq!(config.list_batch, 512);
        assert!(!config.create);
        assert_eq!(config.cache_size, Some(1_048_576));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = StoreConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, KvError::Config { .. }));
    }

    #[test]
    fn missing_path_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("store.toml");
        fs::write(&file, "create = true\n").unwrap();
        assert!(matches!(StoreConfig::load(&file).unwrap_err(), KvError::Config { .. }));
    }
}
