use crate::engine::{DEFAULT_SCAN_BATCH, EngineOptions};
use crate::error::KvError;
use crate::store::Store;
use private::Sealed;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy)]
struct BuilderConfig {
    create: bool,
    cache_size: Option<usize>,
    list_batch: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { create: true, cache_size: None, list_batch: DEFAULT_SCAN_BATCH }
    }
}

#[derive(Debug, Default)]
pub struct NoPath;
#[derive(Debug)]
pub struct WithPath(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoPath {}
impl Sealed for WithPath {}

/// Fluent, type-checked construction of a [`Store`]; `open` exists only once a path is set.
#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct StoreBuilder<S: Sealed = NoPath> {
    state: S,
    config: BuilderConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> StoreBuilder<S> {
    #[must_use = "Sets whether a missing store should be created"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    #[must_use = "Sets the engine page cache size in bytes"]
    pub const fn cache_size(mut self, bytes: usize) -> Self {
        self.config.cache_size = Some(bytes);
        self
    }

    #[must_use = "Sets how many keys a listing fetches per engine round-trip"]
    pub const fn list_batch(mut self, keys: usize) -> Self {
        self.config.list_batch = keys;
        self
    }

    fn transition<N: Sealed>(self, state: N) -> StoreBuilder<N> {
        StoreBuilder { state, config: self.config }
    }
}

impl StoreBuilder<NoPath> {
    #[must_use = "Creates a new store builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the directory holding the store"]
    pub fn path(self, path: impl Into<PathBuf>) -> StoreBuilder<WithPath> {
        self.transition(WithPath(path.into()))
    }
}

impl StoreBuilder<WithPath> {
    /// Consumes the configuration and opens the store.
    ///
    /// With `create(true)` (the default) the directory and the engine file are created when
    /// missing; with `create(false)` a missing store is an error.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::InvalidConfiguration`] if `list_batch` is zero.
    /// Returns [`KvError::Io`] if the directory cannot be created.
    /// Returns [`KvError::Engine`] if:
    /// - The store does not exist and `create` is false.
    /// - Another process holds the engine file.
    /// - The engine file is corrupt.
    #[instrument(skip(self), fields(path = %self.state.0.display(), create = self.config.create))]
    pub fn open(self) -> Result<Store, KvError> {
        if self.config.list_batch == 0 {
            return Err(KvError::InvalidConfiguration {
                message: "list_batch must be at least 1".into(),
                context: None,
            });
        }

        let options = EngineOptions {
            create: self.config.create,
            cache_size: self.config.cache_size,
            scan_batch: self.config.list_batch,
        };
        let store = Store::open_with(&self.state.0, options)?;
        info!(list_batch = self.config.list_batch, "Store ready");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn zero_list_batch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = StoreBuilder::new().path(dir.path()).list_batch(0).open().unwrap_err();
        assert!(matches!(err, KvError::InvalidConfiguration { .. }));
    }

    #[test]
    fn missing_store_without_create_fails() {
        let dir = TempDir::new().unwrap();
        let err = Store::builder().path(dir.path().join("absent")).create(false).open().unwrap_err();
        assert!(matches!(err, KvError::Engine { .. }), "unexpected error: {err:?}");
        assert!(!dir.path().join("absent").exists());
    }

    #[test]
    fn options_carry_through_to_the_engine() {
        let dir = TempDir::new().unwrap();
        let store = Store::builder()
            .path(dir.path().join("nested").join("db"))
            .cache_size(1 << 20)
            .list_batch(3)
            .open()
            .unwrap();
        assert_eq!(store.engine().scan_batch(), 3);
        assert!(store.path().ends_with("nested/db"));
    }
}
