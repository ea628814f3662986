//! The root owner of a store and the namespace views handed out below it.
//!
//! A [`Store`] opens the engine once and is the only handle allowed to close it. Every
//! [`Namespace`] and [`Kv`] below it shares the same engine by reference and starts failing
//! with [`KvError::Closed`] once the root has been closed.

use crate::builder::StoreBuilder;
use crate::config::StoreConfig;
use crate::engine::{Engine, EngineOptions};
use crate::error::KvError;
use crate::kv::Kv;
use crate::monitor::Monitor;
use crate::prefix::Prefix;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

type Node = Monitor<Arc<Engine>, Kv>;

/// A node of the namespace tree.
///
/// `keyspace(name)` and `sub(name)` are idempotent: repeated calls with the same name return
/// handles with the same prefix, constructed once and cached for the lifetime of this node.
/// Cloning a `Namespace` is cheap and yields a view of the same node.
#[derive(Debug, Clone)]
pub struct Namespace {
    node: Arc<Node>,
}

impl Namespace {
    fn root(engine: Arc<Engine>) -> Self {
        Self { node: Arc::new(Monitor::new(engine, Prefix::root(), Kv::new)) }
    }

    /// Returns the keyspace `name` of this node, creating it on first use.
    #[must_use]
    pub fn keyspace(&self, name: &str) -> Kv {
        self.node.keyspace(name)
    }

    /// Returns the nested namespace `name` of this node, creating it on first use.
    #[must_use]
    pub fn sub(&self, name: &str) -> Self {
        Self { node: self.node.sub(name) }
    }

    #[must_use]
    pub fn prefix(&self) -> &Prefix {
        self.node.prefix()
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        self.node.handle()
    }
}

/// The root of a store: owns the engine lifecycle and derefs to the root [`Namespace`].
///
/// # Example
///
/// ```rust
/// use nestkv_store::{PutOptions, Store};
///
/// # fn main() -> Result<(), nestkv_store::KvError> {
/// # let tmp = tempfile::tempdir().unwrap();
/// let store = Store::builder().path(tmp.path().join("db")).open()?;
///
/// let avatars = store.sub("users").sub("u-42").keyspace("avatars");
/// avatars.put(PutOptions::new("small.png", b"..."))?;
/// assert_eq!(avatars.len()?, 1);
///
/// store.close()?;
/// assert!(avatars.get("small.png").unwrap_err().is_closed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Store {
    root: Namespace,
}

impl Deref for Store {
    type Target = Namespace;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl Store {
    #[must_use = "The store is not opened until you call .open()"]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Opens the store described by `config`.
    ///
    /// # Errors
    /// See [`StoreBuilder::open`].
    pub fn from_config(config: &StoreConfig) -> Result<Self, KvError> {
        config.builder().open()
    }

    pub(crate) fn open_with(path: &Path, options: EngineOptions) -> Result<Self, KvError> {
        let engine = Engine::open(path, options)?;
        Ok(Self { root: Namespace::root(Arc::new(engine)) })
    }

    /// The store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.engine().path()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.engine().is_closed()
    }

    /// Closes the engine for every node of this store.
    ///
    /// Calls already running finish first; every later call on any node fails with
    /// [`KvError::Closed`].
    ///
    /// # Errors
    /// Returns [`KvError::Closed`] if the store was already closed.
    pub fn close(&self) -> Result<(), KvError> {
        self.engine().close()
    }
}
