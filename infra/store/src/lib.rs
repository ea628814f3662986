//! Namespaced key-value storage over one embedded, ordered engine.
//!
//! Many logical keyspaces share a single physical `redb` database. Each keyspace sees only
//! its own keys: every key is stored as `prefix ++ key`, where the prefix encodes the
//! keyspace's position in a tree of named sub-stores and no prefix is ever a byte-prefix of
//! a sibling's.
//!
//! # Core Features
//!
//! - **Atomic create-if-absent**: a non-replacing [`Kv::put`] checks and inserts inside one
//!   write transaction, so concurrent creators of a key see exactly one winner.
//! - **Atomic delete-if-present**: [`Kv::delete`] fails with [`KvError::KeyNotFound`] instead
//!   of silently succeeding.
//! - **Ordered, cancellable listing**: [`Kv::list`] is a lazy iterator bounded by the
//!   keyspace, stopped by dropping it or by cancelling its [`Context`].
//! - **Stable namespace identity**: asking a [`Namespace`] for the same child twice returns the
//!   same cached handle.
//!
//! # Architectural Overview
//!
//! 1.  **[`Store`]**: The root owner. Opens the engine, closes it exactly once.
//! 2.  **[`Namespace`]**: A node of the tree handing out keyspaces and sub-stores.
//! 3.  **[`Kv`]**: One keyspace with get / has / put / delete / list / len.
//! 4.  **[`Prefix`]**: The collision-free key prefix behind every node.
//!
//! # Examples
//!
//! ```rust
//! use nestkv_store::{Context, KvError, PutOptions, Store};
//!
//! fn main() -> Result<(), KvError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let dir = tmp.path().join("kv");
//!     let store = Store::builder().path(&dir).create(true).open()?;
//!
//!     let blobs = store.sub("tenant-a").keyspace("blobs");
//!     blobs.put(PutOptions::new("a", b"alpha"))?;
//!     blobs.put(PutOptions::new("b", b"beta"))?;
//!
//!     // The same name in another tenant is a different keyspace.
//!     let other = store.sub("tenant-b").keyspace("blobs");
//!     assert!(other.get("a").unwrap_err().is_not_found());
//!
//!     let keys: Vec<String> = blobs.list(&Context::background(), "")?.collect::<Result<_, _>>()?;
//!     assert_eq!(keys, ["a", "b"]);
//!
//!     store.close()?;
//!     Ok(())
//! }
//! ```

mod builder;
mod config;
mod context;
mod engine;
mod error;
mod kv;
mod maintenance;
mod monitor;
mod prefix;
mod store;

pub use builder::{NoPath, StoreBuilder, WithPath};
pub use config::StoreConfig;
pub use context::{CancelHandle, Context};
pub use error::{KvError, KvErrorExt};
pub use kv::{Keys, Kv, PutOptions};
pub use prefix::{Prefix, Segment, SegmentKind};
pub use store::{Namespace, Store};

use std::path::Path;

/// Opens the store at `addr`, creating it when missing.
///
/// # Errors
/// See [`StoreBuilder::open`].
pub fn open(addr: impl AsRef<Path>) -> Result<Store, KvError> {
    Store::builder().path(addr.as_ref()).create(true).open()
}
