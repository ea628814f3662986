//! The storage engine handle shared by every node of a store.
//!
//! [`Engine`] wraps a single `redb` database holding one flat table of
//! `physical key -> value` pairs. It is opened once by the root [`crate::Store`], shared by
//! `Arc` with every descendant, and transitions `open -> closed` exactly once. Every call
//! made after the transition fails with [`KvError::Closed`].
//!
//! Read snapshots handed to listings are registered with the engine. Closing drops them
//! together with the database, so a listing that outlives [`Engine::close`] never keeps the
//! engine file locked.

use crate::error::{KvError, KvErrorExt};
use fxhash::FxHashMap;
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use redb::{Database, ReadTransaction, ReadableTable, Table, TableDefinition};
use std::fmt;
use std::ops::{Bound, ControlFlow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, trace, warn};

/// The single physical table every namespace shares.
const TABLE: TableDefinition<'static, &[u8], &[u8]> = TableDefinition::new("nestkv");

/// File name of the engine inside the store directory.
pub(crate) const DB_FILE_NAME: &str = "nestkv.redb";

/// Keys fetched per engine round-trip while listing.
pub(crate) const DEFAULT_SCAN_BATCH: usize = 256;

#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineOptions {
    pub(crate) create: bool,
    pub(crate) cache_size: Option<usize>,
    pub(crate) scan_batch: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { create: false, cache_size: None, scan_batch: DEFAULT_SCAN_BATCH }
    }
}

/// State that exists only while the engine is open.
struct Open {
    /// Read transactions behind live [`Snapshot`]s, keyed by snapshot id.
    snapshots: Mutex<FxHashMap<u64, ReadTransaction>>,
    db: Database,
}

pub(crate) struct Engine {
    path: PathBuf,
    state: RwLock<Option<Open>>,
    next_snapshot: AtomicU64,
    scan_batch: usize,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path)
            .field("open", &!self.is_closed())
            .field("scan_batch", &self.scan_batch)
            .finish()
    }
}

impl Engine {
    /// Opens (or, with `create`, creates) the engine inside the directory `dir`.
    ///
    /// # Errors
    /// Returns [`KvError::Io`] if the directory cannot be created, or [`KvError::Engine`] if
    /// the database is missing (without `create`), locked by another process, or corrupt.
    pub(crate) fn open(dir: &Path, options: EngineOptions) -> Result<Self, KvError> {
        if options.create {
            std::fs::create_dir_all(dir)
                .context(format!("Failed to bootstrap store directory: {}", dir.display()))?;
        }

        let file = dir.join(DB_FILE_NAME);
        let mut builder = Database::builder();
        if let Some(bytes) = options.cache_size {
            builder.set_cache_size(bytes);
        }
        let opened = if options.create { builder.create(&file) } else { builder.open(&file) };
        let db = opened.context(format!("Failed to open engine: {}", file.display()))?;

        let tx = db.begin_write().context("Bootstrapping table")?;
        tx.open_table(TABLE).context("Bootstrapping table")?;
        tx.commit().context("Bootstrapping table")?;

        info!(path = %file.display(), "Storage engine opened");
        Ok(Self {
            path: dir.to_path_buf(),
            state: RwLock::new(Some(Open { snapshots: Mutex::new(FxHashMap::default()), db })),
            next_snapshot: AtomicU64::new(0),
            scan_batch: options.scan_batch.max(1),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) const fn scan_batch(&self) -> usize {
        self.scan_batch
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.read().is_none()
    }

    /// Borrows the open state for the duration of one engine call.
    ///
    /// Holding the guard keeps [`Engine::close`] from running underneath the call.
    fn open_state(&self) -> Result<MappedRwLockReadGuard<'_, Open>, KvError> {
        RwLockReadGuard::try_map(self.state.read(), Option::as_ref).map_err(|_| KvError::closed())
    }

    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let state = self.open_state()?;
        let tx = state.db.begin_read()?;
        let table = tx.open_table(TABLE)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    /// Probes several keys against one read snapshot.
    pub(crate) fn contains_many(&self, keys: &[Vec<u8>]) -> Result<Vec<bool>, KvError> {
        let state = self.open_state()?;
        let tx = state.db.begin_read()?;
        let table = tx.open_table(TABLE)?;
        keys.iter()
            .map(|key| -> Result<bool, KvError> { Ok(table.get(key.as_slice())?.is_some()) })
            .collect()
    }

    /// Unconditional upsert.
    pub(crate) fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.update(|txn| txn.put(key, value))
    }

    /// Runs `f` inside one write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and is rolled back on every other exit,
    /// including an early `?` inside `f` and a panic (redb aborts uncommitted transactions on
    /// drop). Write transactions are serialized by the engine, so a check made through
    /// [`Txn::has`] still holds when the following mutation commits.
    pub(crate) fn update<T>(
        &self,
        f: impl FnOnce(&mut Txn<'_, '_>) -> Result<T, KvError>,
    ) -> Result<T, KvError> {
        let state = self.open_state()?;
        let tx = state.db.begin_write()?;
        let outcome = {
            let mut table = tx.open_table(TABLE)?;
            f(&mut Txn { table: &mut table })
        };
        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            },
            Err(err) => {
                if let Err(abort) = tx.abort() {
                    warn!(error = %abort, "Transaction rollback failed");
                }
                Err(err)
            },
        }
    }

    /// Opens a consistent read snapshot and registers it with the engine.
    ///
    /// The snapshot is released when the returned handle drops, or by [`Engine::close`].
    pub(crate) fn snapshot(self: &Arc<Self>) -> Result<Snapshot, KvError> {
        let state = self.open_state()?;
        let tx = state.db.begin_read()?;
        let id = self.next_snapshot.fetch_add(1, Ordering::Relaxed);
        state.snapshots.lock().insert(id, tx);
        trace!(snapshot = id, "Snapshot registered");
        Ok(Snapshot { engine: Arc::clone(self), id })
    }

    fn release(&self, id: u64) {
        let released =
            self.state.read().as_ref().and_then(|state| state.snapshots.lock().remove(&id));
        if released.is_some() {
            trace!(snapshot = id, "Snapshot released");
        }
    }

    /// Walks the latest committed state in ascending key order starting at `from`.
    pub(crate) fn walk(
        &self,
        from: Bound<&[u8]>,
        f: impl FnMut(&[u8]) -> ControlFlow<()>,
    ) -> Result<(), KvError> {
        let state = self.open_state()?;
        let tx = state.db.begin_read()?;
        walk_table(&tx, from, f)
    }

    /// Walks the registered snapshot `id`. Once the engine is closed the snapshot is gone and
    /// this fails with [`KvError::Closed`].
    fn walk_snapshot(
        &self,
        id: u64,
        from: Bound<&[u8]>,
        f: impl FnMut(&[u8]) -> ControlFlow<()>,
    ) -> Result<(), KvError> {
        let state = self.open_state()?;
        let snapshots = state.snapshots.lock();
        let tx = snapshots.get(&id).ok_or_else(KvError::closed)?;
        walk_table(tx, from, f)
    }

    /// Closes the engine. Only the first call succeeds.
    ///
    /// Snapshots still held by live listings are dropped before the database, which releases
    /// the engine file.
    ///
    /// # Errors
    /// Returns [`KvError::Closed`] if the engine was already closed.
    pub(crate) fn close(&self) -> Result<(), KvError> {
        let Open { snapshots, db } = self.state.write().take().ok_or_else(KvError::closed)?;
        let live = snapshots.into_inner();
        let released = live.len();
        drop(live);
        drop(db);
        info!(path = %self.path.display(), released, "Storage engine closed");
        Ok(())
    }

    /// Compacts the database file, returning whether any space was reclaimed.
    ///
    /// Blocks every other engine call for its duration. Fails while a snapshot is live.
    pub(crate) fn compact(&self) -> Result<bool, KvError> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or_else(KvError::closed)?;
        state.db.compact().context("Compacting engine file")
    }

    /// Verifies page checksums, repairing what the engine can.
    pub(crate) fn check_integrity(&self) -> Result<bool, KvError> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or_else(KvError::closed)?;
        state.db.check_integrity().context("Checking engine integrity")
    }
}

/// The range cursor lives only for this call; `f` stops the walk early by breaking.
fn walk_table(
    tx: &ReadTransaction,
    from: Bound<&[u8]>,
    mut f: impl FnMut(&[u8]) -> ControlFlow<()>,
) -> Result<(), KvError> {
    let table = tx.open_table(TABLE)?;
    for entry in table.range::<&[u8]>((from, Bound::Unbounded))? {
        let (key, _value) = entry?;
        if f(key.value()).is_break() {
            break;
        }
    }
    Ok(())
}

/// A write transaction scoped to [`Engine::update`].
pub(crate) struct Txn<'a, 'txn> {
    table: &'a mut Table<'txn, &'static [u8], &'static [u8]>,
}

impl fmt::Debug for Txn<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Txn").finish_non_exhaustive()
    }
}

impl Txn<'_, '_> {
    pub(crate) fn has(&self, key: &[u8]) -> Result<bool, KvError> {
        Ok(self.table.get(key)?.is_some())
    }

    pub(crate) fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.table.insert(key, value)?;
        Ok(())
    }

    /// Removes `key`, reporting whether it was present.
    pub(crate) fn delete(&mut self, key: &[u8]) -> Result<bool, KvError> {
        Ok(self.table.remove(key)?.is_some())
    }
}

/// Handle to a read snapshot registered with the engine; released on drop.
pub(crate) struct Snapshot {
    engine: Arc<Engine>,
    id: u64,
}

impl Snapshot {
    /// Walks this snapshot in ascending key order starting at `from`.
    pub(crate) fn walk(
        &self,
        from: Bound<&[u8]>,
        f: impl FnMut(&[u8]) -> ControlFlow<()>,
    ) -> Result<(), KvError> {
        self.engine.walk_snapshot(self.id, from, f)
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.engine.release(self.id);
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("id", &self.id).finish_non_exhaustive()
    }
}
